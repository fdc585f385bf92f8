//! Conversion between canonical millisecond race times and their `M:SS.mmm`
//! display form.
//!
//! Accepted input is `<minutes>:<SS>.<fraction>` where minutes is one or more
//! digits, seconds exactly two digits and the fraction two or three digits.
//! A two-digit fraction is hundredths: `"1:23.45"` is 83 450 ms, not 83 045 ms.

use thiserror::Error;

const MS_PER_SECOND: u64 = 1_000;
const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;

/// Largest decodable time. Times are stored as signed 64-bit integers.
pub const MAX_MILLIS: u64 = i64::MAX as u64;

/// Error returned when a string is not a valid race time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid time format '{input}'. Use M:SS.mmm")]
pub struct DecodeError {
    input: String,
}

impl DecodeError {
    fn new(input: &str) -> Self {
        Self {
            input: input.to_string(),
        }
    }

    /// The rejected input.
    pub fn input(&self) -> &str {
        &self.input
    }
}

/// Format milliseconds as `M:SS.mmm`.
pub fn encode(millis: u64) -> String {
    let minutes = millis / MS_PER_MINUTE;
    let seconds = (millis % MS_PER_MINUTE) / MS_PER_SECOND;
    let ms = millis % MS_PER_SECOND;
    format!("{minutes}:{seconds:02}.{ms:03}")
}

/// Parse `M:SS.mm` or `M:SS.mmm` into milliseconds.
pub fn decode(text: &str) -> Result<u64, DecodeError> {
    let err = || DecodeError::new(text);

    let (minutes, rest) = text.split_once(':').ok_or_else(err)?;
    let (seconds, fraction) = rest.split_once('.').ok_or_else(err)?;

    if minutes.is_empty() || !is_digits(minutes) {
        return Err(err());
    }
    if seconds.len() != 2 || !is_digits(seconds) {
        return Err(err());
    }
    if !(2..=3).contains(&fraction.len()) || !is_digits(fraction) {
        return Err(err());
    }

    let minutes: u64 = minutes.parse().map_err(|_| err())?;
    let seconds: u64 = seconds.parse().map_err(|_| err())?;
    let mut ms: u64 = fraction.parse().map_err(|_| err())?;
    if fraction.len() == 2 {
        ms *= 10;
    }

    minutes
        .checked_mul(MS_PER_MINUTE)
        .and_then(|m| m.checked_add(seconds * MS_PER_SECOND + ms))
        .filter(|&total| total <= MAX_MILLIS)
        .ok_or_else(err)
}

/// Find the first race-time token embedded in free text (e.g. OCR output).
///
/// A token must not be directly preceded or followed by another digit, so
/// `"12:34.5678"` yields nothing rather than a truncated match.
pub fn find_in_text(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut start = 0;

    while start < bytes.len() {
        if !bytes[start].is_ascii_digit() || (start > 0 && bytes[start - 1].is_ascii_digit()) {
            start += 1;
            continue;
        }

        let mut end = start;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
        if let Some(len) = match_tail(&bytes[end..]) {
            let token_end = end + len;
            let followed_by_digit = bytes.get(token_end).is_some_and(u8::is_ascii_digit);
            if !followed_by_digit {
                return Some(&text[start..token_end]);
            }
        }
        start = end;
    }

    None
}

/// Match `:SS.ff` or `:SS.fff` at the start of `tail`, returning its length.
fn match_tail(tail: &[u8]) -> Option<usize> {
    if tail.len() < 6 || tail[0] != b':' || tail[3] != b'.' {
        return None;
    }
    if !tail[1..3].iter().all(u8::is_ascii_digit) {
        return None;
    }
    let fraction = tail[4..].iter().take_while(|b| b.is_ascii_digit()).count();
    match fraction {
        2 | 3 => Some(4 + fraction),
        _ => None,
    }
}

fn is_digits(s: &str) -> bool {
    s.bytes().all(|b| b.is_ascii_digit())
}
