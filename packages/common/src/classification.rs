use serde::{Deserialize, Serialize};

use crate::race_time;

/// Confidence reported when the recognized time agrees with the declared one.
pub const NOMINAL_CONFIDENCE: f64 = 0.8;
/// Confidence reported when the recognized time disagrees with the declared one.
pub const LOW_CONFIDENCE: f64 = 0.3;
/// Largest allowed difference between recognized and declared time.
pub const MISMATCH_TOLERANCE_MS: u64 = 5_000;

/// Outcome of running text recognition over a proof image.
///
/// This is advisory metadata for reviewers. It never changes the declared
/// time of a submission.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ClassificationResult {
    /// Time found in the image, in canonical `M:SS.mmm` form.
    #[schema(example = "1:23.450")]
    pub extracted_time_text: Option<String>,
    /// 0.0 when unprocessed, otherwise 0.8 or 0.3.
    #[schema(example = 0.8)]
    pub confidence: f64,
    pub was_processed: bool,
}

impl ClassificationResult {
    /// Recognition failed, timed out, or found no time.
    pub fn unprocessed() -> Self {
        Self {
            extracted_time_text: None,
            confidence: 0.0,
            was_processed: false,
        }
    }

    /// Interpret raw recognizer output against the participant's declared time.
    pub fn from_recognized_text(text: &str, declared_ms: u64) -> Self {
        let Some(extracted_ms) = race_time::find_in_text(text).and_then(|t| race_time::decode(t).ok())
        else {
            return Self::unprocessed();
        };

        let confidence = if extracted_ms.abs_diff(declared_ms) > MISMATCH_TOLERANCE_MS {
            LOW_CONFIDENCE
        } else {
            NOMINAL_CONFIDENCE
        };

        Self {
            extracted_time_text: Some(race_time::encode(extracted_ms)),
            confidence,
            was_processed: true,
        }
    }

    /// Whether reviewers should look twice at this submission.
    pub fn is_suspicious(&self) -> bool {
        self.was_processed && self.confidence < NOMINAL_CONFIDENCE
    }
}
