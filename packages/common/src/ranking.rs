//! Leaderboard computation.
//!
//! The leaderboard is always rebuilt from the full set of approved
//! submissions, never patched in place.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::race_time;
use crate::region::Region;
use crate::scoring::ScoringPolicy;

/// An approved submission competing for a placement.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankCandidate {
    pub submission_id: i32,
    pub participant_id: i32,
    pub time_ms: u64,
    pub region: Region,
    pub approved_at: DateTime<Utc>,
}

/// One placement on an event leaderboard.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LeaderboardEntry {
    #[schema(example = 12)]
    pub submission_id: i32,
    #[schema(example = 3)]
    pub participant_id: i32,
    #[schema(example = 83450)]
    pub time_ms: u64,
    #[schema(example = "1:23.450")]
    pub time_text: String,
    #[schema(example = 1)]
    pub rank: u32,
    #[schema(example = 100)]
    pub points: i32,
    pub region: Region,
    #[schema(example = "2025-10-01T14:30:00Z")]
    pub approved_at: DateTime<Utc>,
}

/// Rank approved submissions and score each placement.
///
/// Ordering: faster time first, then earlier approval, then lower submission
/// id (creation order). The last key makes the order total, so the output
/// depends only on the input set and not on its iteration order.
pub fn recompute(mut candidates: Vec<RankCandidate>, policy: &ScoringPolicy) -> Vec<LeaderboardEntry> {
    candidates.sort_by(|a, b| {
        a.time_ms
            .cmp(&b.time_ms)
            .then(a.approved_at.cmp(&b.approved_at))
            .then(a.submission_id.cmp(&b.submission_id))
    });

    candidates
        .into_iter()
        .zip(1u32..)
        .map(|(c, rank)| LeaderboardEntry {
            submission_id: c.submission_id,
            participant_id: c.participant_id,
            time_ms: c.time_ms,
            time_text: race_time::encode(c.time_ms),
            rank,
            points: policy.award(rank, c.time_ms),
            region: c.region,
            approved_at: c.approved_at,
        })
        .collect()
}

/// Entries for a single region, keeping their event-wide rank and points.
pub fn filter_region(entries: &[LeaderboardEntry], region: Option<Region>) -> Vec<LeaderboardEntry> {
    entries
        .iter()
        .filter(|e| region.is_none_or(|r| e.region == r))
        .cloned()
        .collect()
}
