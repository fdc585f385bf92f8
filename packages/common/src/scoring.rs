use serde::{Deserialize, Serialize};

/// Points awarded per leaderboard placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct PlacementPoints {
    #[schema(example = 100)]
    pub first: i32,
    #[schema(example = 75)]
    pub second: i32,
    #[schema(example = 50)]
    pub third: i32,
    /// Awarded to every placement below third.
    #[schema(example = 10)]
    pub participation: i32,
}

impl Default for PlacementPoints {
    fn default() -> Self {
        Self {
            first: 100,
            second: 75,
            third: 50,
            participation: 10,
        }
    }
}

/// Extra points for runs finishing strictly under a threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct TimeBonus {
    pub enabled: bool,
    /// Runs with a time strictly below this many milliseconds earn the bonus.
    #[schema(example = 90000)]
    pub threshold_ms: u64,
    #[schema(example = 25)]
    pub points: i32,
}

/// Per-event scoring configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ScoringPolicy {
    pub points: PlacementPoints,
    #[serde(default)]
    pub time_bonus: TimeBonus,
}

impl ScoringPolicy {
    /// Total points for a placement: the rank-based base score plus any time bonus.
    pub fn award(&self, rank: u32, time_ms: u64) -> i32 {
        let bonus = if self.time_bonus.enabled && time_ms < self.time_bonus.threshold_ms {
            self.time_bonus.points
        } else {
            0
        };
        points_for_rank(rank, &self.points).saturating_add(bonus)
    }
}

/// Base points for a 1-based rank.
pub fn points_for_rank(rank: u32, points: &PlacementPoints) -> i32 {
    match rank {
        1 => points.first,
        2 => points.second,
        3 => points.third,
        _ => points.participation,
    }
}
