pub mod classification;
pub mod clock;
pub mod config;
pub mod event;
pub mod event_status;
pub mod race_time;
pub mod ranking;
pub mod region;
pub mod scoring;
pub mod submission_status;

pub use classification::ClassificationResult;
pub use clock::{Clock, ManualClock, SystemClock};
pub use event_status::{EventAction, EventStatus};
pub use ranking::LeaderboardEntry;
pub use region::{Region, RegionConstraint};
pub use scoring::{PlacementPoints, ScoringPolicy, TimeBonus};
pub use submission_status::{ReviewDecision, SubmissionStatus};
