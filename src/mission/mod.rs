//! # Mission Tracking
//!
//! - [`blueprint`] - the downloaded plan and its waypoint index
//! - [`state`] - execution progress and the status snapshot served to callers
//! - [`manager`] - the state machine that folds telemetry into progress and
//!   requests navigation jumps through the sync dispatcher

pub mod blueprint;
pub mod manager;
pub mod state;

pub use blueprint::MissionBlueprint;
pub use manager::{MissionManager, ProgressNotice};
pub use state::{LoiterState, MissionExecutionState, MissionPhase, MissionStatus};
