use thiserror::Error;

use crate::hub::UnknownChannel;
use crate::protocol::CommandKind;
use crate::transport::TransportError;

/// Errors surfaced by the mission, dispatch and rover layers.
#[derive(Debug, Error)]
pub enum RoverError {
    #[error("mission plan already downloaded; pass force to download again")]
    AlreadyDownloaded,
    #[error("mission plan has no waypoints")]
    EmptyPlan,
    #[error("mission item out of order: expected seq {expected}, got {found}")]
    SequenceMismatch { expected: u16, found: u16 },
    #[error("mission is already complete")]
    MissionComplete,
    #[error("already heading to the last waypoint")]
    AlreadyInLastWaypoint,
    #[error("already at the last mission item")]
    AlreadyInLastMissionItem,
    #[error("{command} was not accepted after {attempts} attempt(s)")]
    SyncCommandFailed { command: CommandKind, attempts: u8 },
    #[error("a transport is already bound; pass force to replace it")]
    ExistingConnection,
    #[error("no transport bound")]
    NotConnected,
    #[error("no mission loaded")]
    NotLoaded,
    #[error("rover is not ready for a mission")]
    NotReady,
    #[error("autopilot refused the mode change")]
    ModeFailed,
    #[error("autopilot refused to arm")]
    ArmFailed,
    #[error("dispatch workers are not running")]
    WorkersNotRunning,
    #[error(transparent)]
    UnknownChannel(#[from] UnknownChannel),
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),
}

impl RoverError {
    /// The requested move would run past the end of the plan.
    pub fn is_at_end(&self) -> bool {
        matches!(
            self,
            RoverError::AlreadyInLastWaypoint | RoverError::AlreadyInLastMissionItem
        )
    }
}

pub type Result<T> = std::result::Result<T, RoverError>;
