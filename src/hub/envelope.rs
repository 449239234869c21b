//! Payloads that only exist inside the hub.

use std::time::Instant;

use serde::Serialize;

use crate::protocol::{CommandAck, CommandKind};

/// An acknowledgment the distributor matched to an outstanding sync command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncAck {
    pub ticket: u64,
    pub ack: CommandAck,
}

/// Final verdict of the sync dispatcher for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub ticket: u64,
    pub command: CommandKind,
    pub accepted: bool,
    pub attempts: u8,
}

/// The vehicle is holding at an unlimited loiter item and waits for a sensor reading.
#[derive(Debug, Clone, Copy)]
pub struct MeasurementRequest {
    pub mission_item: u16,
    pub requested_at: Instant,
}

impl MeasurementRequest {
    pub fn new(mission_item: u16) -> Self {
        Self {
            mission_item,
            requested_at: Instant::now(),
        }
    }
}
