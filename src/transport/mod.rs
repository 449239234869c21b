//! # Autopilot Transport
//!
//! The boundary between the core and the physical link plus protocol codec. A
//! transport accepts outbound [`CommandRecord`]s and yields decoded
//! [`InboundMessage`]s; serial framing, UDP sockets and MAVLink dialect handling
//! all live behind it.
//!
//! The trait is object safe so the rover can hold an `Arc<dyn Transport>` and
//! swap it at runtime (see [`crate::rover::Rover::set_transport`]).
//!
//! `recv_message` must be cancel safe: the link reader wraps it in a timeout so
//! it can observe shutdown, and a dropped call must not lose a message.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::protocol::{CommandRecord, InboundMessage, MissionItem};

#[cfg(feature = "simulator")]
pub mod sim;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("link disconnected")]
    Disconnected,
    #[error("timed out waiting for {0}")]
    Timeout(&'static str),
    #[error("protocol error: {0}")]
    Protocol(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Short label used in log lines.
    fn name(&self) -> &str;

    async fn send_command(&self, command: &CommandRecord) -> Result<(), TransportError>;

    async fn recv_message(&self) -> Result<InboundMessage, TransportError>;

    /// `MISSION_REQUEST_LIST` -> `MISSION_COUNT`
    async fn request_mission_count(&self) -> Result<u16, TransportError>;

    /// `MISSION_REQUEST_INT(seq)` -> `MISSION_ITEM_INT`
    async fn request_mission_item(&self, seq: u16) -> Result<MissionItem, TransportError>;

    /// `MISSION_ACK` closing a completed download.
    async fn acknowledge_mission(&self) -> Result<(), TransportError>;
}

pub type SharedTransport = Arc<dyn Transport>;
