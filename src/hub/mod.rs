//! # Message Hub
//!
//! Named, independently bounded channels connecting the link reader, the
//! distributor, the mission manager and the dispatch workers. Each channel is a
//! [`Lane`]: a bounded `tokio::sync::mpsc` channel whose receiving half sits
//! behind an async mutex so any task holding the hub can consume from it.
//!
//! | channel               | default capacity | payload                 |
//! |-----------------------|------------------|-------------------------|
//! | `sync_cmd`            | 10               | [`CommandRecord`]       |
//! | `sync_cmd_ack`        | 10               | [`SyncAck`]             |
//! | `async_cmd`           | 100              | [`CommandRecord`]       |
//! | `async_cmd_ack`       | 100              | [`CommandAck`]          |
//! | `mission_message`     | 100              | [`InboundMessage`]      |
//! | `measurement_request` | 10               | [`MeasurementRequest`]  |
//! | `sync_cmd_result`     | 10               | [`SyncOutcome`]         |
//! | `logging`             | 1000             | [`InboundMessage`]      |
//!
//! Sends wait while a channel is full; only the async-ack path uses the
//! dropping [`Lane::try_send`]. Receives are always bounded by a timeout so the
//! caller can re-check its [`Cancellation`].

mod cancel;
mod envelope;

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

use log::{debug, error, warn};
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};

use crate::errors::{Result, RoverError};
use crate::metrics;
use crate::protocol::{CommandAck, CommandRecord, InboundMessage};

pub use cancel::Cancellation;
pub use envelope::{MeasurementRequest, SyncAck, SyncOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    SyncCmd,
    SyncCmdAck,
    AsyncCmd,
    AsyncCmdAck,
    MissionMessage,
    MeasurementRequest,
    SyncCmdResult,
    Logging,
}

impl ChannelName {
    pub const ALL: [ChannelName; 8] = [
        ChannelName::SyncCmd,
        ChannelName::SyncCmdAck,
        ChannelName::AsyncCmd,
        ChannelName::AsyncCmdAck,
        ChannelName::MissionMessage,
        ChannelName::MeasurementRequest,
        ChannelName::SyncCmdResult,
        ChannelName::Logging,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChannelName::SyncCmd => "sync_cmd",
            ChannelName::SyncCmdAck => "sync_cmd_ack",
            ChannelName::AsyncCmd => "async_cmd",
            ChannelName::AsyncCmdAck => "async_cmd_ack",
            ChannelName::MissionMessage => "mission_message",
            ChannelName::MeasurementRequest => "measurement_request",
            ChannelName::SyncCmdResult => "sync_cmd_result",
            ChannelName::Logging => "logging",
        }
    }

    pub fn default_capacity(self) -> usize {
        match self {
            ChannelName::SyncCmd
            | ChannelName::SyncCmdAck
            | ChannelName::MeasurementRequest
            | ChannelName::SyncCmdResult => 10,
            ChannelName::AsyncCmd | ChannelName::AsyncCmdAck | ChannelName::MissionMessage => 100,
            ChannelName::Logging => 1000,
        }
    }
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown hub channel '{0}'")]
pub struct UnknownChannel(pub String);

impl FromStr for ChannelName {
    type Err = UnknownChannel;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        ChannelName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownChannel(s.to_string()))
    }
}

/// One bounded hub channel.
pub struct Lane<T> {
    name: ChannelName,
    capacity: usize,
    tx: mpsc::Sender<T>,
    rx: Mutex<mpsc::Receiver<T>>,
}

impl<T: Send> Lane<T> {
    fn new(name: ChannelName, capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            name,
            capacity: capacity.max(1),
            tx,
            rx: Mutex::new(rx),
        }
    }

    pub fn name(&self) -> ChannelName {
        self.name
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Items currently queued.
    pub fn len(&self) -> usize {
        self.capacity - self.tx.capacity()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Enqueue, waiting for space while the channel is full.
    pub async fn send(&self, item: T) {
        // The lane owns its receiver, so the channel cannot close underneath us.
        if self.tx.send(item).await.is_err() {
            error!("hub channel {} closed", self.name);
        }
    }

    /// Like [`send`](Self::send) but gives up once `cancel` is raised.
    /// Returns false if the item was not delivered.
    pub async fn send_until_cancelled(&self, item: T, cancel: &Cancellation) -> bool {
        tokio::select! {
            res = self.tx.send(item) => res.is_ok(),
            _ = cancel.cancelled() => false,
        }
    }

    /// Enqueue without waiting; the item is dropped if the channel is full.
    pub fn try_send(&self, item: T) -> bool {
        match self.tx.try_send(item) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!("hub channel {} full; dropping item", self.name);
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }

    /// Wait up to `timeout` for the next item. `None` means nothing arrived.
    pub async fn recv_timeout(&self, timeout: Duration) -> Option<T> {
        tokio::time::timeout(timeout, async { self.rx.lock().await.recv().await })
            .await
            .ok()
            .flatten()
    }

    /// Take the next item if one is queued and no other consumer holds the lane.
    pub fn try_recv(&self) -> Option<T> {
        self.rx.try_lock().ok()?.try_recv().ok()
    }

    /// Discard everything queued. Returns how many items were dropped.
    pub async fn drain(&self) -> usize {
        let mut rx = self.rx.lock().await;
        let mut dropped = 0;
        while rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }
}

/// All hub channels, addressed by field.
pub struct Hub {
    pub sync_cmd: Lane<CommandRecord>,
    pub sync_cmd_ack: Lane<SyncAck>,
    pub async_cmd: Lane<CommandRecord>,
    pub async_cmd_ack: Lane<CommandAck>,
    pub mission_message: Lane<InboundMessage>,
    pub measurement_request: Lane<MeasurementRequest>,
    pub sync_cmd_result: Lane<SyncOutcome>,
    pub logging: Lane<InboundMessage>,
    sync_gate: Mutex<()>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(&HashMap::new())
    }
}

impl Hub {
    /// Build a hub, taking capacities from `overrides` where present.
    pub fn new(overrides: &HashMap<ChannelName, usize>) -> Self {
        let cap = |name: ChannelName| {
            overrides
                .get(&name)
                .copied()
                .unwrap_or_else(|| name.default_capacity())
        };
        Self {
            sync_cmd: Lane::new(ChannelName::SyncCmd, cap(ChannelName::SyncCmd)),
            sync_cmd_ack: Lane::new(ChannelName::SyncCmdAck, cap(ChannelName::SyncCmdAck)),
            async_cmd: Lane::new(ChannelName::AsyncCmd, cap(ChannelName::AsyncCmd)),
            async_cmd_ack: Lane::new(ChannelName::AsyncCmdAck, cap(ChannelName::AsyncCmdAck)),
            mission_message: Lane::new(
                ChannelName::MissionMessage,
                cap(ChannelName::MissionMessage),
            ),
            measurement_request: Lane::new(
                ChannelName::MeasurementRequest,
                cap(ChannelName::MeasurementRequest),
            ),
            sync_cmd_result: Lane::new(
                ChannelName::SyncCmdResult,
                cap(ChannelName::SyncCmdResult),
            ),
            logging: Lane::new(ChannelName::Logging, cap(ChannelName::Logging)),
            sync_gate: Mutex::new(()),
        }
    }

    /// Build a hub from `name = capacity` pairs as written in configuration.
    pub fn from_named(capacities: &HashMap<String, usize>) -> Result<Self> {
        let mut overrides = HashMap::new();
        for (name, capacity) in capacities {
            overrides.insert(name.parse::<ChannelName>()?, *capacity);
        }
        Ok(Self::new(&overrides))
    }

    pub fn capacity_of(&self, name: ChannelName) -> usize {
        self.depths()
            .into_iter()
            .find(|(n, _, _)| *n == name)
            .map(|(_, _, cap)| cap)
            .unwrap_or(0)
    }

    /// `(channel, queued, capacity)` for every channel.
    pub fn depths(&self) -> Vec<(ChannelName, usize, usize)> {
        vec![
            (ChannelName::SyncCmd, self.sync_cmd.len(), self.sync_cmd.capacity()),
            (ChannelName::SyncCmdAck, self.sync_cmd_ack.len(), self.sync_cmd_ack.capacity()),
            (ChannelName::AsyncCmd, self.async_cmd.len(), self.async_cmd.capacity()),
            (ChannelName::AsyncCmdAck, self.async_cmd_ack.len(), self.async_cmd_ack.capacity()),
            (
                ChannelName::MissionMessage,
                self.mission_message.len(),
                self.mission_message.capacity(),
            ),
            (
                ChannelName::MeasurementRequest,
                self.measurement_request.len(),
                self.measurement_request.capacity(),
            ),
            (
                ChannelName::SyncCmdResult,
                self.sync_cmd_result.len(),
                self.sync_cmd_result.capacity(),
            ),
            (ChannelName::Logging, self.logging.len(), self.logging.capacity()),
        ]
    }

    /// Empty every channel. Used when the worker set is restarted.
    pub async fn drain_all(&self) -> usize {
        let dropped = self.sync_cmd.drain().await
            + self.sync_cmd_ack.drain().await
            + self.async_cmd.drain().await
            + self.async_cmd_ack.drain().await
            + self.mission_message.drain().await
            + self.measurement_request.drain().await
            + self.sync_cmd_result.drain().await
            + self.logging.drain().await;
        if dropped > 0 {
            debug!("hub drained {} leftover item(s)", dropped);
        }
        dropped
    }

    /// Submit `command` on `sync_cmd` and wait for its outcome on `sync_cmd_result`.
    ///
    /// Round trips are serialized, and outcomes carrying another ticket are
    /// discarded, so a caller never consumes a result meant for someone else.
    /// A rejection or a timeout yields [`RoverError::SyncCommandFailed`].
    pub async fn round_trip(&self, command: CommandRecord, wait: Duration) -> Result<SyncOutcome> {
        let _gate = self.sync_gate.lock().await;
        let ticket = command.ticket;
        let kind = command.command;
        let deadline = Instant::now() + wait;

        if tokio::time::timeout(wait, self.sync_cmd.send(command))
            .await
            .is_err()
        {
            warn!("{} (ticket {}) could not be queued within {:?}", kind, ticket, wait);
            return Err(RoverError::SyncCommandFailed {
                command: kind,
                attempts: 0,
            });
        }
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!("{} (ticket {}) got no result within {:?}", kind, ticket, wait);
                return Err(RoverError::SyncCommandFailed {
                    command: kind,
                    attempts: 0,
                });
            }
            match self.sync_cmd_result.recv_timeout(remaining).await {
                Some(outcome) if outcome.ticket == ticket => {
                    return if outcome.accepted {
                        Ok(outcome)
                    } else {
                        Err(RoverError::SyncCommandFailed {
                            command: kind,
                            attempts: outcome.attempts,
                        })
                    };
                }
                Some(stale) => {
                    metrics::inc_stale_results();
                    debug!(
                        "discarding stale result for {} (ticket {})",
                        stale.command, stale.ticket
                    );
                }
                None => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_names_parse_and_reject_unknown() {
        for name in ChannelName::ALL {
            assert_eq!(name.as_str().parse::<ChannelName>().unwrap(), name);
        }
        assert_eq!(
            "telemetry".parse::<ChannelName>(),
            Err(UnknownChannel("telemetry".into()))
        );
    }

    #[test]
    fn from_named_applies_overrides() {
        let mut caps = HashMap::new();
        caps.insert("logging".to_string(), 5);
        let hub = Hub::from_named(&caps).unwrap();
        assert_eq!(hub.capacity_of(ChannelName::Logging), 5);
        assert_eq!(hub.capacity_of(ChannelName::SyncCmd), 10);

        caps.insert("bogus".to_string(), 1);
        assert!(matches!(
            Hub::from_named(&caps),
            Err(RoverError::UnknownChannel(_))
        ));
    }

    #[tokio::test]
    async fn recv_timeout_reports_empty() {
        let hub = Hub::default();
        assert!(hub
            .sync_cmd_ack
            .recv_timeout(Duration::from_millis(5))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn try_send_drops_when_full() {
        let mut caps = HashMap::new();
        caps.insert(ChannelName::AsyncCmdAck, 1);
        let hub = Hub::new(&caps);
        let ack = CommandAck::accepted(crate::protocol::CommandKind::DoSetMode);
        assert!(hub.async_cmd_ack.try_send(ack));
        assert!(!hub.async_cmd_ack.try_send(ack));
        assert_eq!(hub.async_cmd_ack.len(), 1);
        assert_eq!(hub.drain_all().await, 1);
        assert!(hub.async_cmd_ack.is_empty());
    }

    #[test]
    fn send_parks_on_full_lane_until_space() {
        use tokio_test::{assert_pending, assert_ready, task};

        let mut caps = HashMap::new();
        caps.insert(ChannelName::MeasurementRequest, 1);
        let hub = Hub::new(&caps);
        assert!(hub.measurement_request.try_send(MeasurementRequest::new(1)));

        let mut blocked = task::spawn(hub.measurement_request.send(MeasurementRequest::new(2)));
        assert_pending!(blocked.poll());

        assert_eq!(hub.measurement_request.try_recv().map(|r| r.mission_item), Some(1));
        assert!(blocked.is_woken());
        assert_ready!(blocked.poll());
        drop(blocked);
        assert_eq!(hub.measurement_request.try_recv().map(|r| r.mission_item), Some(2));
    }
}
