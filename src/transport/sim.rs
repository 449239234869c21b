//! In-memory autopilot.
//!
//! Stands in for a real vehicle in the `simulate` CLI command and in the
//! integration tests. It serves a fixed mission plan, answers commands according
//! to a per-command [`AckPolicy`], records every transmission, and lets callers
//! inject arbitrary inbound traffic.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use log::{debug, trace};
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use super::{Transport, TransportError};
use crate::protocol::{
    AckResult, CommandAck, CommandKind, CommandRecord, InboundMessage, MissionItem,
};

/// How the simulated autopilot answers one command kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolicy {
    /// Accept every transmission.
    AcceptAll,
    /// Stay silent until the n-th transmission of a ticket, then accept it.
    AcceptOnAttempt(u32),
    /// Never answer.
    Silent,
    /// Answer every transmission with this result.
    Respond(AckResult),
}

#[derive(Debug, Default)]
struct SimState {
    mission: Vec<MissionItem>,
    policies: HashMap<CommandKind, AckPolicy>,
    transmissions_per_ticket: HashMap<u64, u32>,
    sent: Vec<CommandRecord>,
    armed: bool,
    custom_mode: u32,
}

pub struct SimulatedAutopilot {
    name: String,
    default_policy: AckPolicy,
    state: Mutex<SimState>,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<InboundMessage>>,
    connected: AtomicBool,
    echo_progress: AtomicBool,
    mission_acks: AtomicU32,
}

impl SimulatedAutopilot {
    pub fn new(name: impl Into<String>) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            name: name.into(),
            default_policy: AckPolicy::AcceptAll,
            state: Mutex::new(SimState::default()),
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
            connected: AtomicBool::new(true),
            echo_progress: AtomicBool::new(false),
            mission_acks: AtomicU32::new(0),
        }
    }

    /// Serve `items` as the onboard plan. Sequence numbers are taken as given.
    pub fn with_mission(self, items: Vec<MissionItem>) -> Self {
        self.state().mission = items;
        self
    }

    pub fn with_default_policy(mut self, policy: AckPolicy) -> Self {
        self.default_policy = policy;
        self
    }

    /// Emit `MISSION_CURRENT` after an accepted set-current-mission-index command.
    pub fn with_progress_echo(self) -> Self {
        self.echo_progress.store(true, Ordering::Relaxed);
        self
    }

    pub fn set_policy(&self, command: CommandKind, policy: AckPolicy) {
        self.state().policies.insert(command, policy);
    }

    pub fn replace_mission(&self, items: Vec<MissionItem>) {
        self.state().mission = items;
    }

    /// Queue an inbound message as if the vehicle had sent it.
    pub fn inject(&self, message: InboundMessage) {
        trace!("sim {}: inject {:?}", self.name, message.kind());
        let _ = self.inbound_tx.send(message);
    }

    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::Relaxed);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed)
    }

    pub fn transmissions(&self) -> Vec<CommandRecord> {
        self.state().sent.clone()
    }

    pub fn transmissions_of(&self, command: CommandKind) -> usize {
        self.state()
            .sent
            .iter()
            .filter(|c| c.command == command)
            .count()
    }

    pub fn mission_acknowledgements(&self) -> u32 {
        self.mission_acks.load(Ordering::Relaxed)
    }

    pub fn is_armed(&self) -> bool {
        self.state().armed
    }

    pub fn custom_mode(&self) -> u32 {
        self.state().custom_mode
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_connected(&self) -> Result<(), TransportError> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TransportError::Disconnected)
        }
    }

    /// Decide the reply for one transmission and apply its side effects.
    fn react(&self, command: &CommandRecord) -> Option<AckResult> {
        let mut state = self.state();
        state.sent.push(command.clone());
        let attempt = {
            let n = state
                .transmissions_per_ticket
                .entry(command.ticket)
                .or_insert(0);
            *n += 1;
            *n
        };
        let policy = state
            .policies
            .get(&command.command)
            .copied()
            .unwrap_or(self.default_policy);
        let result = match policy {
            AckPolicy::AcceptAll => Some(AckResult::Accepted),
            AckPolicy::AcceptOnAttempt(n) if attempt >= n => Some(AckResult::Accepted),
            AckPolicy::AcceptOnAttempt(_) | AckPolicy::Silent => None,
            AckPolicy::Respond(result) => Some(result),
        };
        if result == Some(AckResult::Accepted) {
            match command.command {
                CommandKind::ComponentArmDisarm => state.armed = command.is_arm_request(),
                CommandKind::DoSetMode => state.custom_mode = command.params[1] as u32,
                _ => {}
            }
        }
        result
    }
}

#[async_trait]
impl Transport for SimulatedAutopilot {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send_command(&self, command: &CommandRecord) -> Result<(), TransportError> {
        self.ensure_connected()?;
        let reply = self.react(command);
        debug!(
            "sim {}: {} (confirmation {}) -> {:?}",
            self.name, command.command, command.confirmation, reply
        );
        if let Some(result) = reply {
            self.inject(InboundMessage::CommandAck(CommandAck::new(
                command.command,
                result,
            )));
            if result.is_accepted() && self.echo_progress.load(Ordering::Relaxed) {
                if let Some(seq) = command.mission_seq() {
                    self.inject(InboundMessage::MissionCurrent { seq });
                }
            }
        }
        Ok(())
    }

    async fn recv_message(&self) -> Result<InboundMessage, TransportError> {
        self.ensure_connected()?;
        let mut rx = self.inbound_rx.lock().await;
        rx.recv().await.ok_or(TransportError::Disconnected)
    }

    async fn request_mission_count(&self) -> Result<u16, TransportError> {
        self.ensure_connected()?;
        Ok(self.state().mission.len() as u16)
    }

    async fn request_mission_item(&self, seq: u16) -> Result<MissionItem, TransportError> {
        self.ensure_connected()?;
        self.state()
            .mission
            .get(seq as usize)
            .cloned()
            .ok_or_else(|| TransportError::Protocol(format!("no mission item {}", seq)))
    }

    async fn acknowledge_mission(&self) -> Result<(), TransportError> {
        self.ensure_connected()?;
        self.mission_acks.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::TargetIds;

    #[tokio::test]
    async fn accept_on_attempt_stays_silent_until_threshold() {
        let sim = SimulatedAutopilot::new("t");
        sim.set_policy(CommandKind::DoSetMode, AckPolicy::AcceptOnAttempt(2));
        let cmd = CommandRecord::set_mode(TargetIds::default(), 10);

        sim.send_command(&cmd.retransmission(1)).await.unwrap();
        sim.send_command(&cmd.retransmission(2)).await.unwrap();

        let ack = sim.recv_message().await.unwrap();
        assert_eq!(
            ack,
            InboundMessage::CommandAck(CommandAck::accepted(CommandKind::DoSetMode))
        );
        assert_eq!(sim.custom_mode(), 10);
        assert_eq!(sim.transmissions_of(CommandKind::DoSetMode), 2);
    }

    #[tokio::test]
    async fn disconnected_sim_refuses_io() {
        let sim = SimulatedAutopilot::new("t");
        sim.disconnect();
        assert!(matches!(
            sim.request_mission_count().await,
            Err(TransportError::Disconnected)
        ));
    }
}
