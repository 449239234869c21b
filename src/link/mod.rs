//! # Message Distributor
//!
//! Classifies every decoded inbound message and routes it onto the hub:
//!
//! - `MISSION_CURRENT`, `MISSION_ITEM_REACHED`, `STATUSTEXT` go to `mission_message`
//! - `COMMAND_ACK` is matched against the [`ledger`]; a hit goes to
//!   `sync_cmd_ack` tagged with the matched ticket, a miss is forwarded
//!   best-effort to `async_cmd_ack`
//! - everything, including the above, is copied to `logging`
//!
//! The ledger is private to the distributor. The sync dispatcher only touches
//! it through [`MessageDistributor::register_outstanding`] and
//! [`MessageDistributor::retire`].

pub mod ledger;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use log::{debug, trace};

use crate::hub::{Hub, SyncAck};
use crate::metrics;
use crate::protocol::{CommandAck, CommandKind, InboundMessage};

use ledger::OutstandingLedger;

pub struct MessageDistributor {
    hub: Arc<Hub>,
    ledger: Mutex<OutstandingLedger>,
}

impl MessageDistributor {
    pub fn new(hub: Arc<Hub>) -> Self {
        Self {
            hub,
            ledger: Mutex::new(OutstandingLedger::new()),
        }
    }

    fn ledger(&self) -> MutexGuard<'_, OutstandingLedger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Route one inbound message. Waits while `mission_message` or `logging` is full.
    pub async fn distribute(&self, message: InboundMessage) {
        trace!("distribute {}", message.kind());
        if message.is_mission_message() {
            self.hub.mission_message.send(message.clone()).await;
        }
        if let InboundMessage::CommandAck(ack) = &message {
            self.route_ack(*ack).await;
        }
        self.hub.logging.send(message).await;
    }

    async fn route_ack(&self, ack: CommandAck) {
        let matched = self.ledger().match_ack(ack.command);
        match matched {
            Some(entry) => {
                debug!(
                    "{} {:?} matched ticket {} after {:?}",
                    ack.command,
                    ack.result,
                    entry.ticket,
                    entry.registered_at.elapsed()
                );
                self.hub
                    .sync_cmd_ack
                    .send(SyncAck {
                        ticket: entry.ticket,
                        ack,
                    })
                    .await;
            }
            None => {
                metrics::inc_unsolicited_acks();
                if !self.hub.async_cmd_ack.try_send(ack) {
                    debug!("unsolicited {} ack dropped", ack.command);
                }
            }
        }
    }

    /// Expect an acknowledgment for `command` on behalf of `ticket`.
    pub fn register_outstanding(&self, ticket: u64, command: CommandKind) {
        self.ledger().register(ticket, command);
    }

    /// Forget any entries left over for a finished command.
    pub fn retire(&self, ticket: u64) -> usize {
        self.ledger().retire(ticket)
    }

    pub fn reset(&self) {
        self.ledger().clear();
    }

    pub fn outstanding(&self) -> usize {
        self.ledger().len()
    }
}
