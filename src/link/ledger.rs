//! Outstanding synchronous commands awaiting an acknowledgment.
//!
//! `COMMAND_ACK` names only the command id, so an ack is matched to the oldest
//! entry of the same command kind. Entries of other kinds are left alone, which
//! lets acks for different commands arrive in any order.

use std::collections::VecDeque;
use std::time::Instant;

use crate::protocol::CommandKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutstandingCommand {
    pub ticket: u64,
    pub command: CommandKind,
    pub registered_at: Instant,
}

#[derive(Debug, Default)]
pub struct OutstandingLedger {
    entries: VecDeque<OutstandingCommand>,
}

impl OutstandingLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, ticket: u64, command: CommandKind) {
        self.entries.push_back(OutstandingCommand {
            ticket,
            command,
            registered_at: Instant::now(),
        });
    }

    /// Remove and return the oldest entry for `command`, if any.
    pub fn match_ack(&mut self, command: CommandKind) -> Option<OutstandingCommand> {
        let pos = self.entries.iter().position(|e| e.command == command)?;
        self.entries.remove(pos)
    }

    /// Drop every entry for `ticket`. Returns how many were removed.
    pub fn retire(&mut self, ticket: u64) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.ticket != ticket);
        before - self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn oldest(&self) -> Option<&OutstandingCommand> {
        self.entries.front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_oldest_entry_of_same_kind() {
        let mut ledger = OutstandingLedger::new();
        ledger.register(1, CommandKind::DoSetMode);
        ledger.register(2, CommandKind::ComponentArmDisarm);
        ledger.register(3, CommandKind::DoSetMode);

        let hit = ledger.match_ack(CommandKind::DoSetMode).unwrap();
        assert_eq!(hit.ticket, 1);
        let hit = ledger.match_ack(CommandKind::ComponentArmDisarm).unwrap();
        assert_eq!(hit.ticket, 2);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.oldest().map(|e| e.ticket), Some(3));
    }

    #[test]
    fn unmatched_kind_leaves_ledger_untouched() {
        let mut ledger = OutstandingLedger::new();
        ledger.register(7, CommandKind::DoSetMissionCurrent);
        assert!(ledger.match_ack(CommandKind::DoSetMode).is_none());
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn retire_removes_all_retransmissions() {
        let mut ledger = OutstandingLedger::new();
        ledger.register(4, CommandKind::DoSetMode);
        ledger.register(4, CommandKind::DoSetMode);
        ledger.register(5, CommandKind::DoSetMode);
        assert_eq!(ledger.retire(4), 2);
        assert_eq!(ledger.oldest().map(|e| e.ticket), Some(5));
        ledger.clear();
        assert!(ledger.is_empty());
    }
}
