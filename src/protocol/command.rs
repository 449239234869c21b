//! Outbound command records.
//!
//! A [`CommandRecord`] carries a process-local `ticket` that never goes on the
//! wire. The sync dispatcher and the hub use it to tell a fresh result apart from
//! a stale one left behind by an earlier, timed-out caller.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use super::CommandKind;

static NEXT_TICKET: AtomicU64 = AtomicU64::new(1);

/// MAV_MODE_FLAG_CUSTOM_MODE_ENABLED
pub const MODE_FLAG_CUSTOM_MODE_ENABLED: f32 = 1.0;
/// Magic param2 value that makes the autopilot skip its pre-arm checks.
pub const FORCE_ARM_MAGIC: f32 = 21196.0;

/// Rover custom modes (ArduPilot numbering).
pub const ROVER_MODE_MANUAL: u32 = 0;
pub const ROVER_MODE_AUTO: u32 = 10;
pub const ROVER_MODE_GUIDED: u32 = 15;

/// Addressing for the vehicle and component a command is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetIds {
    pub system: u8,
    pub component: u8,
}

impl Default for TargetIds {
    fn default() -> Self {
        Self {
            system: 1,
            component: 1,
        }
    }
}

/// One outbound command, immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub ticket: u64,
    pub command: CommandKind,
    pub target: TargetIds,
    /// 0 on first transmission, incremented on each retransmission.
    pub confirmation: u8,
    pub params: [f32; 7],
}

impl CommandRecord {
    pub fn new(command: CommandKind, target: TargetIds, params: [f32; 7]) -> Self {
        Self {
            ticket: NEXT_TICKET.fetch_add(1, Ordering::Relaxed),
            command,
            target,
            confirmation: 0,
            params,
        }
    }

    pub fn arm(target: TargetIds, force: bool) -> Self {
        let magic = if force { FORCE_ARM_MAGIC } else { 0.0 };
        Self::new(
            CommandKind::ComponentArmDisarm,
            target,
            [1.0, magic, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    pub fn disarm(target: TargetIds, force: bool) -> Self {
        let magic = if force { FORCE_ARM_MAGIC } else { 0.0 };
        Self::new(
            CommandKind::ComponentArmDisarm,
            target,
            [0.0, magic, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    pub fn set_mode(target: TargetIds, custom_mode: u32) -> Self {
        Self::new(
            CommandKind::DoSetMode,
            target,
            [
                MODE_FLAG_CUSTOM_MODE_ENABLED,
                custom_mode as f32,
                0.0,
                0.0,
                0.0,
                0.0,
                0.0,
            ],
        )
    }

    /// Jump the onboard mission to item `seq`.
    pub fn set_mission_current(target: TargetIds, seq: u16) -> Self {
        Self::new(
            CommandKind::DoSetMissionCurrent,
            target,
            [seq as f32, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
        )
    }

    pub fn return_to_launch(target: TargetIds) -> Self {
        Self::new(CommandKind::NavReturnToLaunch, target, [0.0; 7])
    }

    /// Copy of this record for transmission number `attempt` (1-based).
    ///
    /// The ticket is kept so acknowledgments for any attempt correlate to the
    /// same logical command.
    pub fn retransmission(&self, attempt: u8) -> Self {
        let mut copy = self.clone();
        copy.confirmation = attempt.saturating_sub(1);
        copy
    }

    /// Target item of a set-current-mission-index command.
    pub fn mission_seq(&self) -> Option<u16> {
        match self.command {
            CommandKind::DoSetMissionCurrent => Some(self.params[0] as u16),
            _ => None,
        }
    }

    pub fn is_arm_request(&self) -> bool {
        self.command == CommandKind::ComponentArmDisarm && self.params[0] >= 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickets_are_unique() {
        let a = CommandRecord::arm(TargetIds::default(), false);
        let b = CommandRecord::arm(TargetIds::default(), false);
        assert_ne!(a.ticket, b.ticket);
    }

    #[test]
    fn force_arm_sets_magic_param() {
        let forced = CommandRecord::arm(TargetIds::default(), true);
        assert_eq!(forced.params[0], 1.0);
        assert_eq!(forced.params[1], FORCE_ARM_MAGIC);
        assert!(forced.is_arm_request());
        assert!(!CommandRecord::disarm(TargetIds::default(), false).is_arm_request());
    }

    #[test]
    fn set_mode_uses_custom_mode_flag() {
        let cmd = CommandRecord::set_mode(TargetIds::default(), ROVER_MODE_AUTO);
        assert_eq!(cmd.command, CommandKind::DoSetMode);
        assert_eq!(cmd.params[0], MODE_FLAG_CUSTOM_MODE_ENABLED);
        assert_eq!(cmd.params[1], 10.0);
    }

    #[test]
    fn retransmission_bumps_confirmation_on_copy_only() {
        let cmd = CommandRecord::set_mission_current(TargetIds::default(), 5);
        let third = cmd.retransmission(3);
        assert_eq!(cmd.confirmation, 0);
        assert_eq!(third.confirmation, 2);
        assert_eq!(third.ticket, cmd.ticket);
        assert_eq!(third.mission_seq(), Some(5));
    }
}
