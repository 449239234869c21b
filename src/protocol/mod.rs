//! # Decoded Wire Records
//!
//! Typed records exchanged with the autopilot codec. The codec itself (framing,
//! CRC, dialect tables) lives outside this crate; everything here is already
//! decoded.
//!
//! - [`InboundMessage`] - telemetry and replies coming from the vehicle
//! - [`CommandRecord`] - one outbound `COMMAND_LONG` style instruction
//! - [`MissionItem`] - one step of the onboard mission plan (`MISSION_ITEM_INT`)
//! - [`status_text`] - parsing of the autopilot's mission progress text
//!
//! The protocol has no request id on commands. A `COMMAND_ACK` only names the
//! command id it answers, which is why acknowledgment correlation happens in
//! [`crate::link`].

pub mod command;
pub mod status_text;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use command::{CommandRecord, TargetIds};

/// MAV_CMD identifiers the core knows by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandKind {
    NavWaypoint,
    NavLoiterUnlim,
    NavLoiterTurns,
    NavLoiterTime,
    NavReturnToLaunch,
    DoSetMode,
    DoJump,
    DoChangeSpeed,
    DoSetMissionCurrent,
    MissionStart,
    ComponentArmDisarm,
    /// Any command id without a named variant.
    Other(u16),
}

impl CommandKind {
    /// Numeric MAV_CMD id used on the wire.
    pub fn id(self) -> u16 {
        match self {
            CommandKind::NavWaypoint => 16,
            CommandKind::NavLoiterUnlim => 17,
            CommandKind::NavLoiterTurns => 18,
            CommandKind::NavLoiterTime => 19,
            CommandKind::NavReturnToLaunch => 20,
            CommandKind::DoSetMode => 176,
            CommandKind::DoJump => 177,
            CommandKind::DoChangeSpeed => 178,
            CommandKind::DoSetMissionCurrent => 224,
            CommandKind::MissionStart => 300,
            CommandKind::ComponentArmDisarm => 400,
            CommandKind::Other(id) => id,
        }
    }

    pub fn from_id(id: u16) -> Self {
        match id {
            16 => CommandKind::NavWaypoint,
            17 => CommandKind::NavLoiterUnlim,
            18 => CommandKind::NavLoiterTurns,
            19 => CommandKind::NavLoiterTime,
            20 => CommandKind::NavReturnToLaunch,
            176 => CommandKind::DoSetMode,
            177 => CommandKind::DoJump,
            178 => CommandKind::DoChangeSpeed,
            224 => CommandKind::DoSetMissionCurrent,
            300 => CommandKind::MissionStart,
            400 => CommandKind::ComponentArmDisarm,
            other => CommandKind::Other(other),
        }
    }

    /// True for every loiter flavour (unlimited, turns, timed).
    pub fn is_loiter(self) -> bool {
        matches!(
            self,
            CommandKind::NavLoiterUnlim | CommandKind::NavLoiterTurns | CommandKind::NavLoiterTime
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CommandKind::NavWaypoint => "NAV_WAYPOINT",
            CommandKind::NavLoiterUnlim => "NAV_LOITER_UNLIM",
            CommandKind::NavLoiterTurns => "NAV_LOITER_TURNS",
            CommandKind::NavLoiterTime => "NAV_LOITER_TIME",
            CommandKind::NavReturnToLaunch => "NAV_RETURN_TO_LAUNCH",
            CommandKind::DoSetMode => "DO_SET_MODE",
            CommandKind::DoJump => "DO_JUMP",
            CommandKind::DoChangeSpeed => "DO_CHANGE_SPEED",
            CommandKind::DoSetMissionCurrent => "DO_SET_MISSION_CURRENT",
            CommandKind::MissionStart => "MISSION_START",
            CommandKind::ComponentArmDisarm => "COMPONENT_ARM_DISARM",
            CommandKind::Other(id) => return write!(f, "MAV_CMD({})", id),
        };
        f.write_str(name)
    }
}

/// MAV_RESULT carried by a `COMMAND_ACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AckResult {
    Accepted,
    TemporarilyRejected,
    Denied,
    Unsupported,
    Failed,
    InProgress,
    Cancelled,
    Unknown(u8),
}

impl AckResult {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => AckResult::Accepted,
            1 => AckResult::TemporarilyRejected,
            2 => AckResult::Denied,
            3 => AckResult::Unsupported,
            4 => AckResult::Failed,
            5 => AckResult::InProgress,
            6 => AckResult::Cancelled,
            other => AckResult::Unknown(other),
        }
    }

    pub fn code(self) -> u8 {
        match self {
            AckResult::Accepted => 0,
            AckResult::TemporarilyRejected => 1,
            AckResult::Denied => 2,
            AckResult::Unsupported => 3,
            AckResult::Failed => 4,
            AckResult::InProgress => 5,
            AckResult::Cancelled => 6,
            AckResult::Unknown(code) => code,
        }
    }

    pub fn is_accepted(self) -> bool {
        self == AckResult::Accepted
    }
}

/// Decoded `COMMAND_ACK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandAck {
    pub command: CommandKind,
    pub result: AckResult,
}

impl CommandAck {
    pub fn new(command: CommandKind, result: AckResult) -> Self {
        Self { command, result }
    }

    pub fn accepted(command: CommandKind) -> Self {
        Self::new(command, AckResult::Accepted)
    }
}

/// Coarse message class, used for routing decisions and log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    MissionCurrent,
    MissionItemReached,
    StatusText,
    CommandAck,
    Heartbeat,
    Other,
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageKind::MissionCurrent => "MISSION_CURRENT",
            MessageKind::MissionItemReached => "MISSION_ITEM_REACHED",
            MessageKind::StatusText => "STATUSTEXT",
            MessageKind::CommandAck => "COMMAND_ACK",
            MessageKind::Heartbeat => "HEARTBEAT",
            MessageKind::Other => "OTHER",
        })
    }
}

/// A decoded record delivered by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum InboundMessage {
    MissionCurrent { seq: u16 },
    MissionItemReached { seq: u16 },
    StatusText { severity: u8, text: String },
    CommandAck(CommandAck),
    Heartbeat { custom_mode: u32, armed: bool },
    /// Anything the core does not classify; only ever logged.
    Other { name: String },
}

impl InboundMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            InboundMessage::MissionCurrent { .. } => MessageKind::MissionCurrent,
            InboundMessage::MissionItemReached { .. } => MessageKind::MissionItemReached,
            InboundMessage::StatusText { .. } => MessageKind::StatusText,
            InboundMessage::CommandAck(_) => MessageKind::CommandAck,
            InboundMessage::Heartbeat { .. } => MessageKind::Heartbeat,
            InboundMessage::Other { .. } => MessageKind::Other,
        }
    }

    /// Mission progress traffic that must reach the mission manager.
    pub fn is_mission_message(&self) -> bool {
        matches!(
            self.kind(),
            MessageKind::MissionCurrent | MessageKind::MissionItemReached | MessageKind::StatusText
        )
    }

    pub fn status_text(severity: u8, text: impl Into<String>) -> Self {
        InboundMessage::StatusText {
            severity,
            text: text.into(),
        }
    }
}

/// One step of the onboard plan, as delivered by `MISSION_ITEM_INT`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissionItem {
    pub seq: u16,
    pub command: CommandKind,
    pub frame: u8,
    pub current: bool,
    pub autocontinue: bool,
    /// param1..param4; meaning depends on `command` (param1 is the hold time for timed loiters).
    pub params: [f32; 4],
    /// Latitude in degrees * 1e7.
    pub x: i32,
    /// Longitude in degrees * 1e7.
    pub y: i32,
    pub z: f32,
}

/// MAV_FRAME_GLOBAL_RELATIVE_ALT_INT
const FRAME_GLOBAL_RELATIVE_ALT_INT: u8 = 6;

impl MissionItem {
    pub fn new(seq: u16, command: CommandKind) -> Self {
        Self {
            seq,
            command,
            frame: FRAME_GLOBAL_RELATIVE_ALT_INT,
            current: false,
            autocontinue: true,
            params: [0.0; 4],
            x: 0,
            y: 0,
            z: 0.0,
        }
    }

    pub fn waypoint(seq: u16, lat: f64, lon: f64) -> Self {
        let mut item = Self::new(seq, CommandKind::NavWaypoint);
        item.x = (lat * 1e7) as i32;
        item.y = (lon * 1e7) as i32;
        item
    }

    pub fn loiter_unlimited(seq: u16) -> Self {
        Self::new(seq, CommandKind::NavLoiterUnlim)
    }

    pub fn loiter_time(seq: u16, seconds: f32) -> Self {
        let mut item = Self::new(seq, CommandKind::NavLoiterTime);
        item.params[0] = seconds;
        item
    }

    pub fn is_waypoint(&self) -> bool {
        self.command == CommandKind::NavWaypoint
    }

    pub fn latitude(&self) -> f64 {
        self.x as f64 / 1e7
    }

    pub fn longitude(&self) -> f64 {
        self.y as f64 / 1e7
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ids_round_trip_through_names() {
        for id in [16u16, 17, 18, 19, 20, 176, 177, 178, 224, 300, 400, 999] {
            assert_eq!(CommandKind::from_id(id).id(), id);
        }
        assert_eq!(CommandKind::from_id(999), CommandKind::Other(999));
        assert_eq!(CommandKind::DoSetMissionCurrent.to_string(), "DO_SET_MISSION_CURRENT");
    }

    #[test]
    fn only_progress_messages_are_mission_messages() {
        assert!(InboundMessage::MissionCurrent { seq: 1 }.is_mission_message());
        assert!(InboundMessage::status_text(6, "Mission: 3 WP").is_mission_message());
        assert!(!InboundMessage::CommandAck(CommandAck::accepted(CommandKind::DoSetMode))
            .is_mission_message());
        assert!(!InboundMessage::Other {
            name: "VFR_HUD".into()
        }
        .is_mission_message());
    }

    #[test]
    fn unknown_result_codes_are_preserved() {
        assert_eq!(AckResult::from_code(42), AckResult::Unknown(42));
        assert_eq!(AckResult::from_code(42).code(), 42);
        assert!(!AckResult::from_code(5).is_accepted());
    }
}
