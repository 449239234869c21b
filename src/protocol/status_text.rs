//! Parsing of the autopilot's `STATUSTEXT` mission progress lines.
//!
//! ArduPilot Rover announces mission progress in free text:
//!
//! ```text
//! Mission: 4 LoitUnlim
//! Reached waypoint #3
//! Reached waypoint #2. Loiter for 5 seconds
//! ```
//!
//! Only these shapes are recognised; everything else is [`StatusNotice::Unrecognised`].

/// Label ArduPilot uses for an unlimited loiter item.
pub const UNLIMITED_LOITER_LABEL: &str = "LoitUnlim";

#[derive(Debug, Clone, PartialEq)]
pub enum StatusNotice {
    /// `Mission: <seq> <label>` - the autopilot started executing item `seq`.
    MissionItemStarted { seq: u16, label: String },
    /// `Reached waypoint #<seq>` with an optional timed hold.
    WaypointReached {
        seq: u16,
        loiter_seconds: Option<u32>,
    },
    Unrecognised,
}

impl StatusNotice {
    pub fn is_unlimited_loiter(&self) -> bool {
        matches!(self, StatusNotice::MissionItemStarted { label, .. } if label == UNLIMITED_LOITER_LABEL)
    }
}

pub fn parse(text: &str) -> StatusNotice {
    let text = text.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if let Some(rest) = text.strip_prefix("Mission:") {
        return parse_mission_started(rest).unwrap_or(StatusNotice::Unrecognised);
    }
    if let Some(rest) = text.strip_prefix("Reached waypoint #") {
        return parse_waypoint_reached(rest).unwrap_or(StatusNotice::Unrecognised);
    }
    StatusNotice::Unrecognised
}

fn parse_mission_started(rest: &str) -> Option<StatusNotice> {
    let mut parts = rest.split_whitespace();
    let seq = parts.next()?.parse().ok()?;
    let label: String = parts
        .next()?
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect();
    if label.is_empty() {
        return None;
    }
    Some(StatusNotice::MissionItemStarted { seq, label })
}

fn parse_waypoint_reached(rest: &str) -> Option<StatusNotice> {
    let digits: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();
    let seq = digits.parse().ok()?;
    let loiter_seconds = rest
        .split_once("Loiter for ")
        .and_then(|(_, tail)| tail.split_whitespace().next())
        .and_then(|n| n.parse().ok());
    Some(StatusNotice::WaypointReached {
        seq,
        loiter_seconds,
    })
}
