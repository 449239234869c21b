//! Mission execution state and its serializable snapshot.

use serde::Serialize;

use super::blueprint::MissionBlueprint;
use crate::errors::Result;

/// What the vehicle is doing at a loiter item.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LoiterState {
    /// Holding until released from the ground.
    Unlimited,
    /// Holding for a fixed number of seconds.
    Timed(f32),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionPhase {
    Idle,
    Loaded,
    Loitering,
    Complete,
}

/// Progress through a loaded plan. Only the mission manager mutates it.
#[derive(Debug, Clone, PartialEq)]
pub struct MissionExecutionState {
    current_waypoint: u16,
    target_waypoint: u16,
    current_mission_item: u16,
    final_waypoint: u16,
    loiter: Option<LoiterState>,
    complete: bool,
}

impl MissionExecutionState {
    pub fn from_blueprint(blueprint: &MissionBlueprint) -> Result<Self> {
        let first = blueprint.first_waypoint()?;
        Ok(Self {
            current_waypoint: first,
            target_waypoint: first,
            current_mission_item: first,
            final_waypoint: blueprint.final_waypoint()?,
            loiter: None,
            complete: false,
        })
    }

    pub fn current_waypoint(&self) -> u16 {
        self.current_waypoint
    }

    pub fn target_waypoint(&self) -> u16 {
        self.target_waypoint
    }

    pub fn current_mission_item(&self) -> u16 {
        self.current_mission_item
    }

    pub fn final_waypoint(&self) -> u16 {
        self.final_waypoint
    }

    pub fn loiter(&self) -> Option<LoiterState> {
        self.loiter
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    pub fn phase(&self) -> MissionPhase {
        if self.complete {
            MissionPhase::Complete
        } else if self.loiter.is_some() {
            MissionPhase::Loitering
        } else {
            MissionPhase::Loaded
        }
    }

    pub(super) fn set_current_mission_item(&mut self, seq: u16) {
        self.current_mission_item = seq;
    }

    pub(super) fn set_target_waypoint(&mut self, seq: u16) {
        self.target_waypoint = seq;
    }

    pub(super) fn set_current_waypoint(&mut self, seq: u16) {
        self.current_waypoint = seq;
    }

    pub(super) fn set_loiter(&mut self, loiter: Option<LoiterState>) {
        self.loiter = loiter;
    }

    pub(super) fn mark_complete(&mut self) {
        self.target_waypoint = self.final_waypoint;
        self.current_waypoint = self.final_waypoint;
        self.loiter = None;
        self.complete = true;
    }
}

/// Point-in-time view of the mission, shaped for the JSON front door.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissionStatus {
    pub phase: MissionPhase,
    pub plan_downloaded: bool,
    pub mission_items: usize,
    pub waypoints: Vec<u16>,
    pub current_waypoint: Option<u16>,
    pub target_waypoint: Option<u16>,
    pub current_mission_item: Option<u16>,
    pub final_waypoint: Option<u16>,
    pub loiter: Option<LoiterState>,
    pub complete: bool,
}

impl MissionStatus {
    pub fn capture(blueprint: &MissionBlueprint, state: Option<&MissionExecutionState>) -> Self {
        Self {
            phase: state.map_or(MissionPhase::Idle, |s| s.phase()),
            plan_downloaded: blueprint.is_downloaded(),
            mission_items: blueprint.len(),
            waypoints: blueprint.waypoints().to_vec(),
            current_waypoint: state.map(|s| s.current_waypoint),
            target_waypoint: state.map(|s| s.target_waypoint),
            current_mission_item: state.map(|s| s.current_mission_item),
            final_waypoint: state.map(|s| s.final_waypoint),
            loiter: state.and_then(|s| s.loiter),
            complete: state.is_some_and(|s| s.complete),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{CommandKind, MissionItem};

    #[test]
    fn starts_at_first_waypoint() {
        let bp = MissionBlueprint::from_items(vec![
            MissionItem::new(0, CommandKind::NavLoiterUnlim),
            MissionItem::new(1, CommandKind::NavWaypoint),
            MissionItem::new(2, CommandKind::NavWaypoint),
        ])
        .unwrap();
        let state = MissionExecutionState::from_blueprint(&bp).unwrap();
        assert_eq!(state.current_waypoint(), 1);
        assert_eq!(state.final_waypoint(), 2);
        assert_eq!(state.phase(), MissionPhase::Loaded);

        let status = MissionStatus::capture(&bp, Some(&state));
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["phase"], "loaded");
        assert_eq!(json["waypoints"], serde_json::json!([1, 2]));
    }

    #[test]
    fn idle_snapshot_without_state() {
        let status = MissionStatus::capture(&MissionBlueprint::new(), None);
        assert_eq!(status.phase, MissionPhase::Idle);
        assert!(!status.plan_downloaded);
        assert_eq!(status.current_waypoint, None);
    }

    #[test]
    fn timed_loiter_serializes_seconds() {
        let json = serde_json::to_value(LoiterState::Timed(5.0)).unwrap();
        assert_eq!(json, serde_json::json!({ "timed": 5.0 }));
    }
}
