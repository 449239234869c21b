//! Mission execution state machine.
//!
//! ```text
//!   Idle --load_mission--> Loaded <--> Loitering
//!                            |             |
//!                            +--final WP reached--> Complete
//! ```
//!
//! Every operation runs under one async mutex, held across the wait for a
//! sync command result, so only one move can be in flight at a time.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use log::{debug, info, warn};
use tokio::sync::Mutex;

use super::blueprint::MissionBlueprint;
use super::state::{LoiterState, MissionExecutionState, MissionStatus};
use crate::errors::{Result, RoverError};
use crate::hub::Hub;
use crate::protocol::status_text::{self, StatusNotice};
use crate::protocol::{CommandKind, CommandRecord, InboundMessage, TargetIds};
use crate::transport::SharedTransport;

/// Something the progress worker should act on after a status update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressNotice {
    /// The vehicle is holding at an unlimited loiter item.
    UnlimitedLoiter { mission_item: u16 },
    WaypointReached { seq: u16 },
    MissionComplete,
}

#[derive(Default)]
struct MissionInner {
    blueprint: MissionBlueprint,
    state: Option<MissionExecutionState>,
}

pub struct MissionManager {
    hub: Arc<Hub>,
    target: TargetIds,
    result_timeout: Duration,
    transport: RwLock<Option<SharedTransport>>,
    inner: Mutex<MissionInner>,
}

impl MissionManager {
    /// `result_timeout` bounds each wait on `sync_cmd_result`.
    pub fn new(hub: Arc<Hub>, target: TargetIds, result_timeout: Duration) -> Self {
        Self {
            hub,
            target,
            result_timeout,
            transport: RwLock::new(None),
            inner: Mutex::new(MissionInner::default()),
        }
    }

    pub fn set_transport(&self, transport: SharedTransport) {
        *self.transport.write().unwrap_or_else(PoisonError::into_inner) = Some(transport);
    }

    fn transport(&self) -> Result<SharedTransport> {
        self.transport
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
            .ok_or(RoverError::NotConnected)
    }

    /// Download the plan through the bound transport and start tracking it.
    ///
    /// The new plan is only committed once tracking state can be built from it;
    /// a plan without waypoints fails with [`RoverError::EmptyPlan`] and leaves
    /// the previous plan and state in place.
    pub async fn load_mission(&self, force: bool) -> Result<MissionStatus> {
        let transport = self.transport()?;
        let mut inner = self.inner.lock().await;
        if inner.blueprint.is_downloaded() && !force {
            return Err(RoverError::AlreadyDownloaded);
        }
        let fresh = MissionBlueprint::fetch(transport.as_ref()).await?;
        Self::commit(&mut inner, fresh)
    }

    /// Track a plan obtained some other way (e.g. uploaded by the planner).
    pub async fn install_blueprint(
        &self,
        blueprint: MissionBlueprint,
        force: bool,
    ) -> Result<MissionStatus> {
        let mut inner = self.inner.lock().await;
        if inner.blueprint.is_downloaded() && !force {
            return Err(RoverError::AlreadyDownloaded);
        }
        Self::commit(&mut inner, blueprint)
    }

    fn commit(inner: &mut MissionInner, blueprint: MissionBlueprint) -> Result<MissionStatus> {
        let state = MissionExecutionState::from_blueprint(&blueprint).map_err(|e| {
            warn!("rejecting mission plan of {} item(s): {}", blueprint.len(), e);
            e
        })?;
        info!(
            "mission loaded: {} item(s), waypoints {:?}",
            blueprint.len(),
            blueprint.waypoints()
        );
        inner.blueprint = blueprint;
        inner.state = Some(state);
        Ok(MissionStatus::capture(&inner.blueprint, inner.state.as_ref()))
    }

    /// Start the loaded plan over from its first waypoint.
    pub async fn restart_mission(&self) -> Result<MissionStatus> {
        let mut inner = self.inner.lock().await;
        if inner.state.is_none() {
            return Err(RoverError::NotLoaded);
        }
        let state = MissionExecutionState::from_blueprint(&inner.blueprint)?;
        inner.state = Some(state);
        info!("mission state reset to first waypoint");
        Ok(MissionStatus::capture(&inner.blueprint, inner.state.as_ref()))
    }

    /// Fold one mission progress message into the execution state.
    pub async fn update_status(&self, message: &InboundMessage) -> Option<ProgressNotice> {
        let mut inner = self.inner.lock().await;
        let MissionInner { blueprint, state } = &mut *inner;

        if let InboundMessage::StatusText { text, .. } = message {
            let notice = status_text::parse(text);
            let tracking = state.as_mut().filter(|s| !s.is_complete());
            match notice {
                StatusNotice::MissionItemStarted { seq, .. } if notice.is_unlimited_loiter() => {
                    if let Some(state) = tracking {
                        state.set_current_mission_item(seq);
                        state.set_loiter(Some(LoiterState::Unlimited));
                    }
                    return Some(ProgressNotice::UnlimitedLoiter { mission_item: seq });
                }
                StatusNotice::WaypointReached {
                    seq,
                    loiter_seconds: Some(seconds),
                } => {
                    // Holding at the waypoint itself before moving on.
                    if let Some(state) = tracking.filter(|_| blueprint.is_waypoint(seq)) {
                        state.set_current_mission_item(seq);
                        state.set_loiter(Some(LoiterState::Timed(seconds as f32)));
                        debug!("holding {}s at waypoint {}", seconds, seq);
                    }
                }
                _ => {}
            }
            return None;
        }

        let state = state.as_mut().filter(|s| !s.is_complete())?;
        match *message {
            InboundMessage::MissionCurrent { seq } => {
                state.set_current_mission_item(seq);
                match blueprint.item(seq).map(|item| (item.command, item.params[0])) {
                    Some((CommandKind::NavWaypoint, _)) => {
                        state.set_target_waypoint(seq);
                        state.set_loiter(None);
                    }
                    Some((CommandKind::NavLoiterUnlim, _)) => {
                        state.set_loiter(Some(LoiterState::Unlimited));
                    }
                    Some((CommandKind::NavLoiterTime, seconds)) => {
                        state.set_loiter(Some(LoiterState::Timed(seconds)));
                    }
                    _ => {}
                }
                None
            }
            InboundMessage::MissionItemReached { seq } => {
                if blueprint.is_waypoint(seq) {
                    state.set_current_waypoint(seq);
                    if seq == state.final_waypoint() {
                        state.mark_complete();
                        info!("final waypoint {} reached; mission complete", seq);
                        return Some(ProgressNotice::MissionComplete);
                    }
                    debug!("waypoint {} reached", seq);
                    return Some(ProgressNotice::WaypointReached { seq });
                }
                if blueprint.is_loiter_item(seq) {
                    state.set_loiter(None);
                }
                None
            }
            _ => None,
        }
    }

    /// Send the vehicle on to the next waypoint of the plan.
    pub async fn move_to_next_waypoint(&self) -> Result<u16> {
        let mut inner = self.inner.lock().await;
        let MissionInner { blueprint, state } = &mut *inner;
        let state = state.as_mut().ok_or(RoverError::NotLoaded)?;
        if state.is_complete() {
            return Err(RoverError::MissionComplete);
        }
        let next = blueprint.next_waypoint(state.current_waypoint())?;
        if next == state.final_waypoint() {
            return Err(RoverError::AlreadyInLastWaypoint);
        }

        self.jump_to(next).await?;
        state.set_current_waypoint(next);
        state.set_target_waypoint(next);
        state.set_current_mission_item(next);
        state.set_loiter(None);
        info!("moved to waypoint {}", next);
        Ok(next)
    }

    /// Send the vehicle on to the next item of the plan, whatever its kind.
    pub async fn move_to_next_mission_item(&self) -> Result<u16> {
        let mut inner = self.inner.lock().await;
        let MissionInner { blueprint, state } = &mut *inner;
        let state = state.as_mut().ok_or(RoverError::NotLoaded)?;
        if state.is_complete() {
            return Err(RoverError::MissionComplete);
        }
        let next = state.current_mission_item().saturating_add(1);
        if blueprint.is_mission_complete(next) {
            return Err(RoverError::AlreadyInLastMissionItem);
        }

        self.jump_to(next).await?;
        state.set_current_mission_item(next);
        state.set_loiter(None);
        if blueprint.is_waypoint(next) {
            state.set_target_waypoint(next);
        }
        info!("moved to mission item {}", next);
        Ok(next)
    }

    async fn jump_to(&self, seq: u16) -> Result<()> {
        let command = CommandRecord::set_mission_current(self.target, seq);
        match self.hub.round_trip(command, self.result_timeout).await {
            Ok(outcome) => {
                debug!("jump to {} accepted after {} attempt(s)", seq, outcome.attempts);
                Ok(())
            }
            Err(e) => {
                warn!("jump to {} failed: {}", seq, e);
                Err(e)
            }
        }
    }

    pub async fn status(&self) -> MissionStatus {
        let inner = self.inner.lock().await;
        MissionStatus::capture(&inner.blueprint, inner.state.as_ref())
    }

    pub async fn is_plan_downloaded(&self) -> bool {
        self.inner.lock().await.blueprint.is_downloaded()
    }

    /// Copy of the loaded plan.
    pub async fn blueprint(&self) -> MissionBlueprint {
        self.inner.lock().await.blueprint.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mission::MissionPhase;
    use crate::protocol::MissionItem;

    fn manager() -> MissionManager {
        MissionManager::new(
            Arc::new(Hub::default()),
            TargetIds::default(),
            Duration::from_millis(50),
        )
    }

    fn plan() -> MissionBlueprint {
        MissionBlueprint::from_items(vec![
            MissionItem::new(0, CommandKind::NavWaypoint),
            MissionItem::loiter_unlimited(1),
            MissionItem::new(2, CommandKind::NavWaypoint),
            MissionItem::loiter_time(3, 5.0),
            MissionItem::new(4, CommandKind::NavWaypoint),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn load_without_transport_is_not_connected() {
        let m = manager();
        assert!(matches!(
            m.load_mission(false).await,
            Err(RoverError::NotConnected)
        ));
    }

    #[tokio::test]
    async fn second_install_needs_force() {
        let m = manager();
        m.install_blueprint(plan(), false).await.unwrap();
        assert!(matches!(
            m.install_blueprint(plan(), false).await,
            Err(RoverError::AlreadyDownloaded)
        ));
        assert!(m.install_blueprint(plan(), true).await.is_ok());
    }

    #[tokio::test]
    async fn mission_current_tracks_loiter_kinds() {
        let m = manager();
        m.install_blueprint(plan(), false).await.unwrap();

        m.update_status(&InboundMessage::MissionCurrent { seq: 1 }).await;
        assert_eq!(m.status().await.loiter, Some(LoiterState::Unlimited));
        assert_eq!(m.status().await.phase, MissionPhase::Loitering);

        m.update_status(&InboundMessage::MissionCurrent { seq: 3 }).await;
        assert_eq!(m.status().await.loiter, Some(LoiterState::Timed(5.0)));

        m.update_status(&InboundMessage::MissionCurrent { seq: 4 }).await;
        let status = m.status().await;
        assert_eq!(status.loiter, None);
        assert_eq!(status.target_waypoint, Some(4));
        assert_eq!(status.current_mission_item, Some(4));
    }

    #[tokio::test]
    async fn status_text_loiter_yields_notice() {
        let m = manager();
        m.install_blueprint(plan(), false).await.unwrap();
        let notice = m
            .update_status(&InboundMessage::status_text(6, "Mission: 1 LoitUnlim"))
            .await;
        assert_eq!(notice, Some(ProgressNotice::UnlimitedLoiter { mission_item: 1 }));
        assert_eq!(m.status().await.current_mission_item, Some(1));
        assert!(m
            .update_status(&InboundMessage::status_text(6, "Mission: 2 WP"))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn timed_hold_announced_in_status_text() {
        let m = manager();
        m.install_blueprint(plan(), false).await.unwrap();
        let notice = m
            .update_status(&InboundMessage::status_text(
                6,
                "Reached waypoint #2. Loiter for 8 seconds",
            ))
            .await;
        assert_eq!(notice, None);
        let status = m.status().await;
        assert_eq!(status.loiter, Some(LoiterState::Timed(8.0)));
        assert_eq!(status.current_mission_item, Some(2));
        assert_eq!(status.phase, MissionPhase::Loitering);

        // Without a hold the line changes nothing; MISSION_ITEM_REACHED does the work.
        m.update_status(&InboundMessage::MissionCurrent { seq: 4 }).await;
        m.update_status(&InboundMessage::status_text(6, "Reached waypoint #4"))
            .await;
        assert_eq!(m.status().await.loiter, None);
    }

    #[tokio::test]
    async fn plan_without_waypoints_keeps_previous_plan() {
        let m = manager();
        m.install_blueprint(plan(), false).await.unwrap();
        m.update_status(&InboundMessage::MissionCurrent { seq: 2 }).await;
        let before = m.status().await;

        let no_waypoints = MissionBlueprint::from_items(vec![
            MissionItem::new(0, CommandKind::DoChangeSpeed),
            MissionItem::loiter_unlimited(1),
        ])
        .unwrap();
        assert!(matches!(
            m.install_blueprint(no_waypoints.clone(), true).await,
            Err(RoverError::EmptyPlan)
        ));
        assert_eq!(m.status().await, before);

        let fresh = manager();
        assert!(matches!(
            fresh.install_blueprint(no_waypoints, false).await,
            Err(RoverError::EmptyPlan)
        ));
        assert!(!fresh.is_plan_downloaded().await);
        assert_eq!(fresh.status().await.phase, MissionPhase::Idle);
    }

    #[tokio::test]
    async fn final_waypoint_reached_completes_and_blocks_moves() {
        let m = manager();
        m.install_blueprint(plan(), false).await.unwrap();
        assert_eq!(
            m.update_status(&InboundMessage::MissionItemReached { seq: 2 })
                .await,
            Some(ProgressNotice::WaypointReached { seq: 2 })
        );
        assert_eq!(
            m.update_status(&InboundMessage::MissionItemReached { seq: 4 })
                .await,
            Some(ProgressNotice::MissionComplete)
        );
        assert_eq!(m.status().await.phase, MissionPhase::Complete);
        assert!(matches!(
            m.move_to_next_waypoint().await,
            Err(RoverError::MissionComplete)
        ));
        assert!(matches!(
            m.move_to_next_mission_item().await,
            Err(RoverError::MissionComplete)
        ));

        let status = m.restart_mission().await.unwrap();
        assert_eq!(status.phase, MissionPhase::Loaded);
        assert_eq!(status.current_waypoint, Some(0));
    }

    #[tokio::test]
    async fn restart_requires_loaded_plan() {
        assert!(matches!(
            manager().restart_mission().await,
            Err(RoverError::NotLoaded)
        ));
    }

    #[tokio::test]
    async fn unanswered_move_leaves_state_untouched() {
        let m = manager();
        m.install_blueprint(plan(), false).await.unwrap();
        let before = m.status().await;
        assert!(matches!(
            m.move_to_next_waypoint().await,
            Err(RoverError::SyncCommandFailed {
                command: CommandKind::DoSetMissionCurrent,
                ..
            })
        ));
        assert_eq!(m.status().await, before);
    }
}
