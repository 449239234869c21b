//! The onboard mission plan as downloaded from the autopilot.
//!
//! A blueprint is built empty, filled item by item in download order and then
//! frozen. Freezing derives the waypoint index; after that the plan is read-only
//! until a forced re-download replaces it wholesale.

use log::{debug, info};

use crate::errors::{Result, RoverError};
use crate::protocol::{CommandKind, MissionItem};
use crate::transport::Transport;

#[derive(Debug, Clone, Default)]
pub struct MissionBlueprint {
    items: Vec<MissionItem>,
    waypoints: Vec<u16>,
    downloaded: bool,
}

impl MissionBlueprint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build and freeze a plan from items already in sequence order.
    pub fn from_items(items: impl IntoIterator<Item = MissionItem>) -> Result<Self> {
        let mut blueprint = Self::new();
        for item in items {
            blueprint.add_item(item)?;
        }
        blueprint.freeze();
        Ok(blueprint)
    }

    pub fn add_item(&mut self, item: MissionItem) -> Result<()> {
        if self.downloaded {
            return Err(RoverError::AlreadyDownloaded);
        }
        let expected = self.items.len() as u16;
        if item.seq != expected {
            return Err(RoverError::SequenceMismatch {
                expected,
                found: item.seq,
            });
        }
        self.items.push(item);
        Ok(())
    }

    /// Derive the waypoint index and mark the plan downloaded.
    pub fn freeze(&mut self) {
        let mut waypoints: Vec<u16> = self
            .items
            .iter()
            .filter(|item| item.is_waypoint())
            .map(|item| item.seq)
            .collect();
        waypoints.sort_unstable();
        self.waypoints = waypoints;
        self.downloaded = true;
    }

    /// Fetch the plan through `transport`.
    ///
    /// On success the previous plan (if any) is replaced; on failure it is left
    /// untouched.
    pub async fn download(&mut self, transport: &dyn Transport, force: bool) -> Result<usize> {
        if self.downloaded && !force {
            return Err(RoverError::AlreadyDownloaded);
        }
        let fresh = Self::fetch(transport).await?;
        let count = fresh.len();
        *self = fresh;
        Ok(count)
    }

    /// Download a complete, frozen plan without touching any existing one.
    pub async fn fetch(transport: &dyn Transport) -> Result<Self> {
        let count = transport.request_mission_count().await?;
        debug!("{}: mission has {} item(s)", transport.name(), count);

        let mut fresh = MissionBlueprint::new();
        for seq in 0..count {
            let item = transport.request_mission_item(seq).await?;
            fresh.add_item(item)?;
        }
        transport.acknowledge_mission().await?;
        fresh.freeze();

        info!(
            "{}: downloaded {} mission item(s), {} waypoint(s)",
            transport.name(),
            fresh.len(),
            fresh.waypoint_count()
        );
        Ok(fresh)
    }

    pub fn is_downloaded(&self) -> bool {
        self.downloaded
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[MissionItem] {
        &self.items
    }

    pub fn item(&self, seq: u16) -> Option<&MissionItem> {
        self.items.get(seq as usize)
    }

    /// Waypoint sequence numbers, ascending.
    pub fn waypoints(&self) -> &[u16] {
        &self.waypoints
    }

    pub fn waypoint_count(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_waypoint(&self, seq: u16) -> bool {
        self.waypoints.binary_search(&seq).is_ok()
    }

    pub fn is_unlimited_loiter_item(&self, seq: u16) -> bool {
        self.item(seq)
            .is_some_and(|item| item.command == CommandKind::NavLoiterUnlim)
    }

    pub fn is_loiter_item(&self, seq: u16) -> bool {
        self.item(seq).is_some_and(|item| item.command.is_loiter())
    }

    pub fn loiter_items(&self) -> Vec<&MissionItem> {
        self.items
            .iter()
            .filter(|item| item.command.is_loiter())
            .collect()
    }

    pub fn first_waypoint(&self) -> Result<u16> {
        self.waypoints.first().copied().ok_or(RoverError::EmptyPlan)
    }

    pub fn final_waypoint(&self) -> Result<u16> {
        self.waypoints.last().copied().ok_or(RoverError::EmptyPlan)
    }

    /// First waypoint after `seq`; the final waypoint when none follows.
    pub fn next_waypoint(&self, seq: u16) -> Result<u16> {
        match self.waypoints.iter().find(|&&wp| wp > seq) {
            Some(&wp) => Ok(wp),
            None => self.final_waypoint(),
        }
    }

    pub fn is_mission_complete(&self, seq: u16) -> bool {
        seq as usize >= self.items.len()
    }
}
