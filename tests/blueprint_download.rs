#![cfg(feature = "simulator")]

mod common;

use rovercore::errors::RoverError;
use rovercore::mission::MissionBlueprint;
use rovercore::protocol::{CommandKind, MissionItem};
use rovercore::transport::sim::SimulatedAutopilot;
use rovercore::transport::TransportError;

#[tokio::test]
async fn download_freezes_plan_and_acknowledges() {
    let sim = SimulatedAutopilot::new("dl").with_mission(common::plan_with_waypoints(5, &[1, 4]));
    let mut bp = MissionBlueprint::new();

    assert_eq!(bp.download(&sim, false).await.unwrap(), 5);
    assert!(bp.is_downloaded());
    assert_eq!(bp.waypoints(), &[1, 4]);
    assert_eq!(sim.mission_acknowledgements(), 1);
    assert!(matches!(
        bp.add_item(MissionItem::new(5, CommandKind::NavWaypoint)),
        Err(RoverError::AlreadyDownloaded)
    ));
}

#[tokio::test]
async fn redownload_needs_force_and_replaces_everything() {
    let sim = SimulatedAutopilot::new("dl").with_mission(common::plan_with_waypoints(5, &[1, 4]));
    let mut bp = MissionBlueprint::new();
    bp.download(&sim, false).await.unwrap();

    sim.replace_mission(common::plan_with_waypoints(3, &[2]));
    assert!(matches!(
        bp.download(&sim, false).await,
        Err(RoverError::AlreadyDownloaded)
    ));
    assert_eq!(bp.len(), 5);

    bp.download(&sim, true).await.unwrap();
    assert_eq!(bp.len(), 3);
    assert_eq!(bp.waypoints(), &[2]);
    assert_eq!(sim.mission_acknowledgements(), 2);
}

#[tokio::test]
async fn failed_forced_download_keeps_previous_plan() {
    let sim = SimulatedAutopilot::new("dl").with_mission(common::plan_with_waypoints(4, &[0, 3]));
    let mut bp = MissionBlueprint::new();
    bp.download(&sim, false).await.unwrap();

    // Autopilot answers item 1 with the wrong sequence number.
    let mut broken = common::plan_with_waypoints(4, &[0, 3]);
    broken[1].seq = 7;
    sim.replace_mission(broken);
    assert!(matches!(
        bp.download(&sim, true).await,
        Err(RoverError::SequenceMismatch {
            expected: 1,
            found: 7
        })
    ));
    assert_eq!(bp.waypoints(), &[0, 3]);

    sim.disconnect();
    assert!(matches!(
        bp.download(&sim, true).await,
        Err(RoverError::Transport(TransportError::Disconnected))
    ));
    assert_eq!(bp.len(), 4);
}
