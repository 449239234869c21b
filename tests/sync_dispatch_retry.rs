#![cfg(feature = "simulator")]

mod common;

use std::sync::Arc;

use rovercore::errors::RoverError;
use rovercore::protocol::{AckResult, CommandKind};
use rovercore::transport::sim::{AckPolicy, SimulatedAutopilot};

#[tokio::test]
async fn accepted_on_attempt_k_sends_exactly_k_times() {
    for k in 1..=5u32 {
        let sim = Arc::new(SimulatedAutopilot::new("retry"));
        sim.set_policy(CommandKind::DoSetMode, AckPolicy::AcceptOnAttempt(k));
        let rover = common::started_rover(sim.clone()).await;

        rover
            .set_auto_mode()
            .await
            .unwrap_or_else(|e| panic!("attempt {k}: {e}"));
        assert_eq!(sim.transmissions_of(CommandKind::DoSetMode), k as usize);
        assert_eq!(sim.custom_mode(), 10);

        // Each retransmission carries the same ticket and a growing confirmation.
        let confirmations: Vec<u8> = sim
            .transmissions()
            .iter()
            .map(|c| c.confirmation)
            .collect();
        assert_eq!(confirmations, (0..k as u8).collect::<Vec<_>>());
        rover.shutdown().await;
    }
}

#[tokio::test]
async fn silent_autopilot_gets_five_transmissions_then_failure() {
    let sim = Arc::new(SimulatedAutopilot::new("silent").with_default_policy(AckPolicy::Silent));
    let rover = common::started_rover(sim.clone()).await;

    let err = rover.arm_vehicle().await.unwrap_err();
    assert!(matches!(
        err,
        RoverError::SyncCommandFailed {
            command: CommandKind::ComponentArmDisarm,
            attempts: 5
        }
    ));
    assert_eq!(sim.transmissions_of(CommandKind::ComponentArmDisarm), 5);
    assert!(!sim.is_armed());
    rover.shutdown().await;
}

#[tokio::test]
async fn explicit_rejection_is_retried_and_never_committed() {
    let sim = Arc::new(SimulatedAutopilot::new("denied"));
    sim.set_policy(CommandKind::ComponentArmDisarm, AckPolicy::Respond(AckResult::Denied));
    let rover = common::started_rover(sim.clone()).await;

    assert!(rover.arm_vehicle().await.is_err());
    assert_eq!(sim.transmissions_of(CommandKind::ComponentArmDisarm), 5);

    // A later command of another kind is unaffected by the failed one.
    rover.set_auto_mode().await.expect("mode accepted");
    assert_eq!(sim.transmissions_of(CommandKind::DoSetMode), 1);
    rover.shutdown().await;
}

#[tokio::test]
async fn sync_commands_need_running_workers() {
    let sim = Arc::new(SimulatedAutopilot::new("idle"));
    let rover = common::started_rover(sim.clone()).await;
    rover.shutdown().await;

    assert!(matches!(
        rover.disarm_vehicle().await,
        Err(RoverError::WorkersNotRunning)
    ));
    assert!(sim.transmissions().is_empty());
}

#[tokio::test]
async fn short_result_timeout_still_waits_out_every_attempt() {
    let mut config = common::fast_config();
    config.dispatch.result_timeout_ms = Some(100);
    let sim = Arc::new(
        SimulatedAutopilot::new("budget").with_mission(common::plan_with_waypoints(10, &[2, 5, 9])),
    );
    sim.set_policy(CommandKind::DoSetMissionCurrent, AckPolicy::AcceptOnAttempt(3));

    let rover = rovercore::rover::Rover::new(&config).unwrap();
    rover.set_transport(sim.clone(), false).await.unwrap();
    rover.initiate(false).await.unwrap();
    rover.load_mission(false).await.unwrap();

    assert_eq!(rover.move_to_next_waypoint().await.unwrap(), 5);
    assert_eq!(sim.transmissions_of(CommandKind::DoSetMissionCurrent), 3);
    assert_eq!(
        rover.report_mission_status().await.current_waypoint,
        Some(5)
    );
    rover.shutdown().await;
}
