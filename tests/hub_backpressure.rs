use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rovercore::errors::RoverError;
use rovercore::hub::{ChannelName, Hub, SyncOutcome};
use rovercore::protocol::{CommandKind, CommandRecord, InboundMessage, TargetIds};

fn small_hub() -> Hub {
    let mut caps = HashMap::new();
    caps.insert(ChannelName::Logging, 2);
    Hub::new(&caps)
}

#[tokio::test]
async fn full_channel_blocks_sender_until_drained() {
    let hub = Arc::new(small_hub());
    hub.logging.send(InboundMessage::MissionCurrent { seq: 1 }).await;
    hub.logging.send(InboundMessage::MissionCurrent { seq: 2 }).await;

    let blocked = tokio::time::timeout(
        Duration::from_millis(50),
        hub.logging.send(InboundMessage::MissionCurrent { seq: 3 }),
    )
    .await;
    assert!(blocked.is_err(), "third send should wait on a full channel");

    let sender = {
        let hub = hub.clone();
        tokio::spawn(async move {
            hub.logging
                .send(InboundMessage::MissionCurrent { seq: 3 })
                .await
        })
    };
    let first = hub.logging.recv_timeout(Duration::from_millis(50)).await;
    assert_eq!(first, Some(InboundMessage::MissionCurrent { seq: 1 }));
    tokio::time::timeout(Duration::from_secs(1), sender)
        .await
        .expect("sender should finish once space frees up")
        .unwrap();

    // FIFO order is preserved; nothing was dropped.
    assert_eq!(
        hub.logging.recv_timeout(Duration::from_millis(50)).await,
        Some(InboundMessage::MissionCurrent { seq: 2 })
    );
    assert_eq!(
        hub.logging.recv_timeout(Duration::from_millis(50)).await,
        Some(InboundMessage::MissionCurrent { seq: 3 })
    );
}

/// Stand-in for the sync dispatcher: answers every queued command with `accepted`.
fn fake_dispatcher(hub: Arc<Hub>, accepted: bool) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(cmd) = hub.sync_cmd.recv_timeout(Duration::from_secs(1)).await {
            hub.sync_cmd_result
                .send(SyncOutcome {
                    ticket: cmd.ticket,
                    command: cmd.command,
                    accepted,
                    attempts: 5,
                })
                .await;
        }
    })
}

#[tokio::test]
async fn round_trip_discards_stale_results() {
    let hub = Arc::new(Hub::default());
    hub.sync_cmd_result
        .send(SyncOutcome {
            ticket: 0,
            command: CommandKind::DoSetMode,
            accepted: true,
            attempts: 1,
        })
        .await;
    let _dispatcher = fake_dispatcher(hub.clone(), true);

    let cmd = CommandRecord::set_mission_current(TargetIds::default(), 4);
    let ticket = cmd.ticket;
    let outcome = hub
        .round_trip(cmd, Duration::from_secs(1))
        .await
        .expect("accepted");
    assert_eq!(outcome.ticket, ticket);
    assert!(hub.sync_cmd_result.is_empty());
}

#[tokio::test]
async fn round_trip_reports_rejection_with_attempts() {
    let hub = Arc::new(Hub::default());
    let _dispatcher = fake_dispatcher(hub.clone(), false);

    let err = hub
        .round_trip(
            CommandRecord::arm(TargetIds::default(), false),
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RoverError::SyncCommandFailed {
            command: CommandKind::ComponentArmDisarm,
            attempts: 5
        }
    ));
}

#[tokio::test]
async fn concurrent_round_trips_each_get_their_own_result() {
    let hub = Arc::new(Hub::default());
    let _dispatcher = fake_dispatcher(hub.clone(), true);

    let mut tasks = Vec::new();
    for seq in 0..4u16 {
        let hub = hub.clone();
        tasks.push(tokio::spawn(async move {
            let cmd = CommandRecord::set_mission_current(TargetIds::default(), seq);
            let ticket = cmd.ticket;
            let outcome = hub.round_trip(cmd, Duration::from_secs(2)).await.unwrap();
            assert_eq!(outcome.ticket, ticket);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
}
