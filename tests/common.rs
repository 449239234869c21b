//! Test utilities & fixtures.
//! Fast dispatch timings and small mission plans shared by the integration tests.

use std::future::Future;
use std::time::Duration;

use rovercore::config::Config;
use rovercore::protocol::{CommandKind, MissionItem};

/// Config with timeouts short enough for tests but still well above scheduler jitter.
#[allow(dead_code)]
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.dispatch.ack_timeout_ms = 60;
    config.dispatch.poll_interval_ms = 10;
    config.dispatch.result_timeout_ms = Some(2_000);
    config.dispatch.join_timeout_ms = 200;
    config
}

/// Plan of `len` items where the listed sequence numbers are waypoints and
/// every other item is a speed change.
#[allow(dead_code)]
pub fn plan_with_waypoints(len: u16, waypoints: &[u16]) -> Vec<MissionItem> {
    (0..len)
        .map(|seq| {
            if waypoints.contains(&seq) {
                MissionItem::waypoint(seq, 35.0 + seq as f64 * 1e-4, 139.0)
            } else {
                MissionItem::new(seq, CommandKind::DoChangeSpeed)
            }
        })
        .collect()
}

/// Poll `check` every 10ms until it holds or `timeout` passes.
#[allow(dead_code)]
pub async fn wait_until<F, Fut>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check().await {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

#[cfg(feature = "simulator")]
#[allow(dead_code)]
pub async fn started_rover(
    sim: std::sync::Arc<rovercore::transport::sim::SimulatedAutopilot>,
) -> rovercore::rover::Rover {
    let rover = rovercore::rover::Rover::new(&fast_config()).expect("rover");
    rover.set_transport(sim, false).await.expect("transport");
    rover.initiate(false).await.expect("initiate");
    rover
}
