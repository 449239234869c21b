//! # Command Dispatch Workers
//!
//! One tokio task per worker, all talking through the [`Hub`]:
//!
//! - **link reader** - transport -> [`MessageDistributor`]
//! - **mission progress** - `mission_message` -> [`MissionManager::update_status`],
//!   posting measurement requests when the vehicle holds at an unlimited loiter
//! - **telemetry log** - drains `logging`
//! - **sync dispatcher** - `sync_cmd` -> transport with ack correlation and retry,
//!   verdict on `sync_cmd_result`
//! - **async dispatcher** - `async_cmd` -> transport, fire and forget
//! - **measurement gate** - `measurement_request` + [`MeasurementSignal`] ->
//!   resume command on `async_cmd`
//!
//! Every wait is bounded by `poll_interval` so each worker re-checks the shared
//! [`Cancellation`] at least that often. [`WorkerSet::shutdown`] raises it and
//! joins the tasks with a per-worker timeout, sweeping until all have stopped.

mod commands;
mod inbound;
mod measurement;

use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::hub::{Cancellation, Hub};
use crate::link::MessageDistributor;
use crate::mission::MissionManager;
use crate::protocol::TargetIds;
use crate::transport::SharedTransport;

pub use measurement::MeasurementSignal;

/// Timing knobs for the workers, typically sourced from Config.
#[derive(Debug, Clone)]
pub struct DispatchTuning {
    /// Transmissions per sync command before giving up.
    pub max_attempts: u8,
    /// Per-attempt wait for a matching acknowledgment.
    pub ack_timeout: Duration,
    /// Upper bound on any single wait, so cancellation is noticed promptly.
    pub poll_interval: Duration,
    /// How long a caller waits on `sync_cmd_result`.
    pub result_timeout: Duration,
    /// Per-worker join timeout during shutdown sweeps.
    pub join_timeout: Duration,
}

impl Default for DispatchTuning {
    fn default() -> Self {
        Self::from_config(&DispatchConfig::default())
    }
}

impl DispatchTuning {
    pub fn from_config(cfg: &DispatchConfig) -> Self {
        let ack_timeout = Duration::from_millis(cfg.ack_timeout_ms);
        let max_attempts = cfg.max_attempts.max(1);
        // A caller must outlast every attempt, or the autopilot could accept a
        // jump the caller already reported as failed.
        let budget = ack_timeout * (max_attempts as u32 + 1);
        let result_timeout = match cfg.result_timeout_ms.map(Duration::from_millis) {
            Some(wait) if wait < budget => {
                warn!(
                    "result_timeout {:?} is shorter than the retry budget; using {:?}",
                    wait, budget
                );
                budget
            }
            Some(wait) => wait,
            None => budget,
        };
        Self {
            max_attempts,
            ack_timeout,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms.max(1)),
            result_timeout,
            join_timeout: Duration::from_millis(cfg.join_timeout_ms.max(1)),
        }
    }
}

/// Everything a worker needs. Shared by all workers of one set.
pub struct WorkerContext {
    pub hub: Arc<Hub>,
    pub distributor: Arc<MessageDistributor>,
    pub mission: Arc<MissionManager>,
    pub transport: SharedTransport,
    pub measurement: Arc<MeasurementSignal>,
    pub target: TargetIds,
    pub tuning: DispatchTuning,
}

/// A running generation of workers.
pub struct WorkerSet {
    generation: Uuid,
    cancel: Cancellation,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    started_at: Instant,
}

impl WorkerSet {
    pub fn spawn(ctx: WorkerContext) -> Self {
        let generation = Uuid::new_v4();
        let cancel = Cancellation::new();
        let ctx = Arc::new(ctx);
        let mut handles = Vec::with_capacity(6);

        macro_rules! launch {
            ($name:literal, $worker:path) => {{
                let ctx = ctx.clone();
                let cancel = cancel.clone();
                handles.push(($name, tokio::spawn(async move { $worker(ctx, cancel).await })));
            }};
        }
        launch!("link-reader", inbound::run_link_reader);
        launch!("mission-progress", inbound::run_mission_progress);
        launch!("telemetry-log", inbound::run_telemetry_log);
        launch!("sync-dispatcher", commands::run_sync_dispatcher);
        launch!("async-dispatcher", commands::run_async_dispatcher);
        launch!("measurement-gate", measurement::run_measurement_gate);

        info!(
            "worker set {} started on {} ({} workers)",
            generation,
            ctx.transport.name(),
            handles.len()
        );
        Self {
            generation,
            cancel,
            handles,
            started_at: Instant::now(),
        }
    }

    pub fn generation(&self) -> Uuid {
        self.generation
    }

    /// True while no worker has stopped and no fault has been raised.
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled() && self.handles.iter().all(|(_, h)| !h.is_finished())
    }

    pub fn fault(&self) -> Option<String> {
        self.cancel.fault()
    }

    /// Raise cancellation and join every worker, retrying stragglers.
    pub async fn shutdown(mut self, join_timeout: Duration) {
        self.cancel.cancel();
        let mut sweep = 0u32;
        while !self.handles.is_empty() {
            sweep += 1;
            let mut stragglers = Vec::new();
            for (name, mut handle) in self.handles.drain(..) {
                match tokio::time::timeout(join_timeout, &mut handle).await {
                    Ok(Ok(())) => debug!("worker {} stopped", name),
                    Ok(Err(e)) => warn!("worker {} ended abnormally: {}", name, e),
                    Err(_) => {
                        warn!("worker {} still running after sweep {}", name, sweep);
                        stragglers.push((name, handle));
                    }
                }
            }
            self.handles = stragglers;
        }
        info!(
            "worker set {} stopped after {:?}",
            self.generation,
            self.started_at.elapsed()
        );
    }
}

impl Drop for WorkerSet {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_timeout_never_undercuts_retry_budget() {
        let cfg = DispatchConfig {
            ack_timeout_ms: 60,
            result_timeout_ms: Some(100),
            ..DispatchConfig::default()
        };
        assert_eq!(
            DispatchTuning::from_config(&cfg).result_timeout,
            Duration::from_millis(360)
        );

        let cfg = DispatchConfig {
            result_timeout_ms: Some(9_000),
            ..DispatchConfig::default()
        };
        assert_eq!(
            DispatchTuning::from_config(&cfg).result_timeout,
            Duration::from_millis(9_000)
        );
        assert_eq!(
            DispatchTuning::default().result_timeout,
            Duration::from_millis(6_000)
        );
    }
}
