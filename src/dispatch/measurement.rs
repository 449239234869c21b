//! Sensor-measurement gate.
//!
//! When the vehicle holds at an unlimited loiter item the mission progress
//! worker posts a [`MeasurementRequest`]. The gate waits for the external
//! sensing subsystem to raise the [`MeasurementSignal`], clears it, and queues a
//! jump to the item after the loiter so the vehicle drives on.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{debug, info};
use tokio::sync::Notify;

use super::WorkerContext;
use crate::hub::Cancellation;
use crate::metrics;
use crate::protocol::CommandRecord;

/// Edge-triggered "measurement done" flag. Stays raised until cleared.
#[derive(Debug, Default)]
pub struct MeasurementSignal {
    raised: AtomicBool,
    notify: Notify,
}

impl MeasurementSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.raised.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    pub fn clear(&self) {
        self.raised.store(false, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::SeqCst)
    }

    /// Wait at most `timeout` for the signal. Returns whether it is raised.
    pub async fn wait_raised(&self, timeout: Duration) -> bool {
        // Register before reading the flag so a raise in between still wakes us.
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        if self.is_raised() {
            return true;
        }
        let _ = tokio::time::timeout(timeout, notified).await;
        self.is_raised()
    }
}

pub(super) async fn run_measurement_gate(ctx: Arc<WorkerContext>, cancel: Cancellation) {
    debug!("measurement gate started");
    'requests: while !cancel.is_cancelled() {
        let Some(request) = ctx
            .hub
            .measurement_request
            .recv_timeout(ctx.tuning.poll_interval)
            .await
        else {
            continue;
        };
        info!(
            "holding at mission item {}; waiting for measurement",
            request.mission_item
        );
        while !ctx.measurement.wait_raised(ctx.tuning.poll_interval).await {
            if cancel.is_cancelled() {
                break 'requests;
            }
        }
        ctx.measurement.clear();

        let resume = request.mission_item.saturating_add(1);
        let command = CommandRecord::set_mission_current(ctx.target, resume);
        if !ctx.hub.async_cmd.send_until_cancelled(command, &cancel).await {
            break;
        }
        metrics::inc_measurement_resumes();
        info!(
            "measurement at item {} done after {:?}; resuming at item {}",
            request.mission_item,
            request.requested_at.elapsed(),
            resume
        );
    }
    debug!("measurement gate stopped");
}
