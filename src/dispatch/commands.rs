//! Sync and async command dispatchers.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, error, info, warn};

use super::WorkerContext;
use crate::hub::{Cancellation, SyncOutcome};
use crate::metrics;
use crate::protocol::{AckResult, CommandRecord};
use crate::transport::TransportError;

pub(super) async fn run_sync_dispatcher(ctx: Arc<WorkerContext>, cancel: Cancellation) {
    debug!("sync dispatcher started");
    while !cancel.is_cancelled() {
        let Some(command) = ctx.hub.sync_cmd.recv_timeout(ctx.tuning.poll_interval).await else {
            continue;
        };
        let outcome = dispatch_with_retry(&ctx, &cancel, &command).await;
        if !ctx.hub.sync_cmd_result.send_until_cancelled(outcome, &cancel).await {
            break;
        }
    }
    debug!("sync dispatcher stopped");
}

/// Transmit `command` until it is accepted or `max_attempts` is used up.
///
/// Each attempt registers on the distributor's ledger, transmits a copy with the
/// confirmation counter bumped, and waits up to `ack_timeout` for an ack carrying
/// this ticket. Only `Accepted` succeeds. `InProgress` keeps the current attempt
/// waiting for a final answer inside the same window; any other result ends it.
async fn dispatch_with_retry(
    ctx: &WorkerContext,
    cancel: &Cancellation,
    command: &CommandRecord,
) -> SyncOutcome {
    let max_attempts = ctx.tuning.max_attempts.max(1);
    let first_sent = Instant::now();
    let mut attempts = 0u8;
    let mut accepted = false;

    'attempts: while attempts < max_attempts && !cancel.is_cancelled() {
        attempts += 1;
        let frame = command.retransmission(attempts);
        ctx.distributor
            .register_outstanding(command.ticket, command.command);
        metrics::inc_sync_sent();
        if attempts > 1 {
            metrics::inc_sync_retries();
        }
        if let Err(e) = ctx.transport.send_command(&frame).await {
            warn!(
                "{} (ticket {}) attempt {}/{}: send failed: {}",
                command.command, command.ticket, attempts, max_attempts, e
            );
            if matches!(e, TransportError::Disconnected) {
                cancel.trip(format!("transport disconnected while sending {}", command.command));
                break;
            }
            continue;
        }

        let deadline = Instant::now() + ctx.tuning.ack_timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                debug!(
                    "{} (ticket {}) attempt {}/{}: no ack",
                    command.command, command.ticket, attempts, max_attempts
                );
                break;
            }
            let Some(reply) = ctx.hub.sync_cmd_ack.recv_timeout(remaining).await else {
                continue;
            };
            if reply.ticket != command.ticket {
                metrics::inc_stale_acks();
                debug!("ignoring ack for stale ticket {}", reply.ticket);
                continue;
            }
            match reply.ack.result {
                AckResult::Accepted => {
                    metrics::observe_ack_latency(first_sent);
                    accepted = true;
                    break 'attempts;
                }
                AckResult::InProgress => {
                    // Wait for the final result, which needs the entry back on the ledger.
                    ctx.distributor
                        .register_outstanding(command.ticket, command.command);
                }
                other => {
                    warn!(
                        "{} (ticket {}) attempt {}/{}: {:?}",
                        command.command, command.ticket, attempts, max_attempts, other
                    );
                    break;
                }
            }
        }
    }

    ctx.distributor.retire(command.ticket);
    if accepted {
        metrics::inc_sync_accepted();
        info!("{} accepted after {} attempt(s)", command.command, attempts);
    } else {
        metrics::inc_sync_failed();
        error!("{} failed after {} attempt(s)", command.command, attempts);
    }
    SyncOutcome {
        ticket: command.ticket,
        command: command.command,
        accepted,
        attempts,
    }
}

pub(super) async fn run_async_dispatcher(ctx: Arc<WorkerContext>, cancel: Cancellation) {
    debug!("async dispatcher started");
    while !cancel.is_cancelled() {
        if let Some(command) = ctx.hub.async_cmd.recv_timeout(ctx.tuning.poll_interval).await {
            match ctx.transport.send_command(&command).await {
                Ok(()) => {
                    metrics::inc_async_sent();
                    debug!("async {} sent (ticket {})", command.command, command.ticket);
                }
                Err(TransportError::Disconnected) => {
                    cancel.trip(format!("transport disconnected while sending {}", command.command));
                    break;
                }
                Err(e) => {
                    metrics::inc_async_failed();
                    warn!("async {} send failed: {}", command.command, e);
                }
            }
        }
        while let Some(ack) = ctx.hub.async_cmd_ack.try_recv() {
            if ack.result.is_accepted() {
                debug!("async {} acknowledged", ack.command);
            } else {
                warn!("async {} answered {:?}", ack.command, ack.result);
            }
        }
    }
    debug!("async dispatcher stopped");
}
