//! Workers on the inbound side: link reader, mission progress, telemetry log.

use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use super::WorkerContext;
use crate::hub::{Cancellation, MeasurementRequest};
use crate::logutil::escape_log;
use crate::metrics;
use crate::mission::ProgressNotice;
use crate::protocol::InboundMessage;
use crate::transport::TransportError;

pub(super) async fn run_link_reader(ctx: Arc<WorkerContext>, cancel: Cancellation) {
    debug!("link reader started on {}", ctx.transport.name());
    while !cancel.is_cancelled() {
        let next = tokio::time::timeout(ctx.tuning.poll_interval, ctx.transport.recv_message()).await;
        match next {
            Err(_) => continue,
            Ok(Ok(message)) => {
                tokio::select! {
                    _ = ctx.distributor.distribute(message) => {}
                    _ = cancel.cancelled() => break,
                }
            }
            Ok(Err(TransportError::Disconnected)) => {
                error!("{}: link lost; stopping workers", ctx.transport.name());
                cancel.trip(format!("{} disconnected", ctx.transport.name()));
                break;
            }
            Ok(Err(e)) => {
                metrics::inc_inbound_dropped();
                warn!("{}: dropping inbound frame: {}", ctx.transport.name(), e);
            }
        }
    }
    debug!("link reader stopped");
}

pub(super) async fn run_mission_progress(ctx: Arc<WorkerContext>, cancel: Cancellation) {
    debug!("mission progress worker started");
    while !cancel.is_cancelled() {
        let Some(message) = ctx
            .hub
            .mission_message
            .recv_timeout(ctx.tuning.poll_interval)
            .await
        else {
            continue;
        };
        match ctx.mission.update_status(&message).await {
            Some(ProgressNotice::UnlimitedLoiter { mission_item }) => {
                let request = MeasurementRequest::new(mission_item);
                if !ctx
                    .hub
                    .measurement_request
                    .send_until_cancelled(request, &cancel)
                    .await
                {
                    break;
                }
            }
            Some(ProgressNotice::MissionComplete) => info!("mission complete"),
            Some(ProgressNotice::WaypointReached { seq }) => debug!("waypoint {} reached", seq),
            None => {}
        }
    }
    debug!("mission progress worker stopped");
}

pub(super) async fn run_telemetry_log(ctx: Arc<WorkerContext>, cancel: Cancellation) {
    while !cancel.is_cancelled() {
        if let Some(message) = ctx.hub.logging.recv_timeout(ctx.tuning.poll_interval).await {
            log_inbound(&message);
        }
    }
}

fn log_inbound(message: &InboundMessage) {
    match message {
        InboundMessage::StatusText { severity, text } => {
            info!(target: "telemetry", "STATUSTEXT sev={} {}", severity, escape_log(text))
        }
        InboundMessage::CommandAck(ack) => {
            debug!(target: "telemetry", "COMMAND_ACK {} {:?}", ack.command, ack.result)
        }
        InboundMessage::Heartbeat { .. } => trace!(target: "telemetry", "{:?}", message),
        other => debug!(target: "telemetry", "{:?}", other),
    }
}
