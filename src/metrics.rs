//! Process-wide dispatch counters.
//! Cheap relaxed atomics; read them through [`snapshot`].
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

static SYNC_SENT: AtomicU64 = AtomicU64::new(0);
static SYNC_ACCEPTED: AtomicU64 = AtomicU64::new(0);
static SYNC_FAILED: AtomicU64 = AtomicU64::new(0);
static SYNC_RETRIES: AtomicU64 = AtomicU64::new(0);
static ACK_LATENCY_SUM_MS: AtomicU64 = AtomicU64::new(0);
static ACK_LATENCY_COUNT: AtomicU64 = AtomicU64::new(0);
static ASYNC_SENT: AtomicU64 = AtomicU64::new(0);
static ASYNC_FAILED: AtomicU64 = AtomicU64::new(0);
static UNSOLICITED_ACKS: AtomicU64 = AtomicU64::new(0);
static STALE_ACKS: AtomicU64 = AtomicU64::new(0);
static STALE_RESULTS: AtomicU64 = AtomicU64::new(0);
static INBOUND_DROPPED: AtomicU64 = AtomicU64::new(0);
static MEASUREMENT_RESUMES: AtomicU64 = AtomicU64::new(0);

/// Each transmission of a sync command, retries included.
pub fn inc_sync_sent() {
    SYNC_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sync_accepted() {
    SYNC_ACCEPTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sync_failed() {
    SYNC_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_sync_retries() {
    SYNC_RETRIES.fetch_add(1, Ordering::Relaxed);
}
pub fn observe_ack_latency(sent_at: Instant) {
    let ms = sent_at.elapsed().as_millis() as u64;
    ACK_LATENCY_SUM_MS.fetch_add(ms, Ordering::Relaxed);
    ACK_LATENCY_COUNT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_async_sent() {
    ASYNC_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_async_failed() {
    ASYNC_FAILED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_unsolicited_acks() {
    UNSOLICITED_ACKS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_stale_acks() {
    STALE_ACKS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_stale_results() {
    STALE_RESULTS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_inbound_dropped() {
    INBOUND_DROPPED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_measurement_resumes() {
    MEASUREMENT_RESUMES.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct Snapshot {
    pub sync_sent: u64,
    pub sync_accepted: u64,
    pub sync_failed: u64,
    pub sync_retries: u64,
    pub ack_latency_avg_ms: Option<u64>,
    pub async_sent: u64,
    pub async_failed: u64,
    pub unsolicited_acks: u64,
    pub stale_acks: u64,
    pub stale_results: u64,
    pub inbound_dropped: u64,
    pub measurement_resumes: u64,
}

pub fn snapshot() -> Snapshot {
    let sum = ACK_LATENCY_SUM_MS.load(Ordering::Relaxed);
    let count = ACK_LATENCY_COUNT.load(Ordering::Relaxed);
    Snapshot {
        sync_sent: SYNC_SENT.load(Ordering::Relaxed),
        sync_accepted: SYNC_ACCEPTED.load(Ordering::Relaxed),
        sync_failed: SYNC_FAILED.load(Ordering::Relaxed),
        sync_retries: SYNC_RETRIES.load(Ordering::Relaxed),
        ack_latency_avg_ms: if count > 0 { Some(sum / count) } else { None },
        async_sent: ASYNC_SENT.load(Ordering::Relaxed),
        async_failed: ASYNC_FAILED.load(Ordering::Relaxed),
        unsolicited_acks: UNSOLICITED_ACKS.load(Ordering::Relaxed),
        stale_acks: STALE_ACKS.load(Ordering::Relaxed),
        stale_results: STALE_RESULTS.load(Ordering::Relaxed),
        inbound_dropped: INBOUND_DROPPED.load(Ordering::Relaxed),
        measurement_resumes: MEASUREMENT_RESUMES.load(Ordering::Relaxed),
    }
}
