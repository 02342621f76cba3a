//! Observability and Metrics
//!
//! Counters for the decode and correlation pipeline.
//!
//! Uses atomic counters so the capture thread can record while other threads
//! read snapshots without taking the session lock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Pipeline counters, one instance per capture session.
#[derive(Debug)]
pub struct Metrics {
    /// Raw payloads handed to the decoder
    pub packets_received: AtomicU64,
    /// Bytes across all raw payloads
    pub bytes_received: AtomicU64,
    /// Packets or messages skipped because they are encrypted
    pub encrypted_discarded: AtomicU64,
    /// Packets skipped because they carry a checksum
    pub crc_discarded: AtomicU64,
    /// Command headers parsed
    pub commands_processed: AtomicU64,
    /// Messages fully decoded
    pub messages_decoded: AtomicU64,
    /// Commands or messages abandoned on a decode error
    pub decode_errors: AtomicU64,
    /// Fragment commands seen
    pub fragments_received: AtomicU64,
    /// Fragment sequences reassembled
    pub fragments_completed: AtomicU64,
    /// Fragments rejected as malformed
    pub fragments_dropped: AtomicU64,
    /// Loot events emitted
    pub loot_events: AtomicU64,
    /// Correlation handlers that declined to act
    pub correlation_misses: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            packets_received: AtomicU64::new(0),
            bytes_received: AtomicU64::new(0),
            encrypted_discarded: AtomicU64::new(0),
            crc_discarded: AtomicU64::new(0),
            commands_processed: AtomicU64::new(0),
            messages_decoded: AtomicU64::new(0),
            decode_errors: AtomicU64::new(0),
            fragments_received: AtomicU64::new(0),
            fragments_completed: AtomicU64::new(0),
            fragments_dropped: AtomicU64::new(0),
            loot_events: AtomicU64::new(0),
            correlation_misses: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn packet_received(&self, byte_count: u64) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
        self.bytes_received.fetch_add(byte_count, Ordering::Relaxed);
    }

    pub fn encrypted_discarded(&self) {
        self.encrypted_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn crc_discarded(&self) {
        self.crc_discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn message_decoded(&self) {
        self.messages_decoded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_error(&self) {
        self.decode_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fragment_received(&self) {
        self.fragments_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fragment_completed(&self) {
        self.fragments_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn fragment_dropped(&self) {
        self.fragments_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn loot_event(&self) {
        self.loot_events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn correlation_miss(&self) {
        self.correlation_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            encrypted_discarded: self.encrypted_discarded.load(Ordering::Relaxed),
            crc_discarded: self.crc_discarded.load(Ordering::Relaxed),
            commands_processed: self.commands_processed.load(Ordering::Relaxed),
            messages_decoded: self.messages_decoded.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            fragments_received: self.fragments_received.load(Ordering::Relaxed),
            fragments_completed: self.fragments_completed.load(Ordering::Relaxed),
            fragments_dropped: self.fragments_dropped.load(Ordering::Relaxed),
            loot_events: self.loot_events.load(Ordering::Relaxed),
            correlation_misses: self.correlation_misses.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            packets_received = snapshot.packets_received,
            bytes_received = snapshot.bytes_received,
            encrypted_discarded = snapshot.encrypted_discarded,
            crc_discarded = snapshot.crc_discarded,
            commands_processed = snapshot.commands_processed,
            messages_decoded = snapshot.messages_decoded,
            decode_errors = snapshot.decode_errors,
            fragments_received = snapshot.fragments_received,
            fragments_completed = snapshot.fragments_completed,
            fragments_dropped = snapshot.fragments_dropped,
            loot_events = snapshot.loot_events,
            correlation_misses = snapshot.correlation_misses,
            uptime_seconds = snapshot.uptime_seconds,
            "Pipeline metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub packets_received: u64,
    pub bytes_received: u64,
    pub encrypted_discarded: u64,
    pub crc_discarded: u64,
    pub commands_processed: u64,
    pub messages_decoded: u64,
    pub decode_errors: u64,
    pub fragments_received: u64,
    pub fragments_completed: u64,
    pub fragments_dropped: u64,
    pub loot_events: u64,
    pub correlation_misses: u64,
    pub uptime_seconds: u64,
}
