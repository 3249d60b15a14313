//! Prometheus metrics (lock-free atomics, zero allocation on hot path).

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

pub static METRICS: Metrics = Metrics::new();

pub struct Metrics {
    // --- Reads ---
    pub reads_ok: AtomicU64,
    pub read_errors: AtomicU64,
    pub read_timeouts: AtomicU64,

    // --- Refresh cycles ---
    pub refresh_total: AtomicU64,
    pub refresh_skipped: AtomicU64,
    pub refresh_duration_us_sum: AtomicU64,
    pub refresh_duration_us_max: AtomicU64,

    // --- Purchases ---
    pub purchases_submitted: AtomicU64,
    pub purchases_confirmed: AtomicU64,
    pub purchases_failed: AtomicU64,
    pub rejections: AtomicU64,

    // --- RPC ---
    pub rpc_failovers: AtomicU64,
    pub rpc_errors: AtomicU64,
}

impl Metrics {
    const fn new() -> Self {
        Self {
            reads_ok: AtomicU64::new(0),
            read_errors: AtomicU64::new(0),
            read_timeouts: AtomicU64::new(0),
            refresh_total: AtomicU64::new(0),
            refresh_skipped: AtomicU64::new(0),
            refresh_duration_us_sum: AtomicU64::new(0),
            refresh_duration_us_max: AtomicU64::new(0),
            purchases_submitted: AtomicU64::new(0),
            purchases_confirmed: AtomicU64::new(0),
            purchases_failed: AtomicU64::new(0),
            rejections: AtomicU64::new(0),
            rpc_failovers: AtomicU64::new(0),
            rpc_errors: AtomicU64::new(0),
        }
    }

    pub fn record_refresh_duration(&self, start: Instant) {
        let us = start.elapsed().as_micros() as u64;
        self.refresh_total.fetch_add(1, Ordering::Relaxed);
        self.refresh_duration_us_sum.fetch_add(us, Ordering::Relaxed);
        // CAS loop for max tracking
        let mut cur = self.refresh_duration_us_max.load(Ordering::Relaxed);
        while us > cur {
            match self.refresh_duration_us_max.compare_exchange_weak(
                cur,
                us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => cur = actual,
            }
        }
    }

    /// Render in Prometheus text exposition format.
    pub fn render(&self, sequence: u64) -> String {
        let reads_ok = self.reads_ok.load(Ordering::Relaxed);
        let read_errors = self.read_errors.load(Ordering::Relaxed);
        let read_timeouts = self.read_timeouts.load(Ordering::Relaxed);
        let refresh_total = self.refresh_total.load(Ordering::Relaxed);
        let refresh_skipped = self.refresh_skipped.load(Ordering::Relaxed);
        let refresh_dur_sum = self.refresh_duration_us_sum.load(Ordering::Relaxed);
        let refresh_dur_max = self.refresh_duration_us_max.swap(0, Ordering::Relaxed);
        let submitted = self.purchases_submitted.load(Ordering::Relaxed);
        let confirmed = self.purchases_confirmed.load(Ordering::Relaxed);
        let failed = self.purchases_failed.load(Ordering::Relaxed);
        let rejections = self.rejections.load(Ordering::Relaxed);
        let rpc_failovers = self.rpc_failovers.load(Ordering::Relaxed);
        let rpc_errors = self.rpc_errors.load(Ordering::Relaxed);

        // Convert μs to seconds for Prometheus conventions
        let refresh_dur_sum_s = refresh_dur_sum as f64 / 1_000_000.0;
        let refresh_dur_max_s = refresh_dur_max as f64 / 1_000_000.0;

        format!(
            "\
# HELP auction_reads_ok_total Ledger reads that resolved.\n\
# TYPE auction_reads_ok_total counter\n\
auction_reads_ok_total {reads_ok}\n\
# HELP auction_read_errors_total Ledger reads that failed (timeouts included).\n\
# TYPE auction_read_errors_total counter\n\
auction_read_errors_total {read_errors}\n\
# HELP auction_read_timeouts_total Ledger reads that hit the read timeout.\n\
# TYPE auction_read_timeouts_total counter\n\
auction_read_timeouts_total {read_timeouts}\n\
# HELP auction_refresh_total Completed refresh cycles.\n\
# TYPE auction_refresh_total counter\n\
auction_refresh_total {refresh_total}\n\
# HELP auction_refresh_skipped_total Refreshes skipped because one was running.\n\
# TYPE auction_refresh_skipped_total counter\n\
auction_refresh_skipped_total {refresh_skipped}\n\
# HELP auction_refresh_duration_seconds_sum Total refresh time (seconds).\n\
# TYPE auction_refresh_duration_seconds_sum counter\n\
auction_refresh_duration_seconds_sum {refresh_dur_sum_s:.6}\n\
# HELP auction_refresh_duration_seconds_max Max refresh time since last scrape (seconds).\n\
# TYPE auction_refresh_duration_seconds_max gauge\n\
auction_refresh_duration_seconds_max {refresh_dur_max_s:.6}\n\
# HELP auction_snapshot_sequence Sequence of the latest published snapshot.\n\
# TYPE auction_snapshot_sequence gauge\n\
auction_snapshot_sequence {sequence}\n\
# HELP auction_purchases_submitted_total Purchases sent to the ledger.\n\
# TYPE auction_purchases_submitted_total counter\n\
auction_purchases_submitted_total {submitted}\n\
# HELP auction_purchases_confirmed_total Purchases with a successful receipt.\n\
# TYPE auction_purchases_confirmed_total counter\n\
auction_purchases_confirmed_total {confirmed}\n\
# HELP auction_purchases_failed_total Purchases that failed after sending.\n\
# TYPE auction_purchases_failed_total counter\n\
auction_purchases_failed_total {failed}\n\
# HELP auction_rejections_total Purchases refused by validation.\n\
# TYPE auction_rejections_total counter\n\
auction_rejections_total {rejections}\n\
# HELP auction_rpc_failovers_total RPC primary-to-fallback failovers.\n\
# TYPE auction_rpc_failovers_total counter\n\
auction_rpc_failovers_total {rpc_failovers}\n\
# HELP auction_rpc_errors_total RPC errors.\n\
# TYPE auction_rpc_errors_total counter\n\
auction_rpc_errors_total {rpc_errors}\n"
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_exposes_every_counter() {
        let out = METRICS.render(42);
        for name in [
            "auction_reads_ok_total",
            "auction_read_errors_total",
            "auction_read_timeouts_total",
            "auction_refresh_total",
            "auction_refresh_skipped_total",
            "auction_purchases_submitted_total",
            "auction_purchases_confirmed_total",
            "auction_purchases_failed_total",
            "auction_rejections_total",
            "auction_rpc_failovers_total",
        ] {
            assert!(out.contains(&format!("# TYPE {name} counter")), "{name}");
        }
        assert!(out.contains("auction_snapshot_sequence 42\n"));
    }

    #[test]
    fn test_max_duration_resets_on_render() {
        let metrics = Metrics::new();
        metrics.record_refresh_duration(Instant::now());
        assert_eq!(metrics.refresh_total.load(Ordering::Relaxed), 1);
        metrics.refresh_duration_us_max.store(2_500_000, Ordering::Relaxed);
        assert!(metrics.render(0).contains("auction_refresh_duration_seconds_max 2.500000"));
        assert!(metrics.render(0).contains("auction_refresh_duration_seconds_max 0.000000"));
    }
}
