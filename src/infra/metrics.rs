//! Lock-free service metrics and periodic reporting
//!
//! Uses atomics for request-path updates to avoid mutex contention.
//! Monotonic counters feed the Prometheus endpoint; interval counters are
//! swapped to zero by `report()`. `snapshot()` reads without resetting.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are
//! statistical counters only and never drive calculation results.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Exponential bucket boundaries (microseconds)
/// Buckets: ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, ≤25600, ≤51200, >51200
pub const METRICS_BUCKET_BOUNDS: [u64; 10] =
    [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200];
pub const METRICS_NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_us: u64) -> usize {
    METRICS_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_us)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; METRICS_NUM_BUCKETS]) -> [u64; METRICS_NUM_BUCKETS] {
    std::array::from_fn(|i| buckets[i].load(Ordering::Relaxed))
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; METRICS_NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; METRICS_NUM_BUCKETS] =
        [100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600, 51200, 102400];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[METRICS_NUM_BUCKETS - 1]
}

/// Outcome of one `/api/calculate` request, as seen by metrics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    Succeeded,
    /// Body failed boundary validation (400)
    Rejected,
    /// Fatal calculation error (500)
    Failed,
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Total calculation requests (monotonic)
    requests_total: AtomicU64,
    /// Requests since last report (reset on report)
    requests_since_report: AtomicU64,
    calculations_succeeded: AtomicU64,
    requests_rejected: AtomicU64,
    calculations_failed: AtomicU64,
    /// Routes attributed across all successful calculations (monotonic)
    routes_attributed: AtomicU64,
    campaigns_computed: AtomicU64,
    warnings_emitted: AtomicU64,
    impressions_attributed: AtomicU64,
    /// Calculation latency histogram (monotonic, for Prometheus)
    latency_buckets: [AtomicU64; METRICS_NUM_BUCKETS],
    /// Sum of latencies in microseconds (monotonic)
    latency_sum_us: AtomicU64,
    /// Sum of latencies since last report (reset on report)
    interval_latency_sum_us: AtomicU64,
    /// Max latency since last report (reset on report)
    interval_latency_max_us: AtomicU64,
    /// Last report time (only accessed from the reporter)
    last_report_time: Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            requests_total: AtomicU64::new(0),
            requests_since_report: AtomicU64::new(0),
            calculations_succeeded: AtomicU64::new(0),
            requests_rejected: AtomicU64::new(0),
            calculations_failed: AtomicU64::new(0),
            routes_attributed: AtomicU64::new(0),
            campaigns_computed: AtomicU64::new(0),
            warnings_emitted: AtomicU64::new(0),
            impressions_attributed: AtomicU64::new(0),
            latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            latency_sum_us: AtomicU64::new(0),
            interval_latency_sum_us: AtomicU64::new(0),
            interval_latency_max_us: AtomicU64::new(0),
            last_report_time: Mutex::new(Instant::now()),
        }
    }

    /// Record the outcome and latency of one calculation request
    #[inline]
    pub fn record_request(&self, outcome: RequestOutcome, latency_us: u64) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
        self.requests_since_report.fetch_add(1, Ordering::Relaxed);

        let counter = match outcome {
            RequestOutcome::Succeeded => &self.calculations_succeeded,
            RequestOutcome::Rejected => &self.requests_rejected,
            RequestOutcome::Failed => &self.calculations_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        self.latency_buckets[bucket_index(latency_us)].fetch_add(1, Ordering::Relaxed);
        self.latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        self.interval_latency_sum_us.fetch_add(latency_us, Ordering::Relaxed);
        update_atomic_max(&self.interval_latency_max_us, latency_us);
    }

    /// Record the size of a successful calculation
    #[inline]
    pub fn record_calculation(
        &self,
        routes: usize,
        campaigns: usize,
        warnings: usize,
        impressions: u64,
    ) {
        self.routes_attributed.fetch_add(routes as u64, Ordering::Relaxed);
        self.campaigns_computed.fetch_add(campaigns as u64, Ordering::Relaxed);
        self.warnings_emitted.fetch_add(warnings as u64, Ordering::Relaxed);
        self.impressions_attributed.fetch_add(impressions, Ordering::Relaxed);
    }

    /// Snapshot for the periodic log line; interval counters are reset
    pub fn report(&self) -> MetricsSummary {
        let now = Instant::now();
        let elapsed_secs = {
            let mut last = self.last_report_time.lock();
            let secs = now.duration_since(*last).as_secs_f64();
            *last = now;
            secs
        };

        self.summarize(
            elapsed_secs,
            self.requests_since_report.swap(0, Ordering::Relaxed),
            self.interval_latency_sum_us.swap(0, Ordering::Relaxed),
            self.interval_latency_max_us.swap(0, Ordering::Relaxed),
        )
    }

    /// Snapshot for scrapes; leaves the reporter's interval state untouched
    pub fn snapshot(&self) -> MetricsSummary {
        let elapsed_secs = self.last_report_time.lock().elapsed().as_secs_f64();

        self.summarize(
            elapsed_secs,
            self.requests_since_report.load(Ordering::Relaxed),
            self.interval_latency_sum_us.load(Ordering::Relaxed),
            self.interval_latency_max_us.load(Ordering::Relaxed),
        )
    }

    fn summarize(
        &self,
        elapsed_secs: f64,
        interval_requests: u64,
        interval_latency_sum: u64,
        interval_latency_max: u64,
    ) -> MetricsSummary {
        let lat_buckets = load_buckets(&self.latency_buckets);

        MetricsSummary {
            requests_total: self.requests_total.load(Ordering::Relaxed),
            requests_per_sec: if elapsed_secs > 0.0 {
                interval_requests as f64 / elapsed_secs
            } else {
                0.0
            },
            calculations_succeeded: self.calculations_succeeded.load(Ordering::Relaxed),
            requests_rejected: self.requests_rejected.load(Ordering::Relaxed),
            calculations_failed: self.calculations_failed.load(Ordering::Relaxed),
            routes_attributed: self.routes_attributed.load(Ordering::Relaxed),
            campaigns_computed: self.campaigns_computed.load(Ordering::Relaxed),
            warnings_emitted: self.warnings_emitted.load(Ordering::Relaxed),
            impressions_attributed: self.impressions_attributed.load(Ordering::Relaxed),
            latency_sum_us: self.latency_sum_us.load(Ordering::Relaxed),
            avg_latency_us: interval_latency_sum.checked_div(interval_requests).unwrap_or(0),
            max_latency_us: interval_latency_max,
            lat_p50_us: percentile_from_buckets(&lat_buckets, 0.50),
            lat_p95_us: percentile_from_buckets(&lat_buckets, 0.95),
            lat_p99_us: percentile_from_buckets(&lat_buckets, 0.99),
            lat_buckets,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub requests_total: u64,
    pub requests_per_sec: f64,
    pub calculations_succeeded: u64,
    pub requests_rejected: u64,
    pub calculations_failed: u64,
    pub routes_attributed: u64,
    pub campaigns_computed: u64,
    pub warnings_emitted: u64,
    pub impressions_attributed: u64,
    pub latency_sum_us: u64,
    pub avg_latency_us: u64,
    pub max_latency_us: u64,
    pub lat_p50_us: u64,
    pub lat_p95_us: u64,
    pub lat_p99_us: u64,
    pub lat_buckets: [u64; METRICS_NUM_BUCKETS],
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            requests_total = %self.requests_total,
            requests_per_sec = %format!("{:.2}", self.requests_per_sec),
            succeeded = %self.calculations_succeeded,
            rejected = %self.requests_rejected,
            failed = %self.calculations_failed,
            routes = %self.routes_attributed,
            campaigns = %self.campaigns_computed,
            warnings = %self.warnings_emitted,
            impressions = %self.impressions_attributed,
            avg_latency_us = %self.avg_latency_us,
            max_latency_us = %self.max_latency_us,
            lat_p50_us = %self.lat_p50_us,
            lat_p95_us = %self.lat_p95_us,
            lat_p99_us = %self.lat_p99_us,
            "metrics"
        );
    }
}
