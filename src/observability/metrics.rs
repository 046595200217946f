//! Metrics collection for API calls.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Metrics collector for VK API calls
#[derive(Debug)]
pub struct MetricsCollector {
    /// Call counters by method
    call_counts: RwLock<HashMap<String, AtomicU64>>,
    /// Failed calls by method
    error_counts: RwLock<HashMap<String, AtomicU64>>,
    /// Latency histograms by method
    latencies: RwLock<HashMap<String, LatencyHistogram>>,
    /// Retries by method
    retry_counts: RwLock<HashMap<String, AtomicU64>>,
    /// Remediation rounds by method
    remediation_counts: RwLock<HashMap<String, AtomicU64>>,
    /// Retries across all methods
    retries: AtomicU64,
    /// Remediation rounds across all methods
    remediations: AtomicU64,
    /// Governor waits and their total duration
    rate_waits: AtomicU64,
    rate_wait_ms: AtomicU64,
    /// Calls in flight
    active_calls: AtomicU64,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            call_counts: RwLock::new(HashMap::new()),
            error_counts: RwLock::new(HashMap::new()),
            latencies: RwLock::new(HashMap::new()),
            retry_counts: RwLock::new(HashMap::new()),
            remediation_counts: RwLock::new(HashMap::new()),
            retries: AtomicU64::new(0),
            remediations: AtomicU64::new(0),
            rate_waits: AtomicU64::new(0),
            rate_wait_ms: AtomicU64::new(0),
            active_calls: AtomicU64::new(0),
        }
    }

    fn bump(map: &RwLock<HashMap<String, AtomicU64>>, method: &str) {
        if let Some(counter) = map.read().get(method) {
            counter.fetch_add(1, Ordering::Relaxed);
            return;
        }
        map.write()
            .entry(method.to_string())
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    fn read(map: &RwLock<HashMap<String, AtomicU64>>, method: &str) -> u64 {
        map.read()
            .get(method)
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Record a call start.
    ///
    /// The call counts as active until the returned guard is dropped, so a
    /// caller that abandons the call future still releases the gauge.
    pub fn record_call_start(&self, method: &str) -> ActiveCall<'_> {
        self.active_calls.fetch_add(1, Ordering::Relaxed);
        Self::bump(&self.call_counts, method);
        ActiveCall {
            metrics: self,
            method: method.to_string(),
        }
    }

    fn record_call_end(&self, method: &str, duration_ms: u64, success: bool) {
        self.latencies
            .write()
            .entry(method.to_string())
            .or_insert_with(LatencyHistogram::new)
            .record(duration_ms);

        if !success {
            Self::bump(&self.error_counts, method);
        }
    }

    /// Record a retry of `method`
    pub fn record_retry(&self, method: &str) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        Self::bump(&self.retry_counts, method);
    }

    /// Record a remediation round for `method`
    pub fn record_remediation(&self, method: &str) {
        self.remediations.fetch_add(1, Ordering::Relaxed);
        Self::bump(&self.remediation_counts, method);
    }

    /// Record time spent waiting for a rate slot
    pub fn record_rate_wait(&self, wait: Duration) {
        if wait.is_zero() {
            return;
        }
        self.rate_waits.fetch_add(1, Ordering::Relaxed);
        self.rate_wait_ms
            .fetch_add(wait.as_millis() as u64, Ordering::Relaxed);
    }

    /// Total calls for a method
    pub fn call_count(&self, method: &str) -> u64 {
        Self::read(&self.call_counts, method)
    }

    /// Failed calls for a method
    pub fn error_count(&self, method: &str) -> u64 {
        Self::read(&self.error_counts, method)
    }

    /// Error rate for a method
    pub fn error_rate(&self, method: &str) -> f64 {
        let calls = self.call_count(method);
        if calls == 0 {
            0.0
        } else {
            self.error_count(method) as f64 / calls as f64
        }
    }

    /// Latency stats for a method
    pub fn latency_stats(&self, method: &str) -> Option<LatencyStats> {
        self.latencies.read().get(method).map(|h| h.stats())
    }

    /// Retries of a method
    pub fn retry_count(&self, method: &str) -> u64 {
        Self::read(&self.retry_counts, method)
    }

    /// Remediation rounds of a method
    pub fn remediation_count(&self, method: &str) -> u64 {
        Self::read(&self.remediation_counts, method)
    }

    /// Retries so far
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Remediation rounds so far
    pub fn remediations(&self) -> u64 {
        self.remediations.load(Ordering::Relaxed)
    }

    /// Number of attempts that had to wait for a rate slot
    pub fn rate_waits(&self) -> u64 {
        self.rate_waits.load(Ordering::Relaxed)
    }

    /// Calls in flight
    pub fn active_calls(&self) -> u64 {
        self.active_calls.load(Ordering::Relaxed)
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        let call_counts = self.call_counts.read();
        let error_counts = self.error_counts.read();
        let latencies = self.latencies.read();
        let retry_counts = self.retry_counts.read();
        let remediation_counts = self.remediation_counts.read();
        let count_of = |map: &HashMap<String, AtomicU64>, method: &str| {
            map.get(method).map(|c| c.load(Ordering::Relaxed)).unwrap_or(0)
        };

        let methods = call_counts
            .iter()
            .map(|(method, count)| {
                (
                    method.clone(),
                    MethodMetrics {
                        call_count: count.load(Ordering::Relaxed),
                        error_count: count_of(&*error_counts, method),
                        retry_count: count_of(&*retry_counts, method),
                        remediation_count: count_of(&*remediation_counts, method),
                        latency_stats: latencies.get(method).map(|h| h.stats()),
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            methods,
            retries: self.retries(),
            remediations: self.remediations(),
            rate_waits: self.rate_waits(),
            rate_wait_ms: self.rate_wait_ms.load(Ordering::Relaxed),
            active_calls: self.active_calls(),
        }
    }

    /// Reset all metrics
    pub fn reset(&self) {
        self.call_counts.write().clear();
        self.error_counts.write().clear();
        self.latencies.write().clear();
        self.retry_counts.write().clear();
        self.remediation_counts.write().clear();
        self.retries.store(0, Ordering::Relaxed);
        self.remediations.store(0, Ordering::Relaxed);
        self.rate_waits.store(0, Ordering::Relaxed);
        self.rate_wait_ms.store(0, Ordering::Relaxed);
    }
}

/// An in-flight call; dropping it without [`finish`](Self::finish) counts
/// the call as abandoned and only releases the active gauge
#[derive(Debug)]
#[must_use = "the call stops counting as active when the guard drops"]
pub struct ActiveCall<'a> {
    metrics: &'a MetricsCollector,
    method: String,
}

impl ActiveCall<'_> {
    /// Record the outcome and latency of the call
    pub fn finish(self, duration_ms: u64, success: bool) {
        self.metrics
            .record_call_end(&self.method, duration_ms, success);
    }
}

impl Drop for ActiveCall<'_> {
    fn drop(&mut self) {
        self.metrics.active_calls.fetch_sub(1, Ordering::Relaxed);
    }
}

/// Latency histogram using buckets
#[derive(Debug)]
pub struct LatencyHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    min: AtomicU64,
    max: AtomicU64,
    /// Bucket counts (0-50ms, 50-200ms, 200-500ms, 500ms-2s, 2s+)
    buckets: [AtomicU64; 5],
}

impl LatencyHistogram {
    /// Create a new histogram
    pub fn new() -> Self {
        Self {
            count: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            min: AtomicU64::new(u64::MAX),
            max: AtomicU64::new(0),
            buckets: Default::default(),
        }
    }

    /// Record a latency value
    pub fn record(&self, ms: u64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum.fetch_add(ms, Ordering::Relaxed);
        self.min.fetch_min(ms, Ordering::Relaxed);
        self.max.fetch_max(ms, Ordering::Relaxed);

        let bucket_idx = match ms {
            0..=50 => 0,
            51..=200 => 1,
            201..=500 => 2,
            501..=2000 => 3,
            _ => 4,
        };
        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Get statistics
    pub fn stats(&self) -> LatencyStats {
        let count = self.count.load(Ordering::Relaxed);
        let sum = self.sum.load(Ordering::Relaxed);
        let min = self.min.load(Ordering::Relaxed);

        LatencyStats {
            count,
            sum_ms: sum,
            min_ms: if min == u64::MAX { 0 } else { min },
            max_ms: self.max.load(Ordering::Relaxed),
            avg_ms: if count > 0 { sum / count } else { 0 },
            buckets: std::array::from_fn(|i| self.buckets[i].load(Ordering::Relaxed)),
        }
    }
}

impl Default for LatencyHistogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Latency statistics
#[derive(Debug, Clone)]
pub struct LatencyStats {
    /// Sample count
    pub count: u64,
    /// Total sum in milliseconds
    pub sum_ms: u64,
    /// Minimum latency
    pub min_ms: u64,
    /// Maximum latency
    pub max_ms: u64,
    /// Average latency
    pub avg_ms: u64,
    /// Bucket counts [0-50ms, 50-200ms, 200-500ms, 500ms-2s, 2s+]
    pub buckets: [u64; 5],
}

/// Per-method metrics
#[derive(Debug, Clone)]
pub struct MethodMetrics {
    /// Call count
    pub call_count: u64,
    /// Failed calls
    pub error_count: u64,
    /// Retries
    pub retry_count: u64,
    /// Remediation rounds
    pub remediation_count: u64,
    /// Latency stats
    pub latency_stats: Option<LatencyStats>,
}

/// Complete metrics snapshot
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    /// Per-method metrics
    pub methods: HashMap<String, MethodMetrics>,
    /// Retries
    pub retries: u64,
    /// Remediation rounds
    pub remediations: u64,
    /// Attempts that waited for a rate slot
    pub rate_waits: u64,
    /// Total time waited for rate slots
    pub rate_wait_ms: u64,
    /// Calls in flight
    pub active_calls: u64,
}
