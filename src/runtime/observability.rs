//! Read-only aggregate view over caches and operation timings.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::debug;

use super::cache::ResultCache;
use super::supervisor::ConnectionSupervisor;
use crate::domain::{
    CacheStats, ObservabilitySnapshot, OperationStats, PerformanceReport, TimeRange,
};
use crate::infrastructure::config::ObservabilityConfig;

/// Samples kept per operation name unless configured otherwise.
pub const MAX_SAMPLES: usize = 1000;

#[derive(Debug, Clone, Copy)]
struct Sample {
    duration: Duration,
    recorded: Instant,
    at: DateTime<Utc>,
}

/// Collects cache statistics and operation timing samples.
///
/// Registered caches are read, never modified. Timing samples are kept in a
/// bounded window per operation name; the oldest sample is dropped once
/// `max_samples` is reached or it is older than `max_age`.
pub struct Observability {
    caches: RwLock<BTreeMap<String, ResultCache>>,
    samples: Mutex<HashMap<String, VecDeque<Sample>>>,
    max_samples: usize,
    max_age: Option<Duration>,
}

impl Default for Observability {
    fn default() -> Self {
        Self::new(&ObservabilityConfig::default())
    }
}

impl Observability {
    #[must_use]
    pub fn new(config: &ObservabilityConfig) -> Self {
        Self {
            caches: RwLock::new(BTreeMap::new()),
            samples: Mutex::new(HashMap::new()),
            max_samples: config.max_samples_per_operation.max(1),
            max_age: config.max_sample_age(),
        }
    }

    /// Include `cache` in [`get_all_cache_stats`](Self::get_all_cache_stats),
    /// replacing any cache registered under the same name.
    pub fn register_cache(&self, cache: ResultCache) {
        debug!(cache = %cache.name(), "Cache registered for observability");
        self.caches.write().insert(cache.name().to_string(), cache);
    }

    #[must_use]
    pub fn cache_names(&self) -> Vec<String> {
        self.caches.read().keys().cloned().collect()
    }

    fn prune(&self, window: &mut VecDeque<Sample>, now: Instant) {
        while window.len() > self.max_samples {
            window.pop_front();
        }
        if let Some(max_age) = self.max_age {
            while window
                .front()
                .is_some_and(|s| now.saturating_duration_since(s.recorded) > max_age)
            {
                window.pop_front();
            }
        }
    }

    /// Append one timing sample for `operation`.
    pub fn record_operation(&self, operation: &str, duration: Duration) {
        let now = Instant::now();
        let mut samples = self.samples.lock();
        let window = samples
            .entry(operation.to_string())
            .or_insert_with(|| VecDeque::with_capacity(self.max_samples.min(64)));
        window.push_back(Sample {
            duration,
            recorded: now,
            at: Utc::now(),
        });
        self.prune(window, now);
    }

    /// Await `future`, recording how long it took under `operation`.
    pub async fn time<F: Future>(&self, operation: &str, future: F) -> F::Output {
        let started = Instant::now();
        let output = future.await;
        self.record_operation(operation, started.elapsed());
        output
    }

    /// Statistics for every registered cache, keyed by cache name.
    pub async fn get_all_cache_stats(&self) -> BTreeMap<String, CacheStats> {
        let caches: Vec<ResultCache> = self.caches.read().values().cloned().collect();
        let mut stats = BTreeMap::new();
        for cache in caches {
            stats.insert(cache.name().to_string(), cache.stats().await);
        }
        stats
    }

    /// Count, average, extremes and p95 per operation over retained samples.
    #[must_use]
    pub fn get_performance_stats(&self) -> PerformanceReport {
        let now = Instant::now();
        let mut samples = self.samples.lock();
        samples.retain(|_, window| {
            self.prune(window, now);
            !window.is_empty()
        });

        let mut report = PerformanceReport::default();
        let mut range: Option<TimeRange> = None;
        for (name, window) in samples.iter() {
            let mut durations: Vec<Duration> = window.iter().map(|s| s.duration).collect();
            durations.sort_unstable();
            let total: Duration = durations.iter().sum();
            let count = durations.len();
            report.operations.insert(
                name.clone(),
                OperationStats {
                    count,
                    avg_duration: total / u32::try_from(count).unwrap_or(u32::MAX),
                    min: durations[0],
                    max: durations[count - 1],
                    p95: percentile(&durations, 0.95),
                },
            );
            report.total_metrics += count;

            for sample in window {
                range = Some(match range {
                    None => TimeRange {
                        start: sample.at,
                        end: sample.at,
                    },
                    Some(r) => TimeRange {
                        start: r.start.min(sample.at),
                        end: r.end.max(sample.at),
                    },
                });
            }
        }
        report.time_range = range;
        report
    }

    /// Drop every timing sample.
    pub fn clear_samples(&self) {
        self.samples.lock().clear();
    }

    /// Cache, performance and (optionally) supervisor statistics in one document.
    pub async fn snapshot(
        &self,
        supervisor: Option<&ConnectionSupervisor>,
    ) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            generated_at: Utc::now(),
            caches: self.get_all_cache_stats().await,
            performance: self.get_performance_stats(),
            reconnects: supervisor.map(ConnectionSupervisor::get_reconnect_stats),
        }
    }
}

/// Nearest-rank percentile over sorted samples.
fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }

    let index = ((sorted.len() as f64 - 1.0) * p).round() as usize;
    sorted[index.min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn empty_report() {
        let report = Observability::default().get_performance_stats();
        assert!(report.operations.is_empty());
        assert_eq!(report.total_metrics, 0);
        assert!(report.time_range.is_none());
    }

    #[tokio::test]
    async fn aggregates_per_operation() {
        let obs = Observability::default();
        for n in [10, 20, 30] {
            obs.record_operation("quote", ms(n));
        }
        obs.record_operation("order", ms(5));

        let report = obs.get_performance_stats();
        let quote = report.operations["quote"];
        assert_eq!(quote.count, 3);
        assert_eq!(quote.avg_duration, ms(20));
        assert_eq!(quote.min, ms(10));
        assert_eq!(quote.max, ms(30));
        assert_eq!(report.total_metrics, 4);
        assert!(report.time_range.is_some());
    }

    #[tokio::test]
    async fn oldest_sample_dropped_past_capacity() {
        let obs = Observability::new(&ObservabilityConfig {
            max_samples_per_operation: 3,
            max_sample_age_secs: None,
        });
        for n in 1..=5 {
            obs.record_operation("op", ms(n));
        }

        let stats = obs.get_performance_stats().operations["op"];
        assert_eq!(stats.count, 3);
        assert_eq!(stats.min, ms(3));
    }

    #[tokio::test(start_paused = true)]
    async fn samples_age_out() {
        let obs = Observability::new(&ObservabilityConfig {
            max_samples_per_operation: 100,
            max_sample_age_secs: Some(10),
        });
        obs.record_operation("op", ms(1));
        tokio::time::advance(Duration::from_secs(11)).await;
        obs.record_operation("other", ms(1));

        let report = obs.get_performance_stats();
        assert!(!report.operations.contains_key("op"));
        assert_eq!(report.total_metrics, 1);
    }

    #[test]
    fn percentile_picks_nearest_rank() {
        let sorted: Vec<Duration> = (1..=100).map(ms).collect();
        assert_eq!(percentile(&sorted, 0.95), ms(95));
        assert_eq!(percentile(&[], 0.95), Duration::ZERO);
    }
}
