//! Statistics snapshots exposed to monitoring endpoints.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::connection::ConnectionState;

fn as_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

/// Efficiency counters for one result cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    /// Live (non-expired) entries.
    pub size: u64,
    pub hit_rate: f64,
}

impl CacheStats {
    /// `hits / (hits + misses)`, or 0 when nothing was requested.
    #[must_use]
    pub fn compute_hit_rate(hits: u64, misses: u64) -> f64 {
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }
}

/// Supervisor registry summary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReconnectStats {
    /// Reconnect loops currently running.
    pub active_reconnects: usize,
    pub total_contexts: usize,
    pub states: BTreeMap<ConnectionState, usize>,
    pub max_retries: u32,
    #[serde(serialize_with = "as_millis", rename = "max_delay_ms")]
    pub max_delay: Duration,
}

/// Aggregate timings for one operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperationStats {
    pub count: usize,
    #[serde(serialize_with = "as_millis", rename = "avg_ms")]
    pub avg_duration: Duration,
    #[serde(serialize_with = "as_millis", rename = "min_ms")]
    pub min: Duration,
    #[serde(serialize_with = "as_millis", rename = "max_ms")]
    pub max: Duration,
    #[serde(serialize_with = "as_millis", rename = "p95_ms")]
    pub p95: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PerformanceReport {
    pub operations: BTreeMap<String, OperationStats>,
    /// Samples currently retained across all operations.
    pub total_metrics: usize,
    /// Oldest and newest retained sample, if any.
    pub time_range: Option<TimeRange>,
}

/// Everything an administrative endpoint needs in one document.
#[derive(Debug, Clone, Serialize)]
pub struct ObservabilitySnapshot {
    pub generated_at: DateTime<Utc>,
    pub caches: BTreeMap<String, CacheStats>,
    pub performance: PerformanceReport,
    pub reconnects: Option<ReconnectStats>,
}
