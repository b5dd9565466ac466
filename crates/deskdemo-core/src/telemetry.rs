//! In-memory telemetry recorder for the observability showcase.
//!
//! Every record is emitted through `tracing`, aggregated here for the
//! snapshot endpoint, and fanned out on a broadcast feed for live viewers.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

/// Records kept for the snapshot, per kind.
const DEFAULT_RECENT_CAPACITY: usize = 100;

/// Broadcast channel capacity for live viewers.
const FEED_CAPACITY: usize = 256;

/// Distinct metric names kept per kind. Samples for new names beyond this
/// are dropped.
const MAX_METRIC_NAMES: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Fatal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub level: LogLevel,
    pub message: String,
    #[serde(default)]
    pub attributes: Map<String, Value>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            attributes: Map::new(),
            timestamp: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Monotonic sum.
    Counter,
    /// Last value wins.
    Gauge,
    /// Count/sum/min/max summary.
    Distribution,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub kind: MetricKind,
    pub name: String,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl MetricSample {
    pub fn new(kind: MetricKind, name: impl Into<String>, value: f64) -> Self {
        Self {
            kind,
            name: name.into(),
            value,
            unit: None,
            attributes: Map::new(),
        }
    }

    #[must_use]
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapturedError {
    pub id: Uuid,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Anything published on the live feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "record", rename_all = "snake_case")]
pub enum TelemetryRecord {
    Log(LogEntry),
    Metric(MetricSample),
    Error(CapturedError),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub count: u64,
    pub sum: f64,
    pub min: f64,
    pub max: f64,
}

impl DistributionSummary {
    fn first(value: f64) -> Self {
        Self {
            count: 1,
            sum: value,
            min: value,
            max: value,
        }
    }

    fn add(&mut self, value: f64) {
        self.count += 1;
        self.sum += value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

/// Point-in-time view of everything recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySnapshot {
    pub counters: BTreeMap<String, f64>,
    pub gauges: BTreeMap<String, f64>,
    pub distributions: BTreeMap<String, DistributionSummary>,
    /// Newest last.
    pub recent_errors: Vec<CapturedError>,
    /// Newest last.
    pub recent_logs: Vec<LogEntry>,
}

/// Thread-safe telemetry recorder.
pub struct Telemetry {
    counters: DashMap<String, f64>,
    gauges: DashMap<String, f64>,
    distributions: DashMap<String, DistributionSummary>,
    errors: Mutex<VecDeque<CapturedError>>,
    logs: Mutex<VecDeque<LogEntry>>,
    capacity: usize,
    max_metric_names: usize,
    feed: broadcast::Sender<String>,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl Telemetry {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_RECENT_CAPACITY)
    }

    /// Create a recorder keeping at most `capacity` recent logs and errors.
    pub fn with_capacity(capacity: usize) -> Self {
        let (feed, _) = broadcast::channel(FEED_CAPACITY);
        Self {
            counters: DashMap::new(),
            gauges: DashMap::new(),
            distributions: DashMap::new(),
            errors: Mutex::new(VecDeque::with_capacity(capacity)),
            logs: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity: capacity.max(1),
            max_metric_names: MAX_METRIC_NAMES,
            feed,
        }
    }

    /// Limit how many distinct names each metric kind may hold.
    #[must_use]
    pub fn with_max_metric_names(mut self, max: usize) -> Self {
        self.max_metric_names = max;
        self
    }

    /// Subscribe to the live feed of JSON-encoded [`TelemetryRecord`]s.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.feed.subscribe()
    }

    /// Emit a structured log line.
    pub fn log(&self, entry: LogEntry) {
        let attributes = Value::Object(entry.attributes.clone());
        match entry.level {
            LogLevel::Trace => trace!(target: "deskdemo::showcase", %attributes, "{}", entry.message),
            LogLevel::Debug => debug!(target: "deskdemo::showcase", %attributes, "{}", entry.message),
            LogLevel::Info => info!(target: "deskdemo::showcase", %attributes, "{}", entry.message),
            LogLevel::Warn => warn!(target: "deskdemo::showcase", %attributes, "{}", entry.message),
            LogLevel::Error | LogLevel::Fatal => {
                error!(target: "deskdemo::showcase", %attributes, fatal = entry.level == LogLevel::Fatal, "{}", entry.message)
            }
        }

        push_bounded(&self.logs, entry.clone(), self.capacity);
        self.publish(&TelemetryRecord::Log(entry));
    }

    /// Record one metric sample.
    ///
    /// A sample whose name would exceed the per-kind name limit is dropped
    /// and not published.
    pub fn record(&self, sample: MetricSample) {
        let known = match sample.kind {
            MetricKind::Counter => name_fits(&self.counters, &sample.name, self.max_metric_names),
            MetricKind::Gauge => name_fits(&self.gauges, &sample.name, self.max_metric_names),
            MetricKind::Distribution => {
                name_fits(&self.distributions, &sample.name, self.max_metric_names)
            }
        };
        if !known {
            warn!(metric = %sample.name, kind = ?sample.kind, "metric name limit reached, sample dropped");
            return;
        }

        match sample.kind {
            MetricKind::Counter => {
                *self.counters.entry(sample.name.clone()).or_insert(0.0) += sample.value;
            }
            MetricKind::Gauge => {
                self.gauges.insert(sample.name.clone(), sample.value);
            }
            MetricKind::Distribution => {
                self.distributions
                    .entry(sample.name.clone())
                    .and_modify(|d| d.add(sample.value))
                    .or_insert_with(|| DistributionSummary::first(sample.value));
            }
        }

        debug!(
            metric = %sample.name,
            kind = ?sample.kind,
            value = sample.value,
            unit = sample.unit.as_deref().unwrap_or(""),
            "metric recorded"
        );
        self.publish(&TelemetryRecord::Metric(sample));
    }

    /// Shorthand for a counter increment.
    pub fn increment(&self, name: &str, value: f64) {
        self.record(MetricSample::new(MetricKind::Counter, name, value));
    }

    /// Shorthand for a distribution sample.
    pub fn distribution(&self, name: &str, value: f64, unit: &str) {
        self.record(MetricSample::new(MetricKind::Distribution, name, value).with_unit(unit));
    }

    /// Capture an error for the errors view.
    pub fn capture_error(&self, message: impl Into<String>, source: Option<&str>) -> CapturedError {
        let captured = CapturedError {
            id: Uuid::new_v4(),
            message: message.into(),
            source: source.map(str::to_string),
            timestamp: Utc::now(),
        };

        error!(
            error_id = %captured.id,
            source = captured.source.as_deref().unwrap_or("unknown"),
            "captured error: {}",
            captured.message
        );

        push_bounded(&self.errors, captured.clone(), self.capacity);
        self.publish(&TelemetryRecord::Error(captured.clone()));
        captured
    }

    /// Current value of a counter, zero if never incremented.
    pub fn counter(&self, name: &str) -> f64 {
        self.counters.get(name).map(|v| *v).unwrap_or(0.0)
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        TelemetrySnapshot {
            counters: self
                .counters
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            gauges: self
                .gauges
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            distributions: self
                .distributions
                .iter()
                .map(|e| (e.key().clone(), *e.value()))
                .collect(),
            recent_errors: lock(&self.errors).iter().cloned().collect(),
            recent_logs: lock(&self.logs).iter().cloned().collect(),
        }
    }

    fn publish(&self, record: &TelemetryRecord) {
        let Ok(json) = serde_json::to_string(record) else {
            return;
        };
        if self.feed.send(json).is_err() {
            trace!("no telemetry feed subscribers");
        }
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

fn name_fits<V>(map: &DashMap<String, V>, name: &str, max: usize) -> bool {
    map.contains_key(name) || map.len() < max
}

fn push_bounded<T>(buffer: &Mutex<VecDeque<T>>, item: T, capacity: usize) {
    let mut guard = lock(buffer);
    while guard.len() >= capacity {
        guard.pop_front();
    }
    guard.push_back(item);
}
