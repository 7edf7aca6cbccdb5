// Copyright 2025 Cowboy AI, LLC.

//! Metrics port: counters and timers
//!
//! [`NoopMetricsProvider`] is used when no provider is visible.
//! [`InMemoryMetricsProvider`] keeps every measurement for inspection.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Up/down counter
pub trait MetricsCounter: Send + Sync {
    /// Add one
    fn increment(&self);

    /// Subtract one
    fn decrement(&self);
}

/// Duration recorder
pub trait MetricsTimer: Send + Sync {
    /// Record one measurement
    fn record(&self, duration: Duration);
}

/// Creates named counters and timers
pub trait MetricsProvider: Send + Sync {
    /// Counter named `name`
    fn counter(&self, name: &str) -> Arc<dyn MetricsCounter>;

    /// Timer named `name`
    fn timer(&self, name: &str) -> Arc<dyn MetricsTimer>;
}

/// A running measurement of a timer
pub struct TimerContext {
    timer: Arc<dyn MetricsTimer>,
    start: Instant,
}

impl TimerContext {
    /// Start measuring
    pub fn start(timer: Arc<dyn MetricsTimer>) -> Self {
        Self {
            timer,
            start: Instant::now(),
        }
    }

    /// Record the elapsed time
    pub fn stop(self) -> Duration {
        let duration = self.start.elapsed();
        self.timer.record(duration);
        duration
    }
}

/// Provider whose counters and timers discard everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetricsProvider;

struct Noop;

impl MetricsCounter for Noop {
    fn increment(&self) {}
    fn decrement(&self) {}
}

impl MetricsTimer for Noop {
    fn record(&self, _duration: Duration) {}
}

impl MetricsProvider for NoopMetricsProvider {
    fn counter(&self, _name: &str) -> Arc<dyn MetricsCounter> {
        Arc::new(Noop)
    }

    fn timer(&self, _name: &str) -> Arc<dyn MetricsTimer> {
        Arc::new(Noop)
    }
}

#[derive(Debug, Default)]
struct Measurements {
    counters: RwLock<HashMap<String, i64>>,
    durations: RwLock<HashMap<String, Vec<Duration>>>,
}

/// Provider recording into shared maps
#[derive(Debug, Clone, Default)]
pub struct InMemoryMetricsProvider {
    measurements: Arc<Measurements>,
}

struct InMemoryCounter {
    name: String,
    measurements: Arc<Measurements>,
}

impl MetricsCounter for InMemoryCounter {
    fn increment(&self) {
        *self
            .measurements
            .counters
            .write()
            .entry(self.name.clone())
            .or_insert(0) += 1;
    }

    fn decrement(&self) {
        *self
            .measurements
            .counters
            .write()
            .entry(self.name.clone())
            .or_insert(0) -= 1;
    }
}

struct InMemoryTimer {
    name: String,
    measurements: Arc<Measurements>,
}

impl MetricsTimer for InMemoryTimer {
    fn record(&self, duration: Duration) {
        let mut durations = self.measurements.durations.write();
        let recorded = durations.entry(self.name.clone()).or_default();
        recorded.push(duration);

        // Keep only last 1000 measurements per timer
        if recorded.len() > 1000 {
            let excess = recorded.len() - 1000;
            recorded.drain(0..excess);
        }
    }
}

impl MetricsProvider for InMemoryMetricsProvider {
    fn counter(&self, name: &str) -> Arc<dyn MetricsCounter> {
        Arc::new(InMemoryCounter {
            name: name.to_string(),
            measurements: self.measurements.clone(),
        })
    }

    fn timer(&self, name: &str) -> Arc<dyn MetricsTimer> {
        Arc::new(InMemoryTimer {
            name: name.to_string(),
            measurements: self.measurements.clone(),
        })
    }
}

impl InMemoryMetricsProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Current counter value
    pub fn counter_value(&self, name: &str) -> i64 {
        self.measurements
            .counters
            .read()
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Number of measurements recorded by a timer
    pub fn timer_count(&self, name: &str) -> usize {
        self.measurements
            .durations
            .read()
            .get(name)
            .map_or(0, Vec::len)
    }

    /// Average duration of a timer
    pub fn avg_duration(&self, name: &str) -> Option<Duration> {
        let durations = self.measurements.durations.read();
        let recorded = durations.get(name).filter(|v| !v.is_empty())?;
        let sum: Duration = recorded.iter().sum();
        Some(sum / recorded.len() as u32)
    }

    /// Percentile duration of a timer
    pub fn percentile_duration(&self, name: &str, percentile: f64) -> Option<Duration> {
        let durations = self.measurements.durations.read();
        let mut sorted = durations.get(name).filter(|v| !v.is_empty())?.clone();
        sorted.sort();
        let index = ((sorted.len() as f64 - 1.0) * percentile / 100.0) as usize;
        sorted.get(index).copied()
    }

    /// All measurements as a summary
    pub fn summary(&self) -> MetricsSummary {
        let counters = self.measurements.counters.read().clone();
        let durations = self
            .measurements
            .durations
            .read()
            .iter()
            .filter_map(|(name, recorded)| {
                DurationStats::from_measurements(recorded).map(|stats| (name.clone(), stats))
            })
            .collect();
        MetricsSummary {
            counters,
            durations,
        }
    }

    /// Reset all measurements
    pub fn reset(&self) {
        self.measurements.counters.write().clear();
        self.measurements.durations.write().clear();
    }
}

/// Summary of all measurements
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    /// Counter values
    pub counters: HashMap<String, i64>,
    /// Duration statistics per timer
    pub durations: HashMap<String, DurationStats>,
}

/// Duration statistics of a timer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DurationStats {
    /// Number of measurements
    pub count: usize,
    /// Average duration
    pub avg: Duration,
    /// 50th percentile
    pub p50: Duration,
    /// 95th percentile
    pub p95: Duration,
    /// Minimum duration
    pub min: Duration,
    /// Maximum duration
    pub max: Duration,
}

impl DurationStats {
    fn from_measurements(recorded: &[Duration]) -> Option<Self> {
        let mut sorted = recorded.to_vec();
        sorted.sort();
        let min = *sorted.first()?;
        let max = *sorted.last()?;
        let at = |p: f64| sorted[((sorted.len() as f64 - 1.0) * p) as usize];
        let sum: Duration = sorted.iter().sum();
        Some(Self {
            count: sorted.len(),
            avg: sum / sorted.len() as u32,
            p50: at(0.5),
            p95: at(0.95),
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters() {
        let metrics = InMemoryMetricsProvider::new();
        let counter = metrics.counter("uow.counter");
        counter.increment();
        counter.increment();
        counter.decrement();

        assert_eq!(metrics.counter_value("uow.counter"), 1);
        assert_eq!(metrics.counter_value("nonexistent"), 0);
    }

    #[test]
    fn test_durations() {
        let metrics = InMemoryMetricsProvider::new();
        let timer = metrics.timer("op1");
        timer.record(Duration::from_millis(10));
        timer.record(Duration::from_millis(20));
        timer.record(Duration::from_millis(30));

        assert_eq!(metrics.avg_duration("op1"), Some(Duration::from_millis(20)));
        assert_eq!(
            metrics.percentile_duration("op1", 50.0),
            Some(Duration::from_millis(20))
        );
        assert_eq!(metrics.avg_duration("op2"), None);
    }

    #[test]
    fn test_timer_context() {
        let metrics = InMemoryMetricsProvider::new();
        let context = TimerContext::start(metrics.timer("work"));
        let elapsed = context.stop();

        assert_eq!(metrics.timer_count("work"), 1);
        assert_eq!(metrics.summary().durations["work"].max, elapsed);
    }

    #[test]
    fn test_summary_and_reset() {
        let metrics = InMemoryMetricsProvider::new();
        metrics.counter("saves").increment();
        metrics.timer("save").record(Duration::from_millis(5));
        metrics.timer("save").record(Duration::from_millis(15));

        let summary = metrics.summary();
        assert_eq!(summary.counters.get("saves"), Some(&1));
        assert_eq!(summary.durations["save"].count, 2);
        assert_eq!(summary.durations["save"].avg, Duration::from_millis(10));

        metrics.reset();
        assert_eq!(metrics.counter_value("saves"), 0);
        assert_eq!(metrics.timer_count("save"), 0);
    }

    #[test]
    fn test_noop_provider_accepts_everything() {
        let metrics = NoopMetricsProvider;
        metrics.counter("x").increment();
        TimerContext::start(metrics.timer("y")).stop();
    }
}
