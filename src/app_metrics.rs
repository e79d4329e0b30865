use std::time::{Duration, Instant};
use tracing::info;

/// Counters for what the engine worker processed since the last log line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineMetrics {
    /// Samples accepted into the latest-position slot
    pub samples_accepted: u64,
    /// Samples rejected at the intake boundary (NaN, out of range)
    pub samples_rejected: u64,
    /// Error notifications from the sensor driver
    pub sensor_errors: u64,
    /// Samples dropped because the event queue was full
    pub samples_dropped: u64,
    pub waypoints_logged: u64,
    /// Marks and timer ticks skipped because no fix was known yet
    pub marks_skipped: u64,
    pub anchor_alarms: u64,
}

impl EngineMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn log(&self) {
        info!(
            "[Metrics] Samples: {} accepted, {} rejected, {} dropped, Sensor errors: {}, Waypoints: {}, Skipped marks: {}, Anchor alarms: {}",
            self.samples_accepted,
            self.samples_rejected,
            self.samples_dropped,
            self.sensor_errors,
            self.waypoints_logged,
            self.marks_skipped,
            self.anchor_alarms
        );
    }
}

/// Manages periodic logging of engine metrics
pub struct MetricsLogger {
    last_log: Instant,
    log_interval: Duration,
}

impl MetricsLogger {
    pub fn new(log_interval: Duration) -> Self {
        Self {
            last_log: Instant::now(),
            log_interval,
        }
    }

    /// Log and reset the metrics if the interval has elapsed.
    /// Returns true if metrics were logged
    pub fn check_and_log(&mut self, metrics: &mut EngineMetrics) -> bool {
        if self.last_log.elapsed() >= self.log_interval {
            metrics.log();
            metrics.reset();
            self.last_log = Instant::now();
            true
        } else {
            false
        }
    }
}
