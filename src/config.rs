use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use crate::error::EngineError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub anchor: AnchorConfig,
    #[serde(default)]
    pub tracking: TrackingConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub web: WebConfig,
    #[serde(default)]
    pub logging: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Directory where log files will be stored
    pub directory: String,
    /// Log file name prefix (date will be appended)
    pub file_prefix: String,
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directory: "./logs".to_string(),
            file_prefix: "anchor_log".to_string(),
            level: "info".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorConfig {
    /// Swing radius around the drop point before the alarm trips
    pub radius_meters: f64,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self { radius_meters: 30.0 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingConfig {
    /// Auto-log interval used when a start request does not name one
    pub default_interval_ms: i64,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            default_interval_ms: 60_000, // 1 minute
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the event queue feeding the engine worker
    pub queue_capacity: usize,
    pub metrics_log_interval_seconds: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            metrics_log_interval_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub enabled: bool,
    /// UDP address receiving JSON position datagrams
    pub bind_address: String,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            bind_address: "0.0.0.0:10110".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebConfig {
    pub enabled: bool,
    pub port: u16,
    /// Directory with the static UI files
    pub static_dir: String,
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8080,
            static_dir: "static".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file and validate it
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.anchor.radius_meters.is_finite() || self.anchor.radius_meters <= 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "anchor radius must be positive, got {}",
                self.anchor.radius_meters
            )));
        }
        if self.tracking.default_interval_ms <= 0 {
            return Err(EngineError::InvalidConfig(format!(
                "default tracking interval must be positive, got {} ms",
                self.tracking.default_interval_ms
            )));
        }
        if self.engine.queue_capacity == 0 {
            return Err(EngineError::InvalidConfig("engine queue capacity must be at least 1".to_string()));
        }
        if self.engine.metrics_log_interval_seconds == 0 {
            return Err(EngineError::InvalidConfig("metrics log interval must be at least 1 second".to_string()));
        }
        if self.sensor.enabled && self.sensor.bind_address.parse::<SocketAddr>().is_err() {
            return Err(EngineError::InvalidConfig(format!(
                "sensor bind address '{}' is not a valid socket address",
                self.sensor.bind_address
            )));
        }
        Ok(())
    }
}

impl EngineConfig {
    pub fn metrics_log_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_log_interval_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.anchor.radius_meters, 30.0);
        assert_eq!(config.tracking.default_interval_ms, 60_000);
        assert_eq!(config.engine.queue_capacity, 256);
        assert_eq!(config.sensor.bind_address, "0.0.0.0:10110");
        assert_eq!(config.web.port, 8080);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_config_default() {
        let log_config = LogConfig::default();
        assert_eq!(log_config.directory, "./logs");
        assert_eq!(log_config.file_prefix, "anchor_log");
        assert_eq!(log_config.level, "info");
    }

    #[test]
    fn test_engine_config_interval() {
        let config = EngineConfig {
            queue_capacity: 8,
            metrics_log_interval_seconds: 15,
        };
        assert_eq!(config.metrics_log_interval(), Duration::from_secs(15));
    }

    #[test]
    fn test_config_deserialization_partial() {
        let json = r#"{
            "anchor": { "radius_meters": 45.5 },
            "sensor": { "enabled": false, "bind_address": "127.0.0.1:2000" }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.anchor.radius_meters, 45.5);
        assert!(!config.sensor.enabled);
        assert_eq!(config.sensor.bind_address, "127.0.0.1:2000");
        // Missing sections fall back to defaults
        assert_eq!(config.tracking.default_interval_ms, 60_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("radius_meters"));
        assert!(json.contains("10110"));

        let back: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(back.web.static_dir, "static");
    }

    #[test]
    fn test_validate_rejects_bad_radius() {
        let mut config = Config::default();
        config.anchor.radius_meters = 0.0;
        assert!(matches!(config.validate(), Err(EngineError::InvalidConfig(_))));
        config.anchor.radius_meters = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_interval_and_capacity() {
        let mut config = Config::default();
        config.tracking.default_interval_ms = -5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.engine.queue_capacity = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_sensor_address() {
        let mut config = Config::default();
        config.sensor.bind_address = "not an address".to_string();
        assert!(config.validate().is_err());

        // Address is not checked when the listener is disabled
        config.sensor.enabled = false;
        assert!(config.validate().is_ok());
    }
}
