use std::fmt;

/// Errors reported synchronously to callers of the engine.
///
/// Commands issued before the first fix are not errors; they return `Ok(None)`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    InvalidCoordinate { latitude: f64, longitude: f64 },
    InvalidSample(String),
    InvalidInterval(i64),
    InvalidConfig(String),
    EngineStopped,
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::InvalidCoordinate { latitude, longitude } => {
                write!(f, "invalid coordinate: latitude={}, longitude={}", latitude, longitude)
            }
            EngineError::InvalidSample(reason) => write!(f, "invalid position sample: {}", reason),
            EngineError::InvalidInterval(ms) => {
                write!(f, "invalid tracking interval: {} ms (must be positive)", ms)
            }
            EngineError::InvalidConfig(reason) => write!(f, "invalid configuration: {}", reason),
            EngineError::EngineStopped => write!(f, "position engine is not running"),
        }
    }
}

impl std::error::Error for EngineError {}
