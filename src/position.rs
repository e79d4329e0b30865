use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::geodesy::{self, Coordinate};

/// A single fix delivered by the positioning sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    pub latitude: f64,
    pub longitude: f64,
    pub speed_mps: f64,
    pub heading_deg: f64,
    pub observed_at: DateTime<Utc>,
}

impl PositionSample {
    /// Build a validated sample. Speed and heading default to 0 when the
    /// driver does not report them.
    pub fn new(
        latitude: f64,
        longitude: f64,
        speed_mps: Option<f64>,
        heading_deg: Option<f64>,
        observed_at: DateTime<Utc>,
    ) -> Result<Self, EngineError> {
        let sample = Self {
            latitude,
            longitude,
            speed_mps: speed_mps.unwrap_or(0.0),
            heading_deg: heading_deg.unwrap_or(0.0),
            observed_at,
        };
        sample.validate()?;
        Ok(sample)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        Coordinate::new(self.latitude, self.longitude)?;
        if !self.speed_mps.is_finite() || self.speed_mps < 0.0 {
            return Err(EngineError::InvalidSample(format!("speed {} m/s", self.speed_mps)));
        }
        if !self.heading_deg.is_finite() {
            return Err(EngineError::InvalidSample(format!("heading {}", self.heading_deg)));
        }
        Ok(())
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Display metrics derived from the latest sample
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MotionMetrics {
    pub speed_kmh: f64,
    pub speed_knots: f64,
    pub heading_deg: f64,
}

impl MotionMetrics {
    pub fn from_sample(sample: &PositionSample) -> Self {
        let speed_kmh = geodesy::mps_to_kmh(sample.speed_mps);
        Self {
            speed_kmh,
            speed_knots: geodesy::kmh_to_knots(speed_kmh),
            heading_deg: sample.heading_deg,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sample_defaults_missing_speed_and_heading() {
        let sample = PositionSample::new(47.0, 8.0, None, None, Utc::now()).unwrap();
        assert_eq!(sample.speed_mps, 0.0);
        assert_eq!(sample.heading_deg, 0.0);
    }

    #[test]
    fn test_sample_rejects_malformed() {
        assert!(PositionSample::new(f64::NAN, 8.0, None, None, Utc::now()).is_err());
        assert!(PositionSample::new(47.0, 200.0, None, None, Utc::now()).is_err());
        assert!(PositionSample::new(47.0, 8.0, Some(-1.0), None, Utc::now()).is_err());
        assert!(PositionSample::new(47.0, 8.0, Some(1.0), Some(f64::NAN), Utc::now()).is_err());
    }

    #[test]
    fn test_motion_metrics() {
        let sample = PositionSample::new(47.0, 8.0, Some(5.0), Some(271.0), Utc::now()).unwrap();
        let metrics = MotionMetrics::from_sample(&sample);
        assert_abs_diff_eq!(metrics.speed_kmh, 18.0, epsilon = 1e-9);
        assert_abs_diff_eq!(metrics.speed_knots, 18.0 * 0.539957, epsilon = 1e-9);
        assert_eq!(metrics.heading_deg, 271.0);
    }
}
