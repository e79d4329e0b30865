use serde::{Deserialize, Serialize};

use crate::geodesy::{Coordinate, distance_meters};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorStatus {
    Unset,
    Safe,
    Alarm,
}

impl AnchorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorStatus::Unset => "unset",
            AnchorStatus::Safe => "safe",
            AnchorStatus::Alarm => "alarm",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorReference {
    pub latitude: f64,
    pub longitude: f64,
    pub radius_meters: f64,
}

impl AnchorReference {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

/// Holds the anchor drop point and classifies positions against its radius.
///
/// Classification uses the exact radius with no dead-band: a boat sitting on
/// the boundary may alternate between `Safe` and `Alarm` as fixes jitter.
#[derive(Debug, Clone)]
pub struct AnchorWatch {
    reference: Option<AnchorReference>,
    radius_meters: f64,
}

impl AnchorWatch {
    pub fn new(radius_meters: f64) -> Self {
        Self {
            reference: None,
            radius_meters,
        }
    }

    /// Drop anchor at `position`, replacing any earlier drop point
    pub fn set_anchor(&mut self, position: Coordinate) -> AnchorReference {
        let reference = AnchorReference {
            latitude: position.latitude,
            longitude: position.longitude,
            radius_meters: self.radius_meters,
        };
        self.reference = Some(reference);
        reference
    }

    /// Forget the drop point; status goes back to `Unset`
    pub fn clear(&mut self) -> Option<AnchorReference> {
        self.reference.take()
    }

    pub fn reference(&self) -> Option<AnchorReference> {
        self.reference
    }

    pub fn radius_meters(&self) -> f64 {
        self.radius_meters
    }

    pub fn distance_from_anchor(&self, position: &Coordinate) -> Option<f64> {
        self.reference
            .map(|reference| distance_meters(position, &reference.coordinate()))
    }

    pub fn evaluate(&self, position: &Coordinate) -> AnchorStatus {
        match self.reference {
            None => AnchorStatus::Unset,
            Some(reference) => {
                if distance_meters(position, &reference.coordinate()) > reference.radius_meters {
                    AnchorStatus::Alarm
                } else {
                    AnchorStatus::Safe
                }
            }
        }
    }
}

impl Default for AnchorWatch {
    fn default() -> Self {
        Self::new(crate::config::AnchorConfig::default().radius_meters)
    }
}
