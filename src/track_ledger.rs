use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::geodesy::{self, Coordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaypointKind {
    Manual,
    Timed,
    ManOverboard,
    AnchorDrop,
}

impl WaypointKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            WaypointKind::Manual => "manual",
            WaypointKind::Timed => "timed",
            WaypointKind::ManOverboard => "man_overboard",
            WaypointKind::AnchorDrop => "anchor_drop",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    pub sequence_number: u32,
    pub recorded_at: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub kind: WaypointKind,
    /// None only for the first waypoint of the ledger
    pub distance_from_previous_meters: Option<f64>,
}

impl Waypoint {
    pub fn coordinate(&self) -> Coordinate {
        Coordinate {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }
}

impl std::fmt::Display for Waypoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}; {} — {} [{}]",
            self.sequence_number,
            self.recorded_at.format("%d.%m.%Y; %H:%M:%S"),
            self.coordinate(),
            self.kind.as_str()
        )?;
        if let Some(distance) = self.distance_from_previous_meters {
            write!(f, " {:.1} m", distance)?;
        }
        Ok(())
    }
}

/// Structured form of a waypoint used to export a ledger and rebuild it later.
/// Kind and timestamp are optional so that plain coordinate lists are accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackPoint {
    pub latitude: f64,
    pub longitude: f64,
    #[serde(default)]
    pub kind: Option<WaypointKind>,
    #[serde(default)]
    pub recorded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TotalDistance {
    pub kilometers: f64,
    pub nautical_miles: f64,
}

/// Append-only, ordered log of waypoints with distance accounting
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TrackLedger {
    waypoints: Vec<Waypoint>,
    cumulative_distance_km: f64,
}

impl TrackLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a waypoint at `position`. The distance is measured from the last
    /// waypoint currently in the ledger.
    pub fn append(&mut self, position: Coordinate, kind: WaypointKind, recorded_at: DateTime<Utc>) -> Waypoint {
        let distance_from_previous_meters = self
            .waypoints
            .last()
            .map(|previous| geodesy::distance_meters(&previous.coordinate(), &position));

        let waypoint = Waypoint {
            sequence_number: self.waypoints.len() as u32 + 1,
            recorded_at,
            latitude: position.latitude,
            longitude: position.longitude,
            kind,
            distance_from_previous_meters,
        };

        if let Some(distance) = distance_from_previous_meters {
            self.cumulative_distance_km += distance / 1000.0;
        }
        self.waypoints.push(waypoint.clone());
        waypoint
    }

    /// Rebuild a complete ledger from an ordered point list.
    ///
    /// Every segment and the total are recomputed in one pass and sequence
    /// numbers are re-issued as 1..N. Points without a timestamp get
    /// `rebuilt_at`, points without a kind are `Manual`.
    pub fn rebuild_from_external_list(points: &[TrackPoint], rebuilt_at: DateTime<Utc>) -> Result<Self, EngineError> {
        let mut ledger = TrackLedger::new();
        let mut previous: Option<Coordinate> = None;
        let mut total_meters = 0.0;

        for (index, point) in points.iter().enumerate() {
            let position = Coordinate::new(point.latitude, point.longitude)?;
            let distance_from_previous_meters =
                previous.map(|prev| geodesy::distance_meters(&prev, &position));
            if let Some(distance) = distance_from_previous_meters {
                total_meters += distance;
            }
            ledger.waypoints.push(Waypoint {
                sequence_number: index as u32 + 1,
                recorded_at: point.recorded_at.unwrap_or(rebuilt_at),
                latitude: position.latitude,
                longitude: position.longitude,
                kind: point.kind.unwrap_or(WaypointKind::Manual),
                distance_from_previous_meters,
            });
            previous = Some(position);
        }

        ledger.cumulative_distance_km = total_meters / 1000.0;
        Ok(ledger)
    }

    /// Export the ledger in the form accepted by `rebuild_from_external_list`
    pub fn to_track_points(&self) -> Vec<TrackPoint> {
        self.waypoints
            .iter()
            .map(|waypoint| TrackPoint {
                latitude: waypoint.latitude,
                longitude: waypoint.longitude,
                kind: Some(waypoint.kind),
                recorded_at: Some(waypoint.recorded_at),
            })
            .collect()
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    pub fn cumulative_distance_km(&self) -> f64 {
        self.cumulative_distance_km
    }

    pub fn total_distance(&self) -> TotalDistance {
        let kilometers = self.cumulative_distance_km;
        TotalDistance {
            kilometers,
            nautical_miles: geodesy::km_to_nautical_miles(kilometers),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::Duration;

    fn coord(lat: f64, lon: f64) -> Coordinate {
        Coordinate::new(lat, lon).unwrap()
    }

    fn point(lat: f64, lon: f64) -> TrackPoint {
        TrackPoint {
            latitude: lat,
            longitude: lon,
            kind: None,
            recorded_at: None,
        }
    }

    #[test]
    fn test_new_ledger_is_empty() {
        let ledger = TrackLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.cumulative_distance_km(), 0.0);
        assert_eq!(ledger.total_distance().nautical_miles, 0.0);
    }

    #[test]
    fn test_first_waypoint_has_no_distance() {
        let mut ledger = TrackLedger::new();
        let waypoint = ledger.append(coord(47.0, 8.0), WaypointKind::Manual, Utc::now());
        assert_eq!(waypoint.sequence_number, 1);
        assert!(waypoint.distance_from_previous_meters.is_none());
        assert_eq!(ledger.cumulative_distance_km(), 0.0);
    }

    #[test]
    fn test_three_equatorial_points() {
        let mut ledger = TrackLedger::new();
        let now = Utc::now();
        ledger.append(coord(0.0, 0.0), WaypointKind::Timed, now);
        ledger.append(coord(0.0, 0.01), WaypointKind::Timed, now);
        ledger.append(coord(0.0, 0.02), WaypointKind::Timed, now);

        let segment = geodesy::distance_meters(&coord(0.0, 0.0), &coord(0.0, 0.01));
        let total = ledger.total_distance();
        assert_abs_diff_eq!(total.kilometers, 2.0 * segment / 1000.0, epsilon = 1e-9);
        assert_abs_diff_eq!(total.nautical_miles, total.kilometers / 1.852, epsilon = 1e-12);
    }

    #[test]
    fn test_sequence_and_cumulative_invariant() {
        let mut ledger = TrackLedger::new();
        let start = Utc::now();
        let kinds = [
            WaypointKind::Manual,
            WaypointKind::Timed,
            WaypointKind::AnchorDrop,
            WaypointKind::ManOverboard,
        ];
        for i in 0..40 {
            let lat = 47.0 + (i as f64 * 0.37).sin() * 0.01;
            let lon = 8.0 + (i as f64 * 0.11).cos() * 0.02;
            ledger.append(coord(lat, lon), kinds[i % kinds.len()], start + Duration::seconds(i as i64));
        }

        for (index, waypoint) in ledger.waypoints().iter().enumerate() {
            assert_eq!(waypoint.sequence_number as usize, index + 1);
            assert_eq!(waypoint.distance_from_previous_meters.is_none(), index == 0);
        }
        let sum_km: f64 = ledger
            .waypoints()
            .iter()
            .filter_map(|w| w.distance_from_previous_meters)
            .sum::<f64>()
            / 1000.0;
        assert_abs_diff_eq!(sum_km, ledger.cumulative_distance_km(), epsilon = 1e-9);
    }

    #[test]
    fn test_rebuild_recomputes_everything() {
        let points = vec![point(0.0, 0.0), point(0.0, 0.01), point(0.0, 0.02)];
        let rebuilt_at = Utc::now();
        let ledger = TrackLedger::rebuild_from_external_list(&points, rebuilt_at).unwrap();

        assert_eq!(ledger.len(), 3);
        let numbers: Vec<u32> = ledger.waypoints().iter().map(|w| w.sequence_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
        assert!(ledger.waypoints().iter().all(|w| w.kind == WaypointKind::Manual));
        assert!(ledger.waypoints().iter().all(|w| w.recorded_at == rebuilt_at));

        let mut appended = TrackLedger::new();
        for p in &points {
            appended.append(coord(p.latitude, p.longitude), WaypointKind::Manual, rebuilt_at);
        }
        assert_abs_diff_eq!(
            ledger.cumulative_distance_km(),
            appended.cumulative_distance_km(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let points = vec![point(47.0, 8.0), point(47.001, 8.002), point(47.003, 8.001), point(47.0, 8.0)];
        let at = Utc::now();
        let first = TrackLedger::rebuild_from_external_list(&points, at).unwrap();
        let second = TrackLedger::rebuild_from_external_list(&points, at).unwrap();
        assert_eq!(first, second);

        // Rebuilding from its own export gives the same ledger back
        let again = TrackLedger::rebuild_from_external_list(&first.to_track_points(), Utc::now()).unwrap();
        assert_eq!(first, again);
    }

    #[test]
    fn test_round_trip_keeps_kinds_and_timestamps() {
        let mut ledger = TrackLedger::new();
        let t0 = Utc::now();
        ledger.append(coord(47.0, 8.0), WaypointKind::AnchorDrop, t0);
        ledger.append(coord(47.001, 8.0), WaypointKind::ManOverboard, t0 + Duration::seconds(5));

        let rebuilt = TrackLedger::rebuild_from_external_list(&ledger.to_track_points(), Utc::now()).unwrap();
        assert_eq!(rebuilt.waypoints(), ledger.waypoints());
    }

    #[test]
    fn test_rebuild_rejects_invalid_point() {
        let points = vec![point(47.0, 8.0), point(f64::NAN, 8.0)];
        let result = TrackLedger::rebuild_from_external_list(&points, Utc::now());
        assert!(matches!(result, Err(EngineError::InvalidCoordinate { .. })));
    }

    #[test]
    fn test_rebuild_empty_list() {
        let ledger = TrackLedger::rebuild_from_external_list(&[], Utc::now()).unwrap();
        assert!(ledger.is_empty());
        assert_eq!(ledger.cumulative_distance_km(), 0.0);
    }

    #[test]
    fn test_track_point_accepts_plain_coordinates() {
        let json = r#"[{"latitude": 47.0, "longitude": 8.0}, {"latitude": 47.1, "longitude": 8.1, "kind": "timed"}]"#;
        let points: Vec<TrackPoint> = serde_json::from_str(json).unwrap();
        assert_eq!(points[0].kind, None);
        assert_eq!(points[1].kind, Some(WaypointKind::Timed));
    }

    #[test]
    fn test_waypoint_display() {
        let mut ledger = TrackLedger::new();
        let at = DateTime::parse_from_rfc3339("2024-06-01T10:15:30Z").unwrap().with_timezone(&Utc);
        ledger.append(coord(47.0, 8.0), WaypointKind::Manual, at);
        let second = ledger.append(coord(47.0009, 8.0), WaypointKind::ManOverboard, at);
        assert_eq!(ledger.waypoints()[0].to_string(), "1; 01.06.2024; 10:15:30 — 47.000000, 8.000000 [manual]");
        assert!(second.to_string().starts_with("2; 01.06.2024; 10:15:30 — 47.000900, 8.000000 [man_overboard] 100."));
    }
}
