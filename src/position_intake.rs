use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::anchor_watch::{AnchorReference, AnchorStatus, AnchorWatch};
use crate::error::EngineError;
use crate::geodesy;
use crate::position::{MotionMetrics, PositionSample};
use crate::track_ledger::{TotalDistance, TrackLedger, TrackPoint, Waypoint, WaypointKind};

/// Anchor state as shown to the UI
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnchorView {
    pub status: AnchorStatus,
    pub reference: Option<AnchorReference>,
    pub distance_meters: Option<f64>,
    /// Bearing from the boat to the anchor
    pub bearing_deg: Option<f64>,
}

/// Everything published after each processed sample or command
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusView {
    pub anchor: AnchorView,
    pub motion: Option<MotionMetrics>,
    pub latest_position: Option<PositionSample>,
    pub tracking_interval_ms: Option<u64>,
    pub waypoint_count: usize,
    pub total_distance: TotalDistance,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorDrop {
    pub reference: AnchorReference,
    pub waypoint: Waypoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackingChange {
    Started,
    AlreadyActive,
    Stopped,
    NotActive,
}

/// Turn a caller-supplied interval into a timer period, rejecting
/// zero and negative values before anything is armed.
pub fn tracking_interval(interval_ms: i64) -> Result<Duration, EngineError> {
    if interval_ms <= 0 {
        return Err(EngineError::InvalidInterval(interval_ms));
    }
    Ok(Duration::from_millis(interval_ms as u64))
}

/// The single owner of latest position, anchor watch and track ledger.
///
/// All methods take `&mut self`; the engine worker is the only caller, which
/// serializes every append against the others.
pub struct PositionIntake {
    latest: Option<PositionSample>,
    motion: Option<MotionMetrics>,
    anchor_watch: AnchorWatch,
    anchor_status: AnchorStatus,
    ledger: TrackLedger,
    tracking_interval: Option<Duration>,
}

impl PositionIntake {
    pub fn new(anchor_radius_meters: f64) -> Self {
        Self {
            latest: None,
            motion: None,
            anchor_watch: AnchorWatch::new(anchor_radius_meters),
            anchor_status: AnchorStatus::Unset,
            ledger: TrackLedger::new(),
            tracking_interval: None,
        }
    }

    /// Accept a new fix. Invalid samples are rejected and leave state untouched.
    pub fn on_sample(&mut self, sample: PositionSample) -> Result<AnchorStatus, EngineError> {
        sample.validate()?;

        self.latest = Some(sample);
        self.motion = Some(MotionMetrics::from_sample(&sample));

        let status = self.anchor_watch.evaluate(&sample.coordinate());
        self.publish_anchor_status(status);
        Ok(status)
    }

    fn publish_anchor_status(&mut self, status: AnchorStatus) {
        if status != self.anchor_status {
            match status {
                AnchorStatus::Alarm => {
                    let distance = self
                        .latest
                        .and_then(|s| self.anchor_watch.distance_from_anchor(&s.coordinate()));
                    warn!("Anchor alarm: vessel {:.1} m from drop point (radius {:.0} m)",
                        distance.unwrap_or(f64::NAN), self.anchor_watch.radius_meters());
                }
                AnchorStatus::Safe | AnchorStatus::Unset => info!("Anchor status: {}", status.as_str()),
            }
        }
        self.anchor_status = status;
    }

    fn append(&mut self, kind: WaypointKind, now: DateTime<Utc>) -> Option<Waypoint> {
        let Some(sample) = self.latest else {
            debug!("No position yet, skipping {} waypoint", kind.as_str());
            return None;
        };
        let waypoint = self.ledger.append(sample.coordinate(), kind, now);
        info!("Waypoint {}", waypoint);
        Some(waypoint)
    }

    pub fn mark_manual(&mut self, now: DateTime<Utc>) -> Option<Waypoint> {
        self.append(WaypointKind::Manual, now)
    }

    pub fn mark_man_overboard(&mut self, now: DateTime<Utc>) -> Option<Waypoint> {
        let waypoint = self.append(WaypointKind::ManOverboard, now);
        if let Some(ref w) = waypoint {
            warn!("MAN OVERBOARD at {} ({})", w.coordinate(), w.coordinate().maps_link());
        }
        waypoint
    }

    /// Timer tick while tracking is active
    pub fn timer_fired(&mut self, now: DateTime<Utc>) -> Option<Waypoint> {
        self.append(WaypointKind::Timed, now)
    }

    /// Set the anchor at the latest position and log an `AnchorDrop` waypoint
    pub fn drop_anchor(&mut self, now: DateTime<Utc>) -> Option<AnchorDrop> {
        let Some(sample) = self.latest else {
            debug!("No position yet, ignoring drop anchor");
            return None;
        };
        let reference = self.anchor_watch.set_anchor(sample.coordinate());
        info!("Anchor dropped at {:.6}, {:.6} (radius {:.0} m)",
            reference.latitude, reference.longitude, reference.radius_meters);

        let status = self.anchor_watch.evaluate(&sample.coordinate());
        self.publish_anchor_status(status);

        let waypoint = self.ledger.append(sample.coordinate(), WaypointKind::AnchorDrop, now);
        info!("Waypoint {}", waypoint);
        Some(AnchorDrop { reference, waypoint })
    }

    pub fn raise_anchor(&mut self) -> Option<AnchorReference> {
        let cleared = self.anchor_watch.clear();
        if cleared.is_some() {
            self.publish_anchor_status(AnchorStatus::Unset);
        }
        cleared
    }

    pub fn start_tracking(&mut self, interval_ms: i64) -> Result<TrackingChange, EngineError> {
        let interval = tracking_interval(interval_ms)?;
        if let Some(active) = self.tracking_interval {
            debug!("Tracking already active every {} ms", active.as_millis());
            return Ok(TrackingChange::AlreadyActive);
        }
        self.tracking_interval = Some(interval);
        info!("Tracking started, logging every {} ms", interval.as_millis());
        Ok(TrackingChange::Started)
    }

    pub fn stop_tracking(&mut self) -> TrackingChange {
        match self.tracking_interval.take() {
            Some(_) => {
                info!("Tracking stopped");
                TrackingChange::Stopped
            }
            None => TrackingChange::NotActive,
        }
    }

    /// Replace the ledger with one rebuilt from `points`; on error the current
    /// ledger is kept
    pub fn rebuild_from_external_list(&mut self, points: &[TrackPoint], now: DateTime<Utc>) -> Result<TotalDistance, EngineError> {
        let ledger = TrackLedger::rebuild_from_external_list(points, now)?;
        if ledger.is_empty() {
            info!("Track cleared by an empty rebuild");
        } else {
            info!("Track rebuilt from {} points, {:.3} km", ledger.len(), ledger.cumulative_distance_km());
        }
        self.ledger = ledger;
        Ok(self.ledger.total_distance())
    }

    pub fn tracking_interval(&self) -> Option<Duration> {
        self.tracking_interval
    }

    pub fn ledger(&self) -> &TrackLedger {
        &self.ledger
    }

    pub fn anchor_status(&self) -> AnchorStatus {
        self.anchor_status
    }

    pub fn anchor_view(&self) -> AnchorView {
        let reference = self.anchor_watch.reference();
        let position = self.latest.map(|sample| sample.coordinate());
        let distance_meters = position
            .and_then(|p| self.anchor_watch.distance_from_anchor(&p));
        let bearing_deg = match (position, reference) {
            (Some(p), Some(r)) if distance_meters.unwrap_or(0.0) > 0.0 => {
                Some(geodesy::initial_bearing_deg(&p, &r.coordinate()))
            }
            _ => None,
        };
        AnchorView {
            status: self.anchor_status,
            reference,
            distance_meters,
            bearing_deg,
        }
    }

    pub fn status_view(&self) -> StatusView {
        StatusView {
            anchor: self.anchor_view(),
            motion: self.motion,
            latest_position: self.latest,
            tracking_interval_ms: self.tracking_interval.map(|d| d.as_millis() as u64),
            waypoint_count: self.ledger.len(),
            total_distance: self.ledger.total_distance(),
        }
    }
}
