use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::anchor_watch::{AnchorReference, AnchorStatus};
use crate::app_metrics::{EngineMetrics, MetricsLogger};
use crate::config::Config;
use crate::error::EngineError;
use crate::position::PositionSample;
use crate::position_intake::{AnchorDrop, PositionIntake, StatusView, TrackingChange};
use crate::track_ledger::{TotalDistance, TrackPoint, Waypoint};

type Reply<T> = oneshot::Sender<T>;

/// Requests from the UI side, each answered over its own oneshot channel
pub enum Command {
    MarkManual(Reply<Option<Waypoint>>),
    MarkManOverboard(Reply<Option<Waypoint>>),
    DropAnchor(Reply<Option<AnchorDrop>>),
    RaiseAnchor(Reply<Option<AnchorReference>>),
    StartTracking(i64, Reply<Result<TrackingChange, EngineError>>),
    StopTracking(Reply<TrackingChange>),
    Rebuild(Vec<TrackPoint>, Reply<Result<TotalDistance, EngineError>>),
    Waypoints(Reply<Vec<Waypoint>>),
    Track(Reply<(Vec<Waypoint>, TotalDistance)>),
    TrackPoints(Reply<Vec<TrackPoint>>),
    Status(Reply<StatusView>),
}

/// Everything that can mutate engine state, processed strictly in arrival order
pub enum EngineEvent {
    SampleArrived(PositionSample, Option<Reply<Result<AnchorStatus, EngineError>>>),
    SensorError(String),
    Command(Command),
}

/// Cloneable front door to the engine worker
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineEvent>,
    status_rx: watch::Receiver<StatusView>,
    samples_dropped: Arc<AtomicU64>,
}

pub struct Engine;

impl Engine {
    /// Spawn the worker task on the current tokio runtime
    pub fn spawn(config: &Config) -> (EngineHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.engine.queue_capacity);
        let intake = PositionIntake::new(config.anchor.radius_meters);
        let (status_tx, status_rx) = watch::channel(intake.status_view());
        let samples_dropped = Arc::new(AtomicU64::new(0));

        let worker = EngineWorker {
            rx,
            intake,
            status_tx,
            timer: None,
            metrics: EngineMetrics::new(),
            metrics_logger: MetricsLogger::new(config.engine.metrics_log_interval()),
            samples_dropped: samples_dropped.clone(),
        };
        let housekeeping = config.engine.metrics_log_interval();
        let task = tokio::spawn(worker.run(housekeeping));

        (EngineHandle { tx, status_rx, samples_dropped }, task)
    }
}

impl EngineHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineEvent::Command(build(reply_tx)))
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        reply_rx.await.map_err(|_| EngineError::EngineStopped)
    }

    /// Process a sample and wait for the resulting anchor status
    pub async fn on_sample(&self, sample: PositionSample) -> Result<AnchorStatus, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineEvent::SampleArrived(sample, Some(reply_tx)))
            .await
            .map_err(|_| EngineError::EngineStopped)?;
        reply_rx.await.map_err(|_| EngineError::EngineStopped)?
    }

    /// Fire-and-forget delivery for the sensor driver. A full queue drops the
    /// sample rather than blocking the driver.
    pub fn submit_sample(&self, sample: PositionSample) -> Result<(), EngineError> {
        match self.tx.try_send(EngineEvent::SampleArrived(sample, None)) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                let dropped = self.samples_dropped.fetch_add(1, Ordering::Relaxed) + 1;
                if dropped % 100 == 1 {
                    warn!("Engine queue full, dropped {} samples so far", dropped);
                }
                Ok(())
            }
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineError::EngineStopped),
        }
    }

    pub fn report_sensor_error(&self, message: String) -> Result<(), EngineError> {
        match self.tx.try_send(EngineEvent::SensorError(message)) {
            Err(mpsc::error::TrySendError::Closed(_)) => Err(EngineError::EngineStopped),
            _ => Ok(()),
        }
    }

    pub async fn mark_manual(&self) -> Result<Option<Waypoint>, EngineError> {
        self.request(Command::MarkManual).await
    }

    pub async fn mark_man_overboard(&self) -> Result<Option<Waypoint>, EngineError> {
        self.request(Command::MarkManOverboard).await
    }

    pub async fn drop_anchor(&self) -> Result<Option<AnchorDrop>, EngineError> {
        self.request(Command::DropAnchor).await
    }

    pub async fn raise_anchor(&self) -> Result<Option<AnchorReference>, EngineError> {
        self.request(Command::RaiseAnchor).await
    }

    pub async fn start_tracking(&self, interval_ms: i64) -> Result<TrackingChange, EngineError> {
        self.request(|reply| Command::StartTracking(interval_ms, reply)).await?
    }

    pub async fn stop_tracking(&self) -> Result<TrackingChange, EngineError> {
        self.request(Command::StopTracking).await
    }

    pub async fn rebuild_from_external_list(&self, points: Vec<TrackPoint>) -> Result<TotalDistance, EngineError> {
        self.request(|reply| Command::Rebuild(points, reply)).await?
    }

    pub async fn waypoints(&self) -> Result<Vec<Waypoint>, EngineError> {
        self.request(Command::Waypoints).await
    }

    /// Waypoints and their total taken from the same ledger state
    pub async fn track(&self) -> Result<(Vec<Waypoint>, TotalDistance), EngineError> {
        self.request(Command::Track).await
    }

    /// Ledger in the form accepted by `rebuild_from_external_list`
    pub async fn track_points(&self) -> Result<Vec<TrackPoint>, EngineError> {
        self.request(Command::TrackPoints).await
    }

    pub async fn status(&self) -> Result<StatusView, EngineError> {
        self.request(Command::Status).await
    }

    pub async fn total_distance(&self) -> Result<TotalDistance, EngineError> {
        Ok(self.status().await?.total_distance)
    }

    /// Status as last published by the worker, without a round trip
    pub fn subscribe(&self) -> watch::Receiver<StatusView> {
        self.status_rx.clone()
    }
}

struct EngineWorker {
    rx: mpsc::Receiver<EngineEvent>,
    intake: PositionIntake,
    status_tx: watch::Sender<StatusView>,
    timer: Option<Interval>,
    metrics: EngineMetrics,
    metrics_logger: MetricsLogger,
    samples_dropped: Arc<AtomicU64>,
}

async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

impl EngineWorker {
    async fn run(mut self, housekeeping_period: Duration) {
        info!("Position engine started");
        let mut housekeeping = time::interval(housekeeping_period);

        loop {
            tokio::select! {
                event = self.rx.recv() => {
                    match event {
                        Some(event) => self.handle_event(event),
                        None => break,
                    }
                }
                _ = next_tick(&mut self.timer) => {
                    let waypoint = self.intake.timer_fired(Utc::now());
                    self.count_mark(&waypoint);
                }
                _ = housekeeping.tick() => {}
            }

            self.status_tx.send_replace(self.intake.status_view());
            self.metrics.samples_dropped += self.samples_dropped.swap(0, Ordering::Relaxed);
            self.metrics_logger.check_and_log(&mut self.metrics);
        }

        info!("Position engine stopped");
    }

    fn handle_event(&mut self, event: EngineEvent) {
        match event {
            EngineEvent::SampleArrived(sample, reply) => {
                let previous = self.intake.anchor_status();
                let result = self.intake.on_sample(sample);
                match result {
                    Ok(status) => {
                        self.metrics.samples_accepted += 1;
                        if status == AnchorStatus::Alarm && previous != AnchorStatus::Alarm {
                            self.metrics.anchor_alarms += 1;
                        }
                    }
                    Err(ref e) => {
                        self.metrics.samples_rejected += 1;
                        warn!("Rejected position sample: {}", e);
                    }
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            EngineEvent::SensorError(message) => {
                // Keep the last known position, just record the gap
                self.metrics.sensor_errors += 1;
                warn!("Sensor unavailable: {}", message);
            }
            EngineEvent::Command(command) => self.handle_command(command),
        }
    }

    fn handle_command(&mut self, command: Command) {
        let now = Utc::now();
        match command {
            Command::MarkManual(reply) => {
                let waypoint = self.intake.mark_manual(now);
                self.count_mark(&waypoint);
                let _ = reply.send(waypoint);
            }
            Command::MarkManOverboard(reply) => {
                let waypoint = self.intake.mark_man_overboard(now);
                self.count_mark(&waypoint);
                let _ = reply.send(waypoint);
            }
            Command::DropAnchor(reply) => {
                let drop = self.intake.drop_anchor(now);
                match drop {
                    Some(_) => self.metrics.waypoints_logged += 1,
                    None => self.metrics.marks_skipped += 1,
                }
                let _ = reply.send(drop);
            }
            Command::RaiseAnchor(reply) => {
                let _ = reply.send(self.intake.raise_anchor());
            }
            Command::StartTracking(interval_ms, reply) => {
                let result = self.intake.start_tracking(interval_ms);
                if let (Ok(TrackingChange::Started), Some(period)) = (&result, self.intake.tracking_interval()) {
                    // First log happens right away, the timer takes over one period later
                    let waypoint = self.intake.timer_fired(now);
                    self.count_mark(&waypoint);
                    let mut interval = time::interval_at(Instant::now() + period, period);
                    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    self.timer = Some(interval);
                }
                let _ = reply.send(result);
            }
            Command::StopTracking(reply) => {
                let change = self.intake.stop_tracking();
                self.timer = None;
                let _ = reply.send(change);
            }
            Command::Rebuild(points, reply) => {
                let _ = reply.send(self.intake.rebuild_from_external_list(&points, now));
            }
            Command::Waypoints(reply) => {
                let _ = reply.send(self.intake.ledger().waypoints().to_vec());
            }
            Command::Track(reply) => {
                let ledger = self.intake.ledger();
                let _ = reply.send((ledger.waypoints().to_vec(), ledger.total_distance()));
            }
            Command::TrackPoints(reply) => {
                let _ = reply.send(self.intake.ledger().to_track_points());
            }
            Command::Status(reply) => {
                let _ = reply.send(self.intake.status_view());
            }
        }
    }

    fn count_mark(&mut self, waypoint: &Option<Waypoint>) {
        match waypoint {
            Some(_) => self.metrics.waypoints_logged += 1,
            None => {
                self.metrics.marks_skipped += 1;
                debug!("Mark skipped, no position known");
            }
        }
    }
}
