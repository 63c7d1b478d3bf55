//! Per-tick monitoring pipeline.
//!
//! A [`Monitor`] runs `decode -> estimate -> classify -> record` once per
//! tick on a single thread. The host supplies the tick interval and at most
//! one telemetry line per tick; a tick without a line re-evaluates the most
//! recent posture, so dwell time keeps accumulating between readings.

use crate::classifier::{ClassifierState, PostureClassifier, TickOutcome};
use crate::config::Config;
use crate::dataset::{default_dataset, PressureDataset};
use crate::estimator::PressureEstimator;
use crate::recorder::{SessionEnd, SessionRecorder};
use crate::sink::SessionSink;
use crate::telemetry::{decode_line, DeviceCommand, Telemetry};
use crate::transport::{CommandSink, SourcePoll, TelemetrySource};
use crate::{AngleSample, Error, Result};
use chrono::{DateTime, Utc};
use std::time::Instant;

/// What happened during one pipeline tick
#[derive(Debug, Default)]
pub struct MonitorTick {
    /// Posture evaluated this tick (new or held over)
    pub sample: Option<AngleSample>,
    pub pressure: Option<f64>,
    pub classification: Option<TickOutcome>,
    pub row_logged: bool,
    pub calibration_ack: bool,
    /// Raw line that could not be decoded
    pub malformed: Option<String>,
    /// Row log write failure; classification above is unaffected
    pub persist_error: Option<Error>,
}

impl MonitorTick {
    /// Device command to send for this tick's feedback event, if any
    pub fn command(&self) -> Option<DeviceCommand> {
        self.classification
            .and_then(|outcome| outcome.event)
            .map(|event| event.device_command())
    }
}

/// Source of tick intervals and wall-clock stamps
pub trait TickClock {
    /// Seconds since the previous tick, and the current time
    fn next_tick(&mut self) -> (f64, DateTime<Utc>);
}

/// Fixed interval per tick, for replaying recordings
pub struct FixedStepClock {
    dt: f64,
    now: DateTime<Utc>,
}

impl FixedStepClock {
    pub fn new(dt: f64, start: DateTime<Utc>) -> Self {
        Self { dt, now: start }
    }
}

impl TickClock for FixedStepClock {
    fn next_tick(&mut self) -> (f64, DateTime<Utc>) {
        self.now += chrono::Duration::milliseconds((self.dt * 1000.0).round() as i64);
        (self.dt, self.now)
    }
}

/// Measured wall-clock interval per tick, for live devices
pub struct WallClock {
    last: Instant,
}

impl WallClock {
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TickClock for WallClock {
    fn next_tick(&mut self) -> (f64, DateTime<Utc>) {
        let now = Instant::now();
        let dt = now.duration_since(self.last).as_secs_f64();
        self.last = now;
        (dt, Utc::now())
    }
}

/// Load the configured reference table, or the built-in one
pub fn load_dataset(config: &Config) -> Result<PressureDataset> {
    match &config.estimator.dataset_path {
        Some(path) => PressureDataset::load_from(path),
        None => Ok(default_dataset().clone()),
    }
}

/// Owns all per-session state of the monitoring engine
pub struct Monitor<S> {
    estimator: PressureEstimator,
    classifier: PostureClassifier,
    recorder: SessionRecorder<S>,
    typing: bool,
    last_sample: Option<AngleSample>,
    calibrated: bool,
    dataset_empty_warned: bool,
    malformed_count: u64,
    tick_count: u64,
}

impl<S: SessionSink> Monitor<S> {
    /// Start a monitoring session
    pub fn new(config: &Config, dataset: PressureDataset, sink: S, now: DateTime<Utc>) -> Self {
        Self {
            estimator: PressureEstimator::new(dataset),
            classifier: PostureClassifier::new(config.classifier.clone()),
            recorder: SessionRecorder::open(
                sink,
                config.recorder.clone(),
                config.classifier.bad_posture_duration_threshold,
                now,
            ),
            typing: config.estimator.typing,
            last_sample: None,
            calibrated: false,
            dataset_empty_warned: false,
            malformed_count: 0,
            tick_count: 0,
        }
    }

    /// Start a session with the dataset named in the configuration
    pub fn from_config(config: &Config, sink: S, now: DateTime<Utc>) -> Result<Self> {
        config.validate()?;
        let dataset = load_dataset(config)?;
        Ok(Self::new(config, dataset, sink, now))
    }

    pub fn classifier_state(&self) -> &ClassifierState {
        self.classifier.state()
    }

    pub fn recorder(&self) -> &SessionRecorder<S> {
        &self.recorder
    }

    pub fn estimator(&self) -> &PressureEstimator {
        &self.estimator
    }

    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    pub fn malformed_count(&self) -> u64 {
        self.malformed_count
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Run one tick with an optional new telemetry line
    pub fn tick(&mut self, line: Option<&str>, dt: f64, now: DateTime<Utc>) -> MonitorTick {
        self.tick_count += 1;
        let mut report = MonitorTick::default();

        if let Some(line) = line {
            match decode_line(line) {
                Telemetry::Sample(sample) => self.last_sample = Some(sample.to_angles()),
                Telemetry::CalibrationAck => {
                    self.calibrated = true;
                    report.calibration_ack = true;
                    tracing::info!("Device calibration acknowledged");
                }
                Telemetry::Malformed(raw) => {
                    self.malformed_count += 1;
                    tracing::warn!("{}", Error::MalformedTelemetry(raw.clone()));
                    report.malformed = Some(raw);
                }
            }
        }

        let Some(sample) = self.last_sample else {
            self.recorder.advance_clock(dt);
            return report;
        };

        let pressure = self.estimate(sample);
        let outcome = self.classifier.tick(pressure, dt);

        tracing::debug!(
            "V:{:.1} H:{:.1} pressure={:.2} zone={} dwell={:.1}s",
            sample.flexion_extension,
            sample.radial_ulnar,
            pressure,
            outcome.zone,
            outcome.dwell_seconds
        );

        match self.recorder.on_tick(sample, pressure, &outcome, now) {
            Ok(logged) => report.row_logged = logged,
            Err(e) => {
                tracing::warn!("Row log write failed, session continues: {}", e);
                report.persist_error = Some(e);
            }
        }

        report.sample = Some(sample);
        report.pressure = Some(pressure);
        report.classification = Some(outcome);
        report
    }

    fn estimate(&mut self, sample: AngleSample) -> f64 {
        match self.estimator.estimate(sample, self.typing) {
            Ok(estimate) => estimate.pressure,
            Err(e) => {
                if !self.dataset_empty_warned {
                    tracing::warn!("{}; all pressures will read 0", e);
                    self.dataset_empty_warned = true;
                }
                0.0
            }
        }
    }

    /// Ask the device to calibrate; it answers with `CALIBRATED`
    pub fn request_calibration<C: CommandSink>(&mut self, commands: &mut C) -> Result<()> {
        self.calibrated = false;
        commands.send(DeviceCommand::Calibrate)?;
        tracing::info!("Requested device calibration");
        Ok(())
    }

    /// Drive the pipeline from a telemetry source until it closes
    ///
    /// Feedback commands go to `commands`; send failures are logged and do
    /// not stop the loop. Only a failing source ends the run early; the
    /// session stays open either way, so the caller still sends
    /// [`Monitor::shutdown_command`] and calls [`Monitor::finish`].
    pub fn run<T, C, K, F>(
        &mut self,
        source: &mut T,
        commands: &mut C,
        clock: &mut K,
        mut observe: F,
    ) -> Result<u64>
    where
        T: TelemetrySource,
        C: CommandSink,
        K: TickClock,
        F: FnMut(&MonitorTick),
    {
        let mut ticks = 0;
        loop {
            let line = match source.poll_line()? {
                SourcePoll::Line(line) => Some(line),
                SourcePoll::NoData => None,
                SourcePoll::Closed => break,
            };

            let (dt, now) = clock.next_tick();
            let report = self.tick(line.as_deref(), dt, now);

            if let Some(command) = report.command() {
                if let Err(e) = commands.send(command) {
                    tracing::warn!("Could not send {} to device: {}", command, e);
                }
            }

            observe(&report);
            ticks += 1;
        }

        tracing::info!(
            "Telemetry closed after {} ticks ({} malformed lines)",
            ticks,
            self.malformed_count
        );
        Ok(ticks)
    }

    /// Command that silences the device if sustained feedback is running
    pub fn shutdown_command(&self) -> Option<DeviceCommand> {
        self.classifier
            .state()
            .feedback_active
            .then_some(DeviceCommand::VibrationOff)
    }

    /// End the session and write its artifacts
    pub fn finish(self, now: DateTime<Utc>) -> SessionEnd {
        self.recorder.finalize(now)
    }
}
