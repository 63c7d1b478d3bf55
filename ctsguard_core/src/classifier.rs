//! Posture classification state machine.
//!
//! Each tick takes one pressure value and the elapsed time since the previous
//! tick, updates the zone and the Red dwell timer, and decides whether any
//! feedback fires:
//!
//! - Sustained feedback starts once the wearer has stayed in Red for
//!   `bad_posture_duration_threshold` seconds, and stops on the first tick
//!   outside Red.
//! - Before that, Red ticks produce single pulses, at most one per
//!   `pulse_cooldown` seconds.
//! - Leaving Red resets the dwell timer to zero. There is no decay.
//!
//! All timing uses the session clock (the sum of tick `dt`s), so replaying a
//! recording produces the same events as the live session did.

use crate::config::ClassifierConfig;
use crate::telemetry::DeviceCommand;
use crate::Zone;

/// Slack for comparing intervals on the accumulated session clock
pub(crate) const CLOCK_EPSILON: f64 = 1e-9;

/// Feedback decision produced by a tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ClassifierEvent {
    StartContinuousFeedback,
    StopContinuousFeedback,
    PulseFeedback,
}

/// Output channel a feedback event addresses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FeedbackChannel {
    Haptic,
    Audible,
    Visual,
}

const ALL_CHANNELS: &[FeedbackChannel] = &[
    FeedbackChannel::Haptic,
    FeedbackChannel::Audible,
    FeedbackChannel::Visual,
];

impl ClassifierEvent {
    /// Command for the wrist device
    pub fn device_command(&self) -> DeviceCommand {
        match self {
            ClassifierEvent::StartContinuousFeedback => DeviceCommand::VibrationOn,
            ClassifierEvent::StopContinuousFeedback => DeviceCommand::VibrationOff,
            ClassifierEvent::PulseFeedback => DeviceCommand::VibrationPulse,
        }
    }

    /// Channels switched on (start, pulse) or off (stop) by this event
    pub fn channels(&self) -> &'static [FeedbackChannel] {
        match self {
            ClassifierEvent::StartContinuousFeedback
            | ClassifierEvent::StopContinuousFeedback => ALL_CHANNELS,
            ClassifierEvent::PulseFeedback => &[FeedbackChannel::Haptic],
        }
    }

    pub fn is_sustained(&self) -> bool {
        !matches!(self, ClassifierEvent::PulseFeedback)
    }
}

/// Mutable classifier state, reset at session start
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifierState {
    pub zone: Zone,
    /// Continuous seconds spent in Red
    pub dwell_timer: f64,
    pub feedback_active: bool,
    /// A pulse has fired during the current Red episode
    ///
    /// Display state only. Pulses are gated by `last_pulse_at` and the
    /// cooldown, which carries across Red episodes.
    pub pulse_sent: bool,
    /// Session clock of the last pulse
    pub last_pulse_at: Option<f64>,
    /// Session clock, in seconds
    pub clock: f64,
}

impl Default for ClassifierState {
    fn default() -> Self {
        Self {
            zone: Zone::Green,
            dwell_timer: 0.0,
            feedback_active: false,
            pulse_sent: false,
            last_pulse_at: None,
            clock: 0.0,
        }
    }
}

/// Result of one classifier tick
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickOutcome {
    pub zone: Zone,
    pub previous_zone: Zone,
    /// Interval applied by this tick, after sanitizing
    pub dt: f64,
    /// False when the pressure was NaN or infinite and the tick was skipped
    pub pressure_valid: bool,
    /// Pressure is at or above the deep red alert boundary
    pub deep_red: bool,
    pub dwell_seconds: f64,
    pub feedback_active: bool,
    pub event: Option<ClassifierEvent>,
}

impl TickOutcome {
    pub fn zone_changed(&self) -> bool {
        self.zone != self.previous_zone
    }
}

/// Zone tracker with dwell timing and debounced feedback
#[derive(Clone, Debug)]
pub struct PostureClassifier {
    config: ClassifierConfig,
    state: ClassifierState,
}

impl PostureClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            state: ClassifierState::default(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn state(&self) -> &ClassifierState {
        &self.state
    }

    /// Start a new session from a clean state
    pub fn reset(&mut self) {
        self.state = ClassifierState::default();
    }

    /// Instantaneous zone for a pressure value
    pub fn zone_for(&self, pressure: f64) -> Zone {
        Zone::classify(
            pressure,
            self.config.medium_threshold,
            self.config.high_threshold,
        )
    }

    /// Advance by `dt` seconds with a new pressure reading
    pub fn tick(&mut self, pressure: f64, dt: f64) -> TickOutcome {
        let dt = sanitize_dt(dt);
        let previous_zone = self.state.zone;
        self.state.clock += dt;

        if !pressure.is_finite() {
            tracing::debug!("Skipping invalid pressure {} at t={:.2}", pressure, self.state.clock);
            return self.outcome(previous_zone, dt, false, false, None);
        }

        let zone = self.zone_for(pressure);
        self.state.zone = zone;

        let event = if zone == Zone::Red {
            self.on_red(dt)
        } else {
            self.on_below_red()
        };

        if let Some(event) = event {
            tracing::debug!(
                "{:?} at t={:.2} (pressure {:.2}, dwell {:.2}s)",
                event,
                self.state.clock,
                pressure,
                self.state.dwell_timer
            );
        }

        let deep_red = pressure >= self.config.deep_red_threshold;
        self.outcome(previous_zone, dt, true, deep_red, event)
    }

    fn on_red(&mut self, dt: f64) -> Option<ClassifierEvent> {
        self.state.dwell_timer += dt;

        if self.state.feedback_active {
            return None;
        }

        if self.state.dwell_timer >= self.config.bad_posture_duration_threshold {
            self.state.feedback_active = true;
            tracing::info!(
                "Sustained high pressure for {:.1}s, starting continuous feedback",
                self.state.dwell_timer
            );
            return Some(ClassifierEvent::StartContinuousFeedback);
        }

        if self.pulse_due() {
            self.state.pulse_sent = true;
            self.state.last_pulse_at = Some(self.state.clock);
            return Some(ClassifierEvent::PulseFeedback);
        }

        None
    }

    fn on_below_red(&mut self) -> Option<ClassifierEvent> {
        self.state.dwell_timer = 0.0;
        self.state.pulse_sent = false;

        if self.state.feedback_active {
            self.state.feedback_active = false;
            tracing::info!("Pressure back below high threshold, stopping continuous feedback");
            return Some(ClassifierEvent::StopContinuousFeedback);
        }

        None
    }

    fn pulse_due(&self) -> bool {
        match self.state.last_pulse_at {
            Some(at) => self.state.clock - at >= self.config.pulse_cooldown - CLOCK_EPSILON,
            None => true,
        }
    }

    fn outcome(
        &self,
        previous_zone: Zone,
        dt: f64,
        pressure_valid: bool,
        deep_red: bool,
        event: Option<ClassifierEvent>,
    ) -> TickOutcome {
        TickOutcome {
            zone: self.state.zone,
            previous_zone,
            dt,
            pressure_valid,
            deep_red,
            dwell_seconds: self.state.dwell_timer,
            feedback_active: self.state.feedback_active,
            event,
        }
    }
}

fn sanitize_dt(dt: f64) -> f64 {
    if dt.is_finite() && dt >= 0.0 {
        dt
    } else {
        tracing::warn!("Ignoring invalid tick interval {}", dt);
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier(duration: f64, cooldown: f64) -> PostureClassifier {
        PostureClassifier::new(ClassifierConfig {
            bad_posture_duration_threshold: duration,
            pulse_cooldown: cooldown,
            ..ClassifierConfig::default()
        })
    }

    fn events(c: &mut PostureClassifier, pressures: &[f64], dt: f64) -> Vec<Option<ClassifierEvent>> {
        pressures.iter().map(|&p| c.tick(p, dt).event).collect()
    }

    #[test]
    fn test_zones_follow_thresholds() {
        let mut c = classifier(10.0, 1.0);
        assert_eq!(c.tick(1.0, 0.1).zone, Zone::Green);
        assert_eq!(c.tick(2.5, 0.1).zone, Zone::Yellow);
        assert_eq!(c.tick(3.0, 0.1).zone, Zone::Red);
        assert_eq!(c.tick(2.1, 0.1).zone, Zone::Yellow);
    }

    #[test]
    fn test_deep_red_flag() {
        let mut c = classifier(10.0, 1.0);
        let outcome = c.tick(3.05, 0.1);
        assert_eq!(outcome.zone, Zone::Red);
        assert!(!outcome.deep_red);
        assert!(c.tick(3.1, 0.1).deep_red);
    }

    #[test]
    fn test_continuous_feedback_starts_once_at_threshold() {
        let mut c = classifier(10.0, 1.0);
        let evs = events(&mut c, &[3.5; 15], 1.0);

        let starts: Vec<usize> = evs
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == Some(ClassifierEvent::StartContinuousFeedback))
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(starts, vec![10]);

        // No pulses once sustained feedback is running
        assert!(evs[10..].iter().all(|e| e.is_none()));
        assert!(c.state().feedback_active);
        assert_eq!(c.state().dwell_timer, 15.0);
    }

    #[test]
    fn test_stop_only_after_start() {
        let mut c = classifier(2.0, 1.0);

        // Short excursion never reaches the threshold: no stop event
        let evs = events(&mut c, &[3.5, 1.0], 1.0);
        assert_eq!(evs[1], None);

        let evs = events(&mut c, &[3.5, 3.5, 3.5, 1.0, 1.0], 1.0);
        assert_eq!(evs[1], Some(ClassifierEvent::StartContinuousFeedback));
        assert_eq!(evs[2], None);
        assert_eq!(evs[3], Some(ClassifierEvent::StopContinuousFeedback));
        assert_eq!(evs[4], None);
        assert!(!c.state().feedback_active);
    }

    #[test]
    fn test_yellow_stops_feedback_too() {
        let mut c = classifier(1.0, 1.0);
        events(&mut c, &[3.5], 1.0);
        assert!(c.state().feedback_active);
        assert_eq!(
            c.tick(2.5, 1.0).event,
            Some(ClassifierEvent::StopContinuousFeedback)
        );
    }

    #[test]
    fn test_dwell_resets_to_zero_on_leaving_red() {
        let mut c = classifier(100.0, 1.0);
        for _ in 0..7 {
            c.tick(4.0, 1.5);
        }
        assert_eq!(c.state().dwell_timer, 10.5);

        let outcome = c.tick(2.5, 0.25);
        assert_eq!(outcome.dwell_seconds, 0.0);
        assert_eq!(c.state().dwell_timer, 0.0);

        // Coming back starts from scratch
        c.tick(4.0, 0.5);
        assert_eq!(c.state().dwell_timer, 0.5);
    }

    #[test]
    fn test_dwell_hard_reset_prevents_start() {
        let mut c = classifier(3.0, 10.0);
        let evs = events(&mut c, &[3.5, 3.5, 1.0, 3.5, 3.5, 1.0], 1.0);
        assert!(!evs.contains(&Some(ClassifierEvent::StartContinuousFeedback)));
    }

    #[test]
    fn test_pulses_are_rate_limited() {
        let mut c = classifier(100.0, 1.0);

        // Two Red ticks 0.5s apart: one pulse
        let evs = events(&mut c, &[3.5, 3.5], 0.5);
        assert_eq!(evs[0], Some(ClassifierEvent::PulseFeedback));
        assert_eq!(evs[1], None);

        // Another 0.5s completes the cooldown window
        assert_eq!(c.tick(3.5, 0.5).event, Some(ClassifierEvent::PulseFeedback));
        assert_eq!(c.state().last_pulse_at, Some(1.5));
    }

    #[test]
    fn test_pulse_cooldown_survives_zone_exit() {
        let mut c = classifier(100.0, 1.0);
        let evs = events(&mut c, &[3.5, 1.0, 3.5], 0.25);
        assert_eq!(evs[0], Some(ClassifierEvent::PulseFeedback));
        assert_eq!(evs[2], None);
    }

    #[test]
    fn test_pulse_sent_cleared_outside_red() {
        let mut c = classifier(100.0, 1.0);
        c.tick(3.5, 0.1);
        assert!(c.state().pulse_sent);
        c.tick(2.0, 0.1);
        assert!(!c.state().pulse_sent);

        // A cleared flag does not bypass the cooldown
        assert_eq!(c.tick(3.5, 0.1).event, None);
        assert!(!c.state().pulse_sent);
    }

    #[test]
    fn test_pulse_cadence_with_fractional_ticks() {
        let mut c = classifier(100.0, 0.3);
        let evs = events(&mut c, &[3.5; 16], 0.1);
        let pulse_ticks: Vec<usize> = evs
            .iter()
            .enumerate()
            .filter(|(_, e)| **e == Some(ClassifierEvent::PulseFeedback))
            .map(|(i, _)| i + 1)
            .collect();
        assert_eq!(pulse_ticks, vec![1, 4, 7, 10, 13, 16]);
    }

    #[test]
    fn test_pulses_precede_sustained_feedback() {
        let mut c = classifier(10.0, 1.0);
        let evs = events(&mut c, &[3.5; 10], 1.0);
        assert!(evs[..9]
            .iter()
            .all(|e| *e == Some(ClassifierEvent::PulseFeedback)));
        assert_eq!(evs[9], Some(ClassifierEvent::StartContinuousFeedback));
    }

    #[test]
    fn test_invalid_pressure_is_skipped() {
        let mut c = classifier(2.0, 1.0);
        c.tick(3.5, 1.0);

        let outcome = c.tick(f64::NAN, 1.0);
        assert!(!outcome.pressure_valid);
        assert_eq!(outcome.zone, Zone::Red);
        assert_eq!(outcome.event, None);
        assert_eq!(c.state().dwell_timer, 1.0);

        c.tick(f64::INFINITY, 1.0);
        assert_eq!(c.state().dwell_timer, 1.0);
        assert_eq!(c.state().clock, 3.0);

        // Ticking carries on normally afterwards
        assert_eq!(
            c.tick(3.5, 1.0).event,
            Some(ClassifierEvent::StartContinuousFeedback)
        );
    }

    #[test]
    fn test_invalid_dt_counts_as_zero() {
        let mut c = classifier(2.0, 1.0);
        c.tick(3.5, f64::NAN);
        c.tick(3.5, -1.0);
        assert_eq!(c.state().dwell_timer, 0.0);
        assert_eq!(c.state().clock, 0.0);
    }

    #[test]
    fn test_reset_restores_initial_state() {
        let mut c = classifier(1.0, 1.0);
        events(&mut c, &[3.5, 3.5], 1.0);
        c.reset();
        assert_eq!(c.state(), &ClassifierState::default());
    }

    #[test]
    fn test_event_mappings() {
        assert_eq!(
            ClassifierEvent::StartContinuousFeedback.device_command(),
            DeviceCommand::VibrationOn
        );
        assert_eq!(
            ClassifierEvent::StopContinuousFeedback.device_command(),
            DeviceCommand::VibrationOff
        );
        assert_eq!(
            ClassifierEvent::PulseFeedback.device_command(),
            DeviceCommand::VibrationPulse
        );
        assert_eq!(
            ClassifierEvent::PulseFeedback.channels(),
            &[FeedbackChannel::Haptic]
        );
        assert_eq!(ClassifierEvent::StartContinuousFeedback.channels().len(), 3);
        assert!(!ClassifierEvent::PulseFeedback.is_sustained());
    }

    #[test]
    fn test_zone_change_reported() {
        let mut c = classifier(10.0, 1.0);
        assert!(!c.tick(1.0, 0.1).zone_changed());
        assert!(c.tick(2.5, 0.1).zone_changed());
        assert!(!c.tick(2.6, 0.1).zone_changed());
    }
}
