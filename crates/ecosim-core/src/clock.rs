use crate::error::{ConfigError, SimulationError};
use crate::season::SECONDS_PER_DAY;
use std::time::{Duration, Instant};

/// Smallest time scale a [`SimulationClock`] runs at.
pub const MIN_TIME_SCALE: f64 = 0.1;

/// Converts real elapsed time into simulated time.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    current_time: f64,
    time_scale: f64,
    real_start: Option<Instant>,
    running: bool,
}

impl SimulationClock {
    /// Create a stopped clock at time zero.
    pub fn new(time_scale: f64) -> Result<Self, ConfigError> {
        if !(time_scale.is_finite() && time_scale >= MIN_TIME_SCALE) {
            return Err(ConfigError::OutOfRange {
                name: "time_scale",
                value: time_scale,
                min: MIN_TIME_SCALE,
                max: f64::MAX,
            });
        }
        Ok(Self {
            current_time: 0.0,
            time_scale,
            real_start: None,
            running: false,
        })
    }

    /// Simulated seconds elapsed.
    #[must_use]
    pub const fn current_time(&self) -> f64 {
        self.current_time
    }

    /// Simulated seconds per real second.
    #[must_use]
    pub const fn time_scale(&self) -> f64 {
        self.time_scale
    }

    /// Returns true if the clock is running.
    #[must_use]
    pub const fn is_running(&self) -> bool {
        self.running
    }

    /// Wall-clock time since [`start`](Self::start), if it has been called.
    #[must_use]
    pub fn real_elapsed(&self) -> Option<Duration> {
        self.real_start.map(|start| start.elapsed())
    }

    /// Returns false when the clock was already running.
    pub fn start(&mut self) -> bool {
        if self.running {
            return false;
        }
        self.real_start = Some(Instant::now());
        self.running = true;
        true
    }

    /// Returns false when the clock was not running.
    pub fn stop(&mut self) -> bool {
        if !self.running {
            return false;
        }
        self.running = false;
        true
    }

    /// Stop the clock and rewind to zero.
    pub fn reset(&mut self) {
        self.current_time = 0.0;
        self.real_start = None;
        self.running = false;
    }

    /// Advance by `real_delta` seconds of wall time, returning the simulated delta.
    pub fn tick(&mut self, real_delta: f64) -> Result<f64, SimulationError> {
        if !(real_delta.is_finite() && real_delta >= 0.0) {
            return Err(SimulationError::InvalidDelta(real_delta));
        }
        if !self.running {
            return Err(SimulationError::ClockStopped);
        }
        let sim_delta = real_delta * self.time_scale;
        self.current_time += sim_delta;
        Ok(sim_delta)
    }

    /// Set the speed multiplier, raised to at least [`MIN_TIME_SCALE`].
    pub fn set_time_scale(&mut self, scale: f64) -> f64 {
        self.time_scale = if scale.is_finite() {
            scale.max(MIN_TIME_SCALE)
        } else {
            MIN_TIME_SCALE
        };
        self.time_scale
    }

    /// Current time rendered as `Day D, HH:MM`.
    #[must_use]
    pub fn formatted_time(&self) -> String {
        let total = self.current_time.max(0.0);
        let days = (total / SECONDS_PER_DAY).floor() as u64;
        let hours = ((total % SECONDS_PER_DAY) / 3_600.0).floor() as u64;
        let minutes = ((total % 3_600.0) / 60.0).floor() as u64;
        format!("Day {days}, {hours:02}:{minutes:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_scale_below_minimum() {
        assert!(SimulationClock::new(0.0).is_err());
        assert!(SimulationClock::new(-1.0).is_err());
        assert!(matches!(
            SimulationClock::new(0.05),
            Err(ConfigError::OutOfRange { .. })
        ));
        assert!(SimulationClock::new(MIN_TIME_SCALE).is_ok());
    }

    #[test]
    fn tick_requires_running_clock() {
        let mut clock = SimulationClock::new(2.0).expect("clock");
        assert!(matches!(clock.tick(1.0), Err(SimulationError::ClockStopped)));
        assert!(clock.start());
        assert!(!clock.start());
        assert_eq!(clock.tick(1.5).expect("tick"), 3.0);
        assert_eq!(clock.current_time(), 3.0);
        assert!(matches!(
            clock.tick(-1.0),
            Err(SimulationError::InvalidDelta(_))
        ));
    }

    #[test]
    fn reset_stops_and_rewinds() {
        let mut clock = SimulationClock::new(1.0).expect("clock");
        clock.start();
        clock.tick(10.0).expect("tick");
        clock.reset();
        assert_eq!(clock.current_time(), 0.0);
        assert!(!clock.is_running());
        assert!(clock.real_elapsed().is_none());
    }

    #[test]
    fn small_or_invalid_scale_is_raised_to_minimum() {
        let mut clock = SimulationClock::new(1.0).expect("clock");
        assert_eq!(clock.set_time_scale(-5.0), MIN_TIME_SCALE);
        assert_eq!(clock.set_time_scale(0.05), MIN_TIME_SCALE);
        assert_eq!(clock.set_time_scale(f64::NAN), MIN_TIME_SCALE);
        assert_eq!(clock.set_time_scale(4.0), 4.0);
    }

    #[test]
    fn formats_days_hours_minutes() {
        let mut clock = SimulationClock::new(1.0).expect("clock");
        clock.start();
        clock
            .tick(5.0 * SECONDS_PER_DAY + 12.0 * 3_600.0 + 30.0 * 60.0)
            .expect("tick");
        assert_eq!(clock.formatted_time(), "Day 5, 12:30");
    }
}
