use serde::{Deserialize, Serialize};
use std::fmt;

/// Simulated seconds in one day.
pub const SECONDS_PER_DAY: f64 = 86_400.0;
/// Default length of a season: ninety days.
pub const DEFAULT_SEASON_DURATION: f64 = 90.0 * SECONDS_PER_DAY;

/// Season of the year; modulates reproduction.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Season {
    #[default]
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    /// Fertility multiplier: applied as an acceptance probability and as an
    /// offspring-count factor.
    #[must_use]
    pub const fn fertility_modifier(self) -> f64 {
        match self {
            Season::Spring => 1.2,
            Season::Summer => 1.0,
            Season::Fall => 0.8,
            Season::Winter => 0.6,
        }
    }

    /// Lowercase season name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Fall => "fall",
            Season::Winter => "winter",
        }
    }

    /// Numeric code used in metric samples (spring = 0).
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        match self {
            Season::Spring => 0,
            Season::Summer => 1,
            Season::Fall => 2,
            Season::Winter => 3,
        }
    }

    /// Season in effect at simulated time `time` for seasons of `duration` seconds.
    #[must_use]
    pub fn at(time: f64, duration: f64) -> Self {
        if !(duration > 0.0) || !time.is_finite() {
            return Season::Spring;
        }
        let year = 4.0 * duration;
        let phase = (time.rem_euclid(year) / duration).floor() as usize;
        Self::ALL[phase.min(3)]
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks season boundaries as simulated time advances.
#[derive(Debug, Clone, PartialEq)]
pub struct SeasonTracker {
    duration: f64,
    current: Season,
}

impl SeasonTracker {
    /// Creates a tracker starting in spring.
    #[must_use]
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            current: Season::Spring,
        }
    }

    /// Returns the season last reported.
    #[must_use]
    pub const fn current(&self) -> Season {
        self.current
    }

    #[must_use]
    pub const fn duration(&self) -> f64 {
        self.duration
    }

    /// Recompute the season; returns the new season when it changed.
    pub fn update(&mut self, time: f64) -> Option<Season> {
        let season = Season::at(time, self.duration);
        if season == self.current {
            return None;
        }
        self.current = season;
        Some(season)
    }

    /// Rewind to spring.
    pub fn reset(&mut self) {
        self.current = Season::Spring;
    }
}
