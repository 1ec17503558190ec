//! Half-hour clock arithmetic for committed delivery windows.
//!
//! The scheduler keeps its running clock in exact fractional hours. Only when a
//! stop is committed is the arrival floored and the departure ceiled to the
//! half-hour grid, so the rendered window always covers the computed visit.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Width of one grid slot.
pub const SLOT_MINUTES: u32 = 30;

/// Wall-clock time in minutes since midnight of the planning day.
///
/// Values past 24:00 are kept as-is (`24:30`) rather than wrapped, so a window
/// that spills over midnight still reads `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClockTime {
    minutes: u32,
}

impl ClockTime {
    pub const fn from_minutes(minutes: u32) -> Self {
        Self { minutes }
    }

    pub const fn hm(hours: u32, minutes: u32) -> Self {
        Self { minutes: hours * 60 + minutes }
    }

    #[cfg(test)]
    pub const fn minutes(self) -> u32 {
        self.minutes
    }

    #[cfg(test)]
    pub fn as_hours(self) -> f64 {
        f64::from(self.minutes) / 60.0
    }

    pub const fn add_minutes(self, minutes: u32) -> Self {
        Self { minutes: self.minutes + minutes }
    }

    fn from_slot(slot: f64) -> Self {
        // Negative and NaN inputs land on midnight.
        Self::from_minutes(slot.max(0.0) as u32 * SLOT_MINUTES)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.minutes / 60, self.minutes % 60)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid clock value '{0}', expected HH:MM")]
pub struct ParseClockError(String);

impl FromStr for ClockTime {
    type Err = ParseClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseClockError(s.to_string());
        let (h, m) = s.trim().split_once(':').ok_or_else(err)?;
        if h.len() < 2 || m.len() != 2 {
            return Err(err());
        }
        let hours: u32 = h.parse().map_err(|_| err())?;
        let minutes: u32 = m.parse().map_err(|_| err())?;
        if minutes >= 60 {
            return Err(err());
        }
        Ok(Self::hm(hours, minutes))
    }
}

/// Largest grid point (HH:00 or HH:30) not after `t` (fractional hours).
pub fn floor_to_half_hour(t: f64) -> ClockTime {
    ClockTime::from_slot((t * 2.0).floor())
}

/// Smallest grid point not before `t`. A value already on the grid is returned unchanged.
pub fn ceil_to_half_hour(t: f64) -> ClockTime {
    ClockTime::from_slot((t * 2.0).ceil())
}

/// A committed "HH:MM - HH:MM" window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: ClockTime,
    pub end: ClockTime,
}

impl TimeWindow {
    #[cfg(test)]
    pub const fn duration_minutes(&self) -> u32 {
        self.end.minutes().saturating_sub(self.start.minutes())
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} - {}", self.start, self.end)
    }
}

impl FromStr for TimeWindow {
    type Err = ParseClockError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once(" - ")
            .ok_or_else(|| ParseClockError(s.to_string()))?;
        let window = Self {
            start: start.parse()?,
            end: end.parse()?,
        };
        if window.end < window.start {
            return Err(ParseClockError(s.to_string()));
        }
        Ok(window)
    }
}

/// Widen an empty window to one slot. Any other window is returned as given.
pub fn fix_degenerate_window(start: ClockTime, end: ClockTime) -> TimeWindow {
    let end = if start == end {
        start.add_minutes(SLOT_MINUTES)
    } else {
        end
    };
    TimeWindow { start, end }
}

/// Window committed for a visit from `arrival` to `departure` (fractional hours).
pub fn window_for(arrival: f64, departure: f64) -> TimeWindow {
    fix_degenerate_window(floor_to_half_hour(arrival), ceil_to_half_hour(departure))
}
