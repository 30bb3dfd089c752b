// =============================================================================
// Session Clock — UTC time-of-day to trading-session label
// =============================================================================
//
// Session windows (UTC, half-open [start, end)):
//
//   SYDNEY    22:00 - 07:00   (wraps midnight)
//   ASIAN     00:00 - 09:00
//   LONDON    07:00 - 16:00
//   NEW_YORK  13:00 - 21:00
//
// 21:00 - 22:00 is the daily rollover and reports OUT_OF_HOURS.  When windows
// overlap, every active session is reported and the canonical label is the
// first match in priority order LONDON > NEW_YORK > ASIAN > SYDNEY.
//
// The label depends only on the time of day, never on the date.
// =============================================================================

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Session {
    London,
    NewYork,
    Asian,
    Sydney,
    OutOfHours,
}

impl std::fmt::Display for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::London => write!(f, "LONDON"),
            Self::NewYork => write!(f, "NEW_YORK"),
            Self::Asian => write!(f, "ASIAN"),
            Self::Sydney => write!(f, "SYDNEY"),
            Self::OutOfHours => write!(f, "OUT_OF_HOURS"),
        }
    }
}

struct SessionWindow {
    session: Session,
    start_minute: u32,
    end_minute: u32,
}

impl SessionWindow {
    const fn new(session: Session, start_hour: u32, end_hour: u32) -> Self {
        Self {
            session,
            start_minute: start_hour * 60,
            end_minute: end_hour * 60,
        }
    }

    fn contains(&self, minute_of_day: u32) -> bool {
        if self.start_minute <= self.end_minute {
            (self.start_minute..self.end_minute).contains(&minute_of_day)
        } else {
            minute_of_day >= self.start_minute || minute_of_day < self.end_minute
        }
    }
}

/// Windows in priority order.
const WINDOWS: [SessionWindow; 4] = [
    SessionWindow::new(Session::London, 7, 16),
    SessionWindow::new(Session::NewYork, 13, 21),
    SessionWindow::new(Session::Asian, 0, 9),
    SessionWindow::new(Session::Sydney, 22, 7),
];

fn minute_of_day(at: DateTime<Utc>) -> u32 {
    at.hour() * 60 + at.minute()
}

/// Every session open at `at`, in priority order.  Empty during the rollover
/// hour.
pub fn active_sessions(at: DateTime<Utc>) -> Vec<Session> {
    let minute = minute_of_day(at);
    WINDOWS
        .iter()
        .filter(|w| w.contains(minute))
        .map(|w| w.session)
        .collect()
}

/// The single canonical label for `at`.
pub fn canonical_session(at: DateTime<Utc>) -> Session {
    let minute = minute_of_day(at);
    WINDOWS
        .iter()
        .find(|w| w.contains(minute))
        .map_or(Session::OutOfHours, |w| w.session)
}

// =============================================================================
// Clock
// =============================================================================

/// Source of "now" for the scheduler.  Injected so session labels and
/// staleness checks are testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock pinned to a settable instant.
#[cfg(test)]
#[derive(Debug)]
pub struct FixedClock(parking_lot::Mutex<DateTime<Utc>>);

#[cfg(test)]
impl FixedClock {
    pub fn new(at: DateTime<Utc>) -> Self {
        Self(parking_lot::Mutex::new(at))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.0.lock() = at;
    }
}

#[cfg(test)]
impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock()
    }
}
