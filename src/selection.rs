//! Timer selection engine.
//!
//! Pure functions turning a store's timers and the current instant into
//! "which timer is active now" and "how much time is left". Both storefront
//! widget variants and the admin list's status column go through here.
//!
//! # Selection policy
//!
//! A timer is *eligible* when its window contains `now` under the
//! closed-start / open-end rule: `start <= now < end`. Among eligible
//! timers the **first one in the given order** wins. Stores return timers
//! in insertion order, so the earliest-created eligible timer is shown.

use core::fmt;

use chrono::{DateTime, TimeZone};

use crate::models::{Timer, WallClock};

/// Milliseconds per hour.
const MS_PER_HOUR: u64 = 3_600_000;
/// Milliseconds per minute.
const MS_PER_MINUTE: u64 = 60_000;
/// Milliseconds per second.
const MS_PER_SECOND: u64 = 1_000;

/// Remaining time split into display units.
///
/// There is no days field: hours accumulate without bound, so a 30 hour
/// countdown shows `30h`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Remaining {
    /// Whole hours.
    pub hours: u64,
    /// Whole minutes within the hour (0..60).
    pub minutes: u64,
    /// Whole seconds within the minute (0..60).
    pub seconds: u64,
}

impl Remaining {
    /// Nothing left.
    pub const ZERO: Self = Self {
        hours: 0,
        minutes: 0,
        seconds: 0,
    };

    /// Decomposes a millisecond count; sub-second remainders are dropped.
    #[inline]
    #[must_use]
    #[allow(clippy::integer_division, reason = "truncating unit decomposition is the intent")]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            hours: millis / MS_PER_HOUR,
            minutes: (millis % MS_PER_HOUR) / MS_PER_MINUTE,
            seconds: (millis % MS_PER_MINUTE) / MS_PER_SECOND,
        }
    }

    /// Time left from `now` until `end`, clamped to zero at or after `end`.
    #[inline]
    #[must_use]
    pub fn until<Tz: TimeZone, Tz2: TimeZone>(end: &DateTime<Tz>, now: &DateTime<Tz2>) -> Self {
        Self::from_millis(millis_until(end, now))
    }

    /// Returns `true` once the countdown has nothing left to show.
    #[inline]
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds == 0
    }

    /// Total whole seconds represented.
    #[inline]
    #[must_use]
    pub const fn total_seconds(&self) -> u64 {
        self.hours
            .saturating_mul(3600)
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.seconds)
    }

    /// Zero-padded clock layout, `HH:MM:SS` (hours may exceed two digits).
    #[inline]
    #[must_use]
    pub fn clock(&self) -> String {
        format!("{:02}:{:02}:{:02}", self.hours, self.minutes, self.seconds)
    }
}

impl fmt::Display for Remaining {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}h {}m {}s", self.hours, self.minutes, self.seconds)
    }
}

/// Milliseconds from `now` until `end`, or zero if `end` is not ahead.
#[inline]
#[must_use]
pub fn millis_until<Tz: TimeZone, Tz2: TimeZone>(end: &DateTime<Tz>, now: &DateTime<Tz2>) -> u64 {
    let diff = end
        .timestamp_millis()
        .saturating_sub(now.timestamp_millis());
    u64::try_from(diff).unwrap_or(0)
}

/// The resolved `[start, end)` interval of a timer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerWindow<Tz: TimeZone> {
    /// First instant at which the timer is eligible.
    pub start: DateTime<Tz>,
    /// First instant at which the timer is no longer eligible.
    pub end: DateTime<Tz>,
}

impl<Tz: TimeZone> TimerWindow<Tz> {
    /// Resolves raw start/end strings in `tz`.
    ///
    /// Returns `None` if either fails to parse or if `end <= start`.
    #[inline]
    #[must_use]
    pub fn parse(raw_start: &str, raw_end: &str, tz: &Tz) -> Option<Self> {
        let start = WallClock::parse(raw_start)?.resolve(tz)?;
        let end = WallClock::parse(raw_end)?.resolve(tz)?;
        (end > start).then_some(Self { start, end })
    }

    /// Resolves a timer's window in `tz`.
    #[inline]
    #[must_use]
    pub fn of(timer: &Timer, tz: &Tz) -> Option<Self> {
        Self::parse(&timer.start_time, &timer.end_time, tz)
    }

    /// Closed-start / open-end containment.
    #[inline]
    #[must_use]
    pub fn contains<Tz2: TimeZone>(&self, now: &DateTime<Tz2>) -> bool {
        self.start <= *now && *now < self.end
    }

    /// Time left until the end of the window.
    #[inline]
    #[must_use]
    pub fn remaining_at<Tz2: TimeZone>(&self, now: &DateTime<Tz2>) -> Remaining {
        Remaining::until(&self.end, now)
    }
}

/// The timer chosen for display.
#[derive(Debug, Clone)]
pub struct ActiveTimer<'timers, Tz: TimeZone> {
    /// The selected record.
    pub timer: &'timers Timer,
    /// Its resolved window.
    pub window: TimerWindow<Tz>,
    /// Time left at the evaluation instant.
    pub remaining: Remaining,
}

/// Outcome of evaluating a store's timers at one instant.
#[derive(Debug, Clone)]
pub struct Selection<'timers, Tz: TimeZone> {
    /// The active timer, if any timer is eligible.
    pub active: Option<ActiveTimer<'timers, Tz>>,
    /// Timers excluded because their window could not be resolved.
    pub invalid: Vec<&'timers Timer>,
}

impl<Tz: TimeZone> Selection<'_, Tz> {
    /// Returns `true` if no timer is active and at least one was invalid.
    #[inline]
    #[must_use]
    pub const fn only_invalid(&self) -> bool {
        self.active.is_none() && !self.invalid.is_empty()
    }
}

/// Selects the active timer at `now`.
///
/// Naive timestamps are read in `now`'s timezone. The first eligible timer
/// in `timers` order is chosen; timers whose window cannot be resolved are
/// skipped and reported in [`Selection::invalid`].
#[inline]
#[must_use]
pub fn select_active<'timers, Tz: TimeZone>(
    timers: &'timers [Timer],
    now: &DateTime<Tz>,
) -> Selection<'timers, Tz> {
    let tz = now.timezone();
    let mut active = None;
    let mut invalid = Vec::new();
    for timer in timers {
        let Some(window) = TimerWindow::of(timer, &tz) else {
            tracing::trace!(id = %timer.id, "skipping timer with unresolvable window");
            invalid.push(timer);
            continue;
        };
        if active.is_none() && window.contains(now) {
            let remaining = window.remaining_at(now);
            active = Some(ActiveTimer {
                timer,
                window,
                remaining,
            });
        }
    }
    Selection { active, invalid }
}

/// Lifecycle status of a single timer, as shown in the admin list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerStatus {
    /// Not started yet.
    Scheduled,
    /// Eligible right now.
    Running,
    /// Past its end.
    Ended,
    /// Start or end cannot be resolved, or the window is empty.
    Invalid,
}

impl TimerStatus {
    /// Lowercase label.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Ended => "ended",
            Self::Invalid => "invalid",
        }
    }
}

impl fmt::Display for TimerStatus {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of `timer` at `now`.
#[inline]
#[must_use]
pub fn status_at<Tz: TimeZone>(timer: &Timer, now: &DateTime<Tz>) -> TimerStatus {
    match TimerWindow::of(timer, &now.timezone()) {
        None => TimerStatus::Invalid,
        Some(window) if *now < window.start => TimerStatus::Scheduled,
        Some(window) if window.contains(now) => TimerStatus::Running,
        Some(_) => TimerStatus::Ended,
    }
}
