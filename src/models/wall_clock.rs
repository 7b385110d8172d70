//! Timestamp strings carried by timer records.
//!
//! The admin form combines separate date and time inputs into a
//! timezone-naive wall-clock string (`2025-08-15T09:00`) that is meant to be
//! read in the viewer's local timezone. Records that went through a
//! document store may instead come back as RFC 3339 instants with an
//! explicit offset. [`WallClock`] accepts both.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

/// Naive formats accepted after RFC 3339, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// A parsed timer timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WallClock {
    /// Local wall-clock time with no zone; resolved against the viewer's
    /// timezone.
    Naive(NaiveDateTime),
    /// An absolute instant with an explicit UTC offset.
    Fixed(DateTime<FixedOffset>),
}

impl WallClock {
    /// Parses a timer timestamp string.
    ///
    /// Returns `None` for anything that is neither RFC 3339 nor one of the
    /// naive `date` + `time` layouts.
    #[inline]
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if let Ok(instant) = DateTime::parse_from_rfc3339(trimmed) {
            return Some(Self::Fixed(instant));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
            .map(Self::Naive)
    }

    /// Resolves this timestamp to an instant in `tz`.
    ///
    /// Naive values are read as local time in `tz`. A time that occurs
    /// twice (DST fold) resolves to the earlier instant; a time that does
    /// not exist (DST gap) yields `None`.
    #[inline]
    #[must_use]
    pub fn resolve<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        match *self {
            Self::Naive(naive) => tz.from_local_datetime(&naive).earliest(),
            Self::Fixed(instant) => Some(instant.with_timezone(tz)),
        }
    }
}
