//! Countdown timer record and its create request.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{StoreDomain, TimerId, TimerPosition, TimerSize, UrgencyType, WallClock};
use crate::error::{Result, TimerError};

/// Fallback color when a record carries none (the form's default hue).
const DEFAULT_COLOR: &str = "hsl(120,100%,50%)";

/// Purely presentational settings of a timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisplayOptions {
    /// CSS color string.
    pub color: String,
    /// Widget size.
    pub size: TimerSize,
    /// Widget placement.
    pub position: TimerPosition,
}

impl Default for DisplayOptions {
    #[inline]
    fn default() -> Self {
        Self {
            color: DEFAULT_COLOR.to_owned(),
            size: TimerSize::default(),
            position: TimerPosition::default(),
        }
    }
}

/// Urgency presentation settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Urgency {
    /// Whether any urgency effect is shown. Always `kind != None` on stored
    /// records.
    #[serde(default)]
    pub enabled: bool,
    /// Which effect is shown.
    #[serde(rename = "type", default)]
    pub kind: UrgencyType,
    /// When set, the effect only shows once the remaining time drops to
    /// this many minutes or fewer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger_minutes: Option<u32>,
}

impl Urgency {
    /// Builds urgency settings for `kind`; `enabled` is derived from it.
    #[inline]
    #[must_use]
    pub fn new(kind: UrgencyType) -> Self {
        Self {
            enabled: kind != UrgencyType::None,
            kind,
            trigger_minutes: None,
        }
    }

    /// Sets the trigger threshold in minutes.
    #[inline]
    #[must_use]
    pub const fn with_trigger_minutes(mut self, minutes: Option<u32>) -> Self {
        self.trigger_minutes = minutes;
        self
    }

    /// Re-derives `enabled` from `kind`, keeping the trigger threshold.
    #[inline]
    #[must_use]
    pub fn normalized(self) -> Self {
        Self::new(self.kind).with_trigger_minutes(self.trigger_minutes)
    }

    /// Returns the effect in force when `remaining_secs` seconds are left,
    /// or [`UrgencyType::None`] when no effect applies.
    #[inline]
    #[must_use]
    pub fn effect_at(&self, remaining_secs: u64) -> UrgencyType {
        if !self.enabled {
            return UrgencyType::None;
        }
        match self.trigger_minutes {
            Some(minutes) if remaining_secs > u64::from(minutes).saturating_mul(60) => {
                UrgencyType::None
            }
            _ => self.kind,
        }
    }
}

impl Default for Urgency {
    #[inline]
    fn default() -> Self {
        Self::new(UrgencyType::None)
    }
}

/// Request body for creating a timer.
///
/// Carries everything a [`Timer`] has except the store-assigned identifier
/// and timestamps. Only a timer store turns this into a [`Timer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTimer {
    /// Owning storefront.
    pub store_domain: StoreDomain,
    /// Optional merchant-facing label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_name: Option<String>,
    /// Start timestamp (inclusive).
    pub start_time: String,
    /// End timestamp (exclusive).
    pub end_time: String,
    /// Text shown next to the countdown.
    pub promotion_text: String,
    /// Presentation settings.
    #[serde(default)]
    pub display_options: DisplayOptions,
    /// Urgency settings.
    #[serde(default)]
    pub urgency: Urgency,
}

impl NewTimer {
    /// Checks the record invariants.
    ///
    /// The store domain and promotion text must be non-blank, both
    /// timestamps must parse, and the end must be strictly after the start.
    /// Naive timestamps are compared as UTC wall-clock values, which
    /// preserves their order in any viewer timezone outside DST
    /// transitions.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Validation`] describing the first violation.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.store_domain.as_inner().trim().is_empty() {
            return Err(TimerError::Validation("store domain is required".to_owned()));
        }
        if self.promotion_text.trim().is_empty() {
            return Err(TimerError::Validation("promotion text is required".to_owned()));
        }
        let start = parse_instant("start time", &self.start_time)?;
        let end = parse_instant("end time", &self.end_time)?;
        if end <= start {
            return Err(TimerError::Validation(format!(
                "end time {} must be after start time {}",
                self.end_time, self.start_time
            )));
        }
        Ok(())
    }

    /// Validates the request and turns it into a stored record.
    ///
    /// The urgency `enabled` flag is re-derived from its type, whatever
    /// the request carried.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Validation`] if the request violates the
    /// record invariants.
    #[inline]
    pub fn into_timer(self, id: TimerId, now: DateTime<Utc>) -> Result<Timer> {
        self.validate()?;
        Ok(Timer {
            id,
            store_domain: self.store_domain,
            timer_name: self.timer_name,
            start_time: self.start_time,
            end_time: self.end_time,
            promotion_text: self.promotion_text,
            display_options: self.display_options,
            urgency: self.urgency.normalized(),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Parses a timestamp field for validation.
fn parse_instant(field: &str, raw: &str) -> Result<DateTime<Utc>> {
    WallClock::parse(raw)
        .and_then(|stamp| stamp.resolve(&Utc))
        .ok_or_else(|| TimerError::Validation(format!("{field} is not a valid timestamp: \"{raw}\"")))
}

/// A persisted countdown timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timer {
    /// Store-assigned identifier.
    #[serde(alias = "_id")]
    pub id: TimerId,
    /// Owning storefront.
    pub store_domain: StoreDomain,
    /// Optional merchant-facing label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timer_name: Option<String>,
    /// Start timestamp (inclusive), as submitted.
    pub start_time: String,
    /// End timestamp (exclusive), as submitted.
    pub end_time: String,
    /// Text shown next to the countdown.
    pub promotion_text: String,
    /// Presentation settings.
    #[serde(default)]
    pub display_options: DisplayOptions,
    /// Urgency settings.
    #[serde(default)]
    pub urgency: Urgency,
    /// When the store created the record.
    pub created_at: DateTime<Utc>,
    /// When the store last wrote the record.
    pub updated_at: DateTime<Utc>,
}
