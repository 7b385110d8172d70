//! Admin timer form.
//!
//! [`TimerDraft`] holds the raw inputs of the "create timer" form: separate
//! date and time fields, an HSB color picker, and size / position / urgency
//! choices. [`TimerDraft::build`] turns them into a [`NewTimer`] ready to
//! send, and [`TimerForm`] adds the dismissible error banner and the
//! reset-on-success behaviour around it.

use chrono::{NaiveDate, NaiveTime};

use crate::error::{Result, TimerError};
use crate::models::{
    DisplayOptions, NewTimer, StoreDomain, Timer, TimerPosition, TimerSize, Urgency, UrgencyType,
};

/// Layout of the date inputs.
const DATE_FORMAT: &str = "%Y-%m-%d";
/// Layouts accepted by the time inputs.
const TIME_FORMATS: &[&str] = &["%H:%M", "%H:%M:%S"];

/// Color picked as hue / saturation / brightness.
///
/// Brightness is emitted as the lightness component of a CSS `hsl()`
/// color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hsb {
    /// Hue in degrees, `0..=360`.
    pub hue: u16,
    /// Saturation percentage, `0..=100`.
    pub saturation: u8,
    /// Brightness percentage, `0..=100`.
    pub brightness: u8,
}

impl Default for Hsb {
    #[inline]
    fn default() -> Self {
        Self {
            hue: 120,
            saturation: 100,
            brightness: 50,
        }
    }
}

impl Hsb {
    /// Checks every component against its slider range.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Validation`] naming the first component out of
    /// range.
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.hue > 360 {
            return Err(TimerError::Validation(format!(
                "hue must be between 0 and 360, got {}",
                self.hue
            )));
        }
        if self.saturation > 100 {
            return Err(TimerError::Validation(format!(
                "saturation must be between 0 and 100, got {}",
                self.saturation
            )));
        }
        if self.brightness > 100 {
            return Err(TimerError::Validation(format!(
                "brightness must be between 0 and 100, got {}",
                self.brightness
            )));
        }
        Ok(())
    }

    /// CSS color string, `hsl(h,s%,b%)`.
    #[inline]
    #[must_use]
    pub fn to_css(&self) -> String {
        format!("hsl({},{}%,{}%)", self.hue, self.saturation, self.brightness)
    }

    /// Parses the output of [`Hsb::to_css`] (whitespace tolerant).
    #[inline]
    #[must_use]
    pub fn parse_css(css: &str) -> Option<Self> {
        let inner = css.trim().strip_prefix("hsl(")?.strip_suffix(')')?;
        let mut parts = inner.split(',').map(str::trim);
        let hue = parts.next()?.parse().ok()?;
        let saturation = parts.next()?.strip_suffix('%')?.trim().parse().ok()?;
        let brightness = parts.next()?.strip_suffix('%')?.trim().parse().ok()?;
        if parts.next().is_some() {
            return None;
        }
        let hsb = Self {
            hue,
            saturation,
            brightness,
        };
        hsb.validate().is_ok().then_some(hsb)
    }

    /// Converts to 8-bit RGB.
    #[inline]
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "channels are clamped to 0..=255 before the cast"
    )]
    pub fn to_rgb(&self) -> (u8, u8, u8) {
        let saturation = f64::from(self.saturation) / 100.0_f64;
        let lightness = f64::from(self.brightness) / 100.0_f64;
        let chroma = (1.0_f64 - 2.0_f64.mul_add(lightness, -1.0_f64).abs()) * saturation;
        let sector = f64::from(self.hue % 360) / 60.0_f64;
        let second = chroma * (1.0_f64 - (sector % 2.0_f64 - 1.0_f64).abs());
        let (red, green, blue) = match sector as u8 {
            0 => (chroma, second, 0.0_f64),
            1 => (second, chroma, 0.0_f64),
            2 => (0.0_f64, chroma, second),
            3 => (0.0_f64, second, chroma),
            4 => (second, 0.0_f64, chroma),
            _ => (chroma, 0.0_f64, second),
        };
        let offset = lightness - chroma / 2.0_f64;
        let channel =
            |value: f64| ((value + offset) * 255.0_f64).round().clamp(0.0_f64, 255.0_f64) as u8;
        (channel(red), channel(green), channel(blue))
    }
}

/// Resolves a timer color string to 8-bit RGB.
///
/// Understands the form's `hsl(h,s%,b%)` output and `#rgb` / `#rrggbb`
/// hex colors.
#[inline]
#[must_use]
pub fn css_rgb(color: &str) -> Option<(u8, u8, u8)> {
    let trimmed = color.trim();
    if let Some(hsb) = Hsb::parse_css(trimmed) {
        return Some(hsb.to_rgb());
    }
    let hex = trimmed.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    match hex.len() {
        3 => {
            let digit = |idx: usize| {
                u8::from_str_radix(hex.get(idx..=idx)?, 16)
                    .ok()
                    .map(|value| value * 17)
            };
            Some((digit(0)?, digit(1)?, digit(2)?))
        }
        6 => {
            let pair = |idx: usize| u8::from_str_radix(hex.get(idx..idx + 2)?, 16).ok();
            Some((pair(0)?, pair(2)?, pair(4)?))
        }
        _ => None,
    }
}

/// Raw inputs of the "create timer" form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerDraft {
    /// Merchant-facing label (optional).
    pub name: String,
    /// Start date, `YYYY-MM-DD`.
    pub start_date: String,
    /// Start time of day, `HH:MM`.
    pub start_time: String,
    /// End date, `YYYY-MM-DD`.
    pub end_date: String,
    /// End time of day, `HH:MM`.
    pub end_time: String,
    /// Promotion description shown next to the countdown.
    pub promotion_text: String,
    /// Picked color.
    pub color: Hsb,
    /// Widget size.
    pub size: TimerSize,
    /// Widget placement.
    pub position: TimerPosition,
    /// Urgency effect.
    pub urgency: UrgencyType,
    /// Minutes before the end at which the urgency effect starts; the whole
    /// countdown when unset.
    pub trigger_minutes: Option<u32>,
}

impl Default for TimerDraft {
    #[inline]
    fn default() -> Self {
        Self {
            name: String::new(),
            start_date: String::new(),
            start_time: String::new(),
            end_date: String::new(),
            end_time: String::new(),
            promotion_text: String::new(),
            color: Hsb::default(),
            size: TimerSize::default(),
            position: TimerPosition::default(),
            urgency: UrgencyType::default(),
            trigger_minutes: None,
        }
    }
}

impl TimerDraft {
    /// Builds the create request for `store`.
    ///
    /// Date and time inputs are joined as `<date>T<time>`, a local
    /// wall-clock value read in each viewer's timezone.
    ///
    /// # Errors
    ///
    /// Returns [`TimerError::Validation`] naming the first missing or
    /// malformed field, or an end that is not after the start.
    #[inline]
    pub fn build(&self, store: &StoreDomain) -> Result<NewTimer> {
        if store.as_inner().trim().is_empty() {
            return Err(TimerError::Validation("store domain is required".to_owned()));
        }
        let start_time = join_date_time("start", &self.start_date, &self.start_time)?;
        let end_time = join_date_time("end", &self.end_date, &self.end_time)?;
        let promotion_text = self.promotion_text.trim();
        if promotion_text.is_empty() {
            return Err(TimerError::Validation("promotion text is required".to_owned()));
        }
        self.color.validate()?;
        if self.trigger_minutes == Some(0) {
            return Err(TimerError::Validation(
                "trigger minutes must be at least 1".to_owned(),
            ));
        }

        let name = self.name.trim();
        let new_timer = NewTimer {
            store_domain: store.clone(),
            timer_name: (!name.is_empty()).then(|| name.to_owned()),
            start_time,
            end_time,
            promotion_text: promotion_text.to_owned(),
            display_options: DisplayOptions {
                color: self.color.to_css(),
                size: self.size,
                position: self.position,
            },
            urgency: Urgency::new(self.urgency).with_trigger_minutes(self.trigger_minutes),
        };
        new_timer.validate()?;
        Ok(new_timer)
    }

    /// Restores every input to its default.
    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Checks a date + time input pair and joins them.
fn join_date_time(label: &str, raw_date: &str, raw_time: &str) -> Result<String> {
    let date = raw_date.trim();
    let time = raw_time.trim();
    if date.is_empty() {
        return Err(TimerError::Validation(format!("{label} date is required")));
    }
    if time.is_empty() {
        return Err(TimerError::Validation(format!("{label} time is required")));
    }
    if NaiveDate::parse_from_str(date, DATE_FORMAT).is_err() {
        return Err(TimerError::Validation(format!(
            "{label} date must be YYYY-MM-DD, got \"{date}\""
        )));
    }
    if !TIME_FORMATS
        .iter()
        .any(|format| NaiveTime::parse_from_str(time, format).is_ok())
    {
        return Err(TimerError::Validation(format!(
            "{label} time must be HH:MM, got \"{time}\""
        )));
    }
    Ok(format!("{date}T{time}"))
}

/// Draft plus the error banner shown above it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TimerForm {
    /// Current inputs.
    draft: TimerDraft,
    /// Message of the last failed submit, until dismissed.
    banner: Option<String>,
}

impl TimerForm {
    /// Creates a form with default inputs and no banner.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a form pre-filled with `draft`.
    #[inline]
    #[must_use]
    pub const fn with_draft(draft: TimerDraft) -> Self {
        Self {
            draft,
            banner: None,
        }
    }

    /// Current inputs.
    #[inline]
    #[must_use]
    pub const fn draft(&self) -> &TimerDraft {
        &self.draft
    }

    /// Current inputs, for editing.
    #[inline]
    pub const fn draft_mut(&mut self) -> &mut TimerDraft {
        &mut self.draft
    }

    /// Message of the last failed submit, if not dismissed.
    #[inline]
    #[must_use]
    pub fn banner(&self) -> Option<&str> {
        self.banner.as_deref()
    }

    /// Hides the error banner.
    #[inline]
    pub fn dismiss_banner(&mut self) {
        self.banner = None;
    }

    /// Builds the request and hands it to `create`.
    ///
    /// On success the draft resets, the banner clears and the created timer
    /// is returned. On any failure (validation or `create`) the banner shows
    /// the error and the draft is kept for correction.
    #[inline]
    pub fn submit<F>(&mut self, store: &StoreDomain, create: F) -> Option<Timer>
    where
        F: FnOnce(NewTimer) -> Result<Timer>,
    {
        match self.draft.build(store).and_then(create) {
            Ok(timer) => {
                tracing::debug!(id = %timer.id, "timer created from form");
                self.draft.reset();
                self.banner = None;
                Some(timer)
            }
            Err(err) => {
                tracing::debug!(error = %err, "timer form rejected");
                self.banner = Some(err.to_string());
                None
            }
        }
    }
}
