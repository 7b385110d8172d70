//! Enumeration types for constrained display values.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TimerError;

/// Generates `as_str`, `Display` and `FromStr` for a unit-only enum whose
/// wire names are listed explicitly.
macro_rules! impl_wire_names {
    ($name:ident, $label:literal, { $($variant:ident => $wire:literal),+ $(,)? }) => {
        impl $name {
            /// All variants, in declaration order.
            pub const ALL: &'static [Self] = &[$(Self::$variant),+];

            /// Returns the wire (JSON) name of this value.
            #[inline]
            #[must_use]
            pub const fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $wire),+
                }
            }
        }

        impl fmt::Display for $name {
            #[inline]
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TimerError;

            #[inline]
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($wire => Ok(Self::$variant),)+
                    other => Err(TimerError::Validation(format!(
                        concat!("unknown ", $label, ": {}"),
                        other
                    ))),
                }
            }
        }
    };
}

/// Rendered size of the countdown widget.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerSize {
    /// Compact text (0.85em).
    Small,
    /// Regular text (1em).
    #[default]
    Medium,
    /// Emphasised text (1.5em).
    Large,
}

impl_wire_names!(TimerSize, "timer size", {
    Small => "small",
    Medium => "medium",
    Large => "large",
});

impl TimerSize {
    /// CSS font size used by the inline widget.
    #[inline]
    #[must_use]
    pub const fn font_size(self) -> &'static str {
        match self {
            Self::Small => "0.85em",
            Self::Medium => "1em",
            Self::Large => "1.5em",
        }
    }
}

/// Placement of the countdown widget on the storefront page.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimerPosition {
    /// Above the page content.
    #[default]
    Top,
    /// Below the page content.
    Bottom,
    /// Left of the page content.
    Left,
    /// Right of the page content.
    Right,
}

impl_wire_names!(TimerPosition, "timer position", {
    Top => "top",
    Bottom => "bottom",
    Left => "left",
    Right => "right",
});

/// Presentation mode applied to an active timer to signal urgency.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UrgencyType {
    /// No urgency effect.
    None,
    /// Background pulses between the timer color and red.
    #[default]
    ColorPulse,
    /// Red rules above and below the timer.
    NotificationBanner,
}

impl_wire_names!(UrgencyType, "urgency type", {
    None => "none",
    ColorPulse => "colorPulse",
    NotificationBanner => "notificationBanner",
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgency_type_serde_camel_case() {
        let json = serde_json::to_string(&UrgencyType::NotificationBanner).unwrap();
        assert_eq!(json, r#""notificationBanner""#);
        let deserialized: UrgencyType = serde_json::from_str(r#""colorPulse""#).unwrap();
        assert_eq!(deserialized, UrgencyType::ColorPulse);
    }

    #[test]
    fn wire_names_match_serde() {
        for size in TimerSize::ALL {
            let json = serde_json::to_string(size).unwrap();
            assert_eq!(json, format!("\"{}\"", size.as_str()));
        }
        for position in TimerPosition::ALL {
            let json = serde_json::to_string(position).unwrap();
            assert_eq!(json, format!("\"{position}\""));
        }
        for urgency in UrgencyType::ALL {
            let json = serde_json::to_string(urgency).unwrap();
            assert_eq!(json, format!("\"{urgency}\""));
        }
    }

    #[test]
    fn from_str_round_trips() {
        assert_eq!("large".parse::<TimerSize>().unwrap(), TimerSize::Large);
        assert_eq!("left".parse::<TimerPosition>().unwrap(), TimerPosition::Left);
        assert_eq!("none".parse::<UrgencyType>().unwrap(), UrgencyType::None);
    }

    #[test]
    fn from_str_rejects_unknown() {
        let err = "huge".parse::<TimerSize>().unwrap_err();
        assert_eq!(err.to_string(), "invalid timer: unknown timer size: huge");
    }

    #[test]
    fn form_defaults() {
        assert_eq!(TimerSize::default(), TimerSize::Medium);
        assert_eq!(TimerPosition::default(), TimerPosition::Top);
        assert_eq!(UrgencyType::default(), UrgencyType::ColorPulse);
    }

    #[test]
    fn font_sizes() {
        assert_eq!(TimerSize::Small.font_size(), "0.85em");
        assert_eq!(TimerSize::Medium.font_size(), "1em");
        assert_eq!(TimerSize::Large.font_size(), "1.5em");
    }
}
