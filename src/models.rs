//! Data models for countdown timer documents.
//!
//! This module contains the persisted [`Timer`] record, the [`NewTimer`]
//! create request, newtype identifiers, enumerations for constrained
//! display values, and the wall-clock timestamp format timers carry.

mod enums;
mod ids;
mod response;
mod timer;
mod wall_clock;

pub use enums::{TimerPosition, TimerSize, UrgencyType};
pub use ids::{StoreDomain, TimerId};
pub use response::{ApiErrorBody, DeleteResponse, StatusMessage};
pub use timer::{DisplayOptions, NewTimer, Timer, Urgency};
pub use wall_clock::WallClock;
