//! Storefront countdown render loop.
//!
//! A mount loads a store's timers once, picks the active one with
//! [`crate::selection::select_active`], then recomputes the remaining time
//! on a fixed one second cadence until it reaches zero. Terminal states
//! (`Expired`, `Empty`, `Invalid`, `Error`) never schedule further work, and
//! no re-polling happens while armed: a timer that becomes eligible later
//! in the same mount is not picked up.
//!
//! The state machine ([`CountdownMachine`]) is pure and clock-free. The
//! tokio driver ([`mount`]) wires it to a [`TimerSource`], a [`Clock`] and a
//! [`RenderSurface`].

use core::future::Future;
use std::io;

use chrono::{DateTime, Local, TimeZone, Utc};

use crate::error::Result;
use crate::models::{StoreDomain, Timer, TimerId, TimerPosition, TimerSize, UrgencyType};
use crate::selection::{Remaining, millis_until, select_active};

#[cfg(feature = "async")]
pub use driver::{MountConfig, MountHandle, TICK, mount};

/// Text color of the banner widget when a timer carries none.
const BANNER_DEFAULT_COLOR: &str = "#d49600";
/// Background of the inline widget when a timer carries none.
const INLINE_DEFAULT_BACKGROUND: &str = "#000";
/// Label used when a timer has blank promotion text.
const FALLBACK_PROMOTION: &str = "Countdown";
/// Accent color of urgency effects.
const URGENCY_ACCENT: &str = "#ff4d4f";

/// Which storefront widget is rendering.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WidgetVariant {
    /// Theme script widget: a single bold line, `promo: HH:MM:SS`.
    #[default]
    Banner,
    /// App block component: a colored box with the promo above
    /// `Xh Ym Zs`, sized by the timer's display size.
    Inline,
}

/// Lifecycle state of one mount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderState {
    /// Not mounted yet.
    Idle,
    /// Timers are being fetched.
    Loading,
    /// Counting down the given timer.
    Armed {
        /// The selected timer.
        timer: TimerId,
        /// Time left at the last recomputation.
        remaining: Remaining,
    },
    /// The armed timer reached zero.
    Expired {
        /// The timer that ended.
        timer: TimerId,
    },
    /// No eligible and no invalid timer.
    Empty,
    /// No eligible timer, and at least one timer had unusable times.
    Invalid,
    /// The fetch failed.
    Error {
        /// Description of the failure.
        message: String,
    },
}

impl RenderState {
    /// Returns `true` for states that never schedule further work.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            *self,
            Self::Expired { .. } | Self::Empty | Self::Invalid | Self::Error { .. }
        )
    }
}

/// Fixed messages shown instead of a countdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notice {
    /// Nothing to count down.
    NoActiveTimer,
    /// The countdown finished.
    Ended,
    /// Only timers with unusable times exist.
    InvalidTimer,
    /// Timers could not be fetched.
    LoadFailed,
}

impl Notice {
    /// Message text.
    #[inline]
    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::NoActiveTimer => "No active timer.",
            Self::Ended => "Timer ended!",
            Self::InvalidTimer => "Invalid timer.",
            Self::LoadFailed => "Could not load timer.",
        }
    }
}

/// Presentation settings carried into a countdown frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SurfaceStyle {
    /// Text color (banner) or background color (inline).
    pub color: String,
    /// Widget size.
    pub size: TimerSize,
    /// Widget placement.
    pub position: TimerPosition,
    /// Urgency effect in force for this frame.
    pub urgency: UrgencyType,
}

/// A live countdown ready to draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownView {
    /// Widget rendering the view.
    pub variant: WidgetVariant,
    /// Promotion text of the timer.
    pub promotion_text: String,
    /// Time left.
    pub remaining: Remaining,
    /// Presentation settings.
    pub style: SurfaceStyle,
}

impl CountdownView {
    /// Builds the view of `timer` with `remaining` time left.
    fn of(variant: WidgetVariant, timer: &Timer, remaining: Remaining) -> Self {
        let options = &timer.display_options;
        let color = if options.color.trim().is_empty() {
            match variant {
                WidgetVariant::Banner => BANNER_DEFAULT_COLOR,
                WidgetVariant::Inline => INLINE_DEFAULT_BACKGROUND,
            }
            .to_owned()
        } else {
            options.color.clone()
        };
        let promotion_text = if timer.promotion_text.trim().is_empty() {
            FALLBACK_PROMOTION.to_owned()
        } else {
            timer.promotion_text.clone()
        };
        Self {
            variant,
            promotion_text,
            remaining,
            style: SurfaceStyle {
                color,
                size: options.size,
                position: options.position,
                urgency: timer.urgency.effect_at(remaining.total_seconds()),
            },
        }
    }

    /// Countdown text in the variant's layout.
    #[inline]
    #[must_use]
    pub fn text(&self) -> String {
        match self.variant {
            WidgetVariant::Banner => format!("{}: {}", self.promotion_text, self.remaining.clock()),
            WidgetVariant::Inline => self.remaining.to_string(),
        }
    }

    /// CSS class of the urgency effect, if any.
    #[inline]
    #[must_use]
    pub const fn urgency_class(&self) -> Option<&'static str> {
        match self.style.urgency {
            UrgencyType::None => None,
            UrgencyType::ColorPulse => Some("ct-color-pulse"),
            UrgencyType::NotificationBanner => Some("ct-banner"),
        }
    }
}

/// What a surface shows after one step of the loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Render nothing.
    Hidden,
    /// A fixed message.
    Notice(Notice),
    /// A live countdown.
    Countdown(CountdownView),
}

impl Frame {
    /// Plain text of the frame; empty when hidden.
    #[inline]
    #[must_use]
    #[allow(clippy::pattern_type_mismatch, reason = "frame contents are only borrowed")]
    pub fn text(&self) -> String {
        match self {
            Self::Hidden => String::new(),
            Self::Notice(notice) => notice.text().to_owned(),
            Self::Countdown(view) => match view.variant {
                WidgetVariant::Banner => view.text(),
                WidgetVariant::Inline => format!("{}\n{}", view.promotion_text, view.text()),
            },
        }
    }

    /// HTML markup for a widget container. All timer-supplied text is
    /// escaped.
    #[inline]
    #[must_use]
    #[allow(clippy::pattern_type_mismatch, reason = "frame contents are only borrowed")]
    pub fn to_html(&self) -> String {
        match self {
            Self::Hidden => String::new(),
            Self::Notice(notice) => format!("<p>{}</p>", notice.text()),
            Self::Countdown(view) => match view.variant {
                WidgetVariant::Banner => banner_html(view),
                WidgetVariant::Inline => inline_html(view),
            },
        }
    }
}

/// Markup of the banner widget.
fn banner_html(view: &CountdownView) -> String {
    format!(
        "<div style=\"color:{};font-weight:bold;font-size:20px;\">{}: {}</div>",
        escape_html(&view.style.color),
        escape_html(&view.promotion_text),
        view.remaining.clock(),
    )
}

/// Markup of the inline widget, including its urgency stylesheet.
fn inline_html(view: &CountdownView) -> String {
    let color = escape_html(&view.style.color);
    let mut class = String::from("countdown-timer");
    if let Some(urgency) = view.urgency_class() {
        class.push(' ');
        class.push_str(urgency);
    }
    format!(
        "<div class=\"{class}\" style=\"background-color:{color};color:#fff;font-size:{};\
         padding:10px;text-align:center;position:relative\">\
         <div style=\"font-weight:bold\">{}</div><div>{}</div>\
         <style>.ct-color-pulse{{animation:pulse 1s infinite;}}\
         @keyframes pulse{{0%{{background-color:{color};}}50%{{background-color:{URGENCY_ACCENT};}}\
         100%{{background-color:{color};}}}}\
         .ct-banner{{border-top:3px solid {URGENCY_ACCENT};border-bottom:3px solid {URGENCY_ACCENT};}}\
         </style></div>",
        view.style.size.font_size(),
        escape_html(&view.promotion_text),
        view.remaining,
    )
}

/// Escapes text for use in HTML content and double-quoted attributes.
fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Outcome of feeding one event to a [`CountdownMachine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Render the frame and keep ticking.
    Continue(Frame),
    /// Render the frame and stop; the machine is terminal.
    Stop(Frame),
    /// The event does not apply in the current state.
    Ignored,
}

/// The timer a machine is counting down.
#[derive(Debug, Clone)]
struct ArmedTimer {
    /// The selected record.
    timer: Timer,
    /// Its resolved end instant.
    end: DateTime<Utc>,
}

/// Pure per-mount state machine.
///
/// `Idle → Loading → {Armed | Empty | Invalid | Error}`, then
/// `Armed → tick → {Armed | Expired}`.
#[derive(Debug, Clone)]
pub struct CountdownMachine {
    /// Widget being driven.
    variant: WidgetVariant,
    /// Current state.
    state: RenderState,
    /// Selected timer while armed or expired.
    armed: Option<ArmedTimer>,
}

impl CountdownMachine {
    /// Creates an idle machine for `variant`.
    #[inline]
    #[must_use]
    pub const fn new(variant: WidgetVariant) -> Self {
        Self {
            variant,
            state: RenderState::Idle,
            armed: None,
        }
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub const fn state(&self) -> &RenderState {
        &self.state
    }

    /// Widget being driven.
    #[inline]
    #[must_use]
    pub const fn variant(&self) -> WidgetVariant {
        self.variant
    }

    /// Moves `Idle → Loading`. Returns `false` (and changes nothing) in any
    /// other state.
    #[inline]
    pub fn begin_load(&mut self) -> bool {
        if self.state != RenderState::Idle {
            return false;
        }
        self.state = RenderState::Loading;
        true
    }

    /// Applies the fetch outcome at instant `now`.
    ///
    /// Only meaningful while `Loading`; otherwise returns [`Step::Ignored`].
    #[inline]
    pub fn finish_load<Tz: TimeZone>(&mut self, loaded: Result<Vec<Timer>>, now: &DateTime<Tz>) -> Step {
        if self.state != RenderState::Loading {
            return Step::Ignored;
        }
        let timers = match loaded {
            Ok(timers) => timers,
            Err(err) => {
                tracing::debug!(error = %err, "timer load failed");
                self.state = RenderState::Error {
                    message: err.to_string(),
                };
                return Step::Stop(Frame::Notice(Notice::LoadFailed));
            }
        };

        let selection = select_active(&timers, now);
        if let Some(active) = selection.active {
            tracing::debug!(id = %active.timer.id, remaining = %active.remaining, "countdown armed");
            let frame = Frame::Countdown(CountdownView::of(self.variant, active.timer, active.remaining));
            self.state = RenderState::Armed {
                timer: active.timer.id.clone(),
                remaining: active.remaining,
            };
            self.armed = Some(ArmedTimer {
                timer: active.timer.clone(),
                end: active.window.end.with_timezone(&Utc),
            });
            return Step::Continue(frame);
        }

        if selection.invalid.is_empty() {
            tracing::debug!(count = timers.len(), "no active timer");
            self.state = RenderState::Empty;
            let frame = match self.variant {
                WidgetVariant::Banner => Frame::Notice(Notice::NoActiveTimer),
                WidgetVariant::Inline => Frame::Hidden,
            };
            Step::Stop(frame)
        } else {
            tracing::debug!(invalid = selection.invalid.len(), "only invalid timers");
            self.state = RenderState::Invalid;
            Step::Stop(Frame::Notice(Notice::InvalidTimer))
        }
    }

    /// Recomputes the armed countdown at instant `now`.
    ///
    /// Only meaningful while `Armed`; otherwise returns [`Step::Ignored`].
    #[inline]
    pub fn tick<Tz: TimeZone>(&mut self, now: &DateTime<Tz>) -> Step {
        if !matches!(self.state, RenderState::Armed { .. }) {
            return Step::Ignored;
        }
        let Some(armed) = self.armed.as_ref() else {
            return Step::Ignored;
        };
        let id = &armed.timer.id;
        let left = millis_until(&armed.end, now);
        if left == 0 {
            tracing::debug!(id = %id, "countdown expired");
            self.state = RenderState::Expired { timer: id.clone() };
            let frame = match self.variant {
                WidgetVariant::Banner => Frame::Notice(Notice::Ended),
                WidgetVariant::Inline => {
                    Frame::Countdown(CountdownView::of(self.variant, &armed.timer, Remaining::ZERO))
                }
            };
            return Step::Stop(frame);
        }
        let remaining = Remaining::from_millis(left);
        tracing::trace!(id = %id, remaining = %remaining, "tick");
        let frame = Frame::Countdown(CountdownView::of(self.variant, &armed.timer, remaining));
        self.state = RenderState::Armed {
            timer: id.clone(),
            remaining,
        };
        Step::Continue(frame)
    }
}

/// Where a mount loads timers from.
pub trait TimerSource: Send + Sync {
    /// Fetches every timer of `store`, in storage order.
    ///
    /// # Errors
    ///
    /// Returns an error if the timers cannot be fetched or decoded.
    fn fetch_timers(&self, store: &StoreDomain) -> impl Future<Output = Result<Vec<Timer>>> + Send;
}

/// Source of the current instant, in the viewer's timezone.
pub trait Clock: Send + Sync {
    /// Viewer timezone; naive timer times are read in it.
    type Tz: TimeZone<Offset: Send + Sync> + Send + Sync;

    /// Current instant.
    fn now(&self) -> DateTime<Self::Tz>;
}

/// Wall clock in the host's local timezone.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    #[inline]
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Something a mount draws frames on.
pub trait RenderSurface: Send {
    /// Replaces the surface contents with `frame`.
    fn render(&mut self, frame: &Frame);
}

/// Surface writing each frame's HTML markup as one line to a writer.
#[derive(Debug)]
pub struct HtmlSurface<W> {
    /// Destination of the markup.
    out: W,
}

impl<W: io::Write + Send> HtmlSurface<W> {
    /// Wraps `out`.
    #[inline]
    #[must_use]
    pub const fn new(out: W) -> Self {
        Self { out }
    }

    /// Returns the wrapped writer.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: io::Write + Send> RenderSurface for HtmlSurface<W> {
    #[inline]
    fn render(&mut self, frame: &Frame) {
        let written = writeln!(self.out, "{}", frame.to_html()).and_then(|()| self.out.flush());
        if let Err(err) = written {
            tracing::warn!(error = %err, "failed to write frame");
        }
    }
}

#[cfg(feature = "async")]
mod driver {
    //! Tokio driver running one [`CountdownMachine`] per mount.

    use alloc::sync::Arc;
    use core::time::Duration;

    use tokio::sync::watch;
    use tokio::task::JoinHandle;
    use tokio::time::{self, Instant, MissedTickBehavior};

    use super::{Clock, CountdownMachine, RenderState, RenderSurface, Step, TimerSource, WidgetVariant};
    use crate::models::StoreDomain;

    /// Recomputation cadence of an armed countdown.
    pub const TICK: Duration = Duration::from_secs(1);

    /// Per-mount settings.
    #[derive(Debug, Clone)]
    pub struct MountConfig {
        /// Storefront whose timers are loaded.
        pub store: StoreDomain,
        /// Widget being rendered.
        pub variant: WidgetVariant,
        /// Recomputation cadence.
        pub tick: Duration,
    }

    impl MountConfig {
        /// Settings for `store` and `variant` at the standard cadence.
        #[inline]
        #[must_use]
        pub const fn new(store: StoreDomain, variant: WidgetVariant) -> Self {
            Self {
                store,
                variant,
                tick: TICK,
            }
        }
    }

    /// Handle to a running mount.
    ///
    /// Dropping the handle unmounts: the task is aborted, which cancels the
    /// periodic recomputation and drops any fetch still in flight.
    #[derive(Debug)]
    pub struct MountHandle {
        /// Latest state published by the loop.
        state: watch::Receiver<RenderState>,
        /// The loop task.
        task: JoinHandle<()>,
    }

    impl MountHandle {
        /// Latest published state.
        #[inline]
        #[must_use]
        pub fn state(&self) -> RenderState {
            self.state.borrow().clone()
        }

        /// A receiver notified on every state change.
        #[inline]
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<RenderState> {
            self.state.clone()
        }

        /// Returns `true` once the loop has stopped on its own.
        #[inline]
        #[must_use]
        pub fn is_finished(&self) -> bool {
            self.task.is_finished()
        }

        /// Waits for the loop to reach a terminal state and returns it.
        #[inline]
        pub async fn finished(mut self) -> RenderState {
            if let Err(err) = (&mut self.task).await {
                tracing::warn!(error = %err, "countdown task did not complete");
            }
            self.state()
        }

        /// Tears the mount down.
        #[inline]
        pub fn unmount(self) {
            tracing::debug!("countdown unmounted");
        }
    }

    impl Drop for MountHandle {
        #[inline]
        fn drop(&mut self) {
            self.task.abort();
        }
    }

    /// Mounts a countdown widget.
    ///
    /// Spawns one task on the current tokio runtime that loads the store's
    /// timers from `source`, renders every frame to `surface`, and ticks at
    /// `config.tick` while a countdown is armed.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[inline]
    #[must_use = "dropping the handle unmounts the widget"]
    pub fn mount<Src, Surf, Clk>(
        source: Arc<Src>,
        surface: Surf,
        clock: Clk,
        config: MountConfig,
    ) -> MountHandle
    where
        Src: TimerSource + 'static,
        Surf: RenderSurface + 'static,
        Clk: Clock + 'static,
    {
        let (state_tx, state) = watch::channel(RenderState::Idle);
        let task = tokio::spawn(run(source, surface, clock, config, state_tx));
        MountHandle { state, task }
    }

    /// Publishes the machine's state to subscribers.
    fn publish(state_tx: &watch::Sender<RenderState>, machine: &CountdownMachine) {
        let _previous = state_tx.send_replace(machine.state().clone());
    }

    /// Body of the mount task.
    async fn run<Src, Surf, Clk>(
        source: Arc<Src>,
        mut surface: Surf,
        clock: Clk,
        config: MountConfig,
        state_tx: watch::Sender<RenderState>,
    ) where
        Src: TimerSource,
        Surf: RenderSurface,
        Clk: Clock,
    {
        let mut machine = CountdownMachine::new(config.variant);
        if machine.begin_load() {
            publish(&state_tx, &machine);
        }
        tracing::debug!(store = %config.store, "loading timers");
        let loaded = source.fetch_timers(&config.store).await;

        match machine.finish_load(loaded, &clock.now()) {
            Step::Continue(frame) => {
                surface.render(&frame);
                publish(&state_tx, &machine);
            }
            Step::Stop(frame) => {
                surface.render(&frame);
                publish(&state_tx, &machine);
                return;
            }
            Step::Ignored => return,
        }

        let mut ticker = time::interval_at(Instant::now() + config.tick, config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            let _scheduled = ticker.tick().await;
            match machine.tick(&clock.now()) {
                Step::Continue(frame) => {
                    surface.render(&frame);
                    publish(&state_tx, &machine);
                }
                Step::Stop(frame) => {
                    surface.render(&frame);
                    publish(&state_tx, &machine);
                    break;
                }
                Step::Ignored => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TimerError;
    use crate::models::{DisplayOptions, Urgency};
    use chrono::{FixedOffset, TimeDelta};

    fn t0() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-08-15T12:00:00+02:00").unwrap()
    }

    fn timer_between(id: &str, start: TimeDelta, end: TimeDelta) -> Timer {
        let now = Utc::now();
        Timer {
            id: TimerId::from(id),
            store_domain: StoreDomain::from("shop.myshopify.com"),
            timer_name: None,
            start_time: (t0() + start).to_rfc3339(),
            end_time: (t0() + end).to_rfc3339(),
            promotion_text: "Summer <sale>".to_owned(),
            display_options: DisplayOptions {
                color: "hsl(0,100%,50%)".to_owned(),
                size: TimerSize::Large,
                position: TimerPosition::Top,
            },
            urgency: Urgency::new(UrgencyType::ColorPulse),
            created_at: now,
            updated_at: now,
        }
    }

    fn loaded(variant: WidgetVariant, timers: Vec<Timer>) -> (CountdownMachine, Step) {
        let mut machine = CountdownMachine::new(variant);
        assert!(machine.begin_load());
        let step = machine.finish_load(Ok(timers), &t0());
        (machine, step)
    }

    #[test]
    fn load_arms_active_timer() {
        let timers = vec![
            timer_between("later", TimeDelta::hours(1), TimeDelta::hours(2)),
            timer_between("now", TimeDelta::hours(-1), TimeDelta::hours(1)),
        ];
        let (machine, step) = loaded(WidgetVariant::Banner, timers);
        let Step::Continue(Frame::Countdown(view)) = step else {
            panic!("expected a countdown frame, got {step:?}");
        };
        assert_eq!(view.text(), "Summer <sale>: 01:00:00");
        assert_eq!(
            machine.state(),
            &RenderState::Armed {
                timer: TimerId::from("now"),
                remaining: Remaining::from_millis(3_600_000),
            }
        );
    }

    #[test]
    fn begin_load_only_from_idle() {
        let mut machine = CountdownMachine::new(WidgetVariant::Banner);
        assert!(machine.begin_load());
        assert!(!machine.begin_load());
        assert_eq!(machine.state(), &RenderState::Loading);
    }

    #[test]
    fn finish_load_requires_loading() {
        let mut machine = CountdownMachine::new(WidgetVariant::Banner);
        assert_eq!(machine.finish_load(Ok(Vec::new()), &t0()), Step::Ignored);
        assert_eq!(machine.state(), &RenderState::Idle);
    }

    #[test]
    fn expired_timer_on_first_load_is_empty() {
        let timers = vec![timer_between("done", TimeDelta::hours(-1), TimeDelta::seconds(-1))];
        let (machine, step) = loaded(WidgetVariant::Banner, timers.clone());
        assert_eq!(step, Step::Stop(Frame::Notice(Notice::NoActiveTimer)));
        assert_eq!(machine.state(), &RenderState::Empty);

        let (_inline, step) = loaded(WidgetVariant::Inline, timers);
        assert_eq!(step, Step::Stop(Frame::Hidden));
    }

    #[test]
    fn armed_timer_expires_after_ticks() {
        let timers = vec![timer_between("run", TimeDelta::hours(-1), TimeDelta::seconds(2))];
        let (mut machine, step) = loaded(WidgetVariant::Banner, timers);
        assert!(matches!(step, Step::Continue(_)));

        let step = machine.tick(&(t0() + TimeDelta::seconds(1)));
        let Step::Continue(Frame::Countdown(view)) = step else {
            panic!("expected a countdown frame");
        };
        assert_eq!(view.remaining, Remaining::from_millis(1000));

        let step = machine.tick(&(t0() + TimeDelta::seconds(2)));
        assert_eq!(step, Step::Stop(Frame::Notice(Notice::Ended)));
        assert_eq!(
            machine.state(),
            &RenderState::Expired {
                timer: TimerId::from("run")
            }
        );
        assert!(machine.state().is_terminal());
        assert_eq!(machine.tick(&(t0() + TimeDelta::seconds(3))), Step::Ignored);
    }

    #[test]
    fn inline_expiry_shows_zero() {
        let timers = vec![timer_between("run", TimeDelta::hours(-1), TimeDelta::seconds(1))];
        let (mut machine, _armed) = loaded(WidgetVariant::Inline, timers);
        let step = machine.tick(&(t0() + TimeDelta::seconds(5)));
        let Step::Stop(Frame::Countdown(view)) = step else {
            panic!("expected a final countdown frame");
        };
        assert_eq!(view.remaining, Remaining::ZERO);
        assert_eq!(view.text(), "0h 0m 0s");
    }

    #[test]
    fn only_invalid_timers_never_arm() {
        let mut broken = timer_between("broken", TimeDelta::hours(-1), TimeDelta::hours(1));
        broken.end_time = "not-a-date".to_owned();
        let (mut machine, step) = loaded(WidgetVariant::Banner, vec![broken]);
        assert_eq!(step, Step::Stop(Frame::Notice(Notice::InvalidTimer)));
        assert_eq!(machine.state(), &RenderState::Invalid);
        assert_eq!(machine.tick(&t0()), Step::Ignored);
    }

    #[test]
    fn load_failure_is_error_state() {
        let mut machine = CountdownMachine::new(WidgetVariant::Inline);
        assert!(machine.begin_load());
        let step = machine.finish_load(
            Err(TimerError::Api {
                status: 500,
                message: "boom".to_owned(),
            }),
            &t0(),
        );
        assert_eq!(step, Step::Stop(Frame::Notice(Notice::LoadFailed)));
        assert!(matches!(machine.state(), RenderState::Error { message } if message.contains("boom")));
    }

    #[test]
    fn urgency_follows_trigger_threshold() {
        let mut timer = timer_between("run", TimeDelta::hours(-1), TimeDelta::minutes(10));
        timer.urgency = Urgency::new(UrgencyType::NotificationBanner).with_trigger_minutes(Some(5));
        let (mut machine, step) = loaded(WidgetVariant::Inline, vec![timer]);
        let Step::Continue(Frame::Countdown(view)) = step else {
            panic!("expected a countdown frame");
        };
        assert_eq!(view.urgency_class(), None);

        let step = machine.tick(&(t0() + TimeDelta::minutes(6)));
        let Step::Continue(Frame::Countdown(view)) = step else {
            panic!("expected a countdown frame");
        };
        assert_eq!(view.urgency_class(), Some("ct-banner"));
    }

    #[test]
    fn banner_html_escapes_text() {
        let timers = vec![timer_between("now", TimeDelta::hours(-1), TimeDelta::hours(30))];
        let (_machine, step) = loaded(WidgetVariant::Banner, timers);
        let Step::Continue(frame) = step else {
            panic!("expected a countdown frame");
        };
        let html = frame.to_html();
        assert!(html.contains("Summer &lt;sale&gt;: 30:00:00"));
        assert!(html.contains("color:hsl(0,100%,50%)"));
        assert!(!html.contains("<sale>"));
    }

    #[test]
    fn inline_html_carries_size_and_urgency() {
        let timers = vec![timer_between("now", TimeDelta::hours(-1), TimeDelta::hours(1))];
        let (_machine, step) = loaded(WidgetVariant::Inline, timers);
        let Step::Continue(frame) = step else {
            panic!("expected a countdown frame");
        };
        let html = frame.to_html();
        assert!(html.starts_with("<div class=\"countdown-timer ct-color-pulse\""));
        assert!(html.contains("font-size:1.5em"));
        assert!(html.contains("<div>1h 0m 0s</div>"));
        assert!(html.contains("Summer &lt;sale&gt;"));
        assert!(html.contains("@keyframes pulse{0%{background-color:hsl(0,100%,50%);}"));
        assert!(html.contains(".ct-banner{border-top:3px solid #ff4d4f;"));
        assert!(html.ends_with("</style></div>"));
        assert_eq!(frame.text(), "Summer <sale>\n1h 0m 0s");
    }

    #[test]
    fn blank_color_falls_back_per_variant() {
        let mut timer = timer_between("now", TimeDelta::hours(-1), TimeDelta::hours(1));
        timer.display_options.color = String::new();
        timer.promotion_text = "  ".to_owned();
        let banner = CountdownView::of(WidgetVariant::Banner, &timer, Remaining::ZERO);
        let inline = CountdownView::of(WidgetVariant::Inline, &timer, Remaining::ZERO);
        assert_eq!(banner.style.color, "#d49600");
        assert_eq!(inline.style.color, "#000");
        assert_eq!(banner.promotion_text, "Countdown");
    }

    #[test]
    fn notices_render_as_paragraphs() {
        assert_eq!(Frame::Notice(Notice::Ended).to_html(), "<p>Timer ended!</p>");
        assert_eq!(Frame::Hidden.to_html(), "");
        assert_eq!(Notice::LoadFailed.text(), "Could not load timer.");
    }

    #[test]
    fn html_surface_writes_one_line_per_frame() {
        let mut surface = HtmlSurface::new(Vec::new());
        surface.render(&Frame::Notice(Notice::NoActiveTimer));
        surface.render(&Frame::Hidden);
        let written = String::from_utf8(surface.into_inner()).unwrap();
        assert_eq!(written, "<p>No active timer.</p>\n\n");
    }

    #[cfg(feature = "async")]
    mod driver_tests {
        use std::sync::{Arc, Mutex};
        use std::time::Duration;

        use super::*;

        /// Clock pinned to `t0()` that advances with tokio's (paused) time.
        struct TestClock {
            started: tokio::time::Instant,
        }

        impl TestClock {
            fn new() -> Self {
                Self {
                    started: tokio::time::Instant::now(),
                }
            }
        }

        impl Clock for TestClock {
            type Tz = FixedOffset;

            fn now(&self) -> DateTime<FixedOffset> {
                t0() + TimeDelta::from_std(self.started.elapsed()).unwrap()
            }
        }

        /// Source answering with fixed timers after an optional delay.
        struct StaticSource {
            timers: Vec<Timer>,
            delay: Duration,
        }

        impl TimerSource for StaticSource {
            fn fetch_timers(
                &self,
                _store: &StoreDomain,
            ) -> impl Future<Output = Result<Vec<Timer>>> + Send {
                let timers = self.timers.clone();
                let delay = self.delay;
                async move {
                    tokio::time::sleep(delay).await;
                    Ok(timers)
                }
            }
        }

        #[derive(Clone, Default)]
        struct RecordingSurface {
            frames: Arc<Mutex<Vec<Frame>>>,
        }

        impl RecordingSurface {
            fn texts(&self) -> Vec<String> {
                self.frames.lock().unwrap().iter().map(Frame::text).collect()
            }
        }

        impl RenderSurface for RecordingSurface {
            fn render(&mut self, frame: &Frame) {
                self.frames.lock().unwrap().push(frame.clone());
            }
        }

        fn source(timers: Vec<Timer>, delay: Duration) -> Arc<StaticSource> {
            Arc::new(StaticSource { timers, delay })
        }

        fn config(variant: WidgetVariant) -> MountConfig {
            MountConfig::new(StoreDomain::from("shop.myshopify.com"), variant)
        }

        #[tokio::test(start_paused = true)]
        async fn counts_down_then_stops() {
            let timers = vec![timer_between("run", TimeDelta::hours(-1), TimeDelta::seconds(3))];
            let surface = RecordingSurface::default();
            let handle = mount(
                source(timers, Duration::ZERO),
                surface.clone(),
                TestClock::new(),
                config(WidgetVariant::Banner),
            );

            let state = handle.finished().await;
            assert_eq!(
                state,
                RenderState::Expired {
                    timer: TimerId::from("run")
                }
            );
            assert_eq!(
                surface.texts(),
                [
                    "Summer <sale>: 00:00:03",
                    "Summer <sale>: 00:00:02",
                    "Summer <sale>: 00:00:01",
                    "Timer ended!",
                ]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn terminal_load_renders_once() {
            let surface = RecordingSurface::default();
            let handle = mount(
                source(Vec::new(), Duration::ZERO),
                surface.clone(),
                TestClock::new(),
                config(WidgetVariant::Banner),
            );
            assert_eq!(handle.finished().await, RenderState::Empty);
            assert_eq!(surface.texts(), ["No active timer."]);
        }

        #[tokio::test(start_paused = true)]
        async fn state_is_loading_while_fetch_pending() {
            let surface = RecordingSurface::default();
            let handle = mount(
                source(Vec::new(), Duration::from_secs(10)),
                surface.clone(),
                TestClock::new(),
                config(WidgetVariant::Inline),
            );
            let mut updates = handle.subscribe();
            let loading = *updates.wait_for(|state| *state == RenderState::Loading).await.unwrap()
                == RenderState::Loading;
            assert!(loading);
            assert!(surface.texts().is_empty());
            assert!(!handle.is_finished());
        }

        #[tokio::test(start_paused = true)]
        async fn unmount_drops_late_fetch() {
            let timers = vec![timer_between("run", TimeDelta::hours(-1), TimeDelta::hours(1))];
            let surface = RecordingSurface::default();
            let handle = mount(
                source(timers, Duration::from_secs(5)),
                surface.clone(),
                TestClock::new(),
                config(WidgetVariant::Banner),
            );
            let updates = handle.subscribe();
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.unmount();

            tokio::time::sleep(Duration::from_secs(30)).await;
            assert!(surface.texts().is_empty());
            assert_eq!(*updates.borrow(), RenderState::Loading);
        }

        #[tokio::test(start_paused = true)]
        async fn unmount_cancels_ticking() {
            let timers = vec![timer_between("run", TimeDelta::hours(-1), TimeDelta::hours(1))];
            let surface = RecordingSurface::default();
            let handle = mount(
                source(timers, Duration::ZERO),
                surface.clone(),
                TestClock::new(),
                config(WidgetVariant::Inline),
            );
            tokio::time::sleep(Duration::from_millis(2500)).await;
            drop(handle);
            let rendered = surface.texts().len();
            assert_eq!(rendered, 3);

            tokio::time::sleep(Duration::from_secs(10)).await;
            assert_eq!(surface.texts().len(), rendered);
        }
    }
}
