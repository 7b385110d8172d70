//! CLI for running and driving the countdown timer API.

extern crate alloc;

use alloc::sync::Arc;
use std::io::{self, Write as _};
use std::process::ExitCode;

use chrono::Local;
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use storefront_countdown::client::{TimerBlockingClient, TimerClient};
use storefront_countdown::config::ServerConfig;
use storefront_countdown::countdown::{
    Frame, HtmlSurface, MountConfig, RenderState, RenderSurface, SystemClock, WidgetVariant, mount,
};
use storefront_countdown::form::{Hsb, TimerDraft, TimerForm, css_rgb};
use storefront_countdown::models::{
    StoreDomain, Timer, TimerId, TimerPosition, TimerSize, UrgencyType,
};
use storefront_countdown::selection::{TimerStatus, status_at};
use storefront_countdown::server;

/// Environment variable holding the timer API base URL.
const API_URL_ENV: &str = "COUNTDOWN_API_URL";

/// Countdown timer CLI: serve the timer API, manage timers, preview widgets.
#[derive(Debug, Parser)]
#[command(name = "countdown", version, about)]
struct Cli {
    /// Timer API base URL (default: $COUNTDOWN_API_URL).
    #[arg(long, global = true, value_name = "URL")]
    api_url: Option<String>,
    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
enum Command {
    /// Run the timer API server (configured from PORT, HOST,
    /// TIMER_STORE_URL and CORS_ALLOWED_ORIGINS).
    Serve,
    /// Create a timer through the admin form.
    Create(CreateArgs),
    /// List a store's timers with their current status.
    List {
        /// Store domain, e.g. `shop.myshopify.com`.
        #[arg(long)]
        store: String,
    },
    /// Delete a timer by id.
    Delete {
        /// Timer id.
        id: String,
    },
    /// Mount a storefront widget and render it until it stops.
    Watch {
        /// Store domain, e.g. `shop.myshopify.com`.
        #[arg(long)]
        store: String,
        /// Widget to render.
        #[arg(long, value_enum, default_value_t = VariantArg::Banner)]
        variant: VariantArg,
        /// Print widget HTML instead of terminal text.
        #[arg(long)]
        html: bool,
    },
}

/// Widget choice for `watch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    /// Announcement bar.
    Banner,
    /// Product-page block.
    Inline,
}

impl From<VariantArg> for WidgetVariant {
    #[inline]
    fn from(arg: VariantArg) -> Self {
        match arg {
            VariantArg::Banner => Self::Banner,
            VariantArg::Inline => Self::Inline,
        }
    }
}

/// Arguments for the `create` subcommand.
#[derive(Debug, Args)]
struct CreateArgs {
    /// Store domain, e.g. `shop.myshopify.com`.
    #[arg(long)]
    store: String,
    /// Optional merchant-facing label.
    #[arg(long)]
    name: Option<String>,
    /// Start date (YYYY-MM-DD).
    #[arg(long)]
    start_date: String,
    /// Start time (HH:MM).
    #[arg(long)]
    start_time: String,
    /// End date (YYYY-MM-DD).
    #[arg(long)]
    end_date: String,
    /// End time (HH:MM).
    #[arg(long)]
    end_time: String,
    /// Promotion text shown next to the countdown.
    #[arg(long)]
    text: String,
    /// Color as `hsl(H,S%,B%)`.
    #[arg(long, value_parser = parse_color)]
    color: Option<Hsb>,
    /// Widget size: small, medium or large.
    #[arg(long, value_parser = parse_size)]
    size: Option<TimerSize>,
    /// Widget position: top, bottom, left or right.
    #[arg(long, value_parser = parse_position)]
    position: Option<TimerPosition>,
    /// Urgency effect: none, colorPulse or notificationBanner.
    #[arg(long, value_parser = parse_urgency)]
    urgency: Option<UrgencyType>,
    /// Minutes before the end at which the urgency effect starts.
    #[arg(long)]
    trigger_minutes: Option<u32>,
}

impl CreateArgs {
    /// Fills a form draft from the arguments.
    fn into_draft(self) -> TimerDraft {
        TimerDraft {
            name: self.name.unwrap_or_default(),
            start_date: self.start_date,
            start_time: self.start_time,
            end_date: self.end_date,
            end_time: self.end_time,
            promotion_text: self.text,
            color: self.color.unwrap_or_default(),
            size: self.size.unwrap_or_default(),
            position: self.position.unwrap_or_default(),
            urgency: self.urgency.unwrap_or_default(),
            trigger_minutes: self.trigger_minutes,
        }
    }
}

/// Parses an `hsl(H,S%,B%)` color for clap.
fn parse_color(s: &str) -> Result<Hsb, String> {
    let hsb = Hsb::parse_css(s).ok_or_else(|| format!("expected hsl(H,S%,B%), got \"{s}\""))?;
    hsb.validate().map_err(|err| format!("{err}"))?;
    Ok(hsb)
}

/// Parses a widget size for clap.
fn parse_size(s: &str) -> Result<TimerSize, String> {
    s.parse().map_err(|err| format!("{err}"))
}

/// Parses a widget position for clap.
fn parse_position(s: &str) -> Result<TimerPosition, String> {
    s.parse().map_err(|err| format!("{err}"))
}

/// Parses an urgency effect for clap.
fn parse_urgency(s: &str) -> Result<UrgencyType, String> {
    s.parse().map_err(|err| format!("{err}"))
}

/// Resolves the API base URL from the flag or the environment.
fn read_api_url(flag: Option<String>) -> io::Result<Option<String>> {
    if let Some(url) = flag.filter(|url| !url.is_empty()) {
        return Ok(Some(url));
    }
    match std::env::var(API_URL_ENV) {
        Ok(val) if !val.is_empty() => Ok(Some(val)),
        _ => {
            let mut err = io::stderr().lock();
            writeln!(
                err,
                "{} no API URL given and {} is not set",
                "error:".red().bold(),
                API_URL_ENV.bold()
            )?;
            writeln!(
                err,
                "  {} pass --api-url or add {}=http://localhost:5000 to .env",
                "hint:".cyan(),
                API_URL_ENV
            )?;
            Ok(None)
        }
    }
}

/// Runs the CLI, returning an appropriate exit code.
fn run() -> io::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(io::stderr)
        .init();

    let _dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    if matches!(cli.command, Command::Serve) {
        return cmd_serve();
    }

    let Some(api_url) = read_api_url(cli.api_url)? else {
        return Ok(ExitCode::FAILURE);
    };

    match cli.command {
        Command::Serve => cmd_serve(),
        Command::Create(args) => with_blocking_client(&api_url, |client| cmd_create(client, args)),
        Command::List { store } => {
            with_blocking_client(&api_url, |client| cmd_list(client, &StoreDomain::new(store)))
        }
        Command::Delete { id } => {
            with_blocking_client(&api_url, |client| cmd_delete(client, &TimerId::new(id)))
        }
        Command::Watch {
            store,
            variant,
            html,
        } => cmd_watch(&api_url, StoreDomain::new(store), variant.into(), html),
    }
}

/// Builds a blocking client for `api_url` and hands it to `command`.
fn with_blocking_client<F>(api_url: &str, command: F) -> io::Result<ExitCode>
where
    F: FnOnce(&TimerBlockingClient) -> io::Result<ExitCode>,
{
    match TimerBlockingClient::builder().base_url(api_url).build() {
        Ok(client) => command(&client),
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to build client: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Builds the multi-threaded runtime used by `serve` and `watch`.
fn runtime() -> io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread().enable_all().build()
}

/// Waits for Ctrl-C.
async fn ctrl_c() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for Ctrl-C");
        core::future::pending::<()>().await;
    }
}

/// Executes the `serve` subcommand: runs the API until Ctrl-C.
fn cmd_serve() -> io::Result<ExitCode> {
    let config = match ServerConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} invalid server configuration: {err}",
                "error:".red().bold()
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };

    match runtime()?.block_on(server::serve(&config, ctrl_c())) {
        Ok(()) => Ok(ExitCode::SUCCESS),
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} server failed: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `create` subcommand: submits the admin form.
fn cmd_create(client: &TimerBlockingClient, args: CreateArgs) -> io::Result<ExitCode> {
    let store = StoreDomain::new(args.store.clone());
    let mut form = TimerForm::with_draft(args.into_draft());
    let spinner = make_spinner("Creating timer...");
    let created = form.submit(&store, |new_timer| client.create_timer(&new_timer));
    spinner.finish_and_clear();

    if let Some(timer) = created {
        let mut out = io::stdout().lock();
        writeln!(out, "{} {}", "Timer created:".green().bold(), timer.id.bold())?;
        print_timers_table(&[timer])?;
        return Ok(ExitCode::SUCCESS);
    }
    let message = form.banner().unwrap_or("timer was not created");
    writeln!(io::stderr().lock(), "{} {message}", "error:".red().bold())?;
    Ok(ExitCode::FAILURE)
}

/// Executes the `list` subcommand: prints a store's timers.
fn cmd_list(client: &TimerBlockingClient, store: &StoreDomain) -> io::Result<ExitCode> {
    let spinner = make_spinner("Loading timers...");
    let listed = client.list_timers(store);
    spinner.finish_and_clear();

    match listed {
        Ok(timers) => {
            print_timers_table(&timers)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to list timers: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `delete` subcommand.
fn cmd_delete(client: &TimerBlockingClient, id: &TimerId) -> io::Result<ExitCode> {
    match client.delete_timer(id) {
        Ok(response) => {
            writeln!(
                io::stdout().lock(),
                "{} {}",
                response.message.green().bold(),
                format_args!("({})", response.deleted_timer.promotion_text).dimmed()
            )?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to delete timer: {err}",
                "error:".red().bold()
            )?;
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Executes the `watch` subcommand: mounts a widget and renders it until it
/// reaches a terminal state or Ctrl-C.
fn cmd_watch(
    api_url: &str,
    store: StoreDomain,
    variant: WidgetVariant,
    html: bool,
) -> io::Result<ExitCode> {
    let client = match TimerClient::builder().base_url(api_url).build() {
        Ok(client) => Arc::new(client),
        Err(err) => {
            writeln!(
                io::stderr().lock(),
                "{} failed to build client: {err}",
                "error:".red().bold()
            )?;
            return Ok(ExitCode::FAILURE);
        }
    };
    let config = MountConfig::new(store, variant);

    let state = runtime()?.block_on(async move {
        let handle = if html {
            mount(client, HtmlSurface::new(io::stdout()), SystemClock, config)
        } else {
            mount(client, TerminalSurface::default(), SystemClock, config)
        };
        tokio::select! {
            state = handle.finished() => Some(state),
            () = ctrl_c() => None,
        }
    });

    Ok(match state {
        Some(RenderState::Error { .. }) => ExitCode::FAILURE,
        Some(_) | None => ExitCode::SUCCESS,
    })
}

/// Surface printing each frame as colored terminal text.
#[derive(Debug, Default)]
struct TerminalSurface {
    /// Frames rendered so far; drives the pulse effect.
    frames: u64,
}

impl TerminalSurface {
    /// Writes `frame` to `out`.
    #[allow(clippy::pattern_type_mismatch, reason = "frame contents are only borrowed")]
    fn write_frame<W: io::Write>(&mut self, out: &mut W, frame: &Frame) -> io::Result<()> {
        self.frames = self.frames.wrapping_add(1);
        match frame {
            Frame::Hidden => Ok(()),
            Frame::Notice(notice) => writeln!(out, "{}", notice.text().dimmed()),
            Frame::Countdown(view) => {
                let (red, green, blue) = css_rgb(&view.style.color).unwrap_or((255, 255, 255));
                let text = frame.text();
                match view.style.urgency {
                    UrgencyType::ColorPulse if self.frames % 2 == 0 => {
                        writeln!(out, "{}", text.truecolor(red, green, blue).dimmed())
                    }
                    UrgencyType::ColorPulse | UrgencyType::None => {
                        writeln!(out, "{}", text.truecolor(red, green, blue).bold())
                    }
                    UrgencyType::NotificationBanner => writeln!(
                        out,
                        "{} {}",
                        "ending soon".on_red().white().bold(),
                        text.truecolor(red, green, blue).bold()
                    ),
                }
            }
        }
    }
}

impl RenderSurface for TerminalSurface {
    #[inline]
    fn render(&mut self, frame: &Frame) {
        let mut out = io::stdout().lock();
        if let Err(err) = self.write_frame(&mut out, frame).and_then(|()| out.flush()) {
            tracing::warn!(error = %err, "failed to write frame");
        }
    }
}

/// Prints timers as a table, with their status right now.
fn print_timers_table(timers: &[Timer]) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if timers.is_empty() {
        writeln!(out, "{}", "No timers found.".dimmed())?;
        return Ok(());
    }

    let now = Local::now();
    let mut table = Table::new();
    _ = table.load_preset(UTF8_FULL);
    _ = table.set_header(vec![
        Cell::new("ID").fg(Color::Cyan),
        Cell::new("Promotion").fg(Color::Cyan),
        Cell::new("Start").fg(Color::Cyan),
        Cell::new("End").fg(Color::Cyan),
        Cell::new("Status").fg(Color::Cyan),
        Cell::new("Color").fg(Color::Cyan),
        Cell::new("Urgency").fg(Color::Cyan),
    ]);

    for timer in timers {
        let status = status_at(timer, &now);
        let status_color = match status {
            TimerStatus::Running => Color::Green,
            TimerStatus::Scheduled => Color::Yellow,
            TimerStatus::Ended => Color::DarkGrey,
            TimerStatus::Invalid => Color::Red,
        };
        let color = &timer.display_options.color;
        let color_cell = css_rgb(color).map_or_else(
            || Cell::new(color),
            |(r, g, b)| Cell::new(format!("\u{25a0} {color}")).fg(Color::Rgb { r, g, b }),
        );
        let urgency = if timer.urgency.enabled {
            timer.urgency.trigger_minutes.map_or_else(
                || timer.urgency.kind.to_string(),
                |minutes| format!("{} (last {minutes}m)", timer.urgency.kind),
            )
        } else {
            UrgencyType::None.to_string()
        };
        _ = table.add_row(vec![
            Cell::new(&timer.id),
            Cell::new(&timer.promotion_text),
            Cell::new(&timer.start_time),
            Cell::new(&timer.end_time),
            Cell::new(status).fg(status_color),
            color_cell,
            Cell::new(urgency),
        ]);
    }

    writeln!(
        out,
        "{} {}",
        "Timers".green().bold(),
        format_args!("({})", timers.len()).dimmed()
    )?;
    writeln!(out, "{table}")?;
    Ok(())
}

/// Creates a spinner with the given message.
fn make_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message.to_owned());
    spinner.enable_steady_tick(core::time::Duration::from_millis(80));
    spinner
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            // Last-resort error output; if stderr itself failed there is
            // nowhere left to report.
            let _ignored = writeln!(io::stderr(), "fatal I/O error: {err}");
            ExitCode::FAILURE
        }
    }
}
