// outpost-dash
//
// Live terminal dashboard for an Outpost facility hub.
//
// Build: cargo run --release --bin outpost-dash -- [options]
// Quit:  q / Esc / Ctrl-C

use chrono::Local;
use clap::Parser;
use crossbeam::channel;
use crossterm::style::{Attribute, Color, ResetColor, SetAttribute, SetForegroundColor};
use crossterm::{cursor, event, style, terminal, ExecutableCommand, QueueableCommand};
use outpost::backfill::{self, BackfillError, Measure, SensorRecord};
use outpost::feed::Feed;
use outpost::history::Store;
use outpost::panel::{Badge, Severity, TrendWindow, TREND_CAPACITY};
use outpost::view::Tab;
use outpost::Dashboard;
use outpost_tools::{init_file_logging, Site, SiteOpts};
use std::collections::VecDeque;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Parser, Debug)]
#[command(
    name = "outpost-dash",
    version,
    about = "Live terminal dashboard for an Outpost facility hub"
)]
struct Cli {
    #[command(flatten)]
    site: SiteOpts,

    /// UI refresh rate (frames per second)
    #[arg(long, help = "UI refresh rate (frames per second)")]
    fps: Option<u64>,

    /// Debug log destination; the terminal belongs to the dashboard
    #[arg(long = "log-file", help = "Debug log file path")]
    log_file: Option<PathBuf>,

    /// Suppress the key-hint footer
    #[arg(long, help = "Suppress the key-hint footer")]
    quiet: bool,
}

/// Site archive behind the history view.
enum Archive {
    /// No API base configured; the view can only show a hint.
    Unconfigured,
    Idle,
    Fetching,
    Ready(Vec<SensorRecord>),
    Failed,
}

const SPARK_LEVELS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Points per archive chart; only the newest tail is drawn.
const ARCHIVE_SPARK_WIDTH: usize = 48;

/// Scales a series into a line of block characters over its own min/max.
fn sparkline<'a>(values: impl Iterator<Item = &'a f64>) -> String {
    let values: Vec<f64> = values.copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return String::new();
    }
    let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
    for &v in &values {
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let span = if hi > lo { hi - lo } else { 1.0 };
    values
        .iter()
        .map(|v| {
            let idx = ((v - lo) / span * (SPARK_LEVELS.len() - 1) as f64).round() as usize;
            SPARK_LEVELS[idx.min(SPARK_LEVELS.len() - 1)]
        })
        .collect()
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Info => Color::Blue,
        Severity::Warning => Color::Yellow,
        Severity::Danger => Color::Red,
    }
}

fn window_span(trend: &TrendWindow) -> String {
    match (trend.labels().front(), trend.labels().back()) {
        (Some(first), Some(last)) => format!("{} → {}", first, last),
        _ => "waiting for samples".to_string(),
    }
}

struct Tui {
    stdout: io::Stdout,
}

impl Tui {
    fn setup() -> io::Result<Self> {
        let mut stdout = io::stdout();
        terminal::enable_raw_mode()?;
        stdout.execute(terminal::EnterAlternateScreen)?;
        stdout.execute(cursor::Hide)?;
        Ok(Self { stdout })
    }

    fn teardown(&mut self) {
        let _ = self.stdout.execute(cursor::Show);
        let _ = self.stdout.execute(terminal::LeaveAlternateScreen);
        let _ = terminal::disable_raw_mode();
        let _ = self.stdout.flush();
    }

    fn draw(
        &mut self,
        dash: &Dashboard,
        archive: &Archive,
        now: Instant,
        quiet: bool,
    ) -> io::Result<()> {
        self.stdout.queue(cursor::MoveTo(0, 0))?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::All))?;

        // Header
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(format!(
            "OUTPOST COMMAND — {}   {}",
            dash.view.title(),
            dash.clock
        )))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;

        // Link badge, role, view strip
        self.badge(dash.link.badge())?;
        self.stdout.queue(style::Print(format!(
            "  role: {}   ",
            dash.role.as_ref().map_or("-", |r| r.name())
        )))?;
        for tab in Tab::ALL {
            let marker = if dash.view.active() == Some(tab) {
                '*'
            } else {
                ' '
            };
            self.stdout
                .queue(style::Print(format!("[{}{}] ", marker, tab.id())))?;
        }
        self.stdout.queue(cursor::MoveToNextLine(2))?;

        match dash.view.active() {
            Some(Tab::Overview) => self.draw_overview(dash, now)?,
            Some(Tab::LiveFeed) => self.draw_live_feed(dash)?,
            Some(Tab::History) => self.draw_history(archive)?,
            None => {
                self.stdout.queue(style::Print("  no view selected"))?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
            }
        }

        if !quiet {
            self.stdout.queue(cursor::MoveToNextLine(1))?;
            self.stdout.queue(SetForegroundColor(Color::DarkGrey))?;
            self.stdout.queue(style::Print(
                "q quit   1/2/3 or tab to switch view   l lockdown   r reload archive",
            ))?;
            self.stdout.queue(ResetColor)?;
        }

        self.stdout.flush()
    }

    fn draw_overview(&mut self, dash: &Dashboard, now: Instant) -> io::Result<()> {
        let (temp, temp_badge) = dash.temperature_card();
        let (guards, guard_badge) = dash.guards_card();
        let (door, door_badge) = dash.door_card();
        let (fence, fence_badge) = dash.fence_card();

        self.card("Temperature", &temp, Some(temp_badge), false)?;
        self.card("Humidity", &dash.humidity_card(), None, false)?;
        self.card("Guards", &guards, Some(guard_badge), false)?;
        self.card("Door", door, Some(door_badge), false)?;
        self.card("Fence", fence, Some(fence_badge), dash.fence_flashing(now))?;
        self.card("System", dash.system_card(), Some(dash.health()), false)?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;

        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print("Temperature trend:"))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        self.series_line("temp °C", dash.trend.temperature(), Color::Cyan)?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;

        self.lockdown_line(dash, now)?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        self.log_section(dash, 6)
    }

    fn draw_live_feed(&mut self, dash: &Dashboard) -> io::Result<()> {
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(format!(
            "Trend ({} of {} points)   {}",
            dash.trend.len(),
            TREND_CAPACITY,
            window_span(&dash.trend)
        )))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        self.series_line("temp °C", dash.trend.temperature(), Color::Red)?;
        self.series_line("hum %", dash.trend.humidity(), Color::Cyan)?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;

        // Recent readings
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print(format!(
            "  {:<10}  {:<14}  {}",
            "time", "field", "value"
        )))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        if dash.recent.is_empty() {
            self.stdout.queue(SetForegroundColor(Color::DarkGrey))?;
            self.stdout.queue(style::Print("  (waiting for telemetry)"))?;
            self.stdout.queue(ResetColor)?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }
        for row in dash.recent.rows() {
            self.stdout.queue(style::Print(format!(
                "  {:<10}  {:<14}  {}",
                row.time,
                row.field.name(),
                row.value
            )))?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        self.log_section(dash, 15)
    }

    fn draw_history(&mut self, archive: &Archive) -> io::Result<()> {
        match archive {
            Archive::Unconfigured => {
                self.stdout
                    .queue(style::Print("  site archive needs an API base (--api)"))?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
            }
            Archive::Idle | Archive::Fetching => {
                self.stdout.queue(style::Print("  loading site archive..."))?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
            }
            Archive::Failed => {
                self.stdout.queue(SetForegroundColor(Color::Yellow))?;
                self.stdout
                    .queue(style::Print("  site archive unavailable, r to retry"))?;
                self.stdout.queue(ResetColor)?;
                self.stdout.queue(cursor::MoveToNextLine(1))?;
            }
            Archive::Ready(records) => {
                self.stdout.queue(style::Print(format!(
                    "  {} archived readings   current state ",
                    records.len()
                )))?;
                self.badge(backfill::latest_alert(records).badge())?;
                self.stdout.queue(cursor::MoveToNextLine(2))?;
                for measure in Measure::ALL {
                    let series = backfill::series(records, measure);
                    let tail = &series[series.len().saturating_sub(ARCHIVE_SPARK_WIDTH)..];
                    let last = series
                        .last()
                        .map_or("--".to_string(), |v| format!("{:.1}", v));
                    self.stdout
                        .queue(style::Print(format!("  {:<15} ", measure.label())))?;
                    self.stdout.queue(SetForegroundColor(Color::Cyan))?;
                    self.stdout
                        .queue(style::Print(format!("{:<48}", sparkline(tail.iter()))))?;
                    self.stdout.queue(ResetColor)?;
                    self.stdout.queue(style::Print(format!("  {}", last)))?;
                    self.stdout.queue(cursor::MoveToNextLine(1))?;
                }
            }
        }
        Ok(())
    }

    fn card(
        &mut self,
        label: &str,
        value: &str,
        badge: Option<Badge>,
        flash: bool,
    ) -> io::Result<()> {
        if flash {
            self.stdout.queue(SetAttribute(Attribute::Reverse))?;
        }
        self.stdout
            .queue(style::Print(format!("  {:<12} {:>10}  ", label, value)))?;
        if let Some(badge) = badge {
            self.badge(badge)?;
        }
        if flash {
            self.stdout.queue(SetAttribute(Attribute::Reset))?;
        }
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        Ok(())
    }

    fn badge(&mut self, badge: Badge) -> io::Result<()> {
        self.stdout
            .queue(SetForegroundColor(severity_color(badge.severity)))?;
        self.stdout.queue(style::Print(format!("[{}]", badge.text)))?;
        self.stdout.queue(ResetColor)?;
        Ok(())
    }

    fn series_line(
        &mut self,
        label: &str,
        series: &VecDeque<f64>,
        color: Color,
    ) -> io::Result<()> {
        let spark = sparkline(series.iter());
        let last = series
            .back()
            .map_or("--".to_string(), |v| format!("{:.1}", v));
        self.stdout.queue(style::Print(format!("  {:<10} ", label)))?;
        self.stdout.queue(SetForegroundColor(color))?;
        self.stdout
            .queue(style::Print(format!("{:<15}", spark)))?;
        self.stdout.queue(ResetColor)?;
        self.stdout.queue(style::Print(format!("  {}", last)))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        Ok(())
    }

    fn lockdown_line(&mut self, dash: &Dashboard, now: Instant) -> io::Result<()> {
        let state = if dash.lockdown.is_engaged() {
            "ENGAGED"
        } else {
            "RELEASED"
        };
        match dash.lockdown.blocked_for(now) {
            Some(left) => {
                // Dimmed while the control cools down.
                self.stdout.queue(SetForegroundColor(Color::DarkGrey))?;
                self.stdout.queue(style::Print(format!(
                    "  [l] master lockdown: {}   (ready in {}s)",
                    state,
                    left.as_secs() + 1
                )))?;
                self.stdout.queue(ResetColor)?;
            }
            None => {
                let color = if dash.lockdown.is_engaged() {
                    Color::Red
                } else {
                    Color::Green
                };
                self.stdout.queue(style::Print("  [l] master lockdown: "))?;
                self.stdout.queue(SetForegroundColor(color))?;
                self.stdout.queue(style::Print(state))?;
                self.stdout.queue(ResetColor)?;
            }
        }
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        Ok(())
    }

    fn log_section(&mut self, dash: &Dashboard, depth: usize) -> io::Result<()> {
        self.stdout.queue(SetAttribute(Attribute::Bold))?;
        self.stdout.queue(style::Print("Event log:"))?;
        self.stdout.queue(SetAttribute(Attribute::Reset))?;
        self.stdout.queue(cursor::MoveToNextLine(1))?;
        if dash.events.is_empty() {
            self.stdout.queue(SetForegroundColor(Color::DarkGrey))?;
            self.stdout.queue(style::Print("  (no events yet)"))?;
            self.stdout.queue(ResetColor)?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;
            return Ok(());
        }
        for entry in dash.events.entries().take(depth) {
            self.stdout
                .queue(SetForegroundColor(severity_color(entry.severity)))?;
            self.stdout.queue(style::Print(format!("  {}", entry.line())))?;
            self.stdout.queue(ResetColor)?;
            self.stdout.queue(cursor::MoveToNextLine(1))?;
        }
        Ok(())
    }
}

fn next_tab(active: Option<Tab>) -> Tab {
    let current = match active {
        Some(tab) => tab,
        None => return Tab::Overview,
    };
    let idx = Tab::ALL.iter().position(|t| *t == current).unwrap_or(0);
    Tab::ALL[(idx + 1) % Tab::ALL.len()]
}

/// Kicks off an archive fetch unless one is already running or a result
/// is already showing. `force` refetches over an existing result.
fn refresh_archive(
    site: &Site,
    archive: &mut Archive,
    tx: &channel::Sender<Result<Vec<SensorRecord>, BackfillError>>,
    force: bool,
) {
    let url = match site.records_url() {
        Some(url) => url,
        None => return,
    };
    match archive {
        Archive::Fetching => return,
        Archive::Ready(_) if !force => return,
        _ => {}
    }
    *archive = Archive::Fetching;
    let tx = tx.clone();
    std::thread::spawn(move || {
        let _ = tx.send(backfill::fetch_records(&url));
    });
}

fn main() {
    let cli = Cli::parse();
    let site = match cli.site.resolve() {
        Ok(site) => site,
        Err(err) => {
            eprintln!("{}", err);
            std::process::exit(2);
        }
    };
    let fps = cli.fps.unwrap_or(site.fps);
    let log_file = cli.log_file.clone().or_else(|| site.log_file.clone());
    if let Err(err) = init_file_logging(log_file.as_ref()) {
        eprintln!("{}", err);
        std::process::exit(2);
    }

    // A dead store only loses persistence; the live view still works.
    let store = match Store::open(&site.history_file, site.retention) {
        Ok(store) => Some(store),
        Err(err) => {
            debug!("history store disabled: {}", err);
            None
        }
    };

    let feed = match Feed::connect(site.feed_config()) {
        Ok(feed) => feed,
        Err(err) => {
            eprintln!("cannot reach hub: {}", err);
            std::process::exit(1);
        }
    };

    let mut tui = Tui::setup().expect("TUI setup failed");
    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        let mut t = Tui {
            stdout: io::stdout(),
        };
        t.teardown();
        original_hook(panic_info);
    }));

    // Keyboard handler
    let (key_tx, key_rx) = channel::unbounded();
    std::thread::spawn(move || loop {
        if let Ok(ev) = event::read() {
            if key_tx.send(ev).is_err() {
                break;
            }
        }
    });

    let (archive_tx, archive_rx) = channel::unbounded();
    let mut archive = match site.records_url() {
        Some(_) => Archive::Idle,
        None => Archive::Unconfigured,
    };

    let mut dash = Dashboard::new(store);
    dash.tick_clock(Local::now());

    let frame = channel::tick(Duration::from_millis((1000 / fps.max(1)).max(1)));
    let clock = channel::tick(Duration::from_secs(1));

    // UI loop
    'main: loop {
        crossbeam::select! {
            recv(feed.receiver()) -> event => {
                match event {
                    Ok(event) => dash.apply(event, Local::now()),
                    Err(_) => break 'main,
                }
            }

            recv(key_rx) -> ev => {
                if let Ok(event::Event::Key(k)) = ev {
                    use event::{KeyCode, KeyModifiers};
                    let quit = k.code == KeyCode::Char('q')
                             || k.code == KeyCode::Esc
                             || (k.code == KeyCode::Char('c') && k.modifiers == KeyModifiers::CONTROL);
                    if quit { break 'main; }
                    match k.code {
                        KeyCode::Char('1') => dash.view.select(Tab::Overview),
                        KeyCode::Char('2') => dash.view.select(Tab::LiveFeed),
                        KeyCode::Char('3') => {
                            dash.view.select(Tab::History);
                            refresh_archive(&site, &mut archive, &archive_tx, false);
                        }
                        KeyCode::Tab => {
                            let next = next_tab(dash.view.active());
                            dash.view.select(next);
                            if next == Tab::History {
                                refresh_archive(&site, &mut archive, &archive_tx, false);
                            }
                        }
                        KeyCode::Char('l') => {
                            if !dash.toggle_lockdown(Local::now(), Instant::now()) {
                                debug!("lockdown control still cooling down");
                            }
                        }
                        KeyCode::Char('r') => refresh_archive(&site, &mut archive, &archive_tx, true),
                        _ => {}
                    }
                }
            }

            recv(archive_rx) -> result => {
                match result {
                    Ok(Ok(records)) => archive = Archive::Ready(records),
                    Ok(Err(err)) => {
                        debug!("archive fetch failed: {}", err);
                        archive = Archive::Failed;
                    }
                    Err(_) => {}
                }
            }

            recv(clock) -> _ => dash.tick_clock(Local::now()),

            recv(frame) -> _ => {
                if tui.draw(&dash, &archive, Instant::now(), cli.quiet).is_err() {
                    break 'main;
                }
            }
        }
    }

    feed.shutdown();
    tui.teardown();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparkline_scales_to_the_window() {
        let values = [0.0, 1.0, 2.0, 3.0];
        assert_eq!(sparkline(values.iter()), "▁▃▆█");
        // A flat series draws at the floor rather than dividing by zero.
        let flat = [5.0, 5.0, 5.0];
        assert_eq!(sparkline(flat.iter()), "▁▁▁");
        let empty: [f64; 0] = [];
        assert_eq!(sparkline(empty.iter()), "");
    }

    #[test]
    fn tabs_cycle_in_order() {
        assert_eq!(next_tab(Some(Tab::Overview)), Tab::LiveFeed);
        assert_eq!(next_tab(Some(Tab::LiveFeed)), Tab::History);
        assert_eq!(next_tab(Some(Tab::History)), Tab::Overview);
        assert_eq!(next_tab(None), Tab::Overview);
    }
}
