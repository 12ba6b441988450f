//! Interactive console monitor for ADSBee receivers: streams classified
//! device log lines over a WebSocket console link, with local filter
//! commands, pass-through AT commands, and help/statistics overlays.

mod session_log;
mod transport;
mod ui;

use std::io;
use std::path::PathBuf;

use adsbee_core::{Annotator, Classifier, ConsoleState, Overlay, Stats, Tag};
use anyhow::{Context, Result};
use clap::Parser;
use crossterm::{
    event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures_util::StreamExt;
use ratatui::{backend::CrosstermBackend, Terminal};
use tokio::sync::mpsc;
use tokio::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use session_log::SessionLog;
use transport::{NetEvent, Outbound};

const NET_QUEUE_CAPACITY: usize = 256;
const OUTBOUND_QUEUE_CAPACITY: usize = 64;
const REPAINT_INTERVAL_MS: u64 = 500;
const MQTT_PRESET: [&str; 5] = ["MQTT", "mqtt", "Feed", "feed", "protocol"];

#[derive(Parser, Debug)]
#[command(name = "adsbee-console", about = "Interactive console monitor for ADSBee receivers")]
struct Args {
    /// Device address
    #[arg(long, default_value = "192.168.1.73")]
    host: String,
    /// Console port on the device
    #[arg(long, default_value_t = 80)]
    port: u16,
    /// Initial filter pattern (repeatable)
    #[arg(long = "filter", short = 'f')]
    filters: Vec<String>,
    /// Append received lines to this file
    #[arg(long = "log", short = 'l')]
    log_file: Option<PathBuf>,
    /// Start with the feed/MQTT chatter filters active
    #[arg(long)]
    mqtt: bool,
    /// Device log level to set right after connecting
    #[arg(long, value_parser = ["INFO", "WARNINGS", "ERRORS", "SILENT"])]
    log_level: Option<String>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Stdout belongs to the TUI; only log there when explicitly asked.
    let stdout_enabled = matches!(
        std::env::var("ADSBEE_LOG_STDOUT").ok().as_deref(),
        Some("1") | Some("true") | Some("TRUE") | Some("yes") | Some("YES")
    );
    if stdout_enabled {
        let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
    } else {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::sink)
            .try_init();
    }
}

/// The whole console, owned by the event loop. Socket tasks talk to it
/// through channels, so every state mutation happens on one task.
pub struct App {
    pub host: String,
    pub state: ConsoleState,
    pub classifier: Classifier,
    pub annotator: Option<Annotator>,
    pub connected: bool,
    session_log: Option<SessionLog>,
    outbound: mpsc::Sender<Outbound>,
}

impl App {
    pub fn new(
        host: String,
        outbound: mpsc::Sender<Outbound>,
        annotator: Option<Annotator>,
        session_log: Option<SessionLog>,
    ) -> Self {
        Self {
            host,
            state: ConsoleState::new(),
            classifier: Classifier::new(),
            annotator,
            connected: true,
            session_log,
            outbound,
        }
    }

    fn sys(&mut self, text: String) {
        self.state.push_line(Tag::System, text);
    }

    /// Classification pipeline for one delivered message, lines in
    /// received order.
    fn ingest_lines(&mut self, lines: Vec<String>) {
        for line in lines {
            self.classifier.record_line(&mut self.state.stats, &line);

            if let Some(log) = self.session_log.as_mut() {
                if let Err(err) = log.record(&line) {
                    warn!("session_log_error: {err}");
                }
            }

            let shown = self.classifier.should_display(
                &mut self.state.stats,
                &self.state.filters,
                self.state.debug_mode,
                &line,
            );
            if shown {
                let tag = self.classifier.tag(&line);
                let text = match (&self.annotator, self.state.decode_mode) {
                    (Some(annotator), true) => annotator.annotate(&line),
                    _ => line,
                };
                self.state.push_line(tag, text);
            }
        }
    }

    fn submit(&mut self) {
        let command = self.state.take_input();
        if command.is_empty() {
            return;
        }
        self.state.history.push(command.clone());
        if command.starts_with('/') {
            self.dispatch_local(&command);
        } else {
            self.dispatch_remote(&command);
        }
    }

    fn dispatch_local(&mut self, command: &str) {
        let mut parts = command.splitn(2, char::is_whitespace);
        let head = parts.next().unwrap_or_default().to_lowercase();
        let arg = parts.next().map(str::trim).unwrap_or_default();

        match head.as_str() {
            "/f" => {
                if !arg.is_empty() {
                    self.state.add_filter(arg);
                    self.sys(format!("Filter added: {arg}"));
                }
            }
            "/rf" => {
                // Removing an absent filter is a silent no-op.
                if !arg.is_empty() && self.state.remove_filter(arg) {
                    self.sys(format!("Filter removed: {arg}"));
                }
            }
            "/lf" => {
                if self.state.filters.is_empty() {
                    self.sys("No filters active".to_string());
                } else {
                    self.sys(format!("Filters: {}", self.state.filters.join(", ")));
                }
            }
            "/cf" => {
                self.state.clear_filters();
                self.sys("All filters cleared".to_string());
            }
            other => self.sys(format!("Unknown command: {other}")),
        }
    }

    fn dispatch_remote(&mut self, command: &str) {
        let mut wire = command.to_string();
        if !wire.ends_with("\r\n") {
            wire.push_str("\r\n");
        }
        match self.outbound.try_send(Outbound::Text(wire)) {
            Ok(()) => {
                self.state.stats.commands_sent += 1;
                self.state
                    .push_line(Tag::Sent, format!("Sent: {}", command.trim()));
            }
            Err(err) => {
                warn!("command_send_error: {err}");
                self.sys("Command not sent: connection unavailable".to_string());
            }
        }
    }

    fn toggle_decode(&mut self) {
        if self.annotator.is_none() {
            return;
        }
        self.state.decode_mode = !self.state.decode_mode;
        let mode = if self.state.decode_mode {
            "enabled"
        } else {
            "disabled"
        };
        self.sys(format!("Hex decoding {mode}"));
    }
}

/// Keystroke transition table. Returns true when the monitor should exit.
fn handle_key(key: KeyEvent, app: &mut App) -> bool {
    if key.kind != KeyEventKind::Press {
        return false;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        match key.code {
            KeyCode::Char('c') => return true,
            KeyCode::Char('l') => app.state.clear_view(),
            KeyCode::Char('p') => app.state.toggle_pause(),
            KeyCode::Char('d') => app.state.debug_mode = !app.state.debug_mode,
            KeyCode::Char('x') => app.toggle_decode(),
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Enter => app.submit(),
        KeyCode::Backspace => app.state.backspace(),
        KeyCode::F(1) => app.state.toggle_overlay(Overlay::Help),
        KeyCode::F(2) => app.state.toggle_overlay(Overlay::Stats),
        KeyCode::Up => app.state.history_up(),
        KeyCode::Down => app.state.history_down(),
        KeyCode::Tab => app.state.press_tab(),
        // Help shortcut only on an empty line; elsewhere '?' is text.
        KeyCode::Char('?') if app.state.input.is_empty() => {
            app.state.toggle_overlay(Overlay::Help)
        }
        KeyCode::Char(ch) if !ch.is_control() => app.state.push_char(ch),
        _ => {}
    }
    false
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    mut net_events: mpsc::Receiver<NetEvent>,
) -> Result<()> {
    let mut keys = EventStream::new();
    let mut repaint = tokio::time::interval(Duration::from_millis(REPAINT_INTERVAL_MS));
    let mut net_open = true;

    loop {
        terminal.draw(|frame| ui::render(frame, app))?;

        tokio::select! {
            _ = repaint.tick() => {}
            maybe = net_events.recv(), if net_open => match maybe {
                Some(NetEvent::Lines(lines)) => app.ingest_lines(lines),
                Some(NetEvent::Disconnected) => {
                    app.connected = false;
                    app.state
                        .push_line(Tag::Error, "Connection closed by server".to_string());
                }
                None => net_open = false,
            },
            maybe = keys.next() => match maybe {
                Some(Ok(Event::Key(key))) => {
                    if handle_key(key, app) {
                        break;
                    }
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => warn!("input_error: {err}"),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

fn final_stats_report(stats: &Stats) -> String {
    format!(
        "\nSession ended\n\
         Total messages: {}\n\
         Feed/MQTT chatter: {}\n\
         Commands sent: {}\n\
         Unique aircraft: {}",
        stats.total,
        stats.chatter,
        stats.commands_sent,
        stats.unique_icaos()
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let mut filters = args.filters.clone();
    if args.mqtt {
        filters.extend(MQTT_PRESET.map(String::from));
    }

    let session_log = match &args.log_file {
        Some(path) => Some(
            SessionLog::open(path, &args.host)
                .with_context(|| format!("opening session log {}", path.display()))?,
        ),
        None => None,
    };

    // Connect before touching the terminal: a handshake failure must leave
    // the shell untouched. The session summary still prints.
    let connection = match transport::connect(&args.host, args.port).await {
        Ok(connection) => connection,
        Err(err) => {
            println!("{}", final_stats_report(&Stats::default()));
            return Err(err);
        }
    };

    let (event_tx, event_rx) = mpsc::channel(NET_QUEUE_CAPACITY);
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    let reader = tokio::spawn(transport::reader_task(
        connection.read,
        connection.leftover,
        event_tx,
        out_tx.clone(),
    ));
    let writer = tokio::spawn(transport::writer_task(connection.write, out_rx));

    let mut app = App::new(
        args.host.clone(),
        out_tx.clone(),
        Some(Annotator::new()),
        session_log,
    );
    for filter in &filters {
        app.state.add_filter(filter);
    }

    if let Some(level) = &args.log_level {
        let _ = out_tx
            .send(Outbound::Text(format!("AT+LOG_LEVEL={level}\r\n")))
            .await;
        app.sys(format!("Setting log level to {level}"));
    }
    app.sys(format!("Connected to ws://{}/console", args.host));
    app.sys("Press F1 for help | Check log level: AT+LOG_LEVEL?".to_string());
    app.sys("Tip: AT+LOG_LEVEL=INFO (verbose) or =WARNINGS (normal)".to_string());

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let run_result = run_loop(&mut terminal, &mut app, event_rx).await;

    // Teardown runs exactly once on every exit path from here on; restore
    // failures must not mask the loop's own result.
    let _ = disable_raw_mode();
    let _ = execute!(terminal.backend_mut(), LeaveAlternateScreen);
    let _ = terminal.show_cursor();

    let _ = out_tx.send(Outbound::Close).await;
    let _ = tokio::time::timeout(Duration::from_millis(500), writer).await;
    reader.abort();

    println!("{}", final_stats_report(&app.state.stats));
    run_result
}
