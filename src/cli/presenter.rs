//! CLI presenter for output formatting

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};

use crate::application::SessionView;
use crate::domain::session::SessionState;

use super::session_host::{Reply, ReplyKind};

/// Number of bars in the level meter
pub const METER_WIDTH: u32 = 10;

const FULL_SCALE: u32 = 32768;

/// Presenter for CLI output formatting
pub struct Presenter {
    spinner: Option<ProgressBar>,
    is_spinner_active: Arc<AtomicBool>,
    meter: LevelMeter,
}

impl Presenter {
    /// Create a new presenter
    pub fn new() -> Self {
        Self {
            spinner: None,
            is_spinner_active: Arc::new(AtomicBool::new(false)),
            meter: LevelMeter::default(),
        }
    }

    /// Start a spinner with message
    pub fn start_spinner(&mut self, message: &str) {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::default_spinner()
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
            .template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        self.spinner = Some(spinner);
        self.is_spinner_active.store(true, Ordering::SeqCst);
    }

    /// Update spinner message
    pub fn update_spinner(&self, message: &str) {
        if let Some(ref spinner) = self.spinner {
            spinner.set_message(message.to_string());
        }
    }

    /// Stop spinner without status
    pub fn stop_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
        self.is_spinner_active.store(false, Ordering::SeqCst);
    }

    pub fn is_spinner_active(&self) -> bool {
        self.is_spinner_active.load(Ordering::SeqCst)
    }

    /// Show the live session line while recording or playing, hide it otherwise.
    pub fn show_session(&mut self, view: &SessionView) {
        let active = matches!(view.state, SessionState::Recording | SessionState::Playing);
        if !active {
            self.meter.reset();
            self.stop_spinner();
            return;
        }

        let level = self.meter.update(view.peak_amplitude);
        let line = format_session_line(view, level);
        if self.is_spinner_active() {
            self.update_spinner(&line);
        } else {
            self.start_spinner(&line);
        }
    }

    /// Print a session reply with the marker matching its kind. Everything
    /// goes to stderr; stdout is kept for results.
    pub fn reply(&self, reply: &Reply) {
        let message = reply.message.as_str();
        match reply.kind {
            ReplyKind::Info => self.info(message),
            ReplyKind::Success => self.success(message),
            ReplyKind::Warning => self.warn(message),
            ReplyKind::Error => self.error(message),
        }
    }

    /// Print info message to stderr
    pub fn info(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "ℹ".cyan(), message));
    }

    /// Print success message to stderr
    pub fn success(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "✓".green(), message));
    }

    /// Print warning message to stderr
    pub fn warn(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "⚠".yellow(), message));
    }

    /// Print error message to stderr
    pub fn error(&self, message: &str) {
        self.suspend(|| eprintln!("{} {}", "✗".red(), message));
    }

    /// Output text to stdout
    pub fn output(&self, text: &str) {
        self.suspend(|| println!("{}", text));
    }

    /// Print daemon status
    pub fn daemon_status(&self, state: &str) {
        eprintln!("{} Daemon: {}", "●".cyan(), state);
    }

    /// Print a key-value pair (for config list)
    pub fn key_value(&self, key: &str, value: &str) {
        println!("{}: {}", key.cyan(), value);
    }

    fn suspend(&self, print: impl FnOnce()) {
        match self.spinner {
            Some(ref spinner) => spinner.suspend(print),
            None => print(),
        }
    }
}

impl Default for Presenter {
    fn default() -> Self {
        Self::new()
    }
}

/// Peak level meter that falls back one bar per refresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct LevelMeter {
    level: u32,
}

impl LevelMeter {
    /// Feed the peak amplitude since the last refresh, get the bars to draw.
    pub fn update(&mut self, peak_amplitude: u32) -> u32 {
        let measured = (11 * peak_amplitude / FULL_SCALE).min(METER_WIDTH);
        self.level = measured.max(self.level.saturating_sub(1));
        self.level
    }

    pub fn reset(&mut self) {
        self.level = 0;
    }
}

/// `mm:ss`, or `h:mm:ss` from one hour on
pub fn format_clock(secs: u64) -> String {
    let (hours, minutes, seconds) = (secs / 3600, secs / 60 % 60, secs % 60);
    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

fn format_meter(level: u32) -> String {
    let level = level.min(METER_WIDTH) as usize;
    format!(
        "{}{}",
        "▮".repeat(level).green(),
        "▯".repeat(METER_WIDTH as usize - level)
    )
}

/// Single status line for a recording or playing session
pub fn format_session_line(view: &SessionView, level: u32) -> String {
    match view.state {
        SessionState::Recording => {
            let mut line = format!(
                "{} {} {} [{}]",
                "●".red(),
                view.name,
                format_clock(view.elapsed_secs),
                format_meter(level)
            );
            if let Some(remaining) = view.remaining_secs {
                let left = format!("{} left", format_clock(remaining));
                if view.low_storage {
                    line.push_str(&format!("  {}", left.yellow()));
                } else {
                    line.push_str(&format!("  {}", left));
                }
            } else if view.low_storage {
                line.push_str(&format!("  {}", "storage low".yellow()));
            }
            line
        }
        SessionState::Playing | SessionState::PlayingPaused => format!(
            "{} {} {} / {}",
            "▶".cyan(),
            view.name,
            format_clock(view.elapsed_secs),
            format_clock(view.sample_length_secs)
        ),
        SessionState::Idle => format!("{} {}", view.name, view.state),
    }
}

/// Multi-line description used for `status`
pub fn format_status(view: &SessionView) -> String {
    let mut lines = vec![
        format!("state: {}", view.state),
        format!("name: {}", view.name),
    ];
    if let Some(ref file) = view.target_file {
        lines.push(format!("file: {}", file.display()));
    }
    match view.state {
        SessionState::Recording => {
            lines.push(format!("elapsed: {}", format_clock(view.elapsed_secs)));
            if let Some(remaining) = view.remaining_secs {
                lines.push(format!("remaining: {}", format_clock(remaining)));
            }
            if view.low_storage {
                lines.push("storage: low".to_string());
            }
        }
        SessionState::Playing | SessionState::PlayingPaused => {
            lines.push(format!(
                "position: {} / {}",
                format_clock(view.elapsed_secs),
                format_clock(view.sample_length_secs)
            ));
        }
        SessionState::Idle if view.target_file.is_some() => {
            lines.push(format!("length: {}", format_clock(view.sample_length_secs)));
        }
        SessionState::Idle => {}
    }
    if let Some(ref path) = view.awaiting_confirmation {
        lines.push(format!("pending: overwrite {}? (yes/no)", path.display()));
    }
    lines.join("\n")
}
