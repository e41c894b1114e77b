use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::ProgressBar;

use restage_core::{UpdatePhase, UPDATE_STEP_COUNT};
use restage_updater::StatusReporter;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputStyle {
    Plain,
    Rich,
}

pub fn current_output_style() -> OutputStyle {
    style_from(
        std::env::var("RESTAGE_OUTPUT").ok().as_deref(),
        std::io::stdout().is_terminal(),
    )
}

pub fn style_from(env_override: Option<&str>, is_tty: bool) -> OutputStyle {
    match env_override {
        Some("plain") => OutputStyle::Plain,
        Some("rich") => OutputStyle::Rich,
        _ if is_tty => OutputStyle::Rich,
        _ => OutputStyle::Plain,
    }
}

pub fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => format!("[{status}] {message}"),
        OutputStyle::Rich => format!("{} {message}", colorize(status_style(status), status)),
    }
}

pub fn format_phase_line(phase: UpdatePhase, detail: &str) -> String {
    match phase.step() {
        Some(step) => format!("[{step}/{UPDATE_STEP_COUNT}] {}: {detail}", phase.label()),
        None => format!("{}: {detail}", phase.label()),
    }
}

/// Terminal implementation of the engine's status surface. In rich mode one
/// spinner line is edited in place as the sequence moves through the
/// numbered steps, matching the message-edit behavior a bot embedding would
/// show its operator.
pub struct TerminalReporter {
    style: OutputStyle,
    spinner: Option<ProgressBar>,
}

impl TerminalReporter {
    pub fn new(style: OutputStyle) -> Self {
        Self {
            style,
            spinner: None,
        }
    }

    fn spinner(&mut self) -> &ProgressBar {
        self.spinner.get_or_insert_with(|| {
            let spinner = ProgressBar::new_spinner();
            spinner.enable_steady_tick(Duration::from_millis(80));
            spinner
        })
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}

impl StatusReporter for TerminalReporter {
    fn phase(&mut self, phase: UpdatePhase, detail: &str) {
        let line = format_phase_line(phase, detail);
        match self.style {
            OutputStyle::Plain => println!("{line}"),
            OutputStyle::Rich => match phase {
                UpdatePhase::Failed => {
                    self.clear_spinner();
                    println!("{}", render_status_line(self.style, "fail", &line));
                }
                UpdatePhase::Terminating => {
                    self.clear_spinner();
                    println!("{}", render_status_line(self.style, "step", &line));
                }
                _ => self.spinner().set_message(line),
            },
        }
    }

    fn note(&mut self, message: &str) {
        match (&self.spinner, self.style) {
            (Some(spinner), OutputStyle::Rich) => spinner.println(message),
            _ => println!("{message}"),
        }
    }
}

fn status_style(status: &str) -> Style {
    let color = match status {
        "step" => AnsiColor::BrightCyan,
        "done" => AnsiColor::BrightGreen,
        "fail" => AnsiColor::BrightRed,
        _ => AnsiColor::BrightBlue,
    };
    Style::new().fg_color(Some(color.into())).effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}
