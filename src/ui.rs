//! Terminal progress for the command-line tools.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool) -> Self {
        Self { mode, is_tty }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty)
    }

    fn pretty(&self) -> bool {
        self.is_tty && self.mode != UiMode::Plain
    }

    /// Spinner (or a plain `==>` line) until the guard drops.
    pub fn stage(&self, name: &str) -> StageGuard {
        if !self.pretty() {
            eprintln!("==> {name}");
            return StageGuard::new(name.to_string(), None);
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_draw_target(ProgressDrawTarget::stderr());
        spinner.enable_steady_tick(Duration::from_millis(120));
        let style = ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        spinner.set_style(style);
        spinner.set_message(format!("{name}…"));
        StageGuard::new(name.to_string(), Some(spinner))
    }

    /// Frame counter for a decoding stage. With a known total it renders as
    /// a bar, otherwise as a counting spinner.
    pub fn frames(&self, name: &str, total: Option<u64>) -> FrameProgress {
        if !self.pretty() {
            eprintln!("==> {name}");
            return FrameProgress {
                stage: StageGuard::new(name.to_string(), None),
            };
        }
        let (bar, template) = match total {
            Some(total) => (
                ProgressBar::new(total),
                "{msg} [{bar:30}] {pos}/{len} frames ({eta})",
            ),
            None => (ProgressBar::new_spinner(), "{spinner} {msg} {pos} frames"),
        };
        bar.set_draw_target(ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        bar.set_style(style.progress_chars("=> "));
        bar.set_message(name.to_string());
        FrameProgress {
            stage: StageGuard::new(name.to_string(), Some(bar)),
        }
    }
}

pub struct StageGuard {
    name: String,
    start: Instant,
    bar: Option<ProgressBar>,
}

impl StageGuard {
    fn new(name: String, bar: Option<ProgressBar>) -> Self {
        Self {
            name,
            start: Instant::now(),
            bar,
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let message = format!("✔ {} ({})", self.name, format_duration(self.start.elapsed()));
        match &self.bar {
            Some(bar) => bar.finish_with_message(message),
            None => eprintln!("{message}"),
        }
    }
}

pub struct FrameProgress {
    stage: StageGuard,
}

impl FrameProgress {
    pub fn set(&self, decoded: u64) {
        if let Some(bar) = &self.stage.bar {
            bar.set_position(decoded);
        }
    }
}

fn format_duration(duration: Duration) -> String {
    if duration.as_secs() >= 1 {
        format!("{:.2}s", duration.as_secs_f64())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_mode_never_draws() {
        let ui = Ui::from_args(Some("plain"), true);
        assert!(!ui.pretty());
        let progress = ui.frames("analyze video", Some(10));
        progress.set(3);
        assert!(progress.stage.bar.is_none());
    }

    #[test]
    fn non_tty_falls_back_to_plain() {
        assert!(!Ui::from_args(Some("pretty"), false).pretty());
        assert!(Ui::from_args(None, true).pretty());
    }

    #[test]
    fn durations_switch_units_at_one_second() {
        assert_eq!(format_duration(Duration::from_millis(250)), "250ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
    }
}
