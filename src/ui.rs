use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiMode {
    Auto,
    Plain,
    Pretty,
}

/// Stage reporting on stderr: spinners on a terminal, `==>` lines otherwise.
#[derive(Clone, Debug)]
pub struct Ui {
    mode: UiMode,
    is_tty: bool,
    disable_pretty: bool,
}

impl Ui {
    pub fn new(mode: UiMode, is_tty: bool, disable_pretty: bool) -> Self {
        Self {
            mode,
            is_tty,
            disable_pretty,
        }
    }

    pub fn from_args(ui_flag: Option<&str>, is_tty: bool, disable_pretty: bool) -> Self {
        let mode = match ui_flag {
            Some("plain") => UiMode::Plain,
            Some("pretty") => UiMode::Pretty,
            _ => UiMode::Auto,
        };
        Self::new(mode, is_tty, disable_pretty)
    }

    fn use_pretty(&self) -> bool {
        self.is_tty
            && match self.mode {
                UiMode::Pretty => true,
                UiMode::Auto => !self.disable_pretty,
                UiMode::Plain => false,
            }
    }

    pub fn stage(&self, name: &str) -> StageGuard {
        if self.use_pretty() {
            let spinner = spinner_with_template("{spinner} {msg}");
            spinner.set_message(format!("{name}…"));
            StageGuard::new(name.to_string(), Some(spinner), None)
        } else {
            eprintln!("==> {}", name);
            StageGuard::new(name.to_string(), None, None)
        }
    }

    /// A stage that counts composited frames; `total` is shown when known.
    pub fn frames_stage(&self, name: &str, total: Option<u64>) -> StageGuard {
        if !self.use_pretty() {
            eprintln!("==> {}", name);
            return StageGuard::new(name.to_string(), None, total);
        }
        let bar = match total {
            Some(total) => {
                let bar = ProgressBar::new(total);
                bar.set_draw_target(ProgressDrawTarget::stderr());
                let style = ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len} frames")
                    .unwrap_or_else(|_| ProgressStyle::default_bar());
                bar.set_style(style);
                bar
            }
            None => spinner_with_template("{spinner} {msg} {pos} frames"),
        };
        bar.set_message(name.to_string());
        StageGuard::new(name.to_string(), Some(bar), total)
    }
}

fn spinner_with_template(template: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_draw_target(ProgressDrawTarget::stderr());
    spinner.enable_steady_tick(Duration::from_millis(120));
    let style =
        ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner());
    spinner.set_style(style);
    spinner
}

pub struct StageGuard {
    name: String,
    start: Instant,
    bar: Option<ProgressBar>,
    total: Option<u64>,
}

impl StageGuard {
    fn new(name: String, bar: Option<ProgressBar>, total: Option<u64>) -> Self {
        Self {
            name,
            start: Instant::now(),
            bar,
            total,
        }
    }

    /// Record that frame `index` has been written.
    pub fn frame_done(&self, index: usize) {
        match &self.bar {
            Some(bar) => bar.set_position(index as u64 + 1),
            None => {
                let done = index as u64 + 1;
                // Plain mode prints roughly every tenth of the run.
                let every = self.total.map_or(10, |total| (total / 10).max(1));
                if done % every == 0 {
                    eprintln!("    {} frames", done);
                }
            }
        }
    }
}

impl Drop for StageGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let message = format!("✔ {} ({})", self.name, format_duration(elapsed));
        if let Some(bar) = &self.bar {
            bar.finish_with_message(message);
        } else {
            eprintln!("{message}");
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
