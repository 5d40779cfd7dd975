use indicatif::{MultiProgress, ProgressDrawTarget, ProgressStyle};
use std::io;
use std::sync::OnceLock;
use std::time::Duration;
use tracing_subscriber::fmt::MakeWriter;

/// Resolution of every bar; fractions are scaled to this length.
pub const BAR_TICKS: u64 = 1000;

/// The process-wide bar container. Log output is routed through it so log
/// lines are printed above the bars instead of through them.
pub fn global_multi_progress() -> MultiProgress {
    static GLOBAL_MP: OnceLock<MultiProgress> = OnceLock::new();
    GLOBAL_MP
        .get_or_init(|| {
            let mp = MultiProgress::new();
            mp.set_draw_target(ProgressDrawTarget::stderr_with_hz(20));
            mp
        })
        .clone()
}

pub fn shard_bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix:>10.cyan.bold} [{bar:40.cyan/blue}] {percent:>3}% {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-")
}

pub fn overall_bar_style() -> ProgressStyle {
    ProgressStyle::with_template(
        "{spinner:.green} [{elapsed_precise}] [{bar:40.green/white}] {percent:>3}% {msg}",
    )
    .unwrap_or_else(|_| ProgressStyle::default_bar())
    .progress_chars("#>-")
}

pub fn fraction_to_ticks(fraction: f64) -> u64 {
    (fraction.clamp(0.0, 1.0) * BAR_TICKS as f64).round() as u64
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else if secs > 0 {
        format!("{}s", secs)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Log writer that suspends the bars while a line is written to stderr.
#[derive(Clone)]
pub struct IndicatifWriter {
    progress_bars: MultiProgress,
}

impl IndicatifWriter {
    pub fn new(pb: MultiProgress) -> Self {
        Self { progress_bars: pb }
    }
}

impl io::Write for IndicatifWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress_bars.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.progress_bars.suspend(|| io::stderr().flush())
    }
}

impl<'a> MakeWriter<'a> for IndicatifWriter {
    type Writer = IndicatifWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
