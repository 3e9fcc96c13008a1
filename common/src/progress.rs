//! One-line transfer progress display, drawn with indicatif.
//!
//! A line looks like this, the last 13 columns hold the ETA while the transfer runs and the
//! average rate once it finished:
//!
//! ```text
//! file.iso:                 [*******                   ]   71 MB   01:49 ETA
//! file.iso:                 [**************************] 9352 MB  122.2 MB/s
//! ```

use indicatif::style::ProgressTracker;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressState, ProgressStyle};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

const DEFAULT_WIDTH: usize = 80;
const MAX_WIDTH: usize = 1024;
/// columns reserved for the ETA or the rate
const TAIL_WIDTH: usize = 13;
const MIN_FILE_WIDTH: usize = 15;
const SIZE_WIDTH: usize = 9;
const MIN_BAR_WIDTH: usize = 25;
const MAX_BAR_WIDTH: usize = 50;
const SUFFIXES: [char; 6] = [' ', 'K', 'M', 'G', 'T', 'P'];
pub const TICK: Duration = Duration::from_secs(1);

/// Width of the terminal attached to stdout, 80 when it cannot be determined.
#[must_use]
pub fn terminal_width() -> usize {
    console::Term::stdout()
        .size_checked()
        .map_or(DEFAULT_WIDTH, |(_, columns)| usize::from(columns))
}

/// Formats a byte count as `"<n> <unit>B"`, keeping `n` under 99999.
#[must_use]
pub fn human_size(mut size: u64) -> String {
    let mut suffix = 0;
    while size >= 99_999 && suffix + 1 < SUFFIXES.len() {
        size /= 1024;
        suffix += 1;
    }
    format!("{size} {}B", SUFFIXES[suffix])
}

/// Formats bytes per second as the 13-column rate tail.
#[must_use]
pub fn rate_tail(mut rate: f64) -> String {
    let mut suffix = 0;
    while rate >= 999.9 && suffix + 1 < SUFFIXES.len() {
        rate /= 1024.0;
        suffix += 1;
    }
    format!("{:>7} {}B/s ", format!("{rate:.1}"), SUFFIXES[suffix])
}

/// Formats the 13-column ETA tail; `None` before the first rate sample.
#[must_use]
pub fn eta_tail(seconds: Option<u64>) -> String {
    match seconds {
        None => "   --:-- ETA ".to_string(),
        Some(seconds) if seconds >= 24 * 3600 => "    days ETA ".to_string(),
        Some(seconds) if seconds >= 3600 => {
            format!("   {:02}:{:02} ETA ", seconds / 3600, (seconds % 3600) / 60)
        }
        Some(seconds) => format!("   {:02}:{:02} ETA ", seconds / 60, seconds % 60),
    }
}

/// Where name, bar and size go in a line of a given width.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    /// the name with its colon, padded up to the bar
    pub prefix: String,
    /// cells inside the brackets, 0 when there is no room for a bar
    pub bar: usize,
    /// whether the size column fits
    pub size: bool,
}

impl Layout {
    /// Splits `width - 13` columns between name, bar and size.
    ///
    /// Returns `None` when the terminal is too narrow for anything useful.
    #[must_use]
    pub fn new(name: &str, width: usize) -> Option<Self> {
        let width = width.min(MAX_WIDTH);
        if width < TAIL_WIDTH {
            return None;
        }
        let total = width - TAIL_WIDTH;
        if total < MIN_FILE_WIDTH {
            return None;
        }
        let name_len = name.chars().count();
        let mut size_width = SIZE_WIDTH;
        let mut bar_width = 0;
        let file_width;
        if total - MIN_FILE_WIDTH < size_width {
            file_width = total.min(name_len + 3);
            size_width = 0;
        } else if total - MIN_FILE_WIDTH - size_width < MIN_BAR_WIDTH {
            file_width = (total - size_width).min(name_len + 3);
        } else {
            file_width = (total - size_width - MIN_BAR_WIDTH).min(name_len + 3);
            bar_width = (total - file_width - size_width).min(MAX_BAR_WIDTH);
        }
        let mut prefix = String::with_capacity(total);
        if name_len > file_width - 3 {
            let skip = 3 + name_len + 3 - file_width;
            prefix.push_str("...");
            prefix.extend(name.chars().skip(skip));
        } else {
            prefix.push_str(name);
        }
        prefix.push(':');
        let space = total + 2 - size_width - file_width - bar_width;
        prefix.extend(std::iter::repeat_n(' ', space));
        Some(Self {
            prefix,
            bar: bar_width.saturating_sub(2),
            size: size_width > 0,
        })
    }

    /// Columns taken by everything but the tail.
    #[must_use]
    pub fn body_width(&self) -> usize {
        let bar = if self.bar > 0 { self.bar + 2 } else { 0 };
        let size = if self.size { SIZE_WIDTH } else { 0 };
        self.prefix.chars().count() + bar + size
    }

    fn template(&self) -> String {
        let mut template = "{prefix}".to_string();
        if self.bar > 0 {
            template.push_str(&format!("[{{bar:{}}}]", self.bar));
        }
        if self.size {
            template.push_str("{size}");
        }
        template.push_str("{tail}");
        template
    }
}

/// The name shortened for a line that only shows name and size.
fn overflow_prefix(name: &str, width: usize) -> String {
    let room = width.saturating_sub(SIZE_WIDTH + 3);
    let name_len = name.chars().count();
    let mut prefix = if name_len <= room {
        name.to_string()
    } else {
        let mut shortened = "...".to_string();
        shortened.extend(name.chars().skip(name_len - room.saturating_sub(3)));
        shortened
    };
    prefix.push_str(":  ");
    prefix
}

/// Smoothed transfer rate, in bytes per second.
#[derive(Debug, Clone, Copy, Default)]
pub struct RateEstimator {
    average: f64,
}

impl RateEstimator {
    /// Folds in a new sample, weighting it at one fifth.
    pub fn update(&mut self, bytes: u64, elapsed: Duration) -> f64 {
        let seconds = elapsed.as_secs_f64();
        let instant = if seconds > 0.0 {
            bytes as f64 / seconds
        } else {
            0.0
        };
        self.average = if self.average <= 1.0 {
            instant
        } else {
            0.8 * self.average + 0.2 * instant
        };
        if self.average <= 0.0 {
            self.average = 1.0;
        }
        self.average
    }

    #[must_use]
    pub fn average(&self) -> f64 {
        self.average
    }
}

/// Feeds the [`RateEstimator`] at most once per [`TICK`] and derives the time left from it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EtaSampler {
    estimator: RateEstimator,
    previous: Option<(Instant, u64)>,
    rate: Option<f64>,
}

impl EtaSampler {
    pub fn sample(&mut self, position: u64, now: Instant) {
        let Some((then, before)) = self.previous else {
            self.previous = Some((now, position));
            return;
        };
        let elapsed = now.saturating_duration_since(then);
        if elapsed < TICK {
            return;
        }
        self.rate = Some(
            self.estimator
                .update(position.saturating_sub(before), elapsed),
        );
        self.previous = Some((now, position));
    }

    /// Seconds until `end`, `None` before the first full sample.
    #[must_use]
    pub fn eta(&self, position: u64, end: u64) -> Option<u64> {
        self.rate
            .map(|rate| (end.saturating_sub(position) as f64 / rate) as u64)
    }
}

fn average_rate(bytes: u64, elapsed: Duration) -> f64 {
    let seconds = elapsed.as_secs_f64();
    if seconds > 0.0 {
        bytes as f64 / seconds
    } else {
        bytes as f64
    }
}

/// The `{tail}` template key: the ETA while running, the average rate once completed.
#[derive(Debug, Clone)]
struct Tail {
    start_offset: u64,
    sampler: EtaSampler,
    completed: Arc<AtomicBool>,
}

impl ProgressTracker for Tail {
    fn clone_box(&self) -> Box<dyn ProgressTracker> {
        Box::new(self.clone())
    }

    fn tick(&mut self, state: &ProgressState, now: Instant) {
        self.sampler.sample(state.pos(), now);
    }

    fn reset(&mut self, _state: &ProgressState, _now: Instant) {
        self.sampler = EtaSampler::default();
    }

    fn write(&self, state: &ProgressState, w: &mut dyn std::fmt::Write) {
        let tail = if self.completed.load(Ordering::Relaxed) {
            let transferred = state.pos().saturating_sub(self.start_offset);
            rate_tail(average_rate(transferred, state.elapsed()))
        } else {
            eta_tail(self.sampler.eta(state.pos(), state.len().unwrap_or(0)))
        };
        let _ = w.write_str(&tail);
    }
}

fn write_size(state: &ProgressState, w: &mut dyn std::fmt::Write) {
    let _ = write!(w, "{:>width$}", human_size(state.pos()), width = SIZE_WIDTH);
}

/// The progress bar of the one transfer currently running.
///
/// Positions count from the start of the file, so a resumed transfer starts part way.
#[derive(Debug)]
pub struct ProgressPrinter {
    bar: ProgressBar,
    name: String,
    width: usize,
    start_offset: u64,
    end_offset: u64,
    overflowed: bool,
    completed: Arc<AtomicBool>,
}

impl ProgressPrinter {
    /// Starts a bar on stdout, redrawn once per [`TICK`]; hidden when stdout is not a terminal.
    #[must_use]
    pub fn start(name: &str, start_offset: u64, end_offset: u64) -> Option<Self> {
        let printer = Self::with_target(
            name,
            start_offset,
            end_offset,
            ProgressDrawTarget::stdout_with_hz(1),
            terminal_width(),
        )?;
        printer.bar.enable_steady_tick(TICK);
        Some(printer)
    }

    /// Starts a bar drawn to `target`, `width` columns wide, without a steady tick.
    #[must_use]
    pub fn with_target(
        name: &str,
        start_offset: u64,
        end_offset: u64,
        target: ProgressDrawTarget,
        width: usize,
    ) -> Option<Self> {
        let layout = Layout::new(name, width)?;
        let completed = Arc::new(AtomicBool::new(false));
        let tail = Tail {
            start_offset,
            sampler: EtaSampler::default(),
            completed: completed.clone(),
        };
        let style = match ProgressStyle::with_template(&layout.template()) {
            Ok(style) => style
                .progress_chars("* ")
                .with_key("size", write_size)
                .with_key("tail", tail),
            Err(error) => {
                tracing::debug!("progress template rejected: {error}");
                return None;
            }
        };
        let bar = ProgressBar::with_draw_target(Some(end_offset), target)
            .with_style(style)
            .with_prefix(layout.prefix)
            .with_position(start_offset);
        Some(Self {
            bar,
            name: name.to_string(),
            width,
            start_offset,
            end_offset,
            overflowed: false,
            completed,
        })
    }

    /// Records `transferred` bytes written since the start offset.
    pub fn update(&mut self, transferred: u64) {
        let position = self.start_offset + transferred;
        if position > self.end_offset && !self.overflowed {
            // more data than the file announced: only name and size are meaningful
            self.overflowed = true;
            match ProgressStyle::with_template("{prefix}{size}") {
                Ok(style) => {
                    self.bar.set_style(style.with_key("size", write_size));
                    self.bar
                        .set_prefix(overflow_prefix(&self.name, self.width));
                }
                Err(error) => tracing::debug!("progress template rejected: {error}"),
            }
        }
        self.bar.set_position(position);
    }

    /// Forces a redraw, as the steady tick does.
    pub fn tick(&self) {
        self.bar.tick();
    }

    /// Leaves the final line on screen: with the average rate when the transfer completed, as
    /// last drawn otherwise.
    pub fn finish(self, completed: bool) {
        if completed {
            self.completed.store(true, Ordering::Relaxed);
            self.bar.finish();
        } else {
            self.bar.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::RecordingTerm;

    #[test]
    fn sizes_stay_short() {
        assert_eq!(human_size(0), "0  B");
        assert_eq!(human_size(99_998), "99998  B");
        assert_eq!(human_size(99_999), "97 KB");
        assert_eq!(human_size(10 * 1024 * 1024 * 1024), "10240 MB");
    }

    #[test]
    fn eta_formats() {
        assert_eq!(eta_tail(None), "   --:-- ETA ");
        assert_eq!(eta_tail(Some(109)), "   01:49 ETA ");
        assert_eq!(eta_tail(Some(3 * 3600 + 25 * 60)), "   03:25 ETA ");
        assert_eq!(eta_tail(Some(2 * 24 * 3600)), "    days ETA ");
        for seconds in [None, Some(0), Some(59), Some(7200), Some(100_000)] {
            assert_eq!(eta_tail(seconds).len(), TAIL_WIDTH);
        }
    }

    #[test]
    fn rate_formats() {
        assert_eq!(rate_tail(512.0), "  512.0  B/s ");
        assert_eq!(rate_tail(125_132.8), "  122.2 KB/s ");
        assert_eq!(rate_tail(125_132.8).len(), TAIL_WIDTH);
    }

    #[test]
    fn layout_fills_the_line() {
        let layout = Layout::new("file.iso", 80).unwrap();
        assert!(layout.prefix.starts_with("file.iso:"));
        assert!(layout.bar > 0);
        assert!(layout.size);
        assert_eq!(layout.body_width(), 80 - TAIL_WIDTH);
        assert_eq!(layout.template(), format!("{{prefix}}[{{bar:{}}}]{{size}}{{tail}}", layout.bar));
    }

    #[test]
    fn narrow_terminals_drop_pieces() {
        assert_eq!(Layout::new("f", 12), None);
        assert_eq!(Layout::new("f", 20), None);
        // no room for a bar
        let layout = Layout::new("file", 40).unwrap();
        assert_eq!(layout.bar, 0);
        assert!(layout.size);
        assert_eq!(layout.body_width(), 40 - TAIL_WIDTH);
        // no room for the size either
        let layout = Layout::new("file", 30).unwrap();
        assert!(!layout.size);
        assert_eq!(layout.prefix.trim_end(), "file:");
        assert_eq!(layout.body_width(), 30 - TAIL_WIDTH);
        assert_eq!(layout.template(), "{prefix}{tail}");
    }

    #[test]
    fn long_names_get_an_ellipsis() {
        let name = "a-very-long-file-name-that-does-not-fit-anywhere-near-the-line.tar.gz";
        let layout = Layout::new(name, 80).unwrap();
        assert!(layout.prefix.starts_with("..."));
        assert!(layout.prefix.contains("tar.gz:"));
        assert_eq!(layout.body_width(), 80 - TAIL_WIDTH);
        assert_eq!(overflow_prefix("short", 80), "short:  ");
        assert!(overflow_prefix(name, 40).starts_with("..."));
    }

    #[test]
    fn estimator_smooths_rates() {
        let mut estimator = RateEstimator::default();
        assert_eq!(estimator.update(1000, Duration::from_secs(1)), 1000.0);
        let smoothed = estimator.update(2000, Duration::from_secs(1));
        assert!((smoothed - 1200.0).abs() < 1e-6, "{smoothed}");
        let mut stalled = RateEstimator::default();
        assert_eq!(stalled.update(0, Duration::from_secs(1)), 1.0);
    }

    #[test]
    fn eta_appears_after_first_full_tick() {
        let mut sampler = EtaSampler::default();
        let start = Instant::now();
        sampler.sample(0, start);
        assert_eq!(sampler.eta(0, 10_000), None);
        // too early for a sample
        sampler.sample(500, start + Duration::from_millis(400));
        assert_eq!(sampler.eta(500, 10_000), None);
        sampler.sample(1000, start + Duration::from_secs(1));
        // 9000 bytes left at 1000 B/s
        assert_eq!(sampler.eta(1000, 10_000), Some(9));
    }

    fn printer(term: &RecordingTerm, name: &str, start: u64, end: u64) -> ProgressPrinter {
        let target = ProgressDrawTarget::term_like(Box::new(term.clone()));
        ProgressPrinter::with_target(name, start, end, target, usize::from(term.width)).unwrap()
    }

    #[test]
    fn redraws_until_completed_then_shows_rate() {
        let term = RecordingTerm::new(80);
        let mut printer = printer(&term, "data.bin", 0, 100_000);
        for step in 1..=3 {
            printer.update(step * 10_000);
            printer.tick();
            std::thread::sleep(Duration::from_millis(60));
        }
        let frames = term.frames();
        let running: Vec<&String> = frames
            .iter()
            .filter(|frame| frame.starts_with("data.bin:") && frame.contains("--:-- ETA"))
            .collect();
        assert!(running.len() >= 2, "{frames:?}");
        assert!(running.iter().any(|frame| frame.contains('*')), "{frames:?}");
        printer.update(100_000);
        printer.finish(true);
        let frames = term.frames();
        let last = frames.last().unwrap();
        assert!(last.starts_with("data.bin:"), "{last}");
        assert!(last.contains("B/s"), "{last}");
        assert!(!last.contains("ETA"), "{last}");
        assert!(last.contains(&human_size(100_000)), "{last}");
    }

    #[test]
    fn failed_transfer_keeps_eta() {
        let term = RecordingTerm::new(80);
        let mut printer = printer(&term, "data.bin", 4_000, 100_000);
        printer.update(1_000);
        printer.tick();
        printer.finish(false);
        let frames = term.frames();
        let last = frames.last().unwrap();
        assert!(last.contains("ETA"), "{frames:?}");
        assert!(last.contains(&human_size(5_000)), "{last}");
    }

    #[test]
    fn overflow_shows_name_and_size_only() {
        let term = RecordingTerm::new(80);
        let mut printer = printer(&term, "/dev/zero", 0, 0);
        printer.update(5000);
        printer.finish(true);
        let frames = term.frames();
        assert_eq!(frames.last().map(String::as_str), Some("/dev/zero:    5000  B"));
    }
}
