//! Progress reporting for the partition driver.
//!
//! Reporters observe the run and never influence it; write failures of the console bar
//! are ignored.

use std::{
    fmt,
    io::{Stderr, Write},
    sync::Mutex,
};

const BAR_WIDTH: usize = 50;

/// A step of the split run that reports progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Computing the shard of every document.
    Hashing,
    /// Selecting and writing the documents of one shard.
    Shard { shard: u32, num_shards: u32 },
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Hashing => write!(f, "Generating shard hashes"),
            Phase::Shard { shard, num_shards } => write!(
                f,
                "Generating documents for shard {shard} ({} of {num_shards})",
                shard + 1
            ),
        }
    }
}

pub trait ProgressReporter: Send + Sync {
    fn start(&self, _phase: Phase) {}

    /// Reports `percent` (0..=100) completion of `phase`.
    fn update(&self, phase: Phase, percent: u8);

    fn finish(&self, _phase: Phase) {}
}

/// Discards all progress events.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressReporter for NoProgress {
    fn update(&self, _phase: Phase, _percent: u8) {}
}

/// Renders a single-line text bar, redrawn in place with `\r`.
pub struct ConsoleProgressBar<W = Stderr> {
    state: Mutex<BarState<W>>,
}

struct BarState<W> {
    out: W,
    last: Option<u8>,
}

impl ConsoleProgressBar<Stderr> {
    pub fn stderr() -> Self {
        Self::with_writer(std::io::stderr())
    }
}

impl<W: Write + Send> ConsoleProgressBar<W> {
    pub fn with_writer(out: W) -> Self {
        ConsoleProgressBar {
            state: Mutex::new(BarState { out, last: None }),
        }
    }

    pub fn into_inner(self) -> W {
        match self.state.into_inner() {
            Ok(state) => state.out,
            Err(poisoned) => poisoned.into_inner().out,
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut BarState<W>) -> std::io::Result<()>) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = f(&mut *state).and_then(|_| state.out.flush());
    }
}

impl<W: Write + Send> ProgressReporter for ConsoleProgressBar<W> {
    fn start(&self, phase: Phase) {
        self.with_state(|state| {
            state.last = None;
            writeln!(state.out, "{phase}...")
        });
    }

    fn update(&self, _phase: Phase, percent: u8) {
        let percent = percent.min(100);
        self.with_state(|state| {
            if state.last == Some(percent) {
                return Ok(());
            }
            state.last = Some(percent);
            write!(state.out, "\r{}", render_bar(percent))
        });
    }

    fn finish(&self, phase: Phase) {
        self.update(phase, 100);
        self.with_state(|state| {
            state.last = None;
            writeln!(state.out)
        });
    }
}

/// `[=====>      ]   NN%`, with one bar cell per two percent.
pub fn render_bar(percent: u8) -> String {
    let filled = (percent.min(100) / 2) as usize;
    let mut bar = String::with_capacity(BAR_WIDTH + 16);
    bar.push('[');
    for i in 0..BAR_WIDTH {
        bar.push(match i.cmp(&filled) {
            std::cmp::Ordering::Less => '=',
            std::cmp::Ordering::Equal => '>',
            std::cmp::Ordering::Greater => ' ',
        });
    }
    bar.push_str(&format!("]   {percent}%     "));
    bar
}

/// Converts a running count into whole-percent steps, reporting each step once.
#[derive(Debug)]
pub struct PercentTracker {
    total: u64,
    done: u64,
    last: Option<u8>,
}

impl PercentTracker {
    pub fn new(total: u64) -> PercentTracker {
        PercentTracker {
            total,
            done: 0,
            last: Some(0),
        }
    }

    /// Counts one unit of work; returns the new percentage if it changed.
    pub fn advance(&mut self) -> Option<u8> {
        self.done = (self.done + 1).min(self.total);
        let percent = self.percent();
        if self.last == Some(percent) {
            return None;
        }
        self.last = Some(percent);
        Some(percent)
    }

    pub fn percent(&self) -> u8 {
        if self.total == 0 {
            return 100;
        }
        (self.done * 100 / self.total) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::{ConsoleProgressBar, Phase, PercentTracker, ProgressReporter, render_bar};

    #[test]
    fn test_render_bar() {
        let empty = render_bar(0);
        assert!(empty.starts_with("[>"));
        assert_eq!(empty.matches('=').count(), 0);

        let half = render_bar(50);
        assert_eq!(half.matches('=').count(), 25);
        assert!(half.contains("]   50%"));

        let full = render_bar(100);
        assert_eq!(full.matches('=').count(), 50);
        assert!(!full.contains('>'));
        assert!(full.contains("]   100%"));
    }

    #[test]
    fn test_tracker_reports_each_step_once() {
        let mut tracker = PercentTracker::new(400);
        let steps = (0..400).filter_map(|_| tracker.advance()).collect::<Vec<_>>();
        assert_eq!(steps, (1..=100).collect::<Vec<u8>>());
        assert_eq!(tracker.advance(), None);
        assert_eq!(tracker.percent(), 100);
    }

    #[test]
    fn test_tracker_small_totals() {
        let mut tracker = PercentTracker::new(3);
        assert_eq!(tracker.advance(), Some(33));
        assert_eq!(tracker.advance(), Some(66));
        assert_eq!(tracker.advance(), Some(100));
        assert_eq!(PercentTracker::new(0).percent(), 100);
    }

    #[test]
    fn test_console_bar_skips_repeated_percent() {
        let bar = ConsoleProgressBar::with_writer(Vec::new());
        bar.start(Phase::Hashing);
        bar.update(Phase::Hashing, 10);
        bar.update(Phase::Hashing, 10);
        bar.update(Phase::Hashing, 20);
        bar.finish(Phase::Hashing);
        let text = String::from_utf8(bar.into_inner()).unwrap();
        assert!(text.starts_with("Generating shard hashes...\n"));
        assert_eq!(text.matches("10%").count(), 1);
        assert_eq!(text.matches("20%").count(), 1);
        assert_eq!(text.matches("100%").count(), 1);
        assert!(text.ends_with('\n'));
    }

    #[test]
    fn test_phase_display() {
        let phase = Phase::Shard {
            shard: 0,
            num_shards: 3,
        };
        assert_eq!(
            phase.to_string(),
            "Generating documents for shard 0 (1 of 3)"
        );
    }
}
