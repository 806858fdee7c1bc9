//! GC statistics and timing.
//!
//! A pure sink: collection episodes report elapsed-time and size samples
//! under named timers, and nothing in the collector reads them back.

use rustc_hash::FxHashMap;
use std::fmt;
use std::time::{Duration, Instant};

/// Named timers that collection episodes report under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerKey {
    /// Nursery evacuation episodes (minor collections).
    Gen0,
    /// Semispace scavenges.
    Gen1,
    /// Semispace epoch finalisation.
    Close,
}

impl TimerKey {
    pub const ALL: [TimerKey; 3] = [TimerKey::Gen0, TimerKey::Gen1, TimerKey::Close];

    pub fn name(self) -> &'static str {
        match self {
            TimerKey::Gen0 => "gen0",
            TimerKey::Gen1 => "gen1",
            TimerKey::Close => "close",
        }
    }
}

impl fmt::Display for TimerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Samples recorded under one timer.
#[derive(Debug, Default, Clone)]
pub struct TimerRecord {
    started: Option<Instant>,
    /// Elapsed time of each finished episode.
    pub elapsed: Vec<Duration>,
    /// Occupancy samples in words.
    pub sizes: Vec<usize>,
}

impl TimerRecord {
    /// Total recorded time.
    pub fn total(&self) -> Duration {
        self.elapsed.iter().sum()
    }

    /// Mean episode time, zero when nothing was recorded.
    pub fn average(&self) -> Duration {
        match self.elapsed.len() {
            0 => Duration::ZERO,
            n => self.total() / n as u32,
        }
    }

    /// Whether a `timer_begin` is waiting for its `timer_end`.
    pub fn is_running(&self) -> bool {
        self.started.is_some()
    }
}

/// Statistics about garbage collection activity.
#[derive(Debug, Default)]
pub struct GcStats {
    timers: FxHashMap<TimerKey, TimerRecord>,

    // =========================================================================
    // Allocation Statistics
    // =========================================================================
    /// Total words allocated since start.
    pub words_allocated: u64,
    /// Total objects allocated since start.
    pub objects_allocated: u64,

    // =========================================================================
    // Promotion Statistics
    // =========================================================================
    /// Total words promoted from nursery to semispace.
    pub words_promoted: u64,
    /// Total objects promoted from nursery to semispace.
    pub objects_promoted: u64,
}

impl GcStats {
    /// Create new empty statistics.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing an episode under `key`. Restarts a running timer.
    pub fn timer_begin(&mut self, key: TimerKey) {
        self.timers.entry(key).or_default().started = Some(Instant::now());
    }

    /// Finish the episode started by [`timer_begin`](Self::timer_begin).
    ///
    /// Returns the elapsed time, or `None` (recording nothing) when the
    /// timer was not running.
    pub fn timer_end(&mut self, key: TimerKey) -> Option<Duration> {
        let record = self.timers.entry(key).or_default();
        let started = record.started.take()?;
        let elapsed = started.elapsed();
        record.elapsed.push(elapsed);
        Some(elapsed)
    }

    /// Record an elapsed time measured elsewhere (see [`GcTimer`]).
    pub fn record_elapsed(&mut self, key: TimerKey, elapsed: Duration) {
        self.timers.entry(key).or_default().elapsed.push(elapsed);
    }

    /// Record an occupancy sample in words.
    pub fn record_size(&mut self, key: TimerKey, words: usize) {
        self.timers.entry(key).or_default().sizes.push(words);
    }

    /// Record an allocation.
    #[inline]
    pub fn record_allocation(&mut self, words: usize) {
        self.words_allocated += words as u64;
        self.objects_allocated += 1;
    }

    /// Record the promotions of one nursery episode.
    #[inline]
    pub fn record_promotion(&mut self, objects: usize, words: usize) {
        self.words_promoted += words as u64;
        self.objects_promoted += objects as u64;
    }

    /// Samples recorded under `key`, if any.
    pub fn timer(&self, key: TimerKey) -> Option<&TimerRecord> {
        self.timers.get(&key)
    }

    /// Number of finished episodes under `key`.
    pub fn episodes(&self, key: TimerKey) -> usize {
        self.timer(key).map_or(0, |r| r.elapsed.len())
    }

    /// Most recent size sample under `key`.
    pub fn last_size(&self, key: TimerKey) -> Option<usize> {
        self.timer(key).and_then(|r| r.sizes.last().copied())
    }

    /// Get total GC time across all timers.
    pub fn total_gc_time(&self) -> Duration {
        self.timers.values().map(TimerRecord::total).sum()
    }

    /// Get average pause time under `key`.
    pub fn avg_pause(&self, key: TimerKey) -> Duration {
        self.timer(key).map_or(Duration::ZERO, TimerRecord::average)
    }

    /// Reset all statistics.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Log a summary of GC statistics at info level.
    pub fn log_summary(&self) {
        log::info!(
            "allocations: {} objects, {}",
            self.objects_allocated,
            format_words(self.words_allocated)
        );
        log::info!(
            "promotions: {} objects, {}",
            self.objects_promoted,
            format_words(self.words_promoted)
        );
        for key in TimerKey::ALL {
            if let Some(record) = self.timer(key) {
                log::info!(
                    "{}: {} episodes, {:?} total, {:?} avg, last size {}",
                    key,
                    record.elapsed.len(),
                    record.total(),
                    record.average(),
                    record
                        .sizes
                        .last()
                        .map_or_else(|| "-".to_string(), |w| format_words(*w as u64))
                );
            }
        }
    }
}

/// Format a word count in human-readable form.
fn format_words(words: u64) -> String {
    const K: u64 = 1024;
    const M: u64 = K * 1024;

    if words >= M {
        format!("{:.2} Mwords", words as f64 / M as f64)
    } else if words >= K {
        format!("{:.2} Kwords", words as f64 / K as f64)
    } else {
        format!("{} words", words)
    }
}

/// Timer for measuring GC phases.
pub struct GcTimer {
    start: Instant,
    label: &'static str,
}

impl GcTimer {
    /// Start a new timer with the given label.
    pub fn start(label: &'static str) -> Self {
        Self {
            start: Instant::now(),
            label,
        }
    }

    /// Stop the timer and return the elapsed duration.
    pub fn stop(self) -> Duration {
        let elapsed = self.start.elapsed();
        #[cfg(feature = "trace")]
        log::trace!("GC {}: {:?}", self.label, elapsed);
        #[cfg(not(feature = "trace"))]
        let _ = self.label;
        elapsed
    }
}
