// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Tempo and tick conversion.
//!
//! Capture turns wall-clock gaps into ticks and playback turns ticks back
//! into sleeps. Both use the same fixed tempo, so a captured take plays
//! back with its original timing (to the millisecond).

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::smf::varlen;

/// Microseconds per quarter note at 120 BPM
pub const DEFAULT_MICROS_PER_QUARTER: u32 = 500_000;

/// Fixed tempo expressed as microseconds per quarter note
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tempo {
    micros_per_quarter: u32,
}

impl Tempo {
    /// Create from microseconds per quarter note (clamped to the 24-bit SMF range)
    pub fn from_micros(micros_per_quarter: u32) -> Self {
        Self {
            micros_per_quarter: micros_per_quarter.clamp(1, 0xFF_FFFF),
        }
    }

    /// Create from beats per minute
    pub fn from_bpm(bpm: f64) -> Self {
        Self::from_micros((60_000_000.0 / bpm).round() as u32)
    }

    pub fn micros_per_quarter(&self) -> u32 {
        self.micros_per_quarter
    }

    pub fn bpm(&self) -> f64 {
        60_000_000.0 / self.micros_per_quarter as f64
    }
}

impl Default for Tempo {
    fn default() -> Self {
        Self::from_micros(DEFAULT_MICROS_PER_QUARTER)
    }
}

/// Converts between milliseconds and ticks at a fixed tempo
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickConverter {
    ppq: u16,
    tempo: Tempo,
}

impl TickConverter {
    pub fn new(ppq: u16, tempo: Tempo) -> Self {
        Self {
            ppq: ppq.max(1),
            tempo,
        }
    }

    pub fn ppq(&self) -> u16 {
        self.ppq
    }

    pub fn tempo(&self) -> Tempo {
        self.tempo
    }

    /// Change the tempo, keeping the resolution
    pub fn set_tempo(&mut self, tempo: Tempo) {
        self.tempo = tempo;
    }

    /// Whole ticks in `millis` (truncating), capped at the largest delta-time
    pub fn millis_to_ticks(&self, millis: u64) -> u32 {
        let ticks = millis as u128 * self.ppq as u128 * 1000
            / self.tempo.micros_per_quarter as u128;
        ticks.min(varlen::MAX_VALUE as u128) as u32
    }

    /// Ticks for a wall-clock gap
    pub fn duration_to_ticks(&self, elapsed: Duration) -> u32 {
        self.millis_to_ticks(elapsed.as_millis() as u64)
    }

    /// Whole milliseconds spanned by `ticks` (truncating)
    pub fn ticks_to_millis(&self, ticks: u32) -> u64 {
        (ticks as u128 * self.tempo.micros_per_quarter as u128 / (self.ppq as u128 * 1000)) as u64
    }

    /// Sleep duration for a delta-time
    pub fn ticks_to_duration(&self, ticks: u32) -> Duration {
        Duration::from_millis(self.ticks_to_millis(ticks))
    }
}

/// Source of time for the engines
pub trait Clock: Send {
    /// Current instant
    fn now(&self) -> Instant;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration);
}

/// Wall clock backed by `Instant` and `thread::sleep`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        thread::sleep(duration);
    }
}

#[derive(Debug)]
struct ManualState {
    now: Instant,
    slept: Vec<Duration>,
}

/// Deterministic clock: sleeping advances time instantly.
///
/// Clones share the same timeline, so a test can keep one handle and
/// move time forward while an engine holds another.
#[derive(Debug, Clone)]
pub struct ManualClock {
    state: Arc<Mutex<ManualState>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ManualState {
                now: Instant::now(),
                slept: Vec::new(),
            })),
        }
    }

    /// Move time forward without recording a sleep
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.now += duration;
        }
    }

    /// Every sleep requested so far, in order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.state
            .lock()
            .map(|state| state.slept.clone())
            .unwrap_or_default()
    }

    /// Total time slept
    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.state
            .lock()
            .map(|state| state.now)
            .unwrap_or_else(|poisoned| poisoned.into_inner().now)
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.now += duration;
            state.slept.push(duration);
        }
    }
}
