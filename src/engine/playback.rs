// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Playback of a Standard MIDI File track to a live output.
//!
//! The engine is an explicit state machine driven by [`PlaybackEngine::step`]:
//!
//! ```text
//! Playing --track end--> LoopWait --wait elapsed--> Playing
//!    |                      |
//!    +--once / cancel--> Stopped <--cancel--+
//! ```

use std::io::{Read, Seek};
use std::time::Duration;

use tracing::{debug, info, warn};

use super::{sleep_cancellable, CancelToken};
use crate::error::{MalformedKind, Result, SmfError};
use crate::midi::{MidiOutput, TrackEvent};
use crate::smf::SmfReader;
use crate::timing::{Clock, SystemClock, Tempo, TickConverter};

/// Playback mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackMode {
    /// Play the track once
    #[default]
    Once,
    /// Restart after every track end until cancelled
    Loop,
}

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    /// Reading and emitting events
    Playing,
    /// Pausing between passes in loop mode
    LoopWait,
    /// Done
    Stopped,
}

/// Why a pass over the track ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEnd {
    /// A well-formed End-Of-Track meta event
    EndOfTrack,
    /// The file was malformed; the rest of the track was skipped
    Malformed { offset: u64, kind: MalformedKind },
    /// Reading the file failed
    ReadFailed(String),
}

impl From<SmfError> for TrackEnd {
    fn from(err: SmfError) -> Self {
        match err {
            SmfError::Malformed { offset, kind } => TrackEnd::Malformed { offset, kind },
            SmfError::Io(e) => TrackEnd::ReadFailed(e.to_string()),
        }
    }
}

/// Playback parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackSettings {
    pub mode: PlaybackMode,
    /// Pause between passes in loop mode
    pub loop_wait: Duration,
    /// Longest uninterrupted sleep; cancellation is checked between slices
    pub cancel_poll: Duration,
    /// Tempo used to turn ticks into sleeps
    pub tempo: Tempo,
    /// Follow Set-Tempo meta events found in the file
    pub honor_file_tempo: bool,
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            mode: PlaybackMode::Once,
            loop_wait: Duration::from_secs(1),
            cancel_poll: Duration::from_millis(20),
            tempo: Tempo::default(),
            honor_file_tempo: false,
        }
    }
}

/// Counters for one playback invocation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlaybackSummary {
    /// Events handed to the output
    pub events_sent: usize,
    /// Sends that failed and were skipped
    pub send_errors: usize,
    /// Passes that reached a track end
    pub passes: usize,
    /// How the most recent pass ended
    pub last_end: Option<TrackEnd>,
}

/// File-to-transport playback engine
pub struct PlaybackEngine<'a, R, O, C = SystemClock>
where
    R: Read + Seek,
    O: MidiOutput + ?Sized,
    C: Clock,
{
    reader: SmfReader<R>,
    output: &'a mut O,
    clock: C,
    cancel: CancelToken,
    settings: PlaybackSettings,
    converter: TickConverter,
    state: PlaybackState,
    summary: PlaybackSummary,
}

impl<'a, R, O, C> PlaybackEngine<'a, R, O, C>
where
    R: Read + Seek,
    O: MidiOutput + ?Sized,
    C: Clock,
{
    /// Create an engine that plays `reader` into `output`
    pub fn new(
        reader: SmfReader<R>,
        output: &'a mut O,
        settings: PlaybackSettings,
        clock: C,
        cancel: CancelToken,
    ) -> Self {
        let converter = TickConverter::new(reader.ppq(), settings.tempo);
        Self {
            reader,
            output,
            clock,
            cancel,
            settings,
            converter,
            state: PlaybackState::Playing,
            summary: PlaybackSummary::default(),
        }
    }

    /// Get current state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Counters so far
    pub fn summary(&self) -> &PlaybackSummary {
        &self.summary
    }

    /// Advance the state machine by one event or one loop wait
    pub fn step(&mut self) -> Result<PlaybackState> {
        if self.cancel.is_cancelled() {
            self.state = PlaybackState::Stopped;
        }

        match self.state {
            PlaybackState::Stopped => {}
            PlaybackState::Playing => self.play_next()?,
            PlaybackState::LoopWait => {
                if self.sleep(self.settings.loop_wait) {
                    self.reader.rewind()?;
                    self.converter.set_tempo(self.settings.tempo);
                    info!(pass = self.summary.passes + 1, "Looping");
                    self.state = PlaybackState::Playing;
                } else {
                    self.state = PlaybackState::Stopped;
                }
            }
        }
        Ok(self.state)
    }

    /// Play until stopped, returning the counters
    pub fn run(mut self) -> Result<PlaybackSummary> {
        info!(mode = ?self.settings.mode, ppq = self.reader.ppq(), "Playing back");
        while self.step()? != PlaybackState::Stopped {}
        info!(events = self.summary.events_sent, passes = self.summary.passes, "Playback finished");
        Ok(self.summary)
    }

    fn play_next(&mut self) -> Result<()> {
        let timed = match self.reader.next_event() {
            Ok(Some(timed)) => timed,
            Ok(None) => {
                self.end_track(TrackEnd::EndOfTrack);
                return Ok(());
            }
            Err(err) => {
                warn!("Treating malformed file as end of track: {}", err);
                self.end_track(TrackEnd::from(err));
                return Ok(());
            }
        };

        if timed.delta_ticks > 0 {
            let wait = self.converter.ticks_to_duration(timed.delta_ticks);
            if !self.sleep(wait) {
                self.state = PlaybackState::Stopped;
                return Ok(());
            }
        }

        match timed.event {
            TrackEvent::Midi(event) => match self.output.send(&event) {
                Ok(()) => {
                    self.summary.events_sent += 1;
                    debug!("Sent {}", event.message());
                }
                Err(e) => {
                    self.summary.send_errors += 1;
                    warn!("Failed to send {}: {}", event.message(), e);
                }
            },
            TrackEvent::Meta(meta) if meta.is_end_of_track() => self.end_track(TrackEnd::EndOfTrack),
            TrackEvent::Meta(meta) => {
                if self.settings.honor_file_tempo {
                    if let Some(micros) = meta.tempo_micros() {
                        debug!(micros, "Tempo change");
                        self.converter.set_tempo(Tempo::from_micros(micros));
                    }
                }
            }
        }
        Ok(())
    }

    fn end_track(&mut self, reason: TrackEnd) {
        self.summary.passes += 1;
        self.summary.last_end = Some(reason);
        self.state = match self.settings.mode {
            PlaybackMode::Loop if !self.cancel.is_cancelled() => PlaybackState::LoopWait,
            _ => PlaybackState::Stopped,
        };
        debug!(state = ?self.state, "Track end");
    }

    fn sleep(&self, duration: Duration) -> bool {
        sleep_cancellable(&self.clock, duration, self.settings.cancel_poll, &self.cancel)
    }
}
