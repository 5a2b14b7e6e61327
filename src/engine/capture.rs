// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Live capture into a Standard MIDI File.
//!
//! The engine polls a transport, reassembles events and appends them to
//! an [`SmfWriter`]. Nothing is recorded until the first Note On; that
//! note sets the zero point of the timeline.

use std::io::{Seek, Write};
use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use super::CancelToken;
use crate::error::{Result, TransportError};
use crate::midi::{Framing, InboundDecoder, MidiEvent, MidiInputPort};
use crate::smf::{SmfWriter, DEFAULT_PPQ};
use crate::timing::{Clock, SystemClock, Tempo, TickConverter};

/// Capture state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureState {
    /// Waiting for a Note On to start the timeline
    #[default]
    AwaitingFirstNote,
    /// Appending events to the track
    Recording,
    /// Stopped; the track is ready to be finished
    Finished,
}

/// Capture parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CaptureSettings {
    /// Ticks per quarter note written to the header
    pub ppq: u16,
    /// Tempo used to turn milliseconds into ticks
    pub tempo: Tempo,
    /// Framing of the incoming byte stream
    pub framing: Framing,
    /// Bounded wait for each transport read
    pub read_timeout: Duration,
    /// Bytes requested per transport read
    pub read_buffer_size: usize,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            ppq: DEFAULT_PPQ,
            tempo: Tempo::default(),
            framing: Framing::Serial,
            read_timeout: Duration::from_millis(1000),
            read_buffer_size: 64,
        }
    }
}

/// Counters for one capture session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureSummary {
    /// Channel-voice events written to the track
    pub events_written: usize,
    /// Events dropped while waiting for the first note
    pub events_discarded: usize,
    /// Reads that returned nothing before the timeout
    pub timeouts: u64,
    /// Reads that failed and were retried
    pub transport_errors: u64,
    /// Track chunk length, terminator included
    pub track_bytes: u64,
}

/// Transport-to-file capture engine
pub struct CaptureEngine<W: Write + Seek, C: Clock = SystemClock> {
    writer: SmfWriter<W>,
    decoder: InboundDecoder,
    converter: TickConverter,
    clock: C,
    cancel: CancelToken,
    state: CaptureState,
    /// Timestamp of the previous recorded event
    last_event: Option<Instant>,
    read_timeout: Duration,
    read_buffer_size: usize,
    summary: CaptureSummary,
    /// Events decoded from the current read
    scratch: Vec<MidiEvent>,
}

impl<W: Write + Seek, C: Clock> CaptureEngine<W, C> {
    /// Create an engine writing to `sink`.
    ///
    /// The SMF header and track placeholder are written immediately.
    pub fn new(sink: W, settings: &CaptureSettings, clock: C, cancel: CancelToken) -> Result<Self> {
        let writer = SmfWriter::begin(sink, settings.ppq)?;
        Ok(Self {
            writer,
            decoder: InboundDecoder::new(settings.framing),
            converter: TickConverter::new(settings.ppq, settings.tempo),
            clock,
            cancel,
            state: CaptureState::AwaitingFirstNote,
            last_event: None,
            read_timeout: settings.read_timeout,
            read_buffer_size: settings.read_buffer_size.max(1),
            summary: CaptureSummary::default(),
            scratch: Vec::new(),
        })
    }

    /// Get current state
    pub fn state(&self) -> CaptureState {
        self.state
    }

    /// Counters so far
    pub fn summary(&self) -> &CaptureSummary {
        &self.summary
    }

    /// Stop accepting events
    pub fn stop(&mut self) {
        if self.state != CaptureState::Finished {
            info!("Recording stopped");
            self.state = CaptureState::Finished;
        }
    }

    /// Record one assembled event.
    ///
    /// Returns `true` if the event was written to the track.
    pub fn handle_event(&mut self, event: MidiEvent) -> Result<bool> {
        let now = match self.state {
            CaptureState::Finished => return Ok(false),
            CaptureState::AwaitingFirstNote => {
                if !event.is_note_on() {
                    trace!("discarding {} before first note", event.message());
                    self.summary.events_discarded += 1;
                    return Ok(false);
                }
                self.start_timeline()?
            }
            CaptureState::Recording => self.clock.now(),
        };

        let delta_ticks = match self.last_event {
            Some(last) => self.converter.duration_to_ticks(now.saturating_duration_since(last)),
            None => 0,
        };
        self.last_event = Some(now);

        self.writer.write_timed_event(delta_ticks, &event)?;
        self.summary.events_written += 1;
        debug!(delta_ticks, "{}", event.message());
        Ok(true)
    }

    /// Decode raw transport bytes and record every completed event.
    ///
    /// Returns the number of events written.
    pub fn process(&mut self, bytes: &[u8]) -> Result<usize> {
        let mut events = std::mem::take(&mut self.scratch);
        events.clear();
        self.decoder.feed(bytes, &mut events);

        let mut written = 0;
        let mut result = Ok(());
        for event in events.iter() {
            match self.handle_event(*event) {
                Ok(true) => written += 1,
                Ok(false) => {}
                Err(e) => {
                    result = Err(e);
                    break;
                }
            }
        }
        self.scratch = events;
        result.map(|()| written)
    }

    /// One poll iteration: check cancellation, read once, record.
    ///
    /// Timeouts and read failures are absorbed; a disconnected transport
    /// stops the capture.
    pub fn poll<I: MidiInputPort + ?Sized>(&mut self, input: &mut I, buf: &mut [u8]) -> Result<()> {
        if self.cancel.is_cancelled() {
            self.stop();
            return Ok(());
        }

        match input.read(buf, self.read_timeout) {
            Ok(n) => {
                self.process(&buf[..n])?;
            }
            Err(TransportError::Timeout) => self.summary.timeouts += 1,
            Err(TransportError::Disconnected) => {
                warn!("MIDI input disconnected");
                self.stop();
            }
            Err(e) => {
                warn!("MIDI input read failed: {}", e);
                self.summary.transport_errors += 1;
            }
        }

        if self.cancel.is_cancelled() {
            self.stop();
        }
        Ok(())
    }

    /// Capture until cancelled or the transport goes away, then finish the file.
    ///
    /// If writing fails mid-capture the track is still terminated on a
    /// best-effort basis before the error is returned.
    pub fn run<I: MidiInputPort + ?Sized>(mut self, input: &mut I) -> Result<(W, CaptureSummary)> {
        info!("Recording... waiting for the first note");
        let mut buf = vec![0u8; self.read_buffer_size];
        while self.state != CaptureState::Finished {
            if let Err(err) = self.poll(input, &mut buf) {
                warn!("Recording failed: {}", err);
                if let Err(close_err) = self.finish() {
                    warn!("Could not terminate the track: {}", close_err);
                }
                return Err(err);
            }
        }
        self.finish()
    }

    /// Terminate the track and return the sink with the session counters
    pub fn finish(mut self) -> Result<(W, CaptureSummary)> {
        self.stop();
        self.summary.track_bytes = self.writer.track_len() + 4;
        let events = self.writer.event_count();
        let sink = self.writer.finish()?;
        info!(
            events,
            discarded = self.summary.events_discarded,
            "Recording saved"
        );
        Ok((sink, self.summary))
    }

    fn start_timeline(&mut self) -> Result<Instant> {
        let now = self.clock.now();
        self.last_event = Some(now);
        self.writer
            .write_tempo(0, self.converter.tempo().micros_per_quarter())?;
        self.state = CaptureState::Recording;
        info!(
            bpm = self.converter.tempo().bpm(),
            ppq = self.converter.ppq(),
            "First note received, recording"
        );
        Ok(now)
    }
}
