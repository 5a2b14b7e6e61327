// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Bridge between a live MIDI stream and a Standard MIDI File.
//!
//! Capture reads raw transport bytes, reassembles channel-voice events and
//! writes them to a single-track SMF; playback reads the track back and
//! emits the events to a transport with their original timing, once or in
//! a loop.

pub mod config;
pub mod engine;
pub mod error;
pub mod midi;
pub mod smf;
pub mod timing;

pub use config::BridgeConfig;
pub use engine::{CancelToken, CaptureEngine, PlaybackEngine, PlaybackMode};
pub use error::{BridgeError, MalformedKind, SmfError, TransportError};
pub use midi::{MetaEvent, MidiEvent, TimedEvent, TrackEvent};
pub use smf::{SmfReader, SmfWriter};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use engine::{CaptureSummary, PlaybackSummary};
use midi::{MidiInputPort, MidiOutput};
use timing::SystemClock;

/// Record from `input` into a new file at `path` until `cancel` is set.
///
/// Failing to create the file is reported before any engine state exists.
pub fn record<P, I>(path: P, input: &mut I, config: &BridgeConfig, cancel: CancelToken) -> error::Result<CaptureSummary>
where
    P: AsRef<Path>,
    I: MidiInputPort + ?Sized,
{
    let path = path.as_ref();
    let file = File::create(path).map_err(|source| BridgeError::IoFault {
        path: path.to_path_buf(),
        source,
    })?;

    let engine = CaptureEngine::new(BufWriter::new(file), &config.capture_settings(), SystemClock, cancel)?;
    let (_sink, summary) = engine.run(input)?;
    Ok(summary)
}

/// Play the file at `path` into `output` until it ends or `cancel` is set
pub fn play<P, O>(
    path: P,
    output: &mut O,
    mode: PlaybackMode,
    config: &BridgeConfig,
    cancel: CancelToken,
) -> error::Result<PlaybackSummary>
where
    P: AsRef<Path>,
    O: MidiOutput + ?Sized,
{
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| BridgeError::IoFault {
        path: path.to_path_buf(),
        source,
    })?;

    let reader = SmfReader::open(BufReader::new(file))?;
    PlaybackEngine::new(reader, output, config.playback_settings(mode), SystemClock, cancel).run()
}
