// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Streaming single-track SMF writer.
//!
//! Events are written as they arrive; the track length is unknown until
//! the stream closes, so a placeholder is written and patched by
//! [`SmfWriter::finish`].

use std::io::{Seek, SeekFrom, Write};

use super::{varlen, SmfError, SmfHeader, TRACK_ID};
use crate::midi::{messages, MetaEvent, MidiEvent};

/// Writer for a format 0 file
pub struct SmfWriter<W: Write + Seek> {
    sink: W,
    /// Offset of the 4-byte track length field
    length_pos: u64,
    /// Bytes written after the length field
    track_bytes: u64,
    /// Channel-voice events written so far
    events: usize,
}

impl<W: Write + Seek> SmfWriter<W> {
    /// Write the header chunk and open the track chunk
    pub fn begin(mut sink: W, ppq: u16) -> Result<Self, SmfError> {
        sink.write_all(&SmfHeader::single_track(ppq).to_bytes())?;
        sink.write_all(TRACK_ID)?;

        let length_pos = sink.stream_position()?;
        sink.write_all(&[0, 0, 0, 0])?;

        Ok(Self {
            sink,
            length_pos,
            track_bytes: 0,
            events: 0,
        })
    }

    /// Number of channel-voice events written
    pub fn event_count(&self) -> usize {
        self.events
    }

    /// Bytes of track data written so far
    pub fn track_len(&self) -> u64 {
        self.track_bytes
    }

    /// Write a channel-voice event
    pub fn write_timed_event(&mut self, delta_ticks: u32, event: &MidiEvent) -> Result<(), SmfError> {
        self.write_delta(delta_ticks)?;
        self.put(&event.to_bytes())?;
        self.events += 1;
        Ok(())
    }

    /// Write a meta event
    pub fn write_meta(&mut self, delta_ticks: u32, kind: u8, data: &[u8]) -> Result<(), SmfError> {
        self.write_delta(delta_ticks)?;
        self.put(&[messages::META, kind])?;
        self.write_delta(data.len() as u32)?;
        self.put(data)
    }

    /// Write a Set-Tempo meta event
    pub fn write_tempo(&mut self, delta_ticks: u32, micros_per_quarter: u32) -> Result<(), SmfError> {
        let meta = MetaEvent::tempo(micros_per_quarter);
        self.write_meta(delta_ticks, meta.kind, &meta.data)
    }

    /// Terminate the track, patch its length and hand back the sink
    pub fn finish(mut self) -> Result<W, SmfError> {
        let end = MetaEvent::end_of_track();
        self.write_meta(0, end.kind, &end.data)?;

        let length = u32::try_from(self.track_bytes).map_err(|_| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, "track longer than 4 GiB")
        })?;

        let end_pos = self.sink.stream_position()?;
        self.sink.seek(SeekFrom::Start(self.length_pos))?;
        self.sink.write_all(&length.to_be_bytes())?;
        self.sink.seek(SeekFrom::Start(end_pos))?;
        self.sink.flush()?;
        Ok(self.sink)
    }

    fn write_delta(&mut self, value: u32) -> Result<(), SmfError> {
        let n = varlen::write(&mut self.sink, value)?;
        self.track_bytes += n as u64;
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), SmfError> {
        self.sink.write_all(bytes)?;
        self.track_bytes += bytes.len() as u64;
        Ok(())
    }
}
