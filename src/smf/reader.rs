// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Lazy, rewindable reader for the first track of an SMF file.

use std::io::{self, Read, Seek, SeekFrom};

use tracing::debug;

use super::{varlen, SmfError, SmfHeader, HEADER_ID, HEADER_LEN, TRACK_ID};
use crate::error::MalformedKind;
use crate::midi::{data_len, messages, MetaEvent, MidiEvent, TimedEvent};

/// Reader positioned inside a track chunk
pub struct SmfReader<R: Read + Seek> {
    source: R,
    header: SmfHeader,
    /// Offset of the first delta-time in the track
    track_start: u64,
    /// Declared length of the track data
    track_len: u32,
    /// Current offset in the source
    position: u64,
    running_status: Option<u8>,
    /// Set after End-Of-Track or an error
    finished: bool,
}

impl<R: Read + Seek> SmfReader<R> {
    /// Read the header and locate the first track chunk.
    ///
    /// Chunks with unknown ids before the track are skipped.
    pub fn open(source: R) -> Result<Self, SmfError> {
        let mut reader = Self {
            source,
            header: SmfHeader::default(),
            track_start: 0,
            track_len: 0,
            position: 0,
            running_status: None,
            finished: false,
        };

        let (id, len) = reader.read_chunk_header(HEADER_ID)?;
        if &id != HEADER_ID || len < HEADER_LEN {
            return Err(SmfError::malformed(0, MalformedKind::MissingChunk("MThd")));
        }
        reader.header = SmfHeader {
            format: reader.read_u16()?,
            tracks: reader.read_u16()?,
            ppq: reader.read_u16()?,
        };
        reader.skip_bytes((len - HEADER_LEN) as u64)?;

        loop {
            let (id, len) = reader.read_chunk_header(TRACK_ID)?;
            if &id == TRACK_ID {
                reader.track_start = reader.position;
                reader.track_len = len;
                break;
            }
            debug!(chunk = ?String::from_utf8_lossy(&id), len, "skipping unknown chunk");
            reader.skip_bytes(len as u64)?;
        }

        Ok(reader)
    }

    pub fn header(&self) -> SmfHeader {
        self.header
    }

    /// Ticks per quarter note declared by the file
    pub fn ppq(&self) -> u16 {
        self.header.ppq
    }

    /// Declared track data length
    pub fn track_len(&self) -> u32 {
        self.track_len
    }

    /// True once End-Of-Track or an error has been returned
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read the next event.
    ///
    /// End-Of-Track is returned once as a meta event, after which this
    /// yields `Ok(None)` until [`rewind`](Self::rewind). Errors also end
    /// the sequence.
    pub fn next_event(&mut self) -> Result<Option<TimedEvent>, SmfError> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_event();
        match &result {
            Ok(event) if event.is_end_of_track() => self.finished = true,
            Ok(_) => {}
            Err(_) => self.finished = true,
        }
        result.map(Some)
    }

    /// Go back to the first event of the track
    pub fn rewind(&mut self) -> Result<(), SmfError> {
        self.source.seek(SeekFrom::Start(self.track_start))?;
        self.position = self.track_start;
        self.running_status = None;
        self.finished = false;
        Ok(())
    }

    /// Consume the reader, returning the source
    pub fn into_inner(self) -> R {
        self.source
    }

    fn track_end(&self) -> u64 {
        self.track_start + self.track_len as u64
    }

    fn read_event(&mut self) -> Result<TimedEvent, SmfError> {
        // Delta-times of skipped SysEx events carry over to the next event.
        let mut delta_ticks = 0u32;

        loop {
            if self.position >= self.track_end() {
                return Err(self.malformed(MalformedKind::MissingEndOfTrack));
            }

            delta_ticks = delta_ticks.saturating_add(self.read_varlen()?);
            let status = self.read_byte()?;

            match status {
                messages::META => {
                    self.running_status = None;
                    let kind = self.read_byte()?;
                    let len = self.read_bounded_len()?;
                    let mut data = vec![0u8; len as usize];
                    self.read_exact(&mut data)?;
                    return Ok(TimedEvent::meta(delta_ticks, MetaEvent { kind, data }));
                }
                messages::SYSEX_START | messages::SYSEX_END => {
                    self.running_status = None;
                    let len = self.read_bounded_len()?;
                    self.skip_bytes(len)?;
                }
                0x80..=0xEF => {
                    self.running_status = Some(status);
                    let data1 = self.read_data()?;
                    return self.finish_channel_event(delta_ticks, status, data1);
                }
                0x00..=0x7F => match self.running_status {
                    Some(running) => return self.finish_channel_event(delta_ticks, running, status),
                    None => {
                        return Err(SmfError::malformed(
                            self.position - 1,
                            MalformedKind::MissingStatus(status),
                        ))
                    }
                },
                _ => {
                    return Err(SmfError::malformed(
                        self.position - 1,
                        MalformedKind::UnexpectedStatus(status),
                    ))
                }
            }
        }
    }

    fn finish_channel_event(&mut self, delta_ticks: u32, status: u8, data1: u8) -> Result<TimedEvent, SmfError> {
        let data2 = if data_len(status) == 2 { self.read_data()? } else { 0 };
        let event = MidiEvent::new(status, data1, data2)
            .ok_or_else(|| self.malformed(MalformedKind::UnexpectedStatus(status)))?;
        Ok(TimedEvent::midi(delta_ticks, event))
    }

    fn read_chunk_header(&mut self, expected: &'static [u8; 4]) -> Result<([u8; 4], u32), SmfError> {
        let mut id = [0u8; 4];
        self.read_exact(&mut id).map_err(|e| match e.malformed_kind() {
            Some(MalformedKind::UnexpectedEnd) => {
                let name = if expected == HEADER_ID { "MThd" } else { "MTrk" };
                self.malformed(MalformedKind::MissingChunk(name))
            }
            _ => e,
        })?;
        let mut len = [0u8; 4];
        self.read_exact(&mut len)?;
        Ok((id, u32::from_be_bytes(len)))
    }

    fn read_u16(&mut self) -> Result<u16, SmfError> {
        let mut bytes = [0u8; 2];
        self.read_exact(&mut bytes)?;
        Ok(u16::from_be_bytes(bytes))
    }

    fn read_data(&mut self) -> Result<u8, SmfError> {
        let byte = self.read_byte()?;
        if byte & 0x80 != 0 {
            return Err(SmfError::malformed(
                self.position - 1,
                MalformedKind::UnexpectedStatus(byte),
            ));
        }
        Ok(byte)
    }

    fn read_varlen(&mut self) -> Result<u32, SmfError> {
        let mut decoder = varlen::Decoder::new();
        loop {
            let byte = self.read_byte()?;
            if let Some(value) = decoder.push(byte).map_err(|kind| self.malformed(kind))? {
                return Ok(value);
            }
        }
    }

    fn read_byte(&mut self) -> Result<u8, SmfError> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SmfError> {
        match self.source.read_exact(buf) {
            Ok(()) => {
                self.position += buf.len() as u64;
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(self.malformed(MalformedKind::UnexpectedEnd))
            }
            Err(e) => Err(SmfError::Io(e)),
        }
    }

    /// Read a payload length, rejecting one that runs past the track
    fn read_bounded_len(&mut self) -> Result<u64, SmfError> {
        let len = self.read_varlen()? as u64;
        if len > self.track_end().saturating_sub(self.position) {
            return Err(self.malformed(MalformedKind::UnexpectedEnd));
        }
        Ok(len)
    }

    fn skip_bytes(&mut self, len: u64) -> Result<(), SmfError> {
        self.position = self.source.seek(SeekFrom::Current(len as i64))?;
        Ok(())
    }

    fn malformed(&self, kind: MalformedKind) -> SmfError {
        SmfError::malformed(self.position, kind)
    }
}

impl<R: Read + Seek> Iterator for SmfReader<R> {
    type Item = Result<TimedEvent, SmfError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_event().transpose()
    }
}
