// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file encoding and decoding.
//!
//! This module provides:
//! - the variable-length quantity codec used for delta-times
//! - a streaming single-track writer with deferred length patch-back
//! - a lazy, rewindable track reader

pub mod reader;
pub mod varlen;
pub mod writer;

pub use crate::error::SmfError;
pub use reader::SmfReader;
pub use writer::SmfWriter;

/// Header chunk id
pub const HEADER_ID: &[u8; 4] = b"MThd";
/// Track chunk id
pub const TRACK_ID: &[u8; 4] = b"MTrk";
/// Header chunk payload length
pub const HEADER_LEN: u32 = 6;
/// Default time resolution
pub const DEFAULT_PPQ: u16 = 480;

/// The fixed fields of an `MThd` chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmfHeader {
    /// File format (0 = single track)
    pub format: u16,
    /// Number of track chunks
    pub tracks: u16,
    /// Ticks per quarter note
    pub ppq: u16,
}

impl SmfHeader {
    /// Format 0 header with one track
    pub fn single_track(ppq: u16) -> Self {
        Self {
            format: 0,
            tracks: 1,
            ppq,
        }
    }

    /// Full header chunk, id and length included
    pub fn to_bytes(&self) -> [u8; 14] {
        let mut bytes = [0u8; 14];
        bytes[0..4].copy_from_slice(HEADER_ID);
        bytes[4..8].copy_from_slice(&HEADER_LEN.to_be_bytes());
        bytes[8..10].copy_from_slice(&self.format.to_be_bytes());
        bytes[10..12].copy_from_slice(&self.tracks.to_be_bytes());
        bytes[12..14].copy_from_slice(&self.ppq.to_be_bytes());
        bytes
    }
}

impl Default for SmfHeader {
    fn default() -> Self {
        Self::single_track(DEFAULT_PPQ)
    }
}
