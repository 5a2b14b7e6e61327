// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types shared by the codec, the transports and the engines.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// What was wrong with a malformed SMF byte stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MalformedKind {
    /// The source ended in the middle of an event or chunk
    #[error("unexpected end of data")]
    UnexpectedEnd,
    /// A required chunk id was not found
    #[error("missing {0} chunk")]
    MissingChunk(&'static str),
    /// A data byte appeared where a status byte was required
    #[error("data byte 0x{0:02X} where a status byte was expected")]
    MissingStatus(u8),
    /// A status byte that is not allowed at this position
    #[error("unexpected status byte 0x{0:02X}")]
    UnexpectedStatus(u8),
    /// A variable-length quantity used more than four bytes
    #[error("variable-length quantity longer than four bytes")]
    VarLenOverflow,
    /// The track chunk ended without an End-Of-Track meta event
    #[error("track ended without an End-Of-Track event")]
    MissingEndOfTrack,
}

/// Errors produced while reading or writing Standard MIDI Files
#[derive(Debug, Error)]
pub enum SmfError {
    /// Underlying I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The byte stream does not follow the SMF layout
    #[error("malformed stream at byte {offset}: {kind}")]
    Malformed { offset: u64, kind: MalformedKind },
}

impl SmfError {
    pub(crate) fn malformed(offset: u64, kind: MalformedKind) -> Self {
        SmfError::Malformed { offset, kind }
    }

    /// The malformation kind, if this is a format error
    pub fn malformed_kind(&self) -> Option<MalformedKind> {
        match self {
            SmfError::Malformed { kind, .. } => Some(*kind),
            SmfError::Io(_) => None,
        }
    }
}

/// Errors raised by a byte transport
#[derive(Debug, Error)]
pub enum TransportError {
    /// Nothing arrived within the read timeout
    #[error("transport read timed out")]
    Timeout,
    /// The device went away; no further reads will succeed
    #[error("transport disconnected")]
    Disconnected,
    /// Device I/O failure
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

/// Top-level error for a record or play invocation
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The MIDI file could not be opened or created
    #[error("cannot open {}: {source}", path.display())]
    IoFault {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// SMF encode/decode failure
    #[error(transparent)]
    Smf(#[from] SmfError),
    /// Transport failure that could not be absorbed
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<io::Error> for BridgeError {
    fn from(err: io::Error) -> Self {
        BridgeError::Smf(SmfError::Io(err))
    }
}

/// Result alias used by the engines
pub type Result<T> = std::result::Result<T, BridgeError>;
