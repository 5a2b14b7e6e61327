// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! MIDI event model and transport abstraction.
//!
//! This module provides the channel-voice event types shared by the
//! capture and playback paths, plus trait-based transport seams so that
//! different backends (raw device nodes, midir, test doubles) can be
//! used interchangeably.

pub mod assembler;
pub mod device;
#[cfg(feature = "midir")]
pub mod midir_backend;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::TransportError;

pub use assembler::{EventAssembler, InboundDecoder, PacketDecoder};
pub use device::{DeviceInput, DeviceOutput};

/// Trait for MIDI output implementations.
///
/// Playback hands every channel-voice event to a sink of this type; the
/// sink decides how the event is framed on the wire.
pub trait MidiOutput: Send {
    /// Send one event immediately.
    fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError>;
}

/// Trait for raw MIDI input.
///
/// A "read N bytes with timeout" capability. Returning
/// `TransportError::Timeout` means nothing arrived; callers retry.
pub trait MidiInputPort: Send {
    /// Read up to `buf.len()` bytes, waiting at most `timeout`.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
}

/// MIDI message constants
pub mod messages {
    // Channel Voice Messages (upper nibble, lower nibble is channel 0-15)
    pub const NOTE_OFF: u8 = 0x80;
    pub const NOTE_ON: u8 = 0x90;
    pub const POLY_AFTERTOUCH: u8 = 0xA0;
    pub const CONTROL_CHANGE: u8 = 0xB0;
    pub const PROGRAM_CHANGE: u8 = 0xC0;
    pub const CHANNEL_AFTERTOUCH: u8 = 0xD0;
    pub const PITCH_BEND: u8 = 0xE0;

    // System Common Messages
    pub const SYSEX_START: u8 = 0xF0;
    pub const SYSEX_END: u8 = 0xF7;

    // System Real-Time Messages start here
    pub const REALTIME_FIRST: u8 = 0xF8;

    // SMF meta event marker and kinds
    pub const META: u8 = 0xFF;
    pub const META_SET_TEMPO: u8 = 0x51;
    pub const META_END_OF_TRACK: u8 = 0x2F;
}

/// Number of data bytes that follow a channel-voice status byte
pub fn data_len(status: u8) -> usize {
    match status & 0xF0 {
        messages::PROGRAM_CHANGE | messages::CHANNEL_AFTERTOUCH => 1,
        _ => 2,
    }
}

/// How events are framed on a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum Framing {
    /// Plain MIDI byte stream, running status allowed
    #[default]
    Serial,
    /// USB-MIDI 4-byte packets `{cin, status, data1, data2}`
    UsbPacket,
}

impl Framing {
    /// Encode an event for this framing
    pub fn encode(&self, event: &MidiEvent) -> Vec<u8> {
        match self {
            Framing::Serial => event.to_bytes(),
            Framing::UsbPacket => event.to_usb_packet().to_vec(),
        }
    }
}

/// A single channel-voice message.
///
/// The status byte always has its high bit set and lies in `0x80..=0xEF`.
/// `data2` is absent exactly for Program Change and Channel Pressure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MidiEvent {
    status: u8,
    data1: u8,
    data2: Option<u8>,
}

impl MidiEvent {
    /// Build an event from raw parts.
    ///
    /// Returns `None` if `status` is not a channel-voice status byte.
    /// `data2` is dropped for one-data-byte message types.
    pub fn new(status: u8, data1: u8, data2: u8) -> Option<Self> {
        if !(0x80..messages::SYSEX_START).contains(&status) {
            return None;
        }
        let data2 = (data_len(status) == 2).then_some(data2 & 0x7F);
        Some(Self {
            status,
            data1: data1 & 0x7F,
            data2,
        })
    }

    /// Note On event
    pub fn note_on(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            status: messages::NOTE_ON | (channel & 0x0F),
            data1: note & 0x7F,
            data2: Some(velocity & 0x7F),
        }
    }

    /// Note Off event
    pub fn note_off(channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            status: messages::NOTE_OFF | (channel & 0x0F),
            data1: note & 0x7F,
            data2: Some(velocity & 0x7F),
        }
    }

    /// Control Change event
    pub fn control_change(channel: u8, controller: u8, value: u8) -> Self {
        Self {
            status: messages::CONTROL_CHANGE | (channel & 0x0F),
            data1: controller & 0x7F,
            data2: Some(value & 0x7F),
        }
    }

    /// Program Change event
    pub fn program_change(channel: u8, program: u8) -> Self {
        Self {
            status: messages::PROGRAM_CHANGE | (channel & 0x0F),
            data1: program & 0x7F,
            data2: None,
        }
    }

    pub fn status(&self) -> u8 {
        self.status
    }

    pub fn data1(&self) -> u8 {
        self.data1
    }

    pub fn data2(&self) -> Option<u8> {
        self.data2
    }

    /// Message type (upper nibble of the status byte)
    pub fn kind(&self) -> u8 {
        self.status & 0xF0
    }

    /// MIDI channel (0-15)
    pub fn channel(&self) -> u8 {
        self.status & 0x0F
    }

    /// True for a Note On that actually starts a note (velocity > 0)
    pub fn is_note_on(&self) -> bool {
        self.kind() == messages::NOTE_ON && self.data2.unwrap_or(0) > 0
    }

    /// Rewrite Note On with velocity 0 as Note Off on the same channel
    pub fn normalized(self) -> Self {
        if self.kind() == messages::NOTE_ON && self.data2 == Some(0) {
            Self {
                status: messages::NOTE_OFF | self.channel(),
                ..self
            }
        } else {
            self
        }
    }

    /// Raw bytes: status, data1 and data2 when present
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![self.status, self.data1];
        if let Some(data2) = self.data2 {
            bytes.push(data2);
        }
        bytes
    }

    /// USB-MIDI packet: the CIN mirrors the status nibble
    pub fn to_usb_packet(&self) -> [u8; 4] {
        [
            self.status >> 4,
            self.status,
            self.data1,
            self.data2.unwrap_or(0),
        ]
    }

    /// Typed view of this event
    pub fn message(&self) -> MidiMessage {
        let channel = self.channel();
        let data2 = self.data2.unwrap_or(0);
        match self.kind() {
            messages::NOTE_OFF => MidiMessage::NoteOff {
                channel,
                note: self.data1,
                velocity: data2,
            },
            messages::NOTE_ON if data2 == 0 => MidiMessage::NoteOff {
                channel,
                note: self.data1,
                velocity: 0,
            },
            messages::NOTE_ON => MidiMessage::NoteOn {
                channel,
                note: self.data1,
                velocity: data2,
            },
            messages::POLY_AFTERTOUCH => MidiMessage::PolyAftertouch {
                channel,
                note: self.data1,
                pressure: data2,
            },
            messages::CONTROL_CHANGE => MidiMessage::ControlChange {
                channel,
                controller: self.data1,
                value: data2,
            },
            messages::PROGRAM_CHANGE => MidiMessage::ProgramChange {
                channel,
                program: self.data1,
            },
            messages::CHANNEL_AFTERTOUCH => MidiMessage::ChannelAftertouch {
                channel,
                pressure: self.data1,
            },
            kind => {
                debug_assert_eq!(kind, messages::PITCH_BEND);
                let value = (((data2 as i16) << 7) | self.data1 as i16) - 8192;
                MidiMessage::PitchBend { channel, value }
            }
        }
    }
}

/// Parsed MIDI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note On: channel (0-15), note (0-127), velocity (1-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },
    /// Poly Aftertouch: channel (0-15), note (0-127), pressure (0-127)
    PolyAftertouch { channel: u8, note: u8, pressure: u8 },
    /// Control Change: channel (0-15), controller (0-127), value (0-127)
    ControlChange { channel: u8, controller: u8, value: u8 },
    /// Program Change: channel (0-15), program (0-127)
    ProgramChange { channel: u8, program: u8 },
    /// Channel Aftertouch: channel (0-15), pressure (0-127)
    ChannelAftertouch { channel: u8, pressure: u8 },
    /// Pitch Bend: channel (0-15), value (-8192 to 8191)
    PitchBend { channel: u8, value: i16 },
}

// Channels print 1-based, as on the hardware.
impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch={} note={} vel={}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch={} note={} vel={}", channel + 1, note, velocity)
            }
            MidiMessage::PolyAftertouch { channel, note, pressure } => {
                write!(f, "PolyAT ch={} note={} pressure={}", channel + 1, note, pressure)
            }
            MidiMessage::ControlChange { channel, controller, value } => {
                write!(f, "CC ch={} cc={} val={}", channel + 1, controller, value)
            }
            MidiMessage::ProgramChange { channel, program } => {
                write!(f, "Program ch={} program={}", channel + 1, program)
            }
            MidiMessage::ChannelAftertouch { channel, pressure } => {
                write!(f, "ChannelAT ch={} pressure={}", channel + 1, pressure)
            }
            MidiMessage::PitchBend { channel, value } => {
                write!(f, "PitchBend ch={} value={}", channel + 1, value)
            }
        }
    }
}

/// An SMF meta event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaEvent {
    pub kind: u8,
    pub data: Vec<u8>,
}

impl MetaEvent {
    /// Set-Tempo meta event (microseconds per quarter note, 24 bits)
    pub fn tempo(micros_per_quarter: u32) -> Self {
        let bytes = micros_per_quarter.to_be_bytes();
        Self {
            kind: messages::META_SET_TEMPO,
            data: bytes[1..].to_vec(),
        }
    }

    /// End-Of-Track meta event
    pub fn end_of_track() -> Self {
        Self {
            kind: messages::META_END_OF_TRACK,
            data: Vec::new(),
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        self.kind == messages::META_END_OF_TRACK
    }

    /// Tempo carried by a well-formed Set-Tempo event
    pub fn tempo_micros(&self) -> Option<u32> {
        match (self.kind, self.data.as_slice()) {
            (messages::META_SET_TEMPO, &[a, b, c]) => Some(u32::from_be_bytes([0, a, b, c])),
            _ => None,
        }
    }
}

/// Either a channel-voice event or a meta event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackEvent {
    Midi(MidiEvent),
    Meta(MetaEvent),
}

/// An event preceded by its delta-time in ticks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub delta_ticks: u32,
    pub event: TrackEvent,
}

impl TimedEvent {
    pub fn midi(delta_ticks: u32, event: MidiEvent) -> Self {
        Self {
            delta_ticks,
            event: TrackEvent::Midi(event),
        }
    }

    pub fn meta(delta_ticks: u32, event: MetaEvent) -> Self {
        Self {
            delta_ticks,
            event: TrackEvent::Meta(event),
        }
    }

    pub fn is_end_of_track(&self) -> bool {
        matches!(&self.event, TrackEvent::Meta(meta) if meta.is_end_of_track())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Mock MIDI output for testing
    struct MockMidiOutput {
        messages: Arc<Mutex<Vec<Vec<u8>>>>,
        framing: Framing,
    }

    impl MockMidiOutput {
        fn new(framing: Framing) -> Self {
            Self {
                messages: Arc::new(Mutex::new(Vec::new())),
                framing,
            }
        }

        fn get_messages(&self) -> Vec<Vec<u8>> {
            self.messages.lock().unwrap().clone()
        }
    }

    impl MidiOutput for MockMidiOutput {
        fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError> {
            self.messages.lock().unwrap().push(self.framing.encode(event));
            Ok(())
        }
    }

    #[test]
    fn test_mock_output_serial_framing() {
        let mut output = MockMidiOutput::new(Framing::Serial);
        output.send(&MidiEvent::note_on(0, 60, 127)).unwrap();
        output.send(&MidiEvent::program_change(3, 10)).unwrap();

        let messages = output.get_messages();
        assert_eq!(messages, vec![vec![0x90, 60, 127], vec![0xC3, 10]]);
    }

    #[test]
    fn test_mock_output_usb_framing() {
        let mut output = MockMidiOutput::new(Framing::UsbPacket);
        output.send(&MidiEvent::note_on(3, 10, 64)).unwrap();
        output.send(&MidiEvent::program_change(3, 10)).unwrap();

        let messages = output.get_messages();
        assert_eq!(messages[0], vec![0x09, 0x93, 10, 64]);
        assert_eq!(messages[1], vec![0x0C, 0xC3, 10, 0]);
    }

    #[test]
    fn test_new_rejects_non_status_bytes() {
        assert!(MidiEvent::new(0x40, 1, 2).is_none());
        assert!(MidiEvent::new(0xF0, 1, 2).is_none());
        assert!(MidiEvent::new(0xFF, 1, 2).is_none());
        assert!(MidiEvent::new(0xEF, 1, 2).is_some());
    }

    #[test]
    fn test_program_change_has_one_data_byte() {
        let pc = MidiEvent::new(0xC3, 10, 99).unwrap();
        assert_eq!(pc.data2(), None);
        assert_eq!(pc.to_bytes(), vec![0xC3, 10]);

        let note = MidiEvent::new(0x93, 10, 64).unwrap();
        assert_eq!(note.data2(), Some(64));
        assert_eq!(note.to_bytes(), vec![0x93, 10, 64]);

        let pressure = MidiEvent::new(0xD0, 33, 0).unwrap();
        assert_eq!(pressure.to_bytes().len(), 2);
    }

    #[test]
    fn test_normalize_note_on_zero_velocity_every_channel() {
        for channel in 0..16u8 {
            let event = MidiEvent::note_on(channel, 60, 0).normalized();
            assert_eq!(event.status(), 0x80 | channel);
            assert_eq!(event.data2(), Some(0));
        }
        let held = MidiEvent::note_on(2, 60, 1).normalized();
        assert_eq!(held.status(), 0x92);
    }

    #[test]
    fn test_message_view_and_display() {
        let on = MidiEvent::note_on(0, 60, 100);
        assert_eq!(on.to_string_message(), "NoteOn ch=1 note=60 vel=100");

        let cc = MidiEvent::control_change(15, 7, 127);
        assert_eq!(cc.to_string_message(), "CC ch=16 cc=7 val=127");

        let bend = MidiEvent::new(0xE0, 0x00, 0x40).unwrap();
        assert_eq!(bend.message(), MidiMessage::PitchBend { channel: 0, value: 0 });
    }

    #[test]
    fn test_tempo_meta_round_trip() {
        let meta = MetaEvent::tempo(500_000);
        assert_eq!(meta.data, vec![0x07, 0xA1, 0x20]);
        assert_eq!(meta.tempo_micros(), Some(500_000));
        assert!(!meta.is_end_of_track());
        assert!(MetaEvent::end_of_track().is_end_of_track());
    }

    impl MidiEvent {
        fn to_string_message(&self) -> String {
            self.message().to_string()
        }
    }
}
