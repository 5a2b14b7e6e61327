// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Reassembly of raw transport bytes into channel-voice events.
//!
//! Two framings are supported:
//! - a serial MIDI byte stream, where the status byte may be omitted for
//!   consecutive messages of the same type (running status)
//! - USB-MIDI bulk transfers made of fixed 4-byte packets

use super::{data_len, messages, Framing, MidiEvent};

/// Running-status reassembler for a serial MIDI stream
#[derive(Debug, Clone, Default)]
pub struct EventAssembler {
    /// Last channel-voice status seen
    running_status: Option<u8>,
    /// Data bytes collected for the current message
    pending: [u8; 2],
    /// Number of valid bytes in `pending`
    pending_len: usize,
}

impl EventAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current running status, if any
    pub fn running_status(&self) -> Option<u8> {
        self.running_status
    }

    /// Feed one byte; returns an event when a message completes
    pub fn push(&mut self, byte: u8) -> Option<MidiEvent> {
        if byte >= messages::REALTIME_FIRST {
            // Real-time bytes may interleave anywhere and leave state alone.
            return None;
        }

        if byte & 0x80 != 0 {
            self.pending_len = 0;
            self.running_status = (byte < messages::SYSEX_START).then_some(byte);
            return None;
        }

        let status = self.running_status?;
        let needed = data_len(status);
        if self.pending_len < needed {
            self.pending[self.pending_len] = byte;
            self.pending_len += 1;
        }
        if self.pending_len < needed {
            return None;
        }

        self.pending_len = 0;
        MidiEvent::new(status, self.pending[0], self.pending[1]).map(MidiEvent::normalized)
    }

    /// Feed a run of bytes, appending completed events to `out`
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<MidiEvent>) {
        out.extend(bytes.iter().filter_map(|&byte| self.push(byte)));
    }
}

/// Demultiplexer for 4-byte USB-MIDI packets.
///
/// A packet split across two transport reads is held until it completes.
#[derive(Debug, Clone, Copy, Default)]
pub struct PacketDecoder {
    pending: [u8; 4],
    pending_len: usize,
}

impl PacketDecoder {
    /// Packet size in bytes
    pub const PACKET_LEN: usize = 4;

    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one `{cin, status, data1, data2}` packet.
    ///
    /// Only channel-voice code indices (0x8-0xE) yield events.
    pub fn decode(packet: [u8; 4]) -> Option<MidiEvent> {
        let cin = packet[0] & 0x0F;
        if !(0x8..=0xE).contains(&cin) {
            return None;
        }
        MidiEvent::new(packet[1], packet[2], packet[3]).map(MidiEvent::normalized)
    }

    /// Bytes of an incomplete packet carried over from the last feed
    pub fn pending_len(&self) -> usize {
        self.pending_len
    }

    /// Decode every packet completed by `bytes`, appending events to `out`
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<MidiEvent>) {
        for &byte in bytes {
            self.pending[self.pending_len] = byte;
            self.pending_len += 1;
            if self.pending_len == Self::PACKET_LEN {
                self.pending_len = 0;
                out.extend(Self::decode(self.pending));
            }
        }
    }
}

/// Decoder for whichever framing the transport uses
#[derive(Debug, Clone)]
pub enum InboundDecoder {
    Serial(EventAssembler),
    UsbPacket(PacketDecoder),
}

impl InboundDecoder {
    pub fn new(framing: Framing) -> Self {
        match framing {
            Framing::Serial => InboundDecoder::Serial(EventAssembler::new()),
            Framing::UsbPacket => InboundDecoder::UsbPacket(PacketDecoder::new()),
        }
    }

    /// Feed raw transport bytes, appending completed events to `out`
    pub fn feed(&mut self, bytes: &[u8], out: &mut Vec<MidiEvent>) {
        match self {
            InboundDecoder::Serial(assembler) => assembler.feed(bytes, out),
            InboundDecoder::UsbPacket(decoder) => decoder.feed(bytes, out),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assemble(bytes: &[u8]) -> Vec<MidiEvent> {
        let mut assembler = EventAssembler::new();
        let mut out = Vec::new();
        assembler.feed(bytes, &mut out);
        out
    }

    #[test]
    fn test_complete_messages() {
        let events = assemble(&[0x90, 60, 100, 0xB1, 7, 90]);
        assert_eq!(
            events,
            vec![MidiEvent::note_on(0, 60, 100), MidiEvent::control_change(1, 7, 90)]
        );
    }

    #[test]
    fn test_running_status() {
        let events = assemble(&[0x92, 60, 100, 62, 101, 64, 102]);
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.status() == 0x92));
        assert_eq!(events[2].data1(), 64);
    }

    #[test]
    fn test_split_across_reads() {
        let mut assembler = EventAssembler::new();
        let mut out = Vec::new();
        assembler.feed(&[0x90], &mut out);
        assembler.feed(&[60], &mut out);
        assert!(out.is_empty());
        assembler.feed(&[100, 61], &mut out);
        assert_eq!(out, vec![MidiEvent::note_on(0, 60, 100)]);
        assembler.feed(&[90], &mut out);
        assert_eq!(out[1], MidiEvent::note_on(0, 61, 90));
    }

    #[test]
    fn test_program_change_needs_one_byte() {
        let events = assemble(&[0xC3, 10, 11]);
        assert_eq!(
            events,
            vec![MidiEvent::program_change(3, 10), MidiEvent::program_change(3, 11)]
        );
        assert_eq!(events[0].to_bytes(), vec![0xC3, 10]);
    }

    #[test]
    fn test_note_on_zero_velocity_becomes_note_off() {
        for channel in 0..16u8 {
            let events = assemble(&[0x90 | channel, 60, 0]);
            assert_eq!(events.len(), 1);
            assert_eq!(events[0].status(), 0x80 | channel);
        }
    }

    #[test]
    fn test_running_status_survives_normalization() {
        // Release via velocity 0 must not change the running status to 0x80.
        let events = assemble(&[0x90, 60, 100, 60, 0, 62, 90]);
        assert_eq!(events[1].status(), 0x80);
        assert_eq!(events[2], MidiEvent::note_on(0, 62, 90));
    }

    #[test]
    fn test_new_status_discards_partial_message() {
        let events = assemble(&[0x90, 60, 0xB0, 7, 100]);
        assert_eq!(events, vec![MidiEvent::control_change(0, 7, 100)]);
    }

    #[test]
    fn test_data_without_status_is_dropped() {
        assert!(assemble(&[60, 100, 61]).is_empty());
    }

    #[test]
    fn test_realtime_bytes_do_not_disturb() {
        let events = assemble(&[0x90, 60, 0xF8, 100, 0xFE, 61, 0xF8, 90]);
        assert_eq!(
            events,
            vec![MidiEvent::note_on(0, 60, 100), MidiEvent::note_on(0, 61, 90)]
        );
    }

    #[test]
    fn test_system_common_clears_running_status() {
        let mut assembler = EventAssembler::new();
        let mut out = Vec::new();
        assembler.feed(&[0x90, 60, 100, 0xF0, 0x7E, 0x01, 0xF7, 61, 90], &mut out);
        assert_eq!(out.len(), 1);
        assert_eq!(assembler.running_status(), None);
    }

    #[test]
    fn test_packet_decoder() {
        let mut decoder = PacketDecoder::new();
        let mut out = Vec::new();
        decoder.feed(
            &[
                0x09, 0x93, 10, 64, // note on ch 3
                0x0C, 0xC3, 10, 0, // program change ch 3
                0x0F, 0xF8, 0, 0, // real-time clock, ignored
                0x09, 0x90, 60, 0, // release via velocity 0
                0x08, 0x80, // trailing partial packet
            ],
            &mut out,
        );
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].to_bytes(), vec![0x93, 10, 64]);
        assert_eq!(out[1].to_bytes(), vec![0xC3, 10]);
        assert_eq!(out[2].status(), 0x80);
        assert_eq!(decoder.pending_len(), 2);
    }

    #[test]
    fn test_packet_split_across_reads() {
        let mut decoder = PacketDecoder::new();
        let mut out = Vec::new();
        decoder.feed(&[0x09, 0x90, 60], &mut out);
        assert!(out.is_empty());
        decoder.feed(&[100, 0x08, 0x80], &mut out);
        assert_eq!(out, vec![MidiEvent::note_on(0, 60, 100)]);
        decoder.feed(&[60], &mut out);
        decoder.feed(&[0], &mut out);
        assert_eq!(out[1], MidiEvent::note_off(0, 60, 0));
        assert_eq!(decoder.pending_len(), 0);
    }

    #[test]
    fn test_inbound_decoder_selects_framing() {
        let mut out = Vec::new();
        InboundDecoder::new(Framing::Serial).feed(&[0x90, 60, 100], &mut out);
        InboundDecoder::new(Framing::UsbPacket).feed(&[0x09, 0x90, 61, 100], &mut out);
        assert_eq!(
            out,
            vec![MidiEvent::note_on(0, 60, 100), MidiEvent::note_on(0, 61, 100)]
        );
    }
}
