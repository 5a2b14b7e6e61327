// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Raw device-node transport.
//!
//! Reads and writes MIDI bytes through a character device such as
//! `/dev/snd/midiC1D0` or `/dev/midi1`. Blocking reads happen on a
//! background thread that forwards chunks over a channel, which gives
//! `read` a timeout without platform-specific polling.

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use super::{Framing, MidiEvent, MidiInputPort, MidiOutput};
use crate::error::TransportError;

const READ_CHUNK: usize = 256;

/// Byte input fed by a background reader thread
pub struct DeviceInput {
    receiver: Receiver<Vec<u8>>,
    /// Bytes received but not yet handed to the caller
    leftover: Vec<u8>,
}

impl DeviceInput {
    /// Open a device node for reading
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, TransportError> {
        let file = File::open(path.as_ref())?;
        debug!(device = %path.as_ref().display(), "opened MIDI input device");
        Ok(Self::from_reader(file))
    }

    /// Wrap any blocking reader
    pub fn from_reader<R: Read + Send + 'static>(mut reader: R) -> Self {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let mut buf = [0u8; READ_CHUNK];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                    Err(e) => {
                        warn!("MIDI input device read failed: {}", e);
                        break;
                    }
                }
            }
        });

        Self {
            receiver: rx,
            leftover: Vec::new(),
        }
    }

    fn drain_into(&mut self, buf: &mut [u8]) -> usize {
        let n = self.leftover.len().min(buf.len());
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.drain(..n);
        n
    }
}

impl MidiInputPort for DeviceInput {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        if buf.is_empty() {
            return Ok(0);
        }
        if !self.leftover.is_empty() {
            return Ok(self.drain_into(buf));
        }

        match self.receiver.recv_timeout(timeout) {
            Ok(chunk) => {
                self.leftover = chunk;
                Ok(self.drain_into(buf))
            }
            Err(RecvTimeoutError::Timeout) => Err(TransportError::Timeout),
            Err(RecvTimeoutError::Disconnected) => Err(TransportError::Disconnected),
        }
    }
}

/// Event output to a device node
pub struct DeviceOutput<W: Write + Send = File> {
    writer: W,
    framing: Framing,
}

impl DeviceOutput<File> {
    /// Open a device node for writing
    pub fn open<P: AsRef<Path>>(path: P, framing: Framing) -> Result<Self, TransportError> {
        let file = OpenOptions::new().write(true).open(path.as_ref())?;
        debug!(device = %path.as_ref().display(), ?framing, "opened MIDI output device");
        Ok(Self::new(file, framing))
    }
}

impl<W: Write + Send> DeviceOutput<W> {
    pub fn new(writer: W, framing: Framing) -> Self {
        Self { writer, framing }
    }

    /// Consume the output, returning the writer
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write + Send> MidiOutput for DeviceOutput<W> {
    fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError> {
        self.writer.write_all(&self.framing.encode(event))?;
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_input_delivers_then_disconnects() {
        let mut input = DeviceInput::from_reader(Cursor::new(vec![0x90, 60, 100]));
        let mut buf = [0u8; 64];

        let n = input.read(&mut buf, Duration::from_secs(2)).unwrap();
        assert_eq!(&buf[..n], &[0x90, 60, 100]);

        let err = input.read(&mut buf, Duration::from_secs(2)).unwrap_err();
        assert!(matches!(err, TransportError::Disconnected));
    }

    #[test]
    fn test_small_buffer_keeps_leftover() {
        let mut input = DeviceInput::from_reader(Cursor::new(vec![1, 2, 3, 4, 5]));
        let mut buf = [0u8; 2];
        let mut collected = Vec::new();

        while collected.len() < 5 {
            let n = input.read(&mut buf, Duration::from_secs(2)).unwrap();
            collected.extend_from_slice(&buf[..n]);
        }
        assert_eq!(collected, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_timeout_when_idle() {
        // A reader that never produces data keeps the channel open.
        struct Silent;
        impl Read for Silent {
            fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
                thread::sleep(Duration::from_secs(5));
                Ok(0)
            }
        }

        let mut input = DeviceInput::from_reader(Silent);
        let mut buf = [0u8; 4];
        let err = input.read(&mut buf, Duration::from_millis(20)).unwrap_err();
        assert!(matches!(err, TransportError::Timeout));
    }

    #[test]
    fn test_output_framing() {
        let mut serial = DeviceOutput::new(Vec::new(), Framing::Serial);
        serial.send(&MidiEvent::program_change(3, 10)).unwrap();
        serial.send(&MidiEvent::note_on(3, 10, 64)).unwrap();
        assert_eq!(serial.into_inner(), vec![0xC3, 10, 0x93, 10, 64]);

        let mut usb = DeviceOutput::new(Vec::new(), Framing::UsbPacket);
        usb.send(&MidiEvent::note_off(0, 60, 0)).unwrap();
        assert_eq!(usb.into_inner(), vec![0x08, 0x80, 60, 0]);
    }
}
