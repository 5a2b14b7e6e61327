// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! midir backend for port-based MIDI I/O.
//!
//! midir hands over complete messages, so input is always treated as a
//! serial byte stream and output never uses USB packet framing.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::Duration;

use anyhow::{anyhow, Result};
use midir::{Ignore, MidiInputConnection, MidiOutputConnection};

use super::{MidiEvent, MidiInputPort, MidiOutput};
use crate::error::TransportError;

const CLIENT_NAME: &str = "smfbridge";

/// List available MIDI input and output ports
pub fn list_ports() -> Result<(Vec<String>, Vec<String>)> {
    let input = midir::MidiInput::new(CLIENT_NAME)
        .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
    let output = midir::MidiOutput::new(CLIENT_NAME)
        .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;

    let inputs = input
        .ports()
        .iter()
        .map(|port| input.port_name(port).unwrap_or_else(|_| "<unknown>".into()))
        .collect();
    let outputs = output
        .ports()
        .iter()
        .map(|port| output.port_name(port).unwrap_or_else(|_| "<unknown>".into()))
        .collect();
    Ok((inputs, outputs))
}

/// Print available ports to stdout
pub fn print_ports() -> Result<()> {
    let (inputs, outputs) = list_ports()?;
    println!("MIDI inputs:");
    for (i, name) in inputs.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    println!("MIDI outputs:");
    for (i, name) in outputs.iter().enumerate() {
        println!("  {}: {}", i, name);
    }
    Ok(())
}

/// Input port connected through midir
pub struct MidirInput {
    _connection: MidiInputConnection<()>,
    receiver: Receiver<Vec<u8>>,
    leftover: Vec<u8>,
}

impl MidirInput {
    /// Connect to the input port at `index`
    pub fn new(index: usize) -> Result<Self> {
        let mut input = midir::MidiInput::new(CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;
        input.ignore(Ignore::All);

        let ports = input.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| anyhow!("MIDI source {} not found ({} available)", index, ports.len()))?;

        let (tx, rx) = mpsc::channel();
        let connection = input
            .connect(
                port,
                "smfbridge-in",
                move |_stamp, message, _| {
                    let _ = tx.send(message.to_vec());
                },
                (),
            )
            .map_err(|e| anyhow!("Failed to connect to source: {}", e))?;

        Ok(Self {
            _connection: connection,
            receiver: rx,
            leftover: Vec::new(),
        })
    }
}

impl MidiInputPort for MidirInput {
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        if self.leftover.is_empty() {
            self.leftover = match self.receiver.recv_timeout(timeout) {
                Ok(message) => message,
                Err(RecvTimeoutError::Timeout) => return Err(TransportError::Timeout),
                Err(RecvTimeoutError::Disconnected) => return Err(TransportError::Disconnected),
            };
        }
        let n = self.leftover.len().min(buf.len());
        buf[..n].copy_from_slice(&self.leftover[..n]);
        self.leftover.drain(..n);
        Ok(n)
    }
}

/// Output port connected through midir
pub struct MidirOutput {
    connection: MidiOutputConnection,
}

impl MidirOutput {
    /// Connect to the output port at `index`
    pub fn new(index: usize) -> Result<Self> {
        let output = midir::MidiOutput::new(CLIENT_NAME)
            .map_err(|e| anyhow!("Failed to create MIDI client: {}", e))?;

        let ports = output.ports();
        let port = ports.get(index).ok_or_else(|| {
            anyhow!("MIDI destination {} not found ({} available)", index, ports.len())
        })?;

        let connection = output
            .connect(port, "smfbridge-out")
            .map_err(|e| anyhow!("Failed to connect to destination: {}", e))?;
        Ok(Self { connection })
    }
}

impl MidiOutput for MidirOutput {
    fn send(&mut self, event: &MidiEvent) -> Result<(), TransportError> {
        self.connection
            .send(&event.to_bytes())
            .map_err(|e| TransportError::Backend(format!("Failed to send MIDI message: {}", e)))
    }
}
