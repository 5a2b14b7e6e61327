// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Configuration for the bridge.
//!
//! Every field has a default, so an empty file (or no file at all) gives
//! 480 ppq at a fixed 120 BPM over a serial byte stream.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::engine::{CaptureSettings, PlaybackMode, PlaybackSettings};
use crate::error::BridgeError;
use crate::midi::Framing;
use crate::smf::DEFAULT_PPQ;
use crate::timing::Tempo;

/// Bridge configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Ticks per quarter note for captured files
    pub ppq: u16,
    /// Fixed tempo used on both paths
    pub tempo_bpm: f64,
    /// Transport framing
    pub framing: Framing,
    /// Bounded wait per transport read
    pub read_timeout_ms: u64,
    /// Bytes requested per transport read
    pub read_buffer_size: usize,
    /// Pause between passes in loop playback
    pub loop_wait_ms: u64,
    /// Longest sleep before cancellation is checked again
    pub cancel_poll_ms: u64,
    /// Follow Set-Tempo events in played files
    pub honor_file_tempo: bool,
}

fn default_tempo() -> f64 {
    120.0
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            ppq: DEFAULT_PPQ,
            tempo_bpm: default_tempo(),
            framing: Framing::Serial,
            read_timeout_ms: 1000,
            read_buffer_size: 64,
            loop_wait_ms: 1000,
            cancel_poll_ms: 20,
            honor_file_tempo: false,
        }
    }
}

impl BridgeConfig {
    /// Load from a `.toml`, `.yaml` or `.yml` file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&contents)?,
            _ => Self::from_yaml(&contents)?,
        };
        config
            .validate()
            .with_context(|| format!("Invalid config file: {:?}", path))?;
        Ok(config)
    }

    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse YAML configuration")
    }

    /// Parse from TOML
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).context("Failed to parse TOML configuration")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize configuration to YAML")
    }

    /// Check value ranges
    pub fn validate(&self) -> std::result::Result<(), BridgeError> {
        if self.ppq == 0 || self.ppq >= 0x8000 {
            return Err(BridgeError::Config(format!(
                "ppq must be between 1 and 32767, got {}",
                self.ppq
            )));
        }
        if !(1.0..=1000.0).contains(&self.tempo_bpm) {
            return Err(BridgeError::Config(format!(
                "tempo_bpm must be between 1 and 1000, got {}",
                self.tempo_bpm
            )));
        }
        if self.read_buffer_size == 0 {
            return Err(BridgeError::Config("read_buffer_size must be non-zero".into()));
        }
        Ok(())
    }

    pub fn tempo(&self) -> Tempo {
        Tempo::from_bpm(self.tempo_bpm)
    }

    /// Settings for a capture session
    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            ppq: self.ppq,
            tempo: self.tempo(),
            framing: self.framing,
            read_timeout: Duration::from_millis(self.read_timeout_ms),
            read_buffer_size: self.read_buffer_size,
        }
    }

    /// Settings for a playback session
    pub fn playback_settings(&self, mode: PlaybackMode) -> PlaybackSettings {
        PlaybackSettings {
            mode,
            loop_wait: Duration::from_millis(self.loop_wait_ms),
            cancel_poll: Duration::from_millis(self.cancel_poll_ms),
            tempo: self.tempo(),
            honor_file_tempo: self.honor_file_tempo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = BridgeConfig::default();
        assert_eq!(config.ppq, 480);
        assert_eq!(config.tempo().micros_per_quarter(), 500_000);
        assert!(config.validate().is_ok());

        let capture = config.capture_settings();
        assert_eq!(capture.read_timeout, Duration::from_secs(1));
        let playback = config.playback_settings(PlaybackMode::Loop);
        assert_eq!(playback.loop_wait, Duration::from_secs(1));
        assert_eq!(playback.mode, PlaybackMode::Loop);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = BridgeConfig::from_yaml("tempo_bpm: 90\nframing: usb-packet\n").unwrap();
        assert_eq!(config.tempo_bpm, 90.0);
        assert_eq!(config.framing, Framing::UsbPacket);
        assert_eq!(config.ppq, 480);
        assert_eq!(config.loop_wait_ms, 1000);
    }

    #[test]
    fn test_empty_yaml() {
        assert_eq!(BridgeConfig::from_yaml("  \n").unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_toml() {
        let config = BridgeConfig::from_toml("ppq = 96\nhonor_file_tempo = true\n").unwrap();
        assert_eq!(config.ppq, 96);
        assert!(config.honor_file_tempo);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = BridgeConfig {
            loop_wait_ms: 250,
            ..BridgeConfig::default()
        };
        let yaml = config.to_yaml().unwrap();
        assert_eq!(BridgeConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_ppq = BridgeConfig { ppq: 0, ..BridgeConfig::default() };
        assert!(bad_ppq.validate().is_err());

        let smpte = BridgeConfig { ppq: 0xE728, ..BridgeConfig::default() };
        assert!(smpte.validate().is_err());

        let bad_tempo = BridgeConfig { tempo_bpm: 0.0, ..BridgeConfig::default() };
        assert!(bad_tempo.validate().is_err());

        let bad_buffer = BridgeConfig { read_buffer_size: 0, ..BridgeConfig::default() };
        assert!(bad_buffer.validate().is_err());
    }

    #[test]
    fn test_load_by_extension() {
        let dir = tempdir().unwrap();

        let yaml_path = dir.path().join("bridge.yaml");
        fs::write(&yaml_path, "ppq: 960\n").unwrap();
        assert_eq!(BridgeConfig::load(&yaml_path).unwrap().ppq, 960);

        let toml_path = dir.path().join("bridge.toml");
        fs::write(&toml_path, "tempo_bpm = 140.0\n").unwrap();
        assert_eq!(BridgeConfig::load(&toml_path).unwrap().tempo_bpm, 140.0);
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempdir().unwrap();

        let broken = dir.path().join("broken.yaml");
        fs::write(&broken, "this is not valid yaml: [").unwrap();
        assert!(BridgeConfig::load(&broken).is_err());

        let out_of_range = dir.path().join("range.yaml");
        fs::write(&out_of_range, "tempo_bpm: 5000\n").unwrap();
        assert!(BridgeConfig::load(&out_of_range).is_err());

        assert!(BridgeConfig::load(dir.path().join("missing.yaml")).is_err());
    }
}
