// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Capture and playback engines.
//!
//! This module provides:
//! - live capture from a transport into an SMF track
//! - single-pass and looping playback of a track to a transport
//! - cooperative cancellation shared by both

pub mod cancel;
pub mod capture;
pub mod playback;

pub use cancel::{sleep_cancellable, CancelToken};
pub use capture::{CaptureEngine, CaptureSettings, CaptureState, CaptureSummary};
pub use playback::{PlaybackEngine, PlaybackMode, PlaybackSettings, PlaybackState, PlaybackSummary, TrackEnd};
