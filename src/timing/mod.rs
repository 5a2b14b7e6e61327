// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timing module.
//!
//! Tempo, tick conversion and the clock abstraction shared by the
//! capture and playback engines.

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock, Tempo, TickConverter, DEFAULT_MICROS_PER_QUARTER};
