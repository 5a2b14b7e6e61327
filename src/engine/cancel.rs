// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::timing::Clock;

/// Shared stop flag, set from anywhere and polled by the engines
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request a stop
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Sleep for `duration` in slices of at most `slice`, checking `token`
/// between slices.
///
/// Returns `false` if the sleep was cut short by cancellation.
pub fn sleep_cancellable<C: Clock + ?Sized>(
    clock: &C,
    duration: Duration,
    slice: Duration,
    token: &CancelToken,
) -> bool {
    let slice = slice.max(Duration::from_millis(1));
    let mut remaining = duration;
    while !remaining.is_zero() {
        if token.is_cancelled() {
            return false;
        }
        let step = remaining.min(slice);
        clock.sleep(step);
        remaining -= step;
    }
    !token.is_cancelled()
}
