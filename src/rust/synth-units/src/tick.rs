// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::duration::{Duration, Seconds};
use crate::{Result, check_range};

/// The sequencer clock period, i.e. the smallest representable time step.
pub const TICK_DURATION: f64 = 1.0 / 153.6e6;

/// Width of the duration field of a timestamp instruction.
pub const TICK_BITS: u32 = 48;

pub const MAX_TICKS: u64 = (1 << TICK_BITS) - 1;

/// Longest duration a single timestamp can hold, in seconds.
pub const MAX_DURATION: f64 = TICK_DURATION * MAX_TICKS as f64;

/// Convert a duration into sequencer ticks, rounding to the nearest tick.
pub fn duration_to_ticks(duration: Duration<Seconds>) -> Result<u64> {
    let t = duration.value();
    check_range("Time step", "s", t, 0.0, MAX_DURATION)?;
    Ok(((t / TICK_DURATION).round() as u64).min(MAX_TICKS))
}
