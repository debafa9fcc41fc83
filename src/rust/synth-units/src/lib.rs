// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Physical units and the numeric contract of the synthesizer sequencer.
//!
//! All quantities that cross the wire to the board are fixed-width integers
//! ("tuning words"). The conversions in [`tuning`] and [`tick`] validate
//! their input range first and round to nearest afterwards; they never clamp.

pub mod duration;
pub mod exact;
pub mod tick;
pub mod tuning;

pub use duration::{Duration, Seconds, seconds};
pub use exact::ExactDuration;
pub use tick::{MAX_DURATION, TICK_BITS, TICK_DURATION, duration_to_ticks};
pub use tuning::{
    AMPLITUDE_BITS, FREQUENCY_BITS, MAX_FREQUENCY, PHASE_BITS, amplitude_to_atw,
    frequency_to_ftw, phase_to_ptw,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{quantity} of {value} {unit} outside valid range of {min} to {max} {unit}")]
    OutOfRange {
        quantity: &'static str,
        unit: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{quantity} must be a finite number, got {value}")]
    NotFinite { quantity: &'static str, value: f64 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Check that `value` is finite and lies within `[min, max]`.
pub(crate) fn check_range(
    quantity: &'static str,
    unit: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<()> {
    if !value.is_finite() {
        return Err(Error::NotFinite { quantity, value });
    }
    if value < min || value > max {
        return Err(Error::OutOfRange {
            quantity,
            unit,
            value,
            min,
            max,
        });
    }
    Ok(())
}
