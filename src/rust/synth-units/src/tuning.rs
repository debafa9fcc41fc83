// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Tuning-word conversions for the RF outputs.
use std::f64::consts::TAU;

use num_traits::{FromPrimitive, PrimInt, Unsigned};

use crate::{Result, check_range};

/// Highest output frequency of the synthesizer in Hertz.
pub const MAX_FREQUENCY: f64 = 307.2e6;
pub const FREQUENCY_BITS: u32 = 32;
pub const PHASE_BITS: u32 = 12;
pub const AMPLITUDE_BITS: u32 = 16;

/// Scale a fraction in `[0, 1]` onto the full range of a `bits` wide word.
fn quantize<T>(fraction: f64, bits: u32) -> T
where
    T: PrimInt + Unsigned + FromPrimitive,
{
    let full_scale = ((1u64 << bits) - 1) as f64;
    let max = T::from_f64(full_scale).unwrap_or_else(T::max_value);
    T::from_f64((fraction * full_scale).round()).map_or(max, |word| word.min(max))
}

/// Convert a frequency in Hertz to a 32-bit frequency tuning word.
pub fn frequency_to_ftw(frequency: f64) -> Result<u32> {
    check_range("Frequency", "Hz", frequency, 0.0, MAX_FREQUENCY)?;
    Ok(quantize(frequency / MAX_FREQUENCY, FREQUENCY_BITS))
}

/// Convert an amplitude relative to full scale to a 16-bit amplitude tuning word.
pub fn amplitude_to_atw(amplitude: f64) -> Result<u16> {
    check_range("Amplitude", "of full scale", amplitude, 0.0, 1.0)?;
    Ok(quantize(amplitude, AMPLITUDE_BITS))
}

/// Convert a phase in radians to a 12-bit phase tuning word.
///
/// Any finite phase is accepted, it is wrapped into `[0, 2π)` first.
pub fn phase_to_ptw(phase: f64) -> Result<u16> {
    check_range("Phase", "rad", phase, f64::MIN, f64::MAX)?;
    let wrapped = phase.rem_euclid(TAU);
    Ok(quantize(wrapped / TAU, PHASE_BITS))
}
