// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::hash::{Hash, Hasher};

use synth_units::MAX_FREQUENCY;

use crate::types::{Channel, ChannelKind};
use crate::{Error, Result};

/// Settings applied to an RF channel.
///
/// Fields that are `None` keep their previous value on the hardware.
/// `lo_offset` is the frequency of the external local oscillator. It is not
/// programmed into the synthesizer, the synthesizer outputs the intermediate
/// frequency `frequency - lo_offset`.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnalogUpdate {
    frequency: Option<f64>,
    phase: Option<f64>,
    amplitude: Option<f64>,
    lo_offset: f64,
}

impl AnalogUpdate {
    pub fn builder() -> AnalogUpdateBuilder {
        AnalogUpdateBuilder {
            update: AnalogUpdate::default(),
        }
    }

    /// Frequency in Hertz, including the LO offset.
    pub fn frequency(&self) -> Option<f64> {
        self.frequency
    }

    /// Frequency generated by the synthesizer itself.
    pub fn intermediate_frequency(&self) -> Option<f64> {
        self.frequency.map(|f| f - self.lo_offset)
    }

    /// Phase in radians.
    pub fn phase(&self) -> Option<f64> {
        self.phase
    }

    /// Amplitude as a fraction of full scale.
    pub fn amplitude(&self) -> Option<f64> {
        self.amplitude
    }

    pub fn lo_offset(&self) -> f64 {
        self.lo_offset
    }

    fn validate(&self) -> Result<()> {
        if !self.lo_offset.is_finite() {
            return Err(Error::InvalidArgument(format!(
                "LO offset must be a finite number, got {}",
                self.lo_offset
            )));
        }
        if let Some(frequency) = self.intermediate_frequency()
            && !(0.0..=MAX_FREQUENCY).contains(&frequency)
        {
            return Err(synth_units::Error::OutOfRange {
                quantity: "Frequency minus LO offset",
                unit: "Hz",
                value: frequency,
                min: 0.0,
                max: MAX_FREQUENCY,
            }
            .into());
        }
        if let Some(phase) = self.phase
            && !phase.is_finite()
        {
            return Err(synth_units::Error::NotFinite {
                quantity: "Phase",
                value: phase,
            }
            .into());
        }
        if let Some(amplitude) = self.amplitude
            && !(0.0..=1.0).contains(&amplitude)
        {
            return Err(synth_units::Error::OutOfRange {
                quantity: "Amplitude",
                unit: "of full scale",
                value: amplitude,
                min: 0.0,
                max: 1.0,
            }
            .into());
        }
        Ok(())
    }

    fn key(&self) -> [Option<u64>; 4] {
        fn bits(value: f64) -> u64 {
            if value == 0.0 { 0 } else { value.to_bits() }
        }
        [
            self.frequency.map(bits),
            self.phase.map(bits),
            self.amplitude.map(bits),
            Some(bits(self.lo_offset)),
        ]
    }
}

// Validation rejects NaN, so bitwise comparison is a proper equivalence.
impl PartialEq for AnalogUpdate {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for AnalogUpdate {}

impl Hash for AnalogUpdate {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

pub struct AnalogUpdateBuilder {
    update: AnalogUpdate,
}

impl AnalogUpdateBuilder {
    pub fn frequency(mut self, frequency: f64) -> Self {
        self.update.frequency = Some(frequency);
        self
    }

    pub fn phase(mut self, phase: f64) -> Self {
        self.update.phase = Some(phase);
        self
    }

    pub fn amplitude(mut self, amplitude: f64) -> Self {
        self.update.amplitude = Some(amplitude);
        self
    }

    pub fn lo_offset(mut self, lo_offset: f64) -> Self {
        self.update.lo_offset = lo_offset;
        self
    }

    pub fn build(self) -> Result<AnalogUpdate> {
        self.update.validate()?;
        Ok(self.update)
    }
}

/// Level of a digital channel, `None` keeps the previous level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DigitalUpdate {
    pub value: Option<bool>,
}

impl DigitalUpdate {
    pub fn new(value: bool) -> Self {
        DigitalUpdate { value: Some(value) }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Update {
    Analog(AnalogUpdate),
    Digital(DigitalUpdate),
}

impl Update {
    /// Check that the update kind fits the channel it is applied to.
    pub(crate) fn validate_for(&self, channel: Channel) -> Result<()> {
        match (channel.kind(), self) {
            (ChannelKind::Rf, Update::Analog(_)) | (ChannelKind::Digital, Update::Digital(_)) => {
                Ok(())
            }
            (ChannelKind::Rf, Update::Digital(_)) => Err(Error::UpdateKindMismatch {
                channel,
                expected: "an analog",
            }),
            (ChannelKind::Digital, Update::Analog(_)) => Err(Error::UpdateKindMismatch {
                channel,
                expected: "a digital",
            }),
        }
    }
}

impl From<AnalogUpdate> for Update {
    fn from(update: AnalogUpdate) -> Self {
        Update::Analog(update)
    }
}

impl From<DigitalUpdate> for Update {
    fn from(update: DigitalUpdate) -> Self {
        Update::Digital(update)
    }
}

impl From<bool> for Update {
    fn from(value: bool) -> Self {
        Update::Digital(DigitalUpdate::new(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analog_update_valid() {
        let update = AnalogUpdate::builder()
            .frequency(80e6)
            .phase(-7.0)
            .amplitude(0.5)
            .lo_offset(10e6)
            .build()
            .unwrap();
        assert_eq!(update.frequency(), Some(80e6));
        assert_eq!(update.intermediate_frequency(), Some(70e6));
        assert_eq!(update.phase(), Some(-7.0));
        assert_eq!(update.amplitude(), Some(0.5));
    }

    #[test]
    fn test_frequency_range_uses_lo_offset() {
        assert!(AnalogUpdate::builder().frequency(-1.0).build().is_err());
        assert!(
            AnalogUpdate::builder()
                .frequency(MAX_FREQUENCY + 1e6)
                .build()
                .is_err()
        );
        // Above the synthesizer range on its own, but within it once the LO is subtracted
        assert!(
            AnalogUpdate::builder()
                .frequency(MAX_FREQUENCY + 1e6)
                .lo_offset(2e6)
                .build()
                .is_ok()
        );
        // Below the LO frequency
        assert!(
            AnalogUpdate::builder()
                .frequency(1e6)
                .lo_offset(2e6)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_amplitude_and_phase_range() {
        assert!(AnalogUpdate::builder().amplitude(1.5).build().is_err());
        assert!(AnalogUpdate::builder().amplitude(-0.1).build().is_err());
        assert!(AnalogUpdate::builder().phase(f64::NAN).build().is_err());
        assert!(AnalogUpdate::builder().lo_offset(f64::INFINITY).build().is_err());
    }

    #[test]
    fn test_update_kind_must_match_channel() {
        let analog: Update = AnalogUpdate::builder().amplitude(1.0).build().unwrap().into();
        let digital: Update = true.into();
        assert!(analog.validate_for(Channel::rf(0).unwrap()).is_ok());
        assert!(digital.validate_for(Channel::digital(3).unwrap()).is_ok());
        assert!(matches!(
            analog.validate_for(Channel::digital(0).unwrap()),
            Err(Error::UpdateKindMismatch { .. })
        ));
        assert!(matches!(
            digital.validate_for(Channel::rf(1).unwrap()),
            Err(Error::UpdateKindMismatch { .. })
        ));
    }

    #[test]
    fn test_equality_is_structural() {
        let a = AnalogUpdate::builder().frequency(1e6).build().unwrap();
        let b = AnalogUpdate::builder().frequency(1e6).build().unwrap();
        let c = AnalogUpdate::builder().frequency(1e6).phase(0.0).build().unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
