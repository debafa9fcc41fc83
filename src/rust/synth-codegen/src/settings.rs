// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Module for defining settings for the sequence compiler.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use synth_sequence::{Channel, ChannelSet};

use crate::instruction::{COUNTER_COUNT, INSTRUCTION_ADDRESS_BITS};
use crate::ir::Address;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct SanitizationChange {
    pub field: String,
    pub original: String,
    pub sanitized: String,
    pub reason: String,
}

/// Settings of the sequence compiler.
///
/// Every channel group is compiled into its own program for the board
/// driving the group's RF channel. Missing fields take their defaults when
/// deserializing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompilerSettings {
    pub channel_groups: IndexMap<String, Vec<Channel>>,
    /// Number of loop counters the compiler may use.
    pub counter_count: u8,
    /// Width of the instruction addresses the compiler may use.
    pub address_bits: u32,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        let channel_groups = Channel::rf_channels()
            .map(|rf| {
                let name = if rf.index() == 0 {
                    format!("{rf}D")
                } else {
                    rf.to_string()
                };
                let channels = std::iter::once(rf)
                    .chain(Channel::digital_channels())
                    .collect();
                (name, channels)
            })
            .collect();
        CompilerSettings {
            channel_groups,
            counter_count: COUNTER_COUNT,
            address_bits: INSTRUCTION_ADDRESS_BITS,
        }
    }
}

impl CompilerSettings {
    /// Load settings from JSON and sanitize them.
    pub fn from_json(json: &str) -> Result<Self> {
        let mut settings: CompilerSettings =
            serde_json::from_str(json).map_err(|e| Error::Settings(e.to_string()))?;
        for change in settings.sanitize()? {
            synth_log::warn!(
                "Setting '{}' changed from {} to {}: {}",
                change.field,
                change.original,
                change.sanitized,
                change.reason
            );
        }
        Ok(settings)
    }

    /// Highest instruction address available to the compiler.
    pub fn max_address(&self) -> Result<Address> {
        self.validate_limits()?;
        Ok(((1u32 << self.address_bits) - 1) as Address)
    }

    /// Check the counter and address limits against the hardware.
    pub fn validate_limits(&self) -> Result<()> {
        if self.counter_count == 0 || self.counter_count > COUNTER_COUNT {
            return Err(Error::Settings(format!(
                "counter_count must be between 1 and {COUNTER_COUNT}, got {}",
                self.counter_count
            )));
        }
        if self.address_bits == 0 || self.address_bits > INSTRUCTION_ADDRESS_BITS {
            return Err(Error::Settings(format!(
                "address_bits must be between 1 and {INSTRUCTION_ADDRESS_BITS}, got {}",
                self.address_bits
            )));
        }
        Ok(())
    }

    /// Channels of the named group.
    pub fn channel_group(&self, name: &str) -> Option<ChannelSet> {
        self.channel_groups
            .get(name)
            .map(|channels| channels.iter().copied().collect())
    }

    /// Remove duplicate channels and check the settings against the hardware.
    pub fn sanitize(&mut self) -> Result<Vec<SanitizationChange>> {
        self.validate_limits()?;
        let mut changes = vec![];
        for (name, channels) in self.channel_groups.iter_mut() {
            let original = format_channels(channels);
            let mut seen = ChannelSet::new();
            channels.retain(|c| seen.insert(*c));
            if original != format_channels(channels) {
                changes.push(SanitizationChange {
                    field: format!("channel_groups.{name}"),
                    original,
                    sanitized: format_channels(channels),
                    reason: "Duplicate channels removed.".to_string(),
                });
            }
            rf_channel(name, &seen)?;
        }
        Ok(changes)
    }
}

/// Index of the single RF channel of a channel group.
pub fn rf_channel(group_name: &str, channels: &ChannelSet) -> Result<u8> {
    let mut rf = channels.iter().filter(|c| c.is_rf());
    match (rf.next(), rf.next()) {
        (Some(channel), None) => Ok(channel.index()),
        (None, _) => Err(Error::Settings(format!(
            "Channel group {group_name} contains no RF channel"
        ))),
        (Some(_), Some(_)) => Err(Error::Settings(format!(
            "Channel group {group_name} contains more than one RF channel"
        ))),
    }
}

fn format_channels(channels: &[Channel]) -> String {
    let names: Vec<String> = channels.iter().map(Channel::to_string).collect();
    format!("[{}]", names.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_channel_groups() {
        let settings = CompilerSettings::default();
        let names: Vec<&str> = settings.channel_groups.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["RF0D", "RF1", "RF2", "RF3"]);
        let rf0d = settings.channel_group("RF0D").unwrap();
        assert_eq!(rf0d.len(), 8);
        assert!(rf0d.contains(&Channel::rf(0).unwrap()));
        assert!(rf0d.contains(&Channel::digital(6).unwrap()));
        let rf3 = settings.channel_group("RF3").unwrap();
        assert_eq!(rf_channel("RF3", &rf3).unwrap(), 3);
        assert_eq!(settings.max_address().unwrap(), 0x3FFF);
        assert_eq!(settings.counter_count, 8);
    }

    #[test]
    fn test_from_json_partial() {
        let settings = CompilerSettings::from_json(
            r#"{"channel_groups": {"A": ["RF2", "D1", "D1"]}, "address_bits": 10}"#,
        )
        .unwrap();
        assert_eq!(settings.counter_count, 8);
        assert_eq!(settings.max_address().unwrap(), 1023);
        assert_eq!(
            settings.channel_groups["A"],
            vec![Channel::rf(2).unwrap(), Channel::digital(1).unwrap()]
        );
    }

    #[test]
    fn test_sanitize_reports_duplicates() {
        let mut settings = CompilerSettings {
            channel_groups: IndexMap::from([(
                "G".to_string(),
                vec![Channel::rf(0).unwrap(), Channel::rf(0).unwrap(), Channel::digital(2).unwrap()],
            )]),
            ..Default::default()
        };
        let changes = settings.sanitize().unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field, "channel_groups.G");
        assert_eq!(changes[0].original, "[RF0, RF0, D2]");
        assert_eq!(changes[0].sanitized, "[RF0, D2]");
        assert!(settings.sanitize().unwrap().is_empty());
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            CompilerSettings::from_json(r#"{"channel_groups": {"A": ["D0"]}}"#),
            Err(Error::Settings(_))
        ));
        assert!(CompilerSettings::from_json(r#"{"channel_groups": {"A": ["RF0", "RF1"]}}"#).is_err());
        assert!(CompilerSettings::from_json(r#"{"channel_groups": {"A": ["RF9"]}}"#).is_err());
        assert!(CompilerSettings::from_json(r#"{"counter_count": 9}"#).is_err());
        assert!(CompilerSettings::from_json(r#"{"address_bits": 15}"#).is_err());
        assert!(CompilerSettings::from_json("{").is_err());
    }

    #[test]
    fn test_unsanitized_limits_are_rejected() {
        for address_bits in [0, 15, 32, 64, u32::MAX] {
            let settings = CompilerSettings {
                address_bits,
                ..Default::default()
            };
            assert!(matches!(settings.max_address(), Err(Error::Settings(_))));
        }
        let settings = CompilerSettings {
            counter_count: 0,
            ..Default::default()
        };
        assert!(matches!(settings.validate_limits(), Err(Error::Settings(_))));
    }
}
