// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub const MAX_RF_CHANNEL: u8 = 3;
pub const MAX_DIGITAL_CHANNEL: u8 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ChannelKind {
    Rf,
    Digital,
}

/// An output channel of the synthesizer.
///
/// Channels can only be created with a valid index, through [`Channel::rf`],
/// [`Channel::digital`] or by parsing their name.
///
/// RF channels sort before digital channels, which keeps the iteration order
/// of update maps and channel sets deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Channel {
    kind: ChannelKind,
    index: u8,
}

pub type ChannelSet = BTreeSet<Channel>;

impl Channel {
    pub fn rf(index: u8) -> Result<Self> {
        if index > MAX_RF_CHANNEL {
            return Err(Error::InvalidChannel(format!("RF{index}")));
        }
        Ok(Channel {
            kind: ChannelKind::Rf,
            index,
        })
    }

    pub fn digital(index: u8) -> Result<Self> {
        if index > MAX_DIGITAL_CHANNEL {
            return Err(Error::InvalidChannel(format!("D{index}")));
        }
        Ok(Channel {
            kind: ChannelKind::Digital,
            index,
        })
    }

    pub fn kind(&self) -> ChannelKind {
        self.kind
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    pub fn is_rf(&self) -> bool {
        self.kind == ChannelKind::Rf
    }

    pub fn rf_channels() -> impl Iterator<Item = Channel> {
        (0..=MAX_RF_CHANNEL).map(|index| Channel {
            kind: ChannelKind::Rf,
            index,
        })
    }

    pub fn digital_channels() -> impl Iterator<Item = Channel> {
        (0..=MAX_DIGITAL_CHANNEL).map(|index| Channel {
            kind: ChannelKind::Digital,
            index,
        })
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ChannelKind::Rf => write!(f, "RF{}", self.index),
            ChannelKind::Digital => write!(f, "D{}", self.index),
        }
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidChannel(s.to_string());
        let (constructor, digits): (fn(u8) -> Result<Channel>, &str) =
            if let Some(digits) = s.strip_prefix("RF") {
                (Channel::rf, digits)
            } else if let Some(digits) = s.strip_prefix('D') {
                (Channel::digital, digits)
            } else {
                return Err(invalid());
            };
        // Reject signs, whitespace and leading zeros that `u8::from_str` would accept
        if digits.len() != 1 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let index = digits.parse::<u8>().map_err(|_| invalid())?;
        constructor(index).map_err(|_| invalid())
    }
}

impl TryFrom<&str> for Channel {
    type Error = Error;

    fn try_from(value: &str) -> Result<Self> {
        value.parse()
    }
}

impl TryFrom<String> for Channel {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Channel> for String {
    fn from(channel: Channel) -> Self {
        channel.to_string()
    }
}
