// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::types::Channel;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Invalid channel '{0}', channel must be one of RF0..RF3 or D0..D6")]
    InvalidChannel(String),
    #[error(transparent)]
    OutOfRange(#[from] synth_units::Error),
    #[error("Channel {channel} expects {expected} update")]
    UpdateKindMismatch {
        channel: Channel,
        expected: &'static str,
    },
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} is not supported")]
    Unsupported(&'static str),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<std::convert::Infallible> for Error {
    fn from(value: std::convert::Infallible) -> Self {
        match value {}
    }
}
