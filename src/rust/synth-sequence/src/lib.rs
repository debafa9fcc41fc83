// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Declarative description of synchronized RF and digital output sequences.
//!
//! A sequence is an immutable tree of [`SequenceElement`]s built with the
//! constructors of each variant and the `+` (concatenate) and `*` (repeat)
//! operators. [`SequenceElement::compile`] projects a sequence onto the
//! channels of one output board.

mod compile;
pub mod element;
pub mod error;
pub mod types;

pub use element::{Parallel, Repeat, Sequence, SequenceElement, Subroutine, Timestamp};
pub use error::{Error, Result};
pub use types::{AnalogUpdate, Channel, ChannelKind, ChannelSet, DigitalUpdate, Update};
