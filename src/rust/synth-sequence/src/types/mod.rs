// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

mod channel;
mod update;

pub use channel::*;
pub use update::*;
