// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Compiler from synthesizer sequences to sequencer bytecode.
//!
//! For every channel group the sequence is projected onto the group's
//! channels, turned into a tree of basic blocks, loops and subroutine calls,
//! assigned loop counters and instruction memory addresses, and finally
//! encoded into 64-bit instruction words.

pub mod generate_code;
pub mod instruction;
pub mod ir;
pub mod node;
pub(crate) mod passes;
pub mod result;
pub mod settings;

use std::fmt::Display;

pub use generate_code::{compile_channel_group, generate_instructions};
pub use instruction::Instruction;
pub use result::{CompiledProgram, ProgramWord};
pub use settings::CompilerSettings;

/// Region of the instruction memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryRegion {
    MainProgram,
    Subroutines,
}

impl Display for MemoryRegion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemoryRegion::MainProgram => write!(f, "Sequence"),
            MemoryRegion::Subroutines => write!(f, "Subroutines"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Sequence(#[from] synth_sequence::Error),
    #[error(transparent)]
    Units(#[from] synth_units::Error),
    #[error(
        "Too many nested loops or subroutines in channel group {group}, only {limit} loop counters are available"
    )]
    TooManyNestedCounters { group: String, limit: u8 },
    #[error("{region} in channel group {group} too long to fit in memory")]
    MemoryOverflow { group: String, region: MemoryRegion },
    #[error("{0} is not supported by the sequencer")]
    Unsupported(&'static str),
    #[error("Invalid compiler settings: {0}")]
    Settings(String),
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

impl Error {
    pub fn new<T: Display>(msg: T) -> Self {
        Error::Anyhow(anyhow::anyhow!(msg.to_string()))
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
