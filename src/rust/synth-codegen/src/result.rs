// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::instruction::{INSTRUCTION_SIZE, Instruction};
use crate::ir::{Address, AddressRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramWord {
    pub address: Address,
    pub instruction: Instruction,
}

/// Instructions of one channel group's program.
///
/// Words are sorted by address. A timestamp writes one channel update
/// record per memory slot, so its address holds several words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledProgram {
    words: Vec<ProgramWord>,
    main_length: usize,
    subroutine_ranges: Vec<AddressRange>,
}

impl CompiledProgram {
    pub(crate) fn new(
        mut words: Vec<ProgramWord>,
        main_length: usize,
        subroutine_ranges: Vec<AddressRange>,
    ) -> Self {
        words.sort_by_key(|word| word.address);
        CompiledProgram {
            words,
            main_length,
            subroutine_ranges,
        }
    }

    pub fn words(&self) -> &[ProgramWord] {
        &self.words
    }

    /// Number of addresses used by the main program, starting at address 0.
    pub fn main_program_length(&self) -> usize {
        self.main_length
    }

    /// Address ranges of the subroutine bodies, in layout order.
    pub fn subroutine_ranges(&self) -> &[AddressRange] {
        &self.subroutine_ranges
    }

    /// Instructions stored at `address`.
    pub fn instructions_at(&self, address: Address) -> impl Iterator<Item = &Instruction> {
        let first = self.words.partition_point(|word| word.address < address);
        self.words[first..]
            .iter()
            .take_while(move |word| word.address == address)
            .map(|word| &word.instruction)
    }

    /// Binary image of the program, 8 bytes per word in address order.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.words.len() * INSTRUCTION_SIZE);
        for word in &self.words {
            bytes.extend_from_slice(&word.instruction.to_bytes());
        }
        bytes
    }
}
