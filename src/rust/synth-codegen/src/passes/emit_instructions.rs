// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::instruction::{TimestampWord, compile_loop, compile_subroutine, conditional_jump};
use crate::ir::{Address, IrNode, NodeKind, ProgramGraph, body_length};
use crate::result::{CompiledProgram, ProgramWord};
use crate::{Error, Instruction, Result};

struct Emitter {
    words: Vec<ProgramWord>,
    /// Addresses already claimed by a node.
    claimed: Vec<bool>,
    rf_channel: u8,
}

impl Emitter {
    fn claim(&mut self, address: Address) -> Result<()> {
        let slot = self
            .claimed
            .get_mut(address as usize)
            .ok_or_else(|| Error::new(format!("Address {address} outside of memory")))?;
        if *slot {
            return Err(Error::new(format!("Address {address} emitted twice")));
        }
        *slot = true;
        Ok(())
    }

    fn push(&mut self, address: Address, instruction: Instruction) -> Result<()> {
        self.claim(address)?;
        self.words.push(ProgramWord {
            address,
            instruction,
        });
        Ok(())
    }

    fn push_at(&mut self, start: Address, instructions: &[Instruction]) -> Result<()> {
        for (offset, instruction) in instructions.iter().enumerate() {
            self.push(start + offset as Address, *instruction)?;
        }
        Ok(())
    }

    fn emit_nodes(&mut self, nodes: &[IrNode], graph: &ProgramGraph) -> Result<()> {
        let mut stack: Vec<&IrNode> = nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            let range = *node.span();
            match node.data() {
                NodeKind::BasicBlock(block) => {
                    for (offset, timestamp) in block.timestamps.iter().enumerate() {
                        let address = range.start + offset as Address;
                        let word = TimestampWord::new(timestamp, self.rf_channel)?;
                        if word.ticks == 0 && timestamp.duration().value() > 0.0 {
                            synth_log::warn!(
                                "Timestamp of {} s at address {} is shorter than one tick and rounds to zero",
                                timestamp.duration().value(),
                                address
                            );
                        }
                        self.claim(address)?;
                        self.words.extend(
                            word.to_instructions(self.rf_channel, address)
                                .into_iter()
                                .map(|instruction| ProgramWord {
                                    address,
                                    instruction,
                                }),
                        );
                    }
                }
                NodeKind::Loop(l) => {
                    let [count, exit, start, close] = compile_loop(
                        range.start,
                        body_length(node.iter_children()),
                        l.count,
                        l.counter,
                    )?;
                    self.push_at(range.start, &[count, exit, start])?;
                    self.push(range.end, close)?;
                    stack.extend(node.iter_children().rev());
                }
                NodeKind::Call(call) => {
                    let (_, body) = graph.subroutines.get_index(call.subroutine).ok_or_else(|| {
                        Error::new(format!("Call to unknown subroutine {}", call.subroutine))
                    })?;
                    let instructions =
                        compile_subroutine(range.start, body.range.start, body.counter)?;
                    self.push_at(range.start, &instructions)?;
                }
            }
        }
        Ok(())
    }
}

/// Encode an address-assigned program graph into instructions.
///
/// Every address of the main program and of each subroutine body is
/// emitted exactly once.
pub(crate) fn emit_instructions(
    graph: &ProgramGraph,
    main_length: usize,
    rf_channel: u8,
    max_address: Address,
) -> Result<CompiledProgram> {
    let mut emitter = Emitter {
        words: vec![],
        claimed: vec![false; max_address as usize + 1],
        rf_channel,
    };
    emitter.emit_nodes(&graph.main, graph)?;
    for body in graph.subroutines.values() {
        emitter.emit_nodes(&body.children, graph)?;
        emitter.push(body.range.end, conditional_jump(body.counter)?)?;
    }

    let reserved = (0..main_length).chain(
        graph
            .subroutines
            .values()
            .flat_map(|body| body.range.start as usize..=body.range.end as usize),
    );
    for address in reserved {
        if !emitter.claimed.get(address).copied().unwrap_or(false) {
            return Err(Error::new(format!(
                "Reserved address {address} holds no instruction"
            )));
        }
    }
    let subroutine_ranges = graph.subroutines.values().map(|body| body.range).collect();
    Ok(CompiledProgram::new(
        emitter.words,
        main_length,
        subroutine_ranges,
    ))
}
