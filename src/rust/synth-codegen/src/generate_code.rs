// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::IndexMap;
use synth_log::{diagnostic, info};
use synth_sequence::{ChannelSet, SequenceElement};

use crate::Result;
use crate::passes::{
    allocate_addresses::allocate_addresses, allocate_counters::allocate_counters,
    build_program_graph::build_program_graph, emit_instructions::emit_instructions,
};
use crate::result::CompiledProgram;
use crate::settings::{CompilerSettings, rf_channel};

/// Compile `sequence` into the program of a single channel group.
pub fn compile_channel_group(
    sequence: &SequenceElement,
    group_name: &str,
    channels: &ChannelSet,
    settings: &CompilerSettings,
) -> Result<CompiledProgram> {
    let max_address = settings.max_address()?;
    let rf_channel = rf_channel(group_name, channels)?;
    let compiled = sequence.compile(channels)?;
    let mut graph = build_program_graph(&compiled)?;
    allocate_counters(&mut graph, group_name, settings.counter_count)?;
    let main_length = allocate_addresses(&mut graph, group_name, max_address)?;
    let program = emit_instructions(&graph, main_length, rf_channel, max_address)?;
    diagnostic!(
        "Channel group {}: {} instruction words, main program {} addresses, {} subroutines in {} addresses",
        group_name,
        program.words().len(),
        main_length,
        program.subroutine_ranges().len(),
        program
            .subroutine_ranges()
            .iter()
            .map(|range| range.size())
            .sum::<usize>()
    );
    Ok(program)
}

/// Compile `sequence` for every channel group of `settings`.
///
/// Groups are compiled independently, in the order of the settings. The
/// first failing group aborts the compilation.
pub fn generate_instructions(
    sequence: &SequenceElement,
    settings: &CompilerSettings,
) -> Result<IndexMap<String, CompiledProgram>> {
    settings.validate_limits()?;
    let mut programs = IndexMap::with_capacity(settings.channel_groups.len());
    for (group_name, channels) in &settings.channel_groups {
        info!("Compiling channel group {}", group_name);
        let channels: ChannelSet = channels.iter().copied().collect();
        let program = compile_channel_group(sequence, group_name, &channels, settings)?;
        programs.insert(group_name.clone(), program);
    }
    Ok(programs)
}
