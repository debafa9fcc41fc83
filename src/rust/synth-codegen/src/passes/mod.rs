// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

pub(crate) mod allocate_addresses;
pub(crate) mod allocate_counters;
pub(crate) mod build_program_graph;
pub(crate) mod emit_instructions;
