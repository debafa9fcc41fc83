// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Intermediate representation of one channel group's program.
use indexmap::IndexMap;
use synth_sequence::{Subroutine, Timestamp};

use crate::node::Node;

/// Address of an instruction in the sequencer's instruction memory.
pub type Address = u16;

/// Number of control instructions a loop adds around its body: three
/// register writes before the body and the conditional jump after it.
pub const LOOP_OVERHEAD: usize = 4;
/// Number of instructions at a subroutine call site.
pub const CALL_LENGTH: usize = 3;
/// The conditional jump closing a subroutine body.
pub const SUBROUTINE_OVERHEAD: usize = 1;

/// Inclusive range of instruction addresses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AddressRange {
    pub start: Address,
    pub end: Address,
}

impl AddressRange {
    pub fn size(&self) -> usize {
        (self.end - self.start) as usize + 1
    }
}

/// A run of consecutive timestamps, one instruction each.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BasicBlock {
    pub timestamps: Vec<Timestamp>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    pub count: u32,
    pub counter: u8,
}

/// Call site of a subroutine; `subroutine` indexes [`ProgramGraph::subroutines`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub subroutine: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    BasicBlock(BasicBlock),
    Loop(Loop),
    Call(Call),
}

pub type IrNode = Node<AddressRange, NodeKind>;

impl IrNode {
    pub fn basic_block(timestamp: Timestamp) -> Self {
        Node::new(
            NodeKind::BasicBlock(BasicBlock {
                timestamps: vec![timestamp],
            }),
            AddressRange::default(),
        )
    }

    pub fn new_loop(count: u32) -> Self {
        Node::new(
            NodeKind::Loop(Loop { count, counter: 0 }),
            AddressRange::default(),
        )
    }

    pub fn call(subroutine: usize) -> Self {
        Node::new(NodeKind::Call(Call { subroutine }), AddressRange::default())
    }

    /// Number of instruction addresses the node occupies in its region.
    ///
    /// Recurses into loop bodies. Only call this on trees whose loop nesting
    /// has been bounded by the counter allocation.
    pub fn instruction_count(&self) -> usize {
        match self.data() {
            NodeKind::BasicBlock(block) => block.timestamps.len(),
            NodeKind::Loop(_) => body_length(self.iter_children()) + LOOP_OVERHEAD,
            NodeKind::Call(_) => CALL_LENGTH,
        }
    }
}

pub fn body_length<'a>(nodes: impl Iterator<Item = &'a IrNode>) -> usize {
    nodes.map(IrNode::instruction_count).sum()
}

/// A subroutine body, stored once in the subroutine region.
#[derive(Debug, Clone, Default)]
pub struct SubroutineBody {
    pub children: Vec<IrNode>,
    pub counter: u8,
    pub range: AddressRange,
}

impl SubroutineBody {
    /// Addresses reserved for the body including its closing jump.
    pub fn reserved_length(&self) -> usize {
        body_length(self.children.iter()) + SUBROUTINE_OVERHEAD
    }
}

/// Control structure of one channel group's program.
///
/// Subroutines are keyed by their compiled content, so structurally equal
/// subroutines share one body. The insertion order of the table is the
/// layout order of the subroutine region.
#[derive(Debug, Clone, Default)]
pub struct ProgramGraph {
    pub main: Vec<IrNode>,
    pub subroutines: IndexMap<Subroutine, SubroutineBody>,
}
