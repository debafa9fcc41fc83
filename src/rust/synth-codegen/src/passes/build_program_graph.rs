// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use indexmap::map::Entry;
use synth_sequence::SequenceElement;

use crate::ir::{IrNode, NodeKind, ProgramGraph, SubroutineBody};
use crate::{Error, Result};

enum Work<'a> {
    Element(&'a SequenceElement),
    /// Closes the innermost open loop or subroutine body.
    Close,
}

enum Scope {
    Main(Vec<IrNode>),
    Loop(IrNode),
    Subroutine(usize, Vec<IrNode>),
}

impl Scope {
    fn children_mut(&mut self) -> &mut Vec<IrNode> {
        match self {
            Scope::Main(children) | Scope::Subroutine(_, children) => children,
            Scope::Loop(node) => node.children_mut(),
        }
    }
}

fn current_scope(scopes: &mut [Scope]) -> Result<&mut Vec<IrNode>> {
    scopes
        .last_mut()
        .map(Scope::children_mut)
        .ok_or_else(|| Error::new("No open scope while building the program graph"))
}

/// Build the program graph of a sequence compiled for one channel group.
///
/// Consecutive timestamps form a basic block, repeats become loops and
/// subroutines are stored once per distinct body. The body of a subroutine
/// is only traversed the first time it is encountered.
pub(crate) fn build_program_graph(root: &SequenceElement) -> Result<ProgramGraph> {
    let mut graph = ProgramGraph::default();
    let mut scopes = vec![Scope::Main(vec![])];
    let mut work = vec![Work::Element(root)];
    while let Some(item) = work.pop() {
        let element = match item {
            Work::Element(element) => element,
            Work::Close => {
                match scopes.pop() {
                    Some(Scope::Loop(node)) => current_scope(&mut scopes)?.push(node),
                    Some(Scope::Subroutine(index, children)) => {
                        let (_, body) = graph
                            .subroutines
                            .get_index_mut(index)
                            .ok_or_else(|| Error::new(format!("Unknown subroutine {index}")))?;
                        body.children = children;
                    }
                    _ => return Err(Error::new("Unbalanced scopes in program graph")),
                }
                continue;
            }
        };
        match element {
            SequenceElement::Timestamp(timestamp) => {
                let children = current_scope(&mut scopes)?;
                if let Some(last) = children.last_mut()
                    && let NodeKind::BasicBlock(block) = last.data_mut()
                {
                    block.timestamps.push(timestamp.clone());
                } else {
                    children.push(IrNode::basic_block(timestamp.clone()));
                }
            }
            SequenceElement::Sequence(sequence) => {
                work.extend(sequence.elements().rev().map(Work::Element));
            }
            SequenceElement::Repeat(repeat) => {
                scopes.push(Scope::Loop(IrNode::new_loop(repeat.times())));
                work.push(Work::Close);
                work.push(Work::Element(repeat.body()));
            }
            SequenceElement::Subroutine(subroutine) => {
                let (index, is_new) = match graph.subroutines.entry(subroutine.clone()) {
                    Entry::Occupied(entry) => (entry.index(), false),
                    Entry::Vacant(entry) => {
                        let index = entry.index();
                        entry.insert(SubroutineBody::default());
                        (index, true)
                    }
                };
                current_scope(&mut scopes)?.push(IrNode::call(index));
                if is_new {
                    scopes.push(Scope::Subroutine(index, vec![]));
                    work.push(Work::Close);
                    work.push(Work::Element(subroutine.body()));
                }
            }
            SequenceElement::WaitForTrigger => {
                return Err(Error::Unsupported("Waiting for a trigger"));
            }
            SequenceElement::Parallel(_) => {
                return Err(Error::Unsupported("Parallel composition"));
            }
        }
    }
    match (scopes.pop(), scopes.is_empty()) {
        (Some(Scope::Main(main)), true) => {
            graph.main = main;
            Ok(graph)
        }
        _ => Err(Error::new("Unbalanced scopes in program graph")),
    }
}
