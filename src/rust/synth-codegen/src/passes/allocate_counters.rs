// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::ir::{IrNode, NodeKind, ProgramGraph};
use crate::{Error, Result};

struct CounterLimit<'a> {
    group: &'a str,
    limit: u8,
}

impl CounterLimit<'_> {
    /// Counter of a loop or subroutine whose nested loops and calls use at
    /// most `nested` counters.
    fn enclosing(&self, nested: Option<u8>) -> Result<u8> {
        let counter = nested.map_or(0, |c| c + 1);
        if counter >= self.limit {
            return Err(Error::TooManyNestedCounters {
                group: self.group.to_string(),
                limit: self.limit,
            });
        }
        Ok(counter)
    }
}

enum Visit<'a> {
    Enter(&'a IrNode),
    Exit { slot: usize },
}

/// Assign loop counters of `nodes` and return the highest counter used at
/// the top level, `None` when `nodes` contain no loops or calls.
///
/// Counters are computed post-order on shared references first, then
/// written into the loops in pre-order.
fn allocate_body(
    nodes: &mut [IrNode],
    subroutine_counters: &[Option<u8>],
    limit: &CounterLimit,
) -> Result<Option<u8>> {
    let mut loop_counters: Vec<u8> = vec![];
    let mut nested: Vec<Option<u8>> = vec![None];
    let mut stack: Vec<Visit> = nodes.iter().rev().map(Visit::Enter).collect();
    while let Some(visit) = stack.pop() {
        let counter = match visit {
            Visit::Enter(node) => match node.data() {
                NodeKind::BasicBlock(_) => continue,
                NodeKind::Call(call) => subroutine_counters
                    .get(call.subroutine)
                    .copied()
                    .flatten()
                    .ok_or_else(|| {
                        Error::new(format!(
                            "Counter of subroutine {} used before allocation",
                            call.subroutine
                        ))
                    })?,
                NodeKind::Loop(_) => {
                    stack.push(Visit::Exit {
                        slot: loop_counters.len(),
                    });
                    stack.extend(node.iter_children().rev().map(Visit::Enter));
                    loop_counters.push(0);
                    nested.push(None);
                    continue;
                }
            },
            Visit::Exit { slot } => {
                let inner = nested.pop().flatten();
                let counter = limit.enclosing(inner)?;
                loop_counters[slot] = counter;
                counter
            }
        };
        if let Some(max) = nested.last_mut() {
            *max = (*max).max(Some(counter));
        }
    }

    let mut counters = loop_counters.into_iter();
    let mut stack: Vec<&mut IrNode> = nodes.iter_mut().rev().collect();
    while let Some(node) = stack.pop() {
        if let NodeKind::Loop(l) = node.data_mut() {
            l.counter = counters
                .next()
                .ok_or_else(|| Error::new("Loop counter allocation out of sync"))?;
        }
        stack.extend(node.iter_children_mut().rev());
    }
    Ok(nested.pop().flatten())
}

/// Subroutines in an order where every subroutine follows the ones it calls.
fn callees_first(graph: &ProgramGraph) -> Vec<usize> {
    let mut order = Vec::with_capacity(graph.subroutines.len());
    let mut visited = vec![false; graph.subroutines.len()];
    for root in 0..graph.subroutines.len() {
        let mut stack = vec![(root, false)];
        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
                continue;
            }
            if visited[index] {
                continue;
            }
            visited[index] = true;
            stack.push((index, true));
            let mut nodes: Vec<&IrNode> = graph.subroutines[index].children.iter().collect();
            while let Some(node) = nodes.pop() {
                match node.data() {
                    NodeKind::Call(call) if !visited[call.subroutine] => {
                        stack.push((call.subroutine, false));
                    }
                    _ => nodes.extend(node.iter_children()),
                }
            }
        }
    }
    order
}

/// Assign a hardware loop counter to every loop and subroutine.
///
/// A loop or subroutine without nested loops or calls uses counter 0, any
/// other one the counter after the highest one used inside it. A call
/// occupies the counter of the called subroutine.
pub(crate) fn allocate_counters(
    graph: &mut ProgramGraph,
    group: &str,
    counter_count: u8,
) -> Result<()> {
    let limit = CounterLimit {
        group,
        limit: counter_count,
    };
    let mut subroutine_counters = vec![None; graph.subroutines.len()];
    for index in callees_first(graph) {
        let body = &mut graph.subroutines[index];
        let nested = allocate_body(&mut body.children, &subroutine_counters, &limit)?;
        body.counter = limit.enclosing(nested)?;
        subroutine_counters[index] = Some(body.counter);
    }
    allocate_body(&mut graph.main, &subroutine_counters, &limit)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::build_program_graph::build_program_graph;
    use synth_sequence::{Channel, Repeat, Sequence, SequenceElement, Subroutine, Timestamp};

    fn ts() -> SequenceElement {
        Timestamp::new(1e-6, [(Channel::digital(0).unwrap(), true)])
            .unwrap()
            .into()
    }

    fn nested_loops(depth: usize) -> SequenceElement {
        let mut element = ts();
        for _ in 0..depth {
            element = Sequence::new([Repeat::new(element, 2).into(), ts()]).into();
        }
        element
    }

    fn loop_counters(nodes: &[IrNode]) -> Vec<u8> {
        let mut out = vec![];
        let mut stack: Vec<&IrNode> = nodes.iter().rev().collect();
        while let Some(node) = stack.pop() {
            if let NodeKind::Loop(l) = node.data() {
                out.push(l.counter);
            }
            stack.extend(node.iter_children().rev());
        }
        out
    }

    #[test]
    fn test_nested_loop_counters() {
        let mut graph = build_program_graph(&nested_loops(3)).unwrap();
        allocate_counters(&mut graph, "RF0D", 8).unwrap();
        assert_eq!(loop_counters(&graph.main), vec![2, 1, 0]);
    }

    #[test]
    fn test_sibling_loops_share_counters() {
        let sequence: SequenceElement = Sequence::new([
            SequenceElement::from(Repeat::new(ts(), 2)),
            Repeat::new(Repeat::new(ts(), 3), 2).into(),
        ])
        .into();
        let mut graph = build_program_graph(&sequence).unwrap();
        allocate_counters(&mut graph, "RF0D", 8).unwrap();
        assert_eq!(loop_counters(&graph.main), vec![0, 1, 0]);
    }

    #[test]
    fn test_maximum_nesting_depth() {
        let mut graph = build_program_graph(&nested_loops(8)).unwrap();
        allocate_counters(&mut graph, "RF0D", 8).unwrap();
        assert_eq!(loop_counters(&graph.main)[0], 7);

        let mut graph = build_program_graph(&nested_loops(9)).unwrap();
        let err = allocate_counters(&mut graph, "RF0D", 8).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyNestedCounters { ref group, limit: 8 } if group == "RF0D"
        ));
    }

    #[test]
    fn test_subroutine_counters() {
        let leaf = Subroutine::new(ts());
        let with_loop = Subroutine::new(Sequence::new([
            SequenceElement::from(Repeat::new(leaf.clone(), 2)),
            ts(),
        ]));
        let sequence: SequenceElement =
            Sequence::new([SequenceElement::from(with_loop), Repeat::new(leaf, 3).into()]).into();
        let mut graph = build_program_graph(&sequence).unwrap();
        allocate_counters(&mut graph, "RF1", 8).unwrap();
        let counters: Vec<u8> = graph.subroutines.values().map(|s| s.counter).collect();
        // The loop around the leaf call sits above the leaf, the subroutine above its loop.
        assert_eq!(counters, vec![2, 0]);
        let (_, outer) = graph.subroutines.get_index(0).unwrap();
        assert_eq!(loop_counters(&outer.children), vec![1]);
        assert_eq!(loop_counters(&graph.main), vec![1]);
    }

    #[test]
    fn test_subroutines_count_towards_nesting() {
        let mut element = ts();
        for _ in 0..8 {
            element = Subroutine::new(element).into();
        }
        let mut graph = build_program_graph(&element).unwrap();
        allocate_counters(&mut graph, "RF0D", 8).unwrap();
        let mut graph = build_program_graph(&Subroutine::new(element).into()).unwrap();
        assert!(matches!(
            allocate_counters(&mut graph, "RF0D", 8),
            Err(Error::TooManyNestedCounters { .. })
        ));
    }

    #[test]
    fn test_configured_counter_limit() {
        let mut graph = build_program_graph(&nested_loops(3)).unwrap();
        assert!(allocate_counters(&mut graph, "RF2", 2).is_err());
    }
}
