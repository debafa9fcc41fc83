// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use crate::ir::{Address, AddressRange, IrNode, NodeKind, ProgramGraph};
use crate::{Error, MemoryRegion, Result};

/// Assign consecutive addresses to `nodes` starting at `start`.
///
/// Every node must end below `limit`. Returns the first address after the
/// last node.
fn layout(
    nodes: &mut [IrNode],
    start: usize,
    limit: usize,
    group: &str,
    region: MemoryRegion,
) -> Result<usize> {
    let overflow = || Error::MemoryOverflow {
        group: group.to_string(),
        region,
    };
    let mut stack: Vec<(&mut IrNode, usize)> = Vec::with_capacity(nodes.len());
    let mut next = start;
    for node in nodes.iter_mut() {
        let length = node.instruction_count();
        stack.push((node, next));
        next += length;
    }
    if next > limit {
        return Err(overflow());
    }
    while let Some((node, start)) = stack.pop() {
        let end = start + node.instruction_count() - 1;
        if end >= limit {
            return Err(overflow());
        }
        *node.span_mut() = AddressRange {
            start: start as Address,
            end: end as Address,
        };
        if matches!(node.data(), NodeKind::Loop(_)) {
            let mut child_start = start + 3;
            for child in node.iter_children_mut() {
                let length = child.instruction_count();
                stack.push((child, child_start));
                child_start += length;
            }
        }
    }
    Ok(next)
}

/// Assign instruction memory addresses to the program graph.
///
/// Subroutine bodies fill the memory top-down from `max_address - 1` in
/// table order, each followed by its closing jump. The main program is
/// placed bottom-up from address 0; its next free address must lie strictly
/// below the lowest subroutine address (or `max_address` without
/// subroutines). Returns the length of the main program.
pub(crate) fn allocate_addresses(
    graph: &mut ProgramGraph,
    group: &str,
    max_address: Address,
) -> Result<usize> {
    let mut watermark = max_address as usize;
    for body in graph.subroutines.values_mut() {
        let length = body.reserved_length();
        if length > watermark {
            return Err(Error::MemoryOverflow {
                group: group.to_string(),
                region: MemoryRegion::Subroutines,
            });
        }
        let start = watermark - length;
        body.range = AddressRange {
            start: start as Address,
            end: (watermark - 1) as Address,
        };
        layout(
            &mut body.children,
            start,
            watermark - 1,
            group,
            MemoryRegion::Subroutines,
        )?;
        watermark = start;
    }
    let limit = watermark.checked_sub(1).ok_or_else(|| Error::MemoryOverflow {
        group: group.to_string(),
        region: MemoryRegion::MainProgram,
    })?;
    layout(&mut graph.main, 0, limit, group, MemoryRegion::MainProgram)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::passes::build_program_graph::build_program_graph;
    use synth_sequence::{Channel, Repeat, Sequence, SequenceElement, Subroutine, Timestamp};

    fn ts(duration: f64) -> SequenceElement {
        Timestamp::new(duration, [(Channel::digital(0).unwrap(), true)])
            .unwrap()
            .into()
    }

    fn range(start: Address, end: Address) -> AddressRange {
        AddressRange { start, end }
    }

    #[test]
    fn test_main_program_layout() {
        let sequence: SequenceElement = Sequence::new([
            ts(1e-6),
            Repeat::new(Sequence::new([ts(2e-6), ts(3e-6)]), 5).into(),
            ts(4e-6),
        ])
        .into();
        let mut graph = build_program_graph(&sequence).unwrap();
        let length = allocate_addresses(&mut graph, "RF0D", 0x3FFF).unwrap();
        assert_eq!(length, 1 + 2 + 4 + 1);
        assert_eq!(*graph.main[0].span(), range(0, 0));
        assert_eq!(*graph.main[1].span(), range(1, 6));
        let body: Vec<_> = graph.main[1].iter_children().collect();
        assert_eq!(*body[0].span(), range(4, 5));
        assert_eq!(*graph.main[2].span(), range(7, 7));
    }

    #[test]
    fn test_subroutine_layout() {
        let first = Subroutine::new(Sequence::new([ts(1e-6), ts(2e-6)]));
        let second = Subroutine::new(Repeat::new(ts(3e-6), 2));
        let sequence: SequenceElement = Sequence::new([
            SequenceElement::from(first.clone()),
            second.into(),
            first.into(),
        ])
        .into();
        let mut graph = build_program_graph(&sequence).unwrap();
        let length = allocate_addresses(&mut graph, "RF0D", 0x3FFF).unwrap();
        assert_eq!(length, 9);
        let ranges: Vec<AddressRange> = graph.subroutines.values().map(|s| s.range).collect();
        // Two timestamps and the closing jump, then a loop of one timestamp and the closing jump
        assert_eq!(ranges, vec![range(0x3FFC, 0x3FFE), range(0x3FF6, 0x3FFB)]);
        let (_, first) = graph.subroutines.get_index(0).unwrap();
        assert_eq!(*first.children[0].span(), range(0x3FFC, 0x3FFD));
        let (_, second) = graph.subroutines.get_index(1).unwrap();
        assert_eq!(*second.children[0].span(), range(0x3FF6, 0x3FFA));
        let calls: Vec<AddressRange> = graph.main.iter().map(|n| *n.span()).collect();
        assert_eq!(calls, vec![range(0, 2), range(3, 5), range(6, 8)]);
    }

    #[test]
    fn test_main_program_overflow() {
        let sequence: SequenceElement =
            Sequence::new((0..10).map(|i| ts(1e-6 * (i + 1) as f64))).into();
        let mut graph = build_program_graph(&sequence).unwrap();
        assert_eq!(allocate_addresses(&mut graph.clone(), "RF1", 11).unwrap(), 10);
        // The next free address must stay below the limit
        let err = allocate_addresses(&mut graph, "RF1", 10).unwrap_err();
        assert!(matches!(
            err,
            Error::MemoryOverflow { ref group, region: MemoryRegion::MainProgram } if group == "RF1"
        ));
    }

    #[test]
    fn test_main_program_collides_with_subroutines() {
        let sequence: SequenceElement = Sequence::new([
            SequenceElement::from(Subroutine::new(Sequence::new([ts(1e-6), ts(2e-6)]))),
            ts(3e-6),
            ts(4e-6),
        ])
        .into();
        let mut graph = build_program_graph(&sequence).unwrap();
        // 3 subroutine addresses below 10, leaving 7 for the 5 of the main program
        assert_eq!(allocate_addresses(&mut graph.clone(), "RF2", 10).unwrap(), 5);
        assert_eq!(allocate_addresses(&mut graph.clone(), "RF2", 9).unwrap(), 5);
        // The subroutine starts at 5, the address the main program would use next
        assert!(matches!(
            allocate_addresses(&mut graph, "RF2", 8),
            Err(Error::MemoryOverflow {
                region: MemoryRegion::MainProgram,
                ..
            })
        ));
    }

    #[test]
    fn test_subroutine_overflow() {
        let body = Sequence::new((0..10).map(|i| ts(1e-6 * (i + 1) as f64)));
        let sequence: SequenceElement = Subroutine::new(body).into();
        let mut graph = build_program_graph(&sequence).unwrap();
        assert!(matches!(
            allocate_addresses(&mut graph, "RF3", 8),
            Err(Error::MemoryOverflow {
                region: MemoryRegion::Subroutines,
                ..
            })
        ));
    }
}
