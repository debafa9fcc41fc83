// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Projection of a sequence onto the channels of one channel group.
use std::sync::Arc;

use synth_units::{ExactDuration, MAX_DURATION, seconds};

use crate::element::{ElementChild, Repeat, Sequence, SequenceElement, Subroutine, Timestamp};
use crate::types::ChannelSet;
use crate::{Error, Result};

impl SequenceElement {
    /// Compile the element for the board that drives the channels in `group`.
    ///
    /// The result only references channels of `group` and has the same
    /// duration as `self`. Elements without any effect on the group collapse
    /// into dead time. Compiling a compiled element again returns an equal
    /// element.
    pub fn compile(&self, group: &ChannelSet) -> Result<SequenceElement> {
        if !self.is_relevant(group) {
            return dead_time(self.exact_duration());
        }
        let compiled = match self {
            SequenceElement::Timestamp(ts) => ts.project(group).into(),
            SequenceElement::Sequence(seq) => seq.compile(group)?,
            SequenceElement::Repeat(repeat) => repeat.compile(group)?,
            SequenceElement::Subroutine(sub) => Subroutine {
                body: Arc::new(sub.body.compile(group)?),
            }
            .into(),
            SequenceElement::WaitForTrigger => SequenceElement::WaitForTrigger,
            SequenceElement::Parallel(_) => {
                return Err(Error::Unsupported("Parallel sequence composition"));
            }
        };
        // e.g. a repeat that plays its body zero times
        if !compiled.is_relevant(group) {
            return dead_time(compiled.exact_duration());
        }
        Ok(compiled)
    }
}

/// Dead time lasting `duration`.
///
/// Dead time longer than a single timestamp can hold becomes a loop over
/// the longest timestamp followed by the remainder.
fn dead_time(duration: &ExactDuration) -> Result<SequenceElement> {
    let max = seconds(MAX_DURATION);
    if duration.value() <= max {
        return Ok(Timestamp::dead_time_exact(duration.clone())?.into());
    }
    let (count, rest) = duration.div_rem(max).ok_or_else(|| synth_units::Error::OutOfRange {
        quantity: "Dead time",
        unit: "s",
        value: duration.value().value(),
        min: 0.0,
        max: MAX_DURATION * f64::from(u32::MAX),
    })?;
    let longest = Timestamp::dead_time(max)?;
    let full: SequenceElement = match count {
        1 => longest.into(),
        _ => Repeat::new(longest, count).into(),
    };
    if rest.is_zero() {
        return Ok(full);
    }
    let rest = Timestamp::dead_time_exact(rest)?;
    Ok(Sequence::from_children(vec![Arc::new(full), Arc::new(rest.into())]).into())
}

/// Merge `next` into `prev` if the two timestamps coalesce.
///
/// Two neighbouring timestamps merge when their updates are equal or when
/// the first one has zero duration, in which case its update is carried
/// into the second one. A merge never produces a timestamp longer than the
/// longest representable duration.
fn coalesce(prev: &Timestamp, next: &Timestamp) -> Option<Timestamp> {
    if prev.update != next.update && !prev.duration.is_zero() {
        return None;
    }
    let mut duration = prev.duration.clone();
    duration += &next.duration;
    if duration.value() > seconds(MAX_DURATION) {
        return None;
    }
    let mut update = prev.update.clone();
    update.extend(next.update.iter().map(|(c, u)| (*c, *u)));
    Some(Timestamp::from_parts(duration, update))
}

impl Sequence {
    /// Compile the children, flatten nested sequences and coalesce adjacent
    /// timestamps.
    ///
    /// No two neighbouring timestamps of the result coalesce. A merge can
    /// make the merged timestamp coalesce with its predecessor, so merging
    /// continues backwards until it stops.
    fn compile(&self, group: &ChannelSet) -> Result<SequenceElement> {
        let mut stack = Vec::with_capacity(self.elements.len());
        for element in self.elements.iter().rev() {
            stack.push(Arc::new(element.compile(group)?));
        }

        let mut coalesced: Vec<ElementChild> = Vec::new();
        while let Some(element) = stack.pop() {
            if let SequenceElement::Sequence(nested) = element.as_ref() {
                stack.extend(nested.elements.iter().rev().cloned());
                continue;
            }
            coalesced.push(element);
            while let [.., before, last] = coalesced.as_slice()
                && let (SequenceElement::Timestamp(prev), SequenceElement::Timestamp(next)) =
                    (before.as_ref(), last.as_ref())
                && let Some(merged) = coalesce(prev, next)
            {
                coalesced.truncate(coalesced.len() - 2);
                coalesced.push(Arc::new(merged.into()));
            }
        }
        Ok(Sequence::from_children(coalesced).into())
    }
}

impl Repeat {
    fn compile(&self, group: &ChannelSet) -> Result<SequenceElement> {
        if self.times == 0 {
            return dead_time(&ExactDuration::ZERO);
        }
        let body = self.body.compile(group)?;
        if self.times == 1 {
            return Ok(body);
        }
        if let SequenceElement::Repeat(inner) = &body
            && let Some(times) = inner.times.checked_mul(self.times)
        {
            return Ok(Repeat::from_child(Arc::clone(&inner.body), times).into());
        }
        Ok(Repeat::from_child(Arc::new(body), self.times).into())
    }
}
