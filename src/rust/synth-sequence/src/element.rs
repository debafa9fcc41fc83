// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use std::collections::BTreeMap;
use std::ops::{Add, Mul};
use std::sync::Arc;

use synth_units::{Duration, ExactDuration, MAX_DURATION, Seconds, seconds};

use crate::types::{Channel, ChannelSet, Update};
use crate::{Error, Result};

pub type ElementChild = Arc<SequenceElement>;

/// A node of the sequence algebra.
///
/// Elements are immutable once constructed. Children are reference counted so
/// that the same sub-sequence can be shared by several parents without
/// copying. Equality and hashing are structural.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SequenceElement {
    Timestamp(Timestamp),
    Sequence(Sequence),
    Repeat(Repeat),
    Subroutine(Subroutine),
    /// Zero-duration synchronization point for all boards.
    WaitForTrigger,
    Parallel(Parallel),
}

impl SequenceElement {
    pub fn duration(&self) -> Duration<Seconds> {
        self.exact_duration().value()
    }

    /// The duration before rounding, independent of how the element is nested.
    pub(crate) fn exact_duration(&self) -> &ExactDuration {
        static NO_DURATION: ExactDuration = ExactDuration::ZERO;
        match self {
            SequenceElement::Timestamp(ts) => &ts.duration,
            SequenceElement::Sequence(seq) => &seq.duration,
            SequenceElement::Repeat(repeat) => &repeat.duration,
            SequenceElement::Subroutine(sub) => sub.body.exact_duration(),
            SequenceElement::WaitForTrigger => &NO_DURATION,
            SequenceElement::Parallel(par) => &par.duration,
        }
    }

    pub fn channels(&self) -> &ChannelSet {
        static NO_CHANNELS: ChannelSet = ChannelSet::new();
        match self {
            SequenceElement::Timestamp(ts) => &ts.channels,
            SequenceElement::Sequence(seq) => &seq.channels,
            SequenceElement::Repeat(repeat) => repeat.body.channels(),
            SequenceElement::Subroutine(sub) => sub.body.channels(),
            SequenceElement::WaitForTrigger => &NO_CHANNELS,
            SequenceElement::Parallel(par) => &par.channels,
        }
    }

    /// Whether a `WaitForTrigger` appears anywhere in the subtree.
    pub fn has_trigger(&self) -> bool {
        match self {
            SequenceElement::Timestamp(_) => false,
            SequenceElement::Sequence(seq) => seq.has_trigger,
            SequenceElement::Repeat(repeat) => repeat.body.has_trigger(),
            SequenceElement::Subroutine(sub) => sub.body.has_trigger(),
            SequenceElement::WaitForTrigger => true,
            SequenceElement::Parallel(par) => par.has_trigger,
        }
    }

    /// Whether the element has any effect on the board driving `group`.
    ///
    /// Trigger waits synchronize every board, so they are relevant to all
    /// groups even though they do not reference a channel.
    pub fn is_relevant(&self, group: &ChannelSet) -> bool {
        self.has_trigger() || !self.channels().is_disjoint(group)
    }
}

/// An interval of fixed duration during which the outputs hold constant values.
///
/// The update is applied at the start of the interval.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Timestamp {
    pub(crate) duration: ExactDuration,
    pub(crate) update: BTreeMap<Channel, Update>,
    pub(crate) channels: ChannelSet,
}

impl Timestamp {
    /// Create a timestamp of `duration` seconds applying `update`.
    ///
    /// Channels may be given as [`Channel`] or by name (`"RF0"`, `"D3"`).
    pub fn new<I, C, U>(duration: f64, update: I) -> Result<Self>
    where
        I: IntoIterator<Item = (C, U)>,
        C: TryInto<Channel>,
        Error: From<C::Error>,
        U: Into<Update>,
    {
        let duration = validate_duration(seconds(duration))?;
        let mut map = BTreeMap::new();
        for (channel, value) in update {
            let channel: Channel = channel.try_into()?;
            let value: Update = value.into();
            value.validate_for(channel)?;
            map.insert(channel, value);
        }
        Ok(Self::from_parts(duration.into(), map))
    }

    /// A timestamp that changes no output.
    pub fn dead_time(duration: Duration<Seconds>) -> Result<Self> {
        Ok(Self::from_parts(
            validate_duration(duration)?.into(),
            BTreeMap::new(),
        ))
    }

    /// Dead time of an exact duration, e.g. one that replaces an element.
    pub(crate) fn dead_time_exact(duration: ExactDuration) -> Result<Self> {
        validate_duration(duration.value())?;
        Ok(Self::from_parts(duration, BTreeMap::new()))
    }

    pub(crate) fn from_parts(duration: ExactDuration, update: BTreeMap<Channel, Update>) -> Self {
        let channels = update.keys().copied().collect();
        Timestamp {
            duration,
            update,
            channels,
        }
    }

    pub fn duration(&self) -> Duration<Seconds> {
        self.duration.value()
    }

    pub fn update(&self) -> &BTreeMap<Channel, Update> {
        &self.update
    }

    /// Restrict the update to the channels of `group`.
    pub(crate) fn project(&self, group: &ChannelSet) -> Timestamp {
        let update = self
            .update
            .iter()
            .filter(|(channel, _)| group.contains(*channel))
            .map(|(channel, value)| (*channel, *value))
            .collect();
        Self::from_parts(self.duration.clone(), update)
    }
}

fn validate_duration(duration: Duration<Seconds>) -> Result<Duration<Seconds>> {
    let value = duration.value();
    if !value.is_finite() {
        return Err(synth_units::Error::NotFinite {
            quantity: "Duration",
            value,
        }
        .into());
    }
    if !(0.0..=MAX_DURATION).contains(&value) {
        return Err(synth_units::Error::OutOfRange {
            quantity: "Duration",
            unit: "s",
            value,
            min: 0.0,
            max: MAX_DURATION,
        }
        .into());
    }
    Ok(duration)
}

/// Elements played one after the other.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Sequence {
    pub(crate) elements: Vec<ElementChild>,
    duration: ExactDuration,
    channels: ChannelSet,
    has_trigger: bool,
}

impl Sequence {
    pub fn new<I, E>(elements: I) -> Self
    where
        I: IntoIterator<Item = E>,
        E: Into<SequenceElement>,
    {
        Self::from_children(elements.into_iter().map(|e| Arc::new(e.into())).collect())
    }

    pub(crate) fn from_children(elements: Vec<ElementChild>) -> Self {
        let mut duration = ExactDuration::ZERO;
        for element in &elements {
            duration += element.exact_duration();
        }
        let channels = elements
            .iter()
            .flat_map(|e| e.channels().iter().copied())
            .collect();
        let has_trigger = elements.iter().any(|e| e.has_trigger());
        Sequence {
            elements,
            duration,
            channels,
            has_trigger,
        }
    }

    pub fn elements(
        &self,
    ) -> impl DoubleEndedIterator<Item = &SequenceElement> + ExactSizeIterator {
        self.elements.iter().map(|e| e.as_ref())
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

/// Bounded repetition of a body, lowered to a hardware loop.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Repeat {
    pub(crate) body: ElementChild,
    pub(crate) times: u32,
    duration: ExactDuration,
}

impl Repeat {
    pub fn new(body: impl Into<SequenceElement>, times: u32) -> Self {
        Self::from_child(Arc::new(body.into()), times)
    }

    pub(crate) fn from_child(body: ElementChild, times: u32) -> Self {
        let duration = body.exact_duration().scaled(times);
        Repeat {
            body,
            times,
            duration,
        }
    }

    pub fn body(&self) -> &SequenceElement {
        &self.body
    }

    pub fn times(&self) -> u32 {
        self.times
    }
}

/// A body stored once in instruction memory and shared by all call sites.
///
/// Two subroutines with structurally equal bodies are the same routine.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Subroutine {
    pub(crate) body: ElementChild,
}

impl Subroutine {
    pub fn new(body: impl Into<SequenceElement>) -> Self {
        Subroutine {
            body: Arc::new(body.into()),
        }
    }

    pub fn body(&self) -> &SequenceElement {
        &self.body
    }
}

/// Elements played at the same time on different channel groups.
///
/// Construction is supported so that sequences can be described, but
/// compiling a parallel composition fails: synchronizing independently
/// compiled programs is not implemented.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Parallel {
    elements: Vec<ElementChild>,
    duration: ExactDuration,
    channels: ChannelSet,
    has_trigger: bool,
}

impl Parallel {
    pub fn new<I, E>(elements: I) -> Result<Self>
    where
        I: IntoIterator<Item = E>,
        E: Into<SequenceElement>,
    {
        let elements: Vec<ElementChild> = elements
            .into_iter()
            .map(|e| Arc::new(e.into()))
            .collect();
        if elements.is_empty() {
            return Err(Error::InvalidArgument(
                "Parallel sequence must have at least one element".to_string(),
            ));
        }
        let mut channels = ChannelSet::new();
        for element in &elements {
            if let Some(shared) = element.channels().intersection(&channels).next() {
                return Err(Error::InvalidArgument(format!(
                    "Multiple elements of parallel sequence use channel {shared}"
                )));
            }
            channels.extend(element.channels().iter().copied());
        }
        let duration = elements
            .iter()
            .map(|e| e.exact_duration())
            .max_by_key(|d| d.value())
            .cloned()
            .unwrap_or_default();
        let has_trigger = elements.iter().any(|e| e.has_trigger());
        Ok(Parallel {
            elements,
            duration,
            channels,
            has_trigger,
        })
    }

    pub fn elements(
        &self,
    ) -> impl DoubleEndedIterator<Item = &SequenceElement> + ExactSizeIterator {
        self.elements.iter().map(|e| e.as_ref())
    }
}

macro_rules! impl_element_conversions {
    ($($variant:ident),*) => {
        $(
            impl From<$variant> for SequenceElement {
                fn from(value: $variant) -> Self {
                    SequenceElement::$variant(value)
                }
            }

            impl<R: Into<SequenceElement>> Add<R> for $variant {
                type Output = SequenceElement;

                fn add(self, rhs: R) -> SequenceElement {
                    SequenceElement::from(self) + rhs
                }
            }

            impl Mul<u32> for $variant {
                type Output = SequenceElement;

                fn mul(self, rhs: u32) -> SequenceElement {
                    SequenceElement::from(self) * rhs
                }
            }
        )*
    };
}

impl_element_conversions!(Timestamp, Sequence, Repeat, Subroutine, Parallel);

impl<R: Into<SequenceElement>> Add<R> for SequenceElement {
    type Output = SequenceElement;

    fn add(self, rhs: R) -> SequenceElement {
        Sequence::new([self, rhs.into()]).into()
    }
}

impl Mul<u32> for SequenceElement {
    type Output = SequenceElement;

    /// Repeat the element. Repeating a `Repeat` multiplies its trip count
    /// unless the product overflows the 32-bit loop counter.
    fn mul(self, rhs: u32) -> SequenceElement {
        if let SequenceElement::Repeat(repeat) = &self
            && let Some(times) = repeat.times.checked_mul(rhs)
        {
            return Repeat::from_child(Arc::clone(&repeat.body), times).into();
        }
        Repeat::new(self, rhs).into()
    }
}
