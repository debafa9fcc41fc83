// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

use num_traits::Float;
use std::fmt::Result as FormatterResult;
use std::fmt::{Debug, Formatter};
use std::hash::{Hash, Hasher};

/// A duration represented with unit type.
///
/// # Type Parameter
/// - `U`: The unit of the value (should be a zero-sized type)
/// - `T`: The underlying value (typically a floating point number)
///
/// Sums of durations are accumulated in an
/// [`ExactDuration`](crate::ExactDuration), a `Duration` only holds a single
/// rounded value.
///
/// # Examples
/// ```rust
/// use synth_units::duration::seconds;
///
/// assert_eq!(seconds(0.0), seconds(-0.0));
/// assert!(seconds(1e-6) < seconds(2e-6));
/// ```
#[derive(Clone, Copy)]
pub struct Duration<U, T = f64> {
    value: T,
    unit: U,
}

impl<U, T: Copy> Duration<U, T> {
    pub fn value(&self) -> T {
        self.value
    }
}

impl<T: Float, U> PartialEq for Duration<U, T> {
    fn eq(&self, other: &Self) -> bool {
        let a = self.value;
        let b = other.value;
        if a.is_zero() && b.is_zero() {
            true
        } else {
            a == b
        }
    }
}

impl<T: Float, U> Eq for Duration<U, T> {}

// Consistent with `PartialEq`: `+0.0` and `-0.0` hash alike.
impl<U> Hash for Duration<U, f64> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let value = if self.value == 0.0 { 0.0 } else { self.value };
        value.to_bits().hash(state);
    }
}

impl<T: Float, U> PartialOrd for Duration<U, T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: Float, U> Ord for Duration<U, T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        if self.value < other.value {
            std::cmp::Ordering::Less
        } else if self.value > other.value {
            std::cmp::Ordering::Greater
        } else {
            std::cmp::Ordering::Equal
        }
    }
}

impl<T: Debug, U> Debug for Duration<U, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatterResult {
        f.debug_struct("Duration")
            .field("value", &self.value)
            .field("unit", &std::any::type_name::<U>())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Seconds;

pub const fn seconds<T>(value: T) -> Duration<Seconds, T> {
    Duration {
        value,
        unit: Seconds,
    }
}
