// Copyright 2025 Zurich Instruments AG
// SPDX-License-Identifier: Apache-2.0

//! Error-free accumulation of durations.
//!
//! A sequence duration is a sum of products of the values given by the
//! sequence author. Adding those values as `f64` in different groupings
//! gives different results (`0.1 + (0.2 + 0.3) != (0.1 + 0.2) + 0.3`), so the
//! duration of a sequence would depend on how it was nested. An
//! [`ExactDuration`] keeps the unrounded sum as a list of non-overlapping
//! partials and only rounds when the value is read.
use std::hash::{Hash, Hasher};
use std::ops::AddAssign;

use crate::duration::{Duration, Seconds, seconds};

#[derive(Debug, Clone, Default)]
pub struct ExactDuration {
    /// Non-overlapping partial sums, increasing in magnitude.
    partials: Vec<f64>,
    /// The sum of `partials`, correctly rounded.
    rounded: f64,
}

impl ExactDuration {
    pub const ZERO: ExactDuration = ExactDuration {
        partials: Vec::new(),
        rounded: 0.0,
    };

    pub fn new(duration: Duration<Seconds>) -> Self {
        let mut exact = Self::default();
        exact.push(duration.value());
        exact.round();
        exact
    }

    /// The sum rounded to the nearest representable duration.
    pub fn value(&self) -> Duration<Seconds> {
        seconds(self.rounded)
    }

    pub fn is_zero(&self) -> bool {
        self.rounded == 0.0
    }

    /// `self` repeated `times` times.
    pub fn scaled(&self, times: u32) -> Self {
        self.scaled_by(f64::from(times))
    }

    /// Split into a whole number of `divisor`s and an exact remainder in
    /// `[0, divisor)`.
    ///
    /// Returns `None` when the quotient does not fit into 32 bits.
    pub fn div_rem(&self, divisor: Duration<Seconds>) -> Option<(u32, ExactDuration)> {
        let divisor = ExactDuration::new(divisor);
        if divisor.rounded <= 0.0 {
            return None;
        }
        // The rounded quotient is off by at most one
        let mut quotient = (self.rounded / divisor.rounded).floor();
        loop {
            if !(0.0..=f64::from(u32::MAX)).contains(&quotient) {
                return None;
            }
            let mut rest = divisor.scaled_by(quotient).negated();
            rest += self;
            if rest.rounded < 0.0 {
                quotient -= 1.0;
                continue;
            }
            let mut excess = divisor.negated();
            excess += &rest;
            if excess.rounded >= 0.0 {
                quotient += 1.0;
                continue;
            }
            return Some((quotient as u32, rest));
        }
    }

    /// Product with an integer-valued `factor` of at most 2^53.
    fn scaled_by(&self, factor: f64) -> Self {
        let mut product = Self::default();
        for &partial in &self.partials {
            let high = partial * factor;
            // The rounding error of a product is representable and recovered exactly by FMA
            let low = partial.mul_add(factor, -high);
            product.push(low);
            product.push(high);
        }
        product.round();
        product
    }

    fn negated(&self) -> Self {
        ExactDuration {
            partials: self.partials.iter().map(|partial| -partial).collect(),
            rounded: -self.rounded,
        }
    }

    /// Add `x` to the partials without rounding (Shewchuk's algorithm).
    fn push(&mut self, mut x: f64) {
        let mut partials = Vec::with_capacity(self.partials.len() + 1);
        for mut y in self.partials.drain(..) {
            if x.abs() < y.abs() {
                std::mem::swap(&mut x, &mut y);
            }
            let high = x + y;
            let low = y - (high - x);
            if low != 0.0 {
                partials.push(low);
            }
            x = high;
        }
        partials.push(x);
        self.partials = partials;
    }

    /// Round the partials to the nearest `f64`, ties to even.
    fn round(&mut self) {
        let partials = &self.partials;
        let Some((&top, rest)) = partials.split_last() else {
            self.rounded = 0.0;
            return;
        };
        let mut high = top;
        let mut low = 0.0;
        let mut n = rest.len();
        while n > 0 {
            n -= 1;
            let x = high;
            let y = partials[n];
            high = x + y;
            low = y - (high - x);
            if low != 0.0 {
                break;
            }
        }
        // A remainder of exactly half an ulp is rounded away from even only
        // when the partials below it push it past the halfway point.
        if n > 0 && ((low < 0.0 && partials[n - 1] < 0.0) || (low > 0.0 && partials[n - 1] > 0.0))
        {
            let y = low * 2.0;
            let x = high + y;
            if y == x - high {
                high = x;
            }
        }
        self.rounded = high;
    }
}

impl AddAssign<&ExactDuration> for ExactDuration {
    fn add_assign(&mut self, rhs: &ExactDuration) {
        for &partial in &rhs.partials {
            self.push(partial);
        }
        self.round();
    }
}

impl From<Duration<Seconds>> for ExactDuration {
    fn from(duration: Duration<Seconds>) -> Self {
        Self::new(duration)
    }
}

// Equal sums may be held in different partials, so compare the value.
impl PartialEq for ExactDuration {
    fn eq(&self, other: &Self) -> bool {
        self.value() == other.value()
    }
}

impl Eq for ExactDuration {}

impl Hash for ExactDuration {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value().hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exact(values: &[f64]) -> ExactDuration {
        let mut sum = ExactDuration::ZERO;
        for &value in values {
            sum += &ExactDuration::new(seconds(value));
        }
        sum
    }

    #[test]
    fn test_grouping_does_not_change_the_sum() {
        let mut left = exact(&[0.1, 0.2]);
        left += &exact(&[0.3]);
        let mut right = exact(&[0.1]);
        right += &exact(&[0.2, 0.3]);
        assert_eq!(left, right);
        assert_eq!(left.value(), seconds(0.6));
        assert_ne!((0.1 + 0.2) + 0.3, 0.1 + (0.2 + 0.3));
    }

    #[test]
    fn test_cancellation_is_exact() {
        let sum = exact(&[1e16, 1.0, -1e16]);
        assert_eq!(sum.value(), seconds(1.0));
        assert!(exact(&[0.1, -0.1]).is_zero());
        assert!(ExactDuration::ZERO.is_zero());
    }

    #[test]
    fn test_rounds_ties_to_even() {
        let ulp = f64::EPSILON;
        // 1 + ulp/2 is a tie and rounds to 1, the extra tiny term breaks it upwards
        assert_eq!(exact(&[1.0, ulp / 2.0]).value(), seconds(1.0));
        assert_eq!(exact(&[1.0, ulp / 2.0, 1e-300]).value(), seconds(1.0 + ulp));
    }

    #[test]
    fn test_scaling_matches_repeated_addition() {
        let body = exact(&[0.1, 0.2, 0.3]);
        let mut repeated = ExactDuration::ZERO;
        for _ in 0..12 {
            repeated += &body;
        }
        assert_eq!(body.scaled(12), repeated);
        assert_eq!(body.scaled(3).scaled(4), body.scaled(12));
        assert!(body.scaled(0).is_zero());
    }

    #[test]
    fn test_div_rem() {
        let (quotient, rest) = exact(&[0.7]).div_rem(seconds(0.2)).unwrap();
        assert_eq!(quotient, 3);
        let mut total = ExactDuration::new(seconds(0.2)).scaled(quotient);
        total += &rest;
        assert_eq!(total, exact(&[0.7]));
        assert!(rest.value() < seconds(0.2));

        let (quotient, rest) = exact(&[0.3, 0.3]).div_rem(seconds(0.3)).unwrap();
        assert_eq!(quotient, 2);
        assert!(rest.is_zero());

        let huge = ExactDuration::new(seconds(1.0)).scaled(u32::MAX).scaled(2);
        assert!(huge.div_rem(seconds(1.0)).is_none());
    }
}
