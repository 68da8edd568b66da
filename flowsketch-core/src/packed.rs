// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Packed fixed-width counters
//!
//! [`DynInt`] keeps a non-negative value of `w` bits inside a wider backing
//! integer `T`. Adding a delta returns the carry (or borrow) expressed in
//! units of `2^w` while the residual low `w` bits stay in the counter. This
//! is the primitive the counter hierarchy is built from.

use std::fmt::Debug;
use std::marker::PhantomData;

use crate::error::{MeterError, Result};

mod private {
    pub trait Sealed {}
}

/// Backing integer of a packed counter.
///
/// Internal arithmetic widens to `i128`, so implementations only describe
/// the type's width, signedness and conversions.
pub trait CounterInt:
    private::Sealed + Copy + Ord + Default + Debug + 'static
{
    /// Width of the type in bits.
    const BITS: u32;

    /// Whether negative deltas are representable.
    const SIGNED: bool;

    /// Widen into the internal arithmetic domain.
    fn to_wide(self) -> i128;

    /// Truncate back from the internal arithmetic domain.
    fn from_wide(value: i128) -> Self;

    /// Convert into `f64`.
    fn to_f64(self) -> f64;
}

macro_rules! impl_counter_int {
    ($name:ty, $signed:expr) => {
        impl private::Sealed for $name {}

        impl CounterInt for $name {
            const BITS: u32 = <$name>::BITS;
            const SIGNED: bool = $signed;

            #[inline(always)]
            fn to_wide(self) -> i128 {
                self as i128
            }

            #[inline(always)]
            fn from_wide(value: i128) -> Self {
                value as $name
            }

            #[inline(always)]
            fn to_f64(self) -> f64 {
                self as f64
            }
        }
    };
}

impl_counter_int!(i32, true);
impl_counter_int!(i64, true);
impl_counter_int!(u32, false);
impl_counter_int!(u64, false);

/// A counter of `w` bits packed inside `T`, with carry-returning addition.
///
/// `w` must satisfy `0 < w < 8·sizeof(T) − 1`. The stored value is always
/// interpreted as non-negative; deltas may be negative when `T` is signed,
/// in which case the returned carry is negative (a borrow).
#[derive(Clone, Debug)]
pub struct DynInt<T> {
    value: i128,
    bits: u32,
    _marker: PhantomData<T>,
}

impl<T: CounterInt> DynInt<T> {
    /// Construct a zeroed counter of `bits` bits.
    pub fn new(bits: usize) -> Result<Self> {
        if bits == 0 || bits >= (T::BITS - 1) as usize {
            return Err(MeterError::Misconfigured(format!(
                "packed counter width must be in (0, {}), got {}",
                T::BITS - 1,
                bits
            )));
        }
        Ok(Self {
            value: 0,
            bits: bits as u32,
            _marker: PhantomData,
        })
    }

    /// Add `delta`, returning the carry in units of `2^bits`.
    ///
    /// Fails with [`MeterError::BadArgument`] when `|delta|` exceeds
    /// `2^(8·sizeof(T)−2) − 1`, or when `delta` is negative and `T` is
    /// unsigned.
    pub fn add(&mut self, delta: T) -> Result<T> {
        self.add_wide(delta.to_wide()).map(T::from_wide)
    }

    /// Carry-returning addition in the widened domain; used by the counter
    /// hierarchy where carries accumulate across many updates.
    pub fn add_wide(&mut self, delta: i128) -> Result<i128> {
        let width = 1i128 << self.bits;
        let bound = (1i128 << (T::BITS - 2)) - 1;

        if delta >= 0 {
            if delta > bound {
                return Err(MeterError::BadArgument(format!(
                    "packed counter delta too large: expected <= 2^{} - 1, got {}",
                    T::BITS - 2,
                    delta
                )));
            }
            let mut carry = delta >> self.bits;
            let sum = self.value + (delta & (width - 1));
            self.value = sum % width;
            carry += sum / width;
            Ok(carry)
        } else {
            if !T::SIGNED {
                return Err(MeterError::BadArgument(
                    "negative delta on an unsigned packed counter".into(),
                ));
            }
            if delta < -bound {
                return Err(MeterError::BadArgument(format!(
                    "packed counter delta too negative: expected >= -2^{} + 1, got {}",
                    T::BITS - 2,
                    delta
                )));
            }
            let negate = -delta;
            let negate_carry = negate >> self.bits;
            let sum = width + self.value - (negate & (width - 1));
            self.value = sum % width;
            Ok(-(negate_carry + 1 - sum / width))
        }
    }

    /// The residual value held in the counter.
    pub fn value(&self) -> T {
        T::from_wide(self.value)
    }

    /// The residual value in the widened domain.
    pub fn value_wide(&self) -> i128 {
        self.value
    }

    /// The configured width in bits.
    pub fn bits(&self) -> usize {
        self.bits as usize
    }

    /// Reset the residue to zero.
    pub fn reset(&mut self) {
        self.value = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_bounds() {
        assert!(DynInt::<i32>::new(0).is_err());
        assert!(DynInt::<i32>::new(31).is_err());
        assert!(DynInt::<i32>::new(30).is_ok());
        assert!(DynInt::<u32>::new(31).is_err());
        assert!(DynInt::<i64>::new(62).is_ok());
        assert!(DynInt::<i64>::new(63).is_err());
    }

    #[test]
    fn test_width_four_scenario() {
        let mut counter = DynInt::<i32>::new(4).unwrap();
        assert_eq!(counter.add(0x7f).unwrap(), 7);
        assert_eq!(counter.value(), 0xf);
        assert_eq!(counter.add(0x235).unwrap(), 0x24);
        assert_eq!(counter.value(), 0x4);
        assert_eq!(counter.add(-0x136).unwrap(), -0x14);
        assert_eq!(counter.value(), 0xe);
        assert_eq!(counter.add(-0x10d).unwrap(), -0x10);
        assert_eq!(counter.value(), 0x1);
    }

    #[test]
    fn test_width_four_unsigned() {
        let mut counter = DynInt::<u32>::new(4).unwrap();
        assert_eq!(counter.add(0x7f).unwrap(), 7);
        assert_eq!(counter.add(0x235).unwrap(), 0x24);
        assert_eq!(counter.add(0x136).unwrap(), 0x13);
        assert_eq!(counter.value(), 0xa);
    }

    #[test]
    fn test_wide_counter_carries() {
        let mut counter = DynInt::<i32>::new(30).unwrap();
        let half = (i32::MAX >> 1) as i128;
        assert_eq!(counter.add_wide(half).unwrap(), 0);
        assert_eq!(counter.add_wide(half).unwrap(), 1);
        assert_eq!(counter.add_wide(2).unwrap(), 1);
        assert_eq!(counter.add_wide(-half).unwrap(), -1);
        assert_eq!(counter.value(), 1);
    }

    #[test]
    fn test_delta_bound() {
        let mut counter = DynInt::<i32>::new(30).unwrap();
        let bound = (i32::MAX >> 1) as i128;
        assert!(counter.add_wide(bound + 1).is_err());
        assert!(counter.add_wide(-bound - 1).is_err());

        let mut unsigned = DynInt::<u32>::new(30).unwrap();
        assert!(unsigned.add_wide(((u32::MAX >> 2) + 1) as i128).is_err());
        assert!(unsigned.add_wide(-1).is_err());
    }

    #[test]
    fn test_reset() {
        let mut counter = DynInt::<i64>::new(8).unwrap();
        counter.add(300).unwrap();
        assert_eq!(counter.value(), 44);
        counter.reset();
        assert_eq!(counter.value(), 0);
    }
}
