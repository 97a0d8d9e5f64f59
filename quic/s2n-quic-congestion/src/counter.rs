// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use core::{
    cmp::Ordering,
    fmt,
    marker::PhantomData,
    ops::{AddAssign, Deref, SubAssign},
};
use num_traits::{CheckedAdd, CheckedSub, SaturatingAdd, SaturatingSub};

/// A checked-overflow counter
///
/// Rather than silently wrapping, the default behavior returns an error from `try_add` and
/// `try_sub` so the caller can decide how to react. Counters with the [`Saturating`] behavior
/// clamp at the bounds of `T` for the `+=` and `-=` operators.
#[derive(Clone, Copy, Default, Hash)]
pub struct Counter<T, Behavior = ()>(T, PhantomData<Behavior>);

/// Overrides the behavior of a counter to saturate instead of overflowing
#[derive(Clone, Copy, Debug, Default, Hash)]
pub struct Saturating;

/// Returned when a checked operation would overflow or underflow the counter
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overflow;

impl<T, Behavior> Counter<T, Behavior> {
    /// Creates a new counter with an initial value
    #[inline]
    pub const fn new(value: T) -> Self {
        Self(value, PhantomData)
    }

    /// Sets the counter to the given value
    #[inline]
    pub fn set(&mut self, value: T) {
        self.0 = value;
    }
}

impl<T: Copy + CheckedAdd + CheckedSub, Behavior> Counter<T, Behavior> {
    /// Adds `value` to the counter, leaving it unchanged on overflow
    #[inline]
    pub fn try_add<V: TryInto<T>>(&mut self, value: V) -> Result<(), Overflow> {
        let value = value.try_into().map_err(|_| Overflow)?;
        self.0 = self.0.checked_add(&value).ok_or(Overflow)?;
        Ok(())
    }

    /// Subtracts `value` from the counter, leaving it unchanged on underflow
    #[inline]
    pub fn try_sub<V: TryInto<T>>(&mut self, value: V) -> Result<(), Overflow> {
        let value = value.try_into().map_err(|_| Overflow)?;
        self.0 = self.0.checked_sub(&value).ok_or(Overflow)?;
        Ok(())
    }
}

impl<T: SaturatingAdd> AddAssign<T> for Counter<T, Saturating> {
    #[inline]
    fn add_assign(&mut self, rhs: T) {
        self.0 = self.0.saturating_add(&rhs);
    }
}

impl<T: SaturatingSub> SubAssign<T> for Counter<T, Saturating> {
    #[inline]
    fn sub_assign(&mut self, rhs: T) {
        self.0 = self.0.saturating_sub(&rhs);
    }
}

impl<T, Behavior> Deref for Counter<T, Behavior> {
    type Target = T;

    #[inline]
    fn deref(&self) -> &T {
        &self.0
    }
}

impl<T: fmt::Debug, Behavior> fmt::Debug for Counter<T, Behavior> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl<T: PartialEq, Behavior> PartialEq<T> for Counter<T, Behavior> {
    #[inline]
    fn eq(&self, other: &T) -> bool {
        self.0.eq(other)
    }
}

impl<T: PartialOrd, Behavior> PartialOrd<T> for Counter<T, Behavior> {
    #[inline]
    fn partial_cmp(&self, other: &T) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}
