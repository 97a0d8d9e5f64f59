// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

pub use core::time::Duration;
use core::{fmt, ops};

/// An absolute point in time, in microseconds since the epoch of the [`Clock`] that produced it
///
/// Timestamps from different clocks are not comparable. Every connection sharing a
/// [`careful_resume::Store`](crate::recovery::careful_resume::Store) must use the same clock.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(any(test, feature = "generator"), derive(bolero_generator::TypeGenerator))]
pub struct Timestamp(u64);

impl Timestamp {
    /// Creates a `Timestamp` from a number of microseconds since the clock epoch
    #[inline]
    pub const fn from_micros(micros: u64) -> Self {
        Self(micros)
    }

    /// Creates a `Timestamp` from a duration since the clock epoch
    #[inline]
    pub fn from_duration(duration: Duration) -> Self {
        Self(duration.as_micros().try_into().unwrap_or(u64::MAX))
    }

    /// Returns the number of microseconds since the clock epoch
    #[inline]
    pub const fn as_micros(self) -> u64 {
        self.0
    }

    /// Returns the time elapsed from `earlier` to `self`, or zero if `earlier` is later
    #[inline]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_micros(self.0.saturating_sub(earlier.0))
    }

    /// Returns `self + duration`, or `None` if the result does not fit
    #[inline]
    pub fn checked_add(self, duration: Duration) -> Option<Self> {
        let micros: u64 = duration.as_micros().try_into().ok()?;
        self.0.checked_add(micros).map(Self)
    }

    /// Returns true if `self` is at or after the given `deadline`
    #[inline]
    pub fn has_elapsed(self, deadline: Self) -> bool {
        self >= deadline
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Timestamp({:?})", Duration::from_micros(self.0))
    }
}

impl ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn add(self, rhs: Duration) -> Self::Output {
        self.checked_add(rhs).unwrap_or(Timestamp(u64::MAX))
    }
}

impl ops::AddAssign<Duration> for Timestamp {
    #[inline]
    fn add_assign(&mut self, rhs: Duration) {
        *self = *self + rhs;
    }
}

impl ops::Sub<Duration> for Timestamp {
    type Output = Timestamp;

    #[inline]
    fn sub(self, rhs: Duration) -> Self::Output {
        let micros: u64 = rhs.as_micros().try_into().unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_sub(micros))
    }
}

impl ops::Sub for Timestamp {
    type Output = Duration;

    /// Saturates to zero if `rhs` is later than `self`
    #[inline]
    fn sub(self, rhs: Timestamp) -> Self::Output {
        self.saturating_duration_since(rhs)
    }
}

/// A `Clock` is a source of [`Timestamp`]s.
pub trait Clock {
    /// Returns the current [`Timestamp`]
    fn get_time(&self) -> Timestamp;
}

/// A clock which always returns a Timestamp of value 1us
#[derive(Clone, Copy, Debug)]
pub struct NoopClock;

impl Clock for NoopClock {
    #[inline]
    fn get_time(&self) -> Timestamp {
        Timestamp::from_micros(1)
    }
}

impl Clock for Timestamp {
    #[inline]
    fn get_time(&self) -> Timestamp {
        *self
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "std")] {
        /// A monotonic clock backed by [`std::time::Instant`]
        #[derive(Clone, Copy, Debug)]
        pub struct StdClock {
            epoch: std::time::Instant,
        }

        impl Default for StdClock {
            fn default() -> Self {
                Self {
                    epoch: std::time::Instant::now(),
                }
            }
        }

        impl Clock for StdClock {
            #[inline]
            fn get_time(&self) -> Timestamp {
                // offset by 1us so the epoch itself is distinguishable from an unset value
                Timestamp::from_duration(self.epoch.elapsed()) + Duration::from_micros(1)
            }
        }
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::{Clock as _, Duration, NoopClock, Timestamp};

    /// A manually advanced clock for tests
    #[derive(Clone, Copy, Debug)]
    pub struct Clock {
        current_timestamp: Timestamp,
    }

    impl Default for Clock {
        fn default() -> Self {
            Self {
                current_timestamp: NoopClock.get_time(),
            }
        }
    }

    impl Clock {
        /// Advances the clock by the given duration
        pub fn inc_by(&mut self, duration: Duration) {
            self.current_timestamp += duration;
        }
    }

    impl super::Clock for Clock {
        fn get_time(&self) -> Timestamp {
            self.current_timestamp
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let now = Timestamp::from_micros(1_000);
        let later = now + Duration::from_millis(5);
        assert_eq!(later.as_micros(), 6_000);
        assert_eq!(later - now, Duration::from_millis(5));
        // subtraction saturates rather than panicking
        assert_eq!(now - later, Duration::ZERO);
        assert_eq!(now - Duration::from_secs(1), Timestamp::from_micros(0));
        assert!(later.has_elapsed(now));
        assert!(!now.has_elapsed(later));
        assert_eq!(Timestamp::from_micros(u64::MAX).checked_add(Duration::from_micros(1)), None);
    }

    #[test]
    fn testing_clock() {
        let mut clock = testing::Clock::default();
        let start = clock.get_time();
        clock.inc_by(Duration::from_millis(10));
        assert_eq!(clock.get_time() - start, Duration::from_millis(10));
    }
}
