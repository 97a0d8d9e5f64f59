// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::{Duration, Timestamp};
use core::marker::PhantomData;

/// Tracks the minimum or maximum value seen over a window of `window_length`
///
/// Based on https://git.kernel.org/pub/scm/linux/kernel/git/torvalds/linux.git/commit/?id=f672258391b42a5c7cc2732c9c063e56a85c8dbe
#[derive(Clone, Debug)]
pub(crate) struct WindowedFilter<T, TimeType, DurationType, FilterType> {
    current_value: Option<T>,
    last_updated: Option<TimeType>,
    window_length: DurationType,
    filter: PhantomData<FilterType>,
}

pub(crate) trait Filter<T> {
    /// Returns true if the `new` value should replace the `current` value
    fn supersedes(new: T, current: Option<T>) -> bool;
}

#[derive(Clone, Debug)]
pub(crate) struct MaxFilter;
#[derive(Clone, Debug)]
pub(crate) struct MinFilter;

impl<T: PartialOrd> Filter<T> for MaxFilter {
    fn supersedes(new: T, current: Option<T>) -> bool {
        current.is_none_or(|current| new >= current)
    }
}

impl<T: PartialOrd> Filter<T> for MinFilter {
    fn supersedes(new: T, current: Option<T>) -> bool {
        current.is_none_or(|current| new <= current)
    }
}

/// Filter that maintains the maximum value seen over the window
pub(crate) type WindowedMaxFilter<T, TimeType, DurationType> =
    WindowedFilter<T, TimeType, DurationType, MaxFilter>;
/// Filter that maintains the minimum value seen over the window
pub(crate) type WindowedMinFilter<T, TimeType, DurationType> =
    WindowedFilter<T, TimeType, DurationType, MinFilter>;

impl<
        T: Copy + PartialOrd,
        TimeType: Copy + PartialOrd + core::ops::Sub<Output = DurationType>,
        DurationType: PartialOrd,
        FilterType: Filter<T>,
    > WindowedFilter<T, TimeType, DurationType, FilterType>
{
    pub fn new(window_length: DurationType) -> Self {
        Self {
            current_value: None,
            last_updated: None,
            window_length,
            filter: PhantomData,
        }
    }

    /// Updates the filter with the given sample
    ///
    /// The sample becomes the current value if it supersedes it according to the `Filter`, or
    /// if the current value has expired. `now` must be monotonically increasing.
    pub fn update(&mut self, new_sample: T, now: TimeType) {
        if self.window_expired(now) || FilterType::supersedes(new_sample, self.current_value) {
            self.current_value = Some(new_sample);
            self.last_updated = Some(now);
        }
    }

    /// Returns the current value if one has been recorded yet
    pub fn value(&self) -> Option<T> {
        self.current_value
    }

    #[inline]
    pub fn window_expired(&self, now: TimeType) -> bool {
        self.last_updated
            .is_some_and(|last_updated| now - last_updated >= self.window_length)
    }

    pub fn reset(&mut self) {
        self.current_value = None;
        self.last_updated = None;
    }
}

/// Minimum RTT estimate that expires if it is not refreshed within its window
///
/// Expiry of the estimate is what schedules a ProbeRTT period.
#[derive(Clone, Debug)]
pub(crate) struct MinRttFilter {
    filter: WindowedMinFilter<Duration, Timestamp, Duration>,
    expired: bool,
}

impl MinRttFilter {
    pub fn new(expiration: Duration) -> Self {
        Self {
            filter: WindowedMinFilter::new(expiration),
            expired: false,
        }
    }

    /// Updates the estimate with an RTT sample
    ///
    /// Records whether the estimate had expired before the sample replaced it.
    pub fn update(&mut self, rtt: Duration, now: Timestamp) {
        self.expired = self.filter.window_expired(now);
        self.filter.update(rtt, now);
    }

    #[inline]
    pub fn min_rtt(&self) -> Option<Duration> {
        self.filter.value()
    }

    /// True if the last sample found the estimate older than the expiration
    #[inline]
    pub fn expired(&self) -> bool {
        self.expired
    }

    /// Marks the current estimate as fresh as of `now`
    ///
    /// Called after ProbeRTT so another ProbeRTT is not entered until the estimate expires again.
    pub fn refresh(&mut self, now: Timestamp) {
        if self.filter.current_value.is_some() {
            self.filter.last_updated = Some(now);
        }
        self.expired = false;
    }

    pub fn reset(&mut self) {
        self.filter.reset();
        self.expired = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{Clock, NoopClock};

    #[test]
    fn min_filter() {
        let mut filter = WindowedMinFilter::new(Duration::from_secs(10));

        // Filter has not received an update, so no value should be present
        assert_eq!(None, filter.value());
        assert_eq!(None, filter.last_updated);

        // After the first update, the first value is the min
        let now = NoopClock.get_time();
        filter.update(7, now);
        assert_eq!(Some(7), filter.value());
        assert_eq!(Some(now), filter.last_updated);

        // A lower value is received
        let now = now + Duration::from_secs(5);
        filter.update(3, now);
        assert_eq!(Some(3), filter.value());
        assert_eq!(Some(now), filter.last_updated);

        // A value higher than the min is received, no update to the value
        let now = now + Duration::from_secs(9);
        filter.update(4, now);
        assert_eq!(Some(3), filter.value());

        // A value higher than the min is received, but the current min has expired
        let now = now + Duration::from_secs(1);
        filter.update(4, now);
        assert_eq!(Some(4), filter.value());
        assert_eq!(Some(now), filter.last_updated);
    }

    #[test]
    fn max_filter_over_rounds() {
        let mut filter = WindowedMaxFilter::new(10u64);
        assert_eq!(None, filter.value());

        let mut round = 0u64;
        filter.update(7, round);
        assert_eq!(Some(7), filter.value());

        round += 1;
        filter.update(8, round);
        assert_eq!(Some(8), filter.value());

        // lower samples do not replace the max within the window
        round += 9;
        filter.update(4, round);
        assert_eq!(Some(8), filter.value());
        assert!(!filter.window_expired(round));

        // the max is replaced once it is 10 rounds old
        round += 1;
        filter.update(4, round);
        assert_eq!(Some(4), filter.value());

        filter.reset();
        assert_eq!(None, filter.value());
    }

    #[test]
    fn min_rtt_expiration() {
        let mut filter = MinRttFilter::new(Duration::from_secs(10));
        let now = NoopClock.get_time();
        assert_eq!(None, filter.min_rtt());
        assert!(!filter.expired());

        filter.update(Duration::from_millis(50), now);
        filter.update(Duration::from_millis(70), now + Duration::from_secs(5));
        assert_eq!(Some(Duration::from_millis(50)), filter.min_rtt());
        assert!(!filter.expired());

        // the estimate expires and is replaced by the next sample
        let now = now + Duration::from_secs(10);
        filter.update(Duration::from_millis(70), now);
        assert_eq!(Some(Duration::from_millis(70)), filter.min_rtt());
        assert!(filter.expired());

        // a refresh postpones the next expiration
        let now = now + Duration::from_secs(9);
        filter.refresh(now);
        assert!(!filter.expired());
        filter.update(Duration::from_millis(90), now + Duration::from_secs(9));
        assert!(!filter.expired());
        assert_eq!(Some(Duration::from_millis(70)), filter.min_rtt());
    }
}
