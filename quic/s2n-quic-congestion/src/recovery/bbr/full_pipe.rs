// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    counter::{Counter, Saturating},
    recovery::bandwidth::Bandwidth,
};
use num_rational::Ratio;

/// Estimator for determining if BBR has fully utilized its available bandwidth ("filled the pipe")
#[derive(Debug, Clone)]
pub(crate) struct Estimator {
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#2.13
    //# A boolean that records whether BBR estimates that it has ever
    //# fully utilized its available bandwidth ("filled the pipe").
    filled_pipe: bool,
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#2.13
    //# A recent baseline BBR.max_bw to estimate if BBR has "filled the pipe" in Startup.
    full_bw: Bandwidth,
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#2.13
    //# The number of non-app-limited round trips without large increases in BBR.full_bw.
    full_bw_count: Counter<u8, Saturating>,
    /// The growth over `full_bw` required to restart the count
    growth_target: Ratio<u64>,
    /// Rounds without growth before the pipe is considered full
    rounds: u8,
}

impl Estimator {
    pub fn new(growth_target: Ratio<u64>, rounds: u8) -> Self {
        Self {
            filled_pipe: false,
            full_bw: Bandwidth::ZERO,
            full_bw_count: Counter::default(),
            growth_target,
            rounds,
        }
    }

    /// Returns true if BBR estimates that is has ever fully utilized its available bandwidth
    #[inline]
    pub fn filled_pipe(&self) -> bool {
        self.filled_pipe
    }

    /// Called on each new BBR round
    #[inline]
    pub fn on_round_start(&mut self, max_bw: Bandwidth, is_app_limited: bool) {
        if self.filled_pipe {
            return;
        }

        self.filled_pipe = self.bandwidth_plateaued(max_bw, is_app_limited);
    }

    /// An ECN congestion signal in Startup is taken as evidence the bottleneck was reached
    #[inline]
    pub fn on_explicit_congestion(&mut self) {
        self.filled_pipe = true;
    }

    /// Determines if the rate of increase of bandwidth has decreased enough to estimate the
    /// available bandwidth has been fully utilized.
    #[inline]
    fn bandwidth_plateaued(&mut self, max_bw: Bandwidth, is_app_limited: bool) -> bool {
        //# If BBR notices that there are several (three) rounds where attempts to double
        //# the delivery rate actually result in little increase (less than 25 percent),
        //# then it estimates that it has reached BBR.max_bw, sets BBR.filled_pipe to true,
        //# exits Startup and enters Drain.
        if is_app_limited {
            //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.3.1.2
            //# Once per round trip, upon an ACK that acknowledges new data, and when
            //# the delivery rate sample is not application-limited (see [draft-
            //# cheng-iccrg-delivery-rate-estimation]), BBR runs the "full pipe" estimator
            return false;
        }

        if max_bw >= self.full_bw * self.growth_target {
            // still growing?
            self.full_bw = max_bw; // record new baseline level
            self.full_bw_count = Counter::default(); // restart the count
            return false;
        }

        /* another round w/o much growth */
        self.full_bw_count += 1;

        self.full_bw_count >= self.rounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn estimator() -> Estimator {
        Estimator::new(Ratio::new_raw(5, 4), 3)
    }

    #[test]
    fn bandwidth_plateau() {
        let mut fp_estimator = estimator();
        let mut max_bw = Bandwidth::new(1000, Duration::from_secs(1));
        fp_estimator.on_round_start(max_bw, false);

        // Grow at 25% over 3 rounds
        for _ in 0..3 {
            max_bw = max_bw * Ratio::new_raw(5, 4);
            fp_estimator.on_round_start(max_bw, false);
        }
        // The pipe has not been filled yet since we have continued to grow bandwidth
        assert!(!fp_estimator.filled_pipe());

        // Three rounds with 24% growth, not growing fast enough to continue
        max_bw = max_bw * Ratio::new_raw(31, 25);
        for _ in 0..2 {
            fp_estimator.on_round_start(max_bw, false);
            assert!(!fp_estimator.filled_pipe());
        }
        fp_estimator.on_round_start(max_bw, false);

        // The pipe is considered full
        assert!(fp_estimator.filled_pipe());
    }

    #[test]
    fn bandwidth_plateau_app_limited() {
        let mut fp_estimator = estimator();
        let max_bw = Bandwidth::new(1000, Duration::from_secs(1));
        fp_estimator.on_round_start(max_bw, false);

        // No growth, but app limited
        for _ in 0..5 {
            fp_estimator.on_round_start(max_bw, true);
        }

        // The pipe has not been filled yet since we were app limited
        assert!(!fp_estimator.filled_pipe());
    }

    #[test]
    fn explicit_congestion() {
        let mut fp_estimator = estimator();
        fp_estimator.on_explicit_congestion();
        assert!(fp_estimator.filled_pipe());
    }
}
