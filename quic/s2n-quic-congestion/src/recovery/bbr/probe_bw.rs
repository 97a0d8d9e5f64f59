// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    recovery::bbr::{self, BbrCongestionController},
    time::{Duration, Timestamp},
};
use num_rational::Ratio;
use num_traits::One;
use rand::Rng;

const CYCLE_LENGTH: usize = 8;

//= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-00#4.3.4.3
//# BBR's ProbeBW gain cycle [...] uses an eight-phase cycle with the following pacing_gain
//# values: 5/4, 3/4, 1, 1, 1, 1, 1, 1.
const PACING_GAIN_CYCLE: [Ratio<u64>; CYCLE_LENGTH] = [
    Ratio::new_raw(5, 4),
    Ratio::new_raw(3, 4),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
    Ratio::new_raw(1, 1),
];

/// The phase that drains the queue built while probing
const DRAIN_PHASE: usize = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct State {
    pub(super) cycle_index: usize,
    /// The start of the current phase, unset until the next ack after an ECN driven drain
    pub(super) cycle_start: Option<Timestamp>,
}

impl State {
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-00#4.3.4.3
    //# To improve mixing and fairness, and to reduce queues when multiple BBR flows share a
    //# bottleneck, BBR randomizes the phases of ProbeBW gain cycling by randomly picking an
    //# initial phase, from among all but the 3/4 phase, when entering ProbeBW.
    pub fn new<R: Rng>(random_generator: &mut R, now: Timestamp) -> Self {
        let cycle_index = random_generator.random_range(0..CYCLE_LENGTH - 1);
        let cycle_index = if cycle_index >= DRAIN_PHASE {
            cycle_index + 1
        } else {
            cycle_index
        };

        Self {
            cycle_index,
            cycle_start: Some(now),
        }
    }

    #[inline]
    pub fn pacing_gain(&self) -> Ratio<u64> {
        PACING_GAIN_CYCLE[self.cycle_index]
    }

    /// Jumps to the draining phase after explicit congestion
    #[inline]
    pub fn enter_drain_phase(&mut self) {
        self.cycle_index = DRAIN_PHASE;
        self.cycle_start = None;
    }

    #[inline]
    fn advance(&mut self, now: Timestamp) {
        self.cycle_index = (self.cycle_index + 1) % CYCLE_LENGTH;
        self.cycle_start = Some(now);
    }
}

impl BbrCongestionController {
    /// Enters ProbeBW at a random phase of the gain cycle
    pub(super) fn enter_probe_bw(&mut self, now: Timestamp) {
        let state = State::new(&mut self.random_generator, now);
        self.transition_to(bbr::State::ProbeBw(state));
    }

    /// Advances the gain cycle if the current phase has run its course
    pub(super) fn check_cycle_phase(&mut self, now: Timestamp, prior_bytes_in_flight: u32) {
        let bbr::State::ProbeBw(ref probe_bw) = self.state else {
            return;
        };

        let should_advance = match probe_bw.cycle_start {
            Some(cycle_start) if !self.exiting_quiescence => {
                let min_rtt = self.min_rtt_filter.min_rtt().unwrap_or(Duration::ZERO);
                let is_full_length = now.saturating_duration_since(cycle_start) > min_rtt;
                let pacing_gain = probe_bw.pacing_gain();

                if pacing_gain > Ratio::one() {
                    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-00#4.3.4.3
                    //# the 5/4 phase lasts until the elapsed time exceeds min_rtt and either
                    //# inflight has reached 5/4 * estimated_BDP or loss occurred
                    self.loss_in_round
                        || (is_full_length
                            && prior_bytes_in_flight >= self.target_congestion_window(pacing_gain))
                } else if pacing_gain < Ratio::one() {
                    is_full_length
                        || prior_bytes_in_flight <= self.target_congestion_window(Ratio::one())
                } else {
                    is_full_length
                }
            }
            _ => false,
        };

        if let bbr::State::ProbeBw(ref mut probe_bw) = self.state {
            if probe_bw.cycle_start.is_none() || self.exiting_quiescence {
                // restart the phase timing without moving through the cycle
                probe_bw.cycle_start = Some(now);
            } else if should_advance {
                probe_bw.advance(now);
            }
        }
    }
}
