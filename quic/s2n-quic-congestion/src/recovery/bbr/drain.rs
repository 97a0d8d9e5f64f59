// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{recovery::bbr::BbrCongestionController, time::Timestamp};
use num_rational::Ratio;
use num_traits::One;

impl BbrCongestionController {
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.3.2
    //# In Drain, when the number of packets in flight matches the estimated BDP, meaning BBR
    //# estimates that the queue has been fully drained but the pipe is still full, then BBR
    //# leaves Drain and enters ProbeBW.
    pub(super) fn check_drain_done(&mut self, now: Timestamp) {
        if self.state.is_drain()
            && self.inflight.bytes_in_flight() <= self.target_congestion_window(Ratio::one())
        {
            self.enter_probe_bw(now);
        }
    }
}
