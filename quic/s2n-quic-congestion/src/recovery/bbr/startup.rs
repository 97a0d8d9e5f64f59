// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::recovery::bbr::{BbrCongestionController, State};

impl BbrCongestionController {
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.3.2
    //# Upon exiting Startup, BBR enters its Drain state.
    /// Moves to Drain once the full pipe estimator finds the bottleneck
    pub(super) fn check_startup_done(&mut self, round_start: bool, is_app_limited: bool) {
        if !self.state.is_startup() {
            return;
        }

        if round_start {
            self.full_pipe_estimator
                .on_round_start(self.bandwidth(), is_app_limited);
        }

        if self.full_pipe_estimator.filled_pipe() {
            tracing::debug!(
                bandwidth = self.bandwidth().bits_per_second(),
                round_count = self.round_counter.round_count(),
                "bottleneck bandwidth found"
            );
            self.transition_to(State::Drain);
        }
    }
}
