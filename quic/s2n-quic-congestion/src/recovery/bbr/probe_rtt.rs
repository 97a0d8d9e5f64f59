// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    recovery::{
        bbr::{self, BbrCongestionController},
        CongestionController,
    },
    time::Timestamp,
};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct State {
    /// When the minimum time in ProbeRTT ends, set once in flight has drained to the minimum
    /// window
    pub(super) done_timestamp: Option<Timestamp>,
    /// The largest packet sent when the drained window was reached
    round_end: Option<u64>,
    /// A full round was acknowledged at the drained window
    round_done: bool,
}

impl BbrCongestionController {
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.3.5
    //# If the BBR.RTprop has not been updated (i.e., by getting a lower RTT measurement) for
    //# more than ProbeRTTInterval = 10 seconds, then BBR enters ProbeRTT and reduces the cwnd
    //# to a minimal value, BBRMinPipeCwnd (four packets).
    pub(super) fn check_probe_rtt(&mut self, now: Timestamp, largest_ack: u64, largest_sent: u64) {
        if !self.state.is_probing_rtt()
            && self.min_rtt_filter.expired()
            && !self.exiting_quiescence
        {
            self.previous_congestion_window = self.congestion_window();
            self.transition_to(bbr::State::ProbeRtt(State::default()));
        }

        if !self.state.is_probing_rtt() {
            return;
        }

        // samples taken at the minimum window do not reflect the bottleneck
        self.app_limited_exit_target = Some(largest_sent);

        let bytes_in_flight = self.inflight.bytes_in_flight();
        let minimum_window = self.minimum_window;
        let probe_rtt_duration = self.parameters.probe_rtt_duration;

        let bbr::State::ProbeRtt(ref mut probe_rtt) = self.state else {
            return;
        };

        let done = match probe_rtt.done_timestamp {
            None => {
                //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.3.5
                //# After maintaining BBRMinPipeCwnd or fewer packets in flight for at least
                //# ProbeRTTDuration (200 ms) and one round trip, BBR leaves ProbeRTT
                if bytes_in_flight <= minimum_window {
                    probe_rtt.done_timestamp = Some(now + probe_rtt_duration);
                    probe_rtt.round_end = Some(largest_sent);
                }
                false
            }
            Some(done_timestamp) => {
                if probe_rtt
                    .round_end
                    .is_some_and(|round_end| largest_ack > round_end)
                {
                    probe_rtt.round_done = true;
                }
                probe_rtt.round_done && now.has_elapsed(done_timestamp)
            }
        };

        if done {
            self.exit_probe_rtt(now);
        }
    }

    fn exit_probe_rtt(&mut self, now: Timestamp) {
        self.min_rtt_filter.refresh(now);
        self.congestion_window = self
            .congestion_window
            .max(self.previous_congestion_window);

        if self.full_pipe_estimator.filled_pipe() {
            self.enter_probe_bw(now);
        } else {
            self.transition_to(bbr::State::Startup);
        }
    }
}
