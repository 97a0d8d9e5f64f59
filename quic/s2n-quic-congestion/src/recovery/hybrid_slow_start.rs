// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::Duration;

/// An implementation of HyStart++ as specified in <https://www.rfc-editor.org/rfc/rfc9406>
///
/// Rounds are delimited by packet numbers: a round ends when a packet sent after the start of the
/// round is acknowledged. Minimum RTT samples from consecutive rounds are compared, and an
/// increase over the delay threshold moves slow start into Conservative Slow Start (CSS). If the
/// delay increase persists for `CSS_ROUNDS`, slow start is exited.
#[derive(Clone, Debug)]
pub(crate) struct HybridSlowStart {
    enabled: bool,
    state: State,
    sample_count: usize,
    last_round_min_rtt: Option<Duration>,
    current_round_min_rtt: Option<Duration>,
    /// Packet number that ends the current round
    round_end: Option<u64>,
    /// The slow start threshold, in bytes
    pub(super) threshold: f32,
    max_datagram_size: u16,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum State {
    /// Standard slow start, sampling for a delay increase
    NotStarted,
    /// Conservative slow start
    Active {
        baseline_min_rtt: Duration,
        rounds_remaining: u8,
    },
    /// Slow start was exited, HyStart takes no further action until reset
    Done,
}

/// Minimum slow start threshold in multiples of the max_datagram_size.
/// Defined as "hystart_low_window" in tcp_cubic.c
const LOW_SSTHRESH: u16 = 16;

//= https://www.rfc-editor.org/rfc/rfc9406#section-4.3
//# MIN_RTT_THRESH = 4 msec
//# MAX_RTT_THRESH = 16 msec
//# MIN_RTT_DIVISOR = 8
//# N_RTT_SAMPLE = 8
//# CSS_GROWTH_DIVISOR = 4
//# CSS_ROUNDS = 5
const MIN_DELAY_THRESHOLD: Duration = Duration::from_millis(4);
const MAX_DELAY_THRESHOLD: Duration = Duration::from_millis(16);
const THRESHOLD_DIVIDEND: u32 = 8;
const N_SAMPLING: usize = 8;
const CSS_GROWTH_DIVISOR: f32 = 4.0;
const CSS_ROUNDS: u8 = 5;

impl HybridSlowStart {
    /// Constructs a new `HybridSlowStart`. `max_datagram_size` is used for determining
    /// the minimum window at which delay increases are acted upon.
    pub fn new(max_datagram_size: u16, enabled: bool) -> Self {
        Self {
            enabled,
            state: State::NotStarted,
            sample_count: 0,
            last_round_min_rtt: None,
            current_round_min_rtt: None,
            round_end: None,
            //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.1
            //# A sender begins in slow start because the slow start threshold
            //# is initialized to an infinite value.
            threshold: f32::MAX,
            max_datagram_size,
        }
    }

    /// The congestion window increase for `bytes_acknowledged` while in slow start
    #[inline]
    pub fn cwnd_increment(&self, bytes_acknowledged: u32) -> f32 {
        //= https://www.rfc-editor.org/rfc/rfc9406#section-4.2
        //# cwnd = cwnd + (min(N, L * SMSS) / CSS_GROWTH_DIVISOR)
        match self.state {
            State::Active { .. } => bytes_acknowledged as f32 / CSS_GROWTH_DIVISOR,
            _ => bytes_acknowledged as f32,
        }
    }

    /// True while in Conservative Slow Start
    #[cfg(test)]
    pub fn is_conservative(&self) -> bool {
        matches!(self.state, State::Active { .. })
    }

    /// Called for each ACK received in slow start
    ///
    /// Returns true if slow start should be exited, in which case `threshold` has been set to
    /// the current `congestion_window`.
    pub fn on_ack(
        &mut self,
        congestion_window: f32,
        min_rtt: Option<Duration>,
        largest_ack: u64,
        largest_sent_packet_number: u64,
    ) -> bool {
        if !self.enabled || self.state == State::Done {
            return false;
        }

        let Some(rtt) = min_rtt else {
            return false;
        };

        //= https://www.rfc-editor.org/rfc/rfc9406#section-4.2
        //# At the start of each round during standard slow start [RFC5681] and
        //# CSS, initialize the variables used to compute the last round's and
        //# current round's minimum RTT
        let round_is_over = self.round_end.is_none_or(|end| largest_ack >= end);
        if round_is_over {
            // End this round when packets sent after the current last sent packet
            // start getting acknowledged.
            self.round_end = Some(largest_sent_packet_number);
            self.last_round_min_rtt = self.current_round_min_rtt.take();
            self.sample_count = 0;

            if let State::Active {
                ref mut rounds_remaining,
                ..
            } = self.state
            {
                *rounds_remaining = rounds_remaining.saturating_sub(1);
                if *rounds_remaining == 0 {
                    tracing::debug!(congestion_window, "exiting conservative slow start");
                    self.exit(congestion_window);
                    return true;
                }
            }
        }

        if self.sample_count < N_SAMPLING {
            // Sample the delay, saving the minimum
            self.current_round_min_rtt = Some(rtt.min(self.current_round_min_rtt.unwrap_or(rtt)));
            self.sample_count += 1;
        }

        match self.state {
            State::NotStarted => {
                // We've gathered enough samples and there have been at least 2 RTT rounds
                // to compare, so check if the delay has increased between the rounds
                if let (N_SAMPLING, Some(last_round_min_rtt), Some(current_round_min_rtt)) = (
                    self.sample_count,
                    self.last_round_min_rtt,
                    self.current_round_min_rtt,
                ) {
                    let threshold = last_round_min_rtt / THRESHOLD_DIVIDEND;
                    // Clamp n to the min and max thresholds
                    let threshold = threshold.clamp(MIN_DELAY_THRESHOLD, MAX_DELAY_THRESHOLD);
                    let delay_increase_is_over_threshold =
                        current_round_min_rtt >= last_round_min_rtt + threshold;
                    let congestion_window_is_above_minimum =
                        congestion_window >= self.low_ssthresh();

                    if delay_increase_is_over_threshold && congestion_window_is_above_minimum {
                        tracing::debug!(
                            ?last_round_min_rtt,
                            ?current_round_min_rtt,
                            "entering conservative slow start"
                        );
                        self.state = State::Active {
                            baseline_min_rtt: current_round_min_rtt,
                            rounds_remaining: CSS_ROUNDS,
                        };
                    }
                }
            }
            State::Active {
                baseline_min_rtt, ..
            } => {
                //= https://www.rfc-editor.org/rfc/rfc9406#section-4.2
                //# If the RTT decreases below CSS_BASELINE_MIN_RTT
                //# the sender returns to slow start
                if self
                    .current_round_min_rtt
                    .is_some_and(|current| current < baseline_min_rtt)
                {
                    self.state = State::NotStarted;
                }
            }
            State::Done => {}
        }

        false
    }

    /// Called when a congestion event is experienced. Sets the slow start threshold
    /// to `ssthresh` and stops HyStart for the remainder of the connection.
    pub fn on_congestion_event(&mut self, ssthresh: f32) {
        self.threshold = ssthresh;
        self.state = State::Done;
    }

    /// Enters congestion avoidance directly at `congestion_window`
    pub fn exit(&mut self, congestion_window: f32) {
        self.threshold = congestion_window;
        self.state = State::Done;
    }

    fn low_ssthresh(&self) -> f32 {
        (LOW_SSTHRESH as u32 * self.max_datagram_size as u32) as f32
    }
}
