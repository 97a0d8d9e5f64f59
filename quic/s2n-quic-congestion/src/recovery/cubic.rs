// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    counter::{Counter, Saturating},
    event::{AckEvent, EcnEvent, LossEvent},
    recovery::{
        bandwidth::Bandwidth,
        congestion_controller::{CongestionController, NetworkStatistics},
        cubic::State::*,
        hybrid_slow_start::HybridSlowStart,
        inflight::Inflight,
        pacing::{self, Pacer},
    },
    settings::{Algorithm, Settings},
    time::{Duration, Timestamp},
};

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.3
//#                 New Path or      +------------+
//#            persistent congestion |   Slow     |
//#        (O)---------------------->|   Start    |
//#                                  +------------+
//#                                        |
//#                                Loss or |
//#                        ECN-CE increase |
//#                                        v
//# +------------+     Loss or       +------------+
//# | Congestion |  ECN-CE increase  |  Recovery  |
//# | Avoidance  |------------------>|   Period   |
//# +------------+                   +------------+
//#           ^                            |
//#           |                            |
//#           +----------------------------+
//#              Acknowledgment of packet
//#                sent during recovery
// This implementation uses Hybrid Slow Start, which allows for
// Slow Start to exit directly to Congestion Avoidance.
#[derive(Clone, Debug, PartialEq, Eq)]
enum State {
    SlowStart,
    Recovery { persistent_congestion: bool },
    CongestionAvoidance(CongestionAvoidanceTiming),
}

impl State {
    /// Returns State::CongestionAvoidance initialized with the given `start_time`
    fn congestion_avoidance(start_time: Timestamp) -> Self {
        Self::CongestionAvoidance(CongestionAvoidanceTiming {
            start_time,
            window_increase_time: start_time,
            app_limited_time: None,
        })
    }

    /// Called when an ACK is received while the sender is app limited
    fn on_app_limited(&mut self, timestamp: Timestamp) {
        if let CongestionAvoidance(ref mut timing) = self {
            debug_assert!(
                timing
                    .app_limited_time
                    .is_none_or(|app_limited_time| timestamp >= app_limited_time),
                "timestamp must be monotonically increasing"
            );

            timing.app_limited_time = Some(timing.app_limited_time.unwrap_or(timestamp));
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct CongestionAvoidanceTiming {
    // The time the congestion avoidance state was entered
    start_time: Timestamp,
    // The time the congestion window was last increased
    window_increase_time: Timestamp,
    // The time the current congestion window started to be underutilized
    app_limited_time: Option<Timestamp>,
}

impl CongestionAvoidanceTiming {
    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.1
    //# t is the elapsed time from the beginning of the current congestion avoidance
    fn t(&self, timestamp: Timestamp) -> Duration {
        timestamp - self.start_time
    }

    /// Called when the congestion window is being increased.
    ///
    /// Adjusts the start time by the period the sender was app limited to avoid counting it
    /// in W_cubic.
    fn on_window_increase(&mut self, timestamp: Timestamp) {
        if let Some(app_limited_time) = self.app_limited_time.take() {
            //= https://www.rfc-editor.org/rfc/rfc8312#section-5.8
            //# In case of long periods when cwnd has not been updated due
            //# to the application rate limit, such as idle periods, t in Eq. 1 MUST
            //# NOT include these periods; otherwise, W_cubic(t) might be very high
            //# after restarting from these periods.
            self.shift(timestamp - app_limited_time, timestamp);
        }

        self.window_increase_time = timestamp;
    }

    /// Moves the start of the epoch forward by an idle period, never past `now`
    fn shift(&mut self, idle: Duration, now: Timestamp) {
        self.start_time = (self.start_time + idle).min(now);
    }
}

/// Cubic tuning constants
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Parameters {
    //= https://www.rfc-editor.org/rfc/rfc8312#section-5.1
    //# Based on these observations and our experiments, we find C=0.4
    //# gives a good balance between TCP-friendliness and aggressiveness
    //# of window increase.  Therefore, C SHOULD be set to 0.4.
    pub c: f32,
    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.5
    //# Parameter beta_cubic SHOULD be set to 0.7.
    pub beta: f32,
    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.6
    //# To speed up this bandwidth release by
    //# existing flows, the following mechanism called "fast convergence"
    //# SHOULD be implemented.
    pub fast_convergence: bool,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            c: 0.4,
            beta: 0.7,
            fast_convergence: true,
        }
    }
}

impl Parameters {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        if !(self.c.is_finite() && self.c > 0.0) {
            return Err("c must be a positive number");
        }
        if !(self.beta > 0.0 && self.beta < 1.0) {
            return Err("beta must be between 0 and 1");
        }
        Ok(())
    }
}

/// A congestion controller that implements "CUBIC for Fast Long-Distance Networks"
/// as specified in <https://tools.ietf.org/html/rfc8312>. HyStart++ is used for
/// exiting slow start before the first loss.
#[derive(Clone, Debug)]
pub struct CubicCongestionController {
    settings: Settings,
    cubic: Cubic,
    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.8
    //# CUBIC MUST employ a slow-start algorithm, when the cwnd is no more
    //# than ssthresh.
    slow_start: HybridSlowStart,
    pacer: Pacer,
    inflight: Inflight,
    congestion_window: f32,
    state: State,
    /// The largest packet number sent when the most recent congestion response was made
    ///
    /// Losses and ECN marks of packets up to this number belong to the same congestion epoch.
    recovery_sent_packet_number: Option<u64>,
    /// The state before the most recent loss response, restored if the loss was spurious
    spurious_snapshot: Option<Snapshot>,
    is_app_limited: bool,
    time_of_last_ack: Option<Timestamp>,
    smoothed_rtt: Option<Duration>,
    min_rtt: Option<Duration>,
    congestion_event_count: Counter<u32, Saturating>,
}

#[derive(Clone, Debug)]
struct Snapshot {
    congestion_window: f32,
    cubic: Cubic,
    slow_start: HybridSlowStart,
    state: State,
    recovery_sent_packet_number: Option<u64>,
}

impl CongestionController for CubicCongestionController {
    #[inline]
    fn can_send(&self) -> bool {
        self.inflight.can_send(self.congestion_window())
    }

    #[inline]
    fn set_exemption(&mut self, packets: u8) {
        self.inflight.set_exemption(packets);
    }

    fn reset(&mut self, full_reset: bool) {
        let settings = self.settings;
        self.cubic.reset();
        self.slow_start = HybridSlowStart::new(settings.max_datagram_size(), settings.hystart_enabled());
        self.congestion_window = settings.initial_window() as f32;
        self.state = SlowStart;
        self.recovery_sent_packet_number = None;
        self.spurious_snapshot = None;
        self.is_app_limited = false;
        self.time_of_last_ack = None;
        self.pacer.reset();
        self.inflight.reset(full_reset, self.congestion_window());

        if full_reset {
            self.smoothed_rtt = None;
            self.min_rtt = None;
            self.congestion_event_count = Counter::default();
        }
    }

    fn send_allowance(&mut self, time_since_last_send: Option<Duration>) -> u32 {
        let congestion_window = self.congestion_window();
        let available = self.inflight.available(congestion_window);

        if available == 0 {
            // an exempt packet may still be sent over the window
            return if self.inflight.exemptions() > 0 {
                self.settings.max_datagram_size() as u32
            } else {
                0
            };
        }

        let paced_bytes = match (time_since_last_send, self.smoothed_rtt) {
            (Some(elapsed), Some(smoothed_rtt)) if self.settings.pacing_enabled() => {
                let estimated_window = pacing::estimated_window(
                    congestion_window,
                    self.state == SlowStart,
                    self.slow_start_threshold(),
                );
                pacing::paced_bytes(estimated_window, elapsed, smoothed_rtt)
            }
            _ => None,
        };

        self.pacer.send_allowance(available, paced_bytes)
    }

    #[inline]
    fn on_data_sent(&mut self, bytes: u32) {
        self.inflight.on_data_sent(bytes);
        self.pacer.on_data_sent(bytes);

        if self.is_app_limited && self.inflight.bytes_in_flight() >= self.congestion_window() {
            self.is_app_limited = false;
        }
    }

    #[inline]
    fn on_data_invalidated(&mut self, bytes: u32) -> bool {
        let was_blocked = !self.can_send();
        self.inflight.on_data_removed(bytes);
        was_blocked && self.can_send()
    }

    fn on_data_acknowledged(&mut self, ack: &AckEvent) -> bool {
        let previous_window = self.congestion_window;
        let now = ack.time_now;
        self.inflight.on_data_removed(ack.retransmittable_bytes);

        if !ack.is_implicit {
            self.smoothed_rtt = Some(ack.smoothed_rtt);
            self.min_rtt = match (self.min_rtt, ack.min_rtt) {
                (Some(min_rtt), Some(sample)) => Some(min_rtt.min(sample)),
                (min_rtt, sample) => min_rtt.or(sample),
            };
        }

        let idle = self
            .time_of_last_ack
            .replace(now)
            .map(|time_of_last_ack| now - time_of_last_ack)
            .filter(|gap| *gap > self.settings.send_idle_timeout().max(ack.smoothed_rtt));

        // Check if this ack causes the controller to exit recovery
        if let Recovery { .. } = self.state {
            if self
                .recovery_sent_packet_number
                .is_some_and(|recovery_sent_packet_number| {
                    ack.largest_ack > recovery_sent_packet_number
                })
            {
                //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.2
                //# A recovery period ends and the sender enters congestion avoidance
                //# when a packet sent during the recovery period is acknowledged.
                self.leave_recovery(now);
                tracing::debug!(
                    congestion_window = self.congestion_window(),
                    "exited recovery"
                );
            }
            // Don't increase the congestion window on the ack that ends recovery
            return false;
        }

        if ack.retransmittable_bytes == 0 {
            return false;
        }

        if self.is_app_limited {
            self.state.on_app_limited(now);

            //= https://www.rfc-editor.org/rfc/rfc9002#section-7.8
            //# When bytes in flight is smaller than the congestion window and
            //# sending is not pacing limited, the congestion window is
            //# underutilized.  This can happen due to insufficient application data
            //# or flow control limits.  When this occurs, the congestion window
            //# SHOULD NOT be increased in either slow start or congestion avoidance.
            return false;
        }

        match self.state {
            SlowStart => {
                //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.1
                //# While a sender is in slow start, the congestion window increases by
                //# the number of bytes acknowledged when each acknowledgment is
                //# processed.  This results in exponential growth of the congestion
                //# window.
                self.congestion_window += self.slow_start.cwnd_increment(ack.retransmittable_bytes);

                let hystart_exit = self.slow_start.on_ack(
                    self.congestion_window,
                    ack.min_rtt,
                    ack.largest_ack,
                    ack.largest_sent_packet_number,
                );

                if hystart_exit || self.congestion_window >= self.slow_start.threshold {
                    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.8
                    //# In the case when CUBIC runs the hybrid slow start [HR08], it may exit
                    //# the first slow start without incurring any packet loss and thus W_max
                    //# is undefined.  In this special case, CUBIC switches to congestion
                    //# avoidance and increases its congestion window size using Eq. 1, where
                    //# t is the elapsed time since the beginning of the current congestion
                    //# avoidance, K is set to 0, and W_max is set to the congestion window
                    //# size at the beginning of the current congestion avoidance.
                    self.state = State::congestion_avoidance(now);
                    self.cubic.on_slow_start_exit(self.congestion_window);
                    tracing::debug!(
                        congestion_window = self.congestion_window(),
                        hystart_exit,
                        "exited slow start"
                    );
                }
            }
            Recovery { .. } => {
                // Don't increase the congestion window while in recovery
            }
            CongestionAvoidance(ref mut timing) => {
                if let Some(idle) = idle {
                    timing.shift(idle, now);
                }
                timing.on_window_increase(now);

                //= https://www.rfc-editor.org/rfc/rfc8312#section-4.1
                //# t is the elapsed time from the beginning of the current congestion avoidance
                let t = timing.t(now);

                // The Linux Kernel Cubic implementation uses min RTT since it is more stable
                // than smoothed_rtt, and other implementations have followed.
                let rtt = ack.rtt();

                self.congestion_avoidance(t, rtt, ack.retransmittable_bytes);
            }
        };

        // The window may not grow more than twice what has actually been in flight, so an
        // application limited sender does not inflate it.
        let growth_limit = 2.0 * self.inflight.bytes_in_flight_max() as f32;
        if self.congestion_window > growth_limit {
            self.congestion_window = growth_limit.max(previous_window);
        }
        self.congestion_window = self
            .congestion_window
            .min(self.settings.maximum_window() as f32);

        debug_assert!(self.congestion_window >= self.cubic.minimum_window);

        self.congestion_window > previous_window
    }

    fn on_data_lost(&mut self, loss: &LossEvent) {
        self.inflight.on_data_removed(loss.retransmittable_bytes);

        let new_epoch = self
            .recovery_sent_packet_number
            .is_none_or(|recovery_sent_packet_number| {
                loss.largest_packet_number_lost > recovery_sent_packet_number
            });
        let in_persistent_congestion = self.state
            == Recovery {
                persistent_congestion: true,
            };

        if !new_epoch && !(loss.persistent_congestion && !in_persistent_congestion) {
            // already responded to this congestion epoch
            return;
        }

        self.save_snapshot();
        self.recovery_sent_packet_number = Some(loss.largest_sent_packet_number);
        self.on_congestion_event(loss.persistent_congestion);
    }

    fn on_ecn(&mut self, ecn: &EcnEvent) {
        let new_epoch = self
            .recovery_sent_packet_number
            .is_none_or(|recovery_sent_packet_number| {
                ecn.largest_packet_number_acked > recovery_sent_packet_number
            });

        if !new_epoch {
            return;
        }

        // ECN responses are not reverted
        self.spurious_snapshot = None;
        self.recovery_sent_packet_number = Some(ecn.largest_sent_packet_number);
        self.on_congestion_event(false);
    }

    fn on_spurious_congestion_event(&mut self) -> bool {
        if !self.is_in_recovery() {
            return false;
        }

        let Some(snapshot) = self.spurious_snapshot.take() else {
            return false;
        };

        self.congestion_window = snapshot.congestion_window;
        self.cubic = snapshot.cubic;
        self.slow_start = snapshot.slow_start;
        self.state = snapshot.state;
        self.recovery_sent_packet_number = snapshot.recovery_sent_packet_number;

        tracing::debug!(
            congestion_window = self.congestion_window(),
            "reverted spurious congestion event"
        );

        true
    }

    fn log_out_flow_status(&self) {
        tracing::debug!(
            algorithm = %Algorithm::Cubic,
            congestion_window = self.congestion_window(),
            bytes_in_flight = self.inflight.bytes_in_flight(),
            bytes_in_flight_max = self.inflight.bytes_in_flight_max(),
            exemptions = self.inflight.exemptions(),
            slow_start_threshold = ?self.slow_start_threshold(),
            w_max = self.cubic.w_max,
            k = ?self.cubic.k,
            in_recovery = self.is_in_recovery(),
            "out flow status"
        );
    }

    #[inline]
    fn exemptions(&self) -> u8 {
        self.inflight.exemptions()
    }

    #[inline]
    fn bytes_in_flight(&self) -> u32 {
        self.inflight.bytes_in_flight()
    }

    #[inline]
    fn bytes_in_flight_max(&self) -> u32 {
        self.inflight.bytes_in_flight_max()
    }

    #[inline]
    fn congestion_window(&self) -> u32 {
        self.congestion_window as u32
    }

    #[inline]
    fn is_app_limited(&self) -> bool {
        self.is_app_limited
    }

    #[inline]
    fn set_app_limited(&mut self) {
        if self.inflight.bytes_in_flight() < self.congestion_window() {
            self.is_app_limited = true;
        }
    }

    fn network_statistics(&self) -> NetworkStatistics {
        let bandwidth = self.smoothed_rtt.map_or(0, |smoothed_rtt| {
            Bandwidth::new(self.congestion_window() as u64, smoothed_rtt).bytes_per_second()
        });

        NetworkStatistics {
            algorithm: Algorithm::Cubic,
            congestion_window: self.congestion_window(),
            bytes_in_flight: self.inflight.bytes_in_flight(),
            bytes_in_flight_max: self.inflight.bytes_in_flight_max(),
            smoothed_rtt: self.smoothed_rtt,
            min_rtt: self.min_rtt,
            bandwidth,
            congestion_event_count: *self.congestion_event_count,
            in_recovery: self.is_in_recovery(),
        }
    }

    #[inline]
    fn is_in_recovery(&self) -> bool {
        matches!(self.state, Recovery { .. })
    }

    #[inline]
    fn algorithm(&self) -> Algorithm {
        Algorithm::Cubic
    }

    fn seed_congestion_window(&mut self, window: u32, now: Timestamp) {
        let window = self.settings.clamp_window(window) as f32;
        self.congestion_window = window;
        self.slow_start.exit(window);
        self.cubic.on_slow_start_exit(window);
        self.state = State::congestion_avoidance(now);
    }
}

impl CubicCongestionController {
    pub fn new(settings: &Settings) -> Self {
        let mut controller = Self {
            settings: *settings,
            cubic: Cubic::new(settings),
            slow_start: HybridSlowStart::new(
                settings.max_datagram_size(),
                settings.hystart_enabled(),
            ),
            pacer: Pacer::default(),
            inflight: Inflight::default(),
            congestion_window: settings.initial_window() as f32,
            state: SlowStart,
            recovery_sent_packet_number: None,
            spurious_snapshot: None,
            is_app_limited: false,
            time_of_last_ack: None,
            smoothed_rtt: None,
            min_rtt: None,
            congestion_event_count: Counter::default(),
        };
        controller.reset(true);
        controller
    }

    #[inline]
    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The slow start threshold in bytes, if one has been established
    #[inline]
    fn slow_start_threshold(&self) -> Option<u32> {
        (self.slow_start.threshold < u32::MAX as f32).then_some(self.slow_start.threshold as u32)
    }

    fn save_snapshot(&mut self) {
        // a loss during recovery keeps the state from before recovery began, if that response
        // can itself be reverted
        if self.is_in_recovery() {
            return;
        }

        self.spurious_snapshot = Some(Snapshot {
            congestion_window: self.congestion_window,
            cubic: self.cubic.clone(),
            slow_start: self.slow_start.clone(),
            state: self.state.clone(),
            recovery_sent_packet_number: self.recovery_sent_packet_number,
        });
    }

    fn on_congestion_event(&mut self, persistent_congestion: bool) {
        self.congestion_event_count += 1;

        let in_persistent_congestion = self.state
            == Recovery {
                persistent_congestion: true,
            };

        //= https://www.rfc-editor.org/rfc/rfc9002#section-7.3.1
        //# The sender MUST exit slow start and enter a recovery period when a
        //# packet is lost or when the ECN-CE count reported by its peer
        //# increases.
        if persistent_congestion && !in_persistent_congestion {
            //= https://www.rfc-editor.org/rfc/rfc9002#section-7.6.2
            //# When persistent congestion is declared, the sender's congestion
            //# window MUST be reduced to the minimum congestion window
            //# (kMinimumWindow), similar to a TCP sender's response on an RTO
            //# [RFC5681].
            let slow_start_threshold = self.cubic.on_persistent_congestion(self.congestion_window);
            self.slow_start.on_congestion_event(slow_start_threshold);
            self.congestion_window = self.cubic.minimum_window;
            self.state = Recovery {
                persistent_congestion: true,
            };
            tracing::debug!(
                congestion_window = self.congestion_window(),
                "persistent congestion"
            );
            return;
        }

        //= https://www.rfc-editor.org/rfc/rfc9002#section-7.2
        //# The minimum congestion window is the smallest value the congestion
        //# window can attain in response to loss, an increase in the peer-
        //# reported ECN-CE count, or persistent congestion.
        self.congestion_window = self.cubic.multiplicative_decrease(self.congestion_window);

        // Update Hybrid Slow Start with the decreased congestion window.
        self.slow_start.on_congestion_event(self.congestion_window);

        self.state = Recovery {
            persistent_congestion: in_persistent_congestion,
        };

        tracing::debug!(
            congestion_window = self.congestion_window(),
            w_max = self.cubic.w_max,
            "entered recovery"
        );
    }

    fn leave_recovery(&mut self, now: Timestamp) {
        self.state = if self.congestion_window < self.slow_start.threshold {
            SlowStart
        } else {
            State::congestion_avoidance(now)
        };
    }

    #[inline]
    fn congestion_avoidance(&mut self, t: Duration, rtt: Duration, acked_bytes: u32) {
        let w_cubic = self.cubic.w_cubic(t);
        let w_est = self.cubic.w_est(t, rtt);
        // limit the window increase to half the acked bytes
        // as the Linux implementation of Cubic does.
        let max_cwnd = self.congestion_window + acked_bytes as f32 / 2.0;

        if w_cubic < w_est {
            // TCP-Friendly Region
            //= https://www.rfc-editor.org/rfc/rfc8312#section-4.2
            //# When receiving an ACK in congestion avoidance (cwnd could be greater than
            //# or less than W_max), CUBIC checks whether W_cubic(t) is less than
            //# W_est(t).  If so, CUBIC is in the TCP-friendly region and cwnd SHOULD
            //# be set to W_est(t) at each reception of an ACK.
            let w_est = self.cubic.packets_to_bytes(w_est);
            self.congestion_window = w_est.min(max_cwnd).max(self.congestion_window);
        } else {
            //= https://www.rfc-editor.org/rfc/rfc8312#section-4.1
            //# Upon receiving an ACK during congestion avoidance, CUBIC computes the
            //# window increase rate during the next RTT period using Eq. 1.  It sets
            //# W_cubic(t+RTT) as the candidate target value of the congestion
            //# window

            // The congestion window is adjusted in the same way in the convex and concave
            // regions. The target is where the window should be by the end of one RTT, limited
            // to 1.5 times the current window.
            let target_congestion_window = self
                .cubic
                .packets_to_bytes(self.cubic.w_cubic(t + rtt))
                .min(1.5 * self.congestion_window);

            // Decreases in the RTT estimate can cause the congestion window to get ahead of the
            // target. In the case where the congestion window has already exceeded the target,
            // we return without any further adjustment to the window.
            if self.congestion_window >= target_congestion_window {
                return;
            }

            let window_increase_rate =
                (target_congestion_window - self.congestion_window) / self.congestion_window;
            let window_increment = self.cubic.packets_to_bytes(window_increase_rate);

            self.congestion_window = (self.congestion_window + window_increment).min(max_cwnd);
        }
    }
}

/// Core functions of "CUBIC for Fast Long-Distance Networks" as specified in
/// https://tools.ietf.org/html/rfc8312. The unit of all window sizes is in
/// packets of size max_datagram_size to maintain alignment with the specification.
/// Thus, window sizes should be converted to bytes before applying to the
/// congestion window in the congestion controller.
#[derive(Clone, Debug)]
struct Cubic {
    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.1
    //# W_max is the window size just before the window is
    //# reduced in the last congestion event.
    w_max: f32,
    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.6
    //# a flow remembers the last value of W_max before it
    //# updates W_max for the current congestion event.
    //# Let us call the last value of W_max to be W_last_max.
    w_last_max: f32,
    // k is the time until we expect to reach w_max
    k: Duration,
    parameters: Parameters,
    max_datagram_size: u16,
    /// The minimum window in bytes
    minimum_window: f32,
}

impl Cubic {
    fn new(settings: &Settings) -> Self {
        Cubic {
            w_max: 0.0,
            w_last_max: 0.0,
            k: Duration::ZERO,
            parameters: *settings.cubic(),
            max_datagram_size: settings.max_datagram_size(),
            minimum_window: settings.minimum_window() as f32,
        }
    }

    /// Reset to the original state
    #[inline]
    fn reset(&mut self) {
        self.w_max = 0.0;
        self.w_last_max = 0.0;
        self.k = Duration::ZERO;
    }

    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.1
    //# W_cubic(t) = C*(t-K)^3 + W_max (Eq. 1)
    #[inline]
    fn w_cubic(&self, t: Duration) -> f32 {
        self.parameters.c * (t.as_secs_f32() - self.k.as_secs_f32()).powi(3) + self.w_max
    }

    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.2
    //# W_est(t) = W_max*beta_cubic +
    //               [3*(1-beta_cubic)/(1+beta_cubic)] * (t/RTT) (Eq. 4)
    #[inline]
    fn w_est(&self, t: Duration, rtt: Duration) -> f32 {
        let beta = self.parameters.beta;
        if rtt.is_zero() {
            return self.w_max * beta;
        }
        self.w_max.mul_add(
            beta,
            (3.0 * (1.0 - beta) / (1.0 + beta)) * (t.as_secs_f32() / rtt.as_secs_f32()),
        )
    }

    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.5
    //#    W_max = cwnd;                 // save window size before reduction
    //#    ssthresh = cwnd * beta_cubic; // new slow-start threshold
    //#    ssthresh = max(ssthresh, 2);  // threshold is at least 2 MSS
    //#    cwnd = cwnd * beta_cubic;     // window reduction
    // This does not change the units of the congestion window
    #[inline]
    fn multiplicative_decrease(&mut self, cwnd: f32) -> f32 {
        let beta = self.parameters.beta;
        self.w_max = self.bytes_to_packets(cwnd);

        //= https://www.rfc-editor.org/rfc/rfc8312#section-4.6
        //#    if (W_max < W_last_max){ // should we make room for others
        //#       W_last_max = W_max;             // remember the last W_max
        //#       W_max = W_max*(1.0+beta_cubic)/2.0; // further reduce W_max
        //#    } else {
        //#       W_last_max = W_max              // remember the last W_max
        //#    }
        let w_max = self.w_max;
        if self.parameters.fast_convergence && w_max < self.w_last_max {
            self.w_max = (w_max * (1.0 + beta) / 2.0)
                .max(self.bytes_to_packets(self.minimum_window));
        }
        self.w_last_max = w_max;

        let cwnd_start = (cwnd * beta).max(self.minimum_window);

        //= https://tools.ietf.org/id/draft-eggert-tcpm-rfc8312bis-01#4.2
        //#                                ________________
        //#                               /W    - cwnd
        //#                           3  /  max       start
        //#                       K = | /  ----------------
        //#                           |/           C
        let k = ((self.w_max - self.bytes_to_packets(cwnd_start)) / self.parameters.c).cbrt();
        self.k = Duration::try_from_secs_f32(k).unwrap_or(Duration::ZERO);

        cwnd_start
    }

    /// Returns the slow start threshold in bytes after persistent congestion
    #[inline]
    fn on_persistent_congestion(&mut self, cwnd: f32) -> f32 {
        let slow_start_threshold = (cwnd * self.parameters.beta).max(self.minimum_window);
        self.w_max = self.bytes_to_packets(slow_start_threshold);
        self.w_last_max = self.w_max;
        self.k = Duration::ZERO;
        slow_start_threshold
    }

    //= https://www.rfc-editor.org/rfc/rfc8312#section-4.8
    //# CUBIC switches to congestion
    //# avoidance and increases its congestion window size using Eq. 1, where
    //# t is the elapsed time since the beginning of the current congestion
    //# avoidance, K is set to 0, and W_max is set to the congestion window
    //# size at the beginning of the current congestion avoidance.
    #[inline]
    fn on_slow_start_exit(&mut self, cwnd: f32) {
        self.w_max = self.bytes_to_packets(cwnd);

        // We are currently at the w_max, so set k to zero indicating zero
        // seconds to reach the max
        self.k = Duration::ZERO;
    }

    #[inline]
    fn bytes_to_packets(&self, bytes: f32) -> f32 {
        bytes / self.max_datagram_size as f32
    }

    #[inline]
    fn packets_to_bytes(&self, packets: f32) -> f32 {
        packets * self.max_datagram_size as f32
    }
}
