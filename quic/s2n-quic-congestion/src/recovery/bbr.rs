// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    counter::{Counter, Saturating},
    event::{AckEvent, EcnEvent, LossEvent},
    recovery::{
        bandwidth::{self, Bandwidth},
        bbr::windowed_filter::{MinRttFilter, WindowedMaxFilter},
        congestion_controller::{CongestionController, NetworkStatistics},
        inflight::Inflight,
        pacing,
    },
    settings::{Algorithm, Settings},
    time::{Duration, Timestamp},
};
use num_rational::Ratio;
use num_traits::One;
use rand::{rngs::SmallRng, SeedableRng};

mod drain;
mod full_pipe;
mod probe_bw;
mod probe_rtt;
mod recovery;
mod round;
mod startup;
mod windowed_filter;

/// BBR tuning constants
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Parameters {
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-00#4.3.2.1
    //# BBR's Startup state uses a BBRHighGain of 2/ln(2) = 2.89
    /// Pacing and window gain while searching for the bottleneck
    ///
    /// Drain paces at the inverse of this gain.
    pub startup_gain: Ratio<u64>,
    /// Window gain in ProbeBW
    pub cwnd_gain: Ratio<u64>,
    /// Bandwidth growth per round that keeps Startup going
    pub startup_growth_target: Ratio<u64>,
    /// Rounds without sufficient growth before the bottleneck is considered found
    pub startup_growth_rounds: u8,
    /// Length of the max bandwidth filter, in rounds
    pub bandwidth_filter_rounds: u64,
    /// Age at which the min RTT estimate expires and ProbeRTT is entered
    pub min_rtt_expiration: Duration,
    /// Time spent in ProbeRTT with at most the minimum window in flight
    pub probe_rtt_duration: Duration,
    /// The minimum window, in packets
    pub minimum_window_packets: u32,
}

impl Default for Parameters {
    fn default() -> Self {
        Self {
            startup_gain: Ratio::new_raw(2885, 1000),
            cwnd_gain: Ratio::new_raw(2, 1),
            startup_growth_target: Ratio::new_raw(5, 4),
            startup_growth_rounds: 3,
            bandwidth_filter_rounds: 10,
            min_rtt_expiration: Duration::from_secs(10),
            probe_rtt_duration: Duration::from_millis(200),
            minimum_window_packets: 4,
        }
    }
}

impl Parameters {
    pub(crate) fn validate(&self) -> Result<(), &'static str> {
        let above_one = |gain: Ratio<u64>| *gain.denom() != 0 && gain > Ratio::one();

        if !above_one(self.startup_gain) {
            return Err("startup gain must be greater than 1");
        }
        if *self.cwnd_gain.denom() == 0 || self.cwnd_gain < Ratio::one() {
            return Err("cwnd gain must be at least 1");
        }
        if !above_one(self.startup_growth_target) {
            return Err("startup growth target must be greater than 1");
        }
        if self.startup_growth_rounds == 0 || self.bandwidth_filter_rounds == 0 {
            return Err("round counts must be positive");
        }
        if self.min_rtt_expiration.is_zero() || self.probe_rtt_duration.is_zero() {
            return Err("durations must be positive");
        }
        if self.minimum_window_packets < 2 {
            return Err("minimum window must be at least 2 packets");
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum State {
    /// Exponential growth until the bandwidth stops increasing
    Startup,
    /// Drains the queue built in Startup
    Drain,
    /// Cycles the pacing rate around the estimated bandwidth
    ProbeBw(probe_bw::State),
    /// Holds in flight at the minimum window to refresh the min RTT
    ProbeRtt(probe_rtt::State),
}

impl State {
    /// The dynamic gain factor used to scale the bandwidth estimate to produce the pacing rate
    fn pacing_gain(&self, parameters: &Parameters) -> Ratio<u64> {
        match self {
            State::Startup => parameters.startup_gain,
            //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.3.2
            //# It uses a
            //# pacing_gain that is the inverse of the value used during Startup, chosen to try to
            //# drain the queue in one round
            State::Drain => parameters.startup_gain.recip(),
            State::ProbeBw(probe_bw) => probe_bw.pacing_gain(),
            State::ProbeRtt(_) => Ratio::one(),
        }
    }

    /// The dynamic gain factor used to scale the estimated BDP to produce a congestion window
    fn cwnd_gain(&self, parameters: &Parameters) -> Ratio<u64> {
        match self {
            State::Startup | State::Drain => parameters.startup_gain,
            State::ProbeBw(_) => parameters.cwnd_gain,
            State::ProbeRtt(_) => Ratio::one(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            State::Startup => "startup",
            State::Drain => "drain",
            State::ProbeBw(_) => "probe_bw",
            State::ProbeRtt(_) => "probe_rtt",
        }
    }

    #[inline]
    fn is_startup(&self) -> bool {
        matches!(self, State::Startup)
    }

    #[inline]
    fn is_drain(&self) -> bool {
        matches!(self, State::Drain)
    }

    #[inline]
    fn is_probing_rtt(&self) -> bool {
        matches!(self, State::ProbeRtt(_))
    }
}

/// A congestion controller that implements "Bottleneck Bandwidth and Round-trip propagation time"
/// as described in <https://datatracker.ietf.org/doc/draft-cardwell-iccrg-bbr-congestion-control/>.
///
/// The window is derived from a model of the path: the maximum delivery rate over recent rounds
/// multiplied by the minimum RTT, scaled by a gain for the current state. Loss bounds the window
/// with a recovery window but does not discard the model.
#[derive(Clone, Debug)]
pub struct BbrCongestionController {
    settings: Settings,
    parameters: Parameters,
    state: State,
    inflight: Inflight,
    congestion_window: u32,
    /// The window saved on entering ProbeRTT, restored on leaving it
    previous_congestion_window: u32,
    minimum_window: u32,
    bandwidth_estimator: bandwidth::Estimator,
    //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#2.9.1
    //# The windowed maximum recent bandwidth sample
    bandwidth_filter: WindowedMaxFilter<Bandwidth, u64, u64>,
    min_rtt_filter: MinRttFilter,
    round_counter: round::Counter,
    full_pipe_estimator: full_pipe::Estimator,
    recovery: recovery::State,
    /// Set while app limited, cleared once a packet sent after this number is acknowledged
    app_limited_exit_target: Option<u64>,
    /// Sending restarted from idle while app limited
    exiting_quiescence: bool,
    /// Loss was detected in the current round
    loss_in_round: bool,
    largest_sent_packet_number: Option<u64>,
    smoothed_rtt: Option<Duration>,
    congestion_event_count: Counter<u32, Saturating>,
    random_generator: SmallRng,
}

impl CongestionController for BbrCongestionController {
    #[inline]
    fn can_send(&self) -> bool {
        self.inflight.can_send(self.congestion_window())
    }

    #[inline]
    fn set_exemption(&mut self, packets: u8) {
        self.inflight.set_exemption(packets);
    }

    fn reset(&mut self, full_reset: bool) {
        let initial_window = self.settings.initial_window();
        self.state = State::Startup;
        self.congestion_window = initial_window;
        self.previous_congestion_window = initial_window;
        self.bandwidth_estimator.reset();
        self.round_counter.restart();
        self.full_pipe_estimator = full_pipe::Estimator::new(
            self.parameters.startup_growth_target,
            self.parameters.startup_growth_rounds,
        );
        self.recovery.reset();
        self.app_limited_exit_target = None;
        self.exiting_quiescence = false;
        self.loss_in_round = false;
        self.inflight.reset(full_reset, initial_window);

        if full_reset {
            // the path model is kept unless the reset is full
            self.bandwidth_filter.reset();
            self.min_rtt_filter.reset();
            self.round_counter = round::Counter::default();
            self.largest_sent_packet_number = None;
            self.smoothed_rtt = None;
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

        let (Some(elapsed), Some(min_rtt)) = (time_since_last_send, self.min_rtt_filter.min_rtt())
        else {
            return available;
        };

        if !self.settings.pacing_enabled() || min_rtt < pacing::MINIMUM_PACING_RTT {
            return available;
        }

        let pacing_gain = self.state.pacing_gain(&self.parameters);
        let bandwidth = self.bandwidth_filter.value();
        let mut paced_bytes = bandwidth.map_or(0, |bandwidth| (bandwidth * pacing_gain) * elapsed);

        if self.state.is_startup() || bandwidth.is_none() {
            // pace the gained window over the min RTT until the model catches up
            let window = (pacing_gain * congestion_window as u64).to_integer();
            let window_bytes = pacing::paced_bytes(window, elapsed, min_rtt).unwrap_or(0);
            paced_bytes = paced_bytes.max(window_bytes);
        }

        u32::try_from(paced_bytes)
            .unwrap_or(u32::MAX)
            .min(available)
    }

    #[inline]
    fn on_data_sent(&mut self, bytes: u32) {
        if self.inflight.bytes_in_flight() == 0 && self.is_app_limited() {
            self.exiting_quiescence = true;
        }

        self.inflight.on_data_sent(bytes);

        if self.is_app_limited() && self.inflight.bytes_in_flight() >= self.congestion_window() {
            self.app_limited_exit_target = None;
        }
    }

    #[inline]
    fn on_data_invalidated(&mut self, bytes: u32) -> bool {
        let was_blocked = !self.can_send();
        self.inflight.on_data_removed(bytes);
        was_blocked && self.can_send()
    }

    fn on_data_acknowledged(&mut self, ack: &AckEvent) -> bool {
        let previous_window = self.congestion_window();
        let prior_bytes_in_flight = self.inflight.bytes_in_flight();
        let now = ack.time_now;

        self.on_packet_number_sent(ack.largest_sent_packet_number);
        self.inflight.on_data_removed(ack.retransmittable_bytes);

        if ack.is_implicit {
            // implicit acks carry no delivery information, so only the window advances
            self.update_congestion_window(
                ack.total_acked_retransmittable_bytes,
                ack.retransmittable_bytes,
            );
            return self.congestion_window() > previous_window;
        }

        self.smoothed_rtt = Some(ack.smoothed_rtt);

        let round_start = self
            .round_counter
            .on_ack(ack.largest_ack, ack.largest_sent_packet_number);
        if round_start {
            self.loss_in_round = false;
        }

        if self.recovery.on_ack(
            round_start,
            ack.largest_ack,
            ack.has_loss,
            prior_bytes_in_flight,
            ack.retransmittable_bytes,
            self.minimum_window,
        ) {
            tracing::debug!(
                congestion_window = self.congestion_window,
                "exited recovery"
            );
        }

        if self
            .app_limited_exit_target
            .is_some_and(|exit_target| ack.largest_ack > exit_target)
        {
            self.app_limited_exit_target = None;
        }

        let sample_is_app_limited = ack.is_largest_acked_packet_app_limited;
        if let Some(sample) = self.bandwidth_estimator.on_ack(
            ack.total_acked_retransmittable_bytes,
            now,
            round_start,
        ) {
            // the sender was not saturating the path, so the sample says nothing about its
            // capacity
            if !sample_is_app_limited {
                self.bandwidth_filter
                    .update(sample, self.round_counter.round_count());
            }
        }

        if let Some(rtt) = ack.min_rtt {
            self.min_rtt_filter.update(rtt, now);
        }

        self.check_cycle_phase(now, prior_bytes_in_flight);
        self.check_startup_done(round_start, sample_is_app_limited);
        self.check_drain_done(now);
        self.check_probe_rtt(now, ack.largest_ack, ack.largest_sent_packet_number);
        self.exiting_quiescence = false;

        self.update_congestion_window(
            ack.total_acked_retransmittable_bytes,
            ack.retransmittable_bytes,
        );

        self.congestion_window() > previous_window
    }

    fn on_data_lost(&mut self, loss: &LossEvent) {
        let prior_bytes_in_flight = self.inflight.bytes_in_flight();
        self.on_packet_number_sent(loss.largest_sent_packet_number);
        self.inflight.on_data_removed(loss.retransmittable_bytes);
        self.loss_in_round = true;

        if self.recovery.on_loss(
            loss.largest_packet_number_lost,
            loss.largest_sent_packet_number,
            prior_bytes_in_flight,
            loss.retransmittable_bytes,
            loss.persistent_congestion,
            self.minimum_window,
        ) {
            self.congestion_event_count += 1;
            tracing::debug!(
                recovery_window = self.recovery.window(),
                persistent_congestion = loss.persistent_congestion,
                "entered recovery"
            );
        }
    }

    fn on_ecn(&mut self, ecn: &EcnEvent) {
        self.on_packet_number_sent(ecn.largest_sent_packet_number);

        if !self.recovery.on_explicit_congestion(
            ecn.largest_packet_number_acked,
            ecn.largest_sent_packet_number,
        ) {
            return;
        }

        self.congestion_event_count += 1;
        tracing::debug!(state = self.state.name(), "explicit congestion");

        match self.state {
            State::Startup => {
                self.full_pipe_estimator.on_explicit_congestion();
                self.check_startup_done(false, false);
            }
            State::ProbeBw(ref mut probe_bw) => probe_bw.enter_drain_phase(),
            State::Drain | State::ProbeRtt(_) => {}
        }
    }

    fn on_spurious_congestion_event(&mut self) -> bool {
        let reverted = self.recovery.on_spurious_loss();
        if reverted {
            tracing::debug!(
                congestion_window = self.congestion_window(),
                "reverted spurious congestion event"
            );
        }
        reverted
    }

    fn log_out_flow_status(&self) {
        tracing::debug!(
            algorithm = %Algorithm::Bbr,
            state = self.state.name(),
            congestion_window = self.congestion_window(),
            bytes_in_flight = self.inflight.bytes_in_flight(),
            bytes_in_flight_max = self.inflight.bytes_in_flight_max(),
            exemptions = self.inflight.exemptions(),
            pacing_gain = %self.state.pacing_gain(&self.parameters),
            bandwidth = self.bandwidth().bits_per_second(),
            min_rtt = ?self.min_rtt_filter.min_rtt(),
            recovery_window = self.recovery.window(),
            recovery_phase = ?self.recovery.phase(),
            round_count = self.round_counter.round_count(),
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
        if self.state.is_probing_rtt() {
            return self.minimum_window;
        }

        if self.recovery.in_recovery() {
            return self.congestion_window.min(self.recovery.window());
        }

        self.congestion_window
    }

    #[inline]
    fn is_app_limited(&self) -> bool {
        self.app_limited_exit_target.is_some()
    }

    #[inline]
    fn set_app_limited(&mut self) {
        if self.inflight.bytes_in_flight() > self.congestion_window() {
            return;
        }

        self.app_limited_exit_target = Some(self.largest_sent_packet_number.unwrap_or_default());
    }

    fn network_statistics(&self) -> NetworkStatistics {
        NetworkStatistics {
            algorithm: Algorithm::Bbr,
            congestion_window: self.congestion_window(),
            bytes_in_flight: self.inflight.bytes_in_flight(),
            bytes_in_flight_max: self.inflight.bytes_in_flight_max(),
            smoothed_rtt: self.smoothed_rtt,
            min_rtt: self.min_rtt_filter.min_rtt(),
            bandwidth: self.bandwidth().bytes_per_second(),
            congestion_event_count: *self.congestion_event_count,
            in_recovery: self.recovery.in_recovery(),
        }
    }

    #[inline]
    fn is_in_recovery(&self) -> bool {
        self.recovery.in_recovery()
    }

    #[inline]
    fn algorithm(&self) -> Algorithm {
        Algorithm::Bbr
    }

    fn seed_congestion_window(&mut self, window: u32, _now: Timestamp) {
        self.congestion_window = self.settings.clamp_window(window).max(self.minimum_window);
        self.previous_congestion_window = self.congestion_window;
    }
}

impl BbrCongestionController {
    /// Constructs a controller whose ProbeBW cycle is randomized from OS entropy
    pub fn new(settings: &Settings) -> Self {
        Self::with_random_generator(settings, SmallRng::from_os_rng())
    }

    /// Constructs a controller with a deterministic ProbeBW cycle randomization
    pub fn with_seed(settings: &Settings, seed: u64) -> Self {
        Self::with_random_generator(settings, SmallRng::seed_from_u64(seed))
    }

    fn with_random_generator(settings: &Settings, random_generator: SmallRng) -> Self {
        let parameters = *settings.bbr();
        let initial_window = settings.initial_window();
        let minimum_window = parameters
            .minimum_window_packets
            .saturating_mul(settings.max_datagram_size() as u32)
            .max(settings.minimum_window())
            .min(initial_window);

        let mut controller = Self {
            settings: *settings,
            parameters,
            state: State::Startup,
            inflight: Inflight::default(),
            congestion_window: initial_window,
            previous_congestion_window: initial_window,
            minimum_window,
            bandwidth_estimator: bandwidth::Estimator::default(),
            bandwidth_filter: WindowedMaxFilter::new(parameters.bandwidth_filter_rounds),
            min_rtt_filter: MinRttFilter::new(parameters.min_rtt_expiration),
            round_counter: round::Counter::default(),
            full_pipe_estimator: full_pipe::Estimator::new(
                parameters.startup_growth_target,
                parameters.startup_growth_rounds,
            ),
            recovery: recovery::State::default(),
            app_limited_exit_target: None,
            exiting_quiescence: false,
            loss_in_round: false,
            largest_sent_packet_number: None,
            smoothed_rtt: None,
            congestion_event_count: Counter::default(),
            random_generator,
        };
        controller.reset(true);
        controller
    }

    #[inline]
    pub(crate) fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The windowed max bandwidth, or zero if there is no sample yet
    #[inline]
    fn bandwidth(&self) -> Bandwidth {
        self.bandwidth_filter.value().unwrap_or(Bandwidth::ZERO)
    }

    #[inline]
    fn on_packet_number_sent(&mut self, packet_number: u64) {
        self.largest_sent_packet_number = Some(
            self.largest_sent_packet_number
                .map_or(packet_number, |largest| largest.max(packet_number)),
        );
    }

    /// The bandwidth-delay product scaled by `gain`, once the path has been sampled
    fn bdp(&self, gain: Ratio<u64>) -> Option<u64> {
        let bandwidth = self.bandwidth_filter.value()?;
        let min_rtt = self.min_rtt_filter.min_rtt()?;
        Some((bandwidth * gain) * min_rtt)
    }

    /// The window the model targets for the given `gain`
    ///
    /// Without a model of the path the initial window is scaled instead.
    fn target_congestion_window(&self, gain: Ratio<u64>) -> u32 {
        let target = self.bdp(gain).unwrap_or_else(|| {
            (gain * self.settings.initial_window() as u64).to_integer()
        });

        u32::try_from(target)
            .unwrap_or(u32::MAX)
            .max(self.minimum_window)
    }

    fn update_congestion_window(&mut self, total_acked_bytes: u64, bytes_acknowledged: u32) {
        if self.state.is_probing_rtt() {
            return;
        }

        let target = self.target_congestion_window(self.state.cwnd_gain(&self.parameters));
        let congestion_window = self.congestion_window;

        self.congestion_window = if self.full_pipe_estimator.filled_pipe() {
            congestion_window
                .saturating_add(bytes_acknowledged)
                .min(target)
        } else if congestion_window < target
            || total_acked_bytes < self.settings.initial_window() as u64
        {
            congestion_window.saturating_add(bytes_acknowledged)
        } else {
            congestion_window
        };

        self.congestion_window = self
            .congestion_window
            .max(self.minimum_window)
            .min(self.settings.maximum_window());
    }

    fn transition_to(&mut self, state: State) {
        tracing::debug!(
            from = self.state.name(),
            to = state.name(),
            congestion_window = self.congestion_window,
            "bbr state transition"
        );
        self.state = state;
    }
}

#[cfg(test)]
mod tests;
