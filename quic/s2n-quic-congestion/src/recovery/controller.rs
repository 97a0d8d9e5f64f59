// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    event::{AckEvent, EcnEvent, LossEvent},
    recovery::{
        careful_resume::{self, Store},
        BbrCongestionController, CongestionController, CubicCongestionController,
        NetworkStatistics,
    },
    settings::{Algorithm, Settings},
    time::{Duration, Timestamp},
};
use core::net::SocketAddr;
use std::hash::BuildHasher;

/// The congestion controller of a connection, using the algorithm chosen in its [`Settings`]
#[derive(Clone, Debug)]
pub enum Controller {
    Cubic(CubicCongestionController),
    Bbr(BbrCongestionController),
}

macro_rules! dispatch {
    ($self:ident, $cc:ident => $call:expr) => {
        match $self {
            Controller::Cubic($cc) => $call,
            Controller::Bbr($cc) => $call,
        }
    };
}

impl Controller {
    pub fn new(settings: &Settings) -> Self {
        tracing::debug!(
            algorithm = %settings.algorithm(),
            initial_window = settings.initial_window(),
            "creating congestion controller"
        );

        match settings.algorithm() {
            Algorithm::Cubic => Self::Cubic(CubicCongestionController::new(settings)),
            Algorithm::Bbr => Self::Bbr(BbrCongestionController::new(settings)),
        }
    }

    #[inline]
    pub fn settings(&self) -> &Settings {
        dispatch!(self, cc => cc.settings())
    }

    /// Seeds the window from the state a previous connection to `remote_endpoint` saved
    ///
    /// Called once the connection has its first RTT sample. Returns false, leaving the
    /// controller untouched, if careful resume is disabled or no usable state is saved.
    pub fn try_careful_resume<S: BuildHasher>(
        &mut self,
        store: &Store<S>,
        remote_endpoint: SocketAddr,
        smoothed_rtt: Duration,
        min_rtt: Duration,
        now: Timestamp,
    ) -> bool {
        let settings = *self.settings();
        if !settings.careful_resume_enabled() {
            return false;
        }

        let config = settings.careful_resume();
        let Some(state) = store.lookup(
            &remote_endpoint,
            self.algorithm(),
            smoothed_rtt,
            min_rtt,
            now,
            config,
        ) else {
            return false;
        };

        let window = config.resume_window(&settings, state.congestion_window);
        self.seed_congestion_window(window, now);

        tracing::debug!(
            %remote_endpoint,
            saved_window = state.congestion_window,
            congestion_window = self.congestion_window(),
            "resumed congestion window"
        );
        true
    }

    /// Captures the path state to save when the connection closes, if the path is stable
    ///
    /// A path is stable if the controller is not recovering from a congestion event and the
    /// smoothed RTT is within the configured multiple of the min RTT.
    pub fn careful_resume_state(
        &self,
        remote_endpoint: SocketAddr,
        now: Timestamp,
    ) -> Option<careful_resume::State> {
        let settings = self.settings();
        if !settings.careful_resume_enabled() {
            return None;
        }

        let config = settings.careful_resume();
        let stats = self.network_statistics();
        if stats.in_recovery {
            return None;
        }

        let (Some(smoothed_rtt), Some(min_rtt)) = (stats.smoothed_rtt, stats.min_rtt) else {
            return None;
        };

        if !config.is_stable(smoothed_rtt, min_rtt) {
            return None;
        }

        Some(careful_resume::State {
            remote_endpoint,
            algorithm: stats.algorithm,
            congestion_window: stats.congestion_window,
            smoothed_rtt,
            min_rtt,
            expiration: now + config.validity,
        })
    }
}

impl CongestionController for Controller {
    #[inline]
    fn can_send(&self) -> bool {
        dispatch!(self, cc => cc.can_send())
    }

    #[inline]
    fn set_exemption(&mut self, packets: u8) {
        dispatch!(self, cc => cc.set_exemption(packets))
    }

    #[inline]
    fn reset(&mut self, full_reset: bool) {
        dispatch!(self, cc => cc.reset(full_reset))
    }

    #[inline]
    fn send_allowance(&mut self, time_since_last_send: Option<Duration>) -> u32 {
        dispatch!(self, cc => cc.send_allowance(time_since_last_send))
    }

    #[inline]
    fn on_data_sent(&mut self, bytes: u32) {
        dispatch!(self, cc => cc.on_data_sent(bytes))
    }

    #[inline]
    fn on_data_invalidated(&mut self, bytes: u32) -> bool {
        dispatch!(self, cc => cc.on_data_invalidated(bytes))
    }

    #[inline]
    fn on_data_acknowledged(&mut self, ack: &AckEvent) -> bool {
        dispatch!(self, cc => cc.on_data_acknowledged(ack))
    }

    #[inline]
    fn on_data_lost(&mut self, loss: &LossEvent) {
        dispatch!(self, cc => cc.on_data_lost(loss))
    }

    #[inline]
    fn on_ecn(&mut self, ecn: &EcnEvent) {
        dispatch!(self, cc => cc.on_ecn(ecn))
    }

    #[inline]
    fn on_spurious_congestion_event(&mut self) -> bool {
        dispatch!(self, cc => cc.on_spurious_congestion_event())
    }

    #[inline]
    fn log_out_flow_status(&self) {
        dispatch!(self, cc => cc.log_out_flow_status())
    }

    #[inline]
    fn exemptions(&self) -> u8 {
        dispatch!(self, cc => cc.exemptions())
    }

    #[inline]
    fn bytes_in_flight(&self) -> u32 {
        dispatch!(self, cc => cc.bytes_in_flight())
    }

    #[inline]
    fn bytes_in_flight_max(&self) -> u32 {
        dispatch!(self, cc => cc.bytes_in_flight_max())
    }

    #[inline]
    fn congestion_window(&self) -> u32 {
        dispatch!(self, cc => cc.congestion_window())
    }

    #[inline]
    fn is_app_limited(&self) -> bool {
        dispatch!(self, cc => cc.is_app_limited())
    }

    #[inline]
    fn set_app_limited(&mut self) {
        dispatch!(self, cc => cc.set_app_limited())
    }

    #[inline]
    fn network_statistics(&self) -> NetworkStatistics {
        dispatch!(self, cc => cc.network_statistics())
    }

    #[inline]
    fn is_in_recovery(&self) -> bool {
        dispatch!(self, cc => cc.is_in_recovery())
    }

    #[inline]
    fn algorithm(&self) -> Algorithm {
        dispatch!(self, cc => cc.algorithm())
    }

    #[inline]
    fn seed_congestion_window(&mut self, window: u32, now: Timestamp) {
        dispatch!(self, cc => cc.seed_congestion_window(window, now))
    }
}
