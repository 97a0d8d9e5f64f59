// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    event::{AckEvent, EcnEvent, LossEvent},
    settings::Algorithm,
    time::{Duration, Timestamp},
};

/// The operations the transport's send and ACK processing paths perform on a congestion
/// controller
///
/// All methods are synchronous and bounded. A controller is owned by a single connection and is
/// never accessed concurrently.
pub trait CongestionController: 'static + Clone + Send + core::fmt::Debug {
    /// Returns true if bytes in flight are below the congestion window or an exemption remains
    fn can_send(&self) -> bool;

    /// Allows the next `packets` packets to be sent regardless of the congestion window
    ///
    /// Replaces any remaining exemptions rather than adding to them.
    fn set_exemption(&mut self, packets: u8);

    /// Returns the controller to its initial state
    ///
    /// A `full_reset` also clears bytes in flight and any path model retained across resets.
    fn reset(&mut self, full_reset: bool);

    /// Returns the number of bytes that may be sent immediately
    ///
    /// `time_since_last_send` is `None` if no prior send has been recorded, in which case the
    /// full remaining window is available. Otherwise pacing limits the allowance to a share of
    /// the window proportional to the elapsed time. The result never exceeds the remaining
    /// window, except for the single datagram allowed by an exemption.
    fn send_allowance(&mut self, time_since_last_send: Option<Duration>) -> u32;

    /// Called after `bytes` of retransmittable data are sent
    fn on_data_sent(&mut self, bytes: u32);

    /// Removes `bytes` from flight without treating them as acknowledged or lost
    ///
    /// Returns true if sending was blocked before and is unblocked now.
    fn on_data_invalidated(&mut self, bytes: u32) -> bool;

    /// Returns true if the congestion window grew
    fn on_data_acknowledged(&mut self, ack: &AckEvent) -> bool;

    fn on_data_lost(&mut self, loss: &LossEvent);

    /// Called when the peer reports an increase in the ECN-CE count
    #[inline]
    fn on_ecn(&mut self, ecn: &EcnEvent) {
        let _ = ecn;
    }

    /// Reverts the most recent congestion response after its losses were found to be spurious
    ///
    /// Returns false if there is no response that can be reverted.
    fn on_spurious_congestion_event(&mut self) -> bool;

    /// Emits the current flow state as a `tracing` event
    fn log_out_flow_status(&self);

    fn exemptions(&self) -> u8;

    fn bytes_in_flight(&self) -> u32;

    /// The largest bytes in flight since the last reset
    fn bytes_in_flight_max(&self) -> u32;

    fn congestion_window(&self) -> u32;

    fn is_app_limited(&self) -> bool;

    /// Marks the sender as having less data to send than the congestion window allows
    fn set_app_limited(&mut self);

    fn network_statistics(&self) -> NetworkStatistics;

    fn is_in_recovery(&self) -> bool;

    fn algorithm(&self) -> Algorithm;

    /// Starts from `window` bytes instead of the initial window, as validated by careful resume
    fn seed_congestion_window(&mut self, window: u32, now: Timestamp);
}

/// A snapshot of the controller state for telemetry
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct NetworkStatistics {
    pub algorithm: Algorithm,
    pub congestion_window: u32,
    pub bytes_in_flight: u32,
    pub bytes_in_flight_max: u32,
    pub smoothed_rtt: Option<Duration>,
    pub min_rtt: Option<Duration>,
    /// Estimated delivery rate in bytes per second
    pub bandwidth: u64,
    /// The number of distinct loss or ECN congestion responses
    pub congestion_event_count: u32,
    pub in_recovery: bool,
}

#[cfg(test)]
mod fuzz_target;
