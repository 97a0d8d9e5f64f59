// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Events delivered to a congestion controller by the loss detection component
//!
//! The controller never constructs these records itself. Packet numbers are from a single packet
//! number space and are expected to be monotonically increasing across events.

use crate::time::{Duration, Timestamp};

/// The outcome of processing one ACK frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "generator"), derive(bolero_generator::TypeGenerator))]
pub struct AckEvent {
    /// The time the ACK was processed
    pub time_now: Timestamp,
    /// The largest packet number newly acknowledged by the ACK
    pub largest_ack: u64,
    /// The largest packet number sent at the time the ACK was processed
    pub largest_sent_packet_number: u64,
    /// Retransmittable bytes acknowledged over the lifetime of the connection, including this ACK
    pub total_acked_retransmittable_bytes: u64,
    /// Retransmittable bytes acknowledged by this ACK
    pub retransmittable_bytes: u32,
    /// The current smoothed round trip time
    pub smoothed_rtt: Duration,
    /// The smallest RTT sampled from the packets acknowledged by this ACK, if any was valid
    pub min_rtt: Option<Duration>,
    /// The estimated one-way delay of the path
    pub one_way_delay: Duration,
    /// `time_now` with the peer reported ACK delay removed
    pub adjusted_ack_time: Timestamp,
    /// The ACK was synthesized rather than received on the wire
    pub is_implicit: bool,
    /// Loss was detected while processing this same ACK
    pub has_loss: bool,
    /// The packet carrying `largest_ack` was sent while the connection was application limited
    pub is_largest_acked_packet_app_limited: bool,
}

/// One or more packets were declared lost
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "generator"), derive(bolero_generator::TypeGenerator))]
pub struct LossEvent {
    /// The largest packet number declared lost
    pub largest_packet_number_lost: u64,
    /// The largest packet number sent at the time of the loss
    pub largest_sent_packet_number: u64,
    /// Retransmittable bytes declared lost
    pub retransmittable_bytes: u32,
    /// The loss spans a period long enough to be declared persistent congestion
    pub persistent_congestion: bool,
}

/// The peer reported an increase in the ECN-CE count
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(any(test, feature = "generator"), derive(bolero_generator::TypeGenerator))]
pub struct EcnEvent {
    /// The largest packet number acknowledged by the ACK carrying the ECN counts
    pub largest_packet_number_acked: u64,
    /// The largest packet number sent at the time the ECN counts were processed
    pub largest_sent_packet_number: u64,
}

impl AckEvent {
    /// The minimum RTT if one has been sampled, otherwise the smoothed RTT
    #[inline]
    pub fn rtt(&self) -> Duration {
        self.min_rtt.unwrap_or(self.smoothed_rtt)
    }
}

#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;

    impl AckEvent {
        /// Creates an ACK event acknowledging `bytes` at `now`
        ///
        /// The smoothed and minimum RTT are both set to `rtt`.
        pub fn new(
            now: Timestamp,
            largest_ack: u64,
            largest_sent_packet_number: u64,
            total_acked_retransmittable_bytes: u64,
            bytes: u32,
            rtt: Duration,
        ) -> Self {
            Self {
                time_now: now,
                largest_ack,
                largest_sent_packet_number,
                total_acked_retransmittable_bytes,
                retransmittable_bytes: bytes,
                smoothed_rtt: rtt,
                min_rtt: Some(rtt),
                one_way_delay: rtt / 2,
                adjusted_ack_time: now,
                is_implicit: false,
                has_loss: false,
                is_largest_acked_packet_app_limited: false,
            }
        }
    }

    impl LossEvent {
        /// Creates a loss event for `bytes` of non-persistent loss
        pub fn new(largest_packet_number_lost: u64, largest_sent_packet_number: u64, bytes: u32) -> Self {
            Self {
                largest_packet_number_lost,
                largest_sent_packet_number,
                retransmittable_bytes: bytes,
                persistent_congestion: false,
            }
        }
    }
}
