// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::counter::Counter;

//= https://www.rfc-editor.org/rfc/rfc9002#section-B.2
//# The sum of the size in bytes of all sent packets
//# that contain at least one ack-eliciting or PADDING frame and have
//# not been acknowledged or declared lost.
/// Bytes in flight and exemption accounting shared by every algorithm
#[derive(Clone, Debug, Default)]
pub(crate) struct Inflight {
    bytes_in_flight: Counter<u32>,
    bytes_in_flight_max: u32,
    exemptions: u8,
}

impl Inflight {
    #[inline]
    pub fn bytes_in_flight(&self) -> u32 {
        *self.bytes_in_flight
    }

    #[inline]
    pub fn bytes_in_flight_max(&self) -> u32 {
        self.bytes_in_flight_max
    }

    #[inline]
    pub fn exemptions(&self) -> u8 {
        self.exemptions
    }

    #[inline]
    pub fn set_exemption(&mut self, packets: u8) {
        self.exemptions = packets;
    }

    #[inline]
    pub fn can_send(&self, congestion_window: u32) -> bool {
        *self.bytes_in_flight < congestion_window || self.exemptions > 0
    }

    /// Bytes that may still be sent before the congestion window is full
    #[inline]
    pub fn available(&self, congestion_window: u32) -> u32 {
        congestion_window.saturating_sub(*self.bytes_in_flight)
    }

    /// Records `bytes` as sent and consumes an exemption if one remains
    #[inline]
    pub fn on_data_sent(&mut self, bytes: u32) {
        if self.bytes_in_flight.try_add(bytes).is_err() {
            tracing::warn!(
                bytes,
                bytes_in_flight = *self.bytes_in_flight,
                "bytes in flight overflowed"
            );
            self.bytes_in_flight.set(u32::MAX);
        }

        self.bytes_in_flight_max = self.bytes_in_flight_max.max(*self.bytes_in_flight);
        self.exemptions = self.exemptions.saturating_sub(1);
    }

    /// Removes bytes that were acknowledged, lost or invalidated
    ///
    /// Removing more than is in flight indicates a loss detection defect. The count saturates
    /// at zero rather than underflowing.
    #[inline]
    pub fn on_data_removed(&mut self, bytes: u32) {
        if self.bytes_in_flight.try_sub(bytes).is_err() {
            tracing::warn!(
                bytes,
                bytes_in_flight = *self.bytes_in_flight,
                "removed more bytes than are in flight"
            );
            self.bytes_in_flight.set(0);
        }
    }

    /// Resets the state after a controller reset
    ///
    /// The maximum restarts at half of the new window so the window may still grow.
    #[inline]
    pub fn reset(&mut self, full_reset: bool, congestion_window: u32) {
        if full_reset {
            self.bytes_in_flight.set(0);
        }
        self.bytes_in_flight_max = congestion_window / 2;
        self.exemptions = 0;
    }
}
