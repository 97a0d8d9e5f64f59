// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Using packet conservation dynamics to bound cwnd
    Conservation,
    /// Still in recovery, but allowing the recovery window to grow with acknowledged bytes
    Growth,
}

/// Tracks the state of recovery for BBR
///
/// BBR fast recovery consists of two phases with differing impact on the rate at which
/// the recovery window may grow. After one round in the "Conservation" phase, in which
/// the window is bounded by what is in flight, the "Growth" phase is entered, in which the
/// window grows by the acknowledged bytes. Recovery ends when a packet sent after the most
/// recent loss is acknowledged without further loss.
#[derive(Clone, Debug, Default)]
pub(crate) struct State {
    phase: Option<Phase>,
    /// The largest packet number sent at the most recent congestion signal
    ///
    /// Loss and ECN signals for packets up to this number belong to the same epoch.
    end_of_recovery: Option<u64>,
    /// Bounds the congestion window while in recovery
    window: u32,
}

impl State {
    /// True if currently in recovery (either Conservation or Growth)
    #[inline]
    pub fn in_recovery(&self) -> bool {
        self.phase.is_some()
    }

    #[inline]
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    #[inline]
    pub fn window(&self) -> u32 {
        self.window
    }

    #[inline]
    fn is_new_epoch(&self, packet_number: u64) -> bool {
        self.end_of_recovery
            .is_none_or(|end_of_recovery| packet_number > end_of_recovery)
    }

    /// Called for each ack, before the acknowledged bytes are removed from `bytes_in_flight`
    ///
    /// Returns `true` if the ack caused recovery to be exited
    pub fn on_ack(
        &mut self,
        round_start: bool,
        largest_ack: u64,
        has_loss: bool,
        prior_bytes_in_flight: u32,
        bytes_acknowledged: u32,
        minimum_window: u32,
    ) -> bool {
        let Some(phase) = self.phase else {
            return false;
        };

        if !has_loss && self.is_new_epoch(largest_ack) {
            // a packet sent after the most recent loss was acknowledged
            self.phase = None;
            return true;
        }

        if phase == Phase::Conservation && round_start {
            //= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.6.4.4
            //# After one round-trip in Fast Recovery:
            //#    BBR.packet_conservation = false
            self.phase = Some(Phase::Growth);
        }

        if self.phase == Some(Phase::Growth) {
            self.window = self.window.saturating_add(bytes_acknowledged);
        }

        self.window = self.window.max(prior_bytes_in_flight).max(minimum_window);

        false
    }

    /// Called when packets are declared lost, before they are removed from `bytes_in_flight`
    ///
    /// Returns `true` if the loss started a new congestion epoch
    pub fn on_loss(
        &mut self,
        largest_packet_number_lost: u64,
        largest_sent_packet_number: u64,
        prior_bytes_in_flight: u32,
        lost_bytes: u32,
        persistent_congestion: bool,
        minimum_window: u32,
    ) -> bool {
        let new_epoch = self.is_new_epoch(largest_packet_number_lost);

        if new_epoch {
            self.end_of_recovery = Some(largest_packet_number_lost.max(largest_sent_packet_number));
            if self.phase.is_none() {
                self.window = prior_bytes_in_flight;
            }
            self.phase = Some(Phase::Conservation);
        }

        if !self.in_recovery() {
            return false;
        }

        self.window = if persistent_congestion {
            minimum_window
        } else {
            self.window.saturating_sub(lost_bytes).max(minimum_window)
        };

        new_epoch
    }

    /// Called when the peer reports an ECN-CE increase
    ///
    /// Returns `true` if the signal started a new congestion epoch
    pub fn on_explicit_congestion(
        &mut self,
        largest_packet_number_acked: u64,
        largest_sent_packet_number: u64,
    ) -> bool {
        if !self.is_new_epoch(largest_packet_number_acked) {
            return false;
        }

        self.end_of_recovery = Some(largest_sent_packet_number);
        true
    }

    /// Leaves recovery after its losses were found to be spurious
    ///
    /// Returns `true` if the controller was in recovery
    pub fn on_spurious_loss(&mut self) -> bool {
        let in_recovery = self.in_recovery();
        self.phase = None;
        self.end_of_recovery = None;
        in_recovery
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
