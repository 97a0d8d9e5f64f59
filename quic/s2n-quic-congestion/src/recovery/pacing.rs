// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::Duration;

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.7
//# Using a value for "N" that is small, but at least 1 (for example, 1.25) ensures
//# that variations in RTT do not result in underutilization of the congestion window.
const N: (u64, u64) = (5, 4);

// In Slow Start, the congestion window grows rapidly, so there is a higher likelihood the congestion
// window may be underutilized due to pacing. To prevent that, we use a higher value for `N` while
// in slow start, as done in Linux:
// https://github.com/torvalds/linux/blob/fc02cb2b37fe2cbf1d3334b9f0f0eab9431766c4/net/ipv4/tcp_input.c#L905-L906
const SLOW_START_N: u64 = 2;

/// Pacing is not applied to paths with an RTT below this value, since the timer granularity
/// would make the pacing interval meaningless
pub(crate) const MINIMUM_PACING_RTT: Duration = Duration::from_millis(1);

/// Spreads the congestion window over a round trip by limiting the bytes released on each
/// send opportunity
#[derive(Clone, Debug, Default)]
pub(crate) struct Pacer {
    /// Allowance granted by the previous call that has not yet been used
    last_send_allowance: u32,
}

impl Pacer {
    /// Returns the send allowance given the `available` congestion window and the bytes
    /// released by pacing since the last send, if pacing applies
    #[inline]
    pub fn send_allowance(&mut self, available: u32, paced_bytes: Option<u64>) -> u32 {
        let Some(paced_bytes) = paced_bytes else {
            return available;
        };

        let allowance = (self.last_send_allowance as u64).saturating_add(paced_bytes);
        let allowance = u32::try_from(allowance)
            .unwrap_or(u32::MAX)
            .min(available);

        self.last_send_allowance = allowance;
        allowance
    }

    #[inline]
    pub fn on_data_sent(&mut self, bytes: u32) {
        self.last_send_allowance = self.last_send_allowance.saturating_sub(bytes);
    }

    #[inline]
    pub fn reset(&mut self) {
        self.last_send_allowance = 0;
    }
}

//= https://www.rfc-editor.org/rfc/rfc9002#section-7.7
//# rate = N * congestion_window / smoothed_rtt
/// The window a window-based controller paces over one round trip
///
/// In slow start the window is doubled but never beyond the slow start threshold.
#[inline]
pub(crate) fn estimated_window(
    congestion_window: u32,
    slow_start: bool,
    slow_start_threshold: Option<u32>,
) -> u64 {
    let congestion_window = congestion_window as u64;
    if slow_start {
        let window = congestion_window * SLOW_START_N;
        slow_start_threshold.map_or(window, |threshold| window.min(threshold as u64))
    } else {
        congestion_window * N.0 / N.1
    }
}

/// Bytes released by pacing `window` bytes evenly over `rtt` once `elapsed` has passed
///
/// Returns `None` if the RTT is too small to pace.
#[inline]
pub(crate) fn paced_bytes(window: u64, elapsed: Duration, rtt: Duration) -> Option<u64> {
    if rtt < MINIMUM_PACING_RTT {
        return None;
    }

    let bytes = window as u128 * elapsed.as_micros() / rtt.as_micros();
    Some(u64::try_from(bytes).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests;
