// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::time::{Duration, Timestamp};
use core::ops::Mul;
use num_rational::Ratio;

const MICRO_BITS_PER_BYTE: u128 = 8 * 1_000_000;

#[derive(Copy, Clone, Debug, Default, PartialOrd, PartialEq, Eq, Ord)]
pub struct Bandwidth {
    bits_per_second: u64,
}

impl Bandwidth {
    pub const ZERO: Bandwidth = Bandwidth { bits_per_second: 0 };

    /// Constructs a bandwidth from the `bytes` delivered over `interval`
    pub fn new(bytes: u64, interval: Duration) -> Self {
        if interval.is_zero() {
            Bandwidth::ZERO
        } else {
            let bits_per_second = bytes as u128 * MICRO_BITS_PER_BYTE / interval.as_micros();
            Self {
                bits_per_second: u64::try_from(bits_per_second).unwrap_or(u64::MAX),
            }
        }
    }

    #[inline]
    pub fn bits_per_second(&self) -> u64 {
        self.bits_per_second
    }

    #[inline]
    pub fn bytes_per_second(&self) -> u64 {
        self.bits_per_second / 8
    }
}

impl Mul<Ratio<u64>> for Bandwidth {
    type Output = Bandwidth;

    #[inline]
    fn mul(self, rhs: Ratio<u64>) -> Self::Output {
        let bits_per_second =
            self.bits_per_second as u128 * *rhs.numer() as u128 / *rhs.denom() as u128;
        Bandwidth {
            bits_per_second: u64::try_from(bits_per_second).unwrap_or(u64::MAX),
        }
    }
}

impl Mul<Duration> for Bandwidth {
    /// The number of bytes delivered at this rate over the duration
    type Output = u64;

    #[inline]
    fn mul(self, rhs: Duration) -> Self::Output {
        let bytes = self.bits_per_second as u128 * rhs.as_micros() / MICRO_BITS_PER_BYTE;
        u64::try_from(bytes).unwrap_or(u64::MAX)
    }
}

/// A point in the delivery history of the connection
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct DeliverySnapshot {
    pub delivered_bytes: u64,
    pub time: Timestamp,
}

/// Samples the delivery rate once per ACK over an interval of at least one round trip
///
/// The interval starts at the beginning of the previous round, so a sample always covers a full
/// round of acknowledgements rather than a single burst.
#[derive(Clone, Debug, Default)]
pub(crate) struct Estimator {
    previous_round: Option<DeliverySnapshot>,
    current_round: Option<DeliverySnapshot>,
}

impl Estimator {
    /// Called for each ACK, returns the delivery rate sample if one is available
    #[inline]
    pub fn on_ack(
        &mut self,
        delivered_bytes: u64,
        now: Timestamp,
        round_start: bool,
    ) -> Option<Bandwidth> {
        let snapshot = DeliverySnapshot {
            delivered_bytes,
            time: now,
        };

        if round_start || self.current_round.is_none() {
            self.previous_round = self.current_round.replace(snapshot);
        }

        let start = self.previous_round?;
        let interval = now - start.time;
        if interval.is_zero() {
            return None;
        }

        Some(Bandwidth::new(
            delivered_bytes.saturating_sub(start.delivered_bytes),
            interval,
        ))
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
