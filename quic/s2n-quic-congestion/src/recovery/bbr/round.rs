// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//= https://tools.ietf.org/id/draft-cardwell-iccrg-bbr-congestion-control-02#4.5.1
//# Several aspects of the BBR algorithm depend on counting the progress of "packet-timed" round
//# trips, which start at the transmission of some segment, and then end at the acknowledgement
//# of that segment. BBR.round_count is a count of the number of these "packet-timed" round trips
//# elapsed so far.
///
/// Rounds are delimited by packet numbers: a round ends when a packet sent after the round
/// started is acknowledged.
#[derive(Clone, Debug, Default)]
pub(crate) struct Counter {
    /// The largest packet number sent when the current round started
    end_of_round: Option<u64>,
    /// True if the current ack being processed started a new round
    round_start: bool,
    /// The number of rounds counted since initialization
    round_count: u64,
}

impl Counter {
    /// Called for each acknowledgement, returns true if a new round started
    pub fn on_ack(&mut self, largest_ack: u64, largest_sent_packet_number: u64) -> bool {
        self.round_start = self
            .end_of_round
            .is_none_or(|end_of_round| largest_ack > end_of_round);

        if self.round_start {
            self.end_of_round = Some(largest_sent_packet_number);
            self.round_count += 1;
        }

        self.round_start
    }

    /// True if the latest acknowledgement started a new round
    #[cfg(test)]
    pub fn round_start(&self) -> bool {
        self.round_start
    }

    /// The number of rounds counted since initialization
    #[inline]
    pub fn round_count(&self) -> u64 {
        self.round_count
    }

    /// Forgets the current round without resetting the count
    ///
    /// The count keeps increasing so filters windowed over rounds stay valid.
    pub fn restart(&mut self) {
        self.end_of_round = None;
        self.round_start = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter() {
        let mut counter = Counter::default();
        assert!(!counter.round_start());
        assert_eq!(0, counter.round_count());

        // the first ack always starts a round, ending when packet 10 is acknowledged
        assert!(counter.on_ack(0, 10));
        assert_eq!(1, counter.round_count());

        for largest_ack in 1..=10 {
            assert!(!counter.on_ack(largest_ack, 20));
            assert!(!counter.round_start());
        }
        assert_eq!(1, counter.round_count());

        // a packet sent after the round started is acknowledged
        assert!(counter.on_ack(11, 20));
        assert!(counter.round_start());
        assert_eq!(2, counter.round_count());

        counter.restart();
        assert!(!counter.round_start());
        assert!(counter.on_ack(12, 30));
        assert_eq!(3, counter.round_count());
    }
}
