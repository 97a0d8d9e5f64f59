// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use crate::{
    event::{AckEvent, EcnEvent, LossEvent},
    recovery::{BbrCongestionController, CongestionController, CubicCongestionController},
    settings::{Settings, MINIMUM_MAX_DATAGRAM_SIZE},
    time::{testing::Clock, Clock as _, Duration, Timestamp},
};
use bolero::{check, generator::*};
use std::collections::VecDeque;

struct SentPacket {
    packet_number: u64,
    bytes: u32,
    app_limited: bool,
}

#[derive(Debug, TypeGenerator)]
enum Operation {
    IncrementTime {
        /// The milli-second value by which to increase the timestamp
        millis: u16,
    },
    PacketSent {
        #[generator(1..=64)]
        count: u8,
        #[generator(1200..=9000)]
        bytes: u16,
    },
    RttUpdated {
        #[generator(1..=2000)]
        millis: u64,
    },
    AckReceived {
        #[generator(1..=64)]
        count: u8,
        implicit: bool,
    },
    PacketLost {
        persistent_congestion: bool,
    },
    ExplicitCongestion,
    PacketInvalidated,
    SpuriousCongestionEvent,
    AppLimited,
    Exemption {
        #[generator(0..=4)]
        packets: u8,
    },
    SendAllowance {
        elapsed_millis: Option<u16>,
    },
    Reset {
        full: bool,
    },
}

impl Operation {
    /// Operations that never signal congestion
    fn is_clean(&self) -> bool {
        matches!(
            self,
            Operation::IncrementTime { .. }
                | Operation::PacketSent { .. }
                | Operation::RttUpdated { .. }
                | Operation::AckReceived { .. }
        )
    }
}

struct Model<CC: CongestionController> {
    /// The congestion controller being fuzzed
    subject: CC,
    settings: Settings,
    /// Tracks packets in flight, oldest first
    sent_packets: VecDeque<SentPacket>,
    next_packet_number: u64,
    largest_acked: Option<u64>,
    total_acked: u64,
    rtt: Duration,
    /// A monotonically increasing timestamp
    timestamp: Timestamp,
}

impl<CC: CongestionController> Model<CC> {
    fn new(subject: CC, settings: Settings) -> Self {
        Self {
            subject,
            settings,
            sent_packets: VecDeque::new(),
            next_packet_number: 0,
            largest_acked: None,
            total_acked: 0,
            rtt: Duration::from_millis(100),
            timestamp: Clock::default().get_time(),
        }
    }

    fn apply(&mut self, operation: &Operation) {
        match operation {
            Operation::IncrementTime { millis } => {
                self.timestamp += Duration::from_millis(*millis as u64);
            }
            Operation::PacketSent { count, bytes } => self.on_packet_sent(*count, *bytes),
            Operation::RttUpdated { millis } => self.rtt = Duration::from_millis(*millis),
            Operation::AckReceived { count, implicit } => self.on_ack_received(*count, *implicit),
            Operation::PacketLost {
                persistent_congestion,
            } => self.on_packet_lost(*persistent_congestion),
            Operation::ExplicitCongestion => self.on_explicit_congestion(),
            Operation::PacketInvalidated => self.on_packet_invalidated(),
            Operation::SpuriousCongestionEvent => {
                self.subject.on_spurious_congestion_event();
            }
            Operation::AppLimited => self.subject.set_app_limited(),
            Operation::Exemption { packets } => self.subject.set_exemption(*packets),
            Operation::SendAllowance { elapsed_millis } => {
                self.on_send_allowance(elapsed_millis.map(|millis| Duration::from_millis(millis as u64)))
            }
            Operation::Reset { full } => {
                self.subject.reset(*full);
                if *full {
                    self.sent_packets.clear();
                }
            }
        }
    }

    fn largest_sent(&self) -> u64 {
        self.next_packet_number.saturating_sub(1)
    }

    fn on_packet_sent(&mut self, count: u8, bytes: u16) {
        for _ in 0..count {
            let app_limited = self.subject.is_app_limited();
            self.subject.on_data_sent(bytes as u32);
            self.sent_packets.push_back(SentPacket {
                packet_number: self.next_packet_number,
                bytes: bytes as u32,
                app_limited,
            });
            self.next_packet_number += 1;
        }
    }

    fn on_ack_received(&mut self, count: u8, implicit: bool) {
        let mut bytes = 0;
        let mut largest = None;

        for _ in 0..count {
            let Some(packet) = self.sent_packets.pop_front() else {
                break;
            };
            bytes += packet.bytes;
            largest = Some((packet.packet_number, packet.app_limited));
        }

        let Some((largest_ack, app_limited)) = largest else {
            return;
        };

        self.largest_acked = Some(largest_ack);
        self.total_acked += bytes as u64;

        let mut ack = AckEvent::new(
            self.timestamp,
            largest_ack,
            self.largest_sent(),
            self.total_acked,
            bytes,
            self.rtt,
        );
        ack.is_implicit = implicit;
        ack.is_largest_acked_packet_app_limited = app_limited;

        self.subject.on_data_acknowledged(&ack);
    }

    fn on_packet_lost(&mut self, persistent_congestion: bool) {
        if let Some(packet) = self.sent_packets.pop_front() {
            self.subject.on_data_lost(&LossEvent {
                persistent_congestion,
                ..LossEvent::new(packet.packet_number, self.largest_sent(), packet.bytes)
            });
        }
    }

    fn on_explicit_congestion(&mut self) {
        self.subject.on_ecn(&EcnEvent {
            largest_packet_number_acked: self.largest_acked.unwrap_or_default(),
            largest_sent_packet_number: self.largest_sent(),
        });
    }

    fn on_packet_invalidated(&mut self) {
        if let Some(packet) = self.sent_packets.pop_front() {
            self.subject.on_data_invalidated(packet.bytes);
        }
    }

    fn on_send_allowance(&mut self, elapsed: Option<Duration>) {
        let available = self
            .subject
            .congestion_window()
            .saturating_sub(self.subject.bytes_in_flight());
        let allowance = self.subject.send_allowance(elapsed);

        assert!(allowance <= available.max(self.settings.max_datagram_size() as u32));
    }

    fn invariants(&self) {
        let bytes_in_flight: u32 = self.sent_packets.iter().map(|packet| packet.bytes).sum();
        assert_eq!(bytes_in_flight, self.subject.bytes_in_flight());

        let congestion_window = self.subject.congestion_window();
        assert!(congestion_window >= self.settings.minimum_window());
        assert!(congestion_window <= self.settings.maximum_window());

        self.subject.log_out_flow_status();
    }

    /// A full reset is indistinguishable from a new controller
    fn full_reset_invariant(&self, new: CC) {
        let mut subject = self.subject.clone();
        subject.reset(true);

        assert_eq!(subject.network_statistics(), new.network_statistics());
        assert_eq!(subject.can_send(), new.can_send());
        assert_eq!(subject.exemptions(), new.exemptions());
        assert_eq!(subject.is_app_limited(), new.is_app_limited());
    }
}

fn settings(max_datagram_size: u16) -> Settings {
    Settings::builder()
        .with_max_datagram_size(max_datagram_size)
        .and_then(|builder| builder.build())
        .unwrap()
}

#[test]
fn cubic_fuzz() {
    crate::testing::init_tracing();

    check!()
        .with_generator((
            MINIMUM_MAX_DATAGRAM_SIZE..=9000,
            gen::<Vec<Operation>>(),
        ))
        .for_each(|(max_datagram_size, operations)| {
            let settings = settings(*max_datagram_size);
            let mut model = Model::new(CubicCongestionController::new(&settings), settings);

            for operation in operations.iter() {
                model.apply(operation);
                model.invariants();
            }

            model.full_reset_invariant(CubicCongestionController::new(&settings));
        });
}

#[test]
fn bbr_fuzz() {
    crate::testing::init_tracing();

    check!()
        .with_generator((
            MINIMUM_MAX_DATAGRAM_SIZE..=9000,
            gen::<u64>(),
            gen::<Vec<Operation>>(),
        ))
        .for_each(|(max_datagram_size, seed, operations)| {
            let settings = settings(*max_datagram_size);
            let mut model = Model::new(BbrCongestionController::with_seed(&settings, *seed), settings);

            for operation in operations.iter() {
                model.apply(operation);
                model.invariants();
            }

            model.full_reset_invariant(BbrCongestionController::with_seed(&settings, *seed));
        });
}

#[test]
fn cubic_window_does_not_shrink_without_congestion() {
    check!()
        .with_generator(gen::<Vec<Operation>>())
        .for_each(|operations| {
            let settings = Settings::default();
            let mut model = Model::new(CubicCongestionController::new(&settings), settings);
            let mut congestion_window = model.subject.congestion_window();

            for operation in operations.iter().filter(|operation| operation.is_clean()) {
                model.apply(operation);
                let current = model.subject.congestion_window();
                assert!(current >= congestion_window, "{operation:?}");
                congestion_window = current;
            }
        });
}

#[test]
fn bbr_app_limited_samples_are_ignored() {
    check!()
        .with_generator(gen::<Vec<Operation>>())
        .for_each(|operations| {
            let settings = Settings::default();
            let mut model = Model::new(BbrCongestionController::with_seed(&settings, 0), settings);

            for operation in operations.iter() {
                let bandwidth = model.subject.network_statistics().bandwidth;
                let app_limited = model
                    .sent_packets
                    .iter()
                    .all(|packet| packet.app_limited);

                model.apply(operation);

                // every ack can only carry an app limited sample
                if app_limited && matches!(operation, Operation::AckReceived { .. }) {
                    assert!(model.subject.network_statistics().bandwidth <= bandwidth);
                }
            }
        });
}

/// Loses a packet after congestion-free operations, then reverts the response
fn spurious_congestion_event_reverts<CC: CongestionController>(
    subject: CC,
    settings: Settings,
    operations: &[Operation],
    count: u8,
) {
    let mut model = Model::new(subject, settings);

    for operation in operations.iter().filter(|operation| operation.is_clean()) {
        model.apply(operation);
    }

    model.on_packet_sent(count, 1200);
    let congestion_window = model.subject.congestion_window();
    let bytes_in_flight_max = model.subject.bytes_in_flight_max();
    model.on_packet_lost(false);
    assert!(model.subject.is_in_recovery());

    assert!(model.subject.on_spurious_congestion_event());
    assert_eq!(model.subject.congestion_window(), congestion_window);
    assert_eq!(model.subject.bytes_in_flight_max(), bytes_in_flight_max);
    assert!(!model.subject.is_in_recovery());
}

#[test]
fn spurious_congestion_event_restores_window() {
    crate::testing::init_tracing();

    check!()
        .with_generator((gen::<Vec<Operation>>(), 1..=64u8))
        .for_each(|(operations, count)| {
            let settings = Settings::default();
            spurious_congestion_event_reverts(
                CubicCongestionController::new(&settings),
                settings,
                operations,
                *count,
            );
        });
}

#[test]
fn bbr_spurious_congestion_event_restores_window() {
    crate::testing::init_tracing();

    check!()
        .with_generator((gen::<u64>(), gen::<Vec<Operation>>(), 1..=64u8))
        .for_each(|(seed, operations, count)| {
            let settings = Settings::default();
            spurious_congestion_event_reverts(
                BbrCongestionController::with_seed(&settings, *seed),
                settings,
                operations,
                *count,
            );
        });
}
