// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;
use crate::time::{Clock, NoopClock};

const RTT: Duration = Duration::from_millis(100);
const PACKET: u32 = 1200;

/// Sends and acknowledges whole packets over a path, tracking packet numbers
struct Path {
    cc: BbrCongestionController,
    now: Timestamp,
    next_packet_number: u64,
    next_unacked: u64,
    total_acked: u64,
}

impl Path {
    fn new() -> Self {
        Self::with_settings(&Settings::default())
    }

    fn with_settings(settings: &Settings) -> Self {
        crate::testing::init_tracing();

        Self {
            cc: BbrCongestionController::with_seed(settings, 123),
            now: NoopClock.get_time(),
            next_packet_number: 0,
            next_unacked: 0,
            total_acked: 0,
        }
    }

    fn send(&mut self, packets: u64) {
        for _ in 0..packets {
            self.cc.on_data_sent(PACKET);
            self.next_packet_number += 1;
        }
    }

    fn ack_event(&mut self, packets: u64, elapsed: Duration, rtt: Duration) -> AckEvent {
        let bytes = packets as u32 * PACKET;
        self.now += elapsed;
        self.next_unacked += packets;
        self.total_acked += bytes as u64;
        AckEvent::new(
            self.now,
            self.next_unacked - 1,
            self.next_packet_number - 1,
            self.total_acked,
            bytes,
            rtt,
        )
    }

    /// Acknowledges the oldest `packets` outstanding packets
    fn ack(&mut self, packets: u64, elapsed: Duration) -> bool {
        self.ack_with_rtt(packets, elapsed, RTT)
    }

    fn ack_with_rtt(&mut self, packets: u64, elapsed: Duration, rtt: Duration) -> bool {
        let ack = self.ack_event(packets, elapsed, rtt);
        self.cc.on_data_acknowledged(&ack)
    }

    /// Sends and acknowledges an initial window worth of packets over one RTT
    fn round(&mut self) {
        self.send(10);
        self.ack(10, RTT);
    }

    /// Runs startup at a constant 120KB/s until the pipe is filled and the queue drained
    fn probe_bw() -> Self {
        let mut path = Self::new();
        for _ in 0..4 {
            path.round();
        }
        path.send(30);
        path.ack(10, RTT);
        assert!(path.cc.state.is_drain());
        path.ack(20, RTT);
        assert!(matches!(path.cc.state, State::ProbeBw(_)));
        path
    }
}

#[test]
fn initial_state() {
    let cc = BbrCongestionController::new(&Settings::default());
    assert_eq!(cc.state, State::Startup);
    assert_eq!(cc.congestion_window(), 12_000);
    assert_eq!(cc.bytes_in_flight_max(), 6_000);
    assert_eq!(cc.minimum_window, 4_800);
    assert_eq!(cc.algorithm(), Algorithm::Bbr);
    assert!(!cc.is_app_limited());

    let stats = cc.network_statistics();
    assert_eq!(stats.bandwidth, 0);
    assert_eq!(stats.min_rtt, None);
}

#[test]
fn startup_drain_probe_bw() {
    let mut path = Path::new();

    // no model yet, so the window grows with every acknowledged byte
    path.round();
    assert_eq!(path.cc.congestion_window(), 24_000);
    assert_eq!(path.cc.network_statistics().bandwidth, 0);

    // 12000 bytes over 100ms, with a 2.885 gain the target window is 34620
    path.round();
    assert_eq!(path.cc.network_statistics().bandwidth, 120_000);
    assert_eq!(path.cc.congestion_window(), 36_000);

    path.round();
    assert_eq!(path.cc.congestion_window(), 36_000);
    path.round();
    assert!(path.cc.state.is_startup());

    // the third round without growth fills the pipe, with 24000 bytes still queued
    path.send(30);
    path.ack(10, RTT);
    assert!(path.cc.state.is_drain());
    assert!(path.cc.full_pipe_estimator.filled_pipe());
    assert_eq!(path.cc.congestion_window(), 34_620);

    path.ack(20, RTT);
    let State::ProbeBw(ref probe_bw) = path.cc.state else {
        panic!("expected ProbeBW, found {:?}", path.cc.state);
    };
    assert_ne!(probe_bw.pacing_gain(), Ratio::new(3, 4));

    // 36000 bytes over the last 200ms
    assert_eq!(path.cc.network_statistics().bandwidth, 180_000);
    assert_eq!(path.cc.congestion_window(), 36_000);
}

#[test]
fn app_limited_samples_do_not_update_bandwidth() {
    let mut path = Path::new();
    path.round();

    path.send(10);
    let mut ack = path.ack_event(10, RTT, RTT);
    ack.is_largest_acked_packet_app_limited = true;
    path.cc.on_data_acknowledged(&ack);
    assert_eq!(path.cc.bandwidth_filter.value(), None);
    assert_eq!(path.cc.network_statistics().bandwidth, 0);

    path.round();
    assert_eq!(path.cc.network_statistics().bandwidth, 120_000);
}

#[test]
fn app_limited() {
    let mut cc = BbrCongestionController::with_seed(&Settings::default(), 1);

    cc.set_app_limited();
    assert!(cc.is_app_limited());

    // filling the window ends the app limited period
    for _ in 0..10 {
        cc.on_data_sent(PACKET);
    }
    assert!(!cc.is_app_limited());

    // ignored while the window is exceeded
    cc.on_data_sent(PACKET);
    cc.set_app_limited();
    assert!(!cc.is_app_limited());
}

#[test]
fn app_limited_exit() {
    let mut path = Path::new();
    path.send(2);
    path.cc.set_app_limited();
    assert!(path.cc.is_app_limited());

    // acknowledging packets sent before the app limited period does not exit it
    path.ack(1, RTT);
    assert!(path.cc.is_app_limited());

    path.send(1);
    path.ack(2, RTT);
    assert!(!path.cc.is_app_limited());
}

#[test]
fn probe_rtt() {
    let mut path = Path::probe_bw();
    assert_eq!(path.cc.congestion_window(), 36_000);
    let larger_rtt = Duration::from_millis(150);

    // the 100ms estimate expires after 10s
    path.send(1);
    path.ack_with_rtt(1, Duration::from_secs(10), larger_rtt);
    assert!(path.cc.state.is_probing_rtt());
    assert_eq!(path.cc.congestion_window(), 4_800);
    assert_eq!(path.cc.previous_congestion_window, 36_000);
    assert!(path.cc.is_app_limited());

    // a round has passed but not the minimum duration
    path.send(1);
    path.ack_with_rtt(1, RTT, larger_rtt);
    assert!(path.cc.state.is_probing_rtt());

    path.send(1);
    path.ack_with_rtt(1, RTT, larger_rtt);
    assert!(matches!(path.cc.state, State::ProbeBw(_)));
    assert_eq!(path.cc.network_statistics().min_rtt, Some(larger_rtt));
    // the saved window is restored, then grows toward twice the BDP at the new min RTT
    assert_eq!(path.cc.congestion_window(), 37_200);
    assert!(!path.cc.min_rtt_filter.expired());
}

#[test]
fn probe_rtt_waits_for_drained_window() {
    let mut path = Path::probe_bw();

    path.send(10);
    path.ack_with_rtt(1, Duration::from_secs(10), Duration::from_millis(150));
    assert!(path.cc.state.is_probing_rtt());

    // the timer does not start while more than the minimum window is in flight
    let State::ProbeRtt(ref probe_rtt) = path.cc.state else {
        unreachable!();
    };
    assert_eq!(probe_rtt.done_timestamp, None);

    path.ack(5, Duration::from_secs(1));
    assert!(path.cc.state.is_probing_rtt());
    let State::ProbeRtt(ref probe_rtt) = path.cc.state else {
        unreachable!();
    };
    assert!(probe_rtt.done_timestamp.is_some());
}

#[test]
fn loss_enters_recovery() {
    let mut path = Path::new();
    path.send(10);

    path.cc.on_data_lost(&LossEvent::new(1, 9, 2 * PACKET));
    assert!(path.cc.is_in_recovery());
    assert_eq!(path.cc.congestion_window(), 9_600);
    assert_eq!(path.cc.bytes_in_flight(), 9_600);

    // the same epoch shrinks the recovery window but is not a new event
    path.cc.on_data_lost(&LossEvent::new(5, 9, PACKET));
    assert_eq!(path.cc.congestion_window(), 8_400);
    assert_eq!(path.cc.network_statistics().congestion_event_count, 1);

    // a packet sent after the loss ends recovery
    path.next_unacked = 9;
    path.send(1);
    path.ack(2, RTT);
    assert!(!path.cc.is_in_recovery());
}

#[test]
fn persistent_congestion_uses_minimum_window() {
    let mut path = Path::new();
    path.send(10);

    path.cc.on_data_lost(&LossEvent {
        persistent_congestion: true,
        ..LossEvent::new(9, 9, 10 * PACKET)
    });
    assert!(path.cc.is_in_recovery());
    assert_eq!(path.cc.congestion_window(), 4_800);
    assert_eq!(path.cc.bytes_in_flight(), 0);

    // the model is untouched by loss
    assert!(path.cc.state.is_startup());
}

#[test]
fn spurious_congestion_event() {
    let mut path = Path::new();
    assert!(!path.cc.on_spurious_congestion_event());

    path.send(10);
    path.cc.on_data_lost(&LossEvent::new(1, 9, 2 * PACKET));
    assert_eq!(path.cc.congestion_window(), 9_600);

    assert!(path.cc.on_spurious_congestion_event());
    assert!(!path.cc.is_in_recovery());
    assert_eq!(path.cc.congestion_window(), 12_000);
    assert!(!path.cc.on_spurious_congestion_event());
}

#[test]
fn ecn_in_startup() {
    let mut path = Path::new();
    path.send(10);

    let ecn = EcnEvent {
        largest_packet_number_acked: 5,
        largest_sent_packet_number: 9,
    };
    path.cc.on_ecn(&ecn);
    assert!(path.cc.state.is_drain());
    assert!(!path.cc.is_in_recovery());
    assert_eq!(path.cc.network_statistics().congestion_event_count, 1);

    // the same epoch is not counted again
    path.cc.on_ecn(&EcnEvent {
        largest_packet_number_acked: 9,
        ..ecn
    });
    assert_eq!(path.cc.network_statistics().congestion_event_count, 1);
}

#[test]
fn ecn_in_probe_bw() {
    let mut path = Path::probe_bw();
    path.send(10);

    path.cc.on_ecn(&EcnEvent {
        largest_packet_number_acked: 69,
        largest_sent_packet_number: 79,
    });

    let State::ProbeBw(ref probe_bw) = path.cc.state else {
        panic!("expected ProbeBW, found {:?}", path.cc.state);
    };
    assert_eq!(probe_bw.pacing_gain(), Ratio::new(3, 4));
    assert_eq!(probe_bw.cycle_index, 1);

    // the drain phase starts timing on the next ack
    path.ack(1, RTT);
    let State::ProbeBw(ref probe_bw) = path.cc.state else {
        unreachable!();
    };
    assert_eq!(probe_bw.cycle_start, Some(path.now));
}

#[test]
fn implicit_ack_only_grows_window() {
    let mut path = Path::new();
    path.send(10);

    let mut ack = path.ack_event(10, RTT, RTT);
    ack.is_implicit = true;
    assert!(path.cc.on_data_acknowledged(&ack));

    assert_eq!(path.cc.congestion_window(), 24_000);
    assert_eq!(path.cc.bytes_in_flight(), 0);
    assert_eq!(path.cc.round_counter.round_count(), 0);

    let stats = path.cc.network_statistics();
    assert_eq!(stats.min_rtt, None);
    assert_eq!(stats.smoothed_rtt, None);
}

#[test]
fn send_allowance() {
    let mut path = Path::new();

    // without an RTT sample the whole window is available
    assert_eq!(path.cc.send_allowance(None), 12_000);
    assert_eq!(path.cc.send_allowance(Some(RTT)), 12_000);

    path.round();
    assert_eq!(path.cc.send_allowance(None), 24_000);

    // startup paces 2.885 * 24000 over the 100ms min RTT
    assert_eq!(path.cc.send_allowance(Some(Duration::from_millis(10))), 6_924);
    assert_eq!(path.cc.send_allowance(Some(RTT)), 24_000);

    // a full window only allows the exempt packet
    path.send(20);
    assert_eq!(path.cc.send_allowance(Some(RTT)), 0);
    path.cc.set_exemption(1);
    assert_eq!(path.cc.send_allowance(Some(RTT)), 1_200);
}

#[test]
fn send_allowance_probe_bw() {
    let mut path = Path::probe_bw();
    let gain = match path.cc.state {
        State::ProbeBw(ref probe_bw) => probe_bw.pacing_gain(),
        _ => unreachable!(),
    };

    // paced at the gained bandwidth of 180KB/s
    let allowance = path.cc.send_allowance(Some(Duration::from_millis(10)));
    assert_eq!(allowance as u64, (gain * 1_800).to_integer());
}

#[test]
fn send_allowance_without_pacing() {
    let settings = Settings::builder().with_pacing(false).build().unwrap();
    let mut path = Path::with_settings(&settings);
    path.round();

    assert_eq!(path.cc.send_allowance(Some(Duration::from_millis(10))), 24_000);
}

#[test]
fn window_is_clamped() {
    let settings = Settings::builder()
        .with_maximum_window(30_000)
        .build()
        .unwrap();
    let mut path = Path::with_settings(&settings);

    path.round();
    path.round();
    assert_eq!(path.cc.congestion_window(), 30_000);

    path.cc.seed_congestion_window(1_000, path.now);
    assert_eq!(path.cc.congestion_window(), 4_800);
}

#[test]
fn reset() {
    let mut path = Path::probe_bw();
    path.send(5);

    // a partial reset restarts the state machine but keeps the model
    path.cc.reset(false);
    assert!(path.cc.state.is_startup());
    assert_eq!(path.cc.congestion_window(), 12_000);
    assert_eq!(path.cc.bytes_in_flight(), 6_000);
    assert!(!path.cc.full_pipe_estimator.filled_pipe());
    let stats = path.cc.network_statistics();
    assert_eq!(stats.bandwidth, 180_000);
    assert_eq!(stats.min_rtt, Some(RTT));

    path.cc.reset(true);
    assert_eq!(path.cc.bytes_in_flight(), 0);
    assert_eq!(
        path.cc.network_statistics(),
        BbrCongestionController::new(&Settings::default()).network_statistics()
    );
}

#[test]
fn parameters_validate() {
    assert!(Parameters::default().validate().is_ok());

    let invalid = [
        Parameters {
            startup_gain: Ratio::new_raw(1, 1),
            ..Default::default()
        },
        Parameters {
            startup_gain: Ratio::new_raw(3, 0),
            ..Default::default()
        },
        Parameters {
            cwnd_gain: Ratio::new_raw(1, 2),
            ..Default::default()
        },
        Parameters {
            startup_growth_target: Ratio::new_raw(1, 1),
            ..Default::default()
        },
        Parameters {
            startup_growth_rounds: 0,
            ..Default::default()
        },
        Parameters {
            probe_rtt_duration: Duration::ZERO,
            ..Default::default()
        },
        Parameters {
            minimum_window_packets: 1,
            ..Default::default()
        },
    ];

    for parameters in invalid {
        assert!(parameters.validate().is_err(), "{parameters:?}");
    }
}
