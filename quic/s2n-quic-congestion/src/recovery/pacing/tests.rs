// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use super::*;

#[test]
fn estimated_window_test() {
    assert_eq!(estimated_window(10_000, false, None), 12_500);
    assert_eq!(estimated_window(10_000, true, None), 20_000);
    // capped by the slow start threshold
    assert_eq!(estimated_window(10_000, true, Some(15_000)), 15_000);
}

#[test]
fn paced_bytes_test() {
    let rtt = Duration::from_millis(100);
    assert_eq!(paced_bytes(10_000, Duration::from_millis(10), rtt), Some(1_000));
    assert_eq!(paced_bytes(10_000, Duration::ZERO, rtt), Some(0));
    assert_eq!(
        paced_bytes(10_000, Duration::from_millis(10), Duration::from_micros(500)),
        None
    );
}

#[test]
fn accumulates_unused_allowance() {
    let mut pacer = Pacer::default();

    // not pacing releases the full window
    assert_eq!(pacer.send_allowance(5_000, None), 5_000);

    assert_eq!(pacer.send_allowance(5_000, Some(1_000)), 1_000);
    // the unused allowance carries over
    assert_eq!(pacer.send_allowance(5_000, Some(1_000)), 2_000);

    pacer.on_data_sent(1_500);
    assert_eq!(pacer.send_allowance(5_000, Some(1_000)), 1_500);

    // never more than the available window
    assert_eq!(pacer.send_allowance(1_200, Some(u64::MAX)), 1_200);

    pacer.reset();
    assert_eq!(pacer.send_allowance(5_000, Some(100)), 100);
}
