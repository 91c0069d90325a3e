// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn system_clock_tracks_the_epoch() {
    let clock = SystemClock;
    let t1 = clock.epoch_ms();
    // 2020-01-01 in epoch ms; anything earlier means a broken clock source.
    assert!(t1 > 1_577_836_800_000);
    let t2 = clock.epoch_ms();
    assert!(t2 >= t1);
}

#[test]
fn fake_clock_advances_in_milliseconds() {
    let clock = FakeClock::new();
    let t1 = clock.epoch_ms();
    clock.advance(Duration::from_secs(60));
    assert_eq!(clock.epoch_ms(), t1 + 60_000);
    clock.advance(Duration::from_millis(5));
    assert_eq!(clock.epoch_ms(), t1 + 60_005);
}

#[test]
fn fake_clock_clones_share_the_same_time() {
    let clock1 = FakeClock::new();
    let clock2 = clock1.clone();
    clock2.set_epoch_ms(5_000_000);
    assert_eq!(clock1.epoch_ms(), 5_000_000);
    clock1.advance(Duration::from_secs(1));
    assert_eq!(clock2.epoch_ms(), 5_001_000);
}

#[test]
fn epoch_secs_truncates_millis() {
    let clock = FakeClock::new();
    clock.set_epoch_ms(12_345);
    assert_eq!(clock.epoch_secs(), 12);
}
