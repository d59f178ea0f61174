// SPDX-License-Identifier: MIT

use super::*;

#[test]
fn system_clock_epoch_is_nonzero() {
    assert!(SystemClock.epoch_ms() > 0);
}

#[test]
fn fake_clock_advances_both_views() {
    let clock = FakeClock::new();
    let t0 = clock.now();
    let e0 = clock.epoch_ms();
    clock.advance(Duration::from_millis(250));
    assert_eq!(clock.now() - t0, Duration::from_millis(250));
    assert_eq!(clock.epoch_ms() - e0, 250);
}

#[test]
fn fake_clock_clones_share_state() {
    let a = FakeClock::new();
    let b = a.clone();
    a.advance(Duration::from_secs(1));
    assert_eq!(a.epoch_ms(), b.epoch_ms());
}
