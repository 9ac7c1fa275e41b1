// Focused tests for period helpers.
use espresso_core::util::{period_ms, period_us, tick_period, within};
use std::time::Duration;

#[test]
fn period_us_clamps_and_floors() {
    // hz=1 → 1s
    assert_eq!(period_us(1), 1_000_000);
    // hz=50 → the default logic tick
    assert_eq!(period_us(50), 20_000);
    // Very high hz floors to 1µs minimum
    assert_eq!(period_us(1_000_000), 1);
    assert_eq!(period_us(u32::MAX), 1);
    // hz=0 is treated as 1 Hz
    assert_eq!(period_us(0), 1_000_000);
}

#[test]
fn period_ms_minimum() {
    assert_eq!(period_ms(1), 1000);
    assert_eq!(period_ms(2), 500);
    // hz>=1000 floors to 0ms but we cap to >=1ms
    assert_eq!(period_ms(1000), 1);
    assert_eq!(period_ms(10_000), 1);
    assert_eq!(period_ms(0), 1000);
}

#[test]
fn tick_period_is_a_duration() {
    assert_eq!(tick_period(50), Duration::from_millis(20));
}

#[test]
fn within_is_strict() {
    assert!(within(92.6, 93.0, 0.5));
    assert!(!within(92.5, 93.0, 0.5));
    assert!(!within(f32::NAN, 93.0, 0.5));
}
