/*
 * Sleep accounting: a sleeping thread misses exactly the quanta it asked
 * to skip, and the quantum in which sleep() ran does not count.
 */

mod common;

use std::sync::atomic::{AtomicI32, Ordering};

static TOTAL_AT_SLEEP: AtomicI32 = AtomicI32::new(0);
static TOTAL_AT_WAKE: AtomicI32 = AtomicI32::new(0);

extern "C" fn sleeper() {
    TOTAL_AT_SLEEP.store(uthread::get_total_quantums(), Ordering::SeqCst);
    uthread::sleep(3);
    TOTAL_AT_WAKE.store(uthread::get_total_quantums(), Ordering::SeqCst);
    loop {
        std::hint::spin_loop();
    }
}

fn scenario() {
    assert_eq!(uthread::init(10_000), 0);
    assert_eq!(uthread::spawn(sleeper), 1);

    while TOTAL_AT_WAKE.load(Ordering::SeqCst) == 0 {
        std::hint::spin_loop();
    }

    let at_sleep = TOTAL_AT_SLEEP.load(Ordering::SeqCst);
    let at_wake = TOTAL_AT_WAKE.load(Ordering::SeqCst);
    assert!(at_sleep >= 1);
    // Three further quantum starts must pass before the sleeper becomes
    // eligible again, plus the one in which it yielded.
    assert!(at_wake >= at_sleep + 4, "slept from {at_sleep} to {at_wake}");

    assert_eq!(uthread::terminate(1), 0);
}

#[test]
fn sleeping_thread_misses_its_quanta() {
    common::run_isolated(scenario);
}
