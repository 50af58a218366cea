/*
 * Sleep and explicit block hold independently: a sleeper that gets
 * blocked stays blocked when its sleep expires, and wakes only after a
 * paired resume.
 */

mod common;

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

static TOTAL_AT_SLEEP: AtomicI32 = AtomicI32::new(0);
static WOKE: AtomicBool = AtomicBool::new(false);

extern "C" fn sleeper() {
    TOTAL_AT_SLEEP.store(uthread::get_total_quantums(), Ordering::SeqCst);
    uthread::sleep(5);
    WOKE.store(true, Ordering::SeqCst);
    loop {
        std::hint::spin_loop();
    }
}

fn state_of(tid: usize) -> Option<uthread::ThreadState> {
    uthread::threads()
        .iter()
        .find(|t| t.tid == uthread::Tid(tid))
        .map(|t| t.state)
}

fn scenario() {
    assert_eq!(uthread::init(10_000), 0);
    assert_eq!(uthread::spawn(sleeper), 1);

    // Wait until the sleeper is asleep, then block it on top.
    while TOTAL_AT_SLEEP.load(Ordering::SeqCst) == 0
        || state_of(1) != Some(uthread::ThreadState::Blocked)
    {
        std::hint::spin_loop();
    }
    assert_eq!(uthread::block(1), 0);

    // Let the sleep expire with room to spare.
    let expiry = TOTAL_AT_SLEEP.load(Ordering::SeqCst) + 5 + 3;
    while uthread::get_total_quantums() < expiry {
        std::hint::spin_loop();
    }

    // The sleep is over, but the explicit block still holds.
    assert!(!WOKE.load(Ordering::SeqCst));
    assert_eq!(state_of(1), Some(uthread::ThreadState::Blocked));

    assert_eq!(uthread::resume(1), 0);
    let deadline = uthread::get_total_quantums() + 30;
    while !WOKE.load(Ordering::SeqCst) && uthread::get_total_quantums() < deadline {
        std::hint::spin_loop();
    }
    assert!(WOKE.load(Ordering::SeqCst));
}

#[test]
fn blocked_sleeper_stays_blocked_past_expiry() {
    common::run_isolated(scenario);
}
