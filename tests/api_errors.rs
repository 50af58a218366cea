/*
 * Contract violations: every misuse returns -1 and leaves scheduler state
 * untouched.
 */

mod common;

extern "C" fn busy() {
    loop {
        std::hint::spin_loop();
    }
}

fn before_init_scenario() {
    assert_eq!(uthread::get_tid(), -1);
    assert_eq!(uthread::get_total_quantums(), -1);
    assert_eq!(uthread::spawn(busy), -1);
    assert_eq!(uthread::terminate(0), -1);
    assert_eq!(uthread::block(1), -1);
    assert_eq!(uthread::resume(1), -1);
    assert_eq!(uthread::sleep(1), -1);
    assert!(uthread::threads().is_empty());

    assert_eq!(uthread::init(0), -1);
    assert_eq!(uthread::init(-50_000), -1);
}

fn misuse_scenario() {
    assert_eq!(uthread::init(10_000), 0);
    assert_eq!(uthread::init(10_000), -1); // double init

    assert_eq!(uthread::get_tid(), 0);
    assert!(uthread::get_total_quantums() >= 1);
    assert!(uthread::get_quantums(0) >= 1);

    assert_eq!(uthread::block(0), -1); // main cannot be blocked
    assert_eq!(uthread::sleep(3), -1); // main cannot sleep
    assert_eq!(uthread::sleep(0), -1);
    assert_eq!(uthread::terminate(-1), -1); // out of range
    assert_eq!(uthread::terminate(100), -1);
    assert_eq!(uthread::terminate(55), -1); // absent
    assert_eq!(uthread::block(55), -1);
    assert_eq!(uthread::resume(55), -1);
    assert_eq!(uthread::get_quantums(55), -1);

    // None of the misuse touched the thread table.
    assert_eq!(uthread::threads().len(), 1);
}

fn spawn_limit_scenario() {
    // A long quantum keeps the whole scenario inside main's first slice.
    assert_eq!(uthread::init(500_000), 0);
    for expected in 1..uthread::MAX_THREADS as i32 {
        assert_eq!(uthread::spawn(busy), expected);
    }
    assert_eq!(uthread::spawn(busy), -1);
    assert_eq!(uthread::threads().len(), uthread::MAX_THREADS);
    assert_eq!(uthread::spawn(busy), -1);
}

#[test]
fn misuse_is_rejected_without_side_effects() {
    common::run_isolated(before_init_scenario);
    common::run_isolated(misuse_scenario);
    common::run_isolated(spawn_limit_scenario);
}
