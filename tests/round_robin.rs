/*
 * Round-robin accounting across three runnable threads.
 */

mod common;

extern "C" fn busy_a() {
    loop {
        std::hint::spin_loop();
    }
}

extern "C" fn busy_b() {
    loop {
        std::hint::spin_loop();
    }
}

fn scenario() {
    assert_eq!(uthread::init(10_000), 0);
    assert_eq!(uthread::spawn(busy_a), 1);
    assert_eq!(uthread::spawn(busy_b), 2);

    // Spin in main until at least 9 quanta have started. ITIMER_VIRTUAL
    // counts process CPU time, so the busy threads drive it forward.
    while uthread::get_total_quantums() < 9 {
        std::hint::spin_loop();
    }

    // FIFO rotation over three runnable threads: each got at least
    // floor(9 / 3) - 1 quanta by now, and counts only grow.
    for tid in 0..=2 {
        let count = uthread::get_quantums(tid);
        assert!(count >= 2, "thread {tid} ran only {count} quanta");
    }

    // Per-thread counts never outrun the global counter.
    let snapshot = uthread::threads();
    assert_eq!(snapshot.len(), 3);
    let counted: u64 = snapshot.iter().map(|t| t.quantum_count).sum();
    assert!(counted <= uthread::get_total_quantums() as u64);

    assert_eq!(uthread::terminate(1), 0);
    assert_eq!(uthread::terminate(2), 0);
    assert_eq!(uthread::threads().len(), 1);
}

#[test]
fn quanta_are_shared_round_robin() {
    common::run_isolated(scenario);
}
