/*
 * Fork-Isolated Scenario Harness
 *
 * init() arms a process-global interval timer and terminate(0) exits the
 * process, so every end-to-end scenario runs in a forked child. The parent
 * only forks and waits; the child runs the scenario and leaves with status
 * 0 on success. A failed assertion inside the child surfaces as a non-zero
 * exit status.
 */

#![allow(dead_code)]

/// Run `scenario` in a forked child and return its exit status.
pub fn exit_status_of(scenario: fn()) -> i32 {
    unsafe {
        match libc::fork() {
            -1 => panic!("fork failed"),
            0 => {
                let _ = env_logger::builder().is_test(true).try_init();
                scenario();
                libc::_exit(0);
            }
            child => {
                let mut status = 0;
                if libc::waitpid(child, &mut status, 0) != child {
                    panic!("waitpid failed");
                }
                if libc::WIFEXITED(status) {
                    libc::WEXITSTATUS(status)
                } else {
                    -1
                }
            }
        }
    }
}

/// Run `scenario` in a forked child and require a clean exit.
pub fn run_isolated(scenario: fn()) {
    assert_eq!(exit_status_of(scenario), 0, "scenario child failed");
}
