/*
 * Client API Surface
 *
 * The eight client-visible operations, in the library's numeric
 * convention:
 *
 * - Success returns 0 (or the requested value).
 * - Library misuse prints "thread library error: <message>" to standard
 *   error and returns -1; scheduler state is unchanged.
 * - A failed OS primitive prints "system error: <message>" and exits the
 *   process with status 1.
 *
 * The operations marked "may not return" in their docs transfer control to
 * another thread; the caller observes the return only when it is
 * dispatched again.
 */

use crate::error::Error;
use crate::scheduler::{self, EntryPoint};

/// Report an error per the diagnostic contract and convert it to the
/// numeric convention. Host failures do not return.
fn fail(err: Error) -> i32 {
    if err.is_fatal() {
        eprintln!("system error: {err}");
        std::process::exit(1);
    }
    eprintln!("thread library error: {err}");
    -1
}

fn report<T: Into<i32>>(result: crate::error::Result<T>) -> i32 {
    match result {
        Ok(value) => value.into(),
        Err(err) => fail(err),
    }
}

/// Initialize the library. The caller becomes thread 0, Running, with
/// `total_quantum` starting at 1; the interval timer is armed with
/// `quantum_usecs` of virtual time per quantum.
///
/// Fails if `quantum_usecs` is not positive or the library is already
/// initialized.
pub fn init(quantum_usecs: i32) -> i32 {
    match scheduler::init(quantum_usecs) {
        Ok(()) => 0,
        Err(err) => fail(err),
    }
}

/// Spawn a new thread running `entry`, Ready at the tail of the queue.
/// Returns the new tid (lowest free, >= 1).
///
/// Fails if no tid is free.
pub fn spawn(entry: EntryPoint) -> i32 {
    match scheduler::spawn(entry) {
        Ok(tid) => tid.0 as i32,
        Err(err) => fail(err),
    }
}

/// Terminate a thread and release its resources; its tid is immediately
/// reusable.
///
/// Terminating tid 0 exits the process with status 0. Terminating the
/// calling thread does not return: control transfers to the next thread.
///
/// Fails if `tid` is out of range or names no live thread.
pub fn terminate(tid: i32) -> i32 {
    report(scheduler::terminate(tid))
}

/// Move a thread into the explicitly-blocked state, until a paired
/// [`resume`]. Blocking the calling thread yields immediately; blocking an
/// already-blocked thread is a no-op success.
///
/// Fails if `tid` is out of range, names no live thread, or is 0.
pub fn block(tid: i32) -> i32 {
    report(scheduler::block(tid))
}

/// Clear a thread's explicit block. A thread still mid-sleep stays
/// blocked until its wake-up quantum. Resuming a thread that is not
/// explicitly blocked is a no-op success. Never preempts the caller.
///
/// Fails if `tid` is out of range or names no live thread.
pub fn resume(tid: i32) -> i32 {
    report(scheduler::resume(tid))
}

/// Put the calling thread to sleep until `num_quantums` further quanta
/// have started; the current quantum does not count. Yields immediately.
///
/// Fails if `num_quantums` is not positive or the caller is the main
/// thread.
pub fn sleep(num_quantums: i32) -> i32 {
    report(scheduler::sleep(num_quantums))
}

/// Tid of the calling (Running) thread.
pub fn get_tid() -> i32 {
    report(scheduler::current_tid())
}

/// Global count of quantum starts since [`init`].
pub fn get_total_quantums() -> i32 {
    report(scheduler::total_quantums())
}

/// Number of quanta during which the given thread has been Running. The
/// running thread's current quantum is included.
///
/// Fails if `tid` is out of range or names no live thread.
pub fn get_quantums(tid: i32) -> i32 {
    report(scheduler::quantums(tid))
}
