/*
 * Virtual-Time Interval Timer
 *
 * Owns the SIGVTALRM disposition and the ITIMER_VIRTUAL interval timer for
 * the lifetime of the library. ITIMER_VIRTUAL counts process CPU time, so a
 * quantum is a slice of actual execution, not wall clock.
 *
 * arm() is called once by init and again on every induced yield (block,
 * sleep, self-terminate): the incoming thread always starts with a fresh,
 * full quantum. Timer-driven rotations never re-arm; the interval repeats
 * on its own.
 */

use crate::error::{Error, Result};
use crate::signal::PREEMPT_SIGNAL;

const MICROS_PER_SEC: i64 = 1_000_000;

/// Install `handler` as the SIGVTALRM disposition.
///
/// The kernel blocks the signal for the duration of each delivery, so the
/// handler never nests over itself. SA_RESTART keeps client system calls
/// from failing with EINTR at every quantum boundary.
pub fn install(handler: extern "C" fn(libc::c_int)) -> Result<()> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = handler as usize;
        sa.sa_flags = libc::SA_RESTART;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(PREEMPT_SIGNAL, &sa, std::ptr::null_mut()) != 0 {
            return Err(Error::system("sigaction"));
        }
    }
    Ok(())
}

/// Restore the default SIGVTALRM disposition.
pub fn uninstall() -> Result<()> {
    unsafe {
        let mut sa: libc::sigaction = std::mem::zeroed();
        sa.sa_sigaction = libc::SIG_DFL;
        libc::sigemptyset(&mut sa.sa_mask);
        if libc::sigaction(PREEMPT_SIGNAL, &sa, std::ptr::null_mut()) != 0 {
            return Err(Error::system("sigaction"));
        }
    }
    Ok(())
}

/// Arm (or re-arm) the interval timer: first expiry and period are both one
/// quantum. Re-arming discards whatever remained of the current quantum.
pub fn arm(quantum_usecs: i32) -> Result<()> {
    let quantum = i64::from(quantum_usecs);
    let slice = libc::timeval {
        tv_sec: quantum / MICROS_PER_SEC,
        tv_usec: quantum % MICROS_PER_SEC,
    };
    set_timer(libc::itimerval { it_interval: slice, it_value: slice })
}

/// Stop the timer. No further expiries are delivered once pending ones are
/// handled.
pub fn disarm() -> Result<()> {
    let zero = libc::timeval { tv_sec: 0, tv_usec: 0 };
    set_timer(libc::itimerval { it_interval: zero, it_value: zero })
}

fn set_timer(timer: libc::itimerval) -> Result<()> {
    let rc = unsafe { libc::setitimer(libc::ITIMER_VIRTUAL, &timer, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(Error::system("setitimer"));
    }
    Ok(())
}
