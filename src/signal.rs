/*
 * Preemption-Signal Masking
 *
 * Every read or write of scheduler state happens inside a critical section
 * that blocks SIGVTALRM, the signal the virtual timer delivers. This is the
 * library's only synchronization mechanism: there is exactly one kernel
 * thread, so the sole source of interference is the preemption handler, and
 * the handler cannot run while its signal is blocked.
 *
 * The discipline, enforced by the scheduler module:
 * - API entry points block the signal on entry and unblock on return.
 * - A path that ends by RESUMing another thread drops its guard (releasing
 *   the mask) immediately before the transfer, so the resumed thread runs
 *   with preemption enabled.
 * - The handler itself runs with the signal blocked by the kernel.
 */

use crate::error::{Error, Result};

/// The signal driving preemption.
pub const PREEMPT_SIGNAL: libc::c_int = libc::SIGVTALRM;

/// Signal set containing only the preemption signal.
pub fn preempt_set() -> libc::sigset_t {
    unsafe {
        let mut set: libc::sigset_t = std::mem::zeroed();
        libc::sigemptyset(&mut set);
        libc::sigaddset(&mut set, PREEMPT_SIGNAL);
        set
    }
}

/// Block the preemption signal for the calling thread.
pub fn block() -> Result<()> {
    mask(libc::SIG_BLOCK)
}

/// Unblock the preemption signal. Also the release step immediately before
/// a context transfer.
pub fn unblock() -> Result<()> {
    mask(libc::SIG_UNBLOCK)
}

fn mask(how: libc::c_int) -> Result<()> {
    let set = preempt_set();
    let rc = unsafe { libc::sigprocmask(how, &set, std::ptr::null_mut()) };
    if rc != 0 {
        return Err(Error::system("sigprocmask"));
    }
    Ok(())
}

/// RAII critical section over the preemption signal.
///
/// The signal is blocked when the guard is created and unblocked when it is
/// dropped, so early error returns cannot leave preemption wedged. Paths
/// that end in a RESUME drop the guard explicitly before the transfer.
pub struct MaskGuard {
    _not_send: std::marker::PhantomData<*const ()>,
}

impl MaskGuard {
    pub fn enter() -> Result<Self> {
        block()?;
        Ok(MaskGuard { _not_send: std::marker::PhantomData })
    }
}

impl Drop for MaskGuard {
    fn drop(&mut self) {
        // sigprocmask with a fixed, valid how/set cannot fail; there is no
        // caller to report to from a drop in any case.
        let _ = unblock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SIG_BLOCK with an empty delta just reads the current mask.
    fn signal_is_blocked() -> bool {
        unsafe {
            let mut none: libc::sigset_t = std::mem::zeroed();
            let mut current: libc::sigset_t = std::mem::zeroed();
            libc::sigemptyset(&mut none);
            libc::sigprocmask(libc::SIG_BLOCK, &none, &mut current);
            libc::sigismember(&current, PREEMPT_SIGNAL) == 1
        }
    }

    #[test]
    fn guard_blocks_and_unblocks() {
        {
            let _guard = MaskGuard::enter().unwrap();
            assert!(signal_is_blocked());
        }
        assert!(!signal_is_blocked());
    }
}
