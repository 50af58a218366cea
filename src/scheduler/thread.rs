/*
 * Thread Records
 *
 * This module defines the Thread structure and related types for the
 * preemptive scheduler: the thread identifier, the lifecycle state, and the
 * per-thread record holding the saved context and the private stack.
 */

use std::fmt;

use crate::arch::{self, Context};
use super::STACK_SIZE;

/// Client-supplied entry function for a spawned thread.
pub type EntryPoint = extern "C" fn();

/// Thread identifier. Tid 0 is the main thread; spawned threads get the
/// lowest currently-unused value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tid(pub usize);

impl fmt::Display for Tid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Thread lifecycle state.
///
/// Exactly one thread is Running at any observable instant, and it sits at
/// the head of the ready queue. Blocked covers both explicit blocking and
/// sleeping; the `Thread` record distinguishes the two.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    Running,
    Ready,
    Blocked,
}

/// Per-thread record.
///
/// Records live in boxes inside the scheduler table so their saved contexts
/// keep a stable address while queue membership changes around them.
pub struct Thread {
    pub tid: Tid,
    pub state: ThreadState,

    /// Set by `block`, cleared by `resume`. Independent of sleeping: a
    /// thread can be both sleeping and explicitly blocked at once.
    pub explicitly_blocked: bool,

    /// Global quantum index at which this thread becomes eligible to wake.
    /// 0 means "not sleeping".
    pub wakeup_quantum: u64,

    /// Saved execution state, valid whenever the thread is not Running.
    pub context: Context,

    /// Private stack, exclusively owned. None for the main thread, which
    /// runs on the process's original stack.
    pub stack: Option<Box<[u8]>>,

    /// Number of quanta during which this thread has been Running.
    pub quantum_count: u64,

    /// Client entry function; None for the main thread.
    pub entry: Option<EntryPoint>,
}

impl Thread {
    /// The record for the initial execution context. It is Running from the
    /// moment the library initializes and owns its first quantum.
    pub fn main() -> Self {
        Self {
            tid: Tid(0),
            state: ThreadState::Running,
            explicitly_blocked: false,
            wakeup_quantum: 0,
            context: Context::default(),
            stack: None,
            quantum_count: 1,
            entry: None,
        }
    }

    /// A freshly spawned thread: Ready, with a private stack and a context
    /// built so that its first dispatch enters `entry`.
    pub fn spawned(tid: Tid, entry: EntryPoint) -> Self {
        let mut stack = vec![0u8; STACK_SIZE].into_boxed_slice();
        let mut context = Context::default();
        arch::prepare(&mut context, stack.as_mut_ptr(), STACK_SIZE);
        Self {
            tid,
            state: ThreadState::Ready,
            explicitly_blocked: false,
            wakeup_quantum: 0,
            context,
            stack: Some(stack),
            quantum_count: 0,
            entry: Some(entry),
        }
    }

    pub fn is_sleeping(&self) -> bool {
        self.wakeup_quantum > 0
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("tid", &self.tid)
            .field("state", &self.state)
            .field("explicitly_blocked", &self.explicitly_blocked)
            .field("wakeup_quantum", &self.wakeup_quantum)
            .field("quantum_count", &self.quantum_count)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn noop_entry() {}

    #[test]
    fn main_record_owns_its_first_quantum() {
        let main = Thread::main();
        assert_eq!(main.tid, Tid(0));
        assert_eq!(main.state, ThreadState::Running);
        assert_eq!(main.quantum_count, 1);
        assert!(main.stack.is_none());
        assert!(main.entry.is_none());
    }

    #[test]
    fn spawned_record_starts_ready_with_context_on_its_stack() {
        let t = Thread::spawned(Tid(3), noop_entry);
        assert_eq!(t.state, ThreadState::Ready);
        assert_eq!(t.quantum_count, 0);
        assert!(!t.is_sleeping());

        let stack = t.stack.as_ref().unwrap();
        assert_eq!(stack.len(), STACK_SIZE);
        let base = stack.as_ptr() as u64;
        assert!(t.context.rsp > base);
        assert!(t.context.rsp <= base + STACK_SIZE as u64);
    }
}
