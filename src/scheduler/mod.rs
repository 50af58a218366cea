/*
 * Preemptive Round-Robin Scheduler
 *
 * This module implements the scheduler at the heart of the thread library.
 * Many logical threads are multiplexed onto the one kernel thread the
 * process owns; dispatch is round-robin, driven by the virtual-time
 * interval timer.
 *
 * SCHEDULING MODEL:
 * ================
 *
 * - The ready queue is the dispatch order. Its head is the Running thread;
 *   everything behind it is Ready, FIFO among peers.
 * - Every quantum expiry delivers SIGVTALRM. The handler advances the
 *   global quantum counter, wakes due sleepers, rotates the queue, and
 *   transfers control to the new head.
 * - block(), sleep(), and self-terminate are induced yields: they detach
 *   the running thread, re-arm the timer so the successor gets a fresh
 *   full quantum, and perform the same transfer.
 *
 * THREAD LIFECYCLE:
 * ================
 *
 * Ready -> Running (quantum expiry) -> Ready
 *   ^                                    |
 *   |                                    v
 *   +--- resume / wake-up --- Blocked <--+  (block / sleep)
 *
 * A thread can be Blocked for two independent reasons at once: an explicit
 * block() and an unexpired sleep(). It re-enters the queue only when
 * neither holds.
 *
 * CRITICAL SECTIONS:
 * =================
 *
 * Every access to the scheduler singleton happens with the preemption
 * signal masked; the spin lock around the storage is uncontended by
 * construction and exists as the access guard. Two rules keep the
 * discipline sound across context transfers:
 *
 * 1. The mask is always released immediately before a RESUME, so the
 *    incoming thread runs with preemption enabled.
 * 2. The lock is never held across a transfer: raw context pointers are
 *    extracted first, the guard is dropped, and only then does the
 *    save/restore pair run.
 *
 * The handler path allocates nothing: the queue and the sleeping set have
 * their full capacity reserved at init.
 */

pub mod thread;

pub use thread::{EntryPoint, Thread, ThreadState, Tid};

use std::collections::VecDeque;

use spin::Mutex;

use crate::arch;
use crate::error::{Error, Result};
use crate::signal;
use crate::timer;

/// Maximum number of live threads, the main thread included.
pub const MAX_THREADS: usize = 100;

/// Stack size of a spawned thread, in bytes.
pub const STACK_SIZE: usize = 4096;

const NOT_INITIALIZED: &str = "library is not initialized";

/// Global scheduler instance. Present from init() until main-terminate.
static SCHEDULER: Mutex<Option<Scheduler>> = Mutex::new(None);

/// A pending context transfer: save into `prev`, then resume from `next`.
///
/// Raw pointers into boxed thread records. They stay valid across the
/// switch because records are only removed by terminate, and nothing can
/// interleave: every scheduler mutation runs with the signal masked.
#[derive(Clone, Copy)]
struct Switch {
    prev: *mut arch::Context,
    next: *const arch::Context,
}

/// How the running thread leaves the CPU on an induced yield.
#[derive(Clone, Copy)]
enum Detach {
    /// block(): out until a paired resume().
    Block,
    /// sleep(): out until the global quantum counter reaches `wakeup`.
    Sleep { wakeup: u64 },
}

/// Read-only view of one live thread.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    pub tid: Tid,
    pub state: ThreadState,
    pub quantum_count: u64,
}

/// Scheduler state: the thread table, the dispatch queue, the sleeping
/// set, and the quantum accounting.
pub struct Scheduler {
    /// TID-indexed table of live threads. Boxed so saved contexts keep a
    /// stable address while queue membership changes around them.
    table: [Option<Box<Thread>>; MAX_THREADS],

    /// Dispatch order. The head is the Running thread.
    ready_queue: VecDeque<Tid>,

    /// Threads with wakeup_quantum > 0. A plain vector with capacity
    /// reserved up front; the preemption driver must never allocate.
    sleeping: Vec<Tid>,

    /// Configured quantum length, reused on every re-arm.
    quantum_usecs: i32,

    /// Global count of quantum starts since init.
    total_quantum: u64,

    /// A thread that terminated itself. Its stack was live during the
    /// switch away, so the record is dropped at the next API entry instead.
    graveyard: Option<Box<Thread>>,
}

impl Scheduler {
    fn new(quantum_usecs: i32) -> Self {
        let mut table: [Option<Box<Thread>>; MAX_THREADS] = std::array::from_fn(|_| None);
        table[0] = Some(Box::new(Thread::main()));
        let mut ready_queue = VecDeque::with_capacity(MAX_THREADS);
        ready_queue.push_back(Tid(0));
        Self {
            table,
            ready_queue,
            sleeping: Vec::with_capacity(MAX_THREADS),
            quantum_usecs,
            total_quantum: 1,
            graveyard: None,
        }
    }

    /// The thread at the head of the ready queue. The queue holds at least
    /// the main thread for the whole lifetime of the library.
    fn running_tid(&self) -> Tid {
        self.ready_queue[0]
    }

    fn thread(&self, tid: Tid) -> Option<&Thread> {
        self.table[tid.0].as_deref()
    }

    fn thread_mut(&mut self, tid: Tid) -> Option<&mut Thread> {
        self.table[tid.0].as_deref_mut()
    }

    /// Validate a client-supplied id: in range and naming a live thread.
    fn checked_tid(&self, tid: i32) -> Result<Tid> {
        let index = usize::try_from(tid)
            .ok()
            .filter(|&i| i < MAX_THREADS)
            .ok_or(Error::Misuse("thread id out of range"))?;
        if self.table[index].is_none() {
            return Err(Error::Misuse("no thread with this id"));
        }
        Ok(Tid(index))
    }

    /// Admit a new thread: lowest free tid in [1, MAX_THREADS), Ready at
    /// the tail of the queue.
    fn admit(&mut self, entry: EntryPoint) -> Result<Tid> {
        let tid = (1..MAX_THREADS)
            .map(Tid)
            .find(|t| self.table[t.0].is_none())
            .ok_or(Error::Misuse("too many threads"))?;
        self.table[tid.0] = Some(Box::new(Thread::spawned(tid, entry)));
        self.ready_queue.push_back(tid);
        Ok(tid)
    }

    /// Wake every sleeper whose quantum has arrived.
    ///
    /// A woken thread re-enters the ready queue only if it is not also
    /// explicitly blocked; otherwise its sleep bookkeeping is cleared and
    /// it stays Blocked until a paired resume().
    fn run_wakeups(&mut self) {
        let now = self.total_quantum;
        let mut i = 0;
        while i < self.sleeping.len() {
            let tid = self.sleeping[i];
            let due = self.thread(tid).is_some_and(|t| t.wakeup_quantum == now);
            if !due {
                i += 1;
                continue;
            }
            self.sleeping.swap_remove(i);
            if let Some(t) = self.thread_mut(tid) {
                t.wakeup_quantum = 0;
                if !t.explicitly_blocked {
                    t.state = ThreadState::Ready;
                    self.ready_queue.push_back(tid);
                }
            }
        }
    }

    /// One quantum expiry. Returns the transfer to perform, or None when
    /// the current thread simply continues into the new quantum.
    fn rotate(&mut self) -> Option<Switch> {
        if self.ready_queue.len() <= 1 {
            self.total_quantum += 1;
            // Sole runnable thread: the new quantum belongs to it as well.
            if let Some(&tid) = self.ready_queue.front() {
                if let Some(t) = self.thread_mut(tid) {
                    t.quantum_count += 1;
                }
            }
            self.run_wakeups();
            return None;
        }

        self.total_quantum += 1;
        self.run_wakeups();

        let prev = self.ready_queue.pop_front()?;
        if let Some(t) = self.thread_mut(prev) {
            t.state = ThreadState::Ready;
        }
        self.ready_queue.push_back(prev);

        let next = *self.ready_queue.front()?;
        if let Some(t) = self.thread_mut(next) {
            t.state = ThreadState::Running;
            t.quantum_count += 1;
        }

        let prev_ctx = self
            .thread_mut(prev)
            .map(|t| &mut t.context as *mut arch::Context)?;
        let next_ctx = self
            .thread(next)
            .map(|t| &t.context as *const arch::Context)?;
        Some(Switch { prev: prev_ctx, next: next_ctx })
    }

    /// Detach the running thread for an induced yield and promote the next
    /// one. The counter updates are finished by complete_yield() once the
    /// outgoing context has been saved.
    fn detach_running(&mut self, how: Detach) -> Switch {
        let prev = self
            .ready_queue
            .pop_front()
            .expect("ready queue holds the running thread");
        if let Some(t) = self.thread_mut(prev) {
            t.state = ThreadState::Blocked;
            match how {
                Detach::Block => t.explicitly_blocked = true,
                Detach::Sleep { wakeup } => t.wakeup_quantum = wakeup,
            }
        }
        if matches!(how, Detach::Sleep { .. }) {
            self.sleeping.push(prev);
        }

        let next = *self
            .ready_queue
            .front()
            .expect("the main thread is always schedulable");
        if let Some(t) = self.thread_mut(next) {
            t.state = ThreadState::Running;
        }

        let prev_ctx = self
            .thread_mut(prev)
            .map(|t| &mut t.context as *mut arch::Context)
            .expect("detached thread is live");
        let next_ctx = self
            .thread(next)
            .map(|t| &t.context as *const arch::Context)
            .expect("promoted thread is live");
        Switch { prev: prev_ctx, next: next_ctx }
    }

    /// Finish an induced yield: the successor's quantum starts now.
    fn complete_yield(&mut self) {
        self.total_quantum += 1;
        if let Some(&head) = self.ready_queue.front() {
            if let Some(t) = self.thread_mut(head) {
                t.quantum_count += 1;
            }
        }
        self.run_wakeups();
    }

    /// Self-termination: unlink the running thread, park its record in the
    /// graveyard, and promote the successor. Returns the successor's
    /// context.
    fn retire_running(&mut self) -> *const arch::Context {
        let prev = self
            .ready_queue
            .pop_front()
            .expect("ready queue holds the running thread");
        self.graveyard = self.table[prev.0].take();

        let next = *self
            .ready_queue
            .front()
            .expect("the main thread is always schedulable");
        let t = self.thread_mut(next).expect("promoted thread is live");
        t.state = ThreadState::Running;
        &t.context as *const arch::Context
    }

    /// Destroy a thread that is not currently running: unlink it from
    /// every container it appears in, then release the record and its
    /// stack.
    fn remove(&mut self, tid: Tid) {
        self.ready_queue.retain(|&t| t != tid);
        if let Some(pos) = self.sleeping.iter().position(|&t| t == tid) {
            self.sleeping.swap_remove(pos);
        }
        self.table[tid.0] = None;
    }

    /// Block a thread that is not currently running. Sleeping-set
    /// membership is untouched: a sleeping thread that gets blocked keeps
    /// its wake-up bookkeeping and simply stays Blocked when it fires.
    fn block_waiting(&mut self, tid: Tid) {
        if let Some(t) = self.thread_mut(tid) {
            t.state = ThreadState::Blocked;
            t.explicitly_blocked = true;
        }
        self.ready_queue.retain(|&t| t != tid);
    }

    /// Clear an explicit block. A thread still mid-sleep stays Blocked
    /// until its wake-up quantum; otherwise it re-enters the queue at the
    /// tail. Never preempts the caller.
    fn resume_thread(&mut self, tid: Tid) {
        let Some(t) = self.thread_mut(tid) else { return };
        if !t.explicitly_blocked {
            return;
        }
        t.explicitly_blocked = false;
        if t.is_sleeping() {
            return;
        }
        t.state = ThreadState::Ready;
        self.ready_queue.push_back(tid);
    }

    /// Drop the record of a thread that terminated itself. Called at API
    /// entry, when execution is guaranteed to be off the dead stack.
    fn reap_graveyard(&mut self) {
        self.graveyard = None;
    }

    fn snapshot(&self) -> Vec<ThreadInfo> {
        self.table
            .iter()
            .flatten()
            .map(|t| ThreadInfo {
                tid: t.tid,
                state: t.state,
                quantum_count: t.quantum_count,
            })
            .collect()
    }
}

/// SIGVTALRM handler: the preemption driver.
///
/// Runs with the signal blocked for the duration of the delivery. Only
/// scheduler-state mutation happens here: no allocation, no logging, no
/// I/O.
pub(crate) extern "C" fn preempt_handler(_signal: libc::c_int) {
    let transfer = {
        let mut sched = SCHEDULER.lock();
        sched.as_mut().and_then(Scheduler::rotate)
    };
    let Some(transfer) = transfer else {
        return;
    };
    unsafe {
        if arch::save(transfer.prev) == 0 {
            // Release the mask before the transfer; the incoming thread
            // must run with preemption enabled. sigprocmask is
            // async-signal-safe and cannot fail on this fixed set.
            let _ = signal::unblock();
            arch::restore(transfer.next, arch::RESUME_TOKEN);
        }
    }
    // Token path: this thread has just been dispatched again. Returning
    // unwinds the signal frame frozen on our stack back into client code.
}

/// Rust-side entry for every spawned thread.
///
/// The start shim calls here on the fresh stack, with preemption enabled:
/// the dispatching thread released the mask before the transfer. Runs the
/// recorded client entry and terminates the thread when it returns, so
/// falling off the end of an entry function behaves like
/// terminate(get_tid()).
pub(crate) extern "C" fn thread_bootstrap() -> ! {
    let current = {
        // No caller to propagate to from here; the block/unblock pair on
        // this fixed set cannot fail.
        let _ = signal::block();
        let sched = SCHEDULER.lock();
        let current = sched.as_ref().map(|s| {
            let tid = s.running_tid();
            (tid.0 as i32, s.thread(tid).and_then(|t| t.entry))
        });
        drop(sched);
        let _ = signal::unblock();
        current
    };

    let Some((tid, entry)) = current else {
        // A spawned thread cannot be dispatched without a live scheduler.
        std::process::abort();
    };
    if let Some(entry) = entry {
        entry();
    }
    let _ = terminate(tid);
    // terminate(self) transfers away and never returns for a live spawned
    // thread; reaching this point means the record vanished underneath us.
    std::process::abort();
}

/// Create the scheduler, install the preemption handler, and arm the
/// interval timer. The caller becomes thread 0, already Running and
/// owning quantum 1.
pub(crate) fn init(quantum_usecs: i32) -> Result<()> {
    if quantum_usecs <= 0 {
        return Err(Error::Misuse("quantum length must be positive"));
    }
    let _guard = signal::MaskGuard::enter()?;
    {
        let mut sched = SCHEDULER.lock();
        if sched.is_some() {
            return Err(Error::Misuse("library is already initialized"));
        }
        *sched = Some(Scheduler::new(quantum_usecs));
    }
    timer::install(preempt_handler)?;
    timer::arm(quantum_usecs)?;
    log::info!("thread library initialized, quantum {quantum_usecs} us");
    Ok(())
}

/// Admit a new thread running `entry`; returns its tid.
pub(crate) fn spawn(entry: EntryPoint) -> Result<Tid> {
    let _guard = signal::MaskGuard::enter()?;
    let mut sched = SCHEDULER.lock();
    let s = sched.as_mut().ok_or(Error::Misuse(NOT_INITIALIZED))?;
    s.reap_graveyard();
    let tid = s.admit(entry)?;
    log::debug!("spawned thread {tid}");
    Ok(tid)
}

/// Destroy a thread. Terminating tid 0 shuts the library down and exits
/// the process; terminating the running thread transfers to its successor
/// and does not return.
pub(crate) fn terminate(tid: i32) -> Result<i32> {
    let guard = signal::MaskGuard::enter()?;

    let mut sched = SCHEDULER.lock();
    let s = sched.as_mut().ok_or(Error::Misuse(NOT_INITIALIZED))?;
    let tid = s.checked_tid(tid)?;

    if tid == Tid(0) {
        let from_main = s.running_tid() == Tid(0);
        drop(sched);
        return shutdown(from_main);
    }

    if tid == s.running_tid() {
        s.reap_graveyard();
        let quantum = s.quantum_usecs;
        let next = s.retire_running();
        drop(sched);

        timer::arm(quantum)?;
        if let Some(s) = SCHEDULER.lock().as_mut() {
            s.complete_yield();
        }
        log::debug!("terminated thread {tid}");
        drop(guard);
        // The dying record sits in the graveyard; its stack stays
        // allocated until the next API entry, because this thread executes
        // on it right up to the transfer below.
        unsafe { arch::restore(next, arch::RESUME_TOKEN) }
    }

    s.reap_graveyard();
    s.remove(tid);
    log::debug!("terminated thread {tid}");
    Ok(0)
}

/// Full shutdown on terminate(0): stop preemption, then exit with status
/// 0. Scheduler storage is dropped only when the caller is the main
/// thread; a spawned caller is still standing on a library-owned stack.
fn shutdown(from_main: bool) -> Result<i32> {
    timer::disarm()?;
    timer::uninstall()?;
    if from_main {
        *SCHEDULER.lock() = None;
    }
    log::info!("thread library shut down");
    std::process::exit(0);
}

/// Move a thread into the explicitly-blocked state. Blocking the running
/// thread yields; blocking an already-blocked thread is a no-op success.
pub(crate) fn block(tid: i32) -> Result<i32> {
    let guard = signal::MaskGuard::enter()?;

    let (transfer, quantum, tid) = {
        let mut sched = SCHEDULER.lock();
        let s = sched.as_mut().ok_or(Error::Misuse(NOT_INITIALIZED))?;
        let tid = s.checked_tid(tid)?;
        if tid == Tid(0) {
            return Err(Error::Misuse("the main thread cannot be blocked"));
        }
        if s.thread(tid).is_some_and(|t| t.explicitly_blocked) {
            return Ok(0);
        }
        s.reap_graveyard();
        if tid == s.running_tid() {
            (s.detach_running(Detach::Block), s.quantum_usecs, tid)
        } else {
            s.block_waiting(tid);
            log::debug!("blocked thread {tid}");
            return Ok(0);
        }
    };

    log::debug!("blocked thread {tid}");
    unsafe {
        if arch::save(transfer.prev) == 0 {
            timer::arm(quantum)?;
            if let Some(s) = SCHEDULER.lock().as_mut() {
                s.complete_yield();
            }
            drop(guard);
            arch::restore(transfer.next, arch::RESUME_TOKEN);
        }
    }
    // Control returns here once a later resume() has re-queued this thread
    // and the scheduler dispatched it again.
    Ok(0)
}

/// Clear a thread's explicit block; see Scheduler::resume_thread for the
/// sleeping interaction. Never preempts the caller.
pub(crate) fn resume(tid: i32) -> Result<i32> {
    let _guard = signal::MaskGuard::enter()?;
    let mut sched = SCHEDULER.lock();
    let s = sched.as_mut().ok_or(Error::Misuse(NOT_INITIALIZED))?;
    let tid = s.checked_tid(tid)?;
    s.reap_graveyard();
    s.resume_thread(tid);
    log::debug!("resumed thread {tid}");
    Ok(0)
}

/// Put the running thread to sleep for `num_quantums` quantum starts.
pub(crate) fn sleep(num_quantums: i32) -> Result<i32> {
    let guard = signal::MaskGuard::enter()?;

    let (transfer, quantum, tid) = {
        let mut sched = SCHEDULER.lock();
        let s = sched.as_mut().ok_or(Error::Misuse(NOT_INITIALIZED))?;
        if num_quantums <= 0 {
            return Err(Error::Misuse("sleep length must be positive"));
        }
        let tid = s.running_tid();
        if tid == Tid(0) {
            return Err(Error::Misuse("the main thread cannot sleep"));
        }
        s.reap_graveyard();
        // The quantum in which sleep() was called does not count: the
        // thread wakes once num_quantums further quanta have started.
        let wakeup = s.total_quantum + num_quantums as u64 + 1;
        (s.detach_running(Detach::Sleep { wakeup }), s.quantum_usecs, tid)
    };

    log::debug!("put thread {tid} to sleep for {num_quantums} quanta");
    unsafe {
        if arch::save(transfer.prev) == 0 {
            timer::arm(quantum)?;
            if let Some(s) = SCHEDULER.lock().as_mut() {
                s.complete_yield();
            }
            drop(guard);
            arch::restore(transfer.next, arch::RESUME_TOKEN);
        }
    }
    Ok(0)
}

/// Tid of the running thread.
pub(crate) fn current_tid() -> Result<i32> {
    let _guard = signal::MaskGuard::enter()?;
    let sched = SCHEDULER.lock();
    let s = sched.as_ref().ok_or(Error::Misuse(NOT_INITIALIZED))?;
    Ok(s.running_tid().0 as i32)
}

/// Global count of quantum starts since init.
pub(crate) fn total_quantums() -> Result<i32> {
    let _guard = signal::MaskGuard::enter()?;
    let sched = SCHEDULER.lock();
    let s = sched.as_ref().ok_or(Error::Misuse(NOT_INITIALIZED))?;
    Ok(s.total_quantum as i32)
}

/// Number of quanta a given thread has spent Running.
pub(crate) fn quantums(tid: i32) -> Result<i32> {
    let _guard = signal::MaskGuard::enter()?;
    let sched = SCHEDULER.lock();
    let s = sched.as_ref().ok_or(Error::Misuse(NOT_INITIALIZED))?;
    let tid = s.checked_tid(tid)?;
    Ok(s.thread(tid).map_or(0, |t| t.quantum_count) as i32)
}

/// Snapshot of every live thread, captured in one critical section.
///
/// Returns an empty list when the library is not initialized.
pub fn threads() -> Vec<ThreadInfo> {
    let Ok(_guard) = signal::MaskGuard::enter() else {
        return Vec::new();
    };
    let sched = SCHEDULER.lock();
    sched.as_ref().map_or_else(Vec::new, Scheduler::snapshot)
}
