/*
 * uthread - User-Level Preemptive Threads
 *
 * A single-process runtime that multiplexes many logical threads of
 * execution onto one kernel thread. Dispatch is round-robin, driven by a
 * virtual-time interval timer: threads are preempted at quantum
 * boundaries, and may block, sleep, resume, and terminate through a small
 * synchronous API.
 *
 * Key features:
 * - Preemptive round-robin scheduling over ITIMER_VIRTUAL / SIGVTALRM
 * - Non-local context transfer between private per-thread stacks
 * - Sleep / explicit-block / resume lifecycle with per-thread quantum
 *   accounting
 * - Critical sections guarded by masking the preemption signal
 *
 * The caller of init() becomes thread 0 and keeps running on the process
 * stack; spawned threads each own a STACK_SIZE private stack. One kernel
 * thread only: there is no parallelism, and a context switch can happen
 * solely at a quantum boundary or inside block/sleep/terminate.
 */

mod api;
mod arch;
mod error;
mod scheduler;
mod signal;
mod timer;

pub use api::{
    block, get_quantums, get_tid, get_total_quantums, init, resume, sleep, spawn, terminate,
};
pub use error::Error;
pub use scheduler::{EntryPoint, MAX_THREADS, STACK_SIZE, ThreadInfo, ThreadState, Tid, threads};
