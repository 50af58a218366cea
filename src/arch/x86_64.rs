/*
 * x86_64 Context Transfer
 *
 * SAVE/RESUME pair for non-local control transfer between thread stacks.
 * Conceptually this is sigsetjmp/siglongjmp, except the jump buffer layout
 * is our own, so fresh contexts for spawned threads are built by writing
 * the stack-pointer and resume-address slots directly. No pointer-guard
 * transform is involved: the buffer is never interpreted by libc.
 *
 * CONTEXT BUFFER LAYOUT:
 * =====================
 *
 * Offsets are hard-coded in the naked bodies below and must match the
 * field order of `Context` exactly:
 *
 *   0x00 rbx    0x08 rbp    0x10 r12    0x18 r13
 *   0x20 r14    0x28 r15    0x30 rsp    0x38 rip
 *
 * Only the SysV callee-saved registers are recorded. The caller of save()
 * already assumes every caller-saved register dies across the call, so a
 * resumed thread only needs the callee-saved file, its stack pointer, and
 * the return address to continue as if save() had just returned.
 *
 * The signal mask is deliberately NOT part of the buffer. The scheduler's
 * discipline is that the resumer releases the preemption-signal mask
 * immediately before RESUME, so every resumed thread runs unblocked.
 */

use core::arch::naked_asm;

/// Token delivered to the resumed side of a save(). Every RESUME in the
/// scheduler passes this value; save() reports 0 only on the direct call.
pub const RESUME_TOKEN: u64 = 1;

/// Saved execution state sufficient to resume a thread.
///
/// `#[repr(C)]` pins the field order the naked bodies rely on.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct Context {
    pub rbx: u64,
    pub rbp: u64,
    pub r12: u64,
    pub r13: u64,
    pub r14: u64,
    pub r15: u64,
    pub rsp: u64,
    pub rip: u64,
}

/// Record the caller's execution state into `ctx`.
///
/// Returns 0 on the direct call. When another thread later RESUMEs this
/// buffer, control re-emerges from this very call returning the non-zero
/// token passed to [`restore`].
///
/// Every caller must treat the return as a potential re-entry point:
/// between the save and the resume, arbitrary other threads ran and
/// scheduler state may have changed. Read nothing cached from before the
/// save except values the transfer itself requires.
///
/// # Safety
/// `ctx` must be valid for writes and must stay at a stable address until
/// the context is either resumed or discarded.
#[unsafe(naked)]
pub unsafe extern "C" fn save(ctx: *mut Context) -> u64 {
    naked_asm!(
        "mov [rdi + 0x00], rbx",
        "mov [rdi + 0x08], rbp",
        "mov [rdi + 0x10], r12",
        "mov [rdi + 0x18], r13",
        "mov [rdi + 0x20], r14",
        "mov [rdi + 0x28], r15",
        // RSP as it will be once this call has returned, RIP = the return
        // address currently on top of the stack.
        "lea rax, [rsp + 8]",
        "mov [rdi + 0x30], rax",
        "mov rax, [rsp]",
        "mov [rdi + 0x38], rax",
        "xor eax, eax",
        "ret",
    )
}

/// Transfer control into the state recorded in `ctx`. Never returns.
///
/// `token` becomes the return value of the save() that built the buffer
/// and must be non-zero so the resumed caller can tell the two worlds
/// apart (see [`RESUME_TOKEN`]).
///
/// # Safety
/// `ctx` must hold either a state recorded by [`save`] whose stack is
/// still intact, or a fresh context built by [`prepare`]. The preemption
/// signal must already be unmasked: this function abandons the current
/// stack, so nothing downstream can release the mask on the caller's
/// behalf.
#[unsafe(naked)]
pub unsafe extern "C" fn restore(ctx: *const Context, token: u64) -> ! {
    naked_asm!(
        "mov rbx, [rdi + 0x00]",
        "mov rbp, [rdi + 0x08]",
        "mov r12, [rdi + 0x10]",
        "mov r13, [rdi + 0x18]",
        "mov r14, [rdi + 0x20]",
        "mov r15, [rdi + 0x28]",
        "mov rsp, [rdi + 0x30]",
        "mov rax, rsi",
        "jmp qword ptr [rdi + 0x38]",
    )
}

/// Populate `ctx` so that a RESUME enters `thread_start` with the stack
/// pointer at the aligned top of the thread's private stack.
///
/// The general-purpose slots stay zero: a fresh thread inherits nothing.
pub fn prepare(ctx: &mut Context, stack_base: *mut u8, stack_len: usize) {
    let start: unsafe extern "C" fn() -> ! = thread_start;
    let top = stack_base as u64 + stack_len as u64;
    ctx.rsp = top & !0xf;
    ctx.rip = start as u64;
}

/// First instruction every spawned thread executes.
///
/// A fresh context enters here with RSP parked at the raw stack top, which
/// is not a valid ABI frame. Establish the call alignment the SysV ABI
/// expects, then enter the Rust bootstrap, which runs the client entry
/// function and self-terminates when it returns. The bootstrap never comes
/// back; the trap instruction documents that.
#[unsafe(naked)]
unsafe extern "C" fn thread_start() -> ! {
    naked_asm!(
        "and rsp, -16",
        "call {bootstrap}",
        "ud2",
        bootstrap = sym crate::scheduler::thread_bootstrap,
    )
}
