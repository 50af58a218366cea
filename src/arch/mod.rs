/*
 * Architecture Dispatch
 *
 * The context-transfer primitive is inherently architecture-specific: it
 * writes and reads the machine's callee-saved register file, stack pointer,
 * and resume address directly. Only x86_64 is supported; other targets fail
 * at compile time rather than at the first context switch.
 */

cfg_if::cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        mod x86_64;
        pub use self::x86_64::{Context, RESUME_TOKEN, prepare, restore, save};
    } else {
        compile_error!("uthread only supports x86_64 targets");
    }
}
