//! Stack safety for the recursive passes.
//!
//! The parser, resolver and interpreter all recurse once per level of source
//! nesting.  Each recursive entry point goes through
//! [`ensure_sufficient_stack`], which moves onto a fresh heap‑allocated
//! segment when the current one runs low, so deeply nested programs never
//! overflow the host stack.

/// Grow the stack when less than this remains.
const RED_ZONE: usize = 100 * 1024; // 100KB

/// Size of each additional stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024; // 1MB

/// Run `f`, first switching to a new stack segment if the current one is
/// nearly exhausted.
#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
