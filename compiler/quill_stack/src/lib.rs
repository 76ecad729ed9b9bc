//! Native stack growth for recursion over nested programs.
//!
//! The parser, the slot compiler and the interpreter all recurse once per
//! level of expression nesting. Each wraps its recursive entry point in
//! [`ensure_sufficient_stack`], so nesting depth is bounded by memory rather
//! than by the native stack of whichever thread happens to run it.

/// Grow when less than this is left.
const RED_ZONE: usize = 128 * 1024;

/// Size of each new stack segment.
const SEGMENT: usize = 2 * 1024 * 1024;

/// Run `f`, first moving to a fresh stack segment if the current one is
/// nearly exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}

#[cfg(test)]
mod tests {
    use super::ensure_sufficient_stack;

    fn depth(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { depth(n - 1) + 1 })
    }

    #[test]
    fn recursion_outgrows_the_thread_stack() {
        // Far past the 2 MiB stack of a test thread.
        assert_eq!(depth(200_000), 200_000);
    }

    #[test]
    fn passes_the_result_through() {
        assert_eq!(ensure_sufficient_stack(|| "done"), "done");
    }
}
