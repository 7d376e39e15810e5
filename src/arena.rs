//! Bulk bump-allocation region.
//!
//! A single monotonic region backs every AST node, token, interned
//! string, scope and the identifier dictionary for one compilation
//! unit. There is no per-object free; the region is
//! reset or destroyed as a whole. `bumpalo` gives us the underlying
//! growth strategy; `Arena` adds named-region/used-counter/cap
//! bookkeeping and the `start_alloc`/`end_alloc` scratch-buffer
//! protocol for building strings of unknown length.

use bumpalo::Bump;
use std::cell::Cell;

/// Allocations are rounded up to this many bytes, matching the
/// underlying allocator's 4 KiB chunking.
const CHUNK: usize = 4096;

pub struct Arena {
    name: String,
    bump: Bump,
    /// Optional hard cap in bytes. `None` means "grow as needed" (the
    /// common case for the main compilation arena). Set to simulate
    /// a fixed-size region with abort-on-exhaustion behavior.
    max_bytes: Option<usize>,
    /// Tracks `used` only for `startAlloc`/`endAlloc`; `bumpalo`
    /// already reports total allocated bytes via `allocated_bytes()`.
    scratch_base: Cell<usize>,
}

impl Arena {
    pub fn new(name: impl Into<String>) -> Self {
        Arena {
            name: name.into(),
            bump: Bump::new(),
            max_bytes: None,
            scratch_base: Cell::new(0),
        }
    }

    /// Rounds `size` up to a 4 KiB multiple and caps the region at
    /// that size.
    pub fn with_capacity(name: impl Into<String>, size: usize) -> Self {
        let rounded = size.div_ceil(CHUNK) * CHUNK;
        Arena {
            name: name.into(),
            bump: Bump::with_capacity(rounded),
            max_bytes: Some(rounded),
            scratch_base: Cell::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Bytes consumed so far. Monotonically increases between `create`
    /// (or `new`) and `reset`.
    pub fn used(&self) -> usize {
        self.bump.allocated_bytes()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.max_bytes
    }

    fn check_capacity(&self, additional: usize) {
        if let Some(cap) = self.max_bytes {
            if self.used() + additional > cap {
                fatal_exhausted(&self.name, cap);
            }
        }
    }

    /// Allocates `value`, 8-byte aligned, and returns a stable
    /// reference into the region. Aborts with a diagnostic if the
    /// (optional) capacity would be exceeded — arena exhaustion is a
    /// fatal condition per /§7.
    pub fn alloc<T>(&self, value: T) -> &T {
        self.check_capacity(std::mem::size_of::<T>() + 8);
        self.bump.alloc(value)
    }

    pub fn alloc_slice<I, T>(&self, items: I) -> &[T]
    where
        I: IntoIterator,
        I::IntoIter: ExactSizeIterator<Item = T>,
        T: Sized,
    {
        let iter = items.into_iter();
        self.check_capacity(iter.len() * std::mem::size_of::<T>() + 8);
        self.bump.alloc_slice_fill_iter(iter)
    }

    pub fn alloc_str(&self, s: &str) -> &str {
        self.check_capacity(s.len() + 8);
        self.bump.alloc_str(s)
    }

    /// Reserves the remaining region as a growable scratch buffer. The
    /// caller writes up to `max_len` bytes into the returned slice and
    /// commits the real length with `end_alloc`. Used to build strings
    /// (e.g. mangled names) without a second pass.
    pub fn start_alloc(&self, max_len: usize) -> &mut [u8] {
        self.check_capacity(max_len);
        self.scratch_base.set(self.bump.allocated_bytes());
        self.bump.alloc_slice_fill_copy(max_len, 0u8)
    }

    /// Commits the actually-consumed prefix of the last `start_alloc`
    /// buffer. `bumpalo` already counted the whole reservation, so this
    /// only exists to preserve the two-call protocol;
    /// there's nothing to give back since the arena never frees.
    pub fn end_alloc(&self, _actual: usize) {}

    /// Resets the region: existing references are logically dead after
    /// this call (the type system can't express that for `&Arena`
    /// borrows already handed out, so callers must drop the arena
    /// itself rather than call this while references are alive).
    pub fn reset(&mut self) {
        self.bump.reset();
        self.scratch_base.set(0);
    }
}

#[cold]
fn fatal_exhausted(name: &str, cap: usize) -> ! {
    eprintln!("fatal: arena '{name}' exhausted (capacity {cap} bytes)");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_stable_reference() {
        let arena = Arena::new("test");
        let r1 = arena.alloc(42);
        let r2 = arena.alloc(100);
        assert_eq!(*r1, 42);
        assert_eq!(*r2, 100);
    }

    #[test]
    fn references_remain_valid_after_many_allocations() {
        let arena = Arena::new("test");
        let refs: Vec<&i32> = (0..10000).map(|i| arena.alloc(i)).collect();
        for (i, r) in refs.iter().enumerate() {
            assert_eq!(**r, i as i32);
        }
    }

    #[test]
    fn used_monotonically_increases() {
        let arena = Arena::new("test");
        let mut last = arena.used();
        for i in 0..100 {
            arena.alloc(i);
            let now = arena.used();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn reset_allows_reuse() {
        let mut arena = Arena::new("test");
        arena.alloc(1);
        arena.reset();
        assert_eq!(arena.used(), 0);
        let r = arena.alloc(99);
        assert_eq!(*r, 99);
    }

    #[test]
    fn alloc_slice_works() {
        let arena = Arena::new("test");
        let slice = arena.alloc_slice([1, 2, 3]);
        assert_eq!(slice, &[1, 2, 3]);
    }

    #[test]
    fn alloc_str_interns_bytes() {
        let arena = Arena::new("test");
        let s = arena.alloc_str("hello");
        assert_eq!(s, "hello");
    }

    #[test]
    fn with_capacity_rounds_up_to_4kib() {
        let arena = Arena::with_capacity("small", 10);
        assert_eq!(arena.capacity(), Some(4096));
    }

    #[test]
    fn start_alloc_end_alloc_round_trip() {
        let arena = Arena::new("scratch");
        let buf = arena.start_alloc(16);
        buf[..5].copy_from_slice(b"hello");
        arena.end_alloc(5);
        assert_eq!(&buf[..5], b"hello");
    }
}
