use std::alloc::{self, Layout};
use std::ptr::{self, NonNull};

use crate::ReserveError;

/// How many content bytes fit without touching the heap.
///
/// One more byte than this is kept in the inline array so the trailing zero
/// sentinel always has a slot.
pub(crate) const INLINE_CAP: usize = 23;

const INLINE_BUF: usize = INLINE_CAP + 1;

// Heap buffers are sized and aligned to cache lines so the chunked scans in
// `scan` stay friendly to the hardware.
const ALIGN: usize = 64;

/// An exclusively owned, cache-line aligned heap allocation.
///
/// This is the raw-memory half of the heap representation: it knows how to
/// allocate, reallocate and free, but nothing about lengths or sentinels.
pub(crate) struct RawBuf {
    ptr: NonNull<u8>,
    // Allocated bytes, always a non-zero multiple of ALIGN.
    size: usize,
}

impl RawBuf {
    fn layout(size: usize) -> Result<Layout, ReserveError> {
        Layout::from_size_align(size, ALIGN).map_err(|_| ReserveError::CapacityOverflow)
    }

    /// Allocates a fresh buffer of `size` bytes. The memory is uninitialized.
    fn with_size(size: usize) -> Result<Self, ReserveError> {
        debug_assert!(size > 0 && size % ALIGN == 0);
        let layout = Self::layout(size)?;
        let ptr = unsafe { alloc::alloc(layout) };
        match NonNull::new(ptr) {
            Some(ptr) => Ok(Self { ptr, size }),
            None => Err(ReserveError::AllocFailed),
        }
    }

    /// Moves the content to an allocation of `new_size` bytes.
    ///
    /// Used both for growing and for shrinking. On failure the old buffer is
    /// still valid and untouched.
    fn resize(&mut self, new_size: usize) -> Result<(), ReserveError> {
        debug_assert!(new_size > 0 && new_size % ALIGN == 0);
        let old_layout = Self::layout(self.size)?;
        Self::layout(new_size)?;
        let ptr = unsafe { alloc::realloc(self.ptr.as_ptr(), old_layout, new_size) };
        match NonNull::new(ptr) {
            Some(ptr) => {
                self.ptr = ptr;
                self.size = new_size;
                Ok(())
            }
            None => Err(ReserveError::AllocFailed),
        }
    }

    #[inline]
    fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    #[inline]
    fn as_mut_ptr(&mut self) -> *mut u8 {
        self.ptr.as_ptr()
    }
}

impl Drop for RawBuf {
    fn drop(&mut self) {
        let layout = Self::layout(self.size).expect("Validated when allocating");
        unsafe { alloc::dealloc(self.ptr.as_ptr(), layout) };
    }
}

/// Rounds an allocation size up to the next ALIGN boundary.
fn round_up(size: usize) -> Result<usize, ReserveError> {
    size.checked_add(ALIGN - 1)
        .map(|s| s & !(ALIGN - 1))
        .ok_or(ReserveError::CapacityOverflow)
}

/// Picks the allocation size for a growth to at least `total` bytes.
///
/// Doubles from the current size, falling back to the exact requested size
/// when the doubling overflows, then rounds to the alignment boundary.
fn grow_target(current: usize, total: usize) -> Result<usize, ReserveError> {
    let mut target = current;
    while target < total {
        target = match target.checked_mul(2) {
            Some(doubled) => doubled,
            None => total,
        };
    }
    round_up(target)
}

/// The two backing stores a string can live in.
///
/// Exactly one is active at a time. The length is not stored here; the
/// [`ByteString`][crate::ByteString] owns it and passes it down, since every
/// transition has to move `len + 1` bytes (content plus sentinel) anyway.
pub(crate) enum Repr {
    Inline([u8; INLINE_BUF]),
    Heap(RawBuf),
}

impl Repr {
    /// How many content bytes fit before the next growth.
    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        match self {
            Repr::Inline(_) => INLINE_CAP,
            // One slot is reserved for the sentinel.
            Repr::Heap(buf) => buf.size - 1,
        }
    }

    /// The single place every read goes through, so the algorithms above
    /// never care which store is active.
    #[inline]
    pub(crate) fn as_ptr(&self) -> *const u8 {
        match self {
            Repr::Inline(bytes) => bytes.as_ptr(),
            Repr::Heap(buf) => buf.as_ptr(),
        }
    }

    #[inline]
    pub(crate) fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            Repr::Inline(bytes) => bytes.as_mut_ptr(),
            Repr::Heap(buf) => buf.as_mut_ptr(),
        }
    }

    #[inline]
    pub(crate) fn is_inline(&self) -> bool {
        matches!(self, Repr::Inline(_))
    }

    /// Makes room for `needed` content bytes (the sentinel slot comes on
    /// top of that), promoting to the heap or growing as required.
    ///
    /// `len` is how many live bytes have to survive a move between buffers.
    /// On failure nothing is changed, so the caller's bytes stay intact.
    pub(crate) fn ensure_capacity(&mut self, len: usize, needed: usize) -> Result<(), ReserveError> {
        if needed <= self.capacity() {
            return Ok(());
        }
        let total = needed.checked_add(1).ok_or(ReserveError::CapacityOverflow)?;
        match self {
            Repr::Inline(bytes) => {
                let size = grow_target(INLINE_BUF, total)?;
                let mut buf = RawBuf::with_size(size)?;
                unsafe {
                    // Content plus sentinel; the invariant guarantees both.
                    ptr::copy_nonoverlapping(bytes.as_ptr(), buf.as_mut_ptr(), len + 1);
                }
                *self = Repr::Heap(buf);
            }
            Repr::Heap(buf) => {
                let size = grow_target(buf.size, total)?;
                buf.resize(size)?;
            }
        }
        Ok(())
    }

    /// Copies the content back into inline storage if it fits, freeing the
    /// heap buffer.
    ///
    /// Only called after operations that confirmed a shrink (trim, in-place
    /// replace). Growth paths never call this, so a string hovering around
    /// the inline boundary doesn't oscillate between the stores.
    pub(crate) fn try_demote(&mut self, len: usize) {
        if len > INLINE_CAP {
            return;
        }
        let buf = match self {
            Repr::Heap(buf) => buf,
            Repr::Inline(_) => return,
        };
        let mut bytes = [0u8; INLINE_BUF];
        unsafe {
            ptr::copy_nonoverlapping(buf.as_ptr(), bytes.as_mut_ptr(), len + 1);
        }
        // Drops the RawBuf, releasing the heap block.
        *self = Repr::Inline(bytes);
    }

    /// Hands surplus memory back after a trim.
    ///
    /// Demotes when the content fits inline. Otherwise, a heap buffer more
    /// than twice oversized (for moderate lengths, where the realloc is
    /// cheap) is shrunk in place. A failed shrink is ignored; the old buffer
    /// still holds everything.
    pub(crate) fn shrink_after_trim(&mut self, len: usize) {
        if len <= INLINE_CAP {
            self.try_demote(len);
            return;
        }
        let buf = match self {
            Repr::Heap(buf) => buf,
            Repr::Inline(_) => return,
        };
        if len >= 1024 || buf.size <= len * 2 {
            return;
        }
        if let Ok(size) = round_up(len * 2) {
            let _ = buf.resize(size);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_up_alignment() {
        assert_eq!(round_up(0).unwrap(), 0);
        assert_eq!(round_up(1).unwrap(), 64);
        assert_eq!(round_up(64).unwrap(), 64);
        assert_eq!(round_up(65).unwrap(), 128);
        assert!(round_up(usize::MAX).is_err());
    }

    #[test]
    fn grow_doubles_then_rounds() {
        // 24 -> 48 covers 30, rounded to a full cache line.
        assert_eq!(grow_target(INLINE_BUF, 30).unwrap(), 64);
        assert_eq!(grow_target(64, 65).unwrap(), 128);
        assert_eq!(grow_target(64, 64).unwrap(), 64);
        // Doubling overflow falls back to the exact request.
        let huge = usize::MAX / 2 + 2;
        assert!(grow_target(usize::MAX / 2 + 1, huge).unwrap() >= huge);
        // A request the rounding itself can't represent is an overflow.
        assert_eq!(grow_target(64, usize::MAX), Err(ReserveError::CapacityOverflow));
    }

    #[test]
    fn promote_preserves_bytes() {
        let mut bytes = [0u8; INLINE_BUF];
        bytes[..5].copy_from_slice(b"hello");
        let mut repr = Repr::Inline(bytes);
        assert!(repr.is_inline());
        assert_eq!(repr.capacity(), INLINE_CAP);

        repr.ensure_capacity(5, 100).unwrap();
        assert!(!repr.is_inline());
        assert!(repr.capacity() >= 100);
        let view = unsafe { std::slice::from_raw_parts(repr.as_ptr(), 6) };
        assert_eq!(view, b"hello\0");
    }

    #[test]
    fn demote_preserves_bytes() {
        let mut bytes = [0u8; INLINE_BUF];
        bytes[..2].copy_from_slice(b"hi");
        let mut repr = Repr::Inline(bytes);
        repr.ensure_capacity(2, 50).unwrap();
        assert!(!repr.is_inline());

        repr.try_demote(2);
        assert!(repr.is_inline());
        let view = unsafe { std::slice::from_raw_parts(repr.as_ptr(), 3) };
        assert_eq!(view, b"hi\0");
    }

    #[test]
    fn demote_refuses_long_content() {
        let mut repr = Repr::Inline([0u8; INLINE_BUF]);
        repr.ensure_capacity(0, 100).unwrap();
        repr.try_demote(INLINE_CAP + 1);
        assert!(!repr.is_inline());
    }

    #[test]
    fn ensure_capacity_is_noop_when_roomy() {
        let mut repr = Repr::Inline([0u8; INLINE_BUF]);
        repr.ensure_capacity(0, INLINE_CAP).unwrap();
        assert!(repr.is_inline());
    }

    #[test]
    fn overflowing_request_fails_cleanly() {
        let mut repr = Repr::Inline([0u8; INLINE_BUF]);
        assert_eq!(
            repr.ensure_capacity(0, usize::MAX),
            Err(ReserveError::CapacityOverflow),
        );
        assert!(repr.is_inline());
    }

    #[test]
    fn shrink_after_trim_releases_surplus() {
        let mut repr = Repr::Inline([0u8; INLINE_BUF]);
        repr.ensure_capacity(0, 500).unwrap();
        let oversized = repr.capacity();
        assert!(oversized >= 500);

        // 100 content bytes in a 500+ byte buffer is worth a shrink.
        repr.shrink_after_trim(100);
        assert!(!repr.is_inline());
        assert!(repr.capacity() < oversized);
        assert!(repr.capacity() >= 100);
    }
}
