use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::ptr;
use std::slice;

use crate::repr::{Repr, INLINE_CAP};
use crate::scan;
use crate::ReserveError;

/// A growable, mutable, binary-safe byte string.
///
/// Short content (up to [`INLINE_CAPACITY`][Self::INLINE_CAPACITY] bytes)
/// lives directly inside the value; longer content is promoted to an
/// exclusively owned, cache-line aligned heap buffer that grows by doubling.
/// Operations that shrink the content (trim, in-place replace) move it back
/// inline when it fits again. Which store is active never changes what any
/// operation observes.
///
/// The content is a plain byte sequence: embedded zero bytes are fine, all
/// scans are length-bounded. A zero sentinel is still kept one past the
/// length at all times, so [`as_bytes_with_nul`][Self::as_bytes_with_nul]
/// can hand the buffer to null-terminated consumers without a copy.
///
/// Everything that may allocate returns a `Result`; on an `Err` the string
/// is left exactly as it was.
///
/// ```
/// use taut::ByteString;
///
/// let mut greeting = ByteString::from_bytes(b"Hello").unwrap();
/// greeting.append(b", World!").unwrap();
/// assert_eq!(greeting, b"Hello, World!"[..]);
/// assert_eq!(greeting.find(b"World"), Some(7));
/// ```
pub struct ByteString {
    len: usize,
    repr: Repr,
}

impl ByteString {
    /// How many bytes fit without a heap allocation.
    pub const INLINE_CAPACITY: usize = INLINE_CAP;

    /// Creates an empty string, inline, no allocation.
    #[inline]
    pub const fn new() -> Self {
        Self {
            len: 0,
            repr: Repr::Inline([0; INLINE_CAP + 1]),
        }
    }

    /// Creates a string holding a copy of `bytes`.
    ///
    /// Stays inline unless `bytes` exceeds the inline capacity.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ReserveError> {
        let mut new = Self::new();
        new.set(bytes)?;
        Ok(new)
    }

    /// Creates an empty string with room for at least `capacity` bytes.
    ///
    /// The result has capacity of at least the inline size even for tiny
    /// requests.
    pub fn with_capacity(capacity: usize) -> Result<Self, ReserveError> {
        let mut new = Self::new();
        new.repr.ensure_capacity(0, capacity)?;
        Ok(new)
    }

    /// Number of content bytes, sentinel excluded.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// How many bytes fit before the next reallocation.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.repr.capacity()
    }

    /// Whether the content currently lives inside the value itself.
    ///
    /// This is observable but not part of any operation's contract; it
    /// exists so callers (and the test suite) can check allocation behavior.
    #[inline]
    pub fn is_inline(&self) -> bool {
        self.repr.is_inline()
    }

    /// The content bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.repr.as_ptr(), self.len) }
    }

    /// The content bytes plus the trailing zero sentinel.
    ///
    /// The sentinel slot is always valid, so this never allocates.
    #[inline]
    pub fn as_bytes_with_nul(&self) -> &[u8] {
        unsafe { slice::from_raw_parts(self.repr.as_ptr(), self.len + 1) }
    }

    /// Mutable view of the content bytes.
    ///
    /// Length and sentinel are untouched by anything done through it.
    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        unsafe { slice::from_raw_parts_mut(self.repr.as_mut_ptr(), self.len) }
    }

    /// The byte at `index`, or `0` when `index` is out of range.
    #[inline]
    pub fn byte_at(&self, index: usize) -> u8 {
        self.as_bytes().get(index).copied().unwrap_or(0)
    }

    /// Overwrites the content with a copy of `bytes`.
    pub fn set(&mut self, bytes: &[u8]) -> Result<(), ReserveError> {
        self.repr.ensure_capacity(self.len, bytes.len())?;
        unsafe {
            let dst = self.repr.as_mut_ptr();
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            *dst.add(bytes.len()) = 0;
        }
        self.len = bytes.len();
        Ok(())
    }

    /// Appends `bytes` in place. Empty input is a no-op success.
    pub fn append(&mut self, bytes: &[u8]) -> Result<(), ReserveError> {
        if bytes.is_empty() {
            return Ok(());
        }
        let new_len = self
            .len
            .checked_add(bytes.len())
            .ok_or(ReserveError::CapacityOverflow)?;
        self.repr.ensure_capacity(self.len, new_len)?;
        unsafe {
            let dst = self.repr.as_mut_ptr().add(self.len);
            ptr::copy_nonoverlapping(bytes.as_ptr(), dst, bytes.len());
            *dst.add(bytes.len()) = 0;
        }
        self.len = new_len;
        Ok(())
    }

    /// Appends a single byte.
    #[inline]
    pub fn push(&mut self, byte: u8) -> Result<(), ReserveError> {
        self.append(&[byte])
    }

    /// Empties the string.
    ///
    /// Representation and capacity are kept so the buffer can be reused.
    pub fn clear(&mut self) {
        self.len = 0;
        unsafe {
            *self.repr.as_mut_ptr() = 0;
        }
    }

    /// Offset of the first occurrence of `needle`, if any.
    ///
    /// An empty needle matches at offset 0. The scan is length-bounded, so
    /// embedded zero bytes on either side are handled correctly.
    #[inline]
    pub fn find(&self, needle: &[u8]) -> Option<usize> {
        scan::find(self.as_bytes(), needle)
    }

    /// A new, independent string holding the clamped slice
    /// `[start, start + len)`.
    ///
    /// Both bounds are clamped to the content; an out-of-range `start`
    /// yields an empty string rather than an error.
    pub fn substr(&self, start: usize, len: usize) -> Result<ByteString, ReserveError> {
        let bytes = self.as_bytes();
        let start = start.min(bytes.len());
        let end = start.saturating_add(len).min(bytes.len());
        ByteString::from_bytes(&bytes[start..end])
    }

    /// Removes ASCII whitespace from both ends, in place.
    ///
    /// An all-whitespace string becomes empty. Afterwards the content is
    /// moved back inline when it fits, and a heavily oversized heap buffer
    /// is shrunk.
    pub fn trim(&mut self) {
        let bytes = self.as_bytes();
        let start = bytes
            .iter()
            .position(|&b| !scan::is_ascii_space(b))
            .unwrap_or(bytes.len());
        let end = bytes
            .iter()
            .rposition(|&b| !scan::is_ascii_space(b))
            .map_or(start, |last| last + 1);
        let new_len = end - start;
        let base = self.repr.as_mut_ptr();
        if start > 0 && new_len > 0 {
            unsafe {
                ptr::copy(base.add(start), base, new_len);
            }
        }
        self.len = new_len;
        unsafe {
            *base.add(new_len) = 0;
        }
        self.repr.shrink_after_trim(new_len);
    }

    /// Uppercases ASCII letters in place; everything else is untouched.
    pub fn make_uppercase(&mut self) {
        scan::to_upper(self.as_bytes_mut());
    }

    /// Lowercases ASCII letters in place; everything else is untouched.
    pub fn make_lowercase(&mut self) {
        scan::to_lower(self.as_bytes_mut());
    }

    /// Splits on non-overlapping occurrences of `delimiter`, left to right.
    ///
    /// Every part is a new, independent string. Empty fields are preserved
    /// (`"a,,b"` on `","` gives `["a", "", "b"]`). An empty source or an
    /// empty delimiter yields an empty vector.
    pub fn split(&self, delimiter: &[u8]) -> Result<Vec<ByteString>, ReserveError> {
        let mut parts = Vec::new();
        if self.is_empty() || delimiter.is_empty() {
            return Ok(parts);
        }
        let mut rest = self.as_bytes();
        loop {
            match scan::find(rest, delimiter) {
                Some(at) => {
                    parts.push(ByteString::from_bytes(&rest[..at])?);
                    rest = &rest[at + delimiter.len()..];
                }
                None => {
                    parts.push(ByteString::from_bytes(rest)?);
                    return Ok(parts);
                }
            }
        }
    }

    /// Concatenates the present parts, putting `delimiter` between
    /// consecutive ones only.
    ///
    /// `None` entries are skipped entirely: no text, no extra delimiter.
    /// The total length is pre-computed with checked arithmetic and the
    /// result is built in a single allocation.
    pub fn join(
        parts: &[Option<&ByteString>],
        delimiter: &[u8],
    ) -> Result<ByteString, ReserveError> {
        let mut total = 0usize;
        let mut present = 0usize;
        for part in parts.iter().flatten() {
            if present > 0 {
                total = total
                    .checked_add(delimiter.len())
                    .ok_or(ReserveError::CapacityOverflow)?;
            }
            total = total
                .checked_add(part.len())
                .ok_or(ReserveError::CapacityOverflow)?;
            present += 1;
        }
        let mut joined = ByteString::with_capacity(total)?;
        let mut first = true;
        for part in parts.iter().flatten() {
            if !first {
                joined.append(delimiter)?;
            }
            joined.append(part.as_bytes())?;
            first = false;
        }
        Ok(joined)
    }

    /// Replaces every non-overlapping occurrence of `old` with `new`,
    /// scanning left to right.
    ///
    /// An empty `old` is a no-op success. When the replacement is no longer
    /// than the match the rewrite happens in place in a single forward pass
    /// (and the string may move back inline if it shrinks enough); when it
    /// is longer, the exact final length is computed with checked
    /// arithmetic, the buffer grows once and the content is rewritten back
    /// to front. Both paths agree on every adjacent-match edge case.
    pub fn replace(&mut self, old: &[u8], new: &[u8]) -> Result<(), ReserveError> {
        if old.is_empty() || self.len == 0 {
            return Ok(());
        }
        if new.len() <= old.len() {
            self.replace_in_place(old, new);
            Ok(())
        } else {
            self.replace_grow(old, new)
        }
    }

    // Fast path: the replacement fits over the match, so the write cursor
    // never overtakes the read cursor and no second buffer is needed.
    fn replace_in_place(&mut self, old: &[u8], new: &[u8]) {
        debug_assert!(!old.is_empty() && new.len() <= old.len());
        let len = self.len;
        let mut read = 0;
        let mut write = 0;
        while read < len {
            let found = scan::find(&self.as_bytes()[read..], old).map(|at| read + at);
            let base = self.repr.as_mut_ptr();
            let stop = found.unwrap_or(len);
            let run = stop - read;
            if run > 0 && write != read {
                unsafe {
                    ptr::copy(base.add(read), base.add(write), run);
                }
            }
            write += run;
            read = stop;
            if found.is_none() {
                break;
            }
            unsafe {
                ptr::copy_nonoverlapping(new.as_ptr(), base.add(write), new.len());
            }
            write += new.len();
            read += old.len();
        }
        self.len = write;
        unsafe {
            *self.repr.as_mut_ptr().add(write) = 0;
        }
        if write < len {
            self.repr.try_demote(write);
        }
    }

    // Slow path: the content grows. Match positions are collected up front,
    // the buffer is grown once, and the rewrite runs back to front so no
    // byte is overwritten before it has been moved.
    fn replace_grow(&mut self, old: &[u8], new: &[u8]) -> Result<(), ReserveError> {
        debug_assert!(!old.is_empty() && new.len() > old.len());
        let mut matches = Vec::new();
        let mut at = 0;
        while let Some(found) = scan::find(&self.as_bytes()[at..], old) {
            matches.push(at + found);
            at += found + old.len();
        }
        if matches.is_empty() {
            return Ok(());
        }
        let delta = new.len() - old.len();
        let grown = matches
            .len()
            .checked_mul(delta)
            .ok_or(ReserveError::CapacityOverflow)?;
        let new_len = self
            .len
            .checked_add(grown)
            .ok_or(ReserveError::CapacityOverflow)?;
        self.repr.ensure_capacity(self.len, new_len)?;

        let mut src_end = self.len;
        let mut dst_end = new_len;
        unsafe {
            let base = self.repr.as_mut_ptr();
            *base.add(new_len) = 0;
            for &found in matches.iter().rev() {
                let tail = src_end - (found + old.len());
                dst_end -= tail;
                ptr::copy(base.add(found + old.len()), base.add(dst_end), tail);
                dst_end -= new.len();
                ptr::copy_nonoverlapping(new.as_ptr(), base.add(dst_end), new.len());
                src_end = found;
            }
        }
        // The untouched prefix lines up exactly with where it already is.
        debug_assert_eq!(dst_end, src_end);
        self.len = new_len;
        Ok(())
    }
}

impl Default for ByteString {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ByteString {
    fn clone(&self) -> Self {
        Self::from_bytes(self.as_bytes()).expect("Already had room for this content once")
    }
}

impl Deref for ByteString {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for ByteString {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl Borrow<[u8]> for ByteString {
    #[inline]
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq for ByteString {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        // Slice equality already short-circuits on length.
        self.as_bytes() == other.as_bytes()
    }
}

impl Eq for ByteString {}

impl PartialEq<[u8]> for ByteString {
    #[inline]
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<&[u8]> for ByteString {
    #[inline]
    fn eq(&self, other: &&[u8]) -> bool {
        self.as_bytes() == *other
    }
}

impl PartialEq<&str> for ByteString {
    #[inline]
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialOrd for ByteString {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ByteString {
    /// Lexicographic byte order; on an equal prefix the shorter one sorts
    /// first.
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl Hash for ByteString {
    #[inline]
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl Debug for ByteString {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "\"{}\"", self.as_bytes().escape_ascii())
    }
}

impl Display for ByteString {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        write!(fmt, "{}", self.as_bytes().escape_ascii())
    }
}

// The buffer is exclusively owned and nothing is shared or cached, so moving
// a string to another thread or reading it from several is fine. Mutation
// still needs the usual &mut exclusivity.
unsafe impl Send for ByteString {}
unsafe impl Sync for ByteString {}
