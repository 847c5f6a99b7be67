//! Bulk byte scanning.
//!
//! The search and case-conversion loops work on fixed-width chunks with a
//! scalar pass for the tail. The chunked paths are plain safe code shaped so
//! the compiler can vectorize them; the test module keeps naive scalar
//! versions around and checks both produce identical results.

use std::convert::TryInto;
use std::mem;

const WORD: usize = mem::size_of::<usize>();
const CHUNK: usize = 16;

// Broadcast constants for the zero-byte trick below.
const LO: usize = usize::from_ne_bytes([0x01; WORD]);
const HI: usize = usize::from_ne_bytes([0x80; WORD]);

/// Whether `word` contains a zero byte.
///
/// The classic exact test: a byte borrows from the subtraction and keeps its
/// high bit clear only if it was zero.
#[inline]
fn has_zero_byte(word: usize) -> bool {
    word.wrapping_sub(LO) & !word & HI != 0
}

/// Position of the first occurrence of `byte` in `haystack`.
///
/// Word-at-a-time scan; the length-bounded slices keep this safe for content
/// with embedded zero bytes.
pub(crate) fn find_byte(haystack: &[u8], byte: u8) -> Option<usize> {
    let pattern = usize::from_ne_bytes([byte; WORD]);
    let mut offset = 0;
    let mut chunks = haystack.chunks_exact(WORD);
    for chunk in chunks.by_ref() {
        let word = usize::from_ne_bytes(chunk.try_into().expect("Exact chunk"));
        if has_zero_byte(word ^ pattern) {
            let inside = chunk
                .iter()
                .position(|&b| b == byte)
                .expect("The word test found it");
            return Some(offset + inside);
        }
        offset += WORD;
    }
    chunks
        .remainder()
        .iter()
        .position(|&b| b == byte)
        .map(|inside| offset + inside)
}

/// Position of the first occurrence of `needle` in `haystack`.
///
/// An empty needle matches at offset 0 by convention. Candidate positions
/// come from the word scan over the needle's first byte; each candidate is
/// verified with a direct comparison.
pub(crate) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    if needle.len() > haystack.len() {
        return None;
    }
    let first = needle[0];
    let last_start = haystack.len() - needle.len();
    let mut base = 0;
    while base <= last_start {
        match find_byte(&haystack[base..=last_start], first) {
            Some(inside) => {
                let at = base + inside;
                if &haystack[at..at + needle.len()] == needle {
                    return Some(at);
                }
                base = at + 1;
            }
            None => return None,
        }
    }
    None
}

/// In-place ASCII uppercasing; bytes outside `'a'..='z'` are untouched.
pub(crate) fn to_upper(data: &mut [u8]) {
    let mut chunks = data.chunks_exact_mut(CHUNK);
    for chunk in chunks.by_ref() {
        // Branchless on a fixed width, which vectorizes cleanly.
        for b in chunk.iter_mut() {
            *b ^= (b.is_ascii_lowercase() as u8) << 5;
        }
    }
    for b in chunks.into_remainder() {
        if b.is_ascii_lowercase() {
            *b ^= 0x20;
        }
    }
}

/// In-place ASCII lowercasing; bytes outside `'A'..='Z'` are untouched.
pub(crate) fn to_lower(data: &mut [u8]) {
    let mut chunks = data.chunks_exact_mut(CHUNK);
    for chunk in chunks.by_ref() {
        for b in chunk.iter_mut() {
            *b ^= (b.is_ascii_uppercase() as u8) << 5;
        }
    }
    for b in chunks.into_remainder() {
        if b.is_ascii_uppercase() {
            *b ^= 0x20;
        }
    }
}

/// The whitespace set trimmed off string ends: space, tab, newline, carriage
/// return, form feed and vertical tab.
#[inline]
pub(crate) fn is_ascii_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}
