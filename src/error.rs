use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

/// An error returned when a string can't obtain the capacity it needs.
///
/// Growing is the only thing a [`ByteString`][crate::ByteString] does that can
/// fail. Every fallible operation reports failure through this type and leaves
/// the string byte-for-byte unchanged, so a caller that sees an `Err` can keep
/// using the value (or free memory elsewhere and retry).
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ReserveError {
    /// The allocator refused to hand out the requested block.
    AllocFailed,
    /// The capacity computation itself overflowed `usize`.
    ///
    /// This covers the doubling growth policy as well as the length
    /// pre-computation done by `join` and `replace`. Overflow is reported
    /// instead of wrapping; nothing is allocated.
    CapacityOverflow,
}

impl Display for ReserveError {
    fn fmt(&self, fmt: &mut Formatter) -> FmtResult {
        match self {
            ReserveError::AllocFailed => write!(fmt, "Allocation failed"),
            ReserveError::CapacityOverflow => write!(fmt, "Capacity overflow"),
        }
    }
}

impl Error for ReserveError {}
