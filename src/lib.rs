//! Growable, binary-safe byte strings with an embedded small-string
//! optimisation.
//!
//! The one type here is [`ByteString`]: an owned, mutable byte buffer that
//! keeps short content inside the value itself and moves to an aligned heap
//! allocation only once it outgrows that, together with the usual
//! manipulation primitives (append, trim, ASCII case conversion, search,
//! substring, split/join, replace). All of them behave identically whichever
//! store is active.

mod error;
mod repr;
mod scan;
mod string;

pub use error::ReserveError;
pub use string::ByteString;
