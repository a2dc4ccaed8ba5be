//! Lyre runtime support library.
//!
//! The runtime side of the managed heap: the concrete object header and
//! field-value encodings, the process-wide collector instance, and the
//! C-style ABI the Lyre compiler emits calls against.
//!
//! The collection engine itself lives in the `lyre_gc` crate and is
//! independent of the encodings defined here.

pub mod common;
pub mod runtime;
