//! Lyre Garbage Collector
//!
//! A two-space copying collector with Cheney-style forwarding, driven
//! incrementally by the allocator. Each `allocate` call either runs a full
//! collection (on space exhaustion) or advances the copy scan by a bounded
//! number of records, and a read barrier keeps the mutator from ever
//! observing a stale pointer into the previous epoch's space.
//!
//! This crate provides the core engine without depending on the runtime's
//! object encoding.
//!
//! Key types:
//! - `ObjRef`: an untyped view of a managed object (header word + field slots)
//! - `ObjectLayout`: runtime-supplied capability that decodes the field count
//! - `Heap`: the two-semispace heap with allocator, collector and barriers

#![no_std]
extern crate alloc;

mod heap;
mod object;
mod roots;
mod stats;

pub use heap::{AllocError, AllocResult, Heap, MAX_ALLOC_SIZE, RECORDS_TO_FORWARD};
pub use object::{size_for_fields, ObjRef, ObjectLayout, Word, HEADER_SIZE, OBJECT_ALIGN, WORD_SIZE};
pub use roots::RootError;
pub use stats::HeapStats;
