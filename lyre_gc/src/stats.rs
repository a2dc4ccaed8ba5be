//! Allocation and collection counters.

use core::fmt;

/// Counters maintained by the heap.
///
/// Totals and the `reads`/`writes`/`read_barrier_moves` counters are
/// monotonic. The `current_*` pair resets at the start of each collection and
/// is re-accumulated as live objects are copied; the `max_resident_*` pair is
/// the running maximum of `current_*`.
#[derive(Clone, Copy, Debug)]
pub struct HeapStats {
    pub total_bytes: usize,
    pub total_objects: usize,
    pub current_bytes: usize,
    pub current_objects: usize,
    pub cycles: usize,
    pub max_resident_bytes: usize,
    pub max_resident_objects: usize,
    pub reads: usize,
    pub writes: usize,
    /// Read barrier invocations that actually relocated a field.
    pub read_barrier_moves: usize,
}

impl HeapStats {
    /// Reserved: the write barrier never moves anything in this collector.
    pub const WRITE_BARRIER_MOVES: usize = 0;

    pub const fn new() -> HeapStats {
        HeapStats {
            total_bytes: 0,
            total_objects: 0,
            current_bytes: 0,
            current_objects: 0,
            cycles: 0,
            max_resident_bytes: 0,
            max_resident_objects: 0,
            reads: 0,
            writes: 0,
            read_barrier_moves: 0,
        }
    }

    /// Account for a fresh allocation of `bytes`.
    pub(crate) fn record_alloc(&mut self, bytes: usize) {
        self.total_bytes += bytes;
        self.total_objects += 1;
        self.current_bytes += bytes;
        self.current_objects += 1;
        if self.current_bytes > self.max_resident_bytes {
            self.max_resident_bytes = self.current_bytes;
            self.max_resident_objects = self.current_objects;
        }
    }

    /// Account for a live object of `bytes` copied during a collection.
    pub(crate) fn record_copy(&mut self, bytes: usize) {
        self.current_bytes += bytes;
        self.current_objects += 1;
    }

    /// Reset per-cycle residency and bump the cycle count.
    pub(crate) fn begin_cycle(&mut self) {
        self.current_bytes = 0;
        self.current_objects = 0;
        self.cycles += 1;
    }

    /// Render every counter by name.
    pub fn dump(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        writeln!(
            out,
            "total allocated: {} bytes ({} objects)",
            self.total_bytes, self.total_objects
        )?;
        writeln!(out, "collection cycles: {}", self.cycles)?;
        writeln!(
            out,
            "peak residency: {} bytes ({} objects)",
            self.max_resident_bytes, self.max_resident_objects
        )?;
        writeln!(out, "field reads: {}, field writes: {}", self.reads, self.writes)?;
        writeln!(
            out,
            "barrier moves: {} on read, {} on write",
            self.read_barrier_moves,
            Self::WRITE_BARRIER_MOVES
        )
    }
}

impl Default for HeapStats {
    fn default() -> Self {
        Self::new()
    }
}
