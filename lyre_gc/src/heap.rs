//! The two-semispace heap.
//!
//! Layout of the active (from-) space during a cycle:
//!
//! ```text
//! from_space                                  from_space + region_size
//! |  copied objects  | free gap              |  fresh allocations  |
//! ^------------------^----------------------^---------------------^
//! scan ≤ ............ next                  limit
//! ```
//!
//! Copies of live objects grow upward from the bottom, fresh allocations grow
//! downward from the top, and the heap is exhausted when `next` meets
//! `limit`. Objects between `from_space` and `scan` have fully forwarded
//! fields; everything above `scan` may still hold pointers into the previous
//! epoch's space, which the read barrier and the incremental scan resolve
//! before the mutator can observe them.

use core::alloc::Layout;
use core::fmt;
use core::marker::PhantomData;

use log::{debug, trace};

use crate::object::{ObjRef, ObjectLayout, HEADER_SIZE, OBJECT_ALIGN, WORD_SIZE};
use crate::roots::{RootError, RootStack};
use crate::stats::HeapStats;

/// Default semispace size in bytes. `with_region_size` rounds any requested
/// size down to alignment granularity the same way.
pub const MAX_ALLOC_SIZE: usize = 1 << 20;

/// Number of copied records the incremental scan forwards per allocation.
pub const RECORDS_TO_FORWARD: usize = 16;

/// Result type for allocations.
pub type AllocResult<T> = Result<T, AllocError>;

/// The heap cannot satisfy the request, even after a full collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError;

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "out of heap memory")
    }
}

/// The two-semispace heap, generic over the runtime's header encoding.
pub struct Heap<L: ObjectLayout> {
    /// Backing storage of `2 * region_size` bytes; null until first use.
    storage: *mut u8,
    region_size: usize,
    from_space: *mut u8,
    to_space: *mut u8,
    /// Copied objects below this address have fully forwarded fields.
    scan: *mut u8,
    /// One past the last copied object.
    next: *mut u8,
    /// Lowest address claimed by a fresh allocation.
    limit: *mut u8,
    roots: RootStack,
    stats: HeapStats,
    _layout: PhantomData<L>,
}

impl<L: ObjectLayout> Heap<L> {
    /// Heap with the default region size. Storage is allocated lazily on the
    /// first public operation.
    pub const fn new() -> Heap<L> {
        Self::with_region_size(MAX_ALLOC_SIZE)
    }

    /// Heap whose semispaces are the largest multiple of the object alignment
    /// not exceeding `bytes`.
    pub const fn with_region_size(bytes: usize) -> Heap<L> {
        Heap {
            storage: core::ptr::null_mut(),
            region_size: bytes - bytes % OBJECT_ALIGN,
            from_space: core::ptr::null_mut(),
            to_space: core::ptr::null_mut(),
            scan: core::ptr::null_mut(),
            next: core::ptr::null_mut(),
            limit: core::ptr::null_mut(),
            roots: RootStack::new(),
            stats: HeapStats::new(),
            _layout: PhantomData,
        }
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        !self.storage.is_null()
    }

    /// Allocate the backing storage if that has not happened yet.
    pub fn initialize(&mut self) {
        if self.is_initialized() {
            return;
        }
        let layout = Self::storage_layout(self.region_size);
        let storage = unsafe { alloc::alloc::alloc(layout) };
        if storage.is_null() {
            alloc::alloc::handle_alloc_error(layout);
        }
        self.storage = storage;
        self.from_space = storage;
        self.to_space = unsafe { storage.add(self.region_size) };
        self.scan = self.from_space;
        self.next = self.from_space;
        self.limit = unsafe { self.from_space.add(self.region_size) };
    }

    fn storage_layout(region_size: usize) -> Layout {
        Layout::from_size_align(2 * region_size, OBJECT_ALIGN)
            .expect("semispace size overflows the address space")
    }

    #[inline]
    pub fn region_size(&self) -> usize {
        self.region_size
    }

    #[inline]
    pub fn stats(&self) -> &HeapStats {
        &self.stats
    }

    /// Bytes left in the free gap between `next` and `limit`.
    #[inline]
    pub fn free_bytes(&self) -> usize {
        self.limit as usize - self.next as usize
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Allocate `size` bytes of object memory and return an uninitialized
    /// object. The caller must write the header and every field before the
    /// next call that may collect.
    ///
    /// `size` is the full object size (header plus fields), must be
    /// alignment-granular, and must reserve at least one field slot so the
    /// forwarding sentinel always has somewhere to live.
    ///
    /// This is the only relocating operation: it may run a full collection or
    /// an incremental forwarding step, so any object pointer held across it
    /// must be anchored through a registered root.
    pub fn allocate(&mut self, size: usize) -> AllocResult<ObjRef> {
        self.initialize();
        debug_assert!(size % OBJECT_ALIGN == 0, "allocation size must be alignment-granular");
        debug_assert!(
            size >= HEADER_SIZE + WORD_SIZE,
            "objects must reserve at least one field slot"
        );

        if self.free_bytes() < size {
            self.collect();
        } else {
            self.incremental_forward();
        }
        if self.free_bytes() < size {
            return Err(AllocError);
        }

        self.stats.record_alloc(size);
        self.limit = unsafe { self.limit.sub(size) };
        Ok(ObjRef::from_raw(self.limit))
    }

    // ========================================================================
    // Collection
    // ========================================================================

    /// Run a full collection: flip the semispaces and re-forward every
    /// registered root.
    ///
    /// The scan queue is deliberately not drained here. Fields of copied
    /// objects are resolved lazily, by `incremental_forward` steps on later
    /// allocations or by the read barrier at the point of access.
    pub fn collect(&mut self) {
        self.initialize();
        self.stats.begin_cycle();

        core::mem::swap(&mut self.from_space, &mut self.to_space);
        self.scan = self.from_space;
        self.next = self.from_space;
        self.limit = unsafe { self.from_space.add(self.region_size) };

        for i in 0..self.roots.len() {
            let slot = self.roots.slot(i);
            unsafe {
                let forwarded = self.forward(slot.read());
                slot.write(forwarded);
            }
        }

        debug!(
            "cycle {}: {} roots, retained {} bytes ({} objects)",
            self.stats.cycles,
            self.roots.len(),
            self.stats.current_bytes,
            self.stats.current_objects
        );
    }

    /// Forward the fields of up to `RECORDS_TO_FORWARD` copied objects,
    /// advancing `scan` toward `next`.
    pub fn incremental_forward(&mut self) {
        let mut forwarded = 0;
        while self.scan < self.next && forwarded < RECORDS_TO_FORWARD {
            let object = ObjRef::from_raw(self.scan);
            unsafe {
                for i in 0..object.field_count::<L>() {
                    let resolved = self.forward(object.field(i));
                    object.write_field(i, resolved);
                }
                self.scan = self.scan.add(object.size_in_bytes::<L>());
            }
            forwarded += 1;
        }
        if forwarded > 0 {
            trace!(
                "scanned {} records, {} bytes still pending",
                forwarded,
                self.next as usize - self.scan as usize
            );
        }
    }

    /// Resolve `value` to its current address.
    ///
    /// Values outside the stale space (from-space addresses, tagged scalars,
    /// null) pass through unchanged. A stale-space object is copied on first
    /// encounter; afterwards its first field holds the forwarding pointer.
    fn forward(&mut self, value: ObjRef) -> ObjRef {
        if !self.in_to_space(value) {
            return value;
        }
        unsafe {
            let first = value.field(0);
            if self.in_from_space(first) {
                // Already copied: first field is the forwarding pointer.
                first
            } else {
                self.chase(value);
                value.field(0)
            }
        }
    }

    /// Copy `target` and then one transitive chain of not-yet-copied
    /// children, installing a forwarding pointer in each original's first
    /// field. Each iteration copies exactly one new object, so the loop
    /// terminates once the chain runs out of unreached children.
    ///
    /// # Safety
    /// `target` must point at a live object in to-space that has not been
    /// copied yet.
    unsafe fn chase(&mut self, target: ObjRef) {
        let mut target = target;
        loop {
            let size = target.size_in_bytes::<L>();
            let copy = ObjRef::from_raw(self.next);
            self.next = self.next.add(size);
            self.stats.record_copy(size);

            let mut pending = ObjRef::null();
            copy.write_header(target.header());
            for i in 0..target.field_count::<L>() {
                let child = target.field(i);
                copy.write_field(i, child);
                if self.in_to_space(child) && !self.in_from_space(child.field(0)) {
                    pending = child;
                }
            }

            // The copy is complete; only now may the original be repurposed
            // as a forwarding record.
            target.write_field(0, copy);

            if pending.is_null() {
                return;
            }
            target = pending;
        }
    }

    /// Whether `value` is an object address inside the given semispace.
    ///
    /// The alignment test rejects tagged scalars outright, so a low-bit
    /// tagged value can never be mistaken for an object even if its bit
    /// pattern lands inside the heap's address range.
    #[inline]
    fn in_space(&self, value: ObjRef, space: *mut u8) -> bool {
        let addr = value.addr();
        addr % OBJECT_ALIGN == 0 && addr >= space as usize && addr < space as usize + self.region_size
    }

    #[inline]
    fn in_from_space(&self, value: ObjRef) -> bool {
        self.in_space(value, self.from_space)
    }

    #[inline]
    fn in_to_space(&self, value: ObjRef) -> bool {
        self.in_space(value, self.to_space)
    }

    // ========================================================================
    // Barriers
    // ========================================================================

    /// Forward `object`'s field `index` in place. The mutator calls this
    /// before reading any field, then reads the slot.
    ///
    /// # Safety
    /// `object` must point at a live object with more than `index` field
    /// slots.
    pub unsafe fn read_barrier(&mut self, object: ObjRef, index: usize) {
        self.initialize();
        self.stats.reads += 1;
        let value = object.field(index);
        let resolved = self.forward(value);
        if resolved != value {
            self.stats.read_barrier_moves += 1;
        }
        object.write_field(index, resolved);
    }

    /// Record a field store. The store itself is performed by the mutator;
    /// this collector keeps no remembered set, so only the counter moves.
    pub fn write_barrier(&mut self) {
        self.initialize();
        self.stats.writes += 1;
    }

    // ========================================================================
    // Roots
    // ========================================================================

    /// Register `slot` as a root. Its contents are rewritten on every flip.
    pub fn push_root(&mut self, slot: *mut ObjRef) {
        self.initialize();
        self.roots.push(slot);
    }

    /// Deregister `slot`. It must be the most recently pushed root.
    pub fn pop_root(&mut self, slot: *mut ObjRef) -> Result<(), RootError> {
        self.initialize();
        self.roots.pop(slot)
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Render the allocation counters, each by name.
    pub fn dump_allocation_statistics(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        self.stats.dump(out)
    }

    /// Render the registered roots in push order.
    pub fn dump_roots(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        write!(out, "roots:")?;
        for slot in self.roots.iter() {
            let contents = unsafe { slot.read() };
            write!(out, " {:#x}", contents.addr())?;
        }
        writeln!(out)
    }

    /// Render the heap pointers and every object in both live regions.
    pub fn dump_state(&self, out: &mut dyn fmt::Write) -> fmt::Result {
        if !self.is_initialized() {
            return writeln!(out, "heap not yet initialized");
        }

        writeln!(
            out,
            "from-space: {} bytes at {:#x}",
            self.region_size, self.from_space as usize
        )?;

        let mut first = true;
        self.dump_region(out, self.from_space, self.next, &mut first)?;
        let region_end = unsafe { self.from_space.add(self.region_size) };
        self.dump_region(out, self.limit, region_end, &mut first)?;
        writeln!(out)?;

        writeln!(
            out,
            "to-space: {} bytes at {:#x}",
            self.region_size, self.to_space as usize
        )?;
        writeln!(
            out,
            "scan = {:#x}, next = {:#x}, limit = {:#x}",
            self.scan as usize, self.next as usize, self.limit as usize
        )?;
        self.dump_roots(out)?;
        writeln!(
            out,
            "current allocation: {} bytes ({} objects)",
            self.stats.current_bytes, self.stats.current_objects
        )?;
        writeln!(out, "available: {} bytes", self.free_bytes())
    }

    fn dump_region(
        &self,
        out: &mut dyn fmt::Write,
        start: *mut u8,
        end: *mut u8,
        first: &mut bool,
    ) -> fmt::Result {
        let mut cursor = start;
        while cursor < end {
            let object = ObjRef::from_raw(cursor);
            let (arity, size) =
                unsafe { (object.field_count::<L>(), object.size_in_bytes::<L>()) };
            if !*first {
                write!(out, ", ")?;
            }
            *first = false;
            write!(out, "object with {} fields at {:#x}", arity, cursor as usize)?;
            cursor = unsafe { cursor.add(size) };
        }
        Ok(())
    }

    // Raw frontier pointers, for invariant checks in tests.
    #[cfg(test)]
    pub(crate) fn frontier(&self) -> (usize, usize, usize, usize) {
        (
            self.from_space as usize,
            self.scan as usize,
            self.next as usize,
            self.limit as usize,
        )
    }
}

impl<L: ObjectLayout> Default for Heap<L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<L: ObjectLayout> Drop for Heap<L> {
    fn drop(&mut self) {
        if self.is_initialized() {
            unsafe { alloc::alloc::dealloc(self.storage, Self::storage_layout(self.region_size)) };
        }
    }
}
