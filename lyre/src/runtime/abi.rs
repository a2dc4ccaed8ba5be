//! C-style exports consumed by compiled Lyre programs.
//!
//! The compiler emits calls against these symbols; each one lazily
//! initializes the process-wide collector and delegates. Pointer-taking
//! entry points are unsafe for the usual reason: the caller must pass
//! addresses of live objects and registered slots.
//!
//! Failures that cannot travel through a C signature (out of memory, root
//! stack misuse) print a diagnostic and abort the process.

use core::ffi::{c_int, c_void};
use core::fmt;

use lyre_gc::ObjRef;

use super::heap::{with_collector, LyreHeap};

fn fatal(message: fmt::Arguments<'_>) -> ! {
    eprintln!("lyre: {message}");
    std::process::abort();
}

/// Allocate `size_in_bytes` of object memory. The caller must initialize the
/// header and every field before the next allocation.
#[no_mangle]
pub unsafe extern "C" fn gc_alloc(size_in_bytes: usize) -> *mut c_void {
    with_collector(|collector| match collector.heap.allocate(size_in_bytes) {
        Ok(object) => object.as_raw() as *mut c_void,
        Err(error) => fatal(format_args!("gc_alloc({size_in_bytes}): {error}")),
    })
}

/// Forward `object`'s field in place; the caller reads the field after.
#[no_mangle]
pub unsafe extern "C" fn gc_read_barrier(object: *mut c_void, field_index: c_int) {
    debug_assert!(field_index >= 0);
    with_collector(|collector| {
        collector
            .heap
            .read_barrier(ObjRef::from_raw(object as *mut u8), field_index as usize)
    })
}

/// Record a field store. The store itself is performed by the caller; the
/// extra arguments keep the ABI stable for collectors that need them.
#[no_mangle]
pub unsafe extern "C" fn gc_write_barrier(object: *mut c_void, field_index: c_int, contents: *mut c_void) {
    let _ = (object, field_index, contents);
    with_collector(|collector| collector.heap.write_barrier());
}

/// Register `slot` (the address of a pointer variable) as a root.
#[no_mangle]
pub unsafe extern "C" fn gc_push_root(slot: *mut *mut c_void) {
    with_collector(|collector| collector.heap.push_root(slot as *mut ObjRef));
}

/// Deregister `slot`. It must be the most recently registered root.
#[no_mangle]
pub unsafe extern "C" fn gc_pop_root(slot: *mut *mut c_void) {
    with_collector(|collector| {
        if let Err(error) = collector.heap.pop_root(slot as *mut ObjRef) {
            fatal(format_args!("gc_pop_root({slot:p}): {error}"));
        }
    })
}

#[no_mangle]
pub extern "C" fn print_gc_alloc_stats() {
    print_dump(|heap, out| heap.dump_allocation_statistics(out));
}

#[no_mangle]
pub extern "C" fn print_gc_state() {
    print_dump(|heap, out| heap.dump_state(out));
}

#[no_mangle]
pub extern "C" fn print_gc_roots() {
    print_dump(|heap, out| heap.dump_roots(out));
}

fn print_dump(f: impl FnOnce(&LyreHeap, &mut dyn fmt::Write) -> fmt::Result) {
    with_collector(|collector| {
        collector.heap.initialize();
        let mut text = String::new();
        let _ = f(&collector.heap, &mut text);
        match collector.options.dump_buffer() {
            Some(mut buffer) => buffer.push_str(&text),
            None => print!("{text}"),
        }
    });
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use crate::common::options::OptionsBuilder;
    use crate::runtime::header::{ObjectHeader, ObjectTag};
    use crate::runtime::heap::{configure, with_collector};
    use crate::runtime::value::Value;

    use super::*;

    unsafe fn push_node(head_slot: *mut *mut c_void, value: isize) {
        let header = ObjectHeader::new(ObjectTag::Cons, 2);
        // May collect; `head_slot` must already be registered.
        let node = ObjRef::from_raw(gc_alloc(header.size_in_bytes()) as *mut u8);
        node.write_header(header.raw());
        node.write_field(0, Value::from_int(value).as_slot());
        node.write_field(1, ObjRef::from_raw(*head_slot as *mut u8));
        gc_write_barrier(node.as_raw() as *mut c_void, 1, *head_slot);
        *head_slot = node.as_raw() as *mut c_void;
    }

    unsafe fn sum_list(head: *mut c_void) -> isize {
        let mut total = 0;
        let mut node = ObjRef::from_raw(head as *mut u8);
        while !node.is_null() {
            gc_read_barrier(node.as_raw() as *mut c_void, 0);
            total += Value::from_slot(node.field(0)).as_int();
            gc_read_barrier(node.as_raw() as *mut c_void, 1);
            node = node.field(1);
        }
        total
    }

    /// The collector behind the ABI is process-wide, so the whole lifecycle
    /// is exercised by this single test.
    #[test]
    fn test_abi_round_trip() {
        let options = OptionsBuilder::new()
            .region_size(256)
            .dump_buffer(Some(Mutex::new(String::new())))
            .build();
        assert!(configure(options), "collector already initialized");

        unsafe {
            let mut head: *mut c_void = core::ptr::null_mut();
            gc_push_root(&mut head);

            for value in [1, 2, 3] {
                push_node(&mut head, value);
            }

            // Churn until well past a flip; the rooted list must survive.
            let mut garbage: *mut c_void = core::ptr::null_mut();
            gc_push_root(&mut garbage);
            for value in 0..20 {
                garbage = core::ptr::null_mut();
                push_node(&mut garbage, value);
            }
            gc_pop_root(&mut garbage);

            assert!(with_collector(|c| c.heap.stats().cycles) >= 1);
            assert_eq!(sum_list(head), 6);

            gc_pop_root(&mut head);
        }

        print_gc_alloc_stats();
        print_gc_state();
        print_gc_roots();

        let dumped = with_collector(|collector| {
            collector
                .options
                .dump_buffer()
                .map(|buffer| buffer.clone())
                .unwrap_or_default()
        });
        for needle in ["total allocated", "collection cycles", "from-space", "roots:"] {
            assert!(dumped.contains(needle), "dump missing {needle:?}: {dumped}");
        }
    }
}
