//! Demo mutator: builds and discards list structures through the collector
//! ABI, the way compiled Lyre code would.

use core::ffi::c_void;

use clap::Parser;

use lyre::common::options::OptionsBuilder;
use lyre::runtime::abi::{
    gc_alloc, gc_pop_root, gc_push_root, gc_read_barrier, gc_write_barrier,
    print_gc_alloc_stats, print_gc_state,
};
use lyre::runtime::{configure, with_collector, ObjectHeader, ObjectTag, Value};
use lyre_gc::ObjRef;

/// Raw command line arguments.
#[derive(Parser)]
#[command(about)]
struct Args {
    /// Number of list nodes to build per round
    #[arg(long, default_value_t = 64)]
    nodes: usize,

    /// Rounds of build-and-drop churn
    #[arg(long, default_value_t = 8)]
    rounds: usize,

    /// The semispace size, in bytes
    #[arg(long)]
    heap_size: Option<usize>,

    /// Print the heap state after every round
    #[arg(long, default_value_t = false)]
    print_state: bool,

    /// Print allocation statistics on exit
    #[arg(long, default_value_t = false)]
    print_stats: bool,
}

fn print_error_message_and_exit(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

/// Cons one node onto the list held in the registered `head_slot`.
///
/// # Safety
/// `head_slot` must be a registered root holding null or a live list.
unsafe fn push_node(head_slot: *mut *mut c_void, value: isize) {
    let header = ObjectHeader::new(ObjectTag::Cons, 2);
    // May move the current head; the root slot is rewritten before we read it.
    let node = ObjRef::from_raw(gc_alloc(header.size_in_bytes()) as *mut u8);
    node.write_header(header.raw());
    node.write_field(0, Value::from_int(value).as_slot());
    node.write_field(1, ObjRef::from_raw(*head_slot as *mut u8));
    gc_write_barrier(node.as_raw() as *mut c_void, 1, *head_slot);
    *head_slot = node.as_raw() as *mut c_void;
}

/// Walk the list, forwarding every field before reading it.
///
/// # Safety
/// `head` must be a live list (or null). Walking does not allocate, so no
/// root is needed for the cursor.
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

fn main() {
    env_logger::init();
    let args = Args::parse();

    let mut builder = OptionsBuilder::new().print_stats(args.print_stats);
    if let Some(bytes) = args.heap_size {
        builder = builder.region_size(bytes);
    }
    if !configure(builder.build()) {
        print_error_message_and_exit("collector configured after first use");
    }

    unsafe {
        let mut head: *mut c_void = core::ptr::null_mut();
        gc_push_root(&mut head);

        for round in 0..args.rounds {
            // Dropping the previous round's list makes it garbage; the new
            // one is built behind the same root.
            head = core::ptr::null_mut();
            for value in 0..args.nodes {
                push_node(&mut head, value as isize);
            }

            let total = sum_list(head);
            println!("round {round}: {} nodes, sum {total}", args.nodes);
            if args.print_state {
                print_gc_state();
            }
        }

        gc_pop_root(&mut head);
    }

    if with_collector(|collector| collector.options.print_stats) {
        print_gc_alloc_stats();
    }
}
