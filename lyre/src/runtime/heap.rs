//! The process-wide collector instance.
//!
//! The Lyre compiler emits calls against a global heap, so the runtime owns
//! exactly one collector, created lazily on first use. The ABI is
//! single-threaded by contract; the mutex only makes the static sound and
//! serializes any accidental cross-thread use.

use once_cell::sync::Lazy;
use parking_lot::Mutex;

use lyre_gc::Heap;

use crate::common::options::Options;

use super::header::LyreLayout;

/// The engine heap specialized to the Lyre header encoding.
pub type LyreHeap = Heap<LyreLayout>;

/// The process-wide heap together with the options it was created from.
pub struct Collector {
    pub heap: LyreHeap,
    pub options: Options,
}

// The heap stores raw region pointers. The runtime contract is
// single-threaded; all access goes through the global mutex.
unsafe impl Send for Collector {}

/// Options staged by `configure` before the collector first runs.
static PENDING_OPTIONS: Mutex<Option<Options>> = Mutex::new(None);

static COLLECTOR: Lazy<Mutex<Collector>> = Lazy::new(|| {
    let options = PENDING_OPTIONS.lock().take().unwrap_or_default();
    let heap = LyreHeap::with_region_size(options.region_size);
    Mutex::new(Collector { heap, options })
});

/// Stage options for the collector. Only effective before the first use of
/// the heap; later calls are ignored and return false.
pub fn configure(options: Options) -> bool {
    if Lazy::get(&COLLECTOR).is_some() {
        return false;
    }
    *PENDING_OPTIONS.lock() = Some(options);
    true
}

/// Run `f` with the process-wide collector, initializing it if needed.
pub fn with_collector<R>(f: impl FnOnce(&mut Collector) -> R) -> R {
    let mut collector = COLLECTOR.lock();
    f(&mut collector)
}
