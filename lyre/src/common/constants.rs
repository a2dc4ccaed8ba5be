/// Default semispace size for the process-wide collector, in bytes.
pub const DEFAULT_REGION_SIZE: usize = lyre_gc::MAX_ALLOC_SIZE;
