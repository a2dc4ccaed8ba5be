use parking_lot::{Mutex, MutexGuard};

use super::constants::DEFAULT_REGION_SIZE;

/// Options for the process-wide collector.
pub struct Options {
    /// Semispace size in bytes.
    pub region_size: usize,

    /// Print allocation statistics when the embedder asks for them on exit.
    pub print_stats: bool,

    /// Buffer to write all diagnostic dumps into instead of stdout.
    pub dump_buffer: Option<Mutex<String>>,
}

impl Options {
    pub fn dump_buffer(&self) -> Option<MutexGuard<'_, String>> {
        self.dump_buffer.as_ref().map(|buffer| buffer.lock())
    }
}

impl Default for Options {
    /// Create a new options struct with default values.
    fn default() -> Self {
        OptionsBuilder::new().build()
    }
}

pub struct OptionsBuilder(Options);

impl OptionsBuilder {
    /// Create new options with default values.
    pub fn new() -> Self {
        Self(Options {
            region_size: DEFAULT_REGION_SIZE,
            print_stats: false,
            dump_buffer: None,
        })
    }

    /// Return the options that have been built, consuming the builder.
    pub fn build(self) -> Options {
        self.0
    }

    pub fn region_size(mut self, region_size: usize) -> Self {
        self.0.region_size = region_size;
        self
    }

    pub fn print_stats(mut self, print_stats: bool) -> Self {
        self.0.print_stats = print_stats;
        self
    }

    pub fn dump_buffer(mut self, dump_buffer: Option<Mutex<String>>) -> Self {
        self.0.dump_buffer = dump_buffer;
        self
    }
}

impl Default for OptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}
