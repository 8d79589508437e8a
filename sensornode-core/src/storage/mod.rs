//! Log storage backends
//!
//! Host implementations of [`LogStorage`](crate::traits::LogStorage):
//!
//! - **Directory**: a mount point on the local filesystem, one file per log
//! - **Memory**: in-process logs with failure injection, for tests and replay

mod directory;
mod memory;

pub use directory::{DirectoryStorage, StorageStats};
pub use memory::MemoryStorage;

use crate::record::{LogFormat, LogRecord};
use crate::sample::Sample;

/// Decode a whole log, two lines per record.
///
/// Stops at the first block that does not decode, which is how a log cut
/// short by power loss ends.
pub fn decode_log(text: &str, format: LogFormat) -> Vec<Sample> {
    let lines: Vec<&str> = text.lines().collect();
    let mut samples = Vec::with_capacity(lines.len() / 2);

    for pair in lines.chunks_exact(2) {
        let block = format!("{}\n{}\n", pair[0], pair[1]);
        match LogRecord::parse(&block, format) {
            Some(sample) => samples.push(sample),
            None => break,
        }
    }
    samples
}
