//! Write queue: turns validated records into chunked storage calls

pub mod executor;

pub use executor::{
    BatchExecutor, BatchResult, ChunkState, DEFAULT_CHUNK_SIZE, ExecutorOptions, ImportMode,
    ImportProgress, ProgressObserver,
};
