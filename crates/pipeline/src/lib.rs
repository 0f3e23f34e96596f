//! Bounded-queue ingestion pipeline: Scanner/Watcher sources feed
//! IncrementalFilter → MetadataEnrich → Parse → ChunkEnrich → Embed →
//! Persist → FileSummary, each stage its own worker pool wired by the
//! queues in [`queue`] and brought up by [`orchestrator::spawn`].

pub mod error;
pub mod lock;
pub mod orchestrator;
pub mod queue;
pub mod scanner;
pub mod stages;
pub mod watcher;

/// Files larger than this are never parsed/chunked/embedded (spec §6
/// filesystem rules): the Scanner, Watcher, and MetadataEnrich re-stat all
/// check it independently since a file can cross the cap after being
/// queued, or arrive only through the watcher path.
pub(crate) const MAX_FILE_BYTES: u64 = 10 * 1024 * 1024;

pub use error::{PipelineError, Result};
pub use lock::{LlmLock, LockStatus};
pub use orchestrator::{index_once, spawn, PipelineHandle};
pub use queue::{bounded_queue, run_done_aggregator, DoneTracker, QueueItem, QueueSender, SharedReceiver};
