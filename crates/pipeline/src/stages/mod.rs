//! One module per pipeline stage (spec §4.g-§4.l). Each exposes a
//! `run_worker` that one or more spawned tasks call concurrently against a
//! shared receiver; the orchestrator wires workers to queues and runs the
//! `DoneTracker`/poison-pill handoff between stages.

pub mod chunk_enrich;
pub mod embed;
pub mod file_summary;
pub mod incremental_filter;
pub mod metadata_enrich;
pub mod parse;
pub mod persist;
