//! Map-reduce word counting
//!
//! Stages, in pipeline order:
//! - `tokenizer` - raw text to normalized tokens
//! - `partition` - contiguous chunks, one per map worker
//! - `map_phase` - bounded parallel counting into per-chunk counts
//! - `reducer` - commutative merge into the global count
//! - `rank` - deterministic top-N selection
//! - `coordinator` - drives a run through the `state` machine

pub mod coordinator;
pub mod map_phase;
pub mod partition;
pub mod rank;
pub mod reducer;
pub mod state;
pub mod tokenizer;

pub use coordinator::{Coordinator, NoopObserver, PipelineObserver, RunReport, StageTimings};
pub use map_phase::{
    run_map_phase, ChunkFailure, ChunkMapper, ChunkOutcome, CountingMapper, LocalCount, MapError,
    MapPhaseConfig, MapPhaseSummary,
};
pub use partition::{partition, plan_chunks, Chunk};
pub use rank::{top_n, RankedEntry};
pub use reducer::{reduce, GlobalCount, Reducer};
pub use state::{apply_event, PipelineEvent, PipelineState, StateError};
pub use tokenizer::{Document, Token, Tokenizer};
