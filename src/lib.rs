//! # wordtally
//!
//! Concurrent map-reduce word frequency counting.
//!
//! A run fetches a document, tokenizes it, splits the tokens into contiguous
//! chunks, counts each chunk on its own worker, merges the per-chunk counts and
//! returns the top-N words.
//!
//! ## Usage
//!
//! ```bash
//! wordtally [-w workers] [-n top] [--fail-fast] [--timeout secs] <location>
//! ```
//!
//! ## Modules
//!
//! - `config` - Run configuration, TOML loading and environment overrides
//! - `error` - Unified error type with stable error codes
//! - `mapreduce` - Tokenizer, partitioner, map workers, reducer, ranking and coordinator
//! - `source` - Text sources (HTTP, files, stdin, in-memory)
//! - `visualize` - Rendering of the ranked result
pub mod config;
pub mod error;
pub mod mapreduce;
pub mod source;
pub mod visualize;

pub use config::RunConfig;
pub use error::{ErrorKind, Result, WordTallyError};
pub use mapreduce::{Coordinator, RankedEntry, RunReport};
