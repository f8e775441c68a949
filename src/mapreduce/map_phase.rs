//! Map phase execution
//!
//! Fans chunks out to map workers bounded by a semaphore, runs each count on the
//! blocking pool and hands every outcome back to the caller as it completes.

use super::partition::Chunk;
use super::tokenizer::Token;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Number of tokens a worker counts between cancellation checks
pub const CANCEL_POLL_INTERVAL: usize = 1024;

/// Token frequencies for a single chunk
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalCount {
    chunk_index: usize,
    counts: HashMap<Token, u64>,
    total: u64,
}

impl LocalCount {
    pub fn new(chunk_index: usize) -> Self {
        Self {
            chunk_index,
            ..Self::default()
        }
    }

    /// Count an arbitrary token sequence under the given chunk index
    pub fn from_tokens(chunk_index: usize, tokens: impl IntoIterator<Item = Token>) -> Self {
        let mut local = Self::new(chunk_index);
        for token in tokens {
            local.record(token);
        }
        local
    }

    pub fn record(&mut self, token: Token) {
        *self.counts.entry(token).or_insert(0) += 1;
        self.total += 1;
    }

    pub fn chunk_index(&self) -> usize {
        self.chunk_index
    }

    pub fn get(&self, token: &str) -> Option<u64> {
        self.counts.get(token).copied()
    }

    /// Number of tokens counted
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn distinct(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Token, u64)> {
        self.counts.iter().map(|(token, count)| (token, *count))
    }

    pub(crate) fn into_counts(self) -> HashMap<Token, u64> {
        self.counts
    }
}

/// A chunk whose map step did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkFailure {
    pub chunk_index: usize,
    pub reason: String,
    pub panicked: bool,
}

impl fmt::Display for ChunkFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.panicked {
            write!(f, "chunk {} panicked: {}", self.chunk_index, self.reason)
        } else {
            write!(f, "chunk {} failed: {}", self.chunk_index, self.reason)
        }
    }
}

/// Error returned by a [`ChunkMapper`]
#[derive(Debug, thiserror::Error)]
pub enum MapError {
    #[error("chunk abandoned after cancellation")]
    Abandoned,
    #[error("{0}")]
    Failed(String),
}

/// Counts the tokens of one chunk.
///
/// Implementations run on the blocking thread pool and must not share mutable
/// state with other workers. They should poll `cancel` and return
/// [`MapError::Abandoned`] once it is raised.
pub trait ChunkMapper: Send + Sync {
    fn map_chunk(&self, chunk: &Chunk, cancel: &CancellationToken) -> Result<LocalCount, MapError>;
}

/// The standard map worker: one pass over the chunk with a local counter
#[derive(Debug, Clone, Copy, Default)]
pub struct CountingMapper;

impl ChunkMapper for CountingMapper {
    fn map_chunk(&self, chunk: &Chunk, cancel: &CancellationToken) -> Result<LocalCount, MapError> {
        let mut local = LocalCount::new(chunk.index());
        for batch in chunk.tokens().chunks(CANCEL_POLL_INTERVAL) {
            if cancel.is_cancelled() {
                return Err(MapError::Abandoned);
            }
            for token in batch {
                local.record(token.clone());
            }
        }
        Ok(local)
    }
}

/// What became of a single chunk
#[derive(Debug)]
pub enum ChunkOutcome {
    Counted(LocalCount),
    Failed(ChunkFailure),
    Abandoned(usize),
}

impl ChunkOutcome {
    pub fn chunk_index(&self) -> usize {
        match self {
            ChunkOutcome::Counted(local) => local.chunk_index(),
            ChunkOutcome::Failed(failure) => failure.chunk_index,
            ChunkOutcome::Abandoned(index) => *index,
        }
    }
}

/// Configuration for map phase execution
#[derive(Debug, Clone, Copy)]
pub struct MapPhaseConfig {
    pub worker_count: usize,
    pub fail_fast: bool,
}

/// Summary of a finished map phase
#[derive(Debug, Clone, Default)]
pub struct MapPhaseSummary {
    pub total_chunks: usize,
    pub completed: usize,
    pub abandoned: usize,
    pub failures: Vec<ChunkFailure>,
    /// Set when fail-fast raised the cancellation token after a chunk failure
    pub halted_by_failure: bool,
}

/// Run every chunk through `mapper` with at most `worker_count` running at once.
///
/// `on_outcome` is called once per chunk, in completion order. With `fail_fast`
/// the first failure cancels `cancel`, which makes queued chunks and in-flight
/// workers come back as abandoned. Failures that arrive after `cancel` was
/// already raised are recorded but do not set `halted_by_failure`.
pub async fn run_map_phase<F>(
    chunks: Vec<Chunk>,
    mapper: Arc<dyn ChunkMapper>,
    config: MapPhaseConfig,
    cancel: &CancellationToken,
    mut on_outcome: F,
) -> MapPhaseSummary
where
    F: FnMut(ChunkOutcome),
{
    let semaphore = Arc::new(Semaphore::new(config.worker_count.max(1)));
    let mut summary = MapPhaseSummary {
        total_chunks: chunks.len(),
        ..MapPhaseSummary::default()
    };

    info!(
        "Executing map phase with {} chunks (max parallel: {})",
        summary.total_chunks, config.worker_count
    );

    let mut in_flight: FuturesUnordered<_> = chunks
        .into_iter()
        .map(|chunk| run_worker(chunk, mapper.clone(), semaphore.clone(), cancel.clone()))
        .collect();

    while let Some(outcome) = in_flight.next().await {
        match &outcome {
            ChunkOutcome::Counted(local) => {
                debug!(
                    chunk = local.chunk_index(),
                    tokens = local.total(),
                    "Chunk counted"
                );
                summary.completed += 1;
            }
            ChunkOutcome::Failed(failure) => {
                warn!("Map worker failed: {}", failure);
                summary.failures.push(failure.clone());
                // A failure seen after cancellation is not what stopped the phase.
                if config.fail_fast && !summary.halted_by_failure && !cancel.is_cancelled() {
                    warn!("Fail-fast enabled, cancelling remaining chunks");
                    summary.halted_by_failure = true;
                    cancel.cancel();
                }
            }
            ChunkOutcome::Abandoned(index) => {
                debug!(chunk = index, "Chunk abandoned");
                summary.abandoned += 1;
            }
        }
        on_outcome(outcome);
    }

    summary
}

async fn run_worker(
    chunk: Chunk,
    mapper: Arc<dyn ChunkMapper>,
    semaphore: Arc<Semaphore>,
    cancel: CancellationToken,
) -> ChunkOutcome {
    let index = chunk.index();

    let permit = tokio::select! {
        biased;
        _ = cancel.cancelled() => return ChunkOutcome::Abandoned(index),
        permit = semaphore.acquire_owned() => match permit {
            Ok(permit) => permit,
            Err(_) => return ChunkOutcome::Abandoned(index),
        },
    };

    debug!(chunk = index, tokens = chunk.len(), "Map worker started");
    let worker_cancel = cancel.clone();
    let joined =
        tokio::task::spawn_blocking(move || mapper.map_chunk(&chunk, &worker_cancel)).await;
    drop(permit);

    match joined {
        Ok(Ok(local)) => ChunkOutcome::Counted(local),
        Ok(Err(MapError::Abandoned)) => ChunkOutcome::Abandoned(index),
        Ok(Err(MapError::Failed(reason))) => ChunkOutcome::Failed(ChunkFailure {
            chunk_index: index,
            reason,
            panicked: false,
        }),
        Err(join_error) => {
            let panicked = join_error.is_panic();
            let reason = if panicked {
                panic_message(join_error.into_panic())
            } else {
                join_error.to_string()
            };
            ChunkOutcome::Failed(ChunkFailure {
                chunk_index: index,
                reason,
                panicked,
            })
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapreduce::partition::partition;
    use crate::mapreduce::tokenizer::Tokenizer;

    struct FailingMapper {
        fail_index: usize,
        panic: bool,
    }

    impl ChunkMapper for FailingMapper {
        fn map_chunk(
            &self,
            chunk: &Chunk,
            cancel: &CancellationToken,
        ) -> Result<LocalCount, MapError> {
            if chunk.index() == self.fail_index {
                if self.panic {
                    panic!("simulated worker crash");
                }
                return Err(MapError::Failed("simulated failure".to_string()));
            }
            CountingMapper.map_chunk(chunk, cancel)
        }
    }

    fn chunks(text: &str, workers: usize) -> Vec<Chunk> {
        partition(Tokenizer::default().tokenize(text), workers).unwrap()
    }

    fn config(worker_count: usize, fail_fast: bool) -> MapPhaseConfig {
        MapPhaseConfig {
            worker_count,
            fail_fast,
        }
    }

    #[test]
    fn test_counting_mapper_counts_chunk() {
        let chunk = Chunk::new(
            4,
            Tokenizer::default().tokenize("the cat and the hat and the bat"),
        );
        let local = CountingMapper
            .map_chunk(&chunk, &CancellationToken::new())
            .unwrap();

        assert_eq!(local.chunk_index(), 4);
        assert_eq!(local.get("the"), Some(3));
        assert_eq!(local.get("and"), Some(2));
        assert_eq!(local.get("dog"), None);
        assert_eq!(local.total(), 8);
        assert_eq!(local.distinct(), 5);
    }

    #[test]
    fn test_counting_mapper_abandons_when_cancelled() {
        let chunk = Chunk::new(0, Tokenizer::default().tokenize("a b c"));
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(matches!(
            CountingMapper.map_chunk(&chunk, &cancel),
            Err(MapError::Abandoned)
        ));
    }

    #[tokio::test]
    async fn test_all_chunks_counted() {
        let chunks = chunks("a b c d e f g h i", 3);
        let mut counted = Vec::new();
        let summary = run_map_phase(
            chunks,
            Arc::new(CountingMapper),
            config(3, false),
            &CancellationToken::new(),
            |outcome| {
                if let ChunkOutcome::Counted(local) = outcome {
                    counted.push(local.chunk_index());
                }
            },
        )
        .await;

        counted.sort_unstable();
        assert_eq!(counted, vec![0, 1, 2]);
        assert_eq!(summary.completed, 3);
        assert!(summary.failures.is_empty());
    }

    #[tokio::test]
    async fn test_failure_recorded_without_fail_fast() {
        let mapper = Arc::new(FailingMapper {
            fail_index: 1,
            panic: false,
        });
        let cancel = CancellationToken::new();
        let summary = run_map_phase(
            chunks("a b c d e f", 3),
            mapper,
            config(3, false),
            &cancel,
            |_| {},
        )
        .await;

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].chunk_index, 1);
        assert!(!summary.halted_by_failure);
        assert!(!cancel.is_cancelled());
    }

    #[tokio::test]
    async fn test_panicking_worker_is_reported() {
        let mapper = Arc::new(FailingMapper {
            fail_index: 0,
            panic: true,
        });
        let summary = run_map_phase(
            chunks("a b c d", 2),
            mapper,
            config(2, false),
            &CancellationToken::new(),
            |_| {},
        )
        .await;

        assert_eq!(summary.failures.len(), 1);
        assert!(summary.failures[0].panicked);
        assert_eq!(summary.failures[0].reason, "simulated worker crash");
    }

    #[tokio::test]
    async fn test_fail_fast_cancels_token() {
        let mapper = Arc::new(FailingMapper {
            fail_index: 0,
            panic: false,
        });
        let cancel = CancellationToken::new();
        // A single worker slot serializes the chunks.
        let summary = run_map_phase(
            chunks("a b c d e f", 3),
            mapper,
            config(1, true),
            &cancel,
            |_| {},
        )
        .await;

        assert!(summary.halted_by_failure);
        assert!(cancel.is_cancelled());
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(
            summary.completed + summary.abandoned + summary.failures.len(),
            3
        );
    }

    /// Waits for cancellation, then reports a failure instead of abandoning
    struct FailOnCancel;

    impl ChunkMapper for FailOnCancel {
        fn map_chunk(
            &self,
            _chunk: &Chunk,
            cancel: &CancellationToken,
        ) -> Result<LocalCount, MapError> {
            while !cancel.is_cancelled() {
                std::thread::sleep(std::time::Duration::from_millis(5));
            }
            Err(MapError::Failed("interrupted".to_string()))
        }
    }

    #[tokio::test]
    async fn test_failures_after_cancellation_do_not_halt() {
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(30)).await;
            trigger.cancel();
        });

        let summary = run_map_phase(
            chunks("a b c d", 2),
            Arc::new(FailOnCancel),
            config(2, true),
            &cancel,
            |_| {},
        )
        .await;

        assert_eq!(summary.failures.len(), 2);
        assert!(!summary.halted_by_failure);
    }

    #[tokio::test]
    async fn test_pre_cancelled_run_schedules_nothing() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = run_map_phase(
            chunks("a b c d e f", 3),
            Arc::new(CountingMapper),
            config(3, false),
            &cancel,
            |_| {},
        )
        .await;

        assert_eq!(summary.abandoned, 3);
        assert_eq!(summary.completed, 0);
    }
}
