//! Pipeline coordinator
//!
//! Drives one run through fetch, tokenize, partition, map, reduce and rank,
//! tracking the state machine, stage timings, cancellation and the run deadline.

use super::map_phase::{
    run_map_phase, ChunkFailure, ChunkMapper, ChunkOutcome, CountingMapper, LocalCount,
    MapPhaseConfig,
};
use super::partition::partition;
use super::rank::{top_n, RankedEntry};
use super::reducer::{GlobalCount, Reducer};
use super::state::{apply_event, PipelineEvent, PipelineState};
use super::tokenizer::Tokenizer;
use crate::config::{ReduceStrategy, RunConfig};
use crate::error::{CancelReason, ErrorCode, Result, WordTallyError};
use crate::source::TextSource;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Hooks for following a run's progress. All methods default to no-ops.
pub trait PipelineObserver: Send + Sync {
    fn on_transition(&self, _from: PipelineState, _to: PipelineState) {}

    fn on_chunks_planned(&self, _chunk_count: usize) {}

    fn on_chunk_finished(&self, _chunk_index: usize, _succeeded: bool) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl PipelineObserver for NoopObserver {}

/// Wall-clock time spent in each stage
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    #[serde(with = "humantime_serde")]
    pub fetch: Duration,
    #[serde(with = "humantime_serde")]
    pub tokenize: Duration,
    #[serde(with = "humantime_serde")]
    pub map: Duration,
    #[serde(with = "humantime_serde")]
    pub reduce: Duration,
    #[serde(with = "humantime_serde")]
    pub rank: Duration,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub location: String,
    pub started_at: DateTime<Utc>,
    pub ranking: Vec<RankedEntry>,
    /// True when at least one chunk was dropped after a worker failure
    pub partial: bool,
    pub failures: Vec<ChunkFailure>,
    /// Tokens produced by the tokenizer
    pub total_tokens: u64,
    /// Tokens that made it into the global count
    pub counted_tokens: u64,
    pub distinct_tokens: usize,
    pub chunk_count: usize,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub timings: StageTimings,
}

/// Cancellation scope for one run: a child of the caller's token plus the deadline timer
struct RunCancellation {
    token: CancellationToken,
    timed_out: Arc<AtomicBool>,
    deadline: Option<Duration>,
    timer: Option<JoinHandle<()>>,
}

impl RunCancellation {
    fn start(parent: &CancellationToken, deadline: Option<Duration>) -> Self {
        let token = parent.child_token();
        let timed_out = Arc::new(AtomicBool::new(false));

        let timer = deadline.map(|after| {
            let token = token.clone();
            let timed_out = timed_out.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(after) => {
                        warn!("Run deadline of {:?} exceeded, cancelling", after);
                        timed_out.store(true, Ordering::SeqCst);
                        token.cancel();
                    }
                    _ = token.cancelled() => {}
                }
            })
        });

        Self {
            token,
            timed_out,
            deadline,
            timer,
        }
    }

    fn reason(&self) -> CancelReason {
        match self.deadline {
            Some(after) if self.timed_out.load(Ordering::SeqCst) => CancelReason::Timeout { after },
            _ => CancelReason::Requested,
        }
    }

    fn check(&self) -> Result<()> {
        if self.token.is_cancelled() {
            Err(WordTallyError::cancelled(self.reason()))
        } else {
            Ok(())
        }
    }
}

impl Drop for RunCancellation {
    fn drop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

/// Runs word-frequency pipelines. One coordinator executes runs one at a time.
pub struct Coordinator {
    config: RunConfig,
    source: Arc<dyn TextSource>,
    mapper: Arc<dyn ChunkMapper>,
    observer: Arc<dyn PipelineObserver>,
    state: PipelineState,
    last_timings: Option<StageTimings>,
}

impl Coordinator {
    pub fn new(config: RunConfig, source: Arc<dyn TextSource>) -> Self {
        Self {
            config,
            source,
            mapper: Arc::new(CountingMapper),
            observer: Arc::new(NoopObserver),
            state: PipelineState::Idle,
            last_timings: None,
        }
    }

    /// Replace the map worker implementation
    pub fn with_mapper(mut self, mapper: Arc<dyn ChunkMapper>) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn PipelineObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Stage timings of the most recent run, including failed ones
    pub fn last_timings(&self) -> Option<&StageTimings> {
        self.last_timings.as_ref()
    }

    pub async fn run(&mut self, location: &str) -> Result<RunReport> {
        self.run_with_cancel(location, CancellationToken::new())
            .await
    }

    /// Execute a run that stops early once `cancel` is raised.
    ///
    /// The configured deadline cancels a child of `cancel`, so the caller's
    /// token stays untouched by timeouts.
    pub async fn run_with_cancel(
        &mut self,
        location: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let run_id = Uuid::new_v4();
        let span = info_span!("pipeline_run", %run_id, location);
        self.execute(run_id, location, cancel).instrument(span).await
    }

    async fn execute(
        &mut self,
        run_id: Uuid,
        location: &str,
        cancel: CancellationToken,
    ) -> Result<RunReport> {
        let started = Instant::now();
        let started_at = Utc::now();
        let mut timings = StageTimings::default();

        let outcome = match self.config.validate() {
            Ok(()) => {
                let scope = RunCancellation::start(&cancel, self.config.timeout());
                self.drive(location, &scope, &mut timings).await
            }
            Err(e) => Err(e),
        };
        self.last_timings = Some(timings);

        match outcome {
            Ok(stages) => {
                let elapsed = started.elapsed();
                let partial = !stages.failures.is_empty();
                if partial {
                    warn!(
                        "Partial result: {} of {} chunks dropped",
                        stages.failures.len(),
                        stages.chunk_count
                    );
                    for failure in &stages.failures {
                        warn!("{}", WordTallyError::worker_failure(failure.clone()));
                    }
                }
                info!(
                    "Run finished in {:?}: {} tokens, {} distinct",
                    elapsed, stages.total_tokens, stages.distinct_tokens
                );
                Ok(RunReport {
                    run_id,
                    location: location.to_string(),
                    started_at,
                    ranking: stages.ranking,
                    partial,
                    failures: stages.failures,
                    total_tokens: stages.total_tokens,
                    counted_tokens: stages.counted_tokens,
                    distinct_tokens: stages.distinct_tokens,
                    chunk_count: stages.chunk_count,
                    elapsed,
                    timings,
                })
            }
            Err(e) => {
                error!("Run failed: {}", e);
                if !self.state.is_terminal() {
                    self.transition(PipelineEvent::Fail)?;
                }
                Err(e)
            }
        }
    }

    async fn drive(
        &mut self,
        location: &str,
        scope: &RunCancellation,
        timings: &mut StageTimings,
    ) -> Result<StageOutput> {
        self.transition(PipelineEvent::Start)?;
        scope.check()?;

        let stage = Instant::now();
        let bytes = tokio::select! {
            biased;
            _ = scope.token.cancelled() => return Err(WordTallyError::cancelled(scope.reason())),
            fetched = self.source.fetch(location) => fetched?,
        };
        timings.fetch = stage.elapsed();
        debug!("Fetched {} bytes", bytes.len());
        self.transition(PipelineEvent::Fetched)?;

        let stage = Instant::now();
        let tokenizer = Tokenizer::new(self.config.keep_numeric);
        let tokenizing = tokio::task::spawn_blocking(move || tokenizer.tokenize_bytes(bytes));
        let tokens = tokio::select! {
            biased;
            _ = scope.token.cancelled() => return Err(WordTallyError::cancelled(scope.reason())),
            joined = tokenizing => match joined {
                Ok(tokens) => tokens?,
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(_) => return Err(WordTallyError::cancelled(scope.reason())),
            },
        };
        timings.tokenize = stage.elapsed();
        let total_tokens = tokens.len() as u64;
        info!("Tokenized {} tokens", total_tokens);
        scope.check()?;
        self.transition(PipelineEvent::Tokenized)?;

        let stage = Instant::now();
        let chunks = partition(tokens, self.config.worker_count)?;
        let chunk_count = chunks.len();
        self.observer.on_chunks_planned(chunk_count);

        let strategy = self.config.reduce_strategy;
        let observer = self.observer.clone();
        let mut reducer = Reducer::new();
        let mut collected: Vec<LocalCount> = Vec::new();

        let summary = run_map_phase(
            chunks,
            self.mapper.clone(),
            MapPhaseConfig {
                worker_count: self.config.worker_count,
                fail_fast: self.config.fail_fast,
            },
            &scope.token,
            |outcome| {
                let index = outcome.chunk_index();
                match outcome {
                    ChunkOutcome::Counted(local) => {
                        observer.on_chunk_finished(index, true);
                        match strategy {
                            ReduceStrategy::Streaming => reducer.absorb(local),
                            ReduceStrategy::Batch => collected.push(local),
                        }
                    }
                    ChunkOutcome::Failed(_) => observer.on_chunk_finished(index, false),
                    ChunkOutcome::Abandoned(_) => {}
                }
            },
        )
        .await;
        timings.map = stage.elapsed();

        if summary.halted_by_failure {
            return Err(WordTallyError::aggregate(summary.failures));
        }
        scope.check()?;
        self.transition(PipelineEvent::Mapped)?;

        let stage = Instant::now();
        if strategy == ReduceStrategy::Batch {
            reducer.extend(collected);
        }
        debug_assert_eq!(reducer.merged_len(), summary.completed);
        debug!(
            chunks = ?reducer.merged_chunks().collect::<Vec<_>>(),
            "Merged {} of {} chunks",
            reducer.merged_len(),
            chunk_count
        );
        let global: GlobalCount = reducer.finish();
        timings.reduce = stage.elapsed();
        if summary.failures.is_empty() {
            debug_assert_eq!(global.total(), total_tokens);
        }
        self.transition(PipelineEvent::Reduced)?;

        let stage = Instant::now();
        let ranking = top_n(&global, self.config.top_n)?;
        timings.rank = stage.elapsed();
        self.transition(PipelineEvent::Ranked)?;

        Ok(StageOutput {
            ranking,
            failures: summary.failures,
            total_tokens,
            counted_tokens: global.total(),
            distinct_tokens: global.distinct(),
            chunk_count,
        })
    }

    fn transition(&mut self, event: PipelineEvent) -> Result<()> {
        let from = self.state;
        let to = apply_event(from, event).map_err(|e| {
            WordTallyError::invalid_argument(
                ErrorCode::INVALID_STATE_TRANSITION,
                "state",
                e.to_string(),
            )
        })?;
        debug!("Pipeline state {} -> {}", from, to);
        self.state = to;
        self.observer.on_transition(from, to);
        Ok(())
    }
}

struct StageOutput {
    ranking: Vec<RankedEntry>,
    failures: Vec<ChunkFailure>,
    total_tokens: u64,
    counted_tokens: u64,
    distinct_tokens: usize,
    chunk_count: usize,
}
