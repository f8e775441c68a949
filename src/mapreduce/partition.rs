//! Contiguous chunking of the token sequence for parallel counting

use super::tokenizer::Token;
use crate::error::{ErrorCode, Result, WordTallyError};
use std::ops::Range;

/// An ordered, contiguous slice of the token sequence owned by one map worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    index: usize,
    tokens: Vec<Token>,
}

impl Chunk {
    pub fn new(index: usize, tokens: Vec<Token>) -> Self {
        Self { index, tokens }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }
}

/// Plan chunk boundaries without touching the tokens.
///
/// Chunks have `ceil(token_count / worker_count)` tokens each except the last,
/// so at most `worker_count` ranges come back and none of them is empty.
pub fn plan_chunks(token_count: usize, worker_count: usize) -> Result<Vec<Range<usize>>> {
    if worker_count == 0 {
        return Err(WordTallyError::invalid_argument(
            ErrorCode::INVALID_WORKER_COUNT,
            "worker_count",
            "must be at least 1",
        ));
    }
    if token_count == 0 {
        return Ok(Vec::new());
    }

    let chunk_size = token_count.div_ceil(worker_count);
    Ok((0..token_count)
        .step_by(chunk_size)
        .map(|start| start..(start + chunk_size).min(token_count))
        .collect())
}

/// Split tokens into chunks following [`plan_chunks`]
pub fn partition(tokens: Vec<Token>, worker_count: usize) -> Result<Vec<Chunk>> {
    let plan = plan_chunks(tokens.len(), worker_count)?;
    let mut remaining = tokens.into_iter();

    Ok(plan
        .into_iter()
        .enumerate()
        .map(|(index, range)| Chunk::new(index, remaining.by_ref().take(range.len()).collect()))
        .collect())
}
