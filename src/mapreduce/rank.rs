//! Top-N selection over the global count

use super::reducer::GlobalCount;
use super::tokenizer::Token;
use crate::error::{ErrorCode, Result, WordTallyError};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// One row of the ranking. `rank` is the 1-based position in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub token: Token,
    pub count: u64,
    pub rank: usize,
}

/// Highest count first, ties in ascending lexical order of the token
fn by_count_then_token(a: &(&Token, u64), b: &(&Token, u64)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0))
}

/// Select the `n` most frequent tokens.
///
/// The order never depends on hash map iteration order. Returns fewer than `n`
/// entries when the count holds fewer distinct tokens.
pub fn top_n(global: &GlobalCount, n: usize) -> Result<Vec<RankedEntry>> {
    if n == 0 {
        return Err(WordTallyError::invalid_argument(
            ErrorCode::INVALID_TOP_N,
            "top_n",
            "must be at least 1",
        ));
    }

    let mut entries: Vec<(&Token, u64)> = global.iter().collect();
    if entries.len() > n {
        entries.select_nth_unstable_by(n - 1, by_count_then_token);
        entries.truncate(n);
    }
    entries.sort_unstable_by(by_count_then_token);

    Ok(entries
        .into_iter()
        .enumerate()
        .map(|(position, (token, count))| RankedEntry {
            token: token.clone(),
            count,
            rank: position + 1,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::mapreduce::map_phase::LocalCount;
    use crate::mapreduce::reducer::reduce;
    use crate::mapreduce::tokenizer::Tokenizer;

    fn global(text: &str) -> GlobalCount {
        reduce(vec![LocalCount::from_tokens(
            0,
            Tokenizer::default().tokenize(text),
        )])
    }

    fn pairs(entries: &[RankedEntry]) -> Vec<(&str, u64)> {
        entries.iter().map(|e| (e.token.as_str(), e.count)).collect()
    }

    #[test]
    fn test_highest_counts_first() {
        let ranking = top_n(&global("the cat sat on the mat the cat ran"), 2).unwrap();
        assert_eq!(pairs(&ranking), vec![("the", 3), ("cat", 2)]);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[1].rank, 2);
    }

    #[test]
    fn test_ties_broken_lexically() {
        let ranking = top_n(&global("pear apple fig apple fig pear zed"), 10).unwrap();
        assert_eq!(
            pairs(&ranking),
            vec![("apple", 2), ("fig", 2), ("pear", 2), ("zed", 1)]
        );
    }

    #[test]
    fn test_truncation_respects_tie_break() {
        // Four tokens tie; only the two lexically smallest survive.
        let ranking = top_n(&global("d c b a"), 2).unwrap();
        assert_eq!(pairs(&ranking), vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn test_fewer_tokens_than_n() {
        let ranking = top_n(&global("one two"), 5).unwrap();
        assert_eq!(ranking.len(), 2);
    }

    #[test]
    fn test_empty_count() {
        assert!(top_n(&GlobalCount::new(), 3).unwrap().is_empty());
    }

    #[test]
    fn test_zero_is_invalid() {
        let err = top_n(&global("a"), 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert_eq!(err.code(), ErrorCode::INVALID_TOP_N);
    }
}
