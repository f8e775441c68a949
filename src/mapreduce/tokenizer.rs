//! Text normalization into word tokens
//!
//! A token is a maximal run of alphabetic or numeric characters, lower-cased.
//! Whitespace, punctuation and underscores all act as separators.

use crate::error::{Result, WordTallyError};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

static WORD_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\p{Alphabetic}\p{N}]+").expect("word pattern is valid"));

/// A normalized word unit. Tokens compare and order by their string value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Token(String);

impl Token {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Builds a token verbatim, without normalization.
impl From<&str> for Token {
    fn from(value: &str) -> Self {
        Token(value.to_string())
    }
}

impl Borrow<str> for Token {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Immutable raw text for a single pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    text: String,
}

impl Document {
    /// Decode raw bytes from a text source. Fails with an encoding error on invalid UTF-8.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        String::from_utf8(bytes)
            .map(|text| Self { text })
            .map_err(|e| WordTallyError::encoding(e.utf8_error()))
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Tokenizer {
    keep_numeric: bool,
}

impl Tokenizer {
    pub fn new(keep_numeric: bool) -> Self {
        Self { keep_numeric }
    }

    /// Split text into lower-cased tokens, preserving their order of appearance.
    ///
    /// Tokens without any alphabetic character (e.g. `"1999"`) are dropped unless
    /// the tokenizer was built with `keep_numeric`.
    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        WORD_PATTERN
            .find_iter(text)
            .map(|m| m.as_str().to_lowercase())
            .filter(|word| !word.is_empty())
            .filter(|word| self.keep_numeric || word.chars().any(char::is_alphabetic))
            .map(Token)
            .collect()
    }

    pub fn tokenize_document(&self, document: &Document) -> Vec<Token> {
        self.tokenize(document.as_str())
    }

    /// Decode and tokenize raw bytes in one step
    pub fn tokenize_bytes(&self, bytes: Vec<u8>) -> Result<Vec<Token>> {
        let document = Document::from_bytes(bytes)?;
        Ok(self.tokenize_document(&document))
    }
}
