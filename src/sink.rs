//! Emission boundary
//!
//! Tags leave the core one record at a time through a [`TagSink`]. The
//! host indexer owns storage; the core never keeps a record after `put`.

use serde::{Deserialize, Serialize};

/// The two tag kinds a query can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    /// Declaration site of a symbol
    Definition,
    /// Use site of a symbol
    Reference,
}

impl TagKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TagKind::Definition => "definition",
            TagKind::Reference => "reference",
        }
    }

    /// One-letter marker used by the line-oriented output
    pub fn marker(&self) -> char {
        match self {
            TagKind::Definition => 'D',
            TagKind::Reference => 'R',
        }
    }
}

impl std::fmt::Display for TagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single emitted tag.
///
/// `name` and `snippet` are bounded to [`crate::interpreter::MAX_TOKEN_SIZE`]
/// minus one bytes and never contain a newline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRecord {
    pub kind: TagKind,
    pub name: String,
    /// 1-based line of the definition/reference node
    pub line: u32,
    pub path: String,
    pub snippet: String,
}

/// Receiver of tags and non-fatal diagnostics.
///
/// Calls are synchronous and infallible from the core's point of view.
pub trait TagSink {
    /// Store one tag
    fn put(&mut self, record: TagRecord);

    /// Report a non-fatal problem
    fn warning(&mut self, message: &str);
}

/// The full host callback set used by [`crate::extractor::parser`].
pub trait HostCallbacks: TagSink {
    /// Report a fatal problem. Never returns control to the core.
    fn die(&mut self, message: &str) -> !;
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    pub records: Vec<TagRecord>,
    pub warnings: Vec<String>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn definitions(&self) -> impl Iterator<Item = &TagRecord> {
        self.records.iter().filter(|r| r.kind == TagKind::Definition)
    }

    pub fn references(&self) -> impl Iterator<Item = &TagRecord> {
        self.records.iter().filter(|r| r.kind == TagKind::Reference)
    }
}

impl TagSink for CollectingSink {
    fn put(&mut self, record: TagRecord) {
        self.records.push(record);
    }

    fn warning(&mut self, message: &str) {
        self.warnings.push(message.to_string());
    }
}
