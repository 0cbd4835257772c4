//! Match interpreter
//!
//! Compiles query text against a grammar, runs it over a syntax tree and
//! turns each match into a [`TagRecord`].
//!
//! Capture naming convention (prefix match on the capture name):
//! - `name...` → the tag name
//! - `definition...` → the match is a definition; node gives snippet and line
//! - `reference...` → the match is a reference; node gives snippet and line
//!
//! Anything else is ignored. A match needs at least two captures, one
//! `name` capture and one `definition`/`reference` capture; other matches
//! are skipped with a warning.

use crate::grammar::Grammar;
use crate::sink::{TagKind, TagRecord, TagSink};
use crate::source::SourceFile;
use tree_sitter::{Node, Query, QueryCapture, QueryCursor, QueryError};

/// Size of the text buffer for names and snippets; text is at most one
/// byte shorter.
pub const MAX_TOKEN_SIZE: usize = 500;

/// Role of a capture, decided once per capture name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureRole {
    Name,
    Definition,
    Reference,
    Unknown,
}

impl CaptureRole {
    pub fn classify(capture_name: &str) -> Self {
        if capture_name.starts_with("name") {
            CaptureRole::Name
        } else if capture_name.starts_with("definition") {
            CaptureRole::Definition
        } else if capture_name.starts_with("reference") {
            CaptureRole::Reference
        } else {
            CaptureRole::Unknown
        }
    }

    /// Tag kind this role marks a match as, if any
    pub fn tag_kind(&self) -> Option<TagKind> {
        match self {
            CaptureRole::Definition => Some(TagKind::Definition),
            CaptureRole::Reference => Some(TagKind::Reference),
            CaptureRole::Name | CaptureRole::Unknown => None,
        }
    }
}

/// A query compiled for one grammar, with its capture roles resolved.
#[derive(Debug)]
pub struct CompiledQuery {
    query: Query,
    roles: Vec<CaptureRole>,
    grammar: String,
    label: String,
}

impl CompiledQuery {
    /// Compile `text`. `label` names the query in diagnostics.
    pub fn compile(grammar: &Grammar, text: &str, label: impl Into<String>) -> Result<Self, QueryError> {
        let query = Query::new(grammar.language(), text)?;
        let roles = query
            .capture_names()
            .iter()
            .map(|name| CaptureRole::classify(name))
            .collect();

        Ok(Self {
            query,
            roles,
            grammar: grammar.name().to_string(),
            label: label.into(),
        })
    }

    pub fn query(&self) -> &Query {
        &self.query
    }

    /// Name of the grammar this query was compiled for
    pub fn grammar(&self) -> &str {
        &self.grammar
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn role(&self, capture_index: u32) -> CaptureRole {
        self.roles
            .get(capture_index as usize)
            .copied()
            .unwrap_or(CaptureRole::Unknown)
    }
}

/// Result of checking a match before any text is read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchShape<'tree> {
    Tag {
        kind: TagKind,
        name: Node<'tree>,
        anchor: Node<'tree>,
    },
    TooFewCaptures(usize),
    MissingName,
    MissingKind,
}

impl MatchShape<'_> {
    fn problem(&self) -> Option<String> {
        match self {
            MatchShape::Tag { .. } => None,
            MatchShape::TooFewCaptures(n) => Some(format!("match has {} capture(s), need at least 2", n)),
            MatchShape::MissingName => Some("match has no name capture".to_string()),
            MatchShape::MissingKind => Some("match has no definition or reference capture".to_string()),
        }
    }
}

/// Classify the captures of one match.
///
/// The first capture of each role wins.
pub fn validate_match<'tree>(query: &CompiledQuery, captures: &[QueryCapture<'tree>]) -> MatchShape<'tree> {
    if captures.len() < 2 {
        return MatchShape::TooFewCaptures(captures.len());
    }

    let mut name = None;
    let mut tagged = None;
    for capture in captures {
        let role = query.role(capture.index);
        match role {
            CaptureRole::Name if name.is_none() => name = Some(capture.node),
            CaptureRole::Definition | CaptureRole::Reference if tagged.is_none() => {
                tagged = role.tag_kind().map(|kind| (kind, capture.node));
            }
            _ => {}
        }
    }

    match (name, tagged) {
        (Some(name), Some((kind, anchor))) => MatchShape::Tag { kind, name, anchor },
        (None, _) => MatchShape::MissingName,
        (Some(_), None) => MatchShape::MissingKind,
    }
}

/// Read the text of `node` straight from the file, bounded and cut to one line.
pub fn extract_node_text(file: &SourceFile, node: Node<'_>) -> String {
    extract_span(file, node.start_byte(), node.end_byte())
}

/// Read `start..end` from the file, keeping at most `MAX_TOKEN_SIZE - 1` bytes.
pub fn extract_span(file: &SourceFile, start: usize, end: usize) -> String {
    let size = end.saturating_sub(start).min(MAX_TOKEN_SIZE - 1);
    let mut bytes = vec![0u8; size];
    let read = file.read_at(&mut bytes, start as u64).unwrap_or(0);
    bytes.truncate(read);
    normalize_text(bytes)
}

/// Cut at the first NUL or newline and make the rest valid UTF-8.
pub fn normalize_text(mut bytes: Vec<u8>) -> String {
    if let Some(end) = bytes.iter().position(|&b| b == b'\0' || b == b'\n') {
        bytes.truncate(end);
    }

    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(e) => {
            let error = e.utf8_error();
            let mut bytes = e.into_bytes();
            if error.error_len().is_none() {
                // Character split by the size bound
                bytes.truncate(error.valid_up_to());
            }
            let mut text = String::from_utf8_lossy(&bytes).into_owned();
            truncate_at_boundary(&mut text, MAX_TOKEN_SIZE - 1);
            text
        }
    }
}

fn truncate_at_boundary(text: &mut String, max: usize) {
    if text.len() <= max {
        return;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text.truncate(end);
}

fn read_full_node(file: &SourceFile, node: Node<'_>) -> Vec<u8> {
    let mut bytes = vec![0u8; node.end_byte().saturating_sub(node.start_byte())];
    let read = file.read_at(&mut bytes, node.start_byte() as u64).unwrap_or(0);
    bytes.truncate(read);
    bytes
}

/// Counters for one query run
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MatchStats {
    pub matches: usize,
    pub emitted: usize,
    pub skipped: usize,
}

/// Executes compiled queries, reusing one query cursor.
///
/// The cursor is owned here and used by one run at a time; `run` drains
/// every match before returning, so the next run starts clean. Give each
/// thread its own interpreter.
pub struct MatchInterpreter {
    cursor: QueryCursor,
}

impl MatchInterpreter {
    pub fn new() -> Self {
        Self {
            cursor: QueryCursor::new(),
        }
    }

    /// Run `query` over the tree under `root` and emit one tag per accepted match.
    ///
    /// `grammar` is the grammar that built the tree; a query compiled for
    /// another grammar is refused with a warning.
    pub fn run<S: TagSink + ?Sized>(
        &mut self,
        query: &CompiledQuery,
        grammar: &Grammar,
        root: Node<'_>,
        file: &SourceFile,
        sink: &mut S,
    ) -> MatchStats {
        let mut stats = MatchStats::default();
        let path = file.display_path();

        if query.grammar() != grammar.name() {
            let message = format!(
                "Query {} was compiled for {}, not {} (file {})",
                query.label(),
                query.grammar(),
                grammar.name(),
                path
            );
            tracing::debug!("warning: {}", message);
            sink.warning(&message);
            return stats;
        }

        // Predicates (#eq?, #match?) see the node text through direct file reads.
        let text_provider = |node: Node<'_>| std::iter::once(read_full_node(file, node));
        let matches = self.cursor.matches(query.query(), root, text_provider);

        for query_match in matches {
            stats.matches += 1;

            let shape = validate_match(query, query_match.captures);
            let MatchShape::Tag { kind, name, anchor } = shape else {
                let problem = shape.problem().unwrap_or_default();
                let message = format!("{} (query {}, file {})", problem, query.label(), path);
                tracing::debug!("warning: {}", message);
                sink.warning(&message);
                stats.skipped += 1;
                continue;
            };

            let record = TagRecord {
                kind,
                name: extract_node_text(file, name),
                line: anchor.start_position().row as u32 + 1,
                path: path.clone(),
                snippet: extract_node_text(file, anchor),
            };
            tracing::debug!(
                "kind = {} tag = :{}: lineno: {} file {} line :{}:",
                record.kind,
                record.name,
                record.line,
                record.path,
                record.snippet
            );
            sink.put(record);
            stats.emitted += 1;
        }

        stats
    }
}

impl Default for MatchInterpreter {
    fn default() -> Self {
        Self::new()
    }
}
