//! # sitter-tags - Tree-sitter tag extraction for code indexers
//!
//! Given a source file, finds definitions and references with
//! Tree-sitter pattern queries and hands `(kind, name, line, file, snippet)`
//! records to a host-supplied sink.
//!
//! Sitter-tags provides:
//! - A chunked, offset-addressed byte source that feeds the parser
//! - Grammar providers: runtime-loaded modules or compiled-in grammars
//! - Per-language query files resolved from a configured directory
//! - A match interpreter that classifies captures by role name
//! - A host entry point with the version marker and fatal-error routing

pub mod source;
pub mod grammar;
pub mod query;
pub mod parse;
pub mod interpreter;
pub mod sink;
pub mod extractor;
pub mod config;
pub mod output;

// Re-exports for convenient access
pub use config::ExtractorConfig;
pub use extractor::{ParserParam, TagExtractor, parser};
pub use grammar::{DynamicGrammarProvider, Grammar, GrammarProvider, StaticGrammarProvider};
pub use query::{QueryLayout, QueryPurpose, QueryResolver};
pub use sink::{CollectingSink, HostCallbacks, TagKind, TagRecord, TagSink};

use std::path::PathBuf;

/// Result type alias for sitter-tags operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for sitter-tags operations.
///
/// Everything here ends the current invocation. Skippable conditions
/// (unknown file type, bad query text, malformed matches) are reported as
/// warnings through the sink instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot load lib {}: {reason}", path.display())]
    GrammarLoad { path: PathBuf, reason: String },

    #[error("Cannot lookup function {symbol} in lib {}", path.display())]
    MissingSymbol { path: PathBuf, symbol: String },

    #[error("Grammar {language} is incompatible with this parser: {reason}")]
    LanguageVersion { language: String, reason: String },

    #[error("Failed to fetch {purpose} query for {language} from query directory")]
    QueryMissing { language: String, purpose: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Parameter block mismatch: expected {expected}, got {actual}")]
    AbiMismatch { expected: String, actual: String },

    #[error("Cannot open file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
