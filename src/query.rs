//! Query resolution
//!
//! Query files live under a configured root, one directory per language:
//!
//! ```text
//! <root>/<language>/tags.scm   definitions (or everything, combined layout)
//! <root>/<language>/ref.scm    references
//! ```
//!
//! Only the capture names inside these files carry meaning for the
//! extractor; the pattern text itself is opaque here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What a query is run for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryPurpose {
    Definitions,
    References,
    /// One query producing both kinds
    Combined,
}

impl QueryPurpose {
    /// File stem of the query file for this purpose
    pub fn file_stem(&self) -> &'static str {
        match self {
            QueryPurpose::Definitions | QueryPurpose::Combined => "tags",
            QueryPurpose::References => "ref",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            QueryPurpose::Definitions => "definitions",
            QueryPurpose::References => "references",
            QueryPurpose::Combined => "tags",
        }
    }
}

impl std::fmt::Display for QueryPurpose {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a language's query files are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryLayout {
    /// `tags.scm` for definitions and `ref.scm` for references
    #[default]
    Split,
    /// A single `tags.scm` holding both
    Combined,
}

impl QueryLayout {
    /// Passes run over every file, in order
    pub fn purposes(&self) -> &'static [QueryPurpose] {
        match self {
            QueryLayout::Split => &[QueryPurpose::Definitions, QueryPurpose::References],
            QueryLayout::Combined => &[QueryPurpose::Combined],
        }
    }
}

impl std::str::FromStr for QueryLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "split" => Ok(QueryLayout::Split),
            "combined" => Ok(QueryLayout::Combined),
            _ => Err(format!("unknown query layout: {}", s)),
        }
    }
}

/// Finds query text for a language and purpose.
#[derive(Debug, Clone)]
pub struct QueryResolver {
    root: Option<PathBuf>,
    layout: QueryLayout,
}

impl QueryResolver {
    pub fn new(root: Option<PathBuf>, layout: QueryLayout) -> Self {
        Self { root, layout }
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn layout(&self) -> QueryLayout {
        self.layout
    }

    /// `<root>/<language>/<stem>.scm`, if a root is configured
    pub fn query_path(&self, language_id: &str, purpose: QueryPurpose) -> Option<PathBuf> {
        let root = self.root.as_ref()?;
        Some(root.join(language_id).join(format!("{}.scm", purpose.file_stem())))
    }

    /// Read the query text.
    ///
    /// `None` when no root is configured or the file cannot be read; the
    /// caller decides how severe that is.
    pub fn load_query(&self, language_id: &str, purpose: QueryPurpose) -> Option<String> {
        let path = self.query_path(language_id, purpose)?;
        match std::fs::read_to_string(&path) {
            Ok(text) => Some(text),
            Err(e) => {
                tracing::debug!("Cannot read query {}: {}", path.display(), e);
                None
            }
        }
    }
}
