//! Parse engine
//!
//! Drives a grammar over a [`ChunkedSource`]. Every parse starts from an
//! empty previous tree; malformed input still produces a tree, with error
//! nodes where the grammar could not make sense of the text.

use crate::grammar::Grammar;
use crate::source::{ChunkedSource, SourceFile};
use crate::{Error, Result};
use tree_sitter::{Parser, Point, Tree};

/// Parse a whole file into a syntax tree.
pub fn parse_source(grammar: &Grammar, file: &SourceFile) -> Result<Tree> {
    let mut parser = Parser::new();
    parser
        .set_language(grammar.language())
        .map_err(|e| Error::LanguageVersion {
            language: grammar.name().to_string(),
            reason: e.to_string(),
        })?;

    let mut source = ChunkedSource::new(file);
    let mut read = |offset: usize, _position: Point| *source.read_chunk(offset);

    parser
        .parse_with(&mut read, None)
        .ok_or_else(|| Error::Parse(format!("no tree produced for {}", file.path().display())))
}
