//! Per-file extraction pass
//!
//! One pass over one file:
//! resolve language → fetch queries → load grammar → open and parse →
//! for each query: compile, run, emit.
//!
//! Everything acquired during a pass (file handle, grammar module, tree,
//! compiled queries) is owned by locals and released when the pass ends,
//! whichever way it ends.

use crate::config::ExtractorConfig;
use crate::grammar::{GrammarProvider, resolve_language};
use crate::interpreter::{CompiledQuery, MatchInterpreter};
use crate::parse::parse_source;
use crate::query::{QueryPurpose, QueryResolver};
use crate::sink::{HostCallbacks, TagSink};
use crate::source::SourceFile;
use crate::{Error, Result};
use std::path::Path;

/// What happened to one file
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct FileSummary {
    /// `None` when the file type was not recognized
    pub language: Option<&'static str>,
    pub emitted: usize,
    pub skipped_matches: usize,
    /// Queries abandoned because they did not compile
    pub failed_queries: usize,
}

pub struct TagExtractor {
    grammars: Box<dyn GrammarProvider>,
    queries: QueryResolver,
    interpreter: MatchInterpreter,
}

impl TagExtractor {
    pub fn new(grammars: Box<dyn GrammarProvider>, queries: QueryResolver) -> Self {
        Self {
            grammars,
            queries,
            interpreter: MatchInterpreter::new(),
        }
    }

    /// Fails when the configuration cannot produce a grammar provider
    pub fn from_config(config: &ExtractorConfig) -> Result<Self> {
        Ok(Self::new(config.grammar_provider()?, config.query_resolver()))
    }

    /// Extract every tag from `path` into `sink`.
    ///
    /// Unrecognized files, queries that fail to compile and malformed
    /// matches are warnings. An `Err` is fatal for the invocation; all query
    /// texts are fetched before anything is emitted, so a missing query
    /// leaves no partial output for the file.
    pub fn extract_file<S: TagSink + ?Sized>(&mut self, path: &Path, sink: &mut S) -> Result<FileSummary> {
        let Some(language) = resolve_language(path) else {
            let message = format!("Language not identified for file {}", path.display());
            tracing::debug!("warning: {}", message);
            sink.warning(&message);
            return Ok(FileSummary::default());
        };

        let mut queries = Vec::new();
        for &purpose in self.queries.layout().purposes() {
            let text = self
                .queries
                .load_query(language, purpose)
                .ok_or_else(|| Error::QueryMissing {
                    language: language.to_string(),
                    purpose: purpose.to_string(),
                })?;
            queries.push((purpose, text));
        }

        let grammar = self.grammars.load(language)?;
        let file = SourceFile::open(path)?;
        let tree = parse_source(&grammar, &file)?;
        let root = tree.root_node();

        let mut summary = FileSummary {
            language: Some(language),
            ..FileSummary::default()
        };

        for (purpose, text) in &queries {
            let label = self.query_label(language, *purpose);
            let query = match CompiledQuery::compile(&grammar, text, label.as_str()) {
                Ok(query) => query,
                Err(e) => {
                    let offending = text.lines().nth(e.row).unwrap_or(text.as_str()).trim();
                    let message = format!(
                        "Failed to create a query from {}: {:?} error at offset {} ({}) in: {}",
                        label,
                        e.kind,
                        e.offset,
                        e.message,
                        offending
                    );
                    tracing::debug!("warning: {}", message);
                    sink.warning(&message);
                    summary.failed_queries += 1;
                    continue;
                }
            };

            let stats = self.interpreter.run(&query, &grammar, root, &file, sink);
            summary.emitted += stats.emitted;
            summary.skipped_matches += stats.skipped;
        }

        tracing::debug!(
            "{}: {} tag(s), {} skipped match(es)",
            file.path().display(),
            summary.emitted,
            summary.skipped_matches
        );
        Ok(summary)
    }

    fn query_label(&self, language: &str, purpose: QueryPurpose) -> String {
        self.queries
            .query_path(language, purpose)
            .map(|path| path.display().to_string())
            .unwrap_or_else(|| format!("{}/{}", language, purpose.file_stem()))
    }
}

/// Version of the [`ParserParam`] layout this crate understands.
pub const PARSER_PARAM_VERSION: u32 = 1;

/// Parameter block handed over by the host for one file.
pub struct ParserParam<'a> {
    /// Size of the block as the host built it
    pub size: usize,
    pub version: u32,
    pub file: &'a Path,
    pub host: &'a mut dyn HostCallbacks,
}

impl<'a> ParserParam<'a> {
    pub fn new(file: &'a Path, host: &'a mut dyn HostCallbacks) -> Self {
        Self {
            size: std::mem::size_of::<ParserParam<'static>>(),
            version: PARSER_PARAM_VERSION,
            file,
            host,
        }
    }

    /// Check the size/version marker before trusting anything else
    pub fn validate(&self) -> Result<()> {
        let expected_size = std::mem::size_of::<ParserParam<'static>>();
        if self.version != PARSER_PARAM_VERSION || self.size < expected_size {
            return Err(Error::AbiMismatch {
                expected: format!("version {}, size >= {}", PARSER_PARAM_VERSION, expected_size),
                actual: format!("version {}, size {}", self.version, self.size),
            });
        }
        Ok(())
    }
}

/// Host entry point: tag one file with configuration from the environment.
///
/// Fatal errors go to `host.die`, which does not return.
pub fn parser(param: ParserParam<'_>) {
    parser_with_config(param, &ExtractorConfig::from_env());
}

/// [`parser`] with an explicit configuration
pub fn parser_with_config(param: ParserParam<'_>, config: &ExtractorConfig) {
    let checked = param.validate();
    let ParserParam { file, host, .. } = param;

    let result = checked
        .and_then(|()| TagExtractor::from_config(config))
        .and_then(|mut extractor| extractor.extract_file(file, &mut *host));
    if let Err(e) = result {
        tracing::error!("{}", e);
        host.die(&e.to_string());
    }
}
