//! sitter-tags CLI - print the tags of source files

use clap::{Parser, Subcommand};
use sitter_tags::config::{self, ProviderKind};
use sitter_tags::grammar::known_extensions;
use sitter_tags::output::{OutputFormat, WriterSink};
use sitter_tags::{ExtractorConfig, QueryLayout, TagExtractor, TagSink};
use std::path::{Path, PathBuf};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "sitter-tags")]
#[command(version)]
#[command(about = "Extract definition and reference tags with Tree-sitter queries")]
#[command(long_about = r#"
sitter-tags parses source files with Tree-sitter grammars and runs
per-language tag queries over them, printing one line per definition or
reference.

Grammars are loaded from $GTAGS_TREE_SITTER_LANG_PATH
(libtree-sitter-<lang>.so) unless --static is given. Queries are read from
$GTAGS_TREE_SITTER_QUERY_PATH/<lang>/{tags,ref}.scm.

Example usage:
  sitter-tags tags src/main.c
  sitter-tags tags --static --query-path ./queries --format json src/
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tags of files and directories
    Tags {
        /// Files or directories to tag
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory holding grammar modules
        #[arg(long)]
        lang_path: Option<PathBuf>,

        /// Root directory of the query files
        #[arg(long)]
        query_path: Option<PathBuf>,

        /// Query file layout (split, combined)
        #[arg(long)]
        layout: Option<QueryLayout>,

        /// Use the grammars compiled into this binary
        #[arg(long = "static")]
        static_grammars: bool,

        /// Keep grammar modules loaded across files
        #[arg(long)]
        cache_grammars: bool,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List recognized file extensions
    Languages,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match cli.command {
        Commands::Tags {
            paths,
            lang_path,
            query_path,
            layout,
            static_grammars,
            cache_grammars,
            format,
        } => {
            let mut settings = ExtractorConfig::from_env();
            if let Some(file) = config::load_config(cli.config.as_deref())? {
                settings = settings.with_file(&file);
            }
            if lang_path.is_some() {
                settings.lang_path = lang_path;
            }
            if query_path.is_some() {
                settings.query_path = query_path;
            }
            if let Some(layout) = layout {
                settings.layout = layout;
            }
            if static_grammars {
                settings.provider = ProviderKind::Static;
            }
            settings.cache_grammars |= cache_grammars;

            let mut extractor = TagExtractor::from_config(&settings)?;
            let stdout = std::io::stdout();
            let mut sink = WriterSink::new(stdout.lock(), format);

            let mut files = 0;
            for path in &paths {
                for file in expand_path(path, &mut sink) {
                    extractor.extract_file(&file, &mut sink)?;
                    if let Some(e) = sink.take_error() {
                        return Err(e.into());
                    }
                    files += 1;
                }
            }

            tracing::info!(
                "Tagged {} file(s): {} tag(s), {} warning(s)",
                files,
                sink.tags(),
                sink.warnings()
            );
            sink.finish()?;
        }

        Commands::Languages => {
            for (extension, language) in known_extensions() {
                println!(".{}\t{}", extension, language);
            }
        }
    }

    Ok(())
}

/// Files named on the command line are taken as-is; directories are
/// walked (honoring ignore files) for files of a recognized type.
fn expand_path(path: &Path, sink: &mut impl TagSink) -> Vec<PathBuf> {
    if !path.is_dir() {
        return vec![path.to_path_buf()];
    }

    ignore::WalkBuilder::new(path)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                sink.warning(&format!("Skipping unreadable entry: {}", e));
                None
            }
        })
        .filter(|entry| entry.file_type().is_some_and(|t| t.is_file()))
        .map(|entry| entry.into_path())
        .filter(|file| sitter_tags::grammar::resolve_language(file).is_some())
        .collect()
}
