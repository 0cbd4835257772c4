//! Extractor configuration
//!
//! Settings come from three places, strongest first: command-line flags
//! (applied by the binary), environment variables, and an optional
//! `sitter-tags.toml`.

use crate::grammar::{DynamicGrammarProvider, GrammarProvider, StaticGrammarProvider};
use crate::query::{QueryLayout, QueryResolver};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding `libtree-sitter-<lang>` modules
pub const LANG_PATH_ENV: &str = "GTAGS_TREE_SITTER_LANG_PATH";
/// Root of the per-language query directories
pub const QUERY_PATH_ENV: &str = "GTAGS_TREE_SITTER_QUERY_PATH";

/// Where grammars come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Shared modules from the grammar search path
    #[default]
    Dynamic,
    /// Grammars compiled into this binary
    Static,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractorConfig {
    pub lang_path: Option<PathBuf>,
    pub query_path: Option<PathBuf>,
    pub layout: QueryLayout,
    pub provider: ProviderKind,
    pub cache_grammars: bool,
}

impl ExtractorConfig {
    /// Read the search paths from the environment. Empty values count as unset.
    pub fn from_env() -> Self {
        Self {
            lang_path: env_path(LANG_PATH_ENV),
            query_path: env_path(QUERY_PATH_ENV),
            ..Self::default()
        }
    }

    /// Fill anything still unset from a config file
    pub fn with_file(mut self, file: &FileConfig) -> Self {
        if self.lang_path.is_none() {
            self.lang_path = file.lang_path.as_ref().map(PathBuf::from);
        }
        if self.query_path.is_none() {
            self.query_path = file.query_path.as_ref().map(PathBuf::from);
        }
        if let Some(layout) = file.layout {
            self.layout = layout;
        }
        if let Some(provider) = file.provider {
            self.provider = provider;
        }
        if let Some(cache) = file.cache_grammars {
            self.cache_grammars = cache;
        }
        self
    }

    /// Build the configured grammar provider.
    ///
    /// The dynamic provider cannot work without a search path, which is a
    /// fatal configuration error.
    pub fn grammar_provider(&self) -> Result<Box<dyn GrammarProvider>> {
        match self.provider {
            ProviderKind::Static => Ok(Box::new(StaticGrammarProvider::builtin())),
            ProviderKind::Dynamic => {
                let path = self.lang_path.as_ref().ok_or_else(|| {
                    Error::Config(format!(
                        "lib path for tree-sitter grammar files not exported ({})",
                        LANG_PATH_ENV
                    ))
                })?;
                Ok(Box::new(
                    DynamicGrammarProvider::new(path).with_cache(self.cache_grammars),
                ))
            }
        }
    }

    pub fn query_resolver(&self) -> QueryResolver {
        QueryResolver::new(self.query_path.clone(), self.layout)
    }
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var_os(name)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
}

/// On-disk configuration file
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct FileConfig {
    pub lang_path: Option<String>,
    pub query_path: Option<String>,
    pub layout: Option<QueryLayout>,
    pub provider: Option<ProviderKind>,
    pub cache_grammars: Option<bool>,
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("sitter-tags.toml")
}

pub fn load_config(path: Option<&Path>) -> anyhow::Result<Option<FileConfig>> {
    let path = path.map(Path::to_path_buf).unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: FileConfig = toml::from_str(&contents)?;
    Ok(Some(config))
}
