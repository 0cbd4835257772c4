//! Grammar resolution
//!
//! Maps a file name to a language id, then a language id to a Tree-sitter
//! grammar. Grammars come from a [`GrammarProvider`], chosen when the
//! extractor is configured:
//! - [`DynamicGrammarProvider`] loads `libtree-sitter-<id>.<ext>` from a
//!   search directory and calls its `tree_sitter_<id>` entry point
//! - [`StaticGrammarProvider`] hands out grammars compiled into the binary

use crate::{Error, Result};
use libloading::{Library, Symbol};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tree_sitter::Language;
use tree_sitter::ffi::TSLanguage;

/// Engine name used in module file names and entry point symbols.
pub const ENGINE_NAME: &str = "tree-sitter";

/// File extension to language id.
const EXTENSIONS: &[(&str, &str)] = &[
    ("c", "c"),
    ("h", "c"),
    ("py", "python"),
    ("pyi", "python"),
    ("js", "javascript"),
    ("jsx", "javascript"),
    ("mjs", "javascript"),
    ("cjs", "javascript"),
    ("rs", "rust"),
    ("go", "go"),
];

/// Guess the language of a file from its extension.
pub fn resolve_language(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?;
    EXTENSIONS
        .iter()
        .find(|(known, _)| *known == ext)
        .map(|(_, language)| *language)
}

/// All recognized `(extension, language id)` pairs
pub fn known_extensions() -> &'static [(&'static str, &'static str)] {
    EXTENSIONS
}

/// `libtree-sitter-<id>.<platform extension>`
pub fn module_file_name(language_id: &str) -> String {
    format!(
        "lib{}-{}.{}",
        ENGINE_NAME,
        language_id,
        std::env::consts::DLL_EXTENSION
    )
}

/// `tree_sitter_<id>`
pub fn entry_symbol(language_id: &str) -> String {
    format!("{}_{}", ENGINE_NAME.replace('-', "_"), language_id)
}

/// A grammar ready to build parsers and compile queries.
///
/// Runtime-loaded grammars keep their module alive for as long as any
/// clone exists.
#[derive(Clone)]
pub struct Grammar {
    name: String,
    // Declared before `module` so it is dropped while the module is loaded.
    language: Language,
    module: Option<Arc<Library>>,
}

impl Grammar {
    pub fn new(name: impl Into<String>, language: Language) -> Self {
        Self {
            name: name.into(),
            language,
            module: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Whether this grammar came from a runtime-loaded module
    pub fn is_dynamic(&self) -> bool {
        self.module.is_some()
    }
}

impl std::fmt::Debug for Grammar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Grammar")
            .field("name", &self.name)
            .field("dynamic", &self.is_dynamic())
            .finish()
    }
}

/// Constructs the grammar for a language id.
///
/// Failures are configuration errors and end the invocation.
pub trait GrammarProvider {
    fn load(&mut self, language_id: &str) -> Result<Grammar>;
}

type LanguageEntry = unsafe extern "C" fn() -> *const TSLanguage;

/// Loads grammar modules from a directory at runtime.
pub struct DynamicGrammarProvider {
    search_path: PathBuf,
    cache: Option<HashMap<String, Grammar>>,
}

impl DynamicGrammarProvider {
    /// Provider that loads a fresh module for every request
    pub fn new(search_path: impl Into<PathBuf>) -> Self {
        Self {
            search_path: search_path.into(),
            cache: None,
        }
    }

    /// Keep one module per language for the provider's lifetime
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(HashMap::new);
        self
    }

    pub fn search_path(&self) -> &Path {
        &self.search_path
    }

    pub fn module_path(&self, language_id: &str) -> PathBuf {
        self.search_path.join(module_file_name(language_id))
    }

    fn open(&self, language_id: &str) -> Result<Grammar> {
        let path = self.module_path(language_id);
        let symbol = entry_symbol(language_id);

        let library = unsafe { Library::new(&path) }.map_err(|e| Error::GrammarLoad {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        let raw = {
            let entry: Symbol<LanguageEntry> =
                unsafe { library.get(symbol.as_bytes()) }.map_err(|_| Error::MissingSymbol {
                    path: path.clone(),
                    symbol: symbol.clone(),
                })?;
            unsafe { entry() }
        };
        if raw.is_null() {
            return Err(Error::GrammarLoad {
                path,
                reason: format!("{} returned a null language", symbol),
            });
        }

        // The pointer refers to static data inside `library`, which the
        // returned grammar keeps loaded.
        let language = unsafe { Language::from_raw(raw) };
        tracing::debug!("Loaded grammar {} from {}", language_id, path.display());

        Ok(Grammar {
            name: language_id.to_string(),
            language,
            module: Some(Arc::new(library)),
        })
    }
}

impl GrammarProvider for DynamicGrammarProvider {
    fn load(&mut self, language_id: &str) -> Result<Grammar> {
        if let Some(grammar) = self.cache.as_ref().and_then(|c| c.get(language_id)) {
            return Ok(grammar.clone());
        }

        let grammar = self.open(language_id)?;
        if let Some(cache) = self.cache.as_mut() {
            cache.insert(language_id.to_string(), grammar.clone());
        }
        Ok(grammar)
    }
}

/// Registry of grammars linked into the binary.
#[derive(Default)]
pub struct StaticGrammarProvider {
    languages: HashMap<String, Language>,
}

impl StaticGrammarProvider {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every bundled grammar
    pub fn builtin() -> Self {
        let mut provider = Self::new();
        provider.register("c", tree_sitter_c::LANGUAGE.into());
        provider.register("python", tree_sitter_python::LANGUAGE.into());
        provider.register("javascript", tree_sitter_javascript::LANGUAGE.into());
        provider.register("rust", tree_sitter_rust::LANGUAGE.into());
        provider.register("go", tree_sitter_go::LANGUAGE.into());
        provider
    }

    pub fn register(&mut self, language_id: impl Into<String>, language: Language) {
        self.languages.insert(language_id.into(), language);
    }

    /// Registered language ids, sorted
    pub fn language_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.languages.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}

impl GrammarProvider for StaticGrammarProvider {
    fn load(&mut self, language_id: &str) -> Result<Grammar> {
        self.languages
            .get(language_id)
            .map(|language| Grammar::new(language_id, language.clone()))
            .ok_or_else(|| Error::Config(format!("no compiled-in grammar for {}", language_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_language() {
        assert_eq!(resolve_language(Path::new("foo.c")), Some("c"));
        assert_eq!(resolve_language(Path::new("include/foo.h")), Some("c"));
        assert_eq!(resolve_language(Path::new("app.mjs")), Some("javascript"));
        assert_eq!(resolve_language(Path::new("lib.rs")), Some("rust"));
    }

    #[test]
    fn test_unrecognized_extensions() {
        assert_eq!(resolve_language(Path::new("README.md")), None);
        assert_eq!(resolve_language(Path::new("Makefile")), None);
        // A ".c" inside the name is not an extension.
        assert_eq!(resolve_language(Path::new("notes.cfg")), None);
        assert_eq!(resolve_language(Path::new("archive.c.txt")), None);
    }

    #[test]
    fn test_module_naming_convention() {
        let name = module_file_name("c");
        assert!(name.starts_with("libtree-sitter-c."));
        assert!(name.ends_with(std::env::consts::DLL_EXTENSION));
        assert_eq!(entry_symbol("c"), "tree_sitter_c");
        assert_eq!(entry_symbol("python"), "tree_sitter_python");

        let provider = DynamicGrammarProvider::new("/opt/grammars");
        assert_eq!(
            provider.module_path("go"),
            Path::new("/opt/grammars").join(module_file_name("go"))
        );
    }

    #[test]
    fn test_missing_module_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let mut provider = DynamicGrammarProvider::new(dir.path());

        let err = provider.load("c").unwrap_err();
        assert!(matches!(err, Error::GrammarLoad { .. }));
        assert!(err.to_string().contains("libtree-sitter-c"));
    }

    #[test]
    fn test_non_library_module_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(module_file_name("c")), b"not a shared object").unwrap();
        let mut provider = DynamicGrammarProvider::new(dir.path()).with_cache(true);

        assert!(matches!(provider.load("c"), Err(Error::GrammarLoad { .. })));
    }

    /// A shared object mapped into this process that is safe to load twice
    #[cfg(target_os = "linux")]
    fn loaded_shared_object() -> Option<PathBuf> {
        let maps = std::fs::read_to_string("/proc/self/maps").ok()?;
        let mut candidates: Vec<PathBuf> = maps
            .lines()
            .filter_map(|line| line.split_whitespace().nth(5))
            .filter(|path| path.starts_with('/') && path.contains(".so"))
            .filter(|path| !path.contains("/libc.so") && !path.contains("/ld-"))
            .map(PathBuf::from)
            .collect();
        candidates.sort_by_key(|path| !path.to_string_lossy().contains("libgcc_s"));
        candidates.into_iter().next()
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn test_module_without_entry_point_is_fatal() {
        let Some(object) = loaded_shared_object() else {
            eprintln!("no shared object mapped into the test process, skipping");
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        std::fs::copy(&object, dir.path().join(module_file_name("c"))).unwrap();
        let mut provider = DynamicGrammarProvider::new(dir.path());

        let err = provider.load("c").unwrap_err();
        assert!(matches!(err, Error::MissingSymbol { ref symbol, .. } if symbol == "tree_sitter_c"));
        assert!(err.to_string().contains("Cannot lookup function tree_sitter_c"));
    }

    #[test]
    fn test_static_provider() {
        let mut provider = StaticGrammarProvider::builtin();
        assert_eq!(provider.language_ids(), vec!["c", "go", "javascript", "python", "rust"]);

        let grammar = provider.load("c").expect("c is bundled");
        assert_eq!(grammar.name(), "c");
        assert!(!grammar.is_dynamic());

        assert!(matches!(provider.load("cobol"), Err(Error::Config(_))));
    }

    #[test]
    fn test_every_extension_has_a_builtin_grammar() {
        let mut provider = StaticGrammarProvider::builtin();
        for (_, language) in known_extensions() {
            assert!(provider.load(language).is_ok(), "no grammar for {}", language);
        }
    }
}
