//! End-to-end extraction with the shipped query files and bundled grammars.

use sitter_tags::config::ProviderKind;
use sitter_tags::grammar::{GrammarProvider, StaticGrammarProvider};
use sitter_tags::interpreter::{CompiledQuery, MAX_TOKEN_SIZE};
use sitter_tags::{CollectingSink, Error, ExtractorConfig, QueryLayout, QueryPurpose, TagExtractor, TagKind};
use std::path::{Path, PathBuf};

fn shipped_queries() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("queries")
}

fn extractor() -> TagExtractor {
    let config = ExtractorConfig {
        query_path: Some(shipped_queries()),
        provider: ProviderKind::Static,
        ..ExtractorConfig::default()
    };
    TagExtractor::from_config(&config).unwrap()
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

#[test]
fn shipped_queries_compile() {
    let mut grammars = StaticGrammarProvider::builtin();
    let resolver = ExtractorConfig {
        query_path: Some(shipped_queries()),
        ..ExtractorConfig::default()
    }
    .query_resolver();

    for language in ["c", "python", "javascript", "rust", "go"] {
        let grammar = grammars.load(language).unwrap();
        for purpose in [QueryPurpose::Definitions, QueryPurpose::References] {
            let text = resolver
                .load_query(language, purpose)
                .unwrap_or_else(|| panic!("no {} query for {}", purpose, language));
            if let Err(e) = CompiledQuery::compile(&grammar, &text, language) {
                panic!("{} {} query does not compile: {}", language, purpose, e);
            }
        }
    }
}

#[test]
fn c_function_on_line_five() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "foo.c",
        "#include <stdlib.h>\n\n/* math */\n\nint add(int a, int b) { return a+b; }\n",
    );

    let mut sink = CollectingSink::new();
    extractor().extract_file(&path, &mut sink).unwrap();

    assert_eq!(sink.records.len(), 1);
    let tag = &sink.records[0];
    assert_eq!(tag.kind, TagKind::Definition);
    assert_eq!(tag.name, "add");
    assert_eq!(tag.line, 5);
    assert_eq!(tag.path, path.to_string_lossy());
    assert_eq!(tag.snippet, "int add(int a, int b) { return a+b; }");
    assert!(sink.warnings.is_empty());
}

#[test]
fn snippets_stay_on_one_line() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "shapes.c",
        "struct point {\n  int x;\n  int y;\n};\n\n\
         #define SQUARE(v) ((v) * (v))\n\n\
         static int\n\
         area(struct point *p)\n\
         {\n\
         \treturn SQUARE(p->x) + helper(p,\n\
         \t\t1);\n\
         }\n",
    );

    let mut sink = CollectingSink::new();
    extractor().extract_file(&path, &mut sink).unwrap();

    assert!(!sink.records.is_empty());
    for tag in &sink.records {
        assert!(!tag.snippet.contains('\n'), "{:?}", tag);
        assert!(!tag.name.contains('\n'), "{:?}", tag);
        assert!(tag.snippet.len() < MAX_TOKEN_SIZE);
    }

    let point = sink.definitions().find(|t| t.name == "point").expect("struct");
    assert_eq!((point.line, point.snippet.as_str()), (1, "struct point {"));

    let area = sink.definitions().find(|t| t.name == "area").expect("function");
    assert_eq!((area.line, area.snippet.as_str()), (8, "static int"));

    let helper = sink.references().find(|t| t.name == "helper").expect("call");
    assert_eq!((helper.line, helper.snippet.as_str()), (11, "helper(p,"));
}

#[test]
fn python_definitions_and_calls() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "greet.py",
        "def hello(name):\n    return name\n\nclass Greeter:\n    def greet(self):\n        return hello(self.name)\n",
    );

    let mut sink = CollectingSink::new();
    extractor().extract_file(&path, &mut sink).unwrap();

    let defs: Vec<(&str, u32)> = sink.definitions().map(|t| (t.name.as_str(), t.line)).collect();
    assert_eq!(defs, vec![("hello", 1), ("Greeter", 4), ("greet", 5)]);

    let refs: Vec<(&str, u32)> = sink.references().map(|t| (t.name.as_str(), t.line)).collect();
    assert_eq!(refs, vec![("hello", 6)]);
}

#[test]
fn rerunning_is_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(
        dir.path(),
        "lib.rs",
        "mod util;\n\nfn main() {\n    let v = build();\n    println!(\"{}\", v);\n}\n\nfn build() -> u32 { util::seed() }\n",
    );

    let mut tagger = extractor();
    let mut first = CollectingSink::new();
    let mut second = CollectingSink::new();
    tagger.extract_file(&path, &mut first).unwrap();
    tagger.extract_file(&path, &mut second).unwrap();

    assert!(!first.records.is_empty());
    assert_eq!(first.records, second.records);
}

#[test]
fn unrecognized_file_is_skipped_with_one_warning() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "README.md", "# int add(int a, int b);\n");

    let mut sink = CollectingSink::new();
    extractor().extract_file(&path, &mut sink).unwrap();

    assert!(sink.records.is_empty());
    assert_eq!(sink.warnings.len(), 1);
}

#[test]
fn nonexistent_query_root_is_fatal_for_every_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = ExtractorConfig {
        query_path: Some(dir.path().join("missing")),
        provider: ProviderKind::Static,
        layout: QueryLayout::Split,
        ..ExtractorConfig::default()
    };
    let mut tagger = TagExtractor::from_config(&config).unwrap();

    for (name, text) in [("a.c", "int a(void) { return 0; }\n"), ("b.go", "package b\nfunc B() {}\n")] {
        let path = write(dir.path(), name, text);
        let mut sink = CollectingSink::new();
        let err = tagger.extract_file(&path, &mut sink).unwrap_err();

        assert!(matches!(err, Error::QueryMissing { .. }));
        assert!(sink.records.is_empty());
    }
}
