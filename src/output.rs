//! Writers used by the command-line host

use crate::sink::{TagRecord, TagSink};
use std::io::{self, Write};
use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// `SITTER_TAGS_QUIET=1` silences warnings on stderr
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("SITTER_TAGS_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `D|R <name> <line> <path> <snippet>`, tab separated
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("unknown output format: {}", s)),
        }
    }
}

/// Streams tags to a writer as they arrive.
///
/// Write failures are kept and reported by [`WriterSink::finish`] since
/// `put` cannot fail.
pub struct WriterSink<W: Write> {
    out: W,
    format: OutputFormat,
    tags: usize,
    warnings: usize,
    error: Option<io::Error>,
}

impl<W: Write> WriterSink<W> {
    pub fn new(out: W, format: OutputFormat) -> Self {
        Self {
            out,
            format,
            tags: 0,
            warnings: 0,
            error: None,
        }
    }

    pub fn tags(&self) -> usize {
        self.tags
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    /// First write error, if any
    pub fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }

    /// Flush and hand back the writer
    pub fn finish(mut self) -> io::Result<W> {
        if let Some(e) = self.error.take() {
            return Err(e);
        }
        self.out.flush()?;
        Ok(self.out)
    }

    fn write_record(&mut self, record: &TagRecord) -> io::Result<()> {
        match self.format {
            OutputFormat::Text => writeln!(
                self.out,
                "{}\t{}\t{}\t{}\t{}",
                record.kind.marker(),
                record.name,
                record.line,
                record.path,
                record.snippet
            ),
            OutputFormat::Json => {
                serde_json::to_writer(&mut self.out, record)?;
                writeln!(self.out)
            }
        }
    }
}

impl<W: Write> TagSink for WriterSink<W> {
    fn put(&mut self, record: TagRecord) {
        if self.error.is_some() {
            return;
        }
        match self.write_record(&record) {
            Ok(()) => self.tags += 1,
            Err(e) => self.error = Some(e),
        }
    }

    fn warning(&mut self, message: &str) {
        self.warnings += 1;
        if !is_quiet() {
            eprintln!("warning: {}", message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::TagKind;

    fn record() -> TagRecord {
        TagRecord {
            kind: TagKind::Definition,
            name: "add".to_string(),
            line: 5,
            path: "foo.c".to_string(),
            snippet: "int add(int a, int b) { return a+b; }".to_string(),
        }
    }

    #[test]
    fn test_text_output() {
        let mut sink = WriterSink::new(Vec::new(), OutputFormat::Text);
        sink.put(record());
        assert_eq!(sink.tags(), 1);

        let out = String::from_utf8(sink.finish().unwrap()).unwrap();
        assert_eq!(out, "D\tadd\t5\tfoo.c\tint add(int a, int b) { return a+b; }\n");
    }

    #[test]
    fn test_json_output() {
        let mut sink = WriterSink::new(Vec::new(), OutputFormat::Json);
        sink.put(record());

        let out = sink.finish().unwrap();
        let parsed: TagRecord = serde_json::from_slice(&out).unwrap();
        assert_eq!(parsed, record());
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert!("yaml".parse::<OutputFormat>().is_err());
    }
}
