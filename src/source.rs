//! Chunked byte source
//!
//! The parser pulls source bytes through a callback, asking for whatever
//! offset it needs next. Offsets are not monotonic, so every read is a
//! positional read against the open file rather than a stream.

use crate::{Error, Result};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

/// Upper bound on the bytes handed to the parser per callback.
pub const READ_CHUNK_SIZE: usize = 500;

/// An open source file, alive for exactly one extraction pass.
///
/// The handle is closed when the value is dropped, on success and on
/// every error path alike.
#[derive(Debug)]
pub struct SourceFile {
    path: PathBuf,
    file: File,
}

impl SourceFile {
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|source| Error::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path as it is handed to the sink
    pub fn display_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    /// Read up to `buf.len()` bytes starting at `offset`.
    ///
    /// Returns fewer bytes only at end of file.
    pub fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match positional_read(&self.file, &mut buf[filled..], offset + filled as u64) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }
}

#[cfg(unix)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::unix::fs::FileExt;
    file.read_at(buf, offset)
}

#[cfg(windows)]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::os::windows::fs::FileExt;
    file.seek_read(buf, offset)
}

#[cfg(not(any(unix, windows)))]
fn positional_read(file: &File, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    use std::io::{Read, Seek, SeekFrom};
    let mut handle = file;
    handle.seek(SeekFrom::Start(offset))?;
    handle.read(buf)
}

/// Fixed-capacity buffer the parser reads from.
#[derive(Debug, Clone, Copy)]
pub struct ByteWindow {
    bytes: [u8; READ_CHUNK_SIZE],
    len: usize,
}

impl ByteWindow {
    pub fn new() -> Self {
        Self {
            bytes: [0; READ_CHUNK_SIZE],
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// An empty window signals end of input to the parser
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl Default for ByteWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl AsRef<[u8]> for ByteWindow {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Serves parser read requests from a [`SourceFile`] through one reused window.
pub struct ChunkedSource<'a> {
    file: &'a SourceFile,
    window: ByteWindow,
}

impl<'a> ChunkedSource<'a> {
    pub fn new(file: &'a SourceFile) -> Self {
        Self {
            file,
            window: ByteWindow::new(),
        }
    }

    /// Fill the window with the bytes at `offset`.
    ///
    /// Read errors are not surfaced: the window comes back empty and the
    /// parser treats it as end of input.
    pub fn read_chunk(&mut self, offset: usize) -> &ByteWindow {
        self.window.len = match self.file.read_at(&mut self.window.bytes, offset as u64) {
            Ok(n) => n,
            Err(e) => {
                tracing::debug!(
                    "read of {} at offset {} failed: {}",
                    self.file.path().display(),
                    offset,
                    e
                );
                0
            }
        };
        &self.window
    }
}
