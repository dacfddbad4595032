use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Buffered line writer with block-sized flushes. Lines accumulate in
/// memory and hit the disk once `block_size` of them are pending, or on an
/// explicit `flush()`. The header truncates the file; everything after it
/// appends.
pub struct BlockWriter {
    path: PathBuf,
    block_size: usize,
    lines: Vec<String>,
    flushes: u64,
    appending: bool,
}

impl BlockWriter {
    pub fn new(path: impl Into<PathBuf>, block_size: usize) -> Self {
        Self {
            path: path.into(),
            block_size: block_size.max(1),
            lines: Vec::new(),
            flushes: 0,
            appending: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Pending lines not yet on disk
    pub fn buffered(&self) -> usize {
        self.lines.len()
    }

    /// Completed data flushes (the header does not count)
    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    /// Truncate the file and write the header block. Later flushes append.
    pub fn write_header(&mut self, header: &[String]) -> Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .with_context(|| format!("creating {}", self.path.display()))?;
        for line in header {
            writeln!(file, "{}", line)?;
        }
        self.appending = true;
        Ok(())
    }

    /// Queue one line, flushing automatically at the block boundary
    pub fn push(&mut self, line: String) -> Result<()> {
        self.lines.push(line);
        if self.lines.len() >= self.block_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Write all pending lines. A no-op with nothing pending, so calling
    /// it on shutdown or toggle paths is always safe.
    pub fn flush(&mut self) -> Result<()> {
        if self.lines.is_empty() {
            return Ok(());
        }
        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .append(self.appending)
            .truncate(!self.appending)
            .open(&self.path)
            .with_context(|| format!("writing {}", self.path.display()))?;
        for line in &self.lines {
            writeln!(file, "{}", line)?;
        }
        self.lines.clear();
        self.flushes += 1;
        self.appending = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_writer(block_size: usize) -> (tempfile::TempDir, BlockWriter) {
        let dir = tempfile::tempdir().unwrap();
        let writer = BlockWriter::new(dir.path().join("out.txt"), block_size);
        (dir, writer)
    }

    #[test]
    fn test_below_block_size_nothing_on_disk() {
        let (_dir, mut w) = temp_writer(5);
        for i in 0..4 {
            w.push(format!("line {}", i)).unwrap();
        }
        assert_eq!(w.buffered(), 4);
        assert_eq!(w.flushes(), 0);
        assert!(!w.path().exists());
    }

    #[test]
    fn test_exactly_block_size_flushes_once() {
        let (_dir, mut w) = temp_writer(3);
        for i in 0..3 {
            w.push(format!("line {}", i)).unwrap();
        }
        assert_eq!(w.flushes(), 1);
        assert_eq!(w.buffered(), 0);
        let text = std::fs::read_to_string(w.path()).unwrap();
        assert_eq!(text, "line 0\nline 1\nline 2\n");
    }

    #[test]
    fn test_flush_with_empty_buffer_is_noop() {
        let (_dir, mut w) = temp_writer(3);
        w.flush().unwrap();
        assert_eq!(w.flushes(), 0);
        assert!(!w.path().exists());
    }

    #[test]
    fn test_later_flushes_append() {
        let (_dir, mut w) = temp_writer(2);
        w.push("a".to_string()).unwrap();
        w.push("b".to_string()).unwrap();
        w.push("c".to_string()).unwrap();
        w.flush().unwrap();
        assert_eq!(w.flushes(), 2);
        let text = std::fs::read_to_string(w.path()).unwrap();
        assert_eq!(text, "a\nb\nc\n");
    }

    #[test]
    fn test_header_truncates_stale_file() {
        let (_dir, mut w) = temp_writer(10);
        std::fs::write(w.path(), "stale contents\n").unwrap();
        w.write_header(&["% File generated on test".to_string(), "% 1: time [s]".to_string()])
            .unwrap();
        w.push("1;2;3".to_string()).unwrap();
        w.flush().unwrap();
        let text = std::fs::read_to_string(w.path()).unwrap();
        assert_eq!(text, "% File generated on test\n% 1: time [s]\n1;2;3\n");
    }

    #[test]
    fn test_flush_without_header_replaces_file() {
        let (_dir, mut w) = temp_writer(10);
        std::fs::write(w.path(), "stale contents\n").unwrap();
        w.push("fresh".to_string()).unwrap();
        w.flush().unwrap();
        let text = std::fs::read_to_string(w.path()).unwrap();
        assert_eq!(text, "fresh\n");
    }
}
