// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small-file and append-only primitives.
//!
//! Log files are multi-writer across processes: the daemon, the recorder
//! and the tracers all append to the same JSONL files. Every append takes
//! an exclusive advisory lock on the descriptor for the duration of one
//! line, which keeps records byte-ordered within a file. Tail reads stream
//! from the end and never slurp a large file.

use crate::error::StorageError;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// Files above this size are only ever read incrementally.
const WHOLE_FILE_THRESHOLD: u64 = 4 * 1024 * 1024;

const CHUNK: usize = 64 * 1024;

/// Write a small state file atomically via a temp sibling + rename.
pub fn atomic_write_small(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().ok_or_else(|| {
        StorageError::BadRequest(format!("no parent directory for {}", path.display()))
    })?;
    std::fs::create_dir_all(parent)?;
    let tmp = parent.join(format!(
        ".{}.tmp.{}",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("state"),
        std::process::id()
    ));
    {
        let mut f = File::create(&tmp)?;
        f.write_all(bytes)?;
        f.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// Append one LF-terminated line under an exclusive advisory lock.
pub fn append_line(path: &Path, line: &str) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    f.lock_exclusive()?;
    let result = write_line(&mut f, line);
    let _ = fs2::FileExt::unlock(&f);
    result
}

fn write_line(f: &mut File, line: &str) -> Result<(), StorageError> {
    f.write_all(line.as_bytes())?;
    f.write_all(b"\n")?;
    f.flush()?;
    Ok(())
}

/// Return the last `n` newline-delimited lines, oldest first.
pub fn tail_lines(path: &Path, n: usize) -> Result<Vec<String>, StorageError> {
    let mut out = Vec::new();
    for line in RevLines::open(path)? {
        if out.len() == n {
            break;
        }
        out.push(line);
    }
    out.reverse();
    Ok(out)
}

/// Up to `max_bytes` from the end of the file, lossily decoded.
pub fn read_file_tail(path: &Path, max_bytes: u64) -> String {
    let Ok(mut f) = File::open(path) else {
        return String::new();
    };
    let Ok(meta) = f.metadata() else {
        return String::new();
    };
    let start = meta.len().saturating_sub(max_bytes);
    if f.seek(SeekFrom::Start(start)).is_err() {
        return String::new();
    }
    let mut buf = Vec::new();
    if f.read_to_end(&mut buf).is_err() {
        return String::new();
    }
    String::from_utf8_lossy(&buf).into_owned()
}

/// Read a small file, trimmed; `None` when absent, unreadable or empty.
pub fn read_trimmed(path: &Path) -> Option<String> {
    let meta = std::fs::metadata(path).ok()?;
    if meta.len() > WHOLE_FILE_THRESHOLD {
        return None;
    }
    let content = std::fs::read_to_string(path).ok()?;
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Iterator over a file's complete lines, last line first.
///
/// Reads backwards in fixed-size chunks so tailing a multi-gigabyte log
/// costs only the bytes actually inspected.
pub struct RevLines {
    file: File,
    pos: u64,
    buf: Vec<u8>,
    at_end: bool,
}

impl RevLines {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        Ok(Self { file, pos: len, buf: Vec::new(), at_end: true })
    }

    fn fill(&mut self) -> bool {
        if self.pos == 0 {
            return false;
        }
        let take = CHUNK.min(self.pos as usize);
        self.pos -= take as u64;
        if self.file.seek(SeekFrom::Start(self.pos)).is_err() {
            self.pos = 0;
            return false;
        }
        let mut chunk = vec![0u8; take];
        if self.file.read_exact(&mut chunk).is_err() {
            self.pos = 0;
            return false;
        }
        chunk.append(&mut self.buf);
        self.buf = chunk;
        true
    }
}

impl Iterator for RevLines {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        loop {
            if let Some(idx) = self.buf.iter().rposition(|&b| b == b'\n') {
                let line = self.buf.split_off(idx + 1);
                self.buf.pop();
                if self.at_end && line.is_empty() {
                    // Trailing newline at EOF, not an empty record.
                    self.at_end = false;
                    continue;
                }
                self.at_end = false;
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
            if !self.fill() {
                if self.buf.is_empty() {
                    return None;
                }
                let line = std::mem::take(&mut self.buf);
                self.at_end = false;
                return Some(String::from_utf8_lossy(&line).into_owned());
            }
        }
    }
}

#[cfg(test)]
#[path = "fsio_tests.rs"]
mod tests;
