// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Segment and part bookkeeping.
//!
//! Segment indices are allocated under an exclusive advisory lock on
//! `segment_index.lock`, so two allocators — even in different processes —
//! never hand out the same index. Part indices are per-segment and only
//! ever touched by the single recorder process that owns the segment.

use crate::error::StorageError;
use crate::fsio::read_trimmed;
use fs2::FileExt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub fn segment_suffix(segment: u32) -> String {
    format!("{segment:03}")
}

pub fn video_path(session_dir: &Path, segment: u32) -> PathBuf {
    session_dir.join(format!("video_{}.mkv", segment_suffix(segment)))
}

pub fn part_video_path(session_dir: &Path, segment: u32, part: u32) -> PathBuf {
    session_dir.join(format!("video_{}_part{:03}.mkv", segment_suffix(segment), part))
}

pub fn events_path(session_dir: &Path, segment: u32) -> PathBuf {
    session_dir.join(format!("events_{}.jsonl", segment_suffix(segment)))
}

pub fn vtt_path(session_dir: &Path, segment: u32) -> PathBuf {
    session_dir.join(format!("events_{}.vtt", segment_suffix(segment)))
}

pub fn ass_path(session_dir: &Path, segment: u32) -> PathBuf {
    session_dir.join(format!("events_{}.ass", segment_suffix(segment)))
}

pub fn segment_manifest_path(session_dir: &Path, segment: u32) -> PathBuf {
    session_dir.join(format!("segment_{}.json", segment_suffix(segment)))
}

pub fn parts_file_path(session_dir: &Path, segment: u32) -> PathBuf {
    session_dir.join(format!("parts_{}.txt", segment_suffix(segment)))
}

pub fn part_index_path(session_dir: &Path, segment: u32) -> PathBuf {
    session_dir.join(format!("part_index_{}.txt", segment_suffix(segment)))
}

/// Allocate the next segment index for a session.
///
/// Holds the lock on `segment_index.lock` across read-compute-write. When
/// the counter file is missing or unparsable, falls back to one past the
/// highest `video_NNN.mkv` already on disk, or 1 for a fresh session.
pub fn next_segment_index(session_dir: &Path) -> Result<u32, StorageError> {
    std::fs::create_dir_all(session_dir)?;
    let lock_path = session_dir.join("segment_index.lock");
    let index_path = session_dir.join("segment_index.txt");

    let lock_file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&lock_path)?;
    lock_file.lock_exclusive()?;

    let result = allocate_locked(session_dir, &index_path);
    let _ = fs2::FileExt::unlock(&lock_file);
    result
}

fn allocate_locked(session_dir: &Path, index_path: &Path) -> Result<u32, StorageError> {
    let current = read_trimmed(index_path)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or_else(|| max_video_index(session_dir) + 1);
    let mut f = std::fs::File::create(index_path)?;
    write!(f, "{}", current + 1)?;
    f.flush()?;
    Ok(current)
}

fn max_video_index(session_dir: &Path) -> u32 {
    let Ok(entries) = std::fs::read_dir(session_dir) else {
        return 0;
    };
    let mut max = 0;
    for entry in entries.flatten() {
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        let Some(stem) = name.strip_prefix("video_").and_then(|s| s.strip_suffix(".mkv")) else {
            continue;
        };
        // Part files (video_001_part002.mkv) are not segments.
        if let Ok(idx) = stem.parse::<u32>() {
            max = max.max(idx);
        }
    }
    max
}

/// Allocate the next part index within a segment. The recorder process is
/// the only writer, so no lock is needed here.
pub fn next_part_index(session_dir: &Path, segment: u32) -> Result<u32, StorageError> {
    let path = part_index_path(session_dir, segment);
    let current = read_trimmed(&path)
        .and_then(|s| s.parse::<u32>().ok())
        .unwrap_or(1);
    std::fs::write(&path, (current + 1).to_string())?;
    Ok(current)
}

/// Append one entry to the segment's ffmpeg concat manifest.
pub fn append_part(parts_file: &Path, part_path: &Path) -> Result<(), StorageError> {
    let mut f = OpenOptions::new().create(true).append(true).open(parts_file)?;
    writeln!(f, "file '{}'", part_path.display())?;
    Ok(())
}

/// Entries of a parts manifest, in recording order.
pub fn read_parts(parts_file: &Path) -> Vec<String> {
    let Ok(content) = std::fs::read_to_string(parts_file) else {
        return Vec::new();
    };
    content
        .lines()
        .filter_map(|line| {
            line.strip_prefix("file '")
                .and_then(|rest| rest.strip_suffix('\''))
                .map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
#[path = "segments_tests.rs"]
mod tests;
