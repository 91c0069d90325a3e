// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::collections::HashSet;
use std::fs;

#[test]
fn fresh_session_starts_at_one() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(next_segment_index(dir.path()).unwrap(), 1);
    assert_eq!(next_segment_index(dir.path()).unwrap(), 2);
    assert_eq!(next_segment_index(dir.path()).unwrap(), 3);
    assert_eq!(
        fs::read_to_string(dir.path().join("segment_index.txt")).unwrap(),
        "4"
    );
}

#[test]
fn missing_counter_falls_back_to_video_scan() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("video_001.mkv"), b"").unwrap();
    fs::write(dir.path().join("video_007.mkv"), b"").unwrap();
    // Part files do not count as segments
    fs::write(dir.path().join("video_007_part002.mkv"), b"").unwrap();
    assert_eq!(next_segment_index(dir.path()).unwrap(), 8);
}

#[test]
fn corrupt_counter_falls_back_to_video_scan() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("segment_index.txt"), "three").unwrap();
    fs::write(dir.path().join("video_002.mkv"), b"").unwrap();
    assert_eq!(next_segment_index(dir.path()).unwrap(), 3);
}

#[test]
fn concurrent_allocations_are_distinct() {
    let dir = tempfile::tempdir().unwrap();
    let mut handles = Vec::new();
    for _ in 0..8 {
        let path = dir.path().to_path_buf();
        handles.push(std::thread::spawn(move || {
            (0..10)
                .map(|_| next_segment_index(&path).unwrap())
                .collect::<Vec<u32>>()
        }));
    }
    let mut seen = HashSet::new();
    for h in handles {
        for idx in h.join().unwrap() {
            assert!(seen.insert(idx), "segment index {idx} handed out twice");
        }
    }
    assert_eq!(seen.len(), 80);
    assert_eq!(*seen.iter().max().unwrap(), 80);
}

#[test]
fn part_indices_count_per_segment() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(next_part_index(dir.path(), 1).unwrap(), 1);
    assert_eq!(next_part_index(dir.path(), 1).unwrap(), 2);
    assert_eq!(next_part_index(dir.path(), 2).unwrap(), 1);
}

#[test]
fn artifact_paths_use_zero_padded_suffix() {
    let dir = Path::new("/s");
    assert_eq!(video_path(dir, 7), Path::new("/s/video_007.mkv"));
    assert_eq!(part_video_path(dir, 7, 2), Path::new("/s/video_007_part002.mkv"));
    assert_eq!(events_path(dir, 12), Path::new("/s/events_012.jsonl"));
    assert_eq!(vtt_path(dir, 1), Path::new("/s/events_001.vtt"));
    assert_eq!(ass_path(dir, 1), Path::new("/s/events_001.ass"));
    assert_eq!(segment_manifest_path(dir, 3), Path::new("/s/segment_003.json"));
    assert_eq!(parts_file_path(dir, 3), Path::new("/s/parts_003.txt"));
}

#[test]
fn parts_manifest_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let parts = parts_file_path(dir.path(), 1);
    append_part(&parts, &part_video_path(dir.path(), 1, 1)).unwrap();
    append_part(&parts, &part_video_path(dir.path(), 1, 2)).unwrap();
    let entries = read_parts(&parts);
    assert_eq!(entries.len(), 2);
    assert!(entries[0].ends_with("video_001_part001.mkv"));
    assert!(entries[1].ends_with("video_001_part002.mkv"));
}
