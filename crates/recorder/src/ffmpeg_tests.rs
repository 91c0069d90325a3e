// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn capture_args_grab_the_display() {
    let capture = FfmpegCapture::new(":99", "1280x720", 30, PathBuf::from("/s/video_001_part001.mkv"));
    let args = capture.capture_args(&[]);
    let joined = args.join(" ");
    assert!(joined.contains("-f x11grab"));
    assert!(joined.contains("-s 1280x720"));
    assert!(joined.contains("-i :99"));
    assert!(joined.contains("-c:v libx264"));
    assert_eq!(args.last().unwrap(), "/s/video_001_part001.mkv");
}

#[test]
fn metadata_pairs_become_flags_and_empty_values_are_dropped() {
    let capture = FfmpegCapture::new(":99", "1280x720", 30, PathBuf::from("/s/out.mkv"));
    let args = capture.capture_args(&[
        ("WINEBOT_SESSION_ID".to_string(), "session-1".to_string()),
        ("WINEBOT_GIT_SHA".to_string(), String::new()),
    ]);
    let joined = args.join(" ");
    assert!(joined.contains("-metadata WINEBOT_SESSION_ID=session-1"));
    assert!(!joined.contains("WINEBOT_GIT_SHA"));
}

#[test]
fn concat_args_use_the_concat_demuxer_with_stream_copy() {
    let args = concat_args(Path::new("/s/parts_001.txt"), Path::new("/s/video_001.mkv"));
    let joined = args.join(" ");
    assert!(joined.contains("-f concat -safe 0 -i /s/parts_001.txt"));
    assert!(joined.contains("-c copy"));
    assert_eq!(args.last().unwrap(), "/s/video_001.mkv");
}

#[test]
fn mux_args_title_both_subtitle_tracks() {
    let args = mux_args(
        Path::new("/s/video_001.mkv"),
        Path::new("/s/events_001.ass"),
        Path::new("/s/events_001.vtt"),
        &[("title".to_string(), "session-1".to_string())],
        Path::new("/s/video_001.mkv.muxed.mkv"),
    );
    let joined = args.join(" ");
    assert!(joined.contains("-map 0:v"));
    assert!(joined.contains("title=Overlays (ASS)"));
    assert!(joined.contains("title=Events (VTT)"));
    assert!(joined.contains("-disposition:s:0 default"));
    assert!(joined.contains("-metadata title=session-1"));
}

#[tokio::test]
async fn concat_with_missing_manifest_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = concat_parts(&dir.path().join("parts_001.txt"), &dir.path().join("out.mkv"))
        .await
        .unwrap_err();
    assert!(matches!(err, RecorderError::Ffmpeg(_)));
}

#[tokio::test]
async fn mux_with_missing_video_fails() {
    let dir = tempfile::tempdir().unwrap();
    let err = mux_subtitles(
        &dir.path().join("video_001.mkv"),
        &dir.path().join("a.ass"),
        &dir.path().join("a.vtt"),
        &[],
    )
    .await
    .unwrap_err();
    assert!(matches!(err, RecorderError::Ffmpeg(_)));
}
