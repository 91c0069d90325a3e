// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event-log to subtitle projection (WebVTT and ASS).
//!
//! Each cue runs from its event's start to the next event, capped at
//! three seconds; the last cue always gets the full three seconds. ASS
//! output carries a bottom-centre `Default` style plus an `Overlay` style
//! used for positioned annotations via `\pos(x,y)`.

use crate::model::RecorderEvent;
use std::fmt::Write as _;

const CUE_MS: i64 = 3000;

pub struct SubtitleGenerator {
    events: Vec<RecorderEvent>,
}

impl SubtitleGenerator {
    pub fn new(mut events: Vec<RecorderEvent>) -> Self {
        events.sort_by_key(|e| e.t_rel_ms);
        Self { events }
    }

    pub fn generate_vtt(&self) -> String {
        let mut out = String::from("WEBVTT\n\n");
        for (i, event) in self.events.iter().enumerate() {
            let start = event.t_rel_ms.max(0);
            let end = self.cue_end(i, start);
            let _ = writeln!(out, "{} --> {}", ms_to_vtt(start), ms_to_vtt(end));
            let _ = writeln!(out, "[{}] {}", event.kind.to_uppercase(), event.message);
            out.push('\n');
        }
        out
    }

    pub fn generate_ass(&self, width: u32, height: u32) -> String {
        let mut out = format!(
            "[Script Info]\n\
             Title: WineBot Session\n\
             ScriptType: v4.00+\n\
             PlayResX: {width}\n\
             PlayResY: {height}\n\
             \n\
             [V4+ Styles]\n\
             Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, OutlineColour, BackColour, Bold, Italic, Underline, StrikeOut, ScaleX, ScaleY, Spacing, Angle, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, Encoding\n\
             Style: Default,Arial,20,&H00FFFFFF,&H000000FF,&H00000000,&H80000000,0,0,0,0,100,100,0,0,1,1,1,2,10,10,10,1\n\
             Style: Overlay,Arial,20,&H0000FFFF,&H000000FF,&H00000000,&H80000000,-1,0,0,0,100,100,0,0,1,2,0,7,0,0,0,1\n\
             \n\
             [Events]\n\
             Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n"
        );

        for (i, event) in self.events.iter().enumerate() {
            let start = event.t_rel_ms.max(0);
            let end = self.cue_end(i, start);
            let text = format!("[{}] {}", event.kind.to_uppercase(), event.message);
            let _ = writeln!(
                out,
                "Dialogue: 0,{},{},Default,,0,0,0,,{}",
                ms_to_ass(start),
                ms_to_ass(end),
                text
            );
            if event.kind == "annotation" {
                if let Some(pos) = &event.pos {
                    let _ = writeln!(
                        out,
                        "Dialogue: 1,{},{},Overlay,,0,0,0,,{{\\pos({},{})}}{}",
                        ms_to_ass(start),
                        ms_to_ass(end),
                        pos.x,
                        pos.y,
                        event.message
                    );
                }
            }
        }
        out
    }

    fn cue_end(&self, index: usize, start: i64) -> i64 {
        match self.events.get(index + 1) {
            Some(next) => (start + CUE_MS).min(next.t_rel_ms.max(0)).max(start),
            None => start + CUE_MS,
        }
    }
}

/// `HH:MM:SS.mmm`
fn ms_to_vtt(ms: i64) -> String {
    let ms = ms.max(0);
    let (hours, minutes, seconds, millis) = split_ms(ms);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{millis:03}")
}

/// `H:MM:SS.cc` (centiseconds, single-digit hours)
fn ms_to_ass(ms: i64) -> String {
    let ms = ms.max(0);
    let (hours, minutes, seconds, millis) = split_ms(ms);
    format!("{hours}:{minutes:02}:{seconds:02}.{:02}", millis / 10)
}

fn split_ms(ms: i64) -> (i64, i64, i64, i64) {
    let millis = ms % 1000;
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;
    (hours, minutes % 60, seconds % 60, millis)
}

#[cfg(test)]
#[path = "subtitles_tests.rs"]
mod tests;
