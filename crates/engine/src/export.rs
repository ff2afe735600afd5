use std::fmt::Write as _;

use crate::composition::Composition;

/// Text format for subtitle export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SubtitleFormat {
    #[default]
    Srt,
    WebVtt,
}

impl SubtitleFormat {
    /// Conventional file extension, without the dot.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Srt => "srt",
            Self::WebVtt => "vtt",
        }
    }
}

/// Subtitle track ready to be written, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleExport {
    pub cues: Vec<ExportCue>,
}

/// One subtitle entry in export order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportCue {
    pub scene_index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// Builds the export track from the composition's global subtitle cues.
///
/// Cues that round to zero milliseconds are skipped.
pub fn build_subtitle_export(composition: &Composition) -> SubtitleExport {
    let fps = composition.fps();
    let cues = composition
        .subtitle_cues()
        .into_iter()
        .filter_map(|cue| {
            let start_ms = frames_to_millis(fps.frames_to_seconds(cue.start_frame));
            let end_ms = frames_to_millis(fps.frames_to_seconds(cue.end_frame));
            if end_ms <= start_ms {
                return None;
            }
            Some(ExportCue {
                scene_index: cue.scene_index,
                start_ms,
                end_ms,
                text: cue.text,
            })
        })
        .collect();

    SubtitleExport { cues }
}

impl SubtitleExport {
    /// Renders the track as SRT or WebVTT text.
    ///
    /// # Example
    /// ```
    /// use engine::{Composition, CompositionSettings, Scene, SubtitleFormat, build_subtitle_export};
    ///
    /// let scenes = vec![Scene::new("こんにちは。", 2.0)];
    /// let composition = Composition::build(&scenes, &CompositionSettings::default()).expect("build");
    ///
    /// let srt = build_subtitle_export(&composition).render(SubtitleFormat::Srt);
    /// assert_eq!(srt, "1\n00:00:00,000 --> 00:00:01,500\nこんにちは。\n\n");
    /// ```
    pub fn render(&self, format: SubtitleFormat) -> String {
        let mut out = String::new();
        if format == SubtitleFormat::WebVtt {
            out.push_str("WEBVTT\n\n");
        }

        for (index, cue) in self.cues.iter().enumerate() {
            let (start, end) = match format {
                SubtitleFormat::Srt => {
                    let _ = writeln!(out, "{}", index + 1);
                    (format_timestamp(cue.start_ms, ','), format_timestamp(cue.end_ms, ','))
                }
                SubtitleFormat::WebVtt => {
                    (format_timestamp(cue.start_ms, '.'), format_timestamp(cue.end_ms, '.'))
                }
            };
            let _ = writeln!(out, "{start} --> {end}");
            let _ = writeln!(out, "{}", cue.text);
            out.push('\n');
        }

        out
    }
}

fn frames_to_millis(seconds: f64) -> u64 {
    (seconds * 1000.0).round().max(0.0) as u64
}

fn format_timestamp(total_ms: u64, separator: char) -> String {
    let ms = total_ms % 1000;
    let total_seconds = total_ms / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;
    format!("{hours:02}:{minutes:02}:{seconds:02}{separator}{ms:03}")
}
