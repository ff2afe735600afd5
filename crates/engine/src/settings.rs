use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};
use crate::playback::PlaybackConfig;
use crate::subtitle::SegmenterConfig;
use crate::time::FrameRate;

pub const DEFAULT_OVERLAP_FRAMES: i64 = 15;

/// Composition-wide settings stored alongside the scenes.
///
/// Every field may be omitted in a storyboard document.
///
/// # Example
/// ```
/// use engine::CompositionSettings;
///
/// let settings: CompositionSettings =
///     serde_json::from_str(r#"{ "fps": 24, "subtitles": { "endBufferFrames": 6 } }"#)
///         .expect("valid settings");
/// assert_eq!(settings.fps.get(), 24);
/// assert_eq!(settings.overlap_frames, 15);
/// assert_eq!(settings.subtitles.end_buffer_frames, 6);
/// assert_eq!(settings.subtitles.long_chunk_chars, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompositionSettings {
    pub fps: FrameRate,
    pub overlap_frames: i64,
    #[serde(flatten)]
    pub playback: PlaybackConfig,
    pub subtitles: SegmenterConfig,
}

impl Default for CompositionSettings {
    fn default() -> Self {
        Self {
            fps: FrameRate::default(),
            overlap_frames: DEFAULT_OVERLAP_FRAMES,
            playback: PlaybackConfig::default(),
            subtitles: SegmenterConfig::default(),
        }
    }
}

impl CompositionSettings {
    /// Rejects values the timeline arithmetic cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.overlap_frames < 0 {
            return Err(invalid("overlapFrames must not be negative"));
        }
        if self.playback.transition_frames < 0 {
            return Err(invalid("transitionFrames must not be negative"));
        }
        if self.playback.entrance_delay_frames < 0 {
            return Err(invalid("entranceDelayFrames must not be negative"));
        }

        let spring = &self.playback.spring;
        if !(spring.mass.is_finite() && spring.mass > 0.0) {
            return Err(invalid("spring.mass must be positive"));
        }
        if !(spring.stiffness.is_finite() && spring.stiffness > 0.0) {
            return Err(invalid("spring.stiffness must be positive"));
        }
        if !(spring.damping.is_finite() && spring.damping >= 0.0) {
            return Err(invalid("spring.damping must not be negative"));
        }

        let subtitles = &self.subtitles;
        if subtitles.short_sentence_chars == 0 || subtitles.long_chunk_chars == 0 {
            return Err(invalid("subtitle char thresholds must be positive"));
        }
        if subtitles.end_buffer_frames < 0 {
            return Err(invalid("subtitles.endBufferFrames must not be negative"));
        }
        if !(subtitles.min_weight.is_finite() && subtitles.min_weight >= 0.0) {
            return Err(invalid("subtitles.minWeight must be a non-negative number"));
        }

        Ok(())
    }
}

fn invalid(reason: &str) -> EngineError {
    EngineError::InvalidSettings {
        reason: reason.to_string(),
    }
}
