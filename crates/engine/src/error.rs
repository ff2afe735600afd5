use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Result type used by the engine crate.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors produced by engine commands and composition setup.
#[derive(Debug)]
pub enum EngineError {
    StoryboardNotLoaded,
    InvalidFrameRate {
        fps: u32,
    },
    InvalidSettings {
        reason: String,
    },
    InvalidSceneDuration {
        scene_index: usize,
        seconds: f64,
    },
    SceneIndexOutOfRange {
        scene_index: usize,
        scene_count: usize,
    },
    Io {
        context: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
    StoryboardSerialization {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StoryboardNotLoaded => write!(f, "storyboard is not loaded"),
            Self::InvalidFrameRate { fps } => write!(f, "invalid frame rate: {fps} fps"),
            Self::InvalidSettings { reason } => write!(f, "invalid settings: {reason}"),
            Self::InvalidSceneDuration {
                scene_index,
                seconds,
            } => write!(f, "invalid duration for scene {scene_index}: {seconds}s"),
            Self::SceneIndexOutOfRange {
                scene_index,
                scene_count,
            } => write!(
                f,
                "scene index {scene_index} is out of range ({scene_count} scenes)"
            ),
            Self::Io {
                context,
                path,
                source,
            } => write!(f, "{context}: {} ({source})", path.display()),
            Self::StoryboardSerialization { path, source } => {
                write!(
                    f,
                    "storyboard serialization/deserialization failed at {} ({source})",
                    path.display()
                )
            }
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::StoryboardSerialization { source, .. } => Some(source),
            _ => None,
        }
    }
}
