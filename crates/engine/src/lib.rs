//! UI-agnostic scene timeline and subtitle engine for Reel.

pub mod api;
pub mod cache;
pub mod composition;
pub mod error;
pub mod export;
pub mod playback;
pub mod settings;
pub mod speaker;
pub mod storage;
pub mod storyboard;
pub mod subtitle;
pub mod time;
pub mod timeline;

pub use api::{
    ActiveSceneSummary, Command, CompositionSnapshot, Engine, EngineErrorEvent, EngineErrorKind,
    Event, FrameSnapshot, SceneSummary, resolve_frame,
};
pub use composition::{ActiveScene, ActiveSubtitle, Composition, SubtitleCue};
pub use error::{EngineError, Result};
pub use export::{ExportCue, SubtitleExport, SubtitleFormat, build_subtitle_export};
pub use playback::{PlaybackConfig, PlaybackResolver, PlaybackState, SpringConfig};
pub use settings::CompositionSettings;
pub use speaker::SpeakerTags;
pub use storage::{FsStorage, Storage};
pub use storyboard::Storyboard;
pub use subtitle::{SegmenterConfig, SubtitleChunk, SubtitleSegmenter, segment};
pub use time::FrameRate;
pub use timeline::{
    AudioClip, Scene, TimelinePlacement, audio_track, build_timeline, total_duration_frames,
};
