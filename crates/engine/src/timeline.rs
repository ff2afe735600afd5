use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::time::FrameRate;

/// One segment of the composition as written by the script generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scene {
    /// Dialogue text, optionally prefixed with a speaker tag.
    pub dialogue: String,
    pub duration_in_seconds: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Slide fields the engine does not interpret (title, chart data, ...).
    #[serde(flatten)]
    pub presentation: Map<String, Value>,
}

impl Scene {
    pub fn new(dialogue: impl Into<String>, duration_in_seconds: f64) -> Self {
        Self {
            dialogue: dialogue.into(),
            duration_in_seconds,
            audio_url: None,
            presentation: Map::new(),
        }
    }

    pub fn with_audio(mut self, audio_url: impl Into<String>) -> Self {
        self.audio_url = Some(audio_url.into());
        self
    }
}

/// Absolute frame window of one scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelinePlacement {
    pub start_frame: i64,
    pub duration_in_frames: i64,
}

impl TimelinePlacement {
    /// Exclusive end frame, saturating at `i64::MAX`.
    pub fn end_frame(&self) -> i64 {
        self.start_frame.saturating_add(self.duration_in_frames)
    }

    /// Returns true when `frame` is in `[start_frame, end_frame)`.
    pub fn contains(&self, frame: i64) -> bool {
        self.start_frame <= frame && frame < self.end_frame()
    }

    pub fn local_frame(&self, frame: i64) -> i64 {
        frame - self.start_frame
    }
}

/// Audio layer entry; shares the placement of the scene with the same index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioClip {
    pub scene_index: usize,
    pub audio_url: String,
    pub placement: TimelinePlacement,
}

/// Places scenes back to back, each overlapping the previous one by
/// `overlap_frames`.
///
/// A scene shorter than the overlap advances the cursor by zero frames.
///
/// # Example
/// ```
/// use engine::{FrameRate, Scene, build_timeline, total_duration_frames};
///
/// let scenes = [Scene::new("a", 5.0), Scene::new("b", 3.0), Scene::new("c", 4.0)];
/// let placements = build_timeline(&scenes, FrameRate::new(30).expect("valid"), 15);
///
/// let starts: Vec<i64> = placements.iter().map(|p| p.start_frame).collect();
/// assert_eq!(starts, vec![0, 135, 210]);
/// assert_eq!(total_duration_frames(&placements), 330);
/// ```
pub fn build_timeline(
    scenes: &[Scene],
    fps: FrameRate,
    overlap_frames: i64,
) -> Vec<TimelinePlacement> {
    let overlap_frames = overlap_frames.max(0);
    let mut cursor = 0i64;

    let placements: Vec<TimelinePlacement> = scenes
        .iter()
        .map(|scene| {
            let duration_in_frames = fps.seconds_to_frames(scene.duration_in_seconds);
            let placement = TimelinePlacement {
                start_frame: cursor,
                duration_in_frames,
            };
            cursor = cursor.saturating_add((duration_in_frames - overlap_frames).max(0));
            placement
        })
        .collect();

    debug!(
        scene_count = placements.len(),
        fps = fps.get(),
        overlap_frames,
        duration_frames = total_duration_frames(&placements),
        "timeline built"
    );
    placements
}

/// Returns the composition length: the latest end among all windows.
///
/// When every scene is at least as long as the overlap this equals
/// `sum(durations) - (n - 1) * overlap`.
pub fn total_duration_frames(placements: &[TimelinePlacement]) -> i64 {
    placements
        .iter()
        .map(TimelinePlacement::end_frame)
        .max()
        .unwrap_or(0)
        .max(0)
}

/// Indices of every scene whose window contains `frame`, in timeline order.
pub fn active_scene_indices(
    placements: &[TimelinePlacement],
    frame: i64,
) -> impl Iterator<Item = usize> + '_ {
    placements
        .iter()
        .enumerate()
        .take_while(move |(_, placement)| placement.start_frame <= frame)
        .filter(move |(_, placement)| placement.contains(frame))
        .map(|(index, _)| index)
}

/// Builds the audio layer for scenes that carry an audio reference.
pub fn audio_track(scenes: &[Scene], placements: &[TimelinePlacement]) -> Vec<AudioClip> {
    scenes
        .iter()
        .zip(placements)
        .enumerate()
        .filter_map(|(scene_index, (scene, placement))| {
            let audio_url = scene.audio_url.as_ref()?;
            Some(AudioClip {
                scene_index,
                audio_url: audio_url.clone(),
                placement: *placement,
            })
        })
        .collect()
}
