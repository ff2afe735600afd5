use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::SubtitleCache;
use crate::error::Result;
use crate::playback::{PlaybackResolver, PlaybackState};
use crate::settings::CompositionSettings;
use crate::subtitle::{SubtitleChunk, SubtitleSegmenter, active_chunk};
use crate::time::FrameRate;
use crate::timeline::{
    AudioClip, Scene, TimelinePlacement, active_scene_indices, audio_track, build_timeline,
    total_duration_frames,
};

/// Placements, subtitles and audio layer derived from one scene list.
///
/// Immutable once built; rebuild it when scenes or settings change.
#[derive(Debug, Clone)]
pub struct Composition {
    settings: CompositionSettings,
    placements: Vec<TimelinePlacement>,
    subtitles: Vec<Arc<[SubtitleChunk]>>,
    audio: Vec<AudioClip>,
    duration_frames: i64,
    resolver: PlaybackResolver,
}

/// One scene visible at a global frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveScene<'a> {
    pub index: usize,
    pub local_frame: i64,
    pub placement: TimelinePlacement,
    pub playback: PlaybackState,
    pub subtitle: Option<ActiveSubtitle<'a>>,
}

/// Subtitle chunk displayed by an active scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSubtitle<'a> {
    pub chunk: &'a SubtitleChunk,
    pub entrance: f64,
}

/// Subtitle chunk positioned on the global timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubtitleCue {
    pub scene_index: usize,
    pub text: String,
    pub start_frame: f64,
    pub end_frame: f64,
}

impl Composition {
    /// Builds a composition, segmenting every scene from scratch.
    ///
    /// # Example
    /// ```
    /// use engine::{Composition, CompositionSettings, Scene};
    ///
    /// let scenes = vec![
    ///     Scene::new("じぇんば:こんにちは。", 5.0),
    ///     Scene::new("ずんだもん:よろしくなのだ。", 3.0),
    /// ];
    /// let composition = Composition::build(&scenes, &CompositionSettings::default())
    ///     .expect("valid settings");
    ///
    /// assert_eq!(composition.duration_frames(), 225);
    /// let visible: Vec<usize> = composition.active_scenes(140).map(|scene| scene.index).collect();
    /// assert_eq!(visible, vec![0, 1]);
    /// ```
    pub fn build(scenes: &[Scene], settings: &CompositionSettings) -> Result<Self> {
        Self::build_inner(scenes, settings, None)
    }

    /// Builds a composition, reusing segmented dialogue from `cache`.
    pub fn build_with_cache(
        scenes: &[Scene],
        settings: &CompositionSettings,
        cache: &mut SubtitleCache,
    ) -> Result<Self> {
        Self::build_inner(scenes, settings, Some(cache))
    }

    fn build_inner(
        scenes: &[Scene],
        settings: &CompositionSettings,
        mut cache: Option<&mut SubtitleCache>,
    ) -> Result<Self> {
        settings.validate()?;

        let placements = build_timeline(scenes, settings.fps, settings.overlap_frames);
        let segmenter = SubtitleSegmenter::new(settings.subtitles.clone());

        let mut cache_hits = 0usize;
        let mut subtitles: Vec<Arc<[SubtitleChunk]>> = Vec::with_capacity(scenes.len());
        for (scene, placement) in scenes.iter().zip(&placements) {
            let frames = placement.duration_in_frames;
            let Some(cache) = cache.as_mut() else {
                subtitles.push(Arc::from(segmenter.segment(&scene.dialogue, frames)));
                continue;
            };
            if let Some(chunks) = cache.get(&scene.dialogue, frames) {
                cache_hits += 1;
                subtitles.push(chunks);
                continue;
            }
            let chunks: Arc<[SubtitleChunk]> = Arc::from(segmenter.segment(&scene.dialogue, frames));
            cache.insert(&scene.dialogue, frames, Arc::clone(&chunks));
            subtitles.push(chunks);
        }

        let audio = audio_track(scenes, &placements);
        let duration_frames = total_duration_frames(&placements);
        debug!(
            scene_count = placements.len(),
            duration_frames,
            audio_clips = audio.len(),
            cache_hits,
            "composition built"
        );

        Ok(Self {
            settings: settings.clone(),
            resolver: PlaybackResolver::new(settings.fps, settings.playback),
            placements,
            subtitles,
            audio,
            duration_frames,
        })
    }

    pub fn settings(&self) -> &CompositionSettings {
        &self.settings
    }

    pub fn fps(&self) -> FrameRate {
        self.settings.fps
    }

    /// Total length in frames.
    pub fn duration_frames(&self) -> i64 {
        self.duration_frames
    }

    pub fn scene_count(&self) -> usize {
        self.placements.len()
    }

    pub fn placements(&self) -> &[TimelinePlacement] {
        &self.placements
    }

    /// Subtitle chunks of one scene, in frames local to that scene.
    pub fn subtitles(&self, scene_index: usize) -> Option<&[SubtitleChunk]> {
        self.subtitles.get(scene_index).map(|chunks| &chunks[..])
    }

    pub fn audio_clips(&self) -> &[AudioClip] {
        &self.audio
    }

    pub fn resolver(&self) -> &PlaybackResolver {
        &self.resolver
    }

    /// Scenes visible at global `frame`, in timeline order.
    ///
    /// During a transition two (or, with very short scenes, more) scenes
    /// are visible at once.
    pub fn active_scenes(&self, frame: i64) -> impl Iterator<Item = ActiveScene<'_>> + '_ {
        active_scene_indices(&self.placements, frame).map(move |index| {
            let placement = self.placements[index];
            let local_frame = placement.local_frame(frame);
            let playback =
                self.resolver
                    .resolve(local_frame, placement.duration_in_frames, index == 0);
            let subtitle = active_chunk(&self.subtitles[index], local_frame as f64).map(|chunk| {
                ActiveSubtitle {
                    chunk,
                    entrance: self
                        .resolver
                        .subtitle_entrance(local_frame as f64 - chunk.start_frame),
                }
            });

            ActiveScene {
                index,
                local_frame,
                placement,
                playback,
                subtitle,
            }
        })
    }

    /// Every displayable subtitle chunk in global frames, scene by scene.
    pub fn subtitle_cues(&self) -> Vec<SubtitleCue> {
        self.placements
            .iter()
            .zip(&self.subtitles)
            .enumerate()
            .flat_map(|(scene_index, (placement, chunks))| {
                let offset = placement.start_frame as f64;
                chunks
                    .iter()
                    .filter(|chunk| !chunk.is_degenerate())
                    .map(move |chunk| SubtitleCue {
                        scene_index,
                        text: chunk.text.clone(),
                        start_frame: offset + chunk.start_frame,
                        end_frame: offset + chunk.end_frame,
                    })
            })
            .collect()
    }
}
