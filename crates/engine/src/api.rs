use std::path::PathBuf;

use tracing::{debug, info};

use crate::cache::SubtitleCache;
use crate::composition::Composition;
use crate::error::{EngineError, Result};
use crate::export::{SubtitleFormat, build_subtitle_export};
use crate::playback::PlaybackState;
use crate::settings::CompositionSettings;
use crate::storage::{FsStorage, Storage};
use crate::storyboard::Storyboard;
use crate::subtitle::SegmenterConfig;
use crate::timeline::Scene;

const SUBTITLE_CACHE_CAPACITY: usize = 256;

/// Commands accepted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadStoryboard {
        path: PathBuf,
    },
    SaveStoryboard {
        path: PathBuf,
    },
    /// Replaces the whole scene list, e.g. after a new script was generated.
    ///
    /// Starts a storyboard with default settings when none is loaded.
    ReplaceScenes {
        scenes: Vec<Scene>,
    },
    EditDialogue {
        scene_index: usize,
        dialogue: String,
    },
    /// Sets one scene's duration, typically to the length of its narration.
    ///
    /// # Example
    /// ```
    /// use engine::{Command, Engine, FsStorage, Scene};
    ///
    /// let mut engine = Engine::new(FsStorage);
    /// let _ = engine.handle_command(Command::ReplaceScenes {
    ///     scenes: vec![Scene::new("じぇんば:こんにちは。", 3.0)],
    /// });
    /// let events = engine
    ///     .handle_command(Command::SetSceneDuration {
    ///         scene_index: 0,
    ///         duration_in_seconds: 4.0,
    ///     })
    ///     .expect("scene exists");
    /// assert_eq!(events.len(), 1);
    /// ```
    SetSceneDuration {
        scene_index: usize,
        duration_in_seconds: f64,
    },
    UpdateSettings {
        settings: CompositionSettings,
    },
    SetPlayhead {
        frame: i64,
    },
    ExportSubtitles {
        path: PathBuf,
        format: SubtitleFormat,
    },
}

/// Events emitted by the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    CompositionChanged(CompositionSnapshot),
    PlayheadChanged { frame: i64 },
    FrameResolved(FrameSnapshot),
    StoryboardSaved { path: PathBuf },
    SubtitlesExported { path: PathBuf, cue_count: usize },
    Error(EngineErrorEvent),
}

/// Coarse error category for UI handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineErrorKind {
    StoryboardNotLoaded,
    SceneIndexOutOfRange,
    InvalidInput,
    Other,
}

impl From<&EngineError> for EngineErrorKind {
    fn from(value: &EngineError) -> Self {
        match value {
            EngineError::StoryboardNotLoaded => Self::StoryboardNotLoaded,
            EngineError::SceneIndexOutOfRange { .. } => Self::SceneIndexOutOfRange,
            EngineError::InvalidFrameRate { .. }
            | EngineError::InvalidSettings { .. }
            | EngineError::InvalidSceneDuration { .. } => Self::InvalidInput,
            _ => Self::Other,
        }
    }
}

/// User-facing error payload emitted as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineErrorEvent {
    pub kind: EngineErrorKind,
    pub message: String,
}

impl EngineErrorEvent {
    pub fn from_error(error: &EngineError) -> Self {
        Self {
            kind: EngineErrorKind::from(error),
            message: error.to_string(),
        }
    }
}

/// Immutable composition snapshot consumed by the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompositionSnapshot {
    pub scenes: Vec<SceneSummary>,
    pub duration_frames: i64,
    pub fps: u32,
}

/// Snapshot representation of one placed scene.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneSummary {
    pub index: usize,
    pub speaker: Option<String>,
    pub start_frame: i64,
    pub duration_in_frames: i64,
    pub subtitle_count: usize,
    pub has_audio: bool,
}

/// What the renderer shows at one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot {
    pub frame: i64,
    pub scenes: Vec<ActiveSceneSummary>,
}

/// Snapshot representation of one visible scene.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveSceneSummary {
    pub index: usize,
    pub local_frame: i64,
    pub playback: PlaybackState,
    pub subtitle: Option<String>,
    pub subtitle_entrance: f64,
}

/// Editing session over one storyboard.
#[derive(Debug)]
pub struct Engine<S> {
    storage: S,
    session: Option<Session>,
    playhead_frame: i64,
    subtitle_cache: SubtitleCache,
    cached_subtitle_config: Option<SegmenterConfig>,
}

#[derive(Debug)]
struct Session {
    storyboard: Storyboard,
    composition: Composition,
}

impl<S> Engine<S>
where
    S: Storage,
{
    /// Creates a new engine with the provided storage.
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            session: None,
            playhead_frame: 0,
            subtitle_cache: SubtitleCache::new(SUBTITLE_CACHE_CAPACITY),
            cached_subtitle_config: None,
        }
    }

    /// Applies one command and returns emitted events.
    pub fn handle_command(&mut self, command: Command) -> Result<Vec<Event>> {
        match command {
            Command::LoadStoryboard { path } => self.load(path),
            Command::SaveStoryboard { path } => self.save(path),
            Command::ReplaceScenes { scenes } => self.replace_scenes(scenes),
            Command::EditDialogue {
                scene_index,
                dialogue,
            } => self.edit(|storyboard| storyboard.set_dialogue(scene_index, dialogue)),
            Command::SetSceneDuration {
                scene_index,
                duration_in_seconds,
            } => self.edit(|storyboard| storyboard.set_duration(scene_index, duration_in_seconds)),
            Command::UpdateSettings { settings } => self.edit(|storyboard| {
                settings.validate()?;
                storyboard.settings = settings;
                Ok(())
            }),
            Command::SetPlayhead { frame } => self.set_playhead(frame),
            Command::ExportSubtitles { path, format } => self.export_subtitles(path, format),
        }
    }

    pub fn storyboard(&self) -> Option<&Storyboard> {
        self.session.as_ref().map(|session| &session.storyboard)
    }

    pub fn composition(&self) -> Option<&Composition> {
        self.session.as_ref().map(|session| &session.composition)
    }

    pub fn playhead_frame(&self) -> i64 {
        self.playhead_frame
    }

    fn load(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        let storyboard = self.storage.load_storyboard(&path)?;
        let composition = self.compose(&storyboard)?;

        info!(
            path = ?path,
            scene_count = storyboard.scenes.len(),
            duration_frames = composition.duration_frames(),
            "storyboard loaded"
        );
        let snapshot = snapshot(&storyboard, &composition);
        self.session = Some(Session {
            storyboard,
            composition,
        });
        self.playhead_frame = 0;

        Ok(vec![
            Event::CompositionChanged(snapshot),
            Event::PlayheadChanged { frame: 0 },
        ])
    }

    fn save(&mut self, path: PathBuf) -> Result<Vec<Event>> {
        let session = self.session.as_ref().ok_or(EngineError::StoryboardNotLoaded)?;
        self.storage.save_storyboard(&path, &session.storyboard)?;

        info!(path = ?path, "storyboard saved");
        Ok(vec![Event::StoryboardSaved { path }])
    }

    fn replace_scenes(&mut self, scenes: Vec<Scene>) -> Result<Vec<Event>> {
        if self.session.is_none() {
            let storyboard = Storyboard::new(CompositionSettings::default(), scenes);
            let composition = self.compose(&storyboard)?;
            let snapshot = snapshot(&storyboard, &composition);
            info!(scene_count = storyboard.scenes.len(), "storyboard started");
            self.session = Some(Session {
                storyboard,
                composition,
            });
            self.playhead_frame = 0;
            return Ok(vec![
                Event::CompositionChanged(snapshot),
                Event::PlayheadChanged { frame: 0 },
            ]);
        }

        self.edit(|storyboard| {
            storyboard.scenes = scenes;
            Ok(())
        })
    }

    /// Applies `change` to a copy of the storyboard and commits it once the
    /// composition rebuilds.
    fn edit<F>(&mut self, change: F) -> Result<Vec<Event>>
    where
        F: FnOnce(&mut Storyboard) -> Result<()>,
    {
        let session = self.session.as_ref().ok_or(EngineError::StoryboardNotLoaded)?;
        let mut storyboard = session.storyboard.clone();
        change(&mut storyboard)?;
        let composition = self.compose(&storyboard)?;

        let previous_playhead = self.playhead_frame;
        self.playhead_frame = normalize_playhead(previous_playhead, composition.duration_frames());
        info!(
            scene_count = storyboard.scenes.len(),
            duration_frames = composition.duration_frames(),
            playhead_frame = self.playhead_frame,
            "storyboard edit applied"
        );

        let mut events = vec![Event::CompositionChanged(snapshot(&storyboard, &composition))];
        if self.playhead_frame != previous_playhead {
            events.push(Event::PlayheadChanged {
                frame: self.playhead_frame,
            });
        }
        self.session = Some(Session {
            storyboard,
            composition,
        });
        Ok(events)
    }

    fn set_playhead(&mut self, frame: i64) -> Result<Vec<Event>> {
        let session = self.session.as_ref().ok_or(EngineError::StoryboardNotLoaded)?;
        let clamped = normalize_playhead(frame, session.composition.duration_frames());
        self.playhead_frame = clamped;

        Ok(vec![
            Event::PlayheadChanged { frame: clamped },
            Event::FrameResolved(resolve_frame(&session.composition, clamped)),
        ])
    }

    fn export_subtitles(&mut self, path: PathBuf, format: SubtitleFormat) -> Result<Vec<Event>> {
        let session = self.session.as_ref().ok_or(EngineError::StoryboardNotLoaded)?;
        let export = build_subtitle_export(&session.composition);
        self.storage.write_text(&path, &export.render(format))?;

        let cue_count = export.cues.len();
        info!(path = ?path, ?format, cue_count, "subtitles exported");
        Ok(vec![Event::SubtitlesExported { path, cue_count }])
    }

    fn compose(&mut self, storyboard: &Storyboard) -> Result<Composition> {
        if self.cached_subtitle_config.as_ref() != Some(&storyboard.settings.subtitles) {
            debug!(
                cached_entries = self.subtitle_cache.len(),
                "subtitle settings changed; cache cleared"
            );
            self.subtitle_cache.clear();
            self.cached_subtitle_config = Some(storyboard.settings.subtitles.clone());
        }
        Composition::build_with_cache(
            &storyboard.scenes,
            &storyboard.settings,
            &mut self.subtitle_cache,
        )
    }
}

impl Engine<FsStorage> {
    /// Creates an engine backed by the local filesystem.
    pub fn with_fs() -> Self {
        Self::new(FsStorage)
    }
}

/// Resolves everything visible at `frame` into an owned snapshot.
pub fn resolve_frame(composition: &Composition, frame: i64) -> FrameSnapshot {
    FrameSnapshot {
        frame,
        scenes: composition
            .active_scenes(frame)
            .map(|scene| ActiveSceneSummary {
                index: scene.index,
                local_frame: scene.local_frame,
                playback: scene.playback,
                subtitle: scene.subtitle.map(|subtitle| subtitle.chunk.text.clone()),
                subtitle_entrance: scene.subtitle.map_or(0.0, |subtitle| subtitle.entrance),
            })
            .collect(),
    }
}

fn snapshot(storyboard: &Storyboard, composition: &Composition) -> CompositionSnapshot {
    let speakers = &storyboard.settings.subtitles.speakers;
    CompositionSnapshot {
        scenes: storyboard
            .scenes
            .iter()
            .zip(composition.placements())
            .enumerate()
            .map(|(index, (scene, placement))| SceneSummary {
                index,
                speaker: speakers.split(&scene.dialogue).0.map(str::to_string),
                start_frame: placement.start_frame,
                duration_in_frames: placement.duration_in_frames,
                subtitle_count: composition
                    .subtitles(index)
                    .map_or(0, |chunks| chunks.len()),
                has_audio: scene.audio_url.is_some(),
            })
            .collect(),
        duration_frames: composition.duration_frames(),
        fps: composition.fps().get(),
    }
}

fn normalize_playhead(frame: i64, duration_frames: i64) -> i64 {
    if duration_frames <= 0 {
        return 0;
    }

    frame.clamp(0, duration_frames - 1)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use super::{Command, Engine, EngineErrorEvent, EngineErrorKind, Event};
    use crate::error::EngineError;
    use crate::export::SubtitleFormat;
    use crate::settings::CompositionSettings;
    use crate::storage::Storage;
    use crate::storyboard::Storyboard;
    use crate::timeline::Scene;

    const BOARD: &str = r#"{
        "scenes": [
            { "dialogue": "じぇんば:こんにちは。今日はいい天気ですね。", "durationInSeconds": 5, "audioUrl": "blob:0" },
            { "dialogue": "ずんだもん：そうなのだ。", "durationInSeconds": 3 },
            { "dialogue": "じぇんば:では、始めましょう。", "durationInSeconds": 4 }
        ]
    }"#;

    #[test]
    fn load_emits_snapshot_and_playhead_reset() {
        let mut engine = Engine::new(MockStorage::with_file("board.json", BOARD));

        let events = engine
            .handle_command(Command::LoadStoryboard {
                path: PathBuf::from("board.json"),
            })
            .expect("load should succeed");

        assert_eq!(events.len(), 2);
        let Event::CompositionChanged(snapshot) = &events[0] else {
            panic!("first event must be CompositionChanged");
        };
        assert_eq!(events[1], Event::PlayheadChanged { frame: 0 });
        assert_eq!(snapshot.duration_frames, 330);
        assert_eq!(snapshot.fps, 30);

        let starts: Vec<i64> = snapshot.scenes.iter().map(|scene| scene.start_frame).collect();
        assert_eq!(starts, vec![0, 135, 210]);
        assert_eq!(snapshot.scenes[0].speaker.as_deref(), Some("じぇんば"));
        assert_eq!(snapshot.scenes[1].speaker.as_deref(), Some("ずんだもん"));
        assert_eq!(snapshot.scenes[0].subtitle_count, 2);
        assert!(snapshot.scenes[0].has_audio);
        assert!(!snapshot.scenes[1].has_audio);
    }

    #[test]
    fn commands_before_load_fail_with_not_loaded() {
        let mut engine = Engine::new(MockStorage::default());

        let result = engine.handle_command(Command::SetPlayhead { frame: 10 });
        let error = result.expect_err("set playhead without storyboard must fail");

        assert!(matches!(error, EngineError::StoryboardNotLoaded));
        assert_eq!(
            EngineErrorEvent::from_error(&error).kind,
            EngineErrorKind::StoryboardNotLoaded
        );
    }

    #[test]
    fn set_playhead_resolves_overlapping_scenes() {
        let mut engine = loaded_engine();

        let events = engine
            .handle_command(Command::SetPlayhead { frame: 140 })
            .expect("set playhead should succeed");

        assert_eq!(events[0], Event::PlayheadChanged { frame: 140 });
        let Event::FrameResolved(frame) = &events[1] else {
            panic!("second event must be FrameResolved");
        };
        let indices: Vec<usize> = frame.scenes.iter().map(|scene| scene.index).collect();
        assert_eq!(indices, vec![0, 1]);
        assert_eq!(frame.scenes[1].local_frame, 5);
        assert_eq!(frame.scenes[1].subtitle.as_deref(), Some("そうなのだ。"));
        assert!(frame.scenes[0].subtitle.is_none());
    }

    #[test]
    fn set_playhead_clamps_to_composition_bounds() {
        let mut engine = loaded_engine();

        let events = engine
            .handle_command(Command::SetPlayhead { frame: 10_000 })
            .expect("set playhead should succeed");
        assert_eq!(events[0], Event::PlayheadChanged { frame: 329 });

        let events = engine
            .handle_command(Command::SetPlayhead { frame: -4 })
            .expect("set playhead should succeed");
        assert_eq!(events[0], Event::PlayheadChanged { frame: 0 });
    }

    #[test]
    fn shortening_a_scene_pulls_playhead_back_inside_composition() {
        let mut engine = loaded_engine();
        engine
            .handle_command(Command::SetPlayhead { frame: 320 })
            .expect("set playhead should succeed");

        let events = engine
            .handle_command(Command::SetSceneDuration {
                scene_index: 2,
                duration_in_seconds: 2.0,
            })
            .expect("edit should succeed");

        let Event::CompositionChanged(snapshot) = &events[0] else {
            panic!("edit must emit CompositionChanged");
        };
        assert_eq!(snapshot.duration_frames, 270);
        assert_eq!(events[1], Event::PlayheadChanged { frame: 269 });
        assert_eq!(engine.playhead_frame(), 269);
    }

    #[test]
    fn editing_dialogue_resegments_only_that_scene() {
        let mut engine = loaded_engine();

        let events = engine
            .handle_command(Command::EditDialogue {
                scene_index: 1,
                dialogue: "ずんだもん：なるほど。わかったのだ。".to_string(),
            })
            .expect("edit should succeed");

        assert_eq!(events.len(), 1);
        let Event::CompositionChanged(snapshot) = &events[0] else {
            panic!("edit must emit CompositionChanged");
        };
        assert_eq!(snapshot.scenes[1].subtitle_count, 2);
        assert_eq!(snapshot.duration_frames, 330);
    }

    #[test]
    fn failed_edit_leaves_storyboard_untouched() {
        let mut engine = loaded_engine();

        let error = engine
            .handle_command(Command::SetSceneDuration {
                scene_index: 0,
                duration_in_seconds: f64::NAN,
            })
            .expect_err("NaN duration must be rejected");
        assert_eq!(EngineErrorEvent::from_error(&error).kind, EngineErrorKind::InvalidInput);

        let error = engine
            .handle_command(Command::EditDialogue {
                scene_index: 9,
                dialogue: String::new(),
            })
            .expect_err("missing scene must be rejected");
        assert_eq!(
            EngineErrorEvent::from_error(&error).kind,
            EngineErrorKind::SceneIndexOutOfRange
        );

        let error = engine
            .handle_command(Command::UpdateSettings {
                settings: CompositionSettings {
                    overlap_frames: -1,
                    ..CompositionSettings::default()
                },
            })
            .expect_err("invalid settings must be rejected");
        assert!(matches!(error, EngineError::InvalidSettings { .. }));

        let storyboard = engine.storyboard().expect("still loaded");
        assert_eq!(storyboard.scenes[0].duration_in_seconds, 5.0);
        assert_eq!(storyboard.settings.overlap_frames, 15);
        assert_eq!(engine.composition().expect("composition").duration_frames(), 330);
    }

    #[test]
    fn update_settings_rebuilds_with_new_frame_rate() {
        let mut engine = loaded_engine();
        let settings = CompositionSettings {
            fps: crate::FrameRate::new(60).expect("valid"),
            overlap_frames: 30,
            ..CompositionSettings::default()
        };

        let events = engine
            .handle_command(Command::UpdateSettings { settings })
            .expect("settings should apply");

        let Event::CompositionChanged(snapshot) = &events[0] else {
            panic!("settings must emit CompositionChanged");
        };
        assert_eq!(snapshot.fps, 60);
        assert_eq!(snapshot.duration_frames, 660);
    }

    #[test]
    fn replace_scenes_starts_a_storyboard_when_none_is_loaded() {
        let mut engine = Engine::new(MockStorage::default());

        let events = engine
            .handle_command(Command::ReplaceScenes {
                scenes: vec![Scene::new("じぇんば:やあ。", 1.0)],
            })
            .expect("replace should succeed");

        assert_eq!(events.len(), 2);
        assert_eq!(engine.composition().expect("composition").duration_frames(), 30);
    }

    #[test]
    fn export_writes_rendered_subtitles_through_storage() {
        let storage = MockStorage::with_file("board.json", BOARD);
        let files = storage.files();
        let mut engine = Engine::new(storage);
        engine
            .handle_command(Command::LoadStoryboard {
                path: PathBuf::from("board.json"),
            })
            .expect("load should succeed");

        let events = engine
            .handle_command(Command::ExportSubtitles {
                path: PathBuf::from("out.vtt"),
                format: SubtitleFormat::WebVtt,
            })
            .expect("export should succeed");

        assert_eq!(
            events,
            vec![Event::SubtitlesExported {
                path: PathBuf::from("out.vtt"),
                cue_count: 4,
            }]
        );
        let files = files.lock().expect("lock files");
        let written = files.get(Path::new("out.vtt")).expect("file written");
        assert!(written.starts_with("WEBVTT\n\n00:00:00.000 --> "));
        assert!(written.contains("\nそうなのだ。\n"));
    }

    #[test]
    fn save_round_trips_through_storage() {
        let storage = MockStorage::with_file("board.json", BOARD);
        let files = storage.files();
        let mut engine = Engine::new(storage);
        engine
            .handle_command(Command::LoadStoryboard {
                path: PathBuf::from("board.json"),
            })
            .expect("load should succeed");
        engine
            .handle_command(Command::EditDialogue {
                scene_index: 2,
                dialogue: "じぇんば:おわり。".to_string(),
            })
            .expect("edit should succeed");

        let events = engine
            .handle_command(Command::SaveStoryboard {
                path: PathBuf::from("saved.json"),
            })
            .expect("save should succeed");

        assert_eq!(
            events,
            vec![Event::StoryboardSaved {
                path: PathBuf::from("saved.json")
            }]
        );
        let files = files.lock().expect("lock files");
        let saved = Storyboard::from_json(Path::new("saved.json"), &files[Path::new("saved.json")])
            .expect("saved storyboard should parse");
        assert_eq!(saved.scenes[2].dialogue, "じぇんば:おわり。");
        assert_eq!(saved.scenes[0].audio_url.as_deref(), Some("blob:0"));
    }

    fn loaded_engine() -> Engine<MockStorage> {
        let mut engine = Engine::new(MockStorage::with_file("board.json", BOARD));
        engine
            .handle_command(Command::LoadStoryboard {
                path: PathBuf::from("board.json"),
            })
            .expect("load should succeed");
        engine
    }

    #[derive(Debug, Default)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<PathBuf, String>>>,
    }

    impl MockStorage {
        fn with_file(path: &str, contents: &str) -> Self {
            let storage = Self::default();
            storage
                .files
                .lock()
                .expect("lock files")
                .insert(PathBuf::from(path), contents.to_string());
            storage
        }

        fn files(&self) -> Arc<Mutex<HashMap<PathBuf, String>>> {
            Arc::clone(&self.files)
        }
    }

    impl Storage for MockStorage {
        fn load_storyboard(&self, path: &Path) -> crate::Result<Storyboard> {
            let files = self.files.lock().expect("lock files");
            let json = files.get(path).ok_or_else(|| EngineError::Io {
                context: "failed to read storyboard",
                path: path.to_path_buf(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
            })?;
            Storyboard::from_json(path, json)
        }

        fn save_storyboard(&self, path: &Path, storyboard: &Storyboard) -> crate::Result<()> {
            let json = storyboard.to_json(path)?;
            self.write_text(path, &json)
        }

        fn write_text(&self, path: &Path, contents: &str) -> crate::Result<()> {
            self.files
                .lock()
                .expect("lock files")
                .insert(path.to_path_buf(), contents.to_string());
            Ok(())
        }
    }
}
