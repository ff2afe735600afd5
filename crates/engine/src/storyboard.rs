use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::composition::Composition;
use crate::error::{EngineError, Result};
use crate::settings::CompositionSettings;
use crate::timeline::Scene;

/// Storyboard document: settings plus the ordered scene list.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Storyboard {
    #[serde(default)]
    pub settings: CompositionSettings,
    pub scenes: Vec<Scene>,
}

impl Storyboard {
    pub fn new(settings: CompositionSettings, scenes: Vec<Scene>) -> Self {
        Self { settings, scenes }
    }

    /// Parses a storyboard document read from `path`.
    ///
    /// # Example
    /// ```
    /// use std::path::Path;
    ///
    /// use engine::Storyboard;
    ///
    /// let json = r#"{ "scenes": [{ "dialogue": "じぇんば:やあ。", "durationInSeconds": 2 }] }"#;
    /// let storyboard = Storyboard::from_json(Path::new("board.json"), json).expect("valid");
    /// assert_eq!(storyboard.scenes.len(), 1);
    /// assert_eq!(storyboard.settings.fps.get(), 30);
    /// ```
    pub fn from_json(path: &Path, json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|source| EngineError::StoryboardSerialization {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Serializes the storyboard as pretty-printed JSON destined for `path`.
    pub fn to_json(&self, path: &Path) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|source| EngineError::StoryboardSerialization {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Builds the composition for the current scenes and settings.
    pub fn composition(&self) -> Result<Composition> {
        Composition::build(&self.scenes, &self.settings)
    }

    /// Replaces the dialogue of one scene.
    pub fn set_dialogue(&mut self, scene_index: usize, dialogue: String) -> Result<()> {
        self.scene_mut(scene_index)?.dialogue = dialogue;
        Ok(())
    }

    /// Replaces the duration of one scene.
    ///
    /// Negative and non-finite durations are rejected.
    pub fn set_duration(&mut self, scene_index: usize, seconds: f64) -> Result<()> {
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(EngineError::InvalidSceneDuration {
                scene_index,
                seconds,
            });
        }
        self.scene_mut(scene_index)?.duration_in_seconds = seconds;
        Ok(())
    }

    fn scene_mut(&mut self, scene_index: usize) -> Result<&mut Scene> {
        let scene_count = self.scenes.len();
        self.scenes
            .get_mut(scene_index)
            .ok_or(EngineError::SceneIndexOutOfRange {
                scene_index,
                scene_count,
            })
    }
}
