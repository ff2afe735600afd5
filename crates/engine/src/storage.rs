use std::path::Path;

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::storyboard::Storyboard;

/// File operations required by the engine.
pub trait Storage {
    /// Reads and parses a storyboard document.
    fn load_storyboard(&self, path: &Path) -> Result<Storyboard>;

    /// Writes a storyboard document.
    fn save_storyboard(&self, path: &Path, storyboard: &Storyboard) -> Result<()>;

    /// Writes exported text such as subtitle files.
    fn write_text(&self, path: &Path, contents: &str) -> Result<()>;
}

/// Local filesystem storage used by production wiring.
#[derive(Debug, Default, Clone, Copy)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn load_storyboard(&self, path: &Path) -> Result<Storyboard> {
        let json = std::fs::read_to_string(path).map_err(|source| EngineError::Io {
            context: "failed to read storyboard",
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = ?path, bytes = json.len(), "storyboard read");
        Storyboard::from_json(path, &json)
    }

    fn save_storyboard(&self, path: &Path, storyboard: &Storyboard) -> Result<()> {
        let json = storyboard.to_json(path)?;
        self.write_text(path, &json)
    }

    fn write_text(&self, path: &Path, contents: &str) -> Result<()> {
        std::fs::write(path, contents).map_err(|source| EngineError::Io {
            context: "failed to write file",
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = ?path, bytes = contents.len(), "file written");
        Ok(())
    }
}
