use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{EngineError, Result};

/// Products within this distance of a whole frame count are not rounded up.
const FRAME_EPSILON: f64 = 1e-9;

/// Default playback rate of compositions.
pub const DEFAULT_FPS: u32 = 30;

/// Validated integer frame rate shared by the whole composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct FrameRate(u32);

impl FrameRate {
    /// Creates a validated frame rate.
    ///
    /// # Example
    /// ```
    /// use engine::FrameRate;
    ///
    /// let fps = FrameRate::new(30).expect("valid");
    /// assert_eq!(fps.get(), 30);
    /// assert!(FrameRate::new(0).is_err());
    /// ```
    pub fn new(fps: u32) -> Result<Self> {
        if fps == 0 {
            return Err(EngineError::InvalidFrameRate { fps });
        }
        Ok(Self(fps))
    }

    /// Returns frames per second.
    pub fn get(self) -> u32 {
        self.0
    }

    /// Converts seconds into a whole frame count, rounding up.
    ///
    /// Negative and non-finite inputs map to zero frames.
    ///
    /// # Example
    /// ```
    /// use engine::FrameRate;
    ///
    /// let fps = FrameRate::new(30).expect("valid");
    /// assert_eq!(fps.seconds_to_frames(5.0), 150);
    /// assert_eq!(fps.seconds_to_frames(0.1), 3);
    /// assert_eq!(fps.seconds_to_frames(1.01), 31);
    /// ```
    pub fn seconds_to_frames(self, seconds: f64) -> i64 {
        if !seconds.is_finite() || seconds <= 0.0 {
            if seconds != 0.0 {
                warn!(seconds, "scene duration clamped to zero frames");
            }
            return 0;
        }

        let exact = seconds * f64::from(self.0);
        let frames = (exact - FRAME_EPSILON).ceil();
        frames.clamp(0.0, i64::MAX as f64) as i64
    }

    /// Converts a (possibly fractional) frame position into seconds.
    pub fn frames_to_seconds(self, frames: f64) -> f64 {
        frames / f64::from(self.0)
    }
}

impl Default for FrameRate {
    fn default() -> Self {
        Self(DEFAULT_FPS)
    }
}

impl TryFrom<u32> for FrameRate {
    type Error = EngineError;

    fn try_from(value: u32) -> Result<Self> {
        Self::new(value)
    }
}

impl From<FrameRate> for u32 {
    fn from(value: FrameRate) -> Self {
        value.0
    }
}
