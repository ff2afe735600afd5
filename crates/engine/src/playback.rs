//! Per-frame presentation values for a scene: slide-in, entrance and progress.
//!
//! Everything here runs once per displayed frame, so it stays arithmetic
//! only.

use serde::{Deserialize, Serialize};

use crate::time::FrameRate;

pub const DEFAULT_TRANSITION_FRAMES: i64 = 15;
pub const DEFAULT_ENTRANCE_DELAY_FRAMES: i64 = 10;

const CRITICAL_DAMPING_TOLERANCE: f64 = 1e-9;

/// Physical parameters of the entrance spring.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SpringConfig {
    pub mass: f64,
    pub stiffness: f64,
    pub damping: f64,
}

impl Default for SpringConfig {
    /// Critically damped: rises to 1 without overshoot.
    fn default() -> Self {
        Self {
            mass: 1.0,
            stiffness: 100.0,
            damping: 20.0,
        }
    }
}

impl SpringConfig {
    /// Position of a unit spring released from rest at 0, after `seconds`.
    ///
    /// Overshoot of under-damped springs is clamped to 1.
    pub fn value_at(&self, seconds: f64) -> f64 {
        if seconds <= 0.0 {
            return 0.0;
        }

        let omega = (self.stiffness / self.mass).sqrt();
        let zeta = self.damping / (2.0 * (self.stiffness * self.mass).sqrt());
        if !omega.is_finite() || !zeta.is_finite() || omega <= 0.0 {
            return 1.0;
        }

        let value = if (zeta - 1.0).abs() < CRITICAL_DAMPING_TOLERANCE {
            1.0 - (-omega * seconds).exp() * (1.0 + omega * seconds)
        } else if zeta < 1.0 {
            let damped = omega * (1.0 - zeta * zeta).sqrt();
            let envelope = (-zeta * omega * seconds).exp();
            1.0 - envelope
                * ((damped * seconds).cos() + zeta * omega / damped * (damped * seconds).sin())
        } else {
            let root = (zeta * zeta - 1.0).sqrt();
            let fast = -omega * (zeta + root);
            let slow = -omega * (zeta - root);
            1.0 - (fast * (slow * seconds).exp() - slow * (fast * seconds).exp()) / (fast - slow)
        };

        value.clamp(0.0, 1.0)
    }
}

/// Timing of per-scene animations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PlaybackConfig {
    pub transition_frames: i64,
    /// Entrance start for every scene after the first.
    pub entrance_delay_frames: i64,
    pub spring: SpringConfig,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            transition_frames: DEFAULT_TRANSITION_FRAMES,
            entrance_delay_frames: DEFAULT_ENTRANCE_DELAY_FRAMES,
            spring: SpringConfig::default(),
        }
    }
}

/// Presentation values for one scene at one frame, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackState {
    pub slide_in: f64,
    pub entrance: f64,
    pub progress: f64,
}

/// Computes [`PlaybackState`] values for scenes of one composition.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackResolver {
    fps: FrameRate,
    config: PlaybackConfig,
}

impl PlaybackResolver {
    pub fn new(fps: FrameRate, config: PlaybackConfig) -> Self {
        Self { fps, config }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Resolves a scene at `local_frame` frames after its start.
    ///
    /// # Example
    /// ```
    /// use engine::{FrameRate, PlaybackConfig, PlaybackResolver};
    ///
    /// let resolver = PlaybackResolver::new(FrameRate::new(30).expect("valid"), PlaybackConfig::default());
    /// let state = resolver.resolve(0, 90, false);
    /// assert_eq!(state.slide_in, 0.0);
    /// assert_eq!(state.entrance, 0.0);
    /// assert_eq!(state.progress, 0.0);
    ///
    /// let state = resolver.resolve(90, 90, false);
    /// assert_eq!(state.slide_in, 1.0);
    /// assert_eq!(state.progress, 1.0);
    /// ```
    pub fn resolve(&self, local_frame: i64, duration_frames: i64, is_first: bool) -> PlaybackState {
        let (slide_in, delay) = if is_first {
            (1.0, 0)
        } else {
            (
                slide_in_progress(local_frame, self.config.transition_frames),
                self.config.entrance_delay_frames,
            )
        };

        PlaybackState {
            slide_in,
            entrance: entrance_progress(
                local_frame as f64,
                delay as f64,
                self.fps,
                &self.config.spring,
            ),
            progress: progress_fraction(local_frame, duration_frames),
        }
    }

    /// Entrance of a subtitle chunk, `chunk_frame` frames after it appeared.
    pub fn subtitle_entrance(&self, chunk_frame: f64) -> f64 {
        entrance_progress(chunk_frame, 0.0, self.fps, &self.config.spring)
    }
}

/// Eased slide-in over the first `transition_frames` frames.
pub fn slide_in_progress(local_frame: i64, transition_frames: i64) -> f64 {
    if transition_frames <= 0 {
        return if local_frame >= 0 { 1.0 } else { 0.0 };
    }
    if local_frame <= 0 {
        return 0.0;
    }
    if local_frame >= transition_frames {
        return 1.0;
    }
    ease_in_out_cubic(local_frame as f64 / transition_frames as f64)
}

/// Spring rise starting `delay_frames` after the scene start.
pub fn entrance_progress(
    local_frame: f64,
    delay_frames: f64,
    fps: FrameRate,
    spring: &SpringConfig,
) -> f64 {
    if local_frame < delay_frames {
        return 0.0;
    }
    spring.value_at(fps.frames_to_seconds(local_frame - delay_frames))
}

/// Elapsed fraction of the scene, clamped to `[0, 1]`.
pub fn progress_fraction(local_frame: i64, duration_frames: i64) -> f64 {
    if duration_frames <= 0 {
        return if local_frame >= 0 { 1.0 } else { 0.0 };
    }
    (local_frame as f64 / duration_frames as f64).clamp(0.0, 1.0)
}

fn ease_in_out_cubic(x: f64) -> f64 {
    if x < 0.5 {
        4.0 * x * x * x
    } else {
        1.0 - (-2.0 * x + 2.0).powi(3) / 2.0
    }
}
