//! Tunable parameters for a [`crate::core_modules::tracker::Tracker`]. Every
//! threshold the core modules consult lives here rather than as a scattered
//! constant, so a deployment can retune the tracker for a different mounting
//! height or sensor without touching the algorithm.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TrackerConfig {
    /// Frames in the background build phase, and the window size of the
    /// steady-state EWMA.
    pub running_average_size: u32,
    /// Blobs with fewer pixels than this are discarded before matching.
    pub min_blob_size: u32,
    /// Minimum net travel (grid units) for a finished track to count as a
    /// directional movement rather than `NO_DIRECTION`.
    pub minimum_travel_threshold: f64,
    /// A track/blob pair scoring at or above this is never matched.
    pub max_difference_threshold: f64,
    /// Minimum `|x - mean|` (degrees) for a pixel to be considered active,
    /// regardless of sigma.
    pub minimum_temperature_differential: f64,
    /// `K` in the `K * sigma` activity gate.
    pub active_pixel_variance_scalar: f64,
    /// Frames a track may go unmatched before it is ended.
    pub max_dead_frames: u32,
    /// Chebyshev-distance slack added to strict 8-connectivity when grouping
    /// pixels into blobs.
    pub adjacency_fuzz: u32,
    pub position_penalty: f64,
    pub area_penalty: f64,
    pub aspect_ratio_penalty: f64,
    pub temperature_penalty: f64,
    pub direction_penalty: f64,
    /// Consecutive empty frames required before the background resumes
    /// absorbing frames, so a briefly-vacated scene doesn't immediately
    /// relearn around a lingering warm patch.
    pub unchanged_frame_delay: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            running_average_size: 800,
            min_blob_size: 3,
            minimum_travel_threshold: 4.0,
            max_difference_threshold: 400.0,
            minimum_temperature_differential: 0.5,
            active_pixel_variance_scalar: 4.0,
            max_dead_frames: 4,
            adjacency_fuzz: 1,
            position_penalty: 2.0,
            area_penalty: 5.0,
            aspect_ratio_penalty: 10.0,
            temperature_penalty: 10.0,
            direction_penalty: 50.0,
            unchanged_frame_delay: 50,
        }
    }
}

impl TrackerConfig {
    /// Penalty applied per accumulated dead frame. `max_dead_frames = 0` is
    /// legal (a track ends the instant it goes unmatched) and yields
    /// infinity here, which is harmless: this value never enters a
    /// matching-score total, only a track's own bookkeeping.
    pub fn dead_frame_penalty(&self) -> f64 {
        self.max_difference_threshold / self.max_dead_frames as f64
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.running_average_size == 0 {
            return Err(ConfigError::RunningAverageSizeZero);
        }
        if !(self.max_difference_threshold > 0.0) {
            return Err(ConfigError::MaxDifferenceThresholdNonPositive);
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("running_average_size must be greater than zero")]
    RunningAverageSizeZero,
    #[error("max_difference_threshold must be positive")]
    MaxDifferenceThresholdNonPositive,
}
