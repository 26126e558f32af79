//! A fixed-memory, real-time tracker for low-resolution thermopile sensor
//! grids. Feed [`Tracker::ingest`] one frame at a time; it builds an
//! adaptive background model, groups foreground pixels into blobs, tracks
//! them across frames, and classifies each finished track's net travel
//! direction.
//!
//! Every internal buffer is a fixed-size array sized from [`grid::WIDTH`],
//! [`grid::HEIGHT`], [`grid::MAX_BLOBS`] and [`grid::MAX_TRACKS`] — there is
//! no heap allocation in steady state.

pub mod config;
pub mod core_modules;
mod grid;

pub use config::{ConfigError, TrackerConfig};
pub use core_modules::blob::Blob;
pub use core_modules::direction::Direction;
pub use core_modules::tracked_blob::{ScoreBreakdown, TrackedBlob};
pub use core_modules::tracker::{Tracker, TrackEndEvent};
pub use grid::{Frame, HEIGHT, MAX_BLOBS, MAX_TRACKS, WIDTH};
