// THEORY:
// The `Tracker` is the top-level orchestrator of the whole pipeline. Its job is to
// turn a bare stream of frames into a stream of "object permanence": it does not
// merely react to what is hot in the current frame, it remembers what was hot a
// moment ago and decides whether this frame's blobs are a continuation of that,
// a brand-new arrival, or a momentary dropout that should not kill a track yet.
//
// Key architectural principles:
// 1.  **Fixed-Size Everything**: Tracks, blobs, and the difference matrix between
//     them all live in pre-sized arrays (`MAX_TRACKS`, `MAX_BLOBS`). There is no
//     growth, no heap churn per frame; saturation is handled by silently dropping
//     the excess rather than by allocating more room.
// 2.  **Greedy Global-Minimum Matching**: Rather than an optimal assignment
//     (Hungarian), the tracker repeatedly picks the single best (lowest-score)
//     track/blob pair left on the board, commits it, and removes both from
//     consideration. With at most 8 tracks and 8 blobs this is cheap, simple to
//     reason about, and matches the behavior this system is built to reproduce.
// 3.  **Strict Frame Ordering**: every `ingest()` call performs snapshot, extract,
//     match, age, finalize, compact, promote, background-update in that exact
//     order. Observer callbacks fire synchronously, in that order, and must never
//     re-enter `ingest`.
// 4.  **Background Is the Tracker's Problem, Not the Model's**: the background
//     model only knows how to mix a frame in; deciding *whether* a quiet frame
//     should be absorbed, or a long-static warm body should eventually be folded
//     back in despite still being "active," is lifecycle policy that lives here.

use crate::config::{ConfigError, TrackerConfig};
use crate::core_modules::background::BackgroundModel;
use crate::core_modules::blob::Blob;
use crate::core_modules::direction::Direction;
use crate::core_modules::extractor::{collect_active_pixels, group_into_blobs, prune_small_blobs};
use crate::core_modules::tracked_blob::TrackedBlob;
use crate::grid::{Frame, MAX_BLOBS, MAX_TRACKS, WIDTH};

/// Delivered to the track-end observer when a track is retired.
#[derive(Debug, Clone, Copy)]
pub struct TrackEndEvent {
    pub track: TrackedBlob,
    pub horizontal: Option<Direction>,
    pub vertical: Option<Direction>,
}

pub struct Tracker {
    frame: Frame,
    background: BackgroundModel,
    tracks: [Option<TrackedBlob>; MAX_TRACKS],
    movement_counters: [u64; Direction::COUNT],
    movement_changed: bool,
    num_unchanged_frames: u32,
    num_last_blobs: usize,
    next_track_id: u64,
    config: TrackerConfig,
    on_track_start: Option<Box<dyn FnMut(TrackedBlob)>>,
    on_track_end: Option<Box<dyn FnMut(&TrackEndEvent)>>,
}

impl Tracker {
    /// Builds a tracker with default configuration. The defaults are always
    /// valid, so this never fails; use [`Tracker::with_config`] for a
    /// fallible constructor over caller-supplied configuration.
    pub fn new() -> Self {
        Self::with_config(TrackerConfig::default()).expect("default config is always valid")
    }

    pub fn with_config(config: TrackerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let running_average_size = config.running_average_size;
        Ok(Self {
            frame: [[0.0; WIDTH]; crate::grid::HEIGHT],
            background: BackgroundModel::new(running_average_size),
            tracks: std::array::from_fn(|_| None),
            movement_counters: [0; Direction::COUNT],
            movement_changed: false,
            num_unchanged_frames: 0,
            num_last_blobs: 0,
            next_track_id: 0,
            config,
            on_track_start: None,
            on_track_end: None,
        })
    }

    pub fn set_track_start_observer<F: FnMut(TrackedBlob) + 'static>(&mut self, observer: F) {
        self.on_track_start = Some(Box::new(observer));
    }

    pub fn set_track_end_observer<F: FnMut(&TrackEndEvent) + 'static>(&mut self, observer: F) {
        self.on_track_end = Some(Box::new(observer));
    }

    /// Feeds one frame through the full pipeline. While the background is
    /// still in its build phase, the frame is absorbed and tracking is
    /// suppressed entirely (no blobs, no matching).
    pub fn ingest(&mut self, frame: &Frame, now_ms: u64) {
        self.frame = *frame;

        if !self.background.is_ready() {
            self.background.add_initial(&self.frame);
            self.num_last_blobs = 0;
            return;
        }

        let (active, active_count) = collect_active_pixels(&self.frame, &self.background, &self.config);
        let (mut blobs, mut num_blobs) = group_into_blobs(active, active_count, self.config.adjacency_fuzz);
        prune_small_blobs(&mut blobs, &mut num_blobs, self.config.min_blob_size);

        for track in self.tracks.iter_mut().flatten() {
            track.has_updated = false;
        }

        self.match_tracks_to_blobs(&mut blobs, num_blobs, now_ms);
        self.age_unmatched_tracks();
        self.finalize_dead_tracks(now_ms);
        self.compact_tracks();
        self.promote_unassigned_blobs(&blobs, num_blobs, now_ms);

        self.num_last_blobs = num_blobs;
        self.update_background(num_blobs);
    }

    fn match_tracks_to_blobs(&mut self, blobs: &mut [Blob; MAX_BLOBS], num_blobs: usize, now_ms: u64) {
        let threshold = self.config.max_difference_threshold;
        let mut differences = [[threshold; MAX_BLOBS]; MAX_TRACKS];

        for (t, track_slot) in self.tracks.iter().enumerate() {
            if let Some(track) = track_slot {
                for (b, blob) in blobs.iter().take(num_blobs).enumerate() {
                    differences[t][b] = track.difference(blob, &self.config, WIDTH as u32).total();
                }
            }
        }

        loop {
            let mut best: Option<(usize, usize, f64)> = None;
            for t in 0..MAX_TRACKS {
                if self.tracks[t].is_none() {
                    continue;
                }
                for b in 0..num_blobs {
                    let score = differences[t][b];
                    if score < threshold && best.map_or(true, |(_, _, best_score)| score < best_score) {
                        best = Some((t, b, score));
                    }
                }
            }

            let Some((t, b, _)) = best else { break };
            let candidate = blobs[b];
            if let Some(track) = &mut self.tracks[t] {
                track.update_blob(candidate, now_ms, &self.config, WIDTH as u32);
            }
            blobs[b].assigned = true;
            for row in differences.iter_mut() {
                row[b] = threshold;
            }
            differences[t] = [threshold; MAX_BLOBS];
        }
    }

    fn age_unmatched_tracks(&mut self) {
        for track in self.tracks.iter_mut().flatten() {
            if !track.has_updated {
                track.num_dead_frames += 1;
            }
        }
    }

    fn finalize_dead_tracks(&mut self, _now_ms: u64) {
        for slot in self.tracks.iter_mut() {
            let should_end = matches!(
                slot,
                Some(track) if !track.has_updated && track.num_dead_frames >= self.config.max_dead_frames
            );
            if should_end {
                if let Some(track) = slot.take() {
                    self.retire(track);
                }
            }
        }
    }

    fn retire(&mut self, track: TrackedBlob) {
        let horizontal = if track.travel.0.abs() > self.config.minimum_travel_threshold {
            Some(if track.travel.0 < 0.0 { Direction::Left } else { Direction::Right })
        } else {
            None
        };
        let vertical = if track.travel.1.abs() > self.config.minimum_travel_threshold {
            Some(if track.travel.1 > 0.0 { Direction::Up } else { Direction::Down })
        } else {
            None
        };

        if let Some(direction) = horizontal {
            self.movement_counters[direction.index()] += 1;
        }
        if let Some(direction) = vertical {
            self.movement_counters[direction.index()] += 1;
        }
        if horizontal.is_none() && vertical.is_none() {
            self.movement_counters[Direction::NoDirection.index()] += 1;
        }
        self.movement_changed = true;

        let event = TrackEndEvent { track, horizontal, vertical };
        if let Some(observer) = &mut self.on_track_end {
            observer(&event);
        }
    }

    fn compact_tracks(&mut self) {
        let mut write = 0;
        for read in 0..MAX_TRACKS {
            if self.tracks[read].is_some() {
                if write != read {
                    self.tracks[write] = self.tracks[read].take();
                }
                write += 1;
            }
        }
    }

    fn promote_unassigned_blobs(&mut self, blobs: &[Blob; MAX_BLOBS], num_blobs: usize, now_ms: u64) {
        for blob in blobs.iter().take(num_blobs) {
            if blob.assigned {
                continue;
            }
            let Some(slot) = self.tracks.iter().position(|t| t.is_none()) else {
                tracing::warn!("MAX_TRACKS saturated; dropping new blob");
                continue;
            };
            let id = self.next_track_id;
            self.next_track_id = self.next_track_id.wrapping_add(1);
            let track = TrackedBlob::new(id, *blob, now_ms);
            if let Some(observer) = &mut self.on_track_start {
                observer(track);
            }
            self.tracks[slot] = Some(track);
        }
    }

    fn update_background(&mut self, num_blobs: usize) {
        if num_blobs == 0 {
            self.num_unchanged_frames = 0;
            self.background.add_rolling(&self.frame);
        } else {
            self.num_unchanged_frames += 1;
            if self.num_unchanged_frames > self.config.unchanged_frame_delay {
                self.background.add_rolling(&self.frame);
            }
        }
    }

    pub fn is_background_ready(&self) -> bool {
        self.background.is_ready()
    }

    pub fn num_last_blobs(&self) -> usize {
        self.num_last_blobs
    }

    pub fn background_mean_frame(&self) -> &Frame {
        self.background.mean_frame()
    }

    pub fn background_sigma_frame(&self) -> &Frame {
        self.background.sigma_frame()
    }

    pub fn average_ambient_temperature(&self) -> f64 {
        self.background.average_ambient_temperature()
    }

    pub fn tracks(&self) -> impl Iterator<Item = &TrackedBlob> {
        self.tracks.iter().flatten()
    }

    /// Copies the current movement counters into `out`, then clears the
    /// "new movements since last read" flag. The counters themselves are
    /// left untouched — call [`Tracker::reset_movements`] to zero them.
    pub fn read_movement_counters(&mut self, out: &mut [u64; Direction::COUNT]) {
        *out = self.movement_counters;
        self.movement_changed = false;
    }

    pub fn has_new_movements(&self) -> bool {
        self.movement_changed
    }

    pub fn reset_movements(&mut self) {
        self.movement_counters = [0; Direction::COUNT];
        self.movement_changed = false;
    }

    pub fn reset_background(&mut self) {
        self.background.reset();
        self.num_unchanged_frames = 0;
    }

    /// Returns the tracker to a freshly-constructed state: restarts the
    /// background build phase, drops all live tracks, and clears movement
    /// counters. Track identities assigned before the reset are never
    /// reused, since `next_track_id` is left untouched.
    pub fn reset(&mut self) {
        self.reset_background();
        self.tracks = std::array::from_fn(|_| None);
        self.reset_movements();
        self.num_last_blobs = 0;
    }
}

impl Default for Tracker {
    fn default() -> Self {
        Self::new()
    }
}
