//! A `TrackedBlob` is a blob's identity carried across frames: position
//! history, travel, and the running statistics the tracker uses to decide
//! which blob (if any) is this track's continuation next frame.

use crate::config::TrackerConfig;
use crate::core_modules::blob::Blob;

/// The individual terms behind a match score. Kept apart from the scalar
/// total so a caller can see which penalty dominated a decision.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScoreBreakdown {
    pub position: f64,
    pub area: f64,
    pub aspect_ratio: f64,
    pub temperature: f64,
    pub direction: f64,
    pub edge_penalty: f64,
    /// Bookkeeping only: never folded into `total()`, since it reflects a
    /// track's age rather than how well a candidate blob matches it.
    pub dead_frame: f64,
}

impl ScoreBreakdown {
    pub fn total(&self) -> f64 {
        self.position + self.area + self.aspect_ratio + self.temperature + self.direction
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TrackedBlob {
    pub id: u64,
    pub snapshot: Blob,
    pub predicted_position: Option<(f64, f64)>,
    /// Cumulative signed displacement since creation; drives direction
    /// classification at track end.
    pub travel: (f64, f64),
    /// Cumulative absolute displacement since creation (path length, not
    /// net displacement).
    pub total_travel: (f64, f64),
    pub start_pos: (f64, f64),
    pub start_time_ms: u64,
    pub event_duration_ms: u64,
    pub times_updated: u32,
    pub max_size: u32,
    pub max_width: u32,
    pub max_height: u32,
    pub num_dead_frames: u32,
    pub max_num_dead_frames: u32,
    pub last_scores: ScoreBreakdown,
    pub average_scores: ScoreBreakdown,
    pub max_difference: f64,
    pub average_difference: f64,
    pub has_updated: bool,
}

impl TrackedBlob {
    pub fn new(id: u64, blob: Blob, now_ms: u64) -> Self {
        let start_pos = blob.centroid();
        Self {
            id,
            snapshot: blob,
            predicted_position: None,
            travel: (0.0, 0.0),
            total_travel: (0.0, 0.0),
            start_pos,
            start_time_ms: now_ms,
            event_duration_ms: 0,
            times_updated: 0,
            max_size: blob.num_pixels,
            max_width: blob.width(),
            max_height: blob.height(),
            num_dead_frames: 0,
            max_num_dead_frames: 0,
            last_scores: ScoreBreakdown::default(),
            average_scores: ScoreBreakdown::default(),
            max_difference: 0.0,
            average_difference: 0.0,
            has_updated: true,
        }
    }

    /// Whether this track's last-known centroid sits against either edge of
    /// the frame, where the direction penalty is suppressed (a real target
    /// walking off-frame looks identical to one whose blob just shrank).
    ///
    /// Preserves the source predicate literally, right-side clause included:
    /// `centroid_x + width/2 <= frame_width - 1` reads as "near the right
    /// edge" but is satisfied by nearly every centroid in-frame, not just
    /// ones close to the edge. Left uncorrected because fixing it would
    /// change edge_penalty for most right-of-center tracks; see the
    /// grounding ledger for the call to preserve it as-is.
    pub fn touches_side(centroid_x: f64, width: u32, frame_width: u32) -> bool {
        let half_width = width as f64 / 2.0;
        centroid_x - half_width <= 1.0 || centroid_x + half_width <= frame_width as f64 - 1.0
    }

    /// Scores `candidate` against this track's current state. Lower is
    /// better; penalties are additive so any single large mismatch can push
    /// the total past `max_difference_threshold` on its own.
    pub fn difference(
        &self,
        candidate: &Blob,
        config: &TrackerConfig,
        frame_width: u32,
    ) -> ScoreBreakdown {
        let (track_x, track_y) = self.snapshot.centroid();
        let (cand_x, cand_y) = candidate.centroid();
        let half_width = frame_width as f64 / 2.0;

        let at_side = Self::touches_side(track_x, self.snapshot.width(), frame_width);
        let edge_penalty = if at_side {
            1.0 - (half_width - cand_x).abs() / half_width
        } else {
            1.0
        };

        // Extrapolated position if this track has moved before, else its raw
        // last-known centroid.
        let (predicted_x, predicted_y) = self.predicted_position.unwrap_or((track_x, track_y));

        let position =
            ((predicted_x - cand_x).abs() + (predicted_y - cand_y).abs()) * config.position_penalty * edge_penalty;

        let area = (candidate.num_pixels as f64 - self.snapshot.num_pixels as f64).abs()
            * config.area_penalty
            * edge_penalty;

        let aspect_ratio = (candidate.aspect_ratio() - self.snapshot.aspect_ratio()).abs()
            * config.aspect_ratio_penalty
            * edge_penalty;

        let temperature = (candidate.average_temperature() - self.snapshot.average_temperature())
            .abs()
            * config.temperature_penalty;

        let direction = if !at_side && self.times_updated > 1 {
            let latest_direction = predicted_x - track_x;
            if latest_direction.signum() != self.travel.0.signum() {
                config.direction_penalty
            } else {
                0.0
            }
        } else {
            0.0
        };

        ScoreBreakdown {
            position,
            area,
            aspect_ratio,
            temperature,
            direction,
            edge_penalty,
            dead_frame: self.num_dead_frames as f64 * config.dead_frame_penalty(),
        }
    }

    /// Absorbs a newly matched blob: updates running score statistics, then
    /// position/travel history, then replaces the snapshot.
    pub fn update_blob(
        &mut self,
        candidate: Blob,
        now_ms: u64,
        config: &TrackerConfig,
        frame_width: u32,
    ) {
        let scores = self.difference(&candidate, config, frame_width);
        let total = scores.total();
        let t = self.times_updated as f64;

        self.last_scores = scores;
        self.average_scores = ScoreBreakdown {
            position: (self.average_scores.position * t + scores.position) / (t + 1.0),
            area: (self.average_scores.area * t + scores.area) / (t + 1.0),
            aspect_ratio: (self.average_scores.aspect_ratio * t + scores.aspect_ratio) / (t + 1.0),
            temperature: (self.average_scores.temperature * t + scores.temperature) / (t + 1.0),
            direction: (self.average_scores.direction * t + scores.direction) / (t + 1.0),
            edge_penalty: (self.average_scores.edge_penalty * t + scores.edge_penalty) / (t + 1.0),
            dead_frame: (self.average_scores.dead_frame * t + scores.dead_frame) / (t + 1.0),
        };
        self.max_difference = self.max_difference.max(total);
        self.average_difference = (self.average_difference * t + total) / (t + 1.0);

        let (track_x, track_y) = self.snapshot.centroid();
        let (cand_x, cand_y) = candidate.centroid();
        let movement = (cand_x - track_x, cand_y - track_y);
        self.predicted_position = Some((cand_x + movement.0, cand_y + movement.1));
        self.travel = (self.travel.0 + movement.0, self.travel.1 + movement.1);
        self.total_travel =
            (self.total_travel.0 + movement.0.abs(), self.total_travel.1 + movement.1.abs());

        self.snapshot = candidate;
        self.max_size = self.max_size.max(candidate.num_pixels);
        self.max_width = self.max_width.max(candidate.width());
        self.max_height = self.max_height.max(candidate.height());
        self.has_updated = true;
        self.max_num_dead_frames = self.max_num_dead_frames.max(self.num_dead_frames);
        self.num_dead_frames = 0;
        self.times_updated += 1;
        self.event_duration_ms = now_ms.saturating_sub(self.start_time_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob_at(row: usize, col: usize, size: usize, temperature: f64) -> Blob {
        let mut b = Blob::new();
        for dr in 0..size {
            b.add_pixel(crate::core_modules::pixel::Pixel {
                row: row + dr,
                col,
                temperature,
            });
        }
        b
    }

    #[test]
    fn touches_side_flags_blobs_near_either_edge() {
        assert!(TrackedBlob::touches_side(0.5, 2, 16));
        assert!(TrackedBlob::touches_side(15.0, 2, 16));
        // The literal (preserved) right-side clause fires for most of the
        // frame, not just the right edge — see the doc comment above.
        assert!(TrackedBlob::touches_side(8.0, 2, 16));
        assert!(!TrackedBlob::touches_side(15.9, 0, 16));
    }

    #[test]
    fn identical_candidate_scores_near_zero() {
        let blob = blob_at(0, 5, 2, 30.0);
        let track = TrackedBlob::new(1, blob, 0);
        let cfg = TrackerConfig::default();
        let scores = track.difference(&blob, &cfg, 16);
        assert_eq!(scores.total(), 0.0);
    }

    #[test]
    fn update_blob_advances_travel_and_resets_dead_frames() {
        let blob = blob_at(1, 5, 1, 30.0);
        let mut track = TrackedBlob::new(1, blob, 0);
        track.num_dead_frames = 2;
        let cfg = TrackerConfig::default();

        let moved = blob_at(1, 7, 1, 30.0);
        track.update_blob(moved, 100, &cfg, 16);

        assert_eq!(track.times_updated, 1);
        assert_eq!(track.num_dead_frames, 0);
        assert_eq!(track.max_num_dead_frames, 2);
        assert_eq!(track.travel.0, 2.0);
        assert_eq!(track.total_travel.0, 2.0);
        assert!(track.has_updated);
    }

    #[test]
    fn direction_penalty_fires_when_prediction_contradicts_travel() {
        // direction_difference compares the track's own predicted position
        // against its last known centroid — it never depends on the
        // candidate being scored. In ordinary operation predicted_position
        // is always consistent with travel (see update_blob), so this can
        // only be exercised by constructing a track whose bookkeeping has
        // been set inconsistently, e.g. after an external clock jump.
        let blob = blob_at(1, 15, 1, 30.0); // col 15: the one position where
        let mut track = TrackedBlob::new(1, blob, 0); // touches_side is false.
        track.times_updated = 2;
        track.travel = (1.0, 0.0); // established rightward travel
        track.predicted_position = Some((14.0, 1.0)); // but predicts leftward

        let cfg = TrackerConfig::default();
        let candidate = blob_at(1, 14, 1, 30.0);
        let scores = track.difference(&candidate, &cfg, 16);
        assert_eq!(scores.direction, cfg.direction_penalty);
    }

    #[test]
    fn direction_penalty_never_fires_through_ordinary_updates() {
        // Consistent travel/prediction bookkeeping, as produced by
        // `update_blob`, always keeps latest_direction's sign equal to
        // travel's sign, so the penalty stays at zero in normal use.
        let blob = blob_at(1, 13, 1, 30.0);
        let mut track = TrackedBlob::new(1, blob, 0);
        let cfg = TrackerConfig::default();

        track.update_blob(blob_at(1, 14, 1, 30.0), 10, &cfg, 16);
        track.update_blob(blob_at(1, 15, 1, 30.0), 20, &cfg, 16);

        let candidate = blob_at(1, 14, 1, 30.0);
        let scores = track.difference(&candidate, &cfg, 16);
        assert_eq!(scores.direction, 0.0);
    }
}
