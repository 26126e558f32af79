// THEORY:
// The `BackgroundModel` is the tracker's notion of "the empty scene" — every other
// module's idea of "foreground" is defined relative to what this model believes is
// quiet. It learns per-pixel {mean, sigma} in two phases.
//
// Key architectural principles:
// 1.  **Two-Phase Learning**: a one-time Welford build phase (`add_initial`)
//     establishes a numerically stable mean and M2 (sum of squared deviations)
//     over the first `running_average_size` frames without ever revisiting an
//     earlier frame, then converts M2 to a sample standard deviation exactly
//     once. Steady state (`add_rolling`) switches to an exponentially-weighted
//     update that keeps tracking slow drift (sun angle, HVAC cycling).
// 2.  **The Model Doesn't Decide, It Mixes**: whether a frame *should* be
//     absorbed (quiet scene vs. a long-static warm body) is lifecycle policy
//     that belongs to the tracker, not here; this model only knows how to fold
//     in whatever frame it is handed.
// 3.  **Robust, Not Exact**: `sigma` in steady state is an EWMA of absolute
//     deviation, not a true standard deviation, and drifts from the build-phase
//     estimate over time. That's accepted because the activity gate only needs
//     a robust scale estimate, not a statistically exact one.
// 4.  **NaN-Safe by Construction**: a non-finite pixel is skipped per-cell in
//     both phases, so one bad sample never poisons that cell's mean permanently.

use crate::grid::{Frame, HEIGHT, WIDTH};

#[derive(Debug, Clone)]
pub struct BackgroundModel {
    mean: Frame,
    m2: Frame,
    sigma: Frame,
    frame_count: u32,
    finalized: bool,
    running_average_size: u32,
}

impl BackgroundModel {
    pub fn new(running_average_size: u32) -> Self {
        Self {
            mean: [[0.0; WIDTH]; HEIGHT],
            m2: [[0.0; WIDTH]; HEIGHT],
            sigma: [[0.0; WIDTH]; HEIGHT],
            frame_count: 0,
            finalized: false,
            running_average_size,
        }
    }

    /// Clears the frame count so the next `add_initial` call restarts the
    /// build phase. Mean/sigma are overwritten lazily on that call rather
    /// than zeroed here, mirroring the "first frame reinitialises mean"
    /// rule below.
    pub fn reset(&mut self) {
        self.frame_count = 0;
        self.finalized = false;
    }

    pub fn is_ready(&self) -> bool {
        self.frame_count >= self.running_average_size
    }

    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// Welford's online mean/variance, one frame at a time. NaN/Infinity
    /// pixels are skipped per-cell so a bad sample never poisons that
    /// cell's mean permanently.
    pub fn add_initial(&mut self, frame: &Frame) {
        let n = self.frame_count as f64;
        for row in 0..HEIGHT {
            for col in 0..WIDTH {
                let x = frame[row][col];
                if !x.is_finite() {
                    continue;
                }
                if self.frame_count == 0 {
                    self.mean[row][col] = x;
                    self.m2[row][col] = 0.0;
                } else {
                    let delta = x - self.mean[row][col];
                    self.mean[row][col] += delta / (n + 1.0);
                    self.m2[row][col] += delta * (x - self.mean[row][col]);
                }
            }
        }
        self.frame_count += 1;

        if !self.finalized && self.frame_count >= self.running_average_size {
            let denom = (self.running_average_size.saturating_sub(1)).max(1) as f64;
            for row in 0..HEIGHT {
                for col in 0..WIDTH {
                    self.sigma[row][col] = (self.m2[row][col] / denom).sqrt();
                }
            }
            self.finalized = true;
            tracing::debug!(frames = self.frame_count, "background build phase complete");
        }
    }

    /// Exponentially-weighted update used once the model is ready.
    pub fn add_rolling(&mut self, frame: &Frame) {
        let r = self.running_average_size.max(1) as f64;
        for row in 0..HEIGHT {
            for col in 0..WIDTH {
                let x = frame[row][col];
                if !x.is_finite() {
                    continue;
                }
                let new_mean = (self.mean[row][col] * (r - 1.0) + x) / r;
                self.sigma[row][col] =
                    (self.sigma[row][col] * (r - 1.0) + (x - new_mean).abs()) / r;
                self.mean[row][col] = new_mean;
            }
        }
    }

    /// `|x - mean| > K*sigma AND |x - mean| > delta_min`. NaN inputs always
    /// fail both comparisons, so they are never mistaken for activity.
    pub fn is_active(&self, row: usize, col: usize, x: f64, k: f64, delta_min: f64) -> bool {
        let diff = (x - self.mean[row][col]).abs();
        diff > k * self.sigma[row][col] && diff > delta_min
    }

    pub fn mean_frame(&self) -> &Frame {
        &self.mean
    }

    pub fn sigma_frame(&self) -> &Frame {
        &self.sigma
    }

    pub fn average_ambient_temperature(&self) -> f64 {
        let mut sum = 0.0;
        for row in self.mean.iter() {
            sum += row.iter().sum::<f64>();
        }
        sum / (WIDTH * HEIGHT) as f64
    }
}
