// THEORY:
// The extractor is the engine of the spatial grouping layer. Its job is to turn a
// frame plus a ready background model into up to `MAX_BLOBS` connected blobs,
// with no heap allocation and no slot growing past the grid's own size.
//
// Key architectural principles & algorithm steps:
// 1.  **Gate First, Group Second**: `collect_active_pixels` scans the frame
//     row-major and keeps every pixel the background gate calls foreground,
//     producing a flat list before any notion of adjacency is considered.
// 2.  **In-Place Queue Compaction, Not a Visited-Set BFS**: `group_into_blobs`
//     clusters active pixels into connected components using a single in-place
//     pass over two fixed buffers — an "active" buffer of not-yet-grouped
//     pixels and a "queue" buffer for the blob currently being grown. Each
//     outer iteration seeds a new blob from the lowest-index survivor (row-major
//     order falls out for free, since the buffer was filled in that order and
//     compaction is stable), then walks the queue front-to-back: every
//     remaining active pixel adjacent to the queue head moves into the queue,
//     everything else is compacted toward the front of the active buffer.
// 3.  **Bounded by Construction**: neither buffer ever grows past one slot per
//     grid cell, and grouping stops once `MAX_BLOBS` blobs have been produced,
//     silently dropping whatever pixels remain ungrouped.
// 4.  **Prune After, Not During**: small-blob pruning is a separate compacting
//     pass over the finished blob array, kept apart from grouping so the size
//     threshold can change without touching the adjacency algorithm.

use crate::config::TrackerConfig;
use crate::core_modules::background::BackgroundModel;
use crate::core_modules::blob::Blob;
use crate::core_modules::pixel::{adjacent, Pixel};
use crate::grid::{Frame, HEIGHT, MAX_ACTIVE_PIXELS, MAX_BLOBS, WIDTH};

pub fn collect_active_pixels(
    frame: &Frame,
    background: &BackgroundModel,
    config: &TrackerConfig,
) -> ([Pixel; MAX_ACTIVE_PIXELS], usize) {
    let mut buffer = [Pixel::default(); MAX_ACTIVE_PIXELS];
    let mut count = 0;
    for row in 0..HEIGHT {
        for col in 0..WIDTH {
            let temperature = frame[row][col];
            if background.is_active(
                row,
                col,
                temperature,
                config.active_pixel_variance_scalar,
                config.minimum_temperature_differential,
            ) {
                buffer[count] = Pixel { row, col, temperature };
                count += 1;
            }
        }
    }
    (buffer, count)
}

pub fn group_into_blobs(
    mut active: [Pixel; MAX_ACTIVE_PIXELS],
    mut remaining: usize,
    fuzz: u32,
) -> ([Blob; MAX_BLOBS], usize) {
    let mut blobs = [Blob::default(); MAX_BLOBS];
    let mut num_blobs = 0;
    let mut queue = [Pixel::default(); MAX_ACTIVE_PIXELS];

    while remaining > 0 && num_blobs < MAX_BLOBS {
        let mut blob = Blob::default();

        // Seed: the lowest-index survivor, removed from the active buffer.
        queue[0] = active[0];
        let mut queue_len = 1;
        for i in 0..remaining - 1 {
            active[i] = active[i + 1];
        }
        remaining -= 1;

        let mut cursor = 0;
        while cursor < queue_len {
            let current = queue[cursor];
            let mut write = 0;
            for read in 0..remaining {
                if adjacent(&current, &active[read], fuzz) {
                    queue[queue_len] = active[read];
                    queue_len += 1;
                } else {
                    active[write] = active[read];
                    write += 1;
                }
            }
            remaining = write;
            blob.add_pixel(current);
            cursor += 1;
        }

        blobs[num_blobs] = blob;
        num_blobs += 1;
    }

    if remaining > 0 {
        tracing::warn!(dropped = remaining, "MAX_BLOBS saturated; extra blobs dropped");
    }

    (blobs, num_blobs)
}

/// Drops blobs smaller than `min_size` and compacts survivors to the front.
pub fn prune_small_blobs(blobs: &mut [Blob; MAX_BLOBS], num_blobs: &mut usize, min_size: u32) {
    let mut write = 0;
    for read in 0..*num_blobs {
        if blobs[read].num_pixels >= min_size {
            blobs[write] = blobs[read];
            write += 1;
        }
    }
    for slot in blobs.iter_mut().skip(write) {
        slot.clear();
    }
    *num_blobs = write;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::background::BackgroundModel;

    fn make_background(mean: f64, sigma: f64) -> BackgroundModel {
        let mut bg = BackgroundModel::new(10);
        for _ in 0..10 {
            bg.add_initial(&[[mean; WIDTH]; HEIGHT]);
        }
        if sigma > 0.0 {
            // Nudge sigma above zero via a rolling update so the gate isn't
            // a hair-trigger on delta_min alone.
            let mut frame = [[mean; WIDTH]; HEIGHT];
            frame[0][0] = mean + sigma * 4.0;
            bg.add_rolling(&frame);
        }
        bg
    }

    fn config() -> TrackerConfig {
        TrackerConfig::default()
    }

    #[test]
    fn no_active_pixels_yields_no_blobs() {
        let bg = make_background(22.0, 0.0);
        let frame = [[22.0; WIDTH]; HEIGHT];
        let (active, count) = collect_active_pixels(&frame, &bg, &config());
        assert_eq!(count, 0);
        let (_blobs, num_blobs) = group_into_blobs(active, count, 1);
        assert_eq!(num_blobs, 0);
    }

    #[test]
    fn a_single_hot_block_forms_one_blob() {
        let bg = make_background(22.0, 0.0);
        let mut frame = [[22.0; WIDTH]; HEIGHT];
        for row in 0..2 {
            for col in 2..4 {
                frame[row][col] = 30.0;
            }
        }
        let cfg = config();
        let (active, count) = collect_active_pixels(&frame, &bg, &cfg);
        assert_eq!(count, 4);
        let (blobs, num_blobs) = group_into_blobs(active, count, cfg.adjacency_fuzz);
        assert_eq!(num_blobs, 1);
        assert_eq!(blobs[0].num_pixels, 4);
    }

    #[test]
    fn two_distant_blocks_form_two_blobs() {
        let bg = make_background(22.0, 0.0);
        let mut frame = [[22.0; WIDTH]; HEIGHT];
        frame[0][0] = 30.0;
        frame[0][1] = 30.0;
        frame[3][14] = 30.0;
        frame[3][15] = 30.0;
        let cfg = config();
        let (active, count) = collect_active_pixels(&frame, &bg, &cfg);
        assert_eq!(count, 4);
        let (blobs, num_blobs) = group_into_blobs(active, count, cfg.adjacency_fuzz);
        assert_eq!(num_blobs, 2);
        assert_eq!(blobs[0].num_pixels, 2);
        assert_eq!(blobs[1].num_pixels, 2);
    }

    #[test]
    fn more_than_max_blobs_are_silently_dropped() {
        let bg = make_background(22.0, 0.0);
        let mut frame = [[22.0; WIDTH]; HEIGHT];
        // 9 isolated single-pixel "blocks", one more than MAX_BLOBS. Eight sit
        // on row 0 spaced two columns apart, and the ninth sits two rows below
        // (row 2) under the first; with adjacency_fuzz=0, adjacency requires
        // Chebyshev distance <= 1, so every pair here (minimum distance 2) is
        // non-adjacent and all nine stay isolated.
        let adjacency_fuzz = 0;
        for col in (0..WIDTH).step_by(2) {
            frame[0][col] = 30.0;
        }
        frame[2][0] = 30.0;
        let (active, count) = collect_active_pixels(&frame, &bg, &config());
        assert_eq!(count, 9);
        let (_blobs, num_blobs) = group_into_blobs(active, count, adjacency_fuzz);
        assert_eq!(num_blobs, MAX_BLOBS);
    }

    #[test]
    fn pruning_removes_small_blobs_and_compacts() {
        let mut blobs = [Blob::default(); MAX_BLOBS];
        let mut pixel_big = Pixel::default();
        pixel_big.temperature = 30.0;
        for i in 0..5 {
            let mut b = Blob::default();
            b.add_pixel(Pixel { row: 0, col: i, temperature: 30.0 });
            blobs[i] = b;
        }
        let mut one_pixel = Blob::default();
        one_pixel.add_pixel(Pixel { row: 1, col: 0, temperature: 30.0 });
        blobs[5] = one_pixel;
        let mut num_blobs = 6;
        prune_small_blobs(&mut blobs, &mut num_blobs, 2);
        assert_eq!(num_blobs, 5);
        for i in 0..5 {
            assert!(blobs[i].is_active());
        }
        assert!(!blobs[5].is_active());
    }
}
