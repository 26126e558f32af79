//! Fixed dimensions of the thermopile sensor grid and the per-frame pool sizes
//! derived from them. Every buffer in this crate is sized from these
//! constants; there is no dynamic resizing.

/// Columns in a frame.
pub const WIDTH: usize = 16;
/// Rows in a frame.
pub const HEIGHT: usize = 4;
/// Maximum concurrent blobs per frame.
pub const MAX_BLOBS: usize = 8;
/// Maximum concurrent tracks.
pub const MAX_TRACKS: usize = 8;
/// Upper bound on active pixels in a single frame (one slot per grid cell).
pub const MAX_ACTIVE_PIXELS: usize = WIDTH * HEIGHT;

/// A single frame: `frame[row][col]`, degrees Celsius.
pub type Frame = [[f64; WIDTH]; HEIGHT];
