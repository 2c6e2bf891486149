//! Sampled tile hash.
//!
//! Every 4th pixel of the cell (row-major within the cell) contributes
//! its red, green and blue bytes, in that order, to
//! `h = h * 31 + byte  (mod 2^32)`. Alpha is ignored. The sampling
//! trades exactness for speed: a change confined to unsampled pixels
//! is not detected.

use crate::media::types::RawFrame;
use crate::tiles::grid::Tile;

/// Pixels between samples.
pub const SAMPLE_EVERY: usize = 4;

/// Hash the sampled RGB bytes of `tile` within `frame`.
///
/// `tile` must lie inside `frame`.
pub fn tile_hash(frame: &RawFrame, tile: &Tile) -> u32 {
    let [r, g, b] = frame.format.rgb_offsets();
    let w = tile.width as usize;
    let count = w * tile.height as usize;

    let mut h: u32 = 0;
    for p in (0..count).step_by(SAMPLE_EVERY) {
        let px = tile.x + (p % w) as u32;
        let py = tile.y + (p / w) as u32;
        let off = frame.offset(px, py);
        for channel in [r, g, b] {
            h = (h << 5).wrapping_sub(h).wrapping_add(frame.data[off + channel] as u32);
        }
    }
    h
}
