//! Viewer-side reconstruction of the relayed surface.
//!
//! Keeps a persistent RGBA canvas and paints each received tile at its
//! `(x, y)`. Later tiles overwrite earlier ones; nothing is blended.

use std::path::Path;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{RgbaImage, imageops};
use tracing::warn;

use crate::error::ShareError;
use crate::protocol::frame::StreamFrame;

/// Largest surface a viewer will allocate, in pixels (8K × 8K).
pub const MAX_SURFACE_PIXELS: u64 = 8192 * 8192;

/// Reject empty or oversized surfaces before anything is allocated.
pub fn check_surface(width: u32, height: u32) -> Result<(), ShareError> {
    let pixels = u64::from(width).checked_mul(u64::from(height));
    match pixels {
        Some(0) => Err(ShareError::TransientSignaling("empty surface".into())),
        Some(n) if n <= MAX_SURFACE_PIXELS => Ok(()),
        _ => Err(ShareError::TransientSignaling(format!(
            "surface {width}x{height} exceeds {MAX_SURFACE_PIXELS} pixels"
        ))),
    }
}

pub struct TileCompositor {
    surface: RgbaImage,
    frames: u64,
}

impl TileCompositor {
    pub fn new(width: u32, height: u32) -> Result<Self, ShareError> {
        check_surface(width, height)?;
        Ok(Self {
            surface: RgbaImage::new(width, height),
            frames: 0,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.surface.dimensions()
    }

    /// Frames applied so far.
    pub fn frame_count(&self) -> u64 {
        self.frames
    }

    pub fn surface(&self) -> &RgbaImage {
        &self.surface
    }

    /// Paint every decodable tile of `frame`. Returns the number of
    /// tiles drawn; undecodable tiles are skipped. A frame with an
    /// invalid surface size is rejected whole and leaves the canvas as is.
    pub fn apply(&mut self, frame: &StreamFrame) -> Result<usize, ShareError> {
        let (width, height) = frame.dimensions();
        if (width, height) != self.surface.dimensions() {
            check_surface(width, height)?;
            self.surface = RgbaImage::new(width, height);
        }

        let mut drawn = 0;
        for patch in frame.tiles() {
            match decode_tile(&patch.data) {
                Ok(tile) => {
                    imageops::replace(&mut self.surface, &tile, patch.x as i64, patch.y as i64);
                    drawn += 1;
                }
                Err(e) => warn!(x = patch.x, y = patch.y, "skipping undecodable tile: {e}"),
            }
        }
        self.frames += 1;
        Ok(drawn)
    }

    pub fn save_png(&self, path: &Path) -> Result<(), ShareError> {
        self.surface
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(ShareError::from)
    }
}

/// Decode a tile payload: a `data:` URL or bare base64 image bytes.
pub fn decode_tile(data: &str) -> Result<RgbaImage, ShareError> {
    let encoded = match data.strip_prefix("data:") {
        Some(rest) => rest
            .split_once(',')
            .map(|(_, b64)| b64)
            .ok_or_else(|| ShareError::Encode("data URL without payload".into()))?,
        None => data,
    };
    let bytes = STANDARD.decode(encoded)?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

// ── Tests ────────────────────────────────────────────────────────
