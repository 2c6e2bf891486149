//! Tile-delta encoder.
//!
//! One pass: make sure the grid matches the frame, hash every cell,
//! JPEG-encode the cells whose hash moved and wrap them as data URLs.
//! A pass with no changed cells produces no frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::ColorType;
use image::codecs::jpeg::JpegEncoder;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ShareError;
use crate::media::types::RawFrame;
use crate::protocol::frame::{StreamFrame, TilePatch};
use crate::tiles::grid::{Tile, TileGrid};
use crate::tiles::hash::tile_hash;

pub const JPEG_DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Smallest accepted cell edge.
pub const MIN_TILE_SIZE: u32 = 8;
/// Highest accepted capture rate.
pub const MAX_FPS: u32 = 60;

// ── TileConfig ───────────────────────────────────────────────────

/// Cadence and encoding settings for the relayed stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TileConfig {
    /// Capture passes per second.
    pub fps: u32,
    /// Cell edge in pixels.
    pub tile_size: u32,
    /// JPEG quality, 0.0 – 1.0.
    pub quality: f32,
}

impl Default for TileConfig {
    fn default() -> Self {
        Self {
            fps: 10,
            tile_size: 64,
            quality: 0.4,
        }
    }
}

impl TileConfig {
    /// Reject settings the encoder cannot run with.
    pub fn validate(&self) -> Result<(), ShareError> {
        if self.tile_size < MIN_TILE_SIZE {
            return Err(ShareError::SetupFailure(format!(
                "tile_size {} below minimum {MIN_TILE_SIZE}",
                self.tile_size
            )));
        }
        if self.fps == 0 || self.fps > MAX_FPS {
            return Err(ShareError::SetupFailure(format!(
                "fps {} outside 1..={MAX_FPS}",
                self.fps
            )));
        }
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(ShareError::SetupFailure(format!(
                "quality {} outside 0.0..=1.0",
                self.quality
            )));
        }
        Ok(())
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.fps.max(1) as f64)
    }

    /// Quality on the 1–100 scale the JPEG encoder takes.
    pub fn jpeg_quality(&self) -> u8 {
        ((self.quality.clamp(0.0, 1.0) * 100.0).round() as u8).max(1)
    }
}

// ── TileEncoder ──────────────────────────────────────────────────

pub struct TileEncoder {
    grid: Mutex<TileGrid>,
    force_full: AtomicBool,
    quality: u8,
}

impl TileEncoder {
    pub fn new(config: &TileConfig) -> Result<Self, ShareError> {
        config.validate()?;
        Ok(Self {
            grid: Mutex::new(TileGrid::new(config.tile_size)),
            force_full: AtomicBool::new(false),
            quality: config.jpeg_quality(),
        })
    }

    /// Make the next pass resend every cell. Never blocks.
    pub fn invalidate(&self) {
        self.force_full.store(true, Ordering::SeqCst);
    }

    /// Current grid dimensions and cell count.
    pub fn grid_shape(&self) -> ((u32, u32), usize) {
        let grid = self.lock();
        (grid.dimensions(), grid.len())
    }

    /// Diff `frame` against the stored hashes and encode changed cells.
    ///
    /// Cells that fail to encode keep their previous hash and are
    /// retried on the next pass.
    pub fn encode_frame(&self, frame: &RawFrame) -> Result<Option<StreamFrame>, ShareError> {
        if !frame.is_consistent() {
            return Err(ShareError::Capture(format!(
                "frame buffer of {} bytes too small for {}x{} stride {}",
                frame.data.len(),
                frame.width,
                frame.height,
                frame.stride
            )));
        }

        let mut grid = self.lock();
        grid.ensure(frame.width, frame.height);
        if self.force_full.swap(false, Ordering::SeqCst) {
            grid.invalidate();
        }

        let mut patches = Vec::new();
        for tile in grid.tiles_mut() {
            let hash = tile_hash(frame, tile);
            if tile.last_hash == Some(hash) {
                continue;
            }
            match encode_tile(frame, tile, self.quality) {
                Ok(data) => {
                    tile.last_hash = Some(hash);
                    patches.push(TilePatch {
                        x: tile.x,
                        y: tile.y,
                        data,
                    });
                }
                Err(e) => warn!(x = tile.x, y = tile.y, "tile encode failed: {e}"),
            }
        }

        if patches.is_empty() {
            return Ok(None);
        }
        Ok(Some(StreamFrame::tiled(frame.width, frame.height, patches)))
    }

    fn lock(&self) -> MutexGuard<'_, TileGrid> {
        self.grid.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// JPEG-encode one cell as a data URL.
pub fn encode_tile(frame: &RawFrame, tile: &Tile, quality: u8) -> Result<String, ShareError> {
    let [r, g, b] = frame.format.rgb_offsets();
    let bpp = frame.format.bytes_per_pixel();

    let mut rgb = Vec::with_capacity(tile.width as usize * tile.height as usize * 3);
    for y in tile.y..tile.y + tile.height {
        let start = frame.offset(tile.x, y);
        let row = &frame.data[start..start + tile.width as usize * bpp];
        for px in row.chunks_exact(bpp) {
            rgb.extend_from_slice(&[px[r], px[g], px[b]]);
        }
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality).encode(
        &rgb,
        tile.width,
        tile.height,
        ColorType::Rgb8,
    )?;

    let mut url = String::with_capacity(JPEG_DATA_URL_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
    url.push_str(JPEG_DATA_URL_PREFIX);
    STANDARD.encode_string(&jpeg, &mut url);
    Ok(url)
}

// ── Tests ────────────────────────────────────────────────────────
