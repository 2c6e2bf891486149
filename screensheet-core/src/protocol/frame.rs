//! Relayed frame payloads (`stream:frame`).

use serde::{Deserialize, Serialize};

/// One changed tile: an encoded still image of exactly one grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TilePatch {
    pub x: u32,
    pub y: u32,
    /// `data:image/jpeg;base64,...`
    pub data: String,
}

/// A frame broadcast through the relay. Only the tiled variant exists
/// today; the tag leaves room for others.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamFrame {
    Tiled {
        width: u32,
        height: u32,
        tiles: Vec<TilePatch>,
    },
}

impl StreamFrame {
    pub fn tiled(width: u32, height: u32, tiles: Vec<TilePatch>) -> Self {
        Self::Tiled {
            width,
            height,
            tiles,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        match self {
            Self::Tiled { width, height, .. } => (*width, *height),
        }
    }

    pub fn tiles(&self) -> &[TilePatch] {
        match self {
            Self::Tiled { tiles, .. } => tiles,
        }
    }
}
