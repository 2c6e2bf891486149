//! # Tile-delta codec
//!
//! Relayed sessions cannot carry a media stream, so the host sends
//! JPEG tiles of the cells that changed since the last pass.
//!
//! ```text
//! HOST                                          VIEWER
//! FrameSource::capture                          TileCompositor::apply
//!   ↓                                             ↑
//! TileGrid / tile_hash  ──►  TileEncoder  ──►  stream:frame (relay)
//!   (cadence: TileStreamer, fps)
//! ```
//!
//! | Module       | Purpose                                         |
//! |--------------|-------------------------------------------------|
//! | `grid`       | Cell layout, rebuilt on dimension change        |
//! | `hash`       | Sampled RGB hash per cell                       |
//! | `encoder`    | Diff + JPEG encode pass, `TileConfig`           |
//! | `cadence`    | Cancellable capture loop                        |
//! | `compositor` | Viewer canvas reconstruction                    |

pub mod cadence;
pub mod compositor;
pub mod encoder;
pub mod grid;
pub mod hash;

pub use cadence::TileStreamer;
pub use compositor::{MAX_SURFACE_PIXELS, TileCompositor};
pub use encoder::{TileConfig, TileEncoder};
pub use grid::{Tile, TileGrid, tile_count};
pub use hash::tile_hash;
