//! Client-to-source coordinate mapping.

use crate::media::types::ScreenSize;

/// Where the remote surface is drawn on the viewer, in client pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceRect {
    pub left: f64,
    pub top: f64,
    pub client_width: f64,
    pub client_height: f64,
}

impl SurfaceRect {
    pub fn new(left: f64, top: f64, client_width: f64, client_height: f64) -> Self {
        Self {
            left,
            top,
            client_width,
            client_height,
        }
    }

    /// A surface drawn 1:1 at the origin.
    pub fn native(screen: ScreenSize) -> Self {
        Self::new(0.0, 0.0, screen.width as f64, screen.height as f64)
    }

    /// Scale a client point linearly into source pixels, flooring the
    /// result. `None` when the surface has no area.
    pub fn to_source(&self, client_x: f64, client_y: f64, screen: ScreenSize) -> Option<(i32, i32)> {
        if self.client_width <= 0.0 || self.client_height <= 0.0 {
            return None;
        }
        let x = (client_x - self.left) / self.client_width * screen.width as f64;
        let y = (client_y - self.top) / self.client_height * screen.height as f64;
        Some((x.floor() as i32, y.floor() as i32))
    }
}
