pub mod source;
pub mod types;

pub use source::{FrameSource, MediaTrack, TrackHandle, TrackKind};
pub use types::{PixelFormat, RawFrame, ScreenSize};
