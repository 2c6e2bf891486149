//! Capture-side collaborators.
//!
//! Screen and audio capture live outside this crate. A host plugs in a
//! [`FrameSource`]; transports pull tracks (peer) or raw frames
//! (relayed) from it.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ShareError;
use crate::media::types::RawFrame;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// A media track that a peer connection can carry.
pub trait MediaTrack: Send + Sync + fmt::Debug {
    fn id(&self) -> &str;

    fn kind(&self) -> TrackKind;

    /// Release the underlying capture. Idempotent.
    fn stop(&self);

    /// Lets a peer backend recover its own concrete track type.
    fn as_any(&self) -> &dyn Any;
}

pub type TrackHandle = Arc<dyn MediaTrack>;

/// Live screen (and optionally audio) capture for one host.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Grab the current screen contents.
    async fn capture(&self) -> Result<RawFrame, ShareError>;

    /// Video track for peer sessions, if the source provides one.
    fn video_track(&self) -> Option<TrackHandle>;

    /// Live audio track, if audio capture is available.
    fn audio_track(&self) -> Option<TrackHandle>;

    /// Release every capture resource.
    fn stop(&self) {}
}
