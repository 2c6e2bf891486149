//! Typed payloads carried inside relay packets.
//!
//! | Module   | Events                                                    |
//! |----------|-----------------------------------------------------------|
//! | `signal` | request, offer, answer, candidate, disconnect, error      |
//! | `frame`  | `stream:frame` tile deltas                                |
//! | `input`  | pointer, keyboard and scroll events                       |

pub mod frame;
pub mod input;
pub mod signal;

pub use frame::{StreamFrame, TilePatch};
pub use input::{
    InputEvent, InputMessage, KeyInfo, KeyMethod, KeyboardEvent, PointerEvent, PointerMethod,
    ScrollEvent, ScrollMethod,
};
pub use signal::{
    CandidateMessage, DisconnectNotice, ErrorCode, ErrorNotice, IceCandidate, OfferBody,
    PeerOffer, SdpKind, SessionAnswer, SessionDescription, SessionOffer, SessionRequest,
    StreamParams, TILED_CODEC,
};
