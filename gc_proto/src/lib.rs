//! Wire schema shared by the game controller bridge and its peers.
//!
//! The protobuf types are generated from `proto/` at build time. The
//! [`ssl_gc`] module mirrors the game controller's referee and CI messages,
//! [`sim`] carries the simulator and team pipeline messages. High-level
//! wrappers with typed decode errors live alongside them.

pub mod framing;
pub mod overrides;

pub mod ssl_gc {
    include!(concat!(env!("OUT_DIR"), "/ssl_gc.rs"));
}

pub mod sim {
    include!(concat!(env!("OUT_DIR"), "/sim.rs"));
}

pub use framing::{decode_frames, encode_frame, DecodedFrames};
pub use overrides::{
    CommandKind, ManualOverride, OverrideDecodeError, PlacementPoint, TeamColor,
};
pub use prost::{DecodeError, Message};
