//! AetherChat realtime fan-out.
//!
//! - [`RoomHub`]: per-conversation rooms with bounded, ordered delivery to
//!   every joined session.

pub mod rooms;

pub use rooms::{RoomHub, DEFAULT_ROOM_BUFFER};
