//! WebSocket infrastructure for realtime conversation updates.
//!
//! Provides connection management, heartbeat monitoring, and the HTTP
//! upgrade handler that bridges sockets to conversation rooms.

mod handler;
mod heartbeat;
pub mod manager;

pub use handler::{handle_frame, ws_handler};
pub use heartbeat::start_heartbeat;
pub use manager::WsManager;
