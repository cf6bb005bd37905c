//! Conversation rooms backed by one bounded `mpsc` queue per session.
//!
//! [`RoomHub`] is the publish/subscribe hub for [`RoomEvent`]s. It is
//! designed to be shared via `Arc<RoomHub>` across the application.
//!
//! Delivery is best-effort and at-most-once: a session whose queue is full
//! misses the event, and a session that has not joined a room receives
//! nothing for it. Sessions re-fetch state after joining.

use std::collections::{HashMap, HashSet};

use aether_core::realtime::{RoomEvent, RoomId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, Mutex};

/// Default per-session queue capacity.
pub const DEFAULT_ROOM_BUFFER: usize = 256;

struct Session {
    sender: mpsc::Sender<RoomEvent>,
    rooms: HashSet<RoomId>,
}

#[derive(Default)]
struct HubState {
    sessions: HashMap<String, Session>,
    rooms: HashMap<RoomId, HashSet<String>>,
}

impl HubState {
    fn detach(&mut self, session_id: &str) -> bool {
        let Some(session) = self.sessions.remove(session_id) else {
            return false;
        };
        for room in session.rooms {
            if let Some(members) = self.rooms.get_mut(&room) {
                members.remove(session_id);
                if members.is_empty() {
                    self.rooms.remove(&room);
                }
            }
        }
        true
    }
}

/// Room registry and fan-out.
///
/// A single lock covers both membership and sending, so every member of a
/// room observes that room's events in the same order.
pub struct RoomHub {
    state: Mutex<HubState>,
    buffer: usize,
}

impl RoomHub {
    /// Create a hub whose sessions each buffer up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            state: Mutex::new(HubState::default()),
            buffer: buffer.max(1),
        }
    }

    /// Register a session and return the receiver its events arrive on.
    ///
    /// Reconnecting with an existing id replaces the old session and drops
    /// its room memberships.
    pub async fn connect(&self, session_id: impl Into<String>) -> mpsc::Receiver<RoomEvent> {
        let session_id = session_id.into();
        let (tx, rx) = mpsc::channel(self.buffer);
        let mut state = self.state.lock().await;
        state.detach(&session_id);
        state.sessions.insert(
            session_id,
            Session {
                sender: tx,
                rooms: HashSet::new(),
            },
        );
        rx
    }

    /// Remove a session and all of its memberships.
    pub async fn disconnect(&self, session_id: &str) {
        if self.state.lock().await.detach(session_id) {
            tracing::debug!(session_id, "Realtime session disconnected");
        }
    }

    /// Join `room`. Returns `false` when the session is unknown. Joining twice
    /// is a no-op.
    pub async fn join(&self, session_id: &str, room: RoomId) -> bool {
        let mut state = self.state.lock().await;
        let Some(session) = state.sessions.get_mut(session_id) else {
            return false;
        };
        session.rooms.insert(room);
        state
            .rooms
            .entry(room)
            .or_default()
            .insert(session_id.to_string());
        tracing::debug!(session_id, room, "Joined room");
        true
    }

    /// Leave `room`. Returns `false` when the session was not a member.
    pub async fn leave(&self, session_id: &str, room: RoomId) -> bool {
        let mut state = self.state.lock().await;
        let was_member = state
            .sessions
            .get_mut(session_id)
            .is_some_and(|s| s.rooms.remove(&room));
        if let Some(members) = state.rooms.get_mut(&room) {
            members.remove(session_id);
            if members.is_empty() {
                state.rooms.remove(&room);
            }
        }
        was_member
    }

    /// Deliver `event` to every session joined to its room.
    ///
    /// Returns the number of sessions the event was queued for. Sessions
    /// whose receiver has been dropped are removed.
    pub async fn publish(&self, event: RoomEvent) -> usize {
        let room = event.room();
        let mut state = self.state.lock().await;

        let Some(members) = state.rooms.get(&room) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for session_id in members {
            let Some(session) = state.sessions.get(session_id) else {
                continue;
            };
            match session.sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!(
                        session_id = %session_id,
                        room,
                        kind = event.kind(),
                        "Realtime queue full, event dropped for session"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(session_id.clone()),
            }
        }

        for session_id in closed {
            state.detach(&session_id);
        }

        tracing::trace!(room, kind = event.kind(), delivered, "Published room event");
        delivered
    }

    /// Number of sessions currently joined to `room`.
    pub async fn room_size(&self, room: RoomId) -> usize {
        self.state
            .lock()
            .await
            .rooms
            .get(&room)
            .map_or(0, HashSet::len)
    }

    /// Number of connected sessions.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }
}

impl Default for RoomHub {
    fn default() -> Self {
        Self::new(DEFAULT_ROOM_BUFFER)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
