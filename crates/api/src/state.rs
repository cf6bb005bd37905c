use std::sync::Arc;

use aether_booking::{BookingCoordinator, ChatService, Clock, Stores};
use aether_core::intent::MessageInterpreter;
use aether_events::RoomHub;

use crate::config::ServerConfig;
use crate::ws::WsManager;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// This is cheaply cloneable (inner data is behind `Arc` or is already `Clone`).
#[derive(Clone)]
pub struct AppState {
    /// Server configuration.
    pub config: Arc<ServerConfig>,
    /// Ledger, conversation, settings and product stores.
    pub stores: Stores,
    /// WebSocket connection manager (browser clients).
    pub ws_manager: Arc<WsManager>,
    /// Conversation rooms for realtime fan-out.
    pub rooms: Arc<RoomHub>,
    /// Serializes and commits appointment mutations.
    pub coordinator: Arc<BookingCoordinator>,
    /// Transcript, interpreter and pins.
    pub chat: Arc<ChatService>,
}

impl AppState {
    /// Wire the booking services on top of `stores`.
    pub fn new(
        config: ServerConfig,
        stores: Stores,
        interpreter: Arc<dyn MessageInterpreter>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let rooms = Arc::new(RoomHub::new(config.room_buffer));
        let coordinator = Arc::new(
            BookingCoordinator::new(stores.clone(), Arc::clone(&rooms), config.booking_policy())
                .with_clock(clock),
        );
        let chat = Arc::new(ChatService::new(
            stores.conversations.clone(),
            Arc::clone(&rooms),
            Arc::clone(&coordinator),
            interpreter,
        ));

        Self {
            config: Arc::new(config),
            stores,
            ws_manager: Arc::new(WsManager::new()),
            rooms,
            coordinator,
            chat,
        }
    }
}
