use crate::use_cases::LobbyRegistry;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    // Every live lobby and its world task.
    pub lobby_registry: Arc<LobbyRegistry>,
    // Lobby used when a client connects without `lobby_id`.
    pub default_lobby_id: Arc<str>,
}
