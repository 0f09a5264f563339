use crate::domain::PlayerId;
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::net::client::spawn_lobby_serializer;
use crate::interface_adapters::state::AppState;
use crate::use_cases::lobby::LobbyError;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use std::{collections::HashSet, sync::Arc};
use tracing::warn;

const MAX_LOBBY_ID_LEN: usize = 128;

#[derive(Debug, serde::Deserialize)]
pub struct LobbyInitRequest {
    // Lobby id provided by the matchmaking service.
    lobby_id: String,
    // Player ids that are allowed to spawn into the lobby.
    #[serde(default)]
    allowed_player_ids: Vec<PlayerId>,
}

#[derive(Debug, serde::Serialize)]
struct LobbyInitResponse {
    // The lobby id that was created.
    lobby_id: String,
}

fn error_response(status: StatusCode, error: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

pub async fn create_lobby_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<LobbyInitRequest>,
) -> impl IntoResponse {
    let lobby_id = payload.lobby_id.trim().to_string();
    if lobby_id.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "lobby_id is required");
    }
    if lobby_id.len() > MAX_LOBBY_ID_LEN {
        return error_response(StatusCode::BAD_REQUEST, "lobby_id is too long");
    }

    let allowed_players: HashSet<PlayerId> = payload.allowed_player_ids.into_iter().collect();

    // Created lobbies are not pinned and will be removed on last disconnect.
    match state
        .lobby_registry
        .create_lobby(
            lobby_id.clone(),
            allowed_players,
            false,
            state.lobby_registry.default_match_time_limit(),
        )
        .await
    {
        Ok(lobby) => {
            // Create serializers so clients can subscribe immediately.
            spawn_lobby_serializer(&lobby);
            // Watch for match end so empty lobbies can be cleaned up.
            state
                .lobby_registry
                .clone()
                .spawn_match_end_watcher(lobby.lobby_id.clone(), lobby.server_state_tx.subscribe());
            (StatusCode::CREATED, Json(LobbyInitResponse { lobby_id })).into_response()
        }
        Err(LobbyError::AlreadyExists) => {
            warn!(lobby_id = %lobby_id, "lobby create rejected: already exists");
            error_response(StatusCode::CONFLICT, "lobby already exists")
        }
    }
}
