// Lobby orchestration for spawning and managing game worlds.

use crate::domain::rng::GameRng;
use crate::domain::skills::SkillCatalog;
use crate::domain::tuning::GameTuning;
use crate::domain::{Authority, PlayerId, SessionContext};
use crate::use_cases::game::{MatchTiming, world_task};
use crate::use_cases::session::{SERVER_NODE, Session};
use crate::use_cases::{CommandEnvelope, ServerState, WorldUpdate};
use axum::extract::ws::Utf8Bytes;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock, broadcast, mpsc, watch};
use tracing::{debug, info};

/// Shared configuration for spawning lobby worlds.
#[derive(Debug, Clone)]
pub struct LobbySettings {
    /// Capacity for inbound player commands.
    pub input_channel_capacity: usize,
    /// Capacity for broadcast world updates.
    pub world_broadcast_capacity: usize,
    /// Fixed tick interval for the game loop.
    pub tick_interval: Duration,
    /// Time limit applied to lobbies created over HTTP.
    pub default_match_time_limit: Duration,
    /// Delay between lobby creation and the first tick.
    pub start_countdown: Duration,
    pub tuning: Arc<GameTuning>,
    pub catalog: Arc<SkillCatalog>,
}

/// Errors returned by lobby registry operations.
#[derive(Debug)]
pub enum LobbyError {
    /// Lobby already exists and cannot be re-created.
    AlreadyExists,
}

/// The player already has a live connection and the claimant did not present its resume token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotTaken;

/// A granted player slot.
#[derive(Debug, Clone)]
pub struct PlayerClaim {
    /// Fires when a newer connection takes the slot over.
    pub shutdown: Arc<Notify>,
    /// Secret the client presents to take the slot over from a stale connection.
    pub resume_token: String,
}

fn new_resume_token() -> String {
    format!("{:032x}", rand::rng().random::<u128>())
}

struct PlayerConnection {
    token: u64,
    resume_token: String,
    shutdown: Arc<Notify>,
}

/// Per-lobby channels and access rules.
#[derive(Clone)]
pub struct LobbyHandle {
    /// Identifier clients use to target this lobby.
    pub lobby_id: Arc<str>,
    /// Sender for commands into the lobby world task.
    pub input_tx: mpsc::Sender<CommandEnvelope>,
    /// Broadcast sender for raw world updates.
    pub world_tx: broadcast::Sender<WorldUpdate>,
    /// Broadcast sender for serialized deltas and events.
    pub world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    /// Watch sender holding the latest serialized full snapshot.
    pub world_latest_tx: watch::Sender<Utf8Bytes>,
    /// Watch sender for high-level server state changes.
    pub server_state_tx: watch::Sender<ServerState>,
    /// Stops the world task when the lobby is removed.
    shutdown: Arc<Notify>,
    /// Pinned lobbies are never removed.
    pinned: bool,
    /// Players allowed to spawn into the lobby (empty means open lobby).
    allowed_players: Arc<HashSet<PlayerId>>,
    /// At most one live connection per player id.
    player_connections: Arc<Mutex<HashMap<PlayerId, PlayerConnection>>>,
}

impl LobbyHandle {
    /// Returns true if the provided player id should spawn in the lobby.
    pub fn is_player_allowed(&self, player_id: PlayerId) -> bool {
        self.allowed_players.is_empty() || self.allowed_players.contains(&player_id)
    }

    /// Claims the player's connection slot for `token`.
    ///
    /// A free slot is granted to anyone. A live slot is only taken over by a claimant
    /// presenting its current resume token; the previous owner is then told to close.
    /// Every grant issues a fresh resume token.
    pub async fn claim_player_connection(
        &self,
        player_id: PlayerId,
        token: u64,
        presented: Option<&str>,
    ) -> Result<PlayerClaim, SlotTaken> {
        let mut connections = self.player_connections.lock().await;
        if let Some(live) = connections.get(&player_id) {
            if presented != Some(live.resume_token.as_str()) {
                return Err(SlotTaken);
            }
        }

        let claim = PlayerClaim {
            shutdown: Arc::new(Notify::new()),
            resume_token: new_resume_token(),
        };
        let previous = connections.insert(
            player_id,
            PlayerConnection {
                token,
                resume_token: claim.resume_token.clone(),
                shutdown: claim.shutdown.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!(%player_id, old_token = previous.token, "resumed player connection");
            previous.shutdown.notify_one();
        }
        Ok(claim)
    }

    /// Releases the slot only if `token` still owns it. Returns whether it did.
    pub async fn unregister_player_connection_if_owner(
        &self,
        player_id: PlayerId,
        token: u64,
    ) -> bool {
        let mut connections = self.player_connections.lock().await;
        match connections.get(&player_id) {
            Some(conn) if conn.token == token => {
                connections.remove(&player_id);
                true
            }
            _ => false,
        }
    }

    /// Whether `token` currently owns the player's slot.
    pub async fn owns_player_connection(&self, player_id: PlayerId, token: u64) -> bool {
        self.player_connections
            .lock()
            .await
            .get(&player_id)
            .is_some_and(|conn| conn.token == token)
    }
}

struct LobbyEntry {
    handle: LobbyHandle,
    // Open sockets, spectators included.
    connections: usize,
    match_ended: bool,
}

/// Thread-safe registry for active lobbies.
pub struct LobbyRegistry {
    /// Global settings applied to newly created lobbies.
    settings: LobbySettings,
    /// Map of lobby id to active handle.
    lobbies: RwLock<HashMap<String, LobbyEntry>>,
}

impl LobbyRegistry {
    /// Creates a new registry with the provided settings.
    pub fn new(settings: LobbySettings) -> Self {
        Self {
            settings,
            lobbies: RwLock::new(HashMap::new()),
        }
    }

    pub fn default_match_time_limit(&self) -> Duration {
        self.settings.default_match_time_limit
    }

    /// Creates a new lobby and spawns its world task.
    pub async fn create_lobby(
        &self,
        lobby_id: String,
        allowed_players: HashSet<PlayerId>,
        pinned: bool,
        match_time_limit: Duration,
    ) -> Result<LobbyHandle, LobbyError> {
        let mut lobbies = self.lobbies.write().await;
        if lobbies.contains_key(&lobby_id) {
            return Err(LobbyError::AlreadyExists);
        }

        // Channel wiring for the lobby world loop.
        let (input_tx, input_rx) =
            mpsc::channel::<CommandEnvelope>(self.settings.input_channel_capacity);
        let (world_tx, _world_rx) =
            broadcast::channel::<WorldUpdate>(self.settings.world_broadcast_capacity);
        let (world_bytes_tx, _world_bytes_rx) =
            broadcast::channel::<Utf8Bytes>(self.settings.world_broadcast_capacity);
        let (world_latest_tx, _world_latest_rx) = watch::channel::<Utf8Bytes>(Utf8Bytes::from(""));
        let (server_state_tx, _server_state_rx) =
            watch::channel::<ServerState>(ServerState::Lobby);
        let shutdown = Arc::new(Notify::new());

        // The dedicated server is the permanent host of every lobby session.
        let session = Session::new(
            Authority::dedicated(SERVER_NODE),
            SessionContext::new(
                self.settings.tuning.clone(),
                self.settings.catalog.clone(),
                GameRng::from_entropy(),
            ),
        );

        tokio::spawn(world_task(
            input_rx,
            world_tx.clone(),
            server_state_tx.clone(),
            MatchTiming {
                tick_interval: self.settings.tick_interval,
                time_limit: match_time_limit,
                start_countdown: self.settings.start_countdown,
            },
            shutdown.clone(),
            session,
        ));

        let lobby = LobbyHandle {
            lobby_id: Arc::from(lobby_id.clone()),
            input_tx,
            world_tx,
            world_bytes_tx,
            world_latest_tx,
            server_state_tx,
            shutdown,
            pinned,
            allowed_players: Arc::new(allowed_players),
            player_connections: Arc::new(Mutex::new(HashMap::new())),
        };

        info!(
            lobby_id = %lobby_id,
            pinned,
            allowed = lobby.allowed_players.len(),
            time_limit_secs = match_time_limit.as_secs(),
            "lobby created"
        );
        lobbies.insert(
            lobby_id,
            LobbyEntry {
                handle: lobby.clone(),
                connections: 0,
                match_ended: false,
            },
        );
        Ok(lobby)
    }

    /// Returns a lobby handle for the provided id, if it exists.
    pub async fn get_lobby(&self, lobby_id: &str) -> Option<LobbyHandle> {
        let lobbies = self.lobbies.read().await;
        lobbies.get(lobby_id).map(|entry| entry.handle.clone())
    }

    /// Counts a new socket against the lobby. `None` when the lobby is gone.
    pub async fn register_connection(&self, lobby_id: &str) -> Option<usize> {
        let mut lobbies = self.lobbies.write().await;
        let entry = lobbies.get_mut(lobby_id)?;
        entry.connections += 1;
        Some(entry.connections)
    }

    /// Releases a socket; unpinned lobbies are removed once the last one leaves.
    pub async fn register_disconnect(&self, lobby_id: &str) {
        let mut lobbies = self.lobbies.write().await;
        let Some(entry) = lobbies.get_mut(lobby_id) else {
            return;
        };
        entry.connections = entry.connections.saturating_sub(1);
        if entry.connections == 0 && !entry.handle.pinned {
            remove_entry(&mut lobbies, lobby_id, "last connection closed");
        }
    }

    /// Removes the lobby once its match ends and nobody is connected.
    pub fn spawn_match_end_watcher(
        self: Arc<Self>,
        lobby_id: Arc<str>,
        mut server_state_rx: watch::Receiver<ServerState>,
    ) {
        tokio::spawn(async move {
            if server_state_rx
                .wait_for(|state| matches!(state, ServerState::MatchEnded))
                .await
                .is_err()
            {
                return;
            }

            let mut lobbies = self.lobbies.write().await;
            let Some(entry) = lobbies.get_mut(lobby_id.as_ref()) else {
                return;
            };
            entry.match_ended = true;
            if entry.connections == 0 && !entry.handle.pinned {
                remove_entry(&mut lobbies, &lobby_id, "match ended");
            }
        });
    }

    pub async fn lobby_count(&self) -> usize {
        self.lobbies.read().await.len()
    }
}

fn remove_entry(lobbies: &mut HashMap<String, LobbyEntry>, lobby_id: &str, reason: &'static str) {
    if let Some(entry) = lobbies.remove(lobby_id) {
        entry.handle.shutdown.notify_one();
        info!(lobby_id, reason, match_ended = entry.match_ended, "lobby removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(default_limit: Duration) -> Arc<LobbyRegistry> {
        Arc::new(LobbyRegistry::new(LobbySettings {
            input_channel_capacity: 16,
            world_broadcast_capacity: 16,
            tick_interval: Duration::from_millis(5),
            default_match_time_limit: default_limit,
            start_countdown: Duration::from_millis(0),
            tuning: Arc::new(GameTuning::default()),
            catalog: Arc::new(SkillCatalog::standard()),
        }))
    }

    #[tokio::test]
    async fn duplicate_lobby_ids_are_rejected() {
        let registry = registry(Duration::from_secs(0));
        registry
            .create_lobby("a".into(), HashSet::new(), false, Duration::from_secs(0))
            .await
            .unwrap();
        let again = registry
            .create_lobby("a".into(), HashSet::new(), false, Duration::from_secs(0))
            .await;
        assert!(matches!(again, Err(LobbyError::AlreadyExists)));
    }

    #[tokio::test]
    async fn allow_list_gates_spawning() {
        let registry = registry(Duration::from_secs(0));
        let open = registry
            .create_lobby("open".into(), HashSet::new(), false, Duration::from_secs(0))
            .await
            .unwrap();
        let closed = registry
            .create_lobby(
                "closed".into(),
                HashSet::from([PlayerId::new(7)]),
                false,
                Duration::from_secs(0),
            )
            .await
            .unwrap();
        assert!(open.is_player_allowed(PlayerId::new(1)));
        assert!(closed.is_player_allowed(PlayerId::new(7)));
        assert!(!closed.is_player_allowed(PlayerId::new(8)));
    }

    #[tokio::test]
    async fn live_slots_are_only_taken_over_with_the_resume_token() {
        let registry = registry(Duration::from_secs(0));
        let lobby = registry
            .create_lobby("r".into(), HashSet::new(), false, Duration::from_secs(0))
            .await
            .unwrap();
        let player = PlayerId::new(3);

        let old = lobby.claim_player_connection(player, 1, None).await.unwrap();
        assert_eq!(
            lobby.claim_player_connection(player, 2, None).await.unwrap_err(),
            SlotTaken
        );
        assert_eq!(
            lobby
                .claim_player_connection(player, 2, Some("guess"))
                .await
                .unwrap_err(),
            SlotTaken
        );
        assert!(lobby.owns_player_connection(player, 1).await);

        let new = lobby
            .claim_player_connection(player, 2, Some(&old.resume_token))
            .await
            .unwrap();
        assert_ne!(new.resume_token, old.resume_token);
        tokio::time::timeout(Duration::from_secs(1), old.shutdown.notified())
            .await
            .expect("old connection should be told to close");

        assert!(!lobby.unregister_player_connection_if_owner(player, 1).await);
        assert!(lobby.owns_player_connection(player, 2).await);
        assert!(lobby.unregister_player_connection_if_owner(player, 2).await);

        // A released slot is free again.
        assert!(lobby.claim_player_connection(player, 3, None).await.is_ok());
    }

    #[tokio::test]
    async fn last_disconnect_removes_unpinned_lobbies_only() {
        let registry = registry(Duration::from_secs(0));
        registry
            .create_lobby("pinned".into(), HashSet::new(), true, Duration::from_secs(0))
            .await
            .unwrap();
        registry
            .create_lobby("loose".into(), HashSet::new(), false, Duration::from_secs(0))
            .await
            .unwrap();

        for id in ["pinned", "loose"] {
            assert_eq!(registry.register_connection(id).await, Some(1));
            registry.register_disconnect(id).await;
        }

        assert!(registry.get_lobby("pinned").await.is_some());
        assert!(registry.get_lobby("loose").await.is_none());
        assert_eq!(registry.register_connection("loose").await, None);
    }

    #[tokio::test]
    async fn empty_lobbies_are_removed_when_the_match_ends() {
        let registry = registry(Duration::from_millis(20));
        let lobby = registry
            .create_lobby(
                "timed".into(),
                HashSet::new(),
                false,
                registry.default_match_time_limit(),
            )
            .await
            .unwrap();
        registry
            .clone()
            .spawn_match_end_watcher(lobby.lobby_id.clone(), lobby.server_state_tx.subscribe());

        let mut removed = false;
        for _ in 0..100 {
            if registry.get_lobby("timed").await.is_none() {
                removed = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(removed);
    }
}
