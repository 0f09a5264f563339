use crate::domain::{Caller, NodeId, PlayerId};
use crate::interface_adapters::http::ErrorResponse;
use crate::interface_adapters::protocol::{
    ClientMessage, DeltaDto, EventsDto, ServerMessage, SnapshotDto,
};
use crate::interface_adapters::state::AppState;
use crate::interface_adapters::utils::rng::{guest_player_id, rand_id};
use crate::use_cases::lobby::SlotTaken;
use crate::use_cases::{
    Command, CommandEnvelope, LobbyHandle, LobbyRegistry, SERVER_NODE, ServerState, WorldUpdate,
};

use axum::{
    Error, Json,
    extract::{
        Query, State,
        ws::{CloseFrame, Message, Utf8Bytes, WebSocket, WebSocketUpgrade, close_code},
    },
    http::StatusCode,
    response::IntoResponse,
};
use futures::SinkExt;
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use tokio::sync::watch::Receiver;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tokio::time::timeout;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

#[derive(Debug)]
enum NetError {
    // Categorizes connection lifecycle failures so callers can decide policy.
    #[allow(dead_code)]
    Ws(axum::Error),
    #[allow(dead_code)]
    Serialization(serde_json::Error),
    InputClosed,
    WorldUpdatesClosed,
    ServerStateClosed,
    JoinRequired,
    JoinTimeout,
    ClosedBeforeJoin,
    PlayerAlreadyConnected,
}

#[derive(Debug, serde::Deserialize)]
pub struct LobbyQuery {
    // The lobby id the client wants to join.
    #[serde(default)]
    lobby_id: Option<String>,
}

fn encode(msg: &ServerMessage) -> Option<Utf8Bytes> {
    match serde_json::to_string(msg) {
        Ok(txt) => Some(Utf8Bytes::from(txt)),
        Err(e) => {
            error!(error = ?e, "failed to serialize server message");
            None
        }
    }
}

/// Serializes each world update once and fans the shared bytes out to every socket.
///
/// Deltas and events go to the broadcast channel. Full snapshots are only kept in the
/// watch slot, where joins and lag recovery pick them up.
pub async fn world_update_serializer(
    mut world_rx: broadcast::Receiver<WorldUpdate>,
    world_bytes_tx: broadcast::Sender<Utf8Bytes>,
    world_latest_tx: watch::Sender<Utf8Bytes>,
) {
    loop {
        match world_rx.recv().await {
            Ok(update) => {
                let refresh_latest = update.delta.is_some() || world_latest_tx.borrow().is_empty();
                if refresh_latest {
                    let msg = ServerMessage::Snapshot(SnapshotDto::from(update.snapshot.as_ref()));
                    if let Some(bytes) = encode(&msg) {
                        let _ = world_latest_tx.send(bytes);
                    }
                }

                if let Some(delta) = update.delta.as_ref().filter(|d| !d.is_empty()) {
                    if let Some(bytes) = encode(&ServerMessage::Delta(DeltaDto::from(delta))) {
                        let _ = world_bytes_tx.send(bytes);
                    }
                }

                if !update.events.is_empty() {
                    let msg = ServerMessage::Events(EventsDto {
                        tick: update.tick,
                        events: update.events,
                    });
                    if let Some(bytes) = encode(&msg) {
                        let _ = world_bytes_tx.send(bytes);
                    }
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(
                    missed = n,
                    "world serializer lagged; skipping to latest update"
                );
            }
            Err(broadcast::error::RecvError::Closed) => {
                debug!("world updates channel closed; serializer exiting");
                break;
            }
        }
    }
}

pub fn spawn_lobby_serializer(lobby: &LobbyHandle) {
    // Spawn a task that serializes world updates for this lobby.
    tokio::spawn(world_update_serializer(
        lobby.world_tx.subscribe(),
        lobby.world_bytes_tx.clone(),
        lobby.world_latest_tx.clone(),
    ));
}

impl From<axum::Error> for NetError {
    fn from(e: axum::Error) -> Self {
        NetError::Ws(e)
    }
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
    Query(query): Query<LobbyQuery>,
) -> impl IntoResponse {
    let lobby_id = query
        .lobby_id
        .unwrap_or_else(|| state.default_lobby_id.to_string());

    let lobby = match state.lobby_registry.get_lobby(&lobby_id).await {
        Some(lobby) => lobby,
        None => {
            // Keep not-found responses consistent with the JSON error schema.
            return (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse {
                    error: "lobby not found".to_string(),
                }),
            )
                .into_response();
        }
    };

    let lobby_registry = state.lobby_registry.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, lobby, lobby_registry))
}

async fn handle_socket(socket: WebSocket, lobby: LobbyHandle, lobby_registry: Arc<LobbyRegistry>) {
    // Separate connection id for correlating logs before/after a player_id exists.
    let conn_id = rand_id();
    let span = info_span!("conn", conn_id, player_id = tracing::field::Empty);
    serve_connection(socket, lobby, lobby_registry, span.clone())
        .instrument(span)
        .await;
}

async fn serve_connection(
    mut socket: WebSocket,
    lobby: LobbyHandle,
    lobby_registry: Arc<LobbyRegistry>,
    span: Span,
) {
    let mut ctx = match bootstrap_connection(&mut socket, &lobby, lobby_registry.clone()).await {
        Ok(ctx) => ctx,
        Err(NetError::ClosedBeforeJoin) => {
            info!("client disconnected before join handshake");
            return;
        }
        Err(NetError::PlayerAlreadyConnected) => {
            warn!("join refused: player id already has a live connection");
            return;
        }
        Err(e) => {
            error!(error = ?e, "failed to bootstrap connection");
            let _ = send_close_with_reason(&mut socket, close_code::POLICY, "bootstrap failed").await;
            return;
        }
    };

    // Register the connection so the lobby stays alive while sockets are active.
    if lobby_registry
        .register_connection(&ctx.lobby.lobby_id)
        .await
        .is_none()
    {
        // The lobby can be removed between lookup and registration during shutdown.
        warn!(lobby_id = %ctx.lobby.lobby_id, "lobby missing during connection registration");
        let owned = ctx
            .lobby
            .unregister_player_connection_if_owner(ctx.player_id, ctx.player_conn_token)
            .await;
        if ctx.can_spawn && owned {
            let _ = ctx.lobby.input_tx.send(leave_envelope(ctx.player_id)).await;
        }
        let _ = send_close_with_reason(&mut socket, close_code::POLICY, "lobby unavailable").await;
        return;
    }
    ctx.registered = true;

    span.record("player_id", ctx.player_id.get());
    info!(
        player_id = %ctx.player_id,
        display_name = %ctx.display_name,
        can_spawn = ctx.can_spawn,
        "client connected"
    );

    // Main Client Loop
    if let Err(e) = run_client_loop(&mut socket, &mut ctx).await {
        warn!(error = ?e, "client loop exited with error");
    }
}

async fn send_message(socket: &mut WebSocket, msg: &ServerMessage) -> Result<(), NetError> {
    let txt = serde_json::to_string(msg).map_err(NetError::Serialization)?;
    socket
        .send(Message::Text(txt.into()))
        .await
        .map_err(NetError::Ws)
}

/// Node id a client connection speaks for.
fn client_node(player_id: PlayerId) -> NodeId {
    NodeId::new(player_id.get())
}

// Membership changes are announced by the server, which is the session host.
fn join_envelope(player_id: PlayerId, display_name: String) -> CommandEnvelope {
    CommandEnvelope {
        caller: Caller::node(SERVER_NODE),
        command: Command::Join {
            player_id,
            node: client_node(player_id),
            display_name,
        },
    }
}

fn leave_envelope(player_id: PlayerId) -> CommandEnvelope {
    CommandEnvelope {
        caller: Caller::node(SERVER_NODE),
        command: Command::Leave { player_id },
    }
}

// Everything a joined socket needs for its lifetime.
struct ConnCtx {
    player_id: PlayerId,
    display_name: String,
    lobby: LobbyHandle,
    lobby_registry: Arc<LobbyRegistry>,
    // Ownership token for the player's connection slot.
    player_conn_token: u64,
    // Fired when a resumed connection takes the slot over.
    player_conn_shutdown: Arc<Notify>,
    // Counted in the lobby's connection total.
    registered: bool,
    // Spectators get replication but their intents are dropped.
    can_spawn: bool,
    world_bytes_rx: broadcast::Receiver<Utf8Bytes>,
    world_latest_rx: watch::Receiver<Utf8Bytes>,
    server_state_rx: watch::Receiver<ServerState>,
    throttle: InputThrottle,
    close_frame: Option<CloseFrame>,
}

// Rate limits for repetitive warnings plus the malformed-message budget.
struct InputThrottle {
    invalid_json: u32,
    last_input_full_log: Instant,
    last_world_lag_log: Instant,
    last_invalid_input_log: Instant,
}

impl InputThrottle {
    fn new() -> Self {
        let past = Instant::now() - LOG_THROTTLE;
        Self {
            invalid_json: 0,
            last_input_full_log: past,
            last_world_lag_log: past,
            last_invalid_input_log: past,
        }
    }
}

#[derive(Debug)]
struct JoinHandshake {
    player_id: PlayerId,
    display_name: String,
    resume_token: Option<String>,
}

async fn bootstrap_connection(
    socket: &mut WebSocket,
    lobby: &LobbyHandle,
    lobby_registry: Arc<LobbyRegistry>,
) -> Result<ConnCtx, NetError> {
    // Subscribe to updates *before* doing anything else (awaits) to not miss packets.
    let world_bytes_rx = lobby.world_bytes_tx.subscribe();
    let world_latest_rx = lobby.world_latest_tx.subscribe();
    let server_state_rx = lobby.server_state_tx.subscribe();

    let join = match timeout(JOIN_HANDSHAKE_TIMEOUT, read_join_handshake(socket)).await {
        Ok(result) => result?,
        Err(_) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "join timeout").await;
            return Err(NetError::JoinTimeout);
        }
    };
    let player_id = join.player_id;

    // A live player id is only handed over to a client holding its resume token.
    let player_conn_token = rand_id();
    let claim = match lobby
        .claim_player_connection(player_id, player_conn_token, join.resume_token.as_deref())
        .await
    {
        Ok(claim) => claim,
        Err(SlotTaken) => {
            let _ = send_close_with_reason(socket, close_code::POLICY, "player already connected")
                .await;
            return Err(NetError::PlayerAlreadyConnected);
        }
    };
    let player_conn_shutdown = claim.shutdown;

    let identity = ServerMessage::Identity {
        player_id,
        resume_token: claim.resume_token,
    };
    if let Err(err) = send_message(socket, &identity).await {
        // Ensure the player slot is freed if we fail the handshake early.
        lobby
            .unregister_player_connection_if_owner(player_id, player_conn_token)
            .await;
        return Err(err);
    }

    // Only allow spawning if the lobby explicitly allows this player id.
    let can_spawn = lobby.is_player_allowed(player_id);

    if can_spawn {
        // Join happens before initial state so later snapshots include the new player.
        // If anything after Join fails, compensate with Leave.
        if let Err(err) = lobby
            .input_tx
            .send(join_envelope(player_id, join.display_name.clone()))
            .await
            .map_err(|_| NetError::InputClosed)
        {
            lobby
                .unregister_player_connection_if_owner(player_id, player_conn_token)
                .await;
            return Err(err);
        }
    }

    // Clone as soon as we borrow so the watch lock is never held across an await.
    let initial_state = server_state_rx.borrow().clone();
    let latest_snapshot = world_latest_rx.borrow().clone();
    let mut initial = send_message(socket, &ServerMessage::GameState(initial_state.into())).await;
    if initial.is_ok() && !latest_snapshot.is_empty() {
        initial = socket
            .send(Message::Text(latest_snapshot))
            .await
            .map_err(NetError::Ws);
    }
    if let Err(e) = initial {
        lobby
            .unregister_player_connection_if_owner(player_id, player_conn_token)
            .await;
        if can_spawn {
            lobby
                .input_tx
                .send(leave_envelope(player_id))
                .await
                .map_err(|_| NetError::InputClosed)?; // InputClosed takes precedence
        }
        return Err(e);
    }

    Ok(ConnCtx {
        player_id,
        display_name: join.display_name,
        lobby: lobby.clone(),
        lobby_registry,
        player_conn_token,
        player_conn_shutdown,
        registered: false,
        can_spawn,
        world_bytes_rx,
        world_latest_rx,
        server_state_rx,
        throttle: InputThrottle::new(),
        close_frame: None,
    })
}

enum LoopControl {
    Continue,
    Disconnect,
}

const LOG_THROTTLE: Duration = Duration::from_secs(2);
const MAX_INVALID_JSON: u32 = 10;
const MAX_DISPLAY_NAME_LEN: usize = 32;
const JOIN_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

async fn send_close_with_reason(
    socket: &mut WebSocket,
    code: u16,
    reason: &'static str,
) -> Result<(), NetError> {
    socket
        .send(Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })))
        .await
        .map_err(NetError::Ws)?;
    socket.close().await.map_err(NetError::Ws)
}

async fn read_join_handshake(socket: &mut WebSocket) -> Result<JoinHandshake, NetError> {
    loop {
        let Some(incoming) = socket.recv().await else {
            return Err(NetError::ClosedBeforeJoin);
        };

        let message = incoming.map_err(NetError::Ws)?;
        match message {
            Message::Text(text) => {
                let payload = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(ClientMessage::Join(payload)) => payload,
                    Ok(_) => {
                        let _ = send_close_with_reason(socket, close_code::POLICY, "join required")
                            .await;
                        return Err(NetError::JoinRequired);
                    }
                    Err(_) => {
                        let _ = send_close_with_reason(
                            socket,
                            close_code::POLICY,
                            "invalid join payload",
                        )
                        .await;
                        return Err(NetError::JoinRequired);
                    }
                };

                let display_name = payload.display_name.trim();
                if display_name.is_empty() || display_name.chars().count() > MAX_DISPLAY_NAME_LEN {
                    let _ =
                        send_close_with_reason(socket, close_code::POLICY, "invalid display name")
                            .await;
                    return Err(NetError::JoinRequired);
                }

                return Ok(JoinHandshake {
                    player_id: payload.player_id.unwrap_or_else(guest_player_id),
                    display_name: display_name.to_string(),
                    resume_token: payload.resume_token,
                });
            }
            Message::Binary(_) => {
                let _ = send_close_with_reason(
                    socket,
                    close_code::UNSUPPORTED,
                    "binary messages not supported",
                )
                .await;
                return Err(NetError::JoinRequired);
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Err(NetError::ClosedBeforeJoin),
        }
    }
}

fn should_log(last: &mut Instant) -> bool {
    if last.elapsed() >= LOG_THROTTLE {
        *last = Instant::now();
        true
    } else {
        false
    }
}

// Hands one intent to the world task without ever blocking the socket loop.
fn submit_command(
    player_id: PlayerId,
    input_tx: &mpsc::Sender<CommandEnvelope>,
    command: Command,
    throttle: &mut InputThrottle,
) -> Result<LoopControl, NetError> {
    if let Command::Move { x, y, .. } = command {
        if !x.is_finite() || !y.is_finite() {
            if should_log(&mut throttle.last_invalid_input_log) {
                warn!(%player_id, "invalid move values (NaN/inf); dropping");
            }
            return Ok(LoopControl::Continue);
        }
    }

    let envelope = CommandEnvelope {
        caller: Caller::player(client_node(player_id), player_id),
        command,
    };
    match input_tx.try_send(envelope) {
        Ok(()) => Ok(LoopControl::Continue),
        Err(mpsc::error::TrySendError::Full(_envelope)) => {
            if should_log(&mut throttle.last_input_full_log) {
                warn!(%player_id, "input channel full; dropping command");
            }
            Ok(LoopControl::Continue)
        }
        Err(mpsc::error::TrySendError::Closed(_envelope)) => Err(NetError::InputClosed),
    }
}

async fn run_client_loop(socket: &mut WebSocket, ctx: &mut ConnCtx) -> Result<(), NetError> {
    let player_id = ctx.player_id;
    let mut fatal: Option<NetError> = None;

    loop {
        let disconnect: bool = tokio::select! {
            incoming = socket.recv() => {
                match handle_incoming_ws(
                    incoming,
                    player_id,
                    &ctx.lobby.input_tx,
                    ctx.can_spawn,
                    &mut ctx.throttle,
                    &mut ctx.close_frame,
                ) {
                    Ok(LoopControl::Continue) => false,
                    Ok(LoopControl::Disconnect) => true,
                    Err(e) => {
                        fatal = Some(e);
                        true
                    }
                }
            }

            world_msg = ctx.world_bytes_rx.recv() => {
                match world_msg {
                    Ok(bytes) => forward_world_bytes(bytes, socket).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        if should_log(&mut ctx.throttle.last_world_lag_log) {
                            warn!(missed = n, "world updates lagged; sending snapshot");
                        }

                        // Missed deltas are unrecoverable; resync from the latest full snapshot.
                        let latest = ctx.world_latest_rx.borrow().clone();
                        if latest.is_empty() {
                            false
                        } else {
                            debug!(%player_id, bytes = latest.len(), "sent lag recovery snapshot");
                            forward_world_bytes(latest, socket).await
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        fatal = Some(NetError::WorldUpdatesClosed);
                        true
                    }
                }
            }

            changed_state = ctx.server_state_rx.changed() => {
                match changed_state {
                    Ok(()) => forward_server_state(&ctx.server_state_rx, socket).await,
                    Err(_) => {
                        warn!(%player_id, "server state channel closed; disconnecting");
                        fatal = Some(NetError::ServerStateClosed);
                        true
                    }
                }
            }

            _ = ctx.player_conn_shutdown.notified() => {
                ctx.close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "connection replaced".into(),
                });
                info!(%player_id, "connection resumed elsewhere");
                true
            }
        };

        if disconnect {
            if let Some(frame) = ctx.close_frame.take() {
                let _ = socket.send(Message::Close(Some(frame))).await;
            }
            if let Err(err) = socket.close().await.map_err(NetError::Ws) {
                debug!(error = ?err, "socket close error");
            }
            break;
        }
    }

    if let Err(e) = disconnect_cleanup(ctx).await {
        warn!(error = ?e, "error during disconnect cleanup");
        if fatal.is_none() {
            fatal = Some(e);
        }
    }

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn handle_incoming_ws(
    incoming: Option<Result<Message, Error>>,
    player_id: PlayerId,
    input_tx: &mpsc::Sender<CommandEnvelope>,
    can_spawn: bool,
    throttle: &mut InputThrottle,
    close_frame: &mut Option<CloseFrame>,
) -> Result<LoopControl, NetError> {
    let msg = match incoming {
        Some(Ok(msg)) => msg,
        Some(Err(e)) => {
            warn!(%player_id, error = %e, "websocket recv error");
            return Ok(LoopControl::Disconnect);
        }
        None => {
            info!(%player_id, "websocket closed");
            return Ok(LoopControl::Disconnect);
        }
    };

    let text = match msg {
        Message::Text(text) => text,
        Message::Binary(_) => {
            *close_frame = Some(CloseFrame {
                code: close_code::UNSUPPORTED,
                reason: "binary messages not supported".into(),
            });
            return Ok(LoopControl::Disconnect);
        }
        Message::Ping(_) | Message::Pong(_) => return Ok(LoopControl::Continue),
        Message::Close(_) => return Ok(LoopControl::Disconnect),
    };

    let message = match serde_json::from_str::<ClientMessage>(&text) {
        Ok(message) => message,
        Err(parse_err) => {
            throttle.invalid_json += 1;
            if should_log(&mut throttle.last_invalid_input_log) {
                warn!(
                    %player_id,
                    bytes = text.len(),
                    error = %parse_err,
                    "failed to parse client message"
                );
            }
            if throttle.invalid_json > MAX_INVALID_JSON {
                *close_frame = Some(CloseFrame {
                    code: close_code::POLICY,
                    reason: "too many invalid messages".into(),
                });
                return Ok(LoopControl::Disconnect);
            }
            return Ok(LoopControl::Continue);
        }
    };

    let Some(command) = message.into_command(player_id) else {
        if should_log(&mut throttle.last_invalid_input_log) {
            warn!(%player_id, "duplicate join ignored");
        }
        return Ok(LoopControl::Continue);
    };
    if !can_spawn {
        if should_log(&mut throttle.last_invalid_input_log) {
            warn!(%player_id, "spectator command ignored");
        }
        return Ok(LoopControl::Continue);
    }
    submit_command(player_id, input_tx, command, throttle)
}

// Returns whether the socket should be dropped.
async fn forward_world_bytes(world_msg: Utf8Bytes, socket: &mut WebSocket) -> bool {
    match socket.send(Message::Text(world_msg)).await {
        Ok(()) => false,
        Err(err) => {
            warn!(error = ?err, "failed to send world update");
            true
        }
    }
}

async fn forward_server_state(server_state_rx: &Receiver<ServerState>, socket: &mut WebSocket) -> bool {
    let st = server_state_rx.borrow().clone();
    match send_message(socket, &ServerMessage::GameState(st.into())).await {
        Ok(()) => false,
        Err(err) => {
            warn!(error = ?err, "failed to send server state");
            true
        }
    }
}

async fn disconnect_cleanup(ctx: &ConnCtx) -> Result<(), NetError> {
    let player_id = ctx.player_id;
    // A resumed connection must not despawn the player its successor now drives.
    let owned = ctx
        .lobby
        .unregister_player_connection_if_owner(player_id, ctx.player_conn_token)
        .await;

    // Leave goes out before the disconnect is counted, which may remove the lobby.
    let leave = if ctx.can_spawn && owned {
        ctx.lobby
            .input_tx
            .send(leave_envelope(player_id))
            .await
            .map_err(|_| NetError::InputClosed)
    } else {
        Ok(())
    };

    if ctx.registered {
        // Spectators keep lobbies alive by policy, so count every socket.
        ctx.lobby_registry.register_disconnect(&ctx.lobby.lobby_id).await;
    }

    info!(%player_id, invalid_json = ctx.throttle.invalid_json, "client disconnected");
    leave
}
