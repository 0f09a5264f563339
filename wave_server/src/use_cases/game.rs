use super::replication::{ReplicationChannel, WorldSnapshot};
use super::session::Session;
use super::types::{CommandEnvelope, ServerState, WorldUpdate};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Notify, broadcast, mpsc, watch};
use tracing::{debug, info};

/// Match pacing for one lobby world.
#[derive(Debug, Clone, Copy)]
pub struct MatchTiming {
    pub tick_interval: Duration,
    /// Zero disables the time limit.
    pub time_limit: Duration,
    pub start_countdown: Duration,
}

/// Single writer for a lobby's session: drains commands, steps the simulation and
/// publishes one `WorldUpdate` per tick.
pub async fn world_task(
    mut input_rx: mpsc::Receiver<CommandEnvelope>,
    world_tx: broadcast::Sender<WorldUpdate>,
    server_state_tx: watch::Sender<ServerState>,
    timing: MatchTiming,
    shutdown: Arc<Notify>,
    mut session: Session,
) {
    let mut replication = ReplicationChannel::new(session.tuning().replication.interval_ticks);

    let _ = server_state_tx.send(ServerState::MatchStarting {
        in_seconds: timing.start_countdown.as_secs() as u32,
    });
    tokio::select! {
        _ = shutdown.notified() => return,
        _ = tokio::time::sleep(timing.start_countdown) => {}
    }
    let _ = server_state_tx.send(ServerState::MatchRunning);
    info!(
        tick_ms = timing.tick_interval.as_millis() as u64,
        "match running"
    );

    let mut interval = tokio::time::interval(timing.tick_interval);
    let dt = timing.tick_interval.as_secs_f32();

    let mut match_elapsed = Duration::from_secs(0);
    let mut match_ended = false;

    loop {
        tokio::select! {
            _ = shutdown.notified() => {
                // Lobby removed.
                break;
            }
            _ = interval.tick() => {
                if !match_ended && timing.time_limit != Duration::from_secs(0) {
                    match_elapsed += timing.tick_interval;
                    if match_elapsed >= timing.time_limit {
                        info!(wave = session.wave().number(), "match time limit reached");
                        let _ = server_state_tx.send(ServerState::MatchEnded);
                        match_ended = true;
                    }
                }
            }
        }

        // Rejections are logged by dispatch; nothing is retried.
        while let Ok(envelope) = input_rx.try_recv() {
            let _ = session.dispatch(&envelope);
        }

        if match_ended {
            continue;
        }

        let out = session.step(dt);
        let entities = session.snapshot();
        let delta = replication.poll(out.tick, &entities);
        let snapshot = Arc::new(WorldSnapshot {
            tick: out.tick,
            entities,
        });

        if world_tx
            .send(WorldUpdate {
                tick: out.tick,
                snapshot,
                delta,
                events: out.events,
            })
            .is_err()
        {
            debug!(tick = out.tick, "no world update subscribers");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Authority, Caller, EntityKey, NodeId, PlayerId, SessionContext};
    use crate::use_cases::session::SERVER_NODE;
    use crate::use_cases::types::Command;

    fn timing(time_limit: Duration) -> MatchTiming {
        MatchTiming {
            tick_interval: Duration::from_millis(5),
            time_limit,
            start_countdown: Duration::from_millis(0),
        }
    }

    #[tokio::test]
    async fn joined_players_show_up_in_world_updates() {
        let (input_tx, input_rx) = mpsc::channel(16);
        let (world_tx, mut world_rx) = broadcast::channel(64);
        let (state_tx, _state_rx) = watch::channel(ServerState::Lobby);
        let shutdown = Arc::new(Notify::new());
        let session = Session::new(Authority::dedicated(SERVER_NODE), SessionContext::seeded(3));

        let task = tokio::spawn(world_task(
            input_rx,
            world_tx,
            state_tx,
            timing(Duration::from_secs(0)),
            shutdown.clone(),
            session,
        ));

        input_tx
            .send(CommandEnvelope {
                caller: Caller::node(SERVER_NODE),
                command: Command::Join {
                    player_id: PlayerId::new(42),
                    node: NodeId::new(42),
                    display_name: "ada".to_string(),
                },
            })
            .await
            .unwrap();

        let key = EntityKey::Player(PlayerId::new(42));
        let mut seen = false;
        for _ in 0..50 {
            let update = world_rx.recv().await.unwrap();
            if update.snapshot.entities.iter().any(|e| e.key() == key) {
                seen = true;
                break;
            }
        }
        assert!(seen, "joined player never replicated");

        shutdown.notify_one();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn time_limit_ends_the_match() {
        let (_input_tx, input_rx) = mpsc::channel(16);
        let (world_tx, _world_rx) = broadcast::channel(64);
        let (state_tx, mut state_rx) = watch::channel(ServerState::Lobby);
        let shutdown = Arc::new(Notify::new());
        let session = Session::new(Authority::dedicated(SERVER_NODE), SessionContext::seeded(3));

        let task = tokio::spawn(world_task(
            input_rx,
            world_tx,
            state_tx,
            timing(Duration::from_millis(20)),
            shutdown.clone(),
            session,
        ));

        let ended = tokio::time::timeout(
            Duration::from_secs(2),
            state_rx.wait_for(|s| matches!(s, ServerState::MatchEnded)),
        )
        .await;
        assert!(matches!(ended, Ok(Ok(_))));
        drop(ended);

        shutdown.notify_one();
        task.await.unwrap();
    }
}
