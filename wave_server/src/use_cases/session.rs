// One game session: canonical entities, command handling and the fixed-step tick.

use super::dispatch::{Route, route};
use super::replica::Replica;
use super::types::{Command, CommandEnvelope};
use crate::domain::events::SessionEvent;
use crate::domain::monster::SimMonster;
use crate::domain::player::{MoveIntent, PlayerState, SimPlayer};
use crate::domain::skills::progression;
use crate::domain::state::{EntityKey, EntitySnapshot, Position, SimProjectile};
use crate::domain::systems::{auto_use, monsters, movement, projectiles, spawning};
use crate::domain::tuning::GameTuning;
use crate::domain::wave::WaveController;
use crate::domain::{
    Authority, AuthorityViolation, CommandError, DomainEvent, MissingReference, NodeId, PlayerId,
    PreconditionFailure, SessionContext,
};
use std::collections::BTreeMap;
use tracing::{debug, error, info, trace, warn};

/// Node id of the dedicated server process; always the host of its sessions.
pub const SERVER_NODE: NodeId = NodeId::new(0);

#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub tick: u64,
    pub events: Vec<DomainEvent>,
}

pub struct Session {
    authority: Authority,
    participants: BTreeMap<PlayerId, NodeId>,
    players: Vec<SimPlayer>,
    monsters: Vec<SimMonster>,
    projectiles: Vec<SimProjectile>,
    wave: WaveController,
    ctx: SessionContext,
    tick: u64,
}

impl Session {
    pub fn new(authority: Authority, mut ctx: SessionContext) -> Self {
        let wave = WaveController::start(ctx.now, &ctx.tuning.wave, &mut ctx.events);
        if !authority.is_authority() {
            // Observers learn the wave from replication.
            ctx.events.drain();
        }
        Self {
            authority,
            participants: BTreeMap::new(),
            players: Vec::new(),
            monsters: Vec::new(),
            projectiles: Vec::new(),
            wave,
            ctx,
            tick: 0,
        }
    }

    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn now(&self) -> f64 {
        self.ctx.now
    }

    pub fn tuning(&self) -> &GameTuning {
        &self.ctx.tuning
    }

    pub fn participants(&self) -> impl Iterator<Item = (PlayerId, NodeId)> + '_ {
        self.participants.iter().map(|(p, n)| (*p, *n))
    }

    pub fn players(&self) -> &[SimPlayer] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&SimPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn monsters(&self) -> &[SimMonster] {
        &self.monsters
    }

    pub fn projectiles(&self) -> &[SimProjectile] {
        &self.projectiles
    }

    pub fn wave(&self) -> &WaveController {
        &self.wave
    }

    /// Validates routing and authority, then runs the handler. Failures are logged
    /// by class and leave the session untouched.
    pub fn dispatch(&mut self, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        let command = &envelope.command;
        let route = route(command.kind());

        let result = self
            .authorize(route, envelope)
            .and_then(|()| self.execute(command));

        if let Err(err) = &result {
            let player_id = command.subject().get();
            let kind = command.kind();
            match err {
                CommandError::Precondition(_) => {
                    debug!(player_id, ?kind, error = %err, "command rejected")
                }
                CommandError::Authority(_) => {
                    error!(player_id, ?kind, error = %err, "command rejected")
                }
                CommandError::Missing(_) => {
                    warn!(player_id, ?kind, error = %err, "command aborted")
                }
            }
        }
        result
    }

    fn authorize(&self, route: Route, envelope: &CommandEnvelope) -> Result<(), CommandError> {
        self.authority.check_node(route.audience)?;
        self.authority.check_caller(
            route.required,
            &envelope.caller,
            envelope.command.subject(),
        )?;
        Ok(())
    }

    fn execute(&mut self, command: &Command) -> Result<(), CommandError> {
        match command {
            Command::Join {
                player_id,
                node,
                display_name,
            } => self.handle_join(*player_id, *node, display_name),
            Command::Leave { player_id } => self.handle_leave(*player_id),
            Command::Move { player_id, x, y } => self.handle_move(*player_id, *x, *y),
            Command::Attack { player_id } => self.handle_attack(*player_id),
            Command::DrawSkill { player_id } => self.handle_draw(*player_id),
            Command::CombineSkill {
                player_id,
                skill_id,
            } => {
                let player = find_player(&mut self.players, *player_id)?;
                progression::combine(player, *skill_id, &mut self.ctx).map(|_| ())
            }
            Command::Respawn { player_id } => {
                let player = find_player(&mut self.players, *player_id)?;
                player.respawn(&mut self.ctx.events)?;
                info!(player_id = %player_id, "player respawned");
                Ok(())
            }
            Command::Defend { player_id } => self.handle_defend(*player_id),
        }
    }

    fn handle_join(
        &mut self,
        player_id: PlayerId,
        node: NodeId,
        display_name: &str,
    ) -> Result<(), CommandError> {
        if self.participants.contains_key(&player_id) {
            return Err(PreconditionFailure::AlreadyJoined(player_id).into());
        }
        self.participants.insert(player_id, node);

        if self.authority.is_authority() {
            let tuning = &self.ctx.tuning;
            let spawn = spawn_point(self.players.len(), tuning);
            self.players.push(SimPlayer::new(
                player_id,
                display_name.to_string(),
                spawn,
                &tuning.player,
                tuning.skill.active_slots,
            ));
            info!(player_id = %player_id, display_name, "player joined");
        }
        self.ctx
            .events
            .publish(SessionEvent::ParticipantJoined { player_id });
        Ok(())
    }

    fn handle_leave(&mut self, player_id: PlayerId) -> Result<(), CommandError> {
        if self.participants.remove(&player_id).is_none() {
            return Err(MissingReference::Player(player_id).into());
        }

        // Observers drop the leaver from their mirror as well.
        self.players.retain(|p| p.id != player_id);
        self.projectiles.retain(|p| p.owner_id != player_id);
        if self.authority.is_authority() {
            info!(player_id = %player_id, "player left");
        }
        self.ctx
            .events
            .publish(SessionEvent::ParticipantLeft { player_id });

        let mut remaining: Vec<NodeId> = self.participants.values().copied().collect();
        remaining.push(self.authority.local());
        if let Some(host) = self.authority.reelect(&remaining) {
            info!(
                host = %host,
                players = self.players.len(),
                monsters = self.monsters.len(),
                "host re-elected"
            );
            self.ctx.events.publish(SessionEvent::HostChanged { host });
        }
        Ok(())
    }

    /// Rebuilds the observer's mirror of players, monsters and the wave from replicated
    /// state, so a node promoted by re-election continues the world it last saw.
    /// In-flight projectiles are not carried over.
    pub fn sync_from_replica(&mut self, replica: &Replica) -> Result<(), AuthorityViolation> {
        if self.authority.is_authority() {
            return Err(AuthorityViolation::ReplicatedWriteOnAuthority {
                node: self.authority.local(),
            });
        }

        let tuning = self.ctx.tuning.clone();
        let now = self.ctx.now;
        if let Some(EntitySnapshot::Wave(w)) = replica.get(EntityKey::Wave) {
            self.wave = WaveController::resume(w.number, w.state, w.spawned, now, &tuning.wave);
        }
        let stats = spawning::scaled_stats(&tuning.monster, &tuning.wave, self.wave.multiplier());

        let mut players = Vec::new();
        let mut monsters = Vec::new();
        for entity in replica.entities() {
            match entity {
                EntitySnapshot::Wave(_) => {}
                EntitySnapshot::Player(p) => {
                    let spawn = spawn_point(players.len(), &tuning);
                    players.push(SimPlayer::restore(
                        p,
                        spawn,
                        &tuning.player,
                        tuning.skill.active_slots,
                    ));
                }
                EntitySnapshot::Monster(m) => {
                    self.ctx.ids.reserve(m.id.get());
                    monsters.push(SimMonster::restore(m, stats, now));
                }
                EntitySnapshot::Projectile(p) => self.ctx.ids.reserve(p.id.get()),
            }
        }

        self.players = players;
        self.monsters = monsters;
        self.projectiles.clear();
        if let Some(tick) = replica.last_tick() {
            self.tick = self.tick.max(tick);
        }
        debug!(
            tick = self.tick,
            players = self.players.len(),
            monsters = self.monsters.len(),
            "mirror synced from replica"
        );
        Ok(())
    }

    fn handle_move(&mut self, player_id: PlayerId, x: f32, y: f32) -> Result<(), CommandError> {
        let player = find_player(&mut self.players, player_id)?;
        player.ensure_alive()?;
        if let Some(intent) = MoveIntent::sanitized(x, y) {
            player.move_intent = intent;
        }
        Ok(())
    }

    fn handle_attack(&mut self, player_id: PlayerId) -> Result<(), CommandError> {
        let player = find_player(&mut self.players, player_id)?;
        auto_use::fire_basic_attack(player, &self.monsters, &mut self.projectiles, &mut self.ctx)?;
        Ok(())
    }

    fn handle_draw(&mut self, player_id: PlayerId) -> Result<(), CommandError> {
        let player = find_player(&mut self.players, player_id)?;
        let acquired = progression::draw(player, &mut self.ctx)?;
        debug!(
            player_id = %player_id,
            skill_id = %acquired.skill,
            stack = acquired.stack,
            "skill drawn"
        );
        Ok(())
    }

    fn handle_defend(&mut self, player_id: PlayerId) -> Result<(), CommandError> {
        let tuning = self.ctx.tuning.player;
        let now = self.ctx.now;
        let player = find_player(&mut self.players, player_id)?;
        player.ensure_alive()?;
        player.spend_mana(tuning.defend_mana_cost)?;
        player.begin_action(
            PlayerState::Defending,
            now + f64::from(tuning.defend_seconds),
            &mut self.ctx.events,
        );
        Ok(())
    }

    /// Advances the simulation by `dt` seconds. Observers never simulate.
    pub fn step(&mut self, dt: f32) -> TickOutput {
        if !self.authority.is_authority() {
            trace!(node = %self.authority.local(), "not the host; skipping simulation");
            return TickOutput {
                tick: self.tick,
                events: self.ctx.events.drain(),
            };
        }

        self.tick += 1;
        self.ctx.now += f64::from(dt);
        let now = self.ctx.now;
        let tuning = self.ctx.tuning.clone();
        let movement_cfg = movement::MovementConfig {
            max_speed: tuning.player.max_speed,
            bounds: tuning.world,
        };

        for p in &mut self.players {
            p.update_timers(now, dt, &tuning.player, &mut self.ctx.events);
            movement::tick_player(p, dt, movement_cfg);
        }

        monsters::tick_monsters(&mut self.monsters, &mut self.players, &mut self.ctx, dt);
        spawning::tick_spawning(&mut self.wave, &self.players, &mut self.monsters, &mut self.ctx);

        for p in &mut self.players {
            let _ = auto_use::tick_auto_use(p, &self.monsters, &mut self.projectiles, &mut self.ctx);
        }

        projectiles::tick_projectiles(
            &mut self.projectiles,
            &mut self.monsters,
            &mut self.players,
            &mut self.ctx,
            dt,
        );
        monsters::sweep_monsters(&mut self.monsters, &mut self.ctx);

        let living = self.monsters.iter().filter(|m| m.is_alive()).count();
        let before = self.wave.state();
        self.wave.advance(now, living, &tuning.wave, &mut self.ctx.events);
        if self.wave.state() != before {
            info!(wave = self.wave.number(), state = ?self.wave.state(), "wave state changed");
        }

        TickOutput {
            tick: self.tick,
            events: self.ctx.events.drain(),
        }
    }

    /// Replicated view of every entity, wave first.
    pub fn snapshot(&self) -> Vec<EntitySnapshot> {
        let mut entities = Vec::with_capacity(
            1 + self.players.len() + self.monsters.len() + self.projectiles.len(),
        );
        entities.push(EntitySnapshot::Wave((&self.wave).into()));
        entities.extend(self.players.iter().map(|p| EntitySnapshot::Player(p.into())));
        entities.extend(self.monsters.iter().map(|m| EntitySnapshot::Monster(m.into())));
        entities.extend(
            self.projectiles
                .iter()
                .map(|p| EntitySnapshot::Projectile(p.into())),
        );
        entities
    }
}

fn find_player(players: &mut [SimPlayer], id: PlayerId) -> Result<&mut SimPlayer, MissingReference> {
    players
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or(MissingReference::Player(id))
}

// Spawn points fan out from the centre line: 0, +s, -s, +2s, -2s, ...
fn spawn_point(index: usize, tuning: &GameTuning) -> Position {
    let rank = index.div_ceil(2) as f32;
    let side = if index % 2 == 1 { 1.0 } else { -1.0 };
    let x = (side * rank * tuning.player.spawn_spacing).clamp(tuning.world.min_x, tuning.world.max_x);
    Position::new(x, 0.0)
}
