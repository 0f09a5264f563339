// Wire protocol DTOs and conversions for public game server messages.
// Internal service-to-service DTOs should live outside this module.

use crate::domain::monster::MonsterState;
use crate::domain::player::PlayerState;
use crate::domain::skills::{Attribute, SkillId};
use crate::domain::state::{MonsterSnapshot, PlayerSnapshot, ProjectileSnapshot, WaveSnapshot};
use crate::domain::wave::WaveState;
use crate::domain::{DomainEvent, EntityKey, EntitySnapshot, MonsterId, PlayerId, ProjectileId};
use crate::use_cases::{Command, ServerState, WorldDelta, WorldSnapshot};
use serde::{Deserialize, Serialize};

/// Messages the server sends to connected clients over the WebSocket.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    // Assigned identity after Join is accepted, with the token needed to resume it
    // while this connection is still live.
    Identity {
        player_id: PlayerId,
        resume_token: String,
    },
    // Full world state; sent on join, on replication ticks to the latest slot, and on lag.
    Snapshot(SnapshotDto),
    // Changes since the previous replication push.
    Delta(DeltaDto),
    // Everything the authority published during one tick.
    Events(EventsDto),
    // High-level server state transitions (lobby, match start/end).
    GameState(ServerStateDto),
}

/// Messages the client sends to the server over the WebSocket.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum ClientMessage {
    // Initial handshake message with identity metadata.
    Join(JoinPayload),
    Move(MovePayload),
    Attack,
    DrawSkill,
    CombineSkill(CombinePayload),
    Respawn,
    Defend,
}

impl ClientMessage {
    /// Maps a post-handshake message to the command it requests. `Join` has no command form.
    pub fn into_command(self, player_id: PlayerId) -> Option<Command> {
        let command = match self {
            ClientMessage::Join(_) => return None,
            ClientMessage::Move(MovePayload { x, y }) => Command::Move { player_id, x, y },
            ClientMessage::Attack => Command::Attack { player_id },
            ClientMessage::DrawSkill => Command::DrawSkill { player_id },
            ClientMessage::CombineSkill(CombinePayload { skill_id }) => {
                Command::CombineSkill {
                    player_id,
                    skill_id,
                }
            }
            ClientMessage::Respawn => Command::Respawn { player_id },
            ClientMessage::Defend => Command::Defend { player_id },
        };
        Some(command)
    }
}

/// Payload for the Join handshake with identity metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct JoinPayload {
    pub display_name: String,
    // Identity assigned by matchmaking; a fresh one is minted when absent.
    #[serde(default)]
    pub player_id: Option<PlayerId>,
    // Token from a previous Identity; required to take over a still-live connection.
    #[serde(default)]
    pub resume_token: Option<String>,
}

/// Movement intent; the server clamps it to unit length.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct MovePayload {
    #[serde(default)]
    pub x: f32,
    #[serde(default)]
    pub y: f32,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CombinePayload {
    pub skill_id: SkillId,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotDto {
    pub tick: u64,
    pub entities: Vec<EntityDto>,
}

impl From<&WorldSnapshot> for SnapshotDto {
    fn from(snapshot: &WorldSnapshot) -> Self {
        Self {
            tick: snapshot.tick,
            entities: snapshot.entities.iter().map(EntityDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DeltaDto {
    pub tick: u64,
    pub upserts: Vec<EntityDto>,
    pub removed: Vec<EntityKeyDto>,
}

impl From<&WorldDelta> for DeltaDto {
    fn from(delta: &WorldDelta) -> Self {
        Self {
            tick: delta.tick,
            upserts: delta.upserts.iter().map(EntityDto::from).collect(),
            removed: delta.removed.iter().copied().map(EntityKeyDto::from).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EventsDto {
    pub tick: u64,
    pub events: Vec<DomainEvent>,
}

/// One replicated entity, tagged by `kind`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind")]
pub enum EntityDto {
    Wave(WaveStateDto),
    Player(PlayerStateDto),
    Monster(MonsterStateDto),
    Projectile(ProjectileStateDto),
}

impl From<&EntitySnapshot> for EntityDto {
    fn from(entity: &EntitySnapshot) -> Self {
        match entity {
            EntitySnapshot::Wave(w) => EntityDto::Wave(w.into()),
            EntitySnapshot::Player(p) => EntityDto::Player(p.into()),
            EntitySnapshot::Monster(m) => EntityDto::Monster(m.into()),
            EntitySnapshot::Projectile(p) => EntityDto::Projectile(p.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "kind", content = "id")]
pub enum EntityKeyDto {
    Wave,
    Player(PlayerId),
    Monster(MonsterId),
    Projectile(ProjectileId),
}

impl From<EntityKey> for EntityKeyDto {
    fn from(key: EntityKey) -> Self {
        match key {
            EntityKey::Wave => EntityKeyDto::Wave,
            EntityKey::Player(id) => EntityKeyDto::Player(id),
            EntityKey::Monster(id) => EntityKeyDto::Monster(id),
            EntityKey::Projectile(id) => EntityKeyDto::Projectile(id),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WaveStateDto {
    pub number: u32,
    pub state: WaveState,
    pub multiplier: f32,
    pub spawned: u32,
    pub population_cap: u32,
}

impl From<&WaveSnapshot> for WaveStateDto {
    fn from(wave: &WaveSnapshot) -> Self {
        Self {
            number: wave.number,
            state: wave.state,
            multiplier: wave.multiplier,
            spawned: wave.spawned,
            population_cap: wave.population_cap,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OwnedSkillDto {
    pub skill_id: SkillId,
    pub stack: u8,
}

/// Flattened player state for wire transmission.
#[derive(Debug, Clone, Serialize)]
pub struct PlayerStateDto {
    pub id: PlayerId,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub mana: f32,
    pub score: u32,
    pub currency: u32,
    pub state: PlayerState,
    pub skills: Vec<OwnedSkillDto>,
    pub slots: Vec<Option<SkillId>>,
}

impl From<&PlayerSnapshot> for PlayerStateDto {
    fn from(player: &PlayerSnapshot) -> Self {
        Self {
            id: player.id,
            display_name: player.display_name.clone(),
            x: player.x,
            y: player.y,
            hp: player.health,
            max_hp: player.max_health,
            mana: player.mana,
            score: player.score,
            currency: player.currency,
            state: player.state,
            skills: player
                .skills
                .iter()
                .map(|&(skill_id, stack)| OwnedSkillDto { skill_id, stack })
                .collect(),
            slots: player.slots.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonsterStateDto {
    pub id: MonsterId,
    pub x: f32,
    pub y: f32,
    pub hp: f32,
    pub max_hp: f32,
    pub state: MonsterState,
    pub target: Option<PlayerId>,
}

impl From<&MonsterSnapshot> for MonsterStateDto {
    fn from(monster: &MonsterSnapshot) -> Self {
        Self {
            id: monster.id,
            x: monster.x,
            y: monster.y,
            hp: monster.health,
            max_hp: monster.max_health,
            state: monster.state,
            target: monster.target,
        }
    }
}

/// Flattened projectile state for wire transmission in world updates.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectileStateDto {
    pub id: ProjectileId,
    pub owner_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub attribute: Option<Attribute>,
}

impl From<&ProjectileSnapshot> for ProjectileStateDto {
    fn from(projectile: &ProjectileSnapshot) -> Self {
        Self {
            id: projectile.id,
            owner_id: projectile.owner_id,
            x: projectile.x,
            y: projectile.y,
            attribute: projectile.attribute,
        }
    }
}

/// Server lifecycle state sent to clients for UI flow.
#[derive(Debug, Clone, Serialize)]
pub enum ServerStateDto {
    Lobby,
    MatchStarting { in_seconds: u32 },
    MatchRunning,
    MatchEnded,
}

impl From<ServerState> for ServerStateDto {
    fn from(state: ServerState) -> Self {
        match state {
            ServerState::Lobby => ServerStateDto::Lobby,
            ServerState::MatchStarting { in_seconds } => {
                ServerStateDto::MatchStarting { in_seconds }
            }
            ServerState::MatchRunning => ServerStateDto::MatchRunning,
            ServerState::MatchEnded => ServerStateDto::MatchEnded,
        }
    }
}
