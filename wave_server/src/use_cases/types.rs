// Use-case level inputs/outputs for the game loop.

use super::replication::{WorldDelta, WorldSnapshot};
use crate::domain::skills::SkillId;
use crate::domain::{Caller, DomainEvent, NodeId, PlayerId};
use std::sync::Arc;

/// Mutation requests accepted by a session. Every command names the player it acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Join {
        player_id: PlayerId,
        node: NodeId,
        display_name: String,
    },
    Leave {
        player_id: PlayerId,
    },
    Move {
        player_id: PlayerId,
        x: f32,
        y: f32,
    },
    /// Manual trigger of the basic attack; auto-use fires it too.
    Attack {
        player_id: PlayerId,
    },
    DrawSkill {
        player_id: PlayerId,
    },
    CombineSkill {
        player_id: PlayerId,
        skill_id: SkillId,
    },
    Respawn {
        player_id: PlayerId,
    },
    Defend {
        player_id: PlayerId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Join,
    Leave,
    Move,
    Attack,
    DrawSkill,
    CombineSkill,
    Respawn,
    Defend,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Join { .. } => CommandKind::Join,
            Command::Leave { .. } => CommandKind::Leave,
            Command::Move { .. } => CommandKind::Move,
            Command::Attack { .. } => CommandKind::Attack,
            Command::DrawSkill { .. } => CommandKind::DrawSkill,
            Command::CombineSkill { .. } => CommandKind::CombineSkill,
            Command::Respawn { .. } => CommandKind::Respawn,
            Command::Defend { .. } => CommandKind::Defend,
        }
    }

    /// The player entity this command reads or mutates.
    pub fn subject(&self) -> PlayerId {
        match self {
            Command::Join { player_id, .. }
            | Command::Leave { player_id }
            | Command::Move { player_id, .. }
            | Command::Attack { player_id }
            | Command::DrawSkill { player_id }
            | Command::CombineSkill { player_id, .. }
            | Command::Respawn { player_id }
            | Command::Defend { player_id } => *player_id,
        }
    }
}

/// A command plus who sent it, as delivered to the world task.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandEnvelope {
    pub caller: Caller,
    pub command: Command,
}

#[derive(Debug, Clone)]
pub enum ServerState {
    Lobby,
    MatchStarting { in_seconds: u32 },
    MatchRunning,
    MatchEnded,
}

/// Everything one tick produced, fanned out to every connection of the lobby.
#[derive(Debug, Clone)]
pub struct WorldUpdate {
    pub tick: u64,
    /// Full state, kept for joins and lag recovery.
    pub snapshot: Arc<WorldSnapshot>,
    /// Present only on replication ticks.
    pub delta: Option<WorldDelta>,
    pub events: Vec<DomainEvent>,
}
