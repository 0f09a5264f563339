// Domain-level simulation entities and the snapshot types replicated to observers.

use super::ids::{MonsterId, PlayerId, ProjectileId};
use super::monster::{MonsterState, SimMonster};
use super::player::{PlayerState, SimPlayer};
use super::skills::{Attribute, SkillEffects, SkillId};
use super::wave::{WaveController, WaveState};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance_sq(self, other: Position) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        dx * dx + dy * dy
    }

    pub fn distance(self, other: Position) -> f32 {
        self.distance_sq(other).sqrt()
    }

    /// Unit vector towards `other`, or `None` when both points coincide.
    pub fn direction_to(self, other: Position) -> Option<(f32, f32)> {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let len = (dx * dx + dy * dy).sqrt();
        if len <= f32::EPSILON {
            return None;
        }
        Some((dx / len, dy / len))
    }
}

/// How a damage application resolved on its target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DamageOutcome {
    /// Target was already dead; nothing changed.
    Ignored,
    Damaged { dealt: f32 },
    /// This hit moved the target into Dead. Reported exactly once per target.
    Killed { dealt: f32 },
}

pub struct SimProjectile {
    pub id: ProjectileId,
    pub owner_id: PlayerId,
    pub pos: Position,
    pub dir_x: f32,
    pub dir_y: f32,
    pub speed: f32,
    pub damage: f32,
    pub range: f32,
    pub traveled: f32,
    /// `None` for basic attacks.
    pub attribute: Option<Attribute>,
    pub effects: SkillEffects,
    /// Targets already damaged by this projectile, primary or splash.
    pub hit_set: HashSet<MonsterId>,
    pub expires_at: f64,
    // Set on non-piercing hit, range exhaustion or timeout; swept at the end of the tick.
    pub spent: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub display_name: String,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    pub score: u32,
    pub currency: u32,
    pub state: PlayerState,
    pub skills: Vec<(SkillId, u8)>,
    pub slots: Vec<Option<SkillId>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonsterSnapshot {
    pub id: MonsterId,
    pub x: f32,
    pub y: f32,
    pub health: f32,
    pub max_health: f32,
    pub state: MonsterState,
    pub target: Option<PlayerId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectileSnapshot {
    pub id: ProjectileId,
    pub owner_id: PlayerId,
    pub x: f32,
    pub y: f32,
    pub attribute: Option<Attribute>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WaveSnapshot {
    pub number: u32,
    pub state: WaveState,
    pub multiplier: f32,
    pub spawned: u32,
    pub population_cap: u32,
}

/// Replication key; one snapshot per key per push.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKey {
    Wave,
    Player(PlayerId),
    Monster(MonsterId),
    Projectile(ProjectileId),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EntitySnapshot {
    Wave(WaveSnapshot),
    Player(PlayerSnapshot),
    Monster(MonsterSnapshot),
    Projectile(ProjectileSnapshot),
}

impl EntitySnapshot {
    pub fn key(&self) -> EntityKey {
        match self {
            EntitySnapshot::Wave(_) => EntityKey::Wave,
            EntitySnapshot::Player(p) => EntityKey::Player(p.id),
            EntitySnapshot::Monster(m) => EntityKey::Monster(m.id),
            EntitySnapshot::Projectile(p) => EntityKey::Projectile(p.id),
        }
    }

    pub fn position(&self) -> Option<Position> {
        match self {
            EntitySnapshot::Wave(_) => None,
            EntitySnapshot::Player(p) => Some(Position::new(p.x, p.y)),
            EntitySnapshot::Monster(m) => Some(Position::new(m.x, m.y)),
            EntitySnapshot::Projectile(p) => Some(Position::new(p.x, p.y)),
        }
    }
}

impl From<&SimPlayer> for PlayerSnapshot {
    fn from(p: &SimPlayer) -> Self {
        Self {
            id: p.id,
            display_name: p.display_name.clone(),
            x: p.pos.x,
            y: p.pos.y,
            health: p.health,
            max_health: p.max_health,
            mana: p.mana,
            score: p.score,
            currency: p.currency,
            state: p.state(),
            skills: p.inventory.owned().collect(),
            slots: p.inventory.slots().iter().map(|s| s.skill).collect(),
        }
    }
}

impl From<&SimMonster> for MonsterSnapshot {
    fn from(m: &SimMonster) -> Self {
        Self {
            id: m.id,
            x: m.pos.x,
            y: m.pos.y,
            health: m.health,
            max_health: m.max_health,
            state: m.state(),
            target: m.target,
        }
    }
}

impl From<&SimProjectile> for ProjectileSnapshot {
    fn from(p: &SimProjectile) -> Self {
        Self {
            id: p.id,
            owner_id: p.owner_id,
            x: p.pos.x,
            y: p.pos.y,
            attribute: p.attribute,
        }
    }
}

impl From<&WaveController> for WaveSnapshot {
    fn from(w: &WaveController) -> Self {
        Self {
            number: w.number(),
            state: w.state(),
            multiplier: w.multiplier(),
            spawned: w.spawned(),
            population_cap: w.population_cap(),
        }
    }
}
