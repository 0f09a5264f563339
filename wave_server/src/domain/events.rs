// Typed outbound events. Every authoritative mutation publishes one of these so
// collaborators (network fan-out, observers, UI) react without polling.

use super::ids::{MonsterId, NodeId, PlayerId};
use super::monster::MonsterState;
use super::player::PlayerState;
use super::skills::SkillId;
use super::wave::WaveState;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PlayerEvent {
    HealthChanged {
        player_id: PlayerId,
        current: f32,
        max: f32,
    },
    StateChanged {
        player_id: PlayerId,
        state: PlayerState,
    },
    CurrencyChanged {
        player_id: PlayerId,
        currency: u32,
    },
    Died {
        player_id: PlayerId,
        killer_id: MonsterId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MonsterEvent {
    Spawned {
        monster_id: MonsterId,
        target: Option<PlayerId>,
    },
    HealthChanged {
        monster_id: MonsterId,
        current: f32,
        max: f32,
    },
    StateChanged {
        monster_id: MonsterId,
        state: MonsterState,
    },
    Killed {
        monster_id: MonsterId,
        killer_id: PlayerId,
        gold_reward: u32,
    },
    Removed {
        monster_id: MonsterId,
        passed_through: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SkillEvent {
    Acquired {
        player_id: PlayerId,
        skill_id: SkillId,
        new_stack: u8,
    },
    Upgraded {
        player_id: PlayerId,
        from_id: SkillId,
        to_id: SkillId,
    },
    Used {
        player_id: PlayerId,
        skill_id: SkillId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WaveEvent {
    Changed { number: u32 },
    StateChanged { number: u32, state: WaveState },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SessionEvent {
    ParticipantJoined { player_id: PlayerId },
    ParticipantLeft { player_id: PlayerId },
    HostChanged { host: NodeId },
}

/// One variant per event category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "category", content = "event")]
pub enum DomainEvent {
    Player(PlayerEvent),
    Monster(MonsterEvent),
    Skill(SkillEvent),
    Wave(WaveEvent),
    Session(SessionEvent),
}

macro_rules! into_domain_event {
    ($($ty:ident => $variant:ident),* $(,)?) => {
        $(impl From<$ty> for DomainEvent {
            fn from(event: $ty) -> Self {
                DomainEvent::$variant(event)
            }
        })*
    };
}

into_domain_event!(
    PlayerEvent => Player,
    MonsterEvent => Monster,
    SkillEvent => Skill,
    WaveEvent => Wave,
    SessionEvent => Session,
);

/// Per-tick outbox. The world task drains it after each step and fans it out.
#[derive(Debug, Default)]
pub struct EventBus {
    pending: Vec<DomainEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&mut self, event: impl Into<DomainEvent>) {
        self.pending.push(event.into());
    }

    pub fn drain(&mut self) -> Vec<DomainEvent> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending(&self) -> &[DomainEvent] {
        &self.pending
    }
}
