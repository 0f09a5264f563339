// Hostile entity and its state machine.

use super::events::{EventBus, MonsterEvent};
use super::ids::{MonsterId, PlayerId};
use super::player::SimPlayer;
use super::state::{DamageOutcome, MonsterSnapshot, Position};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MonsterState {
    Moving,
    Attacking,
    Dead,
}

/// Stats fixed at spawn time from base values and the wave multiplier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MonsterStats {
    pub health: f32,
    pub speed: f32,
    pub damage: f32,
    pub gold: u32,
}

pub struct SimMonster {
    pub id: MonsterId,
    pub pos: Position,
    pub health: f32,
    pub max_health: f32,
    pub speed: f32,
    pub damage: f32,
    pub gold: u32,
    state: MonsterState,
    /// Weak reference: the player may leave or die at any time.
    pub target: Option<PlayerId>,
    pub next_attack_at: f64,
    /// Set on death; the monster is removed once the clock passes it.
    pub despawn_at: Option<f64>,
}

impl SimMonster {
    pub fn new(id: MonsterId, pos: Position, stats: MonsterStats) -> Self {
        Self {
            id,
            pos,
            health: stats.health,
            max_health: stats.health,
            speed: stats.speed,
            damage: stats.damage,
            gold: stats.gold,
            state: MonsterState::Moving,
            target: None,
            next_attack_at: 0.0,
            despawn_at: None,
        }
    }

    /// Rebuilds a monster from its replicated view. `stats` supplies what is not replicated;
    /// a dead monster is swept on the next tick and never pays again.
    pub fn restore(snapshot: &MonsterSnapshot, stats: MonsterStats, now: f64) -> Self {
        let mut monster = Self::new(snapshot.id, Position::new(snapshot.x, snapshot.y), stats);
        monster.health = snapshot.health;
        monster.max_health = snapshot.max_health;
        monster.state = snapshot.state;
        monster.target = snapshot.target;
        if snapshot.state == MonsterState::Dead {
            monster.despawn_at = Some(now);
        }
        monster
    }

    pub fn state(&self) -> MonsterState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state != MonsterState::Dead
    }

    /// Switches between Moving and Attacking. Dead is terminal.
    pub fn set_state(&mut self, state: MonsterState, events: &mut EventBus) {
        if self.state == state || self.state == MonsterState::Dead {
            return;
        }
        self.state = state;
        events.publish(MonsterEvent::StateChanged {
            monster_id: self.id,
            state,
        });
    }

    /// Applies damage and enters Dead on the hit that empties health. Idempotent once dead.
    pub fn apply_damage(
        &mut self,
        amount: f32,
        now: f64,
        display_seconds: f32,
        events: &mut EventBus,
    ) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::Ignored;
        }

        let before = self.health;
        self.health = (self.health - amount.max(0.0)).clamp(0.0, self.max_health);
        let dealt = before - self.health;
        events.publish(MonsterEvent::HealthChanged {
            monster_id: self.id,
            current: self.health,
            max: self.max_health,
        });

        if self.health > 0.0 {
            return DamageOutcome::Damaged { dealt };
        }

        self.set_state(MonsterState::Dead, events);
        self.target = None;
        self.despawn_at = Some(now + f64::from(display_seconds));
        DamageOutcome::Killed { dealt }
    }
}

/// Nearest living player; ties go to the smallest lateral offset, then the lowest id.
pub fn select_target(from: Position, players: &[SimPlayer]) -> Option<PlayerId> {
    players
        .iter()
        .filter(|p| p.is_alive())
        .min_by(|a, b| {
            let da = from.distance_sq(a.pos);
            let db = from.distance_sq(b.pos);
            da.total_cmp(&db)
                .then_with(|| (a.pos.x - from.x).abs().total_cmp(&(b.pos.x - from.x).abs()))
                .then_with(|| a.id.cmp(&b.id))
        })
        .map(|p| p.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DomainEvent;
    use crate::domain::tuning::PlayerTuning;

    fn monster(health: f32) -> SimMonster {
        SimMonster::new(
            MonsterId::new(1),
            Position::default(),
            MonsterStats {
                health,
                speed: 10.0,
                damage: 5.0,
                gold: 10,
            },
        )
    }

    fn player_at(id: u64, x: f32, y: f32) -> SimPlayer {
        SimPlayer::new(
            PlayerId::new(id),
            format!("p{id}"),
            Position::new(x, y),
            &PlayerTuning::default(),
            6,
        )
    }

    #[test]
    fn three_sequential_hits_kill_exactly_once() {
        let mut m = monster(30.0);
        let mut events = EventBus::new();

        assert_eq!(
            m.apply_damage(10.0, 0.0, 1.0, &mut events),
            DamageOutcome::Damaged { dealt: 10.0 }
        );
        assert_eq!(
            m.apply_damage(10.0, 0.0, 1.0, &mut events),
            DamageOutcome::Damaged { dealt: 10.0 }
        );
        assert_eq!(
            m.apply_damage(10.0, 0.0, 1.0, &mut events),
            DamageOutcome::Killed { dealt: 10.0 }
        );
        assert_eq!(
            m.apply_damage(10.0, 0.0, 1.0, &mut events),
            DamageOutcome::Ignored
        );

        let deaths = events
            .pending()
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    DomainEvent::Monster(MonsterEvent::StateChanged {
                        state: MonsterState::Dead,
                        ..
                    })
                )
            })
            .count();
        assert_eq!(deaths, 1);
        assert_eq!(m.health, 0.0);
    }

    #[test]
    fn death_schedules_removal_after_display_delay() {
        let mut m = monster(5.0);
        let mut events = EventBus::new();
        m.apply_damage(50.0, 10.0, 1.5, &mut events);
        assert_eq!(m.despawn_at, Some(11.5));
    }

    #[test]
    fn dead_is_terminal() {
        let mut m = monster(5.0);
        let mut events = EventBus::new();
        m.apply_damage(50.0, 0.0, 1.0, &mut events);
        m.set_state(MonsterState::Moving, &mut events);
        assert_eq!(m.state(), MonsterState::Dead);
    }

    #[test]
    fn target_is_nearest_living_player() {
        let mut players = vec![player_at(1, 0.0, 100.0), player_at(2, 0.0, 20.0)];
        assert_eq!(
            select_target(Position::default(), &players),
            Some(PlayerId::new(2))
        );

        // Dead players are never targeted.
        let mut events = EventBus::new();
        players[1].apply_damage(1_000.0, MonsterId::new(1), 1.0, &mut events);
        assert_eq!(
            select_target(Position::default(), &players),
            Some(PlayerId::new(1))
        );
    }

    #[test]
    fn equal_distance_prefers_smaller_lateral_offset() {
        // Both at distance 50: (30, 40) has lateral 30, (0, 50) has lateral 0.
        let players = vec![player_at(1, 30.0, 40.0), player_at(2, 0.0, 50.0)];
        assert_eq!(
            select_target(Position::default(), &players),
            Some(PlayerId::new(2))
        );
    }

    #[test]
    fn no_living_players_means_no_target() {
        assert_eq!(select_target(Position::default(), &[]), None);
    }
}
