// Player entity and its state machine.

use super::error::PreconditionFailure;
use super::events::{EventBus, PlayerEvent};
use super::ids::{MonsterId, PlayerId};
use super::skills::SkillInventory;
use super::state::{DamageOutcome, PlayerSnapshot, Position};
use super::tuning::PlayerTuning;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlayerState {
    Idle,
    Attacking,
    UsingSkill,
    Defending,
    Dead,
}

impl PlayerState {
    /// States that revert to Idle on their own.
    pub fn is_action(self) -> bool {
        matches!(
            self,
            PlayerState::Attacking | PlayerState::UsingSkill | PlayerState::Defending
        )
    }
}

/// Latest movement intent, unit-length at most.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MoveIntent {
    pub x: f32,
    pub y: f32,
}

impl MoveIntent {
    /// Drops non-finite input and clamps the vector to unit length.
    pub fn sanitized(x: f32, y: f32) -> Option<Self> {
        if !x.is_finite() || !y.is_finite() {
            return None;
        }
        let len = (x * x + y * y).sqrt();
        if len > 1.0 {
            Some(Self {
                x: x / len,
                y: y / len,
            })
        } else {
            Some(Self { x, y })
        }
    }
}

pub struct SimPlayer {
    pub id: PlayerId,
    pub display_name: String,
    pub pos: Position,
    pub spawn: Position,

    pub health: f32,
    pub max_health: f32,
    pub mana: f32,
    pub max_mana: f32,
    pub score: u32,
    pub currency: u32,

    state: PlayerState,
    // Session time at which an action state reverts to Idle.
    state_until: f64,

    pub inventory: SkillInventory,

    // Movement-only state (not replicated)
    pub move_intent: MoveIntent,
    pub basic_ready_at: f64,
}

impl SimPlayer {
    pub fn new(
        id: PlayerId,
        display_name: String,
        spawn: Position,
        tuning: &PlayerTuning,
        slot_capacity: usize,
    ) -> Self {
        Self {
            id,
            display_name,
            pos: spawn,
            spawn,
            health: tuning.max_health,
            max_health: tuning.max_health,
            mana: tuning.max_mana,
            max_mana: tuning.max_mana,
            score: 0,
            currency: tuning.starting_currency,
            state: PlayerState::Idle,
            state_until: 0.0,
            inventory: SkillInventory::new(slot_capacity),
            move_intent: MoveIntent::default(),
            basic_ready_at: 0.0,
        }
    }

    /// Rebuilds a player from its replicated view. Action timers are not replicated, so a
    /// living player resumes in Idle.
    pub fn restore(
        snapshot: &PlayerSnapshot,
        spawn: Position,
        tuning: &PlayerTuning,
        slot_capacity: usize,
    ) -> Self {
        let mut player = Self::new(
            snapshot.id,
            snapshot.display_name.clone(),
            spawn,
            tuning,
            slot_capacity,
        );
        player.pos = Position::new(snapshot.x, snapshot.y);
        player.health = snapshot.health;
        player.max_health = snapshot.max_health;
        player.mana = snapshot.mana.min(player.max_mana);
        player.score = snapshot.score;
        player.currency = snapshot.currency;
        if snapshot.state == PlayerState::Dead {
            player.state = PlayerState::Dead;
        }
        player.inventory = SkillInventory::restore(slot_capacity, &snapshot.skills, &snapshot.slots);
        player
    }

    pub fn state(&self) -> PlayerState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state != PlayerState::Dead
    }

    pub fn ensure_alive(&self) -> Result<(), PreconditionFailure> {
        if self.is_alive() {
            Ok(())
        } else {
            Err(PreconditionFailure::ActorDead)
        }
    }

    /// Enters an action state until `until`. Dead players stay dead.
    pub fn begin_action(&mut self, state: PlayerState, until: f64, events: &mut EventBus) {
        debug_assert!(state.is_action());
        if !self.is_alive() {
            return;
        }
        self.state_until = until;
        self.set_state(state, events);
    }

    /// Reverts expired action states and regenerates mana.
    pub fn update_timers(&mut self, now: f64, dt: f32, tuning: &PlayerTuning, events: &mut EventBus) {
        if !self.is_alive() {
            return;
        }
        if self.state.is_action() && now >= self.state_until {
            self.set_state(PlayerState::Idle, events);
        }
        self.mana = (self.mana + tuning.mana_regen_per_second * dt).min(self.max_mana);
    }

    /// Applies damage, clamping health at zero. Dead targets ignore further damage.
    pub fn apply_damage(
        &mut self,
        amount: f32,
        killer: MonsterId,
        defend_factor: f32,
        events: &mut EventBus,
    ) -> DamageOutcome {
        if !self.is_alive() {
            return DamageOutcome::Ignored;
        }

        let factor = if self.state == PlayerState::Defending {
            defend_factor
        } else {
            1.0
        };
        let amount = (amount * factor).max(0.0);

        let before = self.health;
        self.health = (self.health - amount).clamp(0.0, self.max_health);
        let dealt = before - self.health;
        events.publish(PlayerEvent::HealthChanged {
            player_id: self.id,
            current: self.health,
            max: self.max_health,
        });

        if self.health > 0.0 {
            return DamageOutcome::Damaged { dealt };
        }

        self.move_intent = MoveIntent::default();
        self.set_state(PlayerState::Dead, events);
        events.publish(PlayerEvent::Died {
            player_id: self.id,
            killer_id: killer,
        });
        DamageOutcome::Killed { dealt }
    }

    /// Dead → Idle with full health at the spawn point.
    pub fn respawn(&mut self, events: &mut EventBus) -> Result<(), PreconditionFailure> {
        if self.is_alive() {
            return Err(PreconditionFailure::NotDead);
        }
        self.health = self.max_health;
        self.mana = self.max_mana;
        self.pos = self.spawn;
        self.move_intent = MoveIntent::default();
        events.publish(PlayerEvent::HealthChanged {
            player_id: self.id,
            current: self.health,
            max: self.max_health,
        });
        self.set_state(PlayerState::Idle, events);
        Ok(())
    }

    pub fn ensure_affordable(&self, cost: u32) -> Result<(), PreconditionFailure> {
        if self.currency < cost {
            return Err(PreconditionFailure::InsufficientCurrency {
                balance: self.currency,
                cost,
            });
        }
        Ok(())
    }

    pub fn spend_currency(&mut self, cost: u32, events: &mut EventBus) -> Result<(), PreconditionFailure> {
        self.ensure_affordable(cost)?;
        self.currency -= cost;
        self.publish_currency(events);
        Ok(())
    }

    pub fn credit_kill(&mut self, gold: u32, score: u32, events: &mut EventBus) {
        self.currency = self.currency.saturating_add(gold);
        self.score = self.score.saturating_add(score);
        self.publish_currency(events);
    }

    pub fn spend_mana(&mut self, cost: f32) -> Result<(), PreconditionFailure> {
        if self.mana < cost {
            return Err(PreconditionFailure::NotEnoughMana {
                have: self.mana,
                need: cost,
            });
        }
        self.mana -= cost;
        Ok(())
    }

    fn publish_currency(&self, events: &mut EventBus) {
        events.publish(PlayerEvent::CurrencyChanged {
            player_id: self.id,
            currency: self.currency,
        });
    }

    fn set_state(&mut self, state: PlayerState, events: &mut EventBus) {
        if self.state == state {
            return;
        }
        self.state = state;
        events.publish(PlayerEvent::StateChanged {
            player_id: self.id,
            state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::DomainEvent;

    fn player() -> SimPlayer {
        SimPlayer::new(
            PlayerId::new(1),
            "Pilot".to_string(),
            Position::new(10.0, 0.0),
            &PlayerTuning::default(),
            6,
        )
    }

    #[test]
    fn damage_burst_larger_than_health_clamps_at_zero() {
        let mut p = player();
        let mut events = EventBus::new();
        let outcome = p.apply_damage(10_000.0, MonsterId::new(9), 1.0, &mut events);
        assert_eq!(outcome, DamageOutcome::Killed { dealt: 100.0 });
        assert_eq!(p.health, 0.0);
        assert_eq!(p.state(), PlayerState::Dead);
    }

    #[test]
    fn dead_player_ignores_damage_and_dies_once() {
        let mut p = player();
        let mut events = EventBus::new();
        p.apply_damage(500.0, MonsterId::new(9), 1.0, &mut events);
        events.drain();

        let outcome = p.apply_damage(5.0, MonsterId::new(9), 1.0, &mut events);
        assert_eq!(outcome, DamageOutcome::Ignored);
        assert!(events.pending().is_empty());
    }

    #[test]
    fn death_publishes_player_died_with_killer() {
        let mut p = player();
        let mut events = EventBus::new();
        p.apply_damage(500.0, MonsterId::new(4), 1.0, &mut events);
        assert!(events.pending().contains(&DomainEvent::Player(PlayerEvent::Died {
            player_id: PlayerId::new(1),
            killer_id: MonsterId::new(4),
        })));
    }

    #[test]
    fn defending_scales_incoming_damage() {
        let mut p = player();
        let mut events = EventBus::new();
        p.begin_action(PlayerState::Defending, 5.0, &mut events);
        p.apply_damage(20.0, MonsterId::new(1), 0.5, &mut events);
        assert_eq!(p.health, 90.0);
    }

    #[test]
    fn action_states_revert_to_idle_after_their_duration() {
        let mut p = player();
        let tuning = PlayerTuning::default();
        let mut events = EventBus::new();
        p.begin_action(PlayerState::Attacking, 1.0, &mut events);
        p.update_timers(0.5, 0.5, &tuning, &mut events);
        assert_eq!(p.state(), PlayerState::Attacking);
        p.update_timers(1.0, 0.5, &tuning, &mut events);
        assert_eq!(p.state(), PlayerState::Idle);
    }

    #[test]
    fn respawn_requires_dead_and_restores_spawn_and_health() {
        let mut p = player();
        let mut events = EventBus::new();
        assert_eq!(p.respawn(&mut events), Err(PreconditionFailure::NotDead));

        p.pos = Position::new(99.0, 99.0);
        p.apply_damage(500.0, MonsterId::new(1), 1.0, &mut events);
        p.respawn(&mut events).expect("respawn from dead");
        assert_eq!(p.health, p.max_health);
        assert_eq!(p.pos, p.spawn);
        assert_eq!(p.state(), PlayerState::Idle);
    }

    #[test]
    fn dead_players_cannot_enter_actions() {
        let mut p = player();
        let mut events = EventBus::new();
        p.apply_damage(500.0, MonsterId::new(1), 1.0, &mut events);
        p.begin_action(PlayerState::Attacking, 10.0, &mut events);
        assert_eq!(p.state(), PlayerState::Dead);
    }

    #[test]
    fn spending_more_than_balance_changes_nothing() {
        let mut p = player();
        p.currency = 40;
        let mut events = EventBus::new();
        let err = p.spend_currency(50, &mut events).unwrap_err();
        assert_eq!(
            err,
            PreconditionFailure::InsufficientCurrency {
                balance: 40,
                cost: 50
            }
        );
        assert_eq!(p.currency, 40);
        assert!(events.pending().is_empty());
    }
}
