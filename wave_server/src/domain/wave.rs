// Wave controller: population pacing and difficulty for the session.

use super::events::{EventBus, WaveEvent};
use super::tuning::WaveTuning;
use serde::{Deserialize, Serialize};

/// Wave lifecycle. Transitions only move forward; Completed rolls into the next wave's Preparing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveState {
    Preparing,
    Spawning,
    Fighting,
    Completed,
}

/// Linear difficulty: wave 1 is 1.0 and every later wave adds `difficulty_per_wave`.
pub fn difficulty_multiplier(wave: u32, tuning: &WaveTuning) -> f32 {
    1.0 + wave.saturating_sub(1) as f32 * tuning.difficulty_per_wave
}

pub fn population_cap(wave: u32, tuning: &WaveTuning) -> u32 {
    tuning
        .base_population
        .saturating_add(wave.saturating_sub(1).saturating_mul(tuning.population_per_wave))
}

#[derive(Debug, Clone)]
pub struct WaveController {
    number: u32,
    state: WaveState,
    // Session time at which a timed state (Preparing, Completed) ends.
    state_until: f64,
    multiplier: f32,
    population_cap: u32,
    spawned: u32,
    next_spawn_at: f64,
}

impl WaveController {
    /// Opens wave 1 in Preparing and announces it.
    pub fn start(now: f64, tuning: &WaveTuning, events: &mut EventBus) -> Self {
        let controller = Self {
            number: 1,
            state: WaveState::Preparing,
            state_until: now + f64::from(tuning.preparing_seconds),
            multiplier: difficulty_multiplier(1, tuning),
            population_cap: population_cap(1, tuning),
            spawned: 0,
            next_spawn_at: now,
        };
        events.publish(WaveEvent::Changed { number: 1 });
        events.publish(WaveEvent::StateChanged {
            number: 1,
            state: WaveState::Preparing,
        });
        controller
    }

    /// Continues a replicated wave. Timed states restart their full duration from `now`.
    pub fn resume(number: u32, state: WaveState, spawned: u32, now: f64, tuning: &WaveTuning) -> Self {
        let number = number.max(1);
        let timer = match state {
            WaveState::Preparing => tuning.preparing_seconds,
            WaveState::Completed => tuning.completed_seconds,
            WaveState::Spawning | WaveState::Fighting => 0.0,
        };
        let population_cap = population_cap(number, tuning);
        Self {
            number,
            state,
            state_until: now + f64::from(timer),
            multiplier: difficulty_multiplier(number, tuning),
            population_cap,
            spawned: spawned.min(population_cap),
            next_spawn_at: now,
        }
    }

    pub fn number(&self) -> u32 {
        self.number
    }

    pub fn state(&self) -> WaveState {
        self.state
    }

    pub fn multiplier(&self) -> f32 {
        self.multiplier
    }

    pub fn population_cap(&self) -> u32 {
        self.population_cap
    }

    pub fn spawned(&self) -> u32 {
        self.spawned
    }

    /// Monsters this wave may still produce.
    pub fn remaining_budget(&self) -> u32 {
        self.population_cap.saturating_sub(self.spawned)
    }

    pub fn record_spawned(&mut self, count: u32) {
        self.spawned = self.spawned.saturating_add(count).min(self.population_cap);
    }

    /// True once per elapsed spawn interval while Spawning. Resets the timer whether or not
    /// the caller ends up spawning anything.
    pub fn take_spawn_round(&mut self, now: f64, tuning: &WaveTuning) -> bool {
        if self.state != WaveState::Spawning || now < self.next_spawn_at {
            return false;
        }
        self.next_spawn_at = now + f64::from(tuning.spawn_interval);
        true
    }

    /// Performs at most one forward transition. `living_monsters` counts spawned monsters not yet dead.
    pub fn advance(
        &mut self,
        now: f64,
        living_monsters: usize,
        tuning: &WaveTuning,
        events: &mut EventBus,
    ) {
        match self.state {
            WaveState::Preparing if now >= self.state_until => {
                self.next_spawn_at = now;
                self.transition(WaveState::Spawning, events);
            }
            WaveState::Spawning if self.spawned >= self.population_cap => {
                self.transition(WaveState::Fighting, events);
            }
            WaveState::Fighting if living_monsters == 0 => {
                self.state_until = now + f64::from(tuning.completed_seconds);
                self.transition(WaveState::Completed, events);
            }
            WaveState::Completed if now >= self.state_until => {
                self.number += 1;
                self.multiplier = difficulty_multiplier(self.number, tuning);
                self.population_cap = population_cap(self.number, tuning);
                self.spawned = 0;
                self.state_until = now + f64::from(tuning.preparing_seconds);
                events.publish(WaveEvent::Changed {
                    number: self.number,
                });
                self.transition(WaveState::Preparing, events);
            }
            _ => {}
        }
    }

    fn transition(&mut self, state: WaveState, events: &mut EventBus) {
        self.state = state;
        events.publish(WaveEvent::StateChanged {
            number: self.number,
            state,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tuning() -> WaveTuning {
        WaveTuning {
            preparing_seconds: 1.0,
            completed_seconds: 1.0,
            spawn_interval: 0.5,
            base_population: 2,
            population_per_wave: 1,
            ..WaveTuning::default()
        }
    }

    #[test]
    fn multiplier_is_linear_in_wave_number() {
        let t = WaveTuning::default();
        assert_eq!(difficulty_multiplier(1, &t), 1.0);
        assert!((difficulty_multiplier(6, &t) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn population_grows_per_wave() {
        let t = tuning();
        assert_eq!(population_cap(1, &t), 2);
        assert_eq!(population_cap(4, &t), 5);
    }

    #[test]
    fn full_cycle_moves_strictly_forward() {
        let t = tuning();
        let mut events = EventBus::new();
        let mut wave = WaveController::start(0.0, &t, &mut events);

        wave.advance(0.5, 0, &t, &mut events);
        assert_eq!(wave.state(), WaveState::Preparing);

        wave.advance(1.0, 0, &t, &mut events);
        assert_eq!(wave.state(), WaveState::Spawning);

        // Spawning holds until the cap is reached, even with nothing alive.
        wave.advance(1.1, 0, &t, &mut events);
        assert_eq!(wave.state(), WaveState::Spawning);
        wave.record_spawned(2);
        wave.advance(1.2, 2, &t, &mut events);
        assert_eq!(wave.state(), WaveState::Fighting);

        wave.advance(1.3, 1, &t, &mut events);
        assert_eq!(wave.state(), WaveState::Fighting);
        wave.advance(1.4, 0, &t, &mut events);
        assert_eq!(wave.state(), WaveState::Completed);

        wave.advance(2.4, 0, &t, &mut events);
        assert_eq!(wave.state(), WaveState::Preparing);
        assert_eq!(wave.number(), 2);
        assert_eq!(wave.spawned(), 0);
        assert_eq!(wave.population_cap(), 3);
        assert!((wave.multiplier() - 1.2).abs() < 1e-6);
    }

    #[test]
    fn spawn_rounds_only_fire_while_spawning_and_reset_the_timer() {
        let t = tuning();
        let mut events = EventBus::new();
        let mut wave = WaveController::start(0.0, &t, &mut events);
        assert!(!wave.take_spawn_round(0.0, &t));

        wave.advance(1.0, 0, &t, &mut events);
        assert!(wave.take_spawn_round(1.0, &t));
        assert!(!wave.take_spawn_round(1.2, &t));
        assert!(wave.take_spawn_round(1.5, &t));
    }

    #[test]
    fn record_spawned_never_exceeds_cap() {
        let t = tuning();
        let mut events = EventBus::new();
        let mut wave = WaveController::start(0.0, &t, &mut events);
        wave.record_spawned(10);
        assert_eq!(wave.spawned(), 2);
        assert_eq!(wave.remaining_budget(), 0);
    }
}
