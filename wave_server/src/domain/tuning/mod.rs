// Gameplay tuning tables. All values are static for the lifetime of a session.

pub mod monster;
pub mod player;
pub mod projectile;
pub mod skill;
pub mod wave;

pub use monster::MonsterTuning;
pub use player::PlayerTuning;
pub use projectile::ProjectileTuning;
pub use skill::{DrawWeight, SkillTuning};
pub use wave::WaveTuning;

use serde::Deserialize;
use thiserror::Error;

/// Playable area. Players are clamped inside; monsters leaving through `min_y` pass through.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorldBounds {
    pub min_x: f32,
    pub max_x: f32,
    pub min_y: f32,
    pub max_y: f32,
}

impl Default for WorldBounds {
    fn default() -> Self {
        Self {
            min_x: -400.0,
            max_x: 400.0,
            min_y: -400.0,
            max_y: 400.0,
        }
    }
}

/// Every tuning table a session needs, loadable from TOML with per-key defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct GameTuning {
    pub world: WorldBounds,
    pub player: PlayerTuning,
    pub projectile: ProjectileTuning,
    pub monster: MonsterTuning,
    pub wave: WaveTuning,
    pub skill: SkillTuning,
    pub replication: ReplicationTuning,
}

/// A tuning table that would break the rules it parameterizes.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid tuning: {field} {rule}")]
pub struct InvalidTuning {
    pub field: &'static str,
    pub rule: &'static str,
}

fn require(ok: bool, field: &'static str, rule: &'static str) -> Result<(), InvalidTuning> {
    if ok {
        Ok(())
    } else {
        Err(InvalidTuning { field, rule })
    }
}

impl GameTuning {
    /// Rejects tables that make progression free, disable auto-use or stall the tick.
    pub fn validate(&self) -> Result<(), InvalidTuning> {
        let skill = &self.skill;
        require(skill.max_stack >= 1, "skill.max_stack", "must be at least 1")?;
        require(
            skill.synthesis_threshold >= 1,
            "skill.synthesis_threshold",
            "must be at least 1",
        )?;
        require(
            skill.synthesis_threshold <= skill.max_stack,
            "skill.synthesis_threshold",
            "must not exceed skill.max_stack",
        )?;
        require(skill.active_slots >= 1, "skill.active_slots", "must be at least 1")?;
        require(
            skill.draw_weights.iter().any(|w| w.weight > 0),
            "skill.draw_weights",
            "needs at least one positive weight",
        )?;

        require(
            self.world.min_x < self.world.max_x && self.world.min_y < self.world.max_y,
            "world",
            "min bounds must be below max bounds",
        )?;
        require(
            self.player.max_health > 0.0,
            "player.max_health",
            "must be positive",
        )?;
        require(
            self.monster.base_health > 0.0,
            "monster.base_health",
            "must be positive",
        )?;
        require(
            self.wave.spawn_interval > 0.0,
            "wave.spawn_interval",
            "must be positive",
        )?;
        require(
            self.wave.base_population >= 1,
            "wave.base_population",
            "must be at least 1",
        )?;
        require(
            self.replication.interval_ticks >= 1,
            "replication.interval_ticks",
            "must be at least 1",
        )
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ReplicationTuning {
    /// Ticks between two replication pushes.
    pub interval_ticks: u64,
}

impl Default for ReplicationTuning {
    fn default() -> Self {
        Self { interval_ticks: 3 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert_eq!(GameTuning::default().validate(), Ok(()));
    }

    #[test]
    fn free_synthesis_and_missing_slots_are_rejected() {
        let mut tuning = GameTuning::default();
        tuning.skill.synthesis_threshold = 0;
        assert_eq!(
            tuning.validate().map_err(|e| e.field),
            Err("skill.synthesis_threshold")
        );

        let mut tuning = GameTuning::default();
        tuning.skill.active_slots = 0;
        assert_eq!(tuning.validate().map_err(|e| e.field), Err("skill.active_slots"));

        let mut tuning = GameTuning::default();
        for w in &mut tuning.skill.draw_weights {
            w.weight = 0;
        }
        assert_eq!(tuning.validate().map_err(|e| e.field), Err("skill.draw_weights"));
    }
}
