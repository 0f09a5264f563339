use serde::Deserialize;

/// Gameplay tuning for player-controlled defenders.
///
/// Keep this separate from runtime/server configuration (tick rates, buffer sizes, etc.).
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct PlayerTuning {
    /// Maximum movement speed in world units per second.
    pub max_speed: f32,

    /// World-space collision radius (monster reach is measured to the center).
    pub radius: f32,

    pub max_health: f32,
    pub max_mana: f32,
    pub mana_regen_per_second: f32,

    /// Currency granted on join.
    pub starting_currency: u32,

    /// Seconds an Attacking/UsingSkill action holds before reverting to Idle.
    pub action_seconds: f32,

    /// Seconds a Defend command holds before reverting to Idle.
    pub defend_seconds: f32,
    pub defend_mana_cost: f32,
    /// Incoming damage multiplier while Defending.
    pub defend_damage_factor: f32,

    // Implicit basic attack, fired when no skill is eligible.
    pub basic_attack_damage: f32,
    pub basic_attack_cooldown: f32,
    pub basic_attack_range: f32,
    pub basic_attack_speed: f32,

    /// Horizontal distance between consecutive spawn points.
    pub spawn_spacing: f32,

    pub score_per_kill: u32,
}

impl Default for PlayerTuning {
    fn default() -> Self {
        Self {
            max_speed: 150.0,
            radius: 24.0,
            max_health: 100.0,
            max_mana: 50.0,
            mana_regen_per_second: 2.0,
            starting_currency: 100,
            action_seconds: 0.4,
            defend_seconds: 1.5,
            defend_mana_cost: 10.0,
            defend_damage_factor: 0.5,
            basic_attack_damage: 6.0,
            basic_attack_cooldown: 0.8,
            basic_attack_range: 220.0,
            basic_attack_speed: 400.0,
            spawn_spacing: 80.0,
            score_per_kill: 10,
        }
    }
}
