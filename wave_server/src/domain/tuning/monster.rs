use serde::Deserialize;

/// Base stats for hostile entities before wave scaling is applied.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MonsterTuning {
    pub base_health: f32,
    /// Units per second.
    pub base_speed: f32,
    pub base_damage: f32,
    pub base_gold: u32,

    /// Center-to-center distance at which a monster switches to Attacking.
    pub attack_range: f32,
    /// Seconds between two hits on the current target.
    pub attack_interval: f32,

    pub radius: f32,

    /// Seconds a dead monster stays visible before removal.
    pub death_display_seconds: f32,

    /// Distance behind the targeted player where a monster appears.
    pub spawn_offset: f32,
}

impl Default for MonsterTuning {
    fn default() -> Self {
        Self {
            base_health: 30.0,
            base_speed: 60.0,
            base_damage: 8.0,
            base_gold: 10,
            attack_range: 40.0,
            attack_interval: 1.0,
            radius: 16.0,
            death_display_seconds: 1.5,
            spawn_offset: 260.0,
        }
    }
}
