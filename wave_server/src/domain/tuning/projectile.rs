use serde::Deserialize;

/// Gameplay tuning for projectiles.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct ProjectileTuning {
    /// Lifetime in seconds before the projectile is despawned regardless of range.
    pub life_time: f32,

    /// World-space collision radius.
    pub radius: f32,

    /// Fraction of the primary damage applied to secondary targets of an area hit.
    pub area_damage_factor: f32,
}

impl Default for ProjectileTuning {
    fn default() -> Self {
        Self {
            life_time: 3.0,
            radius: 6.0,
            area_damage_factor: 0.7,
        }
    }
}
