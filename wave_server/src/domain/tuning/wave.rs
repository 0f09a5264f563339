use serde::Deserialize;

/// Wave pacing and difficulty scaling.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WaveTuning {
    /// Linear difficulty growth per wave after the first.
    pub difficulty_per_wave: f32,

    // Per-stat coefficients applied on top of the difficulty multiplier.
    pub health_scale: f32,
    pub speed_scale: f32,
    pub damage_scale: f32,
    pub gold_scale: f32,

    /// Monsters spawned in wave 1.
    pub base_population: u32,
    /// Additional monsters per wave after the first.
    pub population_per_wave: u32,

    /// Seconds between spawn rounds while Spawning.
    pub spawn_interval: f32,

    pub preparing_seconds: f32,
    pub completed_seconds: f32,
}

impl Default for WaveTuning {
    fn default() -> Self {
        Self {
            difficulty_per_wave: 0.2,
            health_scale: 1.0,
            speed_scale: 1.0,
            damage_scale: 1.0,
            gold_scale: 1.0,
            base_population: 6,
            population_per_wave: 2,
            spawn_interval: 2.0,
            preparing_seconds: 5.0,
            completed_seconds: 3.0,
        }
    }
}
