use crate::domain::skills::Attribute;
use serde::Deserialize;

/// Weight of one lowest-grade skill in the draw table.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct DrawWeight {
    pub attribute: Attribute,
    pub weight: u32,
}

/// Progression rules: draw economy, stacking coefficients and unlock thresholds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SkillTuning {
    pub draw_cost: u32,

    /// Weighted table used by draws (lowest grade only).
    pub draw_weights: Vec<DrawWeight>,

    pub max_stack: u8,
    /// Stacks consumed by one synthesis.
    pub synthesis_threshold: u8,
    pub active_slots: usize,

    // Per-stack scaling, applied for every stack beyond the first.
    pub damage_per_stack: f32,
    pub speed_per_stack: f32,
    pub speed_cap: f32,
    pub range_per_stack: f32,
    pub range_cap: f32,
    pub cooldown_reduction_per_stack: f32,
    pub max_cooldown_reduction: f32,

    pub piercing_unlock_stack: u8,
    pub area_unlock_stack: u8,
    /// Radius granted by the area unlock when the skill has none.
    pub area_unlock_radius: f32,
    /// Multiplier applied by the area unlock when the skill already has a radius.
    pub area_enhance_factor: f32,
}

impl Default for SkillTuning {
    fn default() -> Self {
        Self {
            draw_cost: 50,
            draw_weights: vec![
                DrawWeight {
                    attribute: Attribute::Fire,
                    weight: 70,
                },
                DrawWeight {
                    attribute: Attribute::Frost,
                    weight: 25,
                },
                DrawWeight {
                    attribute: Attribute::Storm,
                    weight: 5,
                },
            ],
            max_stack: 10,
            synthesis_threshold: 3,
            active_slots: 6,
            damage_per_stack: 0.1,
            speed_per_stack: 0.05,
            speed_cap: 2.0,
            range_per_stack: 0.05,
            range_cap: 1.5,
            cooldown_reduction_per_stack: 0.05,
            max_cooldown_reduction: 0.5,
            piercing_unlock_stack: 5,
            area_unlock_stack: 10,
            area_unlock_radius: 60.0,
            area_enhance_factor: 1.5,
        }
    }
}
