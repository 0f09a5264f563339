// Stack-derived stats. Computed at use time from the current stack and never stored,
// so authority and observers derive the same numbers from the same replicated stack.

use super::catalog::{Attribute, SkillDefinition, SkillEffects, SkillId};
use crate::domain::tuning::SkillTuning;

/// Stats a skill fires with at a given stack count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectiveSkill {
    pub id: SkillId,
    pub attribute: Attribute,
    pub damage: f32,
    pub cooldown: f32,
    pub range: f32,
    pub speed: f32,
    pub effects: SkillEffects,
}

pub fn effective_skill(def: &SkillDefinition, stack: u8, tuning: &SkillTuning) -> EffectiveSkill {
    let stack = stack.max(1);
    let extra = f32::from(stack - 1);

    let damage_mult = 1.0 + extra * tuning.damage_per_stack;
    let speed_mult = (1.0 + extra * tuning.speed_per_stack).min(tuning.speed_cap);
    let range_mult = (1.0 + extra * tuning.range_per_stack).min(tuning.range_cap);
    let cooldown_cut = (extra * tuning.cooldown_reduction_per_stack).min(tuning.max_cooldown_reduction);

    let mut effects = def.effects;
    if stack >= tuning.piercing_unlock_stack {
        effects.piercing = true;
    }
    if stack >= tuning.area_unlock_stack {
        effects.area_radius = Some(match effects.area_radius {
            Some(radius) => radius * tuning.area_enhance_factor,
            None => tuning.area_unlock_radius,
        });
    }

    EffectiveSkill {
        id: def.id,
        attribute: def.attribute,
        damage: def.damage * damage_mult,
        cooldown: def.cooldown * (1.0 - cooldown_cut),
        range: def.range * range_mult,
        speed: def.speed * speed_mult,
        effects,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::skills::catalog::{Grade, SkillCatalog};

    fn ember() -> SkillDefinition {
        SkillCatalog::standard()
            .get(SkillId::from_parts(Attribute::Fire, Grade::Common))
            .cloned()
            .expect("ember bolt in catalog")
    }

    #[test]
    fn single_stack_uses_template_stats() {
        let def = ember();
        let eff = effective_skill(&def, 1, &SkillTuning::default());
        assert_eq!(eff.damage, def.damage);
        assert_eq!(eff.cooldown, def.cooldown);
        assert_eq!(eff.range, def.range);
        assert_eq!(eff.speed, def.speed);
        assert_eq!(eff.effects, def.effects);
    }

    #[test]
    fn damage_scales_linearly_with_stack() {
        let def = ember();
        let tuning = SkillTuning::default();
        let eff = effective_skill(&def, 4, &tuning);
        let expected = def.damage * (1.0 + 3.0 * tuning.damage_per_stack);
        assert!((eff.damage - expected).abs() < 1e-4);
    }

    #[test]
    fn speed_range_and_cooldown_respect_caps() {
        let def = ember();
        let tuning = SkillTuning {
            speed_per_stack: 1.0,
            range_per_stack: 1.0,
            cooldown_reduction_per_stack: 1.0,
            ..SkillTuning::default()
        };
        let eff = effective_skill(&def, 10, &tuning);
        assert!((eff.speed - def.speed * 2.0).abs() < 1e-4);
        assert!((eff.range - def.range * 1.5).abs() < 1e-4);
        assert!((eff.cooldown - def.cooldown * 0.5).abs() < 1e-4);
    }

    #[test]
    fn piercing_unlock_is_threshold_pure() {
        let def = ember();
        let tuning = SkillTuning::default();
        assert!(!effective_skill(&def, 4, &tuning).effects.piercing);
        assert!(effective_skill(&def, 5, &tuning).effects.piercing);
        // Dropping back below the threshold removes it on the next use.
        assert!(!effective_skill(&def, 4, &tuning).effects.piercing);
    }

    #[test]
    fn area_unlock_grants_radius_or_enhances_existing_one() {
        let tuning = SkillTuning::default();
        let plain = ember();
        assert_eq!(effective_skill(&plain, 9, &tuning).effects.area_radius, None);
        assert_eq!(
            effective_skill(&plain, 10, &tuning).effects.area_radius,
            Some(tuning.area_unlock_radius)
        );

        let inferno = SkillCatalog::standard()
            .get(SkillId::from_parts(Attribute::Fire, Grade::Epic))
            .cloned()
            .expect("inferno in catalog");
        let base = inferno.effects.area_radius.expect("inferno has splash");
        let eff = effective_skill(&inferno, 10, &tuning);
        assert_eq!(eff.effects.area_radius, Some(base * 1.5));
    }
}
