use super::projectiles::{ProjectileSpec, spawn_projectile};
use crate::domain::context::SessionContext;
use crate::domain::error::PreconditionFailure;
use crate::domain::events::SkillEvent;
use crate::domain::ids::ProjectileId;
use crate::domain::monster::SimMonster;
use crate::domain::player::{PlayerState, SimPlayer};
use crate::domain::skills::{SkillEffects, SkillId, effective_skill};
use crate::domain::state::{Position, SimProjectile};
use tracing::{trace, warn};

/// What the auto-use pass did for one player this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoFire {
    Skill(SkillId),
    Basic,
}

/// Nearest living monster within `range` of `from`.
pub fn nearest_in_range(from: Position, monsters: &[SimMonster], range: f32) -> Option<&SimMonster> {
    let range_sq = range * range;
    monsters
        .iter()
        .filter(|m| m.is_alive())
        .map(|m| (m, from.distance_sq(m.pos)))
        .filter(|(_, d)| *d <= range_sq)
        .min_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.id.cmp(&b.0.id)))
        .map(|(m, _)| m)
}

/// Fires at most one active-slot skill, falling back to the basic attack.
pub fn tick_auto_use(
    player: &mut SimPlayer,
    monsters: &[SimMonster],
    projectiles: &mut Vec<SimProjectile>,
    ctx: &mut SessionContext,
) -> Option<AutoFire> {
    if !player.is_alive() || player.state() == PlayerState::Defending {
        return None;
    }

    if let Some(skill) = fire_first_ready_slot(player, monsters, projectiles, ctx) {
        return Some(AutoFire::Skill(skill));
    }

    fire_basic_attack(player, monsters, projectiles, ctx)
        .ok()
        .map(|_| AutoFire::Basic)
}

fn fire_first_ready_slot(
    player: &mut SimPlayer,
    monsters: &[SimMonster],
    projectiles: &mut Vec<SimProjectile>,
    ctx: &mut SessionContext,
) -> Option<SkillId> {
    let now = ctx.now;
    let tuning = ctx.tuning.clone();

    for index in 0..player.inventory.slots().len() {
        let slot = player.inventory.slots()[index];
        let Some(skill) = slot.skill else {
            continue;
        };

        let stack = player.inventory.stack(skill);
        if stack == 0 {
            // Slot outlived its skill record; drop the stale entry.
            player.inventory.evict(skill);
            continue;
        }
        if !slot.is_ready(now) {
            continue;
        }

        let Some(def) = ctx.catalog.get(skill) else {
            warn!(player_id = %player.id, skill_id = %skill, "slotted skill missing from catalog");
            continue;
        };
        let eff = effective_skill(def, stack, &tuning.skill);

        let Some(target) = nearest_in_range(player.pos, monsters, eff.range) else {
            continue;
        };
        let target_pos = target.pos;

        spawn_projectile(
            projectiles,
            ctx,
            player.id,
            player.pos,
            target_pos,
            ProjectileSpec {
                damage: eff.damage,
                speed: eff.speed,
                range: eff.range,
                attribute: Some(eff.attribute),
                effects: eff.effects,
            },
        );

        if let Some(slot) = player.inventory.slot_mut(index) {
            slot.ready_at = now + f64::from(eff.cooldown);
        }
        player.begin_action(
            PlayerState::UsingSkill,
            now + f64::from(tuning.player.action_seconds),
            &mut ctx.events,
        );
        ctx.events.publish(SkillEvent::Used {
            player_id: player.id,
            skill_id: skill,
        });
        trace!(player_id = %player.id, skill_id = %skill, stack, "skill fired");
        return Some(skill);
    }

    None
}

/// The implicit basic attack: one plain projectile at the nearest monster in range.
pub fn fire_basic_attack(
    player: &mut SimPlayer,
    monsters: &[SimMonster],
    projectiles: &mut Vec<SimProjectile>,
    ctx: &mut SessionContext,
) -> Result<ProjectileId, PreconditionFailure> {
    player.ensure_alive()?;

    let now = ctx.now;
    let tuning = ctx.tuning.player;
    if now < player.basic_ready_at {
        return Err(PreconditionFailure::OnCooldown);
    }

    let target = nearest_in_range(player.pos, monsters, tuning.basic_attack_range)
        .ok_or(PreconditionFailure::NoTarget)?;
    let target_pos = target.pos;

    let id = spawn_projectile(
        projectiles,
        ctx,
        player.id,
        player.pos,
        target_pos,
        ProjectileSpec {
            damage: tuning.basic_attack_damage,
            speed: tuning.basic_attack_speed,
            range: tuning.basic_attack_range,
            attribute: None,
            effects: SkillEffects::default(),
        },
    );
    player.basic_ready_at = now + f64::from(tuning.basic_attack_cooldown);
    player.begin_action(
        PlayerState::Attacking,
        now + f64::from(tuning.action_seconds),
        &mut ctx.events,
    );
    Ok(id)
}
