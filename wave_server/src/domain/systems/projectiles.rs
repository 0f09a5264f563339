use crate::domain::context::SessionContext;
use crate::domain::events::{EventBus, MonsterEvent};
use crate::domain::ids::{MonsterId, PlayerId, ProjectileId};
use crate::domain::monster::SimMonster;
use crate::domain::player::SimPlayer;
use crate::domain::skills::{Attribute, SkillEffects};
use crate::domain::state::{DamageOutcome, Position, SimProjectile};
use std::collections::HashSet;
use tracing::info;

/// What a projectile carries from the skill (or basic attack) that fired it.
#[derive(Debug, Clone, Copy)]
pub struct ProjectileSpec {
    pub damage: f32,
    pub speed: f32,
    pub range: f32,
    pub attribute: Option<Attribute>,
    pub effects: SkillEffects,
}

pub fn spawn_projectile(
    projectiles: &mut Vec<SimProjectile>,
    ctx: &mut SessionContext,
    owner_id: PlayerId,
    from: Position,
    towards: Position,
    spec: ProjectileSpec,
) -> ProjectileId {
    // Straight down when the target sits exactly on the shooter.
    let (dir_x, dir_y) = from.direction_to(towards).unwrap_or((0.0, -1.0));
    let id = ProjectileId::new(ctx.ids.next_raw());
    projectiles.push(SimProjectile {
        id,
        owner_id,
        pos: from,
        dir_x,
        dir_y,
        speed: spec.speed,
        damage: spec.damage,
        range: spec.range,
        traveled: 0.0,
        attribute: spec.attribute,
        effects: spec.effects,
        hit_set: HashSet::new(),
        expires_at: ctx.now + f64::from(ctx.tuning.projectile.life_time),
        spent: false,
    });
    id
}

pub fn tick_projectiles(
    projectiles: &mut Vec<SimProjectile>,
    monsters: &mut [SimMonster],
    players: &mut [SimPlayer],
    ctx: &mut SessionContext,
    dt: f32,
) {
    let tuning = ctx.tuning.clone();
    let hit_radius = tuning.projectile.radius + tuning.monster.radius;
    let hit_radius_sq = hit_radius * hit_radius;

    for p in projectiles.iter_mut() {
        let step = p.speed * dt;
        p.pos.x += p.dir_x * step;
        p.pos.y += p.dir_y * step;
        p.traveled += step;

        // Overlapping living monsters not yet hit, nearest first.
        let mut overlaps: Vec<(usize, f32)> = monsters
            .iter()
            .enumerate()
            .filter(|(_, m)| m.is_alive() && !p.hit_set.contains(&m.id))
            .map(|(i, m)| (i, p.pos.distance_sq(m.pos)))
            .filter(|(_, d)| *d <= hit_radius_sq)
            .collect();
        overlaps.sort_by(|a, b| {
            a.1.total_cmp(&b.1)
                .then_with(|| monsters[a.0].id.cmp(&monsters[b.0].id))
        });

        for (index, _) in overlaps {
            // An earlier splash in this tick may already have covered it.
            if p.hit_set.contains(&monsters[index].id) {
                continue;
            }

            p.hit_set.insert(monsters[index].id);
            strike(p, index, p.damage, monsters, players, ctx.now, &tuning, &mut ctx.events);

            if let Some(radius) = p.effects.area_radius {
                splash(p, index, radius, monsters, players, ctx.now, &tuning, &mut ctx.events);
            }

            if !p.effects.piercing {
                p.spent = true;
                break;
            }
        }

        if p.traveled >= p.range || ctx.now >= p.expires_at {
            p.spent = true;
        }
    }

    projectiles.retain(|p| !p.spent);
}

/// Reduced damage to every other living monster around the primary hit, each at most once.
#[allow(clippy::too_many_arguments)]
fn splash(
    p: &mut SimProjectile,
    primary: usize,
    radius: f32,
    monsters: &mut [SimMonster],
    players: &mut [SimPlayer],
    now: f64,
    tuning: &crate::domain::tuning::GameTuning,
    events: &mut EventBus,
) {
    let center = monsters[primary].pos;
    let radius_sq = radius * radius;
    let amount = p.damage * tuning.projectile.area_damage_factor;

    let targets: Vec<usize> = monsters
        .iter()
        .enumerate()
        .filter(|(i, m)| {
            *i != primary
                && m.is_alive()
                && !p.hit_set.contains(&m.id)
                && center.distance_sq(m.pos) <= radius_sq
        })
        .map(|(i, _)| i)
        .collect();

    for index in targets {
        p.hit_set.insert(monsters[index].id);
        strike(p, index, amount, monsters, players, now, tuning, events);
    }
}

#[allow(clippy::too_many_arguments)]
fn strike(
    p: &SimProjectile,
    index: usize,
    amount: f32,
    monsters: &mut [SimMonster],
    players: &mut [SimPlayer],
    now: f64,
    tuning: &crate::domain::tuning::GameTuning,
    events: &mut EventBus,
) {
    let m = &mut monsters[index];
    let outcome = m.apply_damage(amount, now, tuning.monster.death_display_seconds, events);
    if let DamageOutcome::Killed { .. } = outcome {
        reward_kill(m.id, m.gold, p.owner_id, p.id, players, tuning.player.score_per_kill, events);
    }
}

fn reward_kill(
    monster_id: MonsterId,
    gold: u32,
    owner_id: PlayerId,
    projectile_id: ProjectileId,
    players: &mut [SimPlayer],
    score: u32,
    events: &mut EventBus,
) {
    // The owner may have left since firing; the kill still counts.
    if let Some(owner) = players.iter_mut().find(|pl| pl.id == owner_id) {
        owner.credit_kill(gold, score, events);
    }
    events.publish(MonsterEvent::Killed {
        monster_id,
        killer_id: owner_id,
        gold_reward: gold,
    });
    info!(
        %monster_id,
        killer_id = %owner_id,
        %projectile_id,
        gold,
        "monster killed"
    );
}
