use crate::domain::context::SessionContext;
use crate::domain::events::MonsterEvent;
use crate::domain::monster::{MonsterState, SimMonster, select_target};
use crate::domain::player::SimPlayer;
use crate::domain::state::DamageOutcome;
use tracing::{debug, info};

/// Retargets, moves and attacks for every living monster.
pub fn tick_monsters(
    monsters: &mut [SimMonster],
    players: &mut [SimPlayer],
    ctx: &mut SessionContext,
    dt: f32,
) {
    let tuning = ctx.tuning.clone();
    let now = ctx.now;

    for m in monsters.iter_mut().filter(|m| m.is_alive()) {
        let target_alive = m
            .target
            .and_then(|id| players.iter().find(|p| p.id == id))
            .is_some_and(|p| p.is_alive());
        if !target_alive {
            m.target = select_target(m.pos, players);
        }

        let Some(target) = m
            .target
            .and_then(|id| players.iter_mut().find(|p| p.id == id))
        else {
            // Nobody to chase: march towards the lower edge.
            m.set_state(MonsterState::Moving, &mut ctx.events);
            m.pos.y -= m.speed * dt;
            continue;
        };

        let distance = m.pos.distance(target.pos);
        if distance > tuning.monster.attack_range {
            m.set_state(MonsterState::Moving, &mut ctx.events);
            if let Some((dx, dy)) = m.pos.direction_to(target.pos) {
                let step = (m.speed * dt).min(distance);
                m.pos.x += dx * step;
                m.pos.y += dy * step;
            }
            continue;
        }

        m.set_state(MonsterState::Attacking, &mut ctx.events);
        if now < m.next_attack_at {
            continue;
        }
        m.next_attack_at = now + f64::from(tuning.monster.attack_interval);

        let outcome = target.apply_damage(
            m.damage,
            m.id,
            tuning.player.defend_damage_factor,
            &mut ctx.events,
        );
        if let DamageOutcome::Killed { .. } = outcome {
            info!(player_id = %target.id, monster_id = %m.id, "player died");
            m.target = None;
        }
    }
}

/// Removes monsters whose death display elapsed and living ones that crossed
/// the lower world edge. Returns how many passed through.
pub fn sweep_monsters(monsters: &mut Vec<SimMonster>, ctx: &mut SessionContext) -> usize {
    let now = ctx.now;
    let min_y = ctx.tuning.world.min_y;
    let mut passed = 0;

    monsters.retain(|m| {
        let passed_through = m.is_alive() && m.pos.y < min_y;
        let expired = m.despawn_at.is_some_and(|at| now >= at);
        if !passed_through && !expired {
            return true;
        }

        if passed_through {
            passed += 1;
            debug!(monster_id = %m.id, "monster passed through");
        }
        ctx.events.publish(MonsterEvent::Removed {
            monster_id: m.id,
            passed_through,
        });
        false
    });
    passed
}
