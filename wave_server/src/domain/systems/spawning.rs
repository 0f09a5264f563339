use crate::domain::context::SessionContext;
use crate::domain::events::MonsterEvent;
use crate::domain::ids::MonsterId;
use crate::domain::monster::{MonsterStats, SimMonster, select_target};
use crate::domain::player::SimPlayer;
use crate::domain::state::Position;
use crate::domain::tuning::{MonsterTuning, WaveTuning};
use crate::domain::wave::WaveController;
use tracing::debug;

/// Base stats scaled by the wave multiplier and each stat's coefficient.
pub fn scaled_stats(monster: &MonsterTuning, wave: &WaveTuning, multiplier: f32) -> MonsterStats {
    MonsterStats {
        health: monster.base_health * multiplier * wave.health_scale,
        speed: monster.base_speed * multiplier * wave.speed_scale,
        damage: monster.base_damage * multiplier * wave.damage_scale,
        gold: (monster.base_gold as f32 * multiplier * wave.gold_scale).round() as u32,
    }
}

/// Runs one spawn round if the wave allows it: one monster behind each living
/// player, bounded by the remaining population budget. Returns how many spawned.
pub fn tick_spawning(
    wave: &mut WaveController,
    players: &[SimPlayer],
    monsters: &mut Vec<SimMonster>,
    ctx: &mut SessionContext,
) -> u32 {
    let tuning = ctx.tuning.clone();
    if !wave.take_spawn_round(ctx.now, &tuning.wave) {
        return 0;
    }

    let stats = scaled_stats(&tuning.monster, &tuning.wave, wave.multiplier());
    let bounds = tuning.world;
    let mut spawned = 0;

    for p in players.iter().filter(|p| p.is_alive()) {
        if spawned >= wave.remaining_budget() {
            break;
        }

        let pos = Position::new(
            p.pos.x,
            (p.pos.y + tuning.monster.spawn_offset).min(bounds.max_y),
        );
        let mut monster = SimMonster::new(MonsterId::new(ctx.ids.next_raw()), pos, stats);
        monster.target = select_target(pos, players);

        ctx.events.publish(MonsterEvent::Spawned {
            monster_id: monster.id,
            target: monster.target,
        });
        monsters.push(monster);
        spawned += 1;
    }

    wave.record_spawned(spawned);
    if spawned > 0 {
        debug!(
            wave = wave.number(),
            spawned,
            total = wave.spawned(),
            cap = wave.population_cap(),
            "spawn round"
        );
    }
    spawned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::PlayerId;
    use crate::domain::tuning::GameTuning;
    use crate::domain::wave::WaveState;
    use std::sync::Arc;

    fn ctx() -> SessionContext {
        let mut ctx = SessionContext::seeded(3);
        let mut tuning = GameTuning::default();
        tuning.wave.preparing_seconds = 0.0;
        tuning.wave.base_population = 3;
        tuning.wave.spawn_interval = 1.0;
        ctx.tuning = Arc::new(tuning);
        ctx
    }

    fn spawning_wave(ctx: &mut SessionContext) -> WaveController {
        let mut wave = WaveController::start(ctx.now, &ctx.tuning.wave, &mut ctx.events);
        wave.advance(ctx.now, 0, &ctx.tuning.wave, &mut ctx.events);
        assert_eq!(wave.state(), WaveState::Spawning);
        wave
    }

    fn players(ctx: &SessionContext, count: u64) -> Vec<SimPlayer> {
        (1..=count)
            .map(|id| {
                SimPlayer::new(
                    PlayerId::new(id),
                    format!("p{id}"),
                    Position::new(id as f32 * 50.0, 0.0),
                    &ctx.tuning.player,
                    6,
                )
            })
            .collect()
    }

    #[test]
    fn stats_scale_with_multiplier() {
        let tuning = GameTuning::default();
        let stats = scaled_stats(&tuning.monster, &tuning.wave, 2.0);
        assert_eq!(stats.health, tuning.monster.base_health * 2.0);
        assert_eq!(stats.gold, tuning.monster.base_gold * 2);
    }

    #[test]
    fn spawns_one_per_living_player_behind_them() {
        let mut ctx = ctx();
        let mut wave = spawning_wave(&mut ctx);
        let players = players(&ctx, 2);
        let mut monsters = Vec::new();

        assert_eq!(tick_spawning(&mut wave, &players, &mut monsters, &mut ctx), 2);
        assert_eq!(monsters.len(), 2);
        for (m, p) in monsters.iter().zip(&players) {
            assert_eq!(m.pos.x, p.pos.x);
            assert!(m.pos.y > p.pos.y);
            assert_eq!(m.target, Some(p.id));
        }
    }

    #[test]
    fn never_exceeds_population_budget() {
        let mut ctx = ctx();
        let mut wave = spawning_wave(&mut ctx);
        let players = players(&ctx, 2);
        let mut monsters = Vec::new();

        tick_spawning(&mut wave, &players, &mut monsters, &mut ctx);
        ctx.now += 1.0;
        assert_eq!(tick_spawning(&mut wave, &players, &mut monsters, &mut ctx), 1);
        ctx.now += 1.0;
        assert_eq!(tick_spawning(&mut wave, &players, &mut monsters, &mut ctx), 0);
        assert_eq!(monsters.len(), 3);
        assert_eq!(wave.spawned(), 3);
    }

    #[test]
    fn timer_resets_even_when_nobody_is_alive() {
        let mut ctx = ctx();
        let mut wave = spawning_wave(&mut ctx);
        let mut monsters = Vec::new();

        assert_eq!(tick_spawning(&mut wave, &[], &mut monsters, &mut ctx), 0);
        // The round was consumed; a player joining mid-interval waits for the next one.
        let players = players(&ctx, 1);
        ctx.now += 0.5;
        assert_eq!(tick_spawning(&mut wave, &players, &mut monsters, &mut ctx), 0);
        ctx.now += 0.5;
        assert_eq!(tick_spawning(&mut wave, &players, &mut monsters, &mut ctx), 1);
    }
}
