use crate::domain::player::SimPlayer;
use crate::domain::tuning::WorldBounds;

#[derive(Debug, Clone, Copy)]
pub struct MovementConfig {
    pub max_speed: f32,
    pub bounds: WorldBounds,
}

/// Integrates the latest move intent and clamps to the playable area.
pub fn tick_player(p: &mut SimPlayer, dt: f32, cfg: MovementConfig) {
    if !p.is_alive() {
        return;
    }

    p.pos.x += p.move_intent.x * cfg.max_speed * dt;
    p.pos.y += p.move_intent.y * cfg.max_speed * dt;

    p.pos.x = p.pos.x.clamp(cfg.bounds.min_x, cfg.bounds.max_x);
    p.pos.y = p.pos.y.clamp(cfg.bounds.min_y, cfg.bounds.max_y);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::PlayerId;
    use crate::domain::player::MoveIntent;
    use crate::domain::state::Position;
    use crate::domain::tuning::PlayerTuning;

    fn cfg() -> MovementConfig {
        MovementConfig {
            max_speed: 100.0,
            bounds: WorldBounds::default(),
        }
    }

    fn player() -> SimPlayer {
        SimPlayer::new(
            PlayerId::new(1),
            "Pilot".to_string(),
            Position::default(),
            &PlayerTuning::default(),
            6,
        )
    }

    #[test]
    fn moves_along_intent_at_max_speed() {
        let mut p = player();
        p.move_intent = MoveIntent { x: 1.0, y: 0.0 };
        tick_player(&mut p, 0.5, cfg());
        assert_eq!(p.pos, Position::new(50.0, 0.0));
    }

    #[test]
    fn clamps_to_world_bounds() {
        let mut p = player();
        p.move_intent = MoveIntent { x: 0.0, y: -1.0 };
        tick_player(&mut p, 100.0, cfg());
        assert_eq!(p.pos.y, WorldBounds::default().min_y);
    }
}
