use crate::domain::tuning::GameTuning;
use std::{env, io, path::PathBuf, time::Duration};

// Runtime/server constants (not gameplay tuning).

pub fn http_port() -> u16 {
    env::var("GAME_SERVER_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3001)
}

/// Optional TOML file overriding gameplay tuning.
pub fn tuning_path() -> Option<PathBuf> {
    env::var("GAME_TUNING_PATH")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Loads tuning from `GAME_TUNING_PATH`, or the built-in defaults when unset.
pub fn load_tuning() -> io::Result<GameTuning> {
    match tuning_path() {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)?;
            let tuning = parse_tuning(&raw)?;
            tracing::info!(path = %path.display(), "loaded game tuning");
            Ok(tuning)
        }
        None => Ok(GameTuning::default()),
    }
}

/// Missing keys fall back to their defaults. Tables that fail validation are invalid data.
pub fn parse_tuning(raw: &str) -> io::Result<GameTuning> {
    let tuning: GameTuning =
        toml::from_str(raw).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    tuning
        .validate()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok(tuning)
}

pub const INPUT_CHANNEL_CAPACITY: usize = 1024;
pub const WORLD_BROADCAST_CAPACITY: usize = 128;

pub const TICK_INTERVAL: Duration = Duration::from_millis(1000 / 60);
// Default time limit for non-test lobbies (0 disables match end).
pub const DEFAULT_MATCH_TIME_LIMIT: Duration = Duration::from_secs(600);
pub const MATCH_START_COUNTDOWN: Duration = Duration::from_secs(3);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_tuning_files_keep_defaults() {
        let tuning = parse_tuning(
            r#"
            [wave]
            difficulty_per_wave = 0.5

            [skill]
            draw_cost = 80
            "#,
        )
        .unwrap();
        let defaults = GameTuning::default();
        assert_eq!(tuning.wave.difficulty_per_wave, 0.5);
        assert_eq!(tuning.skill.draw_cost, 80);
        assert_eq!(tuning.skill.max_stack, defaults.skill.max_stack);
        assert_eq!(tuning.player.max_health, defaults.player.max_health);
    }

    #[test]
    fn out_of_range_tuning_is_invalid_data() {
        let err = parse_tuning("[skill]\nsynthesis_threshold = 0\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
        assert!(err.to_string().contains("skill.synthesis_threshold"));

        let err = parse_tuning("[skill]\nactive_slots = 0\n").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn malformed_tuning_is_invalid_data() {
        let err = parse_tuning("[wave\nbroken").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
