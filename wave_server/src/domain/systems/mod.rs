// Per-tick simulation systems. Each runs on the authority only and reads the
// session clock from `SessionContext::now`.

pub mod auto_use;
pub mod monsters;
pub mod movement;
pub mod projectiles;
pub mod spawning;
