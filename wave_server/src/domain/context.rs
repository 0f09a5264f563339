use super::events::EventBus;
use super::ids::IdAllocator;
use super::rng::GameRng;
use super::skills::SkillCatalog;
use super::tuning::GameTuning;
use std::sync::Arc;

/// Per-session services threaded through every system: tuning tables, the skill
/// catalog, the random source, the event outbox and the simulation clock.
///
/// Built once when a session is created. Nothing in the domain reaches for globals.
pub struct SessionContext {
    pub tuning: Arc<GameTuning>,
    pub catalog: Arc<SkillCatalog>,
    pub rng: GameRng,
    pub events: EventBus,
    pub ids: IdAllocator,
    /// Monotonic session time in seconds; advanced only by the tick.
    pub now: f64,
}

impl SessionContext {
    pub fn new(tuning: Arc<GameTuning>, catalog: Arc<SkillCatalog>, rng: GameRng) -> Self {
        Self {
            tuning,
            catalog,
            rng,
            events: EventBus::new(),
            ids: IdAllocator::new(),
            now: 0.0,
        }
    }

    /// Seeded context with default tuning and the standard catalog.
    pub fn seeded(seed: u64) -> Self {
        Self::new(
            Arc::new(GameTuning::default()),
            Arc::new(SkillCatalog::standard()),
            GameRng::from_seed(seed),
        )
    }
}
