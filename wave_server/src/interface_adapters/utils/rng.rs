use crate::domain::PlayerId;
use std::{
    sync::atomic::{AtomicU64, Ordering},
    sync::OnceLock,
    time::{SystemTime, UNIX_EPOCH},
};

fn now_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64
}

/// Process-unique, increasing identifier for connections and slot tokens.
///
/// Seeded from the wall clock once so ids from separate runs rarely collide.
pub fn rand_id() -> u64 {
    static COUNTER: OnceLock<AtomicU64> = OnceLock::new();
    COUNTER
        .get_or_init(|| AtomicU64::new(now_nanos()))
        .fetch_add(1, Ordering::Relaxed)
}

/// Identity for a guest that joined without one.
pub fn guest_player_id() -> PlayerId {
    PlayerId::new(rand_id())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique_within_the_process() {
        let a = rand_id();
        let b = rand_id();
        assert!(b > a);
        assert_ne!(guest_player_id(), guest_player_id());
    }
}
