// Authority-side replication: full snapshots plus a cadenced diff against what was last pushed.

use crate::domain::{EntityKey, EntitySnapshot};
use std::collections::BTreeMap;

/// Every replicated entity at one tick, wave first.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldSnapshot {
    pub tick: u64,
    pub entities: Vec<EntitySnapshot>,
}

/// Changes since the previous push.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WorldDelta {
    pub tick: u64,
    pub upserts: Vec<EntitySnapshot>,
    pub removed: Vec<EntityKey>,
}

impl WorldDelta {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.removed.is_empty()
    }
}

pub struct ReplicationChannel {
    interval_ticks: u64,
    last_sent: BTreeMap<EntityKey, EntitySnapshot>,
}

impl ReplicationChannel {
    pub fn new(interval_ticks: u64) -> Self {
        Self {
            interval_ticks: interval_ticks.max(1),
            last_sent: BTreeMap::new(),
        }
    }

    pub fn due(&self, tick: u64) -> bool {
        tick % self.interval_ticks == 0
    }

    /// Diffs `current` against the last pushed set on replication ticks.
    ///
    /// Returns `None` off-cadence. On cadence the returned delta may be empty; the last-sent
    /// set is replaced by `current` either way.
    pub fn poll(&mut self, tick: u64, current: &[EntitySnapshot]) -> Option<WorldDelta> {
        if !self.due(tick) {
            return None;
        }

        let mut next = BTreeMap::new();
        let mut upserts = Vec::new();
        for entity in current {
            let key = entity.key();
            if self.last_sent.get(&key) != Some(entity) {
                upserts.push(entity.clone());
            }
            next.insert(key, entity.clone());
        }

        let removed = self
            .last_sent
            .keys()
            .filter(|key| !next.contains_key(*key))
            .copied()
            .collect();

        self.last_sent = next;
        Some(WorldDelta {
            tick,
            upserts,
            removed,
        })
    }
}
