// Observer-side mirror of the authority's world.
//
// Replicated fields are only ever written from snapshots and deltas. Local events are
// derived from the difference between what was held and what arrived.

use super::replication::{WorldDelta, WorldSnapshot};
use crate::domain::events::{MonsterEvent, PlayerEvent, WaveEvent};
use crate::domain::{DomainEvent, EntityKey, EntitySnapshot, EventBus, Position};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Default)]
pub struct Replica {
    last_tick: Option<u64>,
    current: BTreeMap<EntityKey, EntitySnapshot>,
    // Positions as of the push before the current one.
    previous: BTreeMap<EntityKey, Position>,
    events: EventBus,
}

impl Replica {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }

    pub fn get(&self, key: EntityKey) -> Option<&EntitySnapshot> {
        self.current.get(&key)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.current.values()
    }

    /// Replaces the mirror with a full snapshot. Stale or repeated ticks are ignored.
    pub fn apply_snapshot(&mut self, snapshot: &WorldSnapshot) -> bool {
        if !self.accept(snapshot.tick) {
            return false;
        }
        self.roll_positions();

        let mut next = BTreeMap::new();
        for entity in &snapshot.entities {
            let key = entity.key();
            derive_events(self.current.get(&key), entity, &mut self.events);
            next.insert(key, entity.clone());
        }
        self.previous.retain(|key, _| next.contains_key(key));
        self.current = next;
        true
    }

    /// Applies upserts and removals on top of the mirror. Stale or repeated ticks are ignored.
    pub fn apply_delta(&mut self, delta: &WorldDelta) -> bool {
        if !self.accept(delta.tick) {
            return false;
        }
        self.roll_positions();

        for entity in &delta.upserts {
            let key = entity.key();
            derive_events(self.current.get(&key), entity, &mut self.events);
            self.current.insert(key, entity.clone());
        }
        for key in &delta.removed {
            self.current.remove(key);
            self.previous.remove(key);
        }
        true
    }

    /// Position of `key` blended between the two most recent pushes.
    ///
    /// `alpha` is clamped to [0, 1]; entities seen only once sit at their current position.
    pub fn interpolated_position(&self, key: EntityKey, alpha: f32) -> Option<Position> {
        let to = self.current.get(&key)?.position()?;
        let Some(from) = self.previous.get(&key) else {
            return Some(to);
        };
        let t = alpha.clamp(0.0, 1.0);
        Some(Position::new(
            from.x + (to.x - from.x) * t,
            from.y + (to.y - from.y) * t,
        ))
    }

    pub fn drain_events(&mut self) -> Vec<DomainEvent> {
        self.events.drain()
    }

    fn accept(&mut self, tick: u64) -> bool {
        if self.last_tick.is_some_and(|last| tick <= last) {
            debug!(tick, last_tick = ?self.last_tick, "stale replication push ignored");
            return false;
        }
        self.last_tick = Some(tick);
        true
    }

    fn roll_positions(&mut self) {
        self.previous = self
            .current
            .iter()
            .filter_map(|(key, entity)| entity.position().map(|pos| (*key, pos)))
            .collect();
    }
}

fn derive_events(old: Option<&EntitySnapshot>, new: &EntitySnapshot, events: &mut EventBus) {
    match (old, new) {
        (Some(EntitySnapshot::Player(old)), EntitySnapshot::Player(new)) => {
            if old.health != new.health || old.max_health != new.max_health {
                events.publish(PlayerEvent::HealthChanged {
                    player_id: new.id,
                    current: new.health,
                    max: new.max_health,
                });
            }
            if old.state != new.state {
                events.publish(PlayerEvent::StateChanged {
                    player_id: new.id,
                    state: new.state,
                });
            }
            if old.currency != new.currency {
                events.publish(PlayerEvent::CurrencyChanged {
                    player_id: new.id,
                    currency: new.currency,
                });
            }
        }
        (None, EntitySnapshot::Monster(new)) => {
            events.publish(MonsterEvent::Spawned {
                monster_id: new.id,
                target: new.target,
            });
        }
        (Some(EntitySnapshot::Monster(old)), EntitySnapshot::Monster(new)) => {
            if old.health != new.health {
                events.publish(MonsterEvent::HealthChanged {
                    monster_id: new.id,
                    current: new.health,
                    max: new.max_health,
                });
            }
            if old.state != new.state {
                events.publish(MonsterEvent::StateChanged {
                    monster_id: new.id,
                    state: new.state,
                });
            }
        }
        (old, EntitySnapshot::Wave(new)) => {
            let old = match old {
                Some(EntitySnapshot::Wave(old)) => Some(old),
                _ => None,
            };
            if old.is_none_or(|old| old.number != new.number) {
                events.publish(WaveEvent::Changed { number: new.number });
            }
            if old.is_none_or(|old| old.state != new.state) {
                events.publish(WaveEvent::StateChanged {
                    number: new.number,
                    state: new.state,
                });
            }
        }
        _ => {}
    }
}
