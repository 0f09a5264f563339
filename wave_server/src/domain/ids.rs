// Typed identifiers for session entities and network nodes.
// Ids travel as decimal strings so 64-bit values survive JSON clients.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(into = "String", try_from = "String")]
        pub struct $name(pub u64);

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }

        impl TryFrom<String> for $name {
            type Error = ParseIntError;

            fn try_from(raw: String) -> Result<Self, Self::Error> {
                raw.trim().parse().map(Self)
            }
        }

        impl $name {
            pub const fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub const fn get(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type!(
    /// Identity of a participant and of the player entity it owns.
    PlayerId
);
id_type!(
    /// Identity of a hostile entity produced by the spawn controller.
    MonsterId
);
id_type!(
    /// Identity of a projectile for its whole lifetime.
    ProjectileId
);
id_type!(
    /// Identity of a process taking part in a session (host or observer).
    NodeId
);

/// Monotonic id source owned by the session; ids are never reused.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self { next: 1 }
    }

    /// Skips past an id issued elsewhere so it is never handed out again.
    pub fn reserve(&mut self, raw: u64) {
        self.next = self.next.max(raw.saturating_add(1));
    }

    pub fn next_raw(&mut self) -> u64 {
        let id = self.next;
        self.next = self.next.wrapping_add(1);
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_travel_as_strings() {
        let id = PlayerId::new(1_700_000_000_000_000_123);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"1700000000000000123\"");
        assert_eq!(serde_json::from_str::<PlayerId>(&json).unwrap(), id);
        assert!(serde_json::from_str::<PlayerId>("\"abc\"").is_err());
    }

    #[test]
    fn allocator_never_reuses_ids() {
        let mut ids = IdAllocator::new();
        let a = ids.next_raw();
        let b = ids.next_raw();
        assert_ne!(a, b);

        ids.reserve(40);
        assert_eq!(ids.next_raw(), 41);
        ids.reserve(5);
        assert_eq!(ids.next_raw(), 42);
    }
}
