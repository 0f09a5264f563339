// Domain layer: core simulation types and rules.

pub mod authority;
pub mod context;
pub mod error;
pub mod events;
pub mod ids;
pub mod monster;
pub mod player;
pub mod rng;
pub mod skills;
pub mod state;
pub mod systems;
pub mod tuning;
pub mod wave;

pub use authority::{Audience, Authority, Caller, CallerAuthority};
pub use context::SessionContext;
pub use error::{AuthorityViolation, CommandError, MissingReference, PreconditionFailure};
pub use events::{DomainEvent, EventBus};
pub use ids::{MonsterId, NodeId, PlayerId, ProjectileId};
pub use state::{EntityKey, EntitySnapshot, Position};
