// Use cases layer: application workflows for the game server.

pub mod dispatch;
pub mod game;
pub mod lobby;
pub mod replica;
pub mod replication;
pub mod session;
pub mod types;

pub use lobby::{LobbyHandle, LobbyRegistry, LobbySettings};
pub use replica::Replica;
pub use replication::{ReplicationChannel, WorldDelta, WorldSnapshot};
pub use session::{SERVER_NODE, Session};
pub use types::{Command, CommandEnvelope, ServerState, WorldUpdate};
