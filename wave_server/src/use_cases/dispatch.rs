// Command routing table: caller requirement and execution audience per command kind.

use super::types::CommandKind;
use crate::domain::{Audience, CallerAuthority};

/// Checked at the dispatch boundary before any handler runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub required: CallerAuthority,
    pub audience: Audience,
}

pub const fn route(kind: CommandKind) -> Route {
    match kind {
        // Participant bookkeeping runs everywhere but only the host may announce it.
        CommandKind::Join | CommandKind::Leave => Route {
            required: CallerAuthority::Authority,
            audience: Audience::Broadcast,
        },
        CommandKind::Move
        | CommandKind::Attack
        | CommandKind::DrawSkill
        | CommandKind::CombineSkill
        | CommandKind::Respawn
        | CommandKind::Defend => Route {
            required: CallerAuthority::Owner,
            audience: Audience::AuthorityOnly,
        },
    }
}
