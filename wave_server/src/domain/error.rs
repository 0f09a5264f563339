// Failure taxonomy for authoritative command handling.
//
// None of these are surfaced to players: a rejected command is a no-op and the
// missing event is the only visible signal.

use super::ids::{NodeId, PlayerId};
use super::skills::{Grade, SkillId};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CommandError {
    #[error("precondition failed: {0}")]
    Precondition(#[from] PreconditionFailure),
    #[error("authority violation: {0}")]
    Authority(#[from] AuthorityViolation),
    #[error("missing reference: {0}")]
    Missing(#[from] MissingReference),
}

/// The actor is not in a state that allows the command. Silent no-op.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PreconditionFailure {
    #[error("insufficient currency (balance {balance}, cost {cost})")]
    InsufficientCurrency { balance: u32, cost: u32 },
    #[error("actor is dead")]
    ActorDead,
    #[error("actor is not dead")]
    NotDead,
    #[error("not enough mana (have {have}, need {need})")]
    NotEnoughMana { have: f32, need: f32 },
    #[error("skill {0} is not owned")]
    NotOwned(SkillId),
    #[error("skill {skill} is at the stack cap {max}")]
    StackCapReached { skill: SkillId, max: u8 },
    #[error("skill {skill} has {stack} stacks, synthesis needs {threshold}")]
    BelowSynthesisThreshold {
        skill: SkillId,
        stack: u8,
        threshold: u8,
    },
    #[error("skill {0} is already at the maximum grade")]
    MaxGrade(SkillId),
    #[error("basic attack is cooling down")]
    OnCooldown,
    #[error("no living monster in range")]
    NoTarget,
    #[error("player {0} already joined")]
    AlreadyJoined(PlayerId),
}

/// Mutation attempted by someone who may not write this state. Integration error, never retried.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AuthorityViolation {
    #[error("node {node} is not the session authority")]
    NotAuthorityNode { node: NodeId },
    #[error("caller {caller:?} does not own player {owner}")]
    NotOwner {
        caller: Option<PlayerId>,
        owner: PlayerId,
    },
    #[error("caller node {node} is not the host")]
    CallerNotHost { node: NodeId },
    #[error("node {node} is the session authority and does not take replicated state")]
    ReplicatedWriteOnAuthority { node: NodeId },
}

/// A referenced entity or table row vanished between issue and execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MissingReference {
    #[error("unknown player {0}")]
    Player(PlayerId),
    #[error("unknown skill {0}")]
    Skill(SkillId),
    #[error("no skills in grade {0:?}")]
    EmptyTier(Grade),
}
