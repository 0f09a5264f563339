// Who may write canonical state and who may issue which command.

use super::error::AuthorityViolation;
use super::ids::{NodeId, PlayerId};
use serde::{Deserialize, Serialize};

/// Caller requirement attached to every command handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CallerAuthority {
    /// Only the player that owns the subject entity.
    Owner,
    /// Only the elected host.
    Authority,
    Any,
}

/// Where a handler is allowed to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Audience {
    /// Mutates canonical state; a no-op anywhere but on the host.
    AuthorityOnly,
    /// Runs on every node (participant bookkeeping).
    Broadcast,
}

/// Origin of a command as seen by the receiving node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub node: NodeId,
    /// The player this node controls, if any.
    pub player: Option<PlayerId>,
}

impl Caller {
    pub fn player(node: NodeId, player: PlayerId) -> Self {
        Self {
            node,
            player: Some(player),
        }
    }

    pub fn node(node: NodeId) -> Self {
        Self { node, player: None }
    }
}

/// Lowest id wins so every node elects the same host from the same candidate set.
pub fn elect_host(candidates: &[NodeId]) -> Option<NodeId> {
    candidates.iter().copied().min()
}

/// A node's view of the session's authority.
#[derive(Debug, Clone)]
pub struct Authority {
    local: NodeId,
    host: NodeId,
    // A dedicated server is host for the whole session and never re-elected away.
    dedicated: bool,
}

impl Authority {
    pub fn new(local: NodeId, host: NodeId) -> Self {
        Self {
            local,
            host,
            dedicated: false,
        }
    }

    /// The local node is a dedicated server and therefore the permanent host.
    pub fn dedicated(local: NodeId) -> Self {
        Self {
            local,
            host: local,
            dedicated: true,
        }
    }

    pub fn local(&self) -> NodeId {
        self.local
    }

    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn is_authority(&self) -> bool {
        self.local == self.host
    }

    pub fn check_node(&self, audience: Audience) -> Result<(), AuthorityViolation> {
        match audience {
            Audience::AuthorityOnly if !self.is_authority() => {
                Err(AuthorityViolation::NotAuthorityNode { node: self.local })
            }
            _ => Ok(()),
        }
    }

    /// Validates `caller` against the handler's requirement for an entity owned by `owner`.
    pub fn check_caller(
        &self,
        required: CallerAuthority,
        caller: &Caller,
        owner: PlayerId,
    ) -> Result<(), AuthorityViolation> {
        match required {
            CallerAuthority::Any => Ok(()),
            CallerAuthority::Authority if caller.node == self.host => Ok(()),
            CallerAuthority::Authority => Err(AuthorityViolation::CallerNotHost { node: caller.node }),
            CallerAuthority::Owner if caller.player == Some(owner) => Ok(()),
            CallerAuthority::Owner => Err(AuthorityViolation::NotOwner {
                caller: caller.player,
                owner,
            }),
        }
    }

    /// Re-runs the election once the host is gone. Returns the new host when it changed.
    pub fn reelect(&mut self, remaining: &[NodeId]) -> Option<NodeId> {
        if self.dedicated || remaining.contains(&self.host) {
            return None;
        }
        let elected = elect_host(remaining)?;
        if elected == self.host {
            return None;
        }
        self.host = elected;
        Some(elected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(raw: u64) -> NodeId {
        NodeId::new(raw)
    }

    #[test]
    fn election_is_deterministic_lowest_id() {
        assert_eq!(elect_host(&[node(7), node(3), node(9)]), Some(node(3)));
        assert_eq!(elect_host(&[node(9), node(7), node(3)]), Some(node(3)));
        assert_eq!(elect_host(&[]), None);
    }

    #[test]
    fn observers_reject_authority_only_handlers() {
        let observer = Authority::new(node(2), node(1));
        assert!(!observer.is_authority());
        assert_eq!(
            observer.check_node(Audience::AuthorityOnly),
            Err(AuthorityViolation::NotAuthorityNode { node: node(2) })
        );
        assert_eq!(observer.check_node(Audience::Broadcast), Ok(()));
    }

    #[test]
    fn owner_only_rejects_other_players() {
        let host = Authority::dedicated(node(0));
        let caller = Caller::player(node(5), PlayerId::new(5));
        assert!(
            host.check_caller(CallerAuthority::Owner, &caller, PlayerId::new(5))
                .is_ok()
        );
        assert_eq!(
            host.check_caller(CallerAuthority::Owner, &caller, PlayerId::new(6)),
            Err(AuthorityViolation::NotOwner {
                caller: Some(PlayerId::new(5)),
                owner: PlayerId::new(6),
            })
        );
    }

    #[test]
    fn authority_callers_must_be_the_host() {
        let host = Authority::dedicated(node(0));
        assert!(
            host.check_caller(CallerAuthority::Authority, &Caller::node(node(0)), PlayerId::new(1))
                .is_ok()
        );
        assert_eq!(
            host.check_caller(CallerAuthority::Authority, &Caller::node(node(4)), PlayerId::new(1)),
            Err(AuthorityViolation::CallerNotHost { node: node(4) })
        );
    }

    #[test]
    fn host_departure_promotes_the_next_lowest_node() {
        let mut auth = Authority::new(node(3), node(1));
        assert_eq!(auth.reelect(&[node(3), node(8)]), Some(node(3)));
        assert!(auth.is_authority());
        assert_eq!(auth.reelect(&[node(3), node(8)]), None);
    }

    #[test]
    fn present_host_is_kept_even_if_a_lower_node_joined_later() {
        let mut auth = Authority::new(node(5), node(5));
        assert_eq!(auth.reelect(&[node(2), node(5)]), None);
        assert_eq!(auth.host(), node(5));
    }

    #[test]
    fn dedicated_server_stays_host() {
        let mut auth = Authority::dedicated(node(0));
        assert_eq!(auth.reelect(&[node(4)]), None);
        assert!(auth.is_authority());
    }
}
