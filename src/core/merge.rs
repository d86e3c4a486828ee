//! # Merge Engine
//!
//! Reconciles the local membership table with a view received from another
//! node. For every received peer the precedence rules decide whether the
//! received information replaces the local one:
//!
//! | received  | local              | accepted when                    |
//! |-----------|--------------------|----------------------------------|
//! | Alive     | Alive, Suspected   | received incarnation is greater  |
//! | Suspected | Suspected          | received incarnation is greater  |
//! | Suspected | Alive              | received incarnation not smaller |
//! | Dead      | Alive, Suspected   | always                           |
//! | any       | unknown            | always                           |
//!
//! Everything else is discarded. A received entry about the local node that
//! is not `Alive` is refuted by bumping the local incarnation past it.
use crate::pb::{NodeId, PeerState};

use super::member::{Member, MembershipList};
use super::peer::Peer;

/// How a received incarnation has to compare to the local one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IncarnationRule {
    Greater,
    GreaterOrEqual,
}

impl IncarnationRule {
    pub fn accepts(self, received: u32, local: u32) -> bool {
        match self {
            IncarnationRule::Greater => received > local,
            IncarnationRule::GreaterOrEqual => received >= local,
        }
    }
}

/// Tie-break rules of the precedence table.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MergeRules {
    pub alive_over_alive: IncarnationRule,
    pub alive_over_suspected: IncarnationRule,
    pub suspected_over_suspected: IncarnationRule,
    pub suspected_over_alive: IncarnationRule,
}

impl Default for MergeRules {
    fn default() -> Self {
        Self {
            alive_over_alive: IncarnationRule::Greater,
            alive_over_suspected: IncarnationRule::Greater,
            suspected_over_suspected: IncarnationRule::Greater,
            suspected_over_alive: IncarnationRule::GreaterOrEqual,
        }
    }
}

impl MergeRules {
    /// Whether `received` overrides what is known locally as `local`.
    pub fn accepts(&self, local: &Peer, received: &Peer) -> bool {
        use PeerState::*;

        let (r, l) = (received.incarnation(), local.incarnation());
        match (received.state(), local.state()) {
            (Alive, Alive) => self.alive_over_alive.accepts(r, l),
            (Alive, Suspected) => self.alive_over_suspected.accepts(r, l),
            (Suspected, Suspected) => self.suspected_over_suspected.accepts(r, l),
            (Suspected, Alive) => self.suspected_over_alive.accepts(r, l),
            (Dead, Alive | Suspected) => true,
            _ => false,
        }
    }
}

/// A change applied to the local table by a merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeUpdate {
    pub id: NodeId,
    /// `None` when the member was unknown before.
    pub previous: Option<PeerState>,
    pub state: PeerState,
    pub incarnation: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub updates: Vec<MergeUpdate>,
    /// New local incarnation if a rumour about the local node was refuted.
    pub refuted: Option<u32>,
}

/// Merges `received` into `members`.
///
/// Applying the same `received` twice leaves the table unchanged the second
/// time, and the order of `received` does not change the resulting states.
pub fn merge(members: &mut MembershipList, received: &[Peer], rules: &MergeRules) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let min_pinged = members.min_pinged_count();
    let local_id = members.local_id();

    for peer in received {
        if peer.id() == local_id {
            if let Some(incarnation) = refute(members.local_mut(), peer) {
                outcome.refuted = Some(incarnation);
            }
            continue;
        }

        match members.get_mut(peer.id()) {
            Some(member) => {
                if !rules.accepts(member.peer(), peer) {
                    continue;
                }

                let previous = member.state();
                let before = member.incarnation();
                member.peer_mut().overwrite_with(peer);
                if previous == member.state() && before == member.incarnation() {
                    continue;
                }

                member.reset_infection();
                outcome.updates.push(MergeUpdate {
                    id: member.id(),
                    previous: Some(previous),
                    state: member.state(),
                    incarnation: member.incarnation(),
                });
            }
            None => {
                members.insert(Member::new(peer.clone()).with_pinged_count(min_pinged));
                outcome.updates.push(MergeUpdate {
                    id: peer.id(),
                    previous: None,
                    state: peer.state(),
                    incarnation: peer.incarnation(),
                });
            }
        }
    }

    outcome
}

/// Defends the local node against a rumour that it is not alive.
fn refute(local: &mut Member, rumour: &Peer) -> Option<u32> {
    if rumour.is(PeerState::Alive) {
        return None;
    }

    let incarnation = local
        .incarnation()
        .max(rumour.incarnation().saturating_add(1));
    if local.state() == PeerState::Alive && local.incarnation() == incarnation {
        return None;
    }

    local.peer_mut().set_state(PeerState::Alive);
    local.peer_mut().set_incarnation(incarnation);
    local.reset_infection();
    Some(incarnation)
}
