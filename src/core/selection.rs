//! # Selection Policies
//!
//! Side-effect free selections over a membership table: which entries travel
//! in a piggyback, which member is pinged next and which members are asked
//! to probe a suspect indirectly. Orderings are plain values so they can be
//! swapped through the configuration without touching the protocol.
use std::cmp::Ordering;

use rand::seq::{IteratorRandom, SliceRandom};
use rand::Rng;

use crate::pb::{NodeId, PeerSnapshot, PeerState};

use super::member::{Member, MembershipList};
use super::peer::Peer;

/// Ordering used to pick the entries of a piggyback.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PiggybackOrder {
    /// Least disseminated entries first.
    #[default]
    InfectionCount,
    /// Least disseminated entries first; on equal counts, entries in the
    /// given state go after all others.
    Deprioritize(PeerState),
}

impl PiggybackOrder {
    pub fn compare(&self, a: &Member, b: &Member) -> Ordering {
        let by_infection = a.infection_count().cmp(&b.infection_count());

        let by_state = match self {
            PiggybackOrder::InfectionCount => Ordering::Equal,
            PiggybackOrder::Deprioritize(state) => {
                (a.state() == *state).cmp(&(b.state() == *state))
            }
        };

        by_infection.then(by_state).then(a.id().cmp(&b.id()))
    }
}

/// Ordering used to pick the next direct ping target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PingTargetOrder {
    /// Least pinged member, lowest id on ties.
    #[default]
    LeastPinged,
    /// Least pinged member, random on ties.
    LeastPingedRandom,
}

/// Picks up to `max_count` entries whose `infection_count` does not exceed
/// `max_infection_count`, ordered by `order`.
pub fn select_piggyback<'a>(
    members: impl IntoIterator<Item = &'a Member>,
    max_count: usize,
    max_infection_count: u32,
    order: PiggybackOrder,
) -> Vec<PeerSnapshot> {
    let mut selectable: Vec<&Member> = members
        .into_iter()
        .filter(|m| m.infection_count() <= max_infection_count)
        .collect();
    selectable.sort_by(|a, b| order.compare(a, b));

    selectable
        .into_iter()
        .take(max_count)
        .map(|m| m.peer().snapshot())
        .collect()
}

/// Increments the `infection_count` of every member present in `piggyback`.
pub fn bump_infection_counters(members: &mut MembershipList, piggyback: &[PeerSnapshot]) {
    for id in piggyback.iter().filter_map(PeerSnapshot::id) {
        if let Some(member) = members.get_mut(id) {
            member.bump_infection();
        }
    }
}

/// Picks the `Alive` or `Suspected` member, other than the local node, that
/// was pinged the fewest times.
pub fn select_ping_target<'a, R: Rng>(
    local_id: NodeId,
    members: impl IntoIterator<Item = &'a Member>,
    order: PingTargetOrder,
    rng: &mut R,
) -> Option<&'a Member> {
    let candidates: Vec<&Member> = members
        .into_iter()
        .filter(|m| m.id() != local_id)
        .filter(|m| matches!(m.state(), PeerState::Alive | PeerState::Suspected))
        .collect();

    let min_pinged = candidates.iter().map(|m| m.pinged_count()).min()?;
    let least_pinged = candidates
        .into_iter()
        .filter(|m| m.pinged_count() == min_pinged);

    match order {
        PingTargetOrder::LeastPinged => least_pinged.min_by_key(|m| m.id()),
        PingTargetOrder::LeastPingedRandom => {
            let least_pinged: Vec<&Member> = least_pinged.collect();
            least_pinged.choose(rng).copied()
        }
    }
}

/// Picks up to `k` distinct `Alive` members other than the local node,
/// uniformly at random.
pub fn select_indirect_probers<'a, R: Rng>(
    members: impl IntoIterator<Item = &'a Member>,
    local_id: NodeId,
    k: usize,
    rng: &mut R,
) -> Vec<Peer> {
    members
        .into_iter()
        .filter(|m| m.id() != local_id && m.state() == PeerState::Alive)
        .map(|m| m.peer().clone())
        .choose_multiple(rng, k)
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::core::member::{Member, MembershipList};
    use crate::core::peer::Peer;
    use crate::pb::{NodeAddress, PeerState};

    use super::*;

    fn member(id: u32, state: PeerState, infection_count: u32) -> Member {
        let mut member = Member::new(Peer::new(NodeAddress::new(id, format!("NODE_{id}")), state));
        for _ in 0..infection_count {
            member.bump_infection();
        }
        member
    }

    fn create_membership_list(remote: &[(u32, PeerState)]) -> MembershipList {
        let local = Peer::new(NodeAddress::new(0, "NODE_0"), PeerState::Alive);
        let mut membership_list = MembershipList::new(local);
        for (id, state) in remote {
            membership_list.insert(member(*id, *state, 0));
        }
        membership_list
    }

    #[test]
    fn test_select_piggyback_bounds() {
        let members = [
            member(1, PeerState::Alive, 3),
            member(2, PeerState::Alive, 0),
            member(3, PeerState::Suspected, 11),
            member(4, PeerState::Dead, 1),
        ];

        let result = select_piggyback(&members, 2, 10, PiggybackOrder::InfectionCount);
        let ids: Vec<_> = result.iter().filter_map(|p| p.id()).collect();
        assert_eq!(ids, vec![2, 4]);

        let result = select_piggyback(&members, 10, 10, PiggybackOrder::InfectionCount);
        let ids: Vec<_> = result.iter().filter_map(|p| p.id()).collect();
        assert_eq!(ids, vec![2, 4, 1]);
    }

    #[test]
    fn test_select_piggyback_deprioritizes_dead_on_ties() {
        let members = [
            member(1, PeerState::Dead, 0),
            member(2, PeerState::Alive, 0),
            member(3, PeerState::Suspected, 0),
            member(4, PeerState::Alive, 1),
        ];

        let order = PiggybackOrder::Deprioritize(PeerState::Dead);
        let result = select_piggyback(&members, 3, 10, order);
        let ids: Vec<_> = result.iter().filter_map(|p| p.id()).collect();
        assert_eq!(ids, vec![2, 3, 1]);
    }

    #[test]
    fn test_bump_infection_counters() {
        let mut membership_list = create_membership_list(&[(1, PeerState::Alive), (2, PeerState::Alive)]);
        let piggyback = vec![membership_list.get(1).unwrap().peer().snapshot()];

        bump_infection_counters(&mut membership_list, &piggyback);

        assert_eq!(membership_list.get(1).unwrap().infection_count(), 1);
        assert_eq!(membership_list.get(2).unwrap().infection_count(), 0);
    }

    #[test]
    fn test_select_ping_target_least_pinged() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut membership_list = create_membership_list(&[
            (1, PeerState::Alive),
            (2, PeerState::Suspected),
            (3, PeerState::Dead),
        ]);
        membership_list.get_mut(1).unwrap().mark_pinged();

        let target = select_ping_target(0, membership_list.iter(), PingTargetOrder::LeastPinged, &mut rng);
        assert_eq!(target.map(|m| m.id()), Some(2));

        membership_list.get_mut(2).unwrap().mark_pinged();
        let target = select_ping_target(0, membership_list.iter(), PingTargetOrder::LeastPinged, &mut rng);
        assert_eq!(target.map(|m| m.id()), Some(1));
    }

    #[test]
    fn test_select_ping_target_none() {
        let mut rng = StdRng::seed_from_u64(7);
        let membership_list = create_membership_list(&[(3, PeerState::Dead)]);

        let target = select_ping_target(0, membership_list.iter(), PingTargetOrder::LeastPingedRandom, &mut rng);
        assert!(target.is_none());
    }

    #[test]
    fn test_select_indirect_probers() {
        let mut rng = StdRng::seed_from_u64(7);
        let membership_list = create_membership_list(&[
            (1, PeerState::Alive),
            (2, PeerState::Suspected),
            (3, PeerState::Alive),
            (4, PeerState::Dead),
            (5, PeerState::Alive),
        ]);

        let probers = select_indirect_probers(membership_list.iter(), 0, 2, &mut rng);
        assert_eq!(probers.len(), 2);
        assert!(probers.iter().all(|p| p.is(PeerState::Alive) && p.id() != 0));
        assert_ne!(probers[0], probers[1]);

        let probers = select_indirect_probers(membership_list.iter(), 0, 10, &mut rng);
        assert_eq!(probers.len(), 3);
    }

    #[test]
    fn test_select_indirect_probers_seeded() {
        let membership_list = create_membership_list(&[
            (1, PeerState::Alive),
            (2, PeerState::Alive),
            (3, PeerState::Alive),
            (4, PeerState::Alive),
        ]);

        let first = select_indirect_probers(membership_list.iter(), 0, 2, &mut StdRng::seed_from_u64(42));
        let second = select_indirect_probers(membership_list.iter(), 0, 2, &mut StdRng::seed_from_u64(42));

        let first: Vec<_> = first.iter().map(|p| p.id()).collect();
        let second: Vec<_> = second.iter().map(|p| p.id()).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_select_indirect_probers_empty() {
        let mut rng = StdRng::seed_from_u64(7);
        let membership_list = create_membership_list(&[(1, PeerState::Suspected)]);

        let probers = select_indirect_probers(membership_list.iter(), 0, 2, &mut rng);
        assert!(probers.is_empty());
    }
}
