use std::sync::Arc;

use dashmap::DashMap;

use crate::pb::{NodeAddress, NodeId, PeerSnapshot, PeerState};

use super::member::MembershipList;

/// A concurrently readable copy of a node's membership table.
///
/// The node actor owns the table and republishes it here after every
/// handled input. Reads never block the actor.
#[derive(Clone, Debug, Default)]
pub struct MembershipView {
    members: Arc<DashMap<NodeId, PeerSnapshot>>,
}

impl MembershipView {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn get(&self, id: NodeId) -> Option<PeerSnapshot> {
        self.members.get(&id).map(|entry| entry.value().clone())
    }

    pub fn state_of(&self, id: NodeId) -> Option<PeerState> {
        self.members
            .get(&id)
            .and_then(|entry| PeerState::try_from(entry.value().state).ok())
    }

    /// Addresses of all `Alive` members, ordered by id.
    pub fn alive(&self) -> Vec<NodeAddress> {
        self.addresses_in(PeerState::Alive)
    }

    /// Addresses of all `Dead` members, ordered by id.
    pub fn dead(&self) -> Vec<NodeAddress> {
        self.addresses_in(PeerState::Dead)
    }

    /// All entries ordered by id.
    pub fn snapshot(&self) -> Vec<PeerSnapshot> {
        let mut snapshots: Vec<PeerSnapshot> =
            self.members.iter().map(|entry| entry.value().clone()).collect();
        snapshots.sort_by_key(|s| s.id());
        snapshots
    }

    pub(crate) fn sync(&self, members: &MembershipList) {
        self.members.retain(|id, _| members.contains(*id));
        for member in members.iter() {
            self.members.insert(member.id(), member.peer().snapshot());
        }
    }

    fn addresses_in(&self, state: PeerState) -> Vec<NodeAddress> {
        self.snapshot()
            .into_iter()
            .filter(|s| s.state == state as i32)
            .filter_map(|s| s.address)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use crate::core::member::{Member, MembershipList};
    use crate::core::peer::Peer;
    use crate::pb::{NodeAddress, PeerState};

    use super::MembershipView;

    fn addr(id: u32) -> NodeAddress {
        NodeAddress::new(id, format!("NODE_{id}"))
    }

    #[test]
    fn test_view_sync() {
        let mut membership_list = MembershipList::new(Peer::new(addr(1), PeerState::Alive));
        membership_list.insert(Member::new(Peer::new(addr(3), PeerState::Dead)));
        membership_list.insert(Member::new(Peer::new(addr(2), PeerState::Alive)));
        let view = MembershipView::new();

        view.sync(&membership_list);

        assert_eq!(view.len(), 3);
        assert_eq!(view.state_of(3), Some(PeerState::Dead));
        assert_eq!(view.alive(), vec![addr(1), addr(2)]);
        assert_eq!(view.dead(), vec![addr(3)]);
        assert_eq!(view.get(2).and_then(|s| s.id()), Some(2));
        assert!(view.get(4).is_none());
    }

    #[test]
    fn test_view_sync_drops_replaced_entries() {
        let mut membership_list = MembershipList::new(Peer::new(addr(1), PeerState::Alive));
        let view = MembershipView::new();
        view.sync(&membership_list);

        membership_list.replace_local(addr(5));
        view.sync(&membership_list);

        let ids: Vec<_> = view.snapshot().iter().filter_map(|s| s.id()).collect();
        assert_eq!(ids, vec![5]);
    }
}
