use std::collections::BTreeMap;

use crate::pb::{NodeAddress, NodeId, PeerSnapshot, PeerState};

use super::peer::Peer;

/// `pinged_count` of the local node; it is never chosen as a ping target.
pub(crate) const NEVER_PING: u32 = u32::MAX;

/// A peer together with the bookkeeping the protocol keeps about it.
#[derive(Clone, Debug)]
pub struct Member {
    peer: Peer,
    /// Number of piggybacks this entry travelled in since its last change.
    infection_count: u32,
    /// Number of times this member was chosen as a direct ping target.
    pinged_count: u32,
    /// Highest sequence number seen from this member as a message source.
    last_seen_seq: u32,
}

impl Member {
    pub fn new(peer: Peer) -> Self {
        Self {
            peer,
            infection_count: 0,
            pinged_count: 0,
            last_seen_seq: 0,
        }
    }

    pub(crate) fn new_local(peer: Peer) -> Self {
        Self {
            pinged_count: NEVER_PING,
            ..Self::new(peer)
        }
    }

    pub(crate) fn with_pinged_count(mut self, pinged_count: u32) -> Self {
        self.pinged_count = pinged_count;
        self
    }

    pub fn peer(&self) -> &Peer {
        &self.peer
    }

    pub(crate) fn peer_mut(&mut self) -> &mut Peer {
        &mut self.peer
    }

    pub fn id(&self) -> NodeId {
        self.peer.id()
    }

    pub fn state(&self) -> PeerState {
        self.peer.state()
    }

    pub fn incarnation(&self) -> u32 {
        self.peer.incarnation()
    }

    pub fn infection_count(&self) -> u32 {
        self.infection_count
    }

    pub fn pinged_count(&self) -> u32 {
        self.pinged_count
    }

    pub fn last_seen_seq(&self) -> u32 {
        self.last_seen_seq
    }

    pub(crate) fn bump_infection(&mut self) {
        self.infection_count = self.infection_count.saturating_add(1);
    }

    pub(crate) fn reset_infection(&mut self) {
        self.infection_count = 0;
    }

    pub(crate) fn mark_pinged(&mut self) {
        self.pinged_count = self.pinged_count.saturating_add(1);
    }

    /// Moves the member to `state`, restarting its dissemination if the
    /// state actually changed. Returns the previous state on change.
    pub(crate) fn transition(&mut self, state: PeerState) -> Option<PeerState> {
        let previous = self.peer.state();
        if previous == state {
            return None;
        }

        self.peer.set_state(state);
        self.reset_infection();
        Some(previous)
    }

    pub fn is_causal(&self, seq: u32) -> bool {
        seq > self.last_seen_seq
    }

    pub(crate) fn observe_seq(&mut self, seq: u32) {
        self.last_seen_seq = self.last_seen_seq.max(seq);
    }
}

/// The membership table of a node, keyed by node id.
///
/// The local node is kept apart from the remote members so it is always
/// present. Remote members live in a `BTreeMap` which keeps iteration order
/// stable and seeded selections reproducible.
#[derive(Clone, Debug)]
pub struct MembershipList {
    local: Member,
    members: BTreeMap<NodeId, Member>,
}

impl MembershipList {
    pub fn new(local: Peer) -> Self {
        Self {
            local: Member::new_local(local),
            members: BTreeMap::new(),
        }
    }

    pub fn local_id(&self) -> NodeId {
        self.local.id()
    }

    pub fn local(&self) -> &Member {
        &self.local
    }

    pub(crate) fn local_mut(&mut self) -> &mut Member {
        &mut self.local
    }

    /// Number of members, the local node included.
    pub fn len(&self) -> usize {
        self.members.len() + 1
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id == self.local_id() || self.members.contains_key(&id)
    }

    pub fn get(&self, id: NodeId) -> Option<&Member> {
        if id == self.local_id() {
            return Some(&self.local);
        }
        self.members.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Option<&mut Member> {
        if id == self.local_id() {
            return Some(&mut self.local);
        }
        self.members.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        std::iter::once(&self.local).chain(self.members.values())
    }

    /// All members except the local node.
    pub fn remote(&self) -> impl Iterator<Item = &Member> {
        self.members.values()
    }

    /// Inserts a remote member. The local entry is only ever replaced
    /// through [`MembershipList::replace_local`].
    pub(crate) fn insert(&mut self, member: Member) -> bool {
        if member.id() == self.local_id() {
            return false;
        }
        self.members.insert(member.id(), member);
        true
    }

    /// Adds a bootstrap peer as `Alive` unless the id is already known.
    pub fn add_member(&mut self, address: NodeAddress) -> bool {
        if self.contains(address.id) {
            return false;
        }

        let pinged_count = self.min_pinged_count();
        let member =
            Member::new(Peer::new(address, PeerState::Alive)).with_pinged_count(pinged_count);
        self.insert(member);
        true
    }

    /// Lowest `pinged_count` among the remote members, `0` when there are none.
    pub fn min_pinged_count(&self) -> u32 {
        self.remote().map(|m| m.pinged_count()).min().unwrap_or(0)
    }

    pub fn count(&self, state: PeerState) -> usize {
        self.iter().filter(|m| m.state() == state).count()
    }

    pub fn state_of(&self, id: NodeId) -> Option<PeerState> {
        self.get(id).map(|m| m.state())
    }

    /// Accepts a message counter from `source` if it is newer than anything
    /// seen from it, or if `source` is unknown. Records the counter on
    /// acceptance.
    pub(crate) fn is_causal_or_new(&mut self, source: NodeId, seq: u32) -> bool {
        match self.get_mut(source) {
            Some(member) if !member.is_causal(seq) => false,
            Some(member) => {
                member.observe_seq(seq);
                true
            }
            None => true,
        }
    }

    /// Records `seq` for `source` if it became known after the causal check.
    pub(crate) fn observe_seq(&mut self, source: NodeId, seq: u32) {
        if let Some(member) = self.get_mut(source) {
            member.observe_seq(seq);
        }
    }

    /// Replaces the local entry with a fresh `Alive` one at `address`,
    /// carrying the incarnation over plus one.
    pub(crate) fn replace_local(&mut self, address: NodeAddress) -> &Member {
        let incarnation = self.local.incarnation().saturating_add(1);
        self.members.remove(&address.id);

        let local = Peer::new(address, PeerState::Alive).with_incarnation(incarnation);
        self.local = Member::new_local(local);

        &self.local
    }

    pub fn snapshots(&self) -> Vec<PeerSnapshot> {
        self.iter().map(|m| m.peer().snapshot()).collect()
    }
}
