use std::fmt;
use std::hash::{Hash, Hasher};

use snafu::location;

use crate::error::{Error, Result};
use crate::pb::{NodeAddress, NodeId, PeerSnapshot, PeerState};

impl NodeAddress {
    pub fn new(id: NodeId, endpoint: impl Into<String>) -> Self {
        Self {
            id,
            endpoint: endpoint.into(),
            parents: vec![],
        }
    }

    pub fn with_parents(mut self, parents: impl IntoIterator<Item = NodeAddress>) -> Self {
        self.parents = parents.into_iter().collect();
        self
    }
}

impl<S: Into<String>> From<(NodeId, S)> for NodeAddress {
    fn from((id, endpoint): (NodeId, S)) -> Self {
        NodeAddress::new(id, endpoint)
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.id, self.endpoint)
    }
}

impl PeerSnapshot {
    pub fn new(address: NodeAddress, state: PeerState, incarnation: u32) -> Self {
        Self {
            address: Some(address),
            state: state as i32,
            incarnation,
        }
    }

    /// Node id of the snapshot, if it carries an address at all.
    pub fn id(&self) -> Option<NodeId> {
        self.address.as_ref().map(|a| a.id)
    }
}

/// A node address with the mutable state and incarnation known for it.
///
/// Two peers are equal when their node ids are equal, state and
/// incarnation never take part in identity.
#[derive(Clone, Debug)]
pub struct Peer {
    address: NodeAddress,
    state: PeerState,
    incarnation: u32,
}

impl Peer {
    pub fn new(address: NodeAddress, state: PeerState) -> Self {
        Self {
            address,
            state,
            incarnation: 0,
        }
    }

    pub fn with_incarnation(mut self, incarnation: u32) -> Self {
        self.incarnation = incarnation;
        self
    }

    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub fn id(&self) -> NodeId {
        self.address.id
    }

    pub fn state(&self) -> PeerState {
        self.state
    }

    pub fn set_state(&mut self, state: PeerState) {
        self.state = state;
    }

    pub fn incarnation(&self) -> u32 {
        self.incarnation
    }

    pub fn set_incarnation(&mut self, incarnation: u32) {
        self.incarnation = incarnation;
    }

    pub fn is(&self, state: PeerState) -> bool {
        self.state == state
    }

    /// Takes over the address, state and incarnation of `other`.
    /// The incarnation never goes backwards.
    pub(crate) fn overwrite_with(&mut self, other: &Peer) {
        self.address = other.address.clone();
        self.state = other.state;
        self.incarnation = self.incarnation.max(other.incarnation);
    }

    pub fn snapshot(&self) -> PeerSnapshot {
        PeerSnapshot::new(self.address.clone(), self.state, self.incarnation)
    }
}

impl PartialEq for Peer {
    fn eq(&self, other: &Self) -> bool {
        self.id() == other.id()
    }
}

impl Eq for Peer {}

impl Hash for Peer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id().hash(state);
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:?}#{}", self.id(), self.state, self.incarnation)
    }
}

impl TryFrom<&PeerSnapshot> for Peer {
    type Error = Error;

    fn try_from(value: &PeerSnapshot) -> Result<Self> {
        let address = value.address.clone().ok_or_else(|| Error::InvalidData {
            message: "PeerSnapshot must contain an 'address'".to_string(),
            location: location!(),
        })?;
        let state = PeerState::try_from(value.state)?;

        Ok(Peer::new(address, state).with_incarnation(value.incarnation))
    }
}

impl From<&Peer> for PeerSnapshot {
    fn from(peer: &Peer) -> Self {
        peer.snapshot()
    }
}
