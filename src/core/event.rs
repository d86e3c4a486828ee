use crate::pb::{NodeId, PeerState};

use super::merge::MergeUpdate;

/// Membership changes observed by a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
    NodeJoined(NodeJoined),
    NodeSuspected(NodeSuspected),
    NodeRecovered(NodeRecovered),
    NodeDeceased(NodeDeceased),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeJoined {
    pub from: NodeId,
    pub new_member: NodeId,
    pub new_member_incarnation_no: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeSuspected {
    pub from: NodeId,
    pub suspect: NodeId,
    pub suspect_incarnation_no: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeRecovered {
    pub from: NodeId,
    pub recovered: NodeId,
    pub recovered_incarnation_no: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct NodeDeceased {
    pub from: NodeId,
    pub deceased: NodeId,
    pub deceased_incarnation_no: u32,
}

impl Event {
    pub(crate) fn new_node_joined(from: NodeId, new_member: NodeId, incarnation: u32) -> Self {
        Event::NodeJoined(NodeJoined {
            from,
            new_member,
            new_member_incarnation_no: incarnation,
        })
    }

    pub(crate) fn new_node_suspected(from: NodeId, suspect: NodeId, incarnation: u32) -> Self {
        Event::NodeSuspected(NodeSuspected {
            from,
            suspect,
            suspect_incarnation_no: incarnation,
        })
    }

    pub(crate) fn new_node_recovered(from: NodeId, recovered: NodeId, incarnation: u32) -> Self {
        Event::NodeRecovered(NodeRecovered {
            from,
            recovered,
            recovered_incarnation_no: incarnation,
        })
    }

    pub(crate) fn new_node_deceased(from: NodeId, deceased: NodeId, incarnation: u32) -> Self {
        Event::NodeDeceased(NodeDeceased {
            from,
            deceased,
            deceased_incarnation_no: incarnation,
        })
    }

    /// Event describing a state change of `id` from `previous` to `state`,
    /// if the change is worth reporting.
    pub(crate) fn from_transition(
        from: NodeId,
        id: NodeId,
        previous: Option<PeerState>,
        state: PeerState,
        incarnation: u32,
    ) -> Option<Self> {
        use PeerState::*;

        match (previous, state) {
            (None, _) => Some(Event::new_node_joined(from, id, incarnation)),
            (Some(Alive), Suspected) => Some(Event::new_node_suspected(from, id, incarnation)),
            (Some(Suspected | Dead), Alive) => Some(Event::new_node_recovered(from, id, incarnation)),
            (Some(Alive | Suspected), Dead) => Some(Event::new_node_deceased(from, id, incarnation)),
            _ => None,
        }
    }

    pub(crate) fn from_update(from: NodeId, update: &MergeUpdate) -> Option<Self> {
        Event::from_transition(
            from,
            update.id,
            update.previous,
            update.state,
            update.incarnation,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::core::merge::MergeUpdate;
    use crate::pb::PeerState;

    use super::Event;

    #[test]
    fn test_event_from_update() {
        let update = MergeUpdate {
            id: 2,
            previous: None,
            state: PeerState::Alive,
            incarnation: 1,
        };
        assert_eq!(
            Event::from_update(1, &update),
            Some(Event::new_node_joined(1, 2, 1))
        );

        let update = MergeUpdate {
            previous: Some(PeerState::Alive),
            ..update
        };
        assert_eq!(Event::from_update(1, &update), None);
    }

    #[test]
    fn test_event_from_transition() {
        use PeerState::*;

        assert_eq!(
            Event::from_transition(1, 2, Some(Alive), Suspected, 3),
            Some(Event::new_node_suspected(1, 2, 3))
        );
        assert_eq!(
            Event::from_transition(1, 2, Some(Dead), Alive, 3),
            Some(Event::new_node_recovered(1, 2, 3))
        );
        assert_eq!(
            Event::from_transition(1, 2, Some(Suspected), Dead, 3),
            Some(Event::new_node_deceased(1, 2, 3))
        );
        assert_eq!(Event::from_transition(1, 2, Some(Suspected), Suspected, 4), None);
    }
}
