use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::broadcast::{self, Receiver};
use tokio::task::JoinHandle;

use crate::core::event::Event;
use crate::core::node::SwimNode;
use crate::core::view::MembershipView;
use crate::error::Result;
use crate::init_tracing;
use crate::pb::{NodeAddress, NodeId};

use super::config::SwimConfig;

/// Capacity of the membership event channel.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A SWIM node bound to a UDP socket.
#[derive(Clone, Debug)]
pub struct SwimCluster {
    node: Arc<SwimNode<UdpSocket>>,
}

impl SwimCluster {
    /// Binds `addr` and prepares node `id`. The bound socket address becomes
    /// the node's endpoint, so port `0` may be used.
    pub async fn try_new(id: NodeId, addr: impl AsRef<str>, config: SwimConfig) -> Result<Self> {
        let socket = UdpSocket::bind(addr.as_ref()).await?;
        let (tx, _) = broadcast::channel::<Event>(EVENT_CHANNEL_CAPACITY);
        let node = Arc::new(SwimNode::try_new(id, socket, config, tx)?);

        Ok(Self { node })
    }

    pub fn addr(&self) -> &str {
        self.node.addr()
    }

    pub fn id(&self) -> NodeId {
        self.node.id()
    }

    /// The address other nodes use to reach this one.
    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.node.id(), self.node.addr())
    }

    pub fn config(&self) -> &SwimConfig {
        self.node.config()
    }

    pub fn subscribe(&self) -> Receiver<Event> {
        self.node.subscribe()
    }

    pub fn membership(&self) -> &MembershipView {
        self.node.membership()
    }

    /// Returns the subset of `candidates` this node currently sees as `Alive`.
    pub async fn nat_liveness(&self, candidates: Vec<NodeAddress>) -> Result<Vec<NodeAddress>> {
        self.node.nat_liveness(candidates).await
    }

    /// Replaces the gossiped address of this node, e.g. after its NAT
    /// parents changed.
    pub fn update_self_address(&self, address: NodeAddress) -> Result<()> {
        self.node.update_self_address(address)
    }

    pub async fn run(&self) -> Result<(JoinHandle<()>, JoinHandle<()>)> {
        init_tracing();

        tracing::info!("[{}] starting SwimNode on {}...", self.node.id(), self.node.addr());
        self.node.run().await
    }

    pub async fn stop(&self) {
        self.node.stop().await
    }
}
