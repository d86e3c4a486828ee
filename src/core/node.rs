//! # Node Module
//!
//! A `SwimNode` runs one [`SwimProtocol`] as a single actor task. Received
//! datagrams, fired timeouts, periodic ticks and NAT calls are queued into
//! the actor's inbox and handled strictly one after another; the effects
//! of each input are then flushed to the transport, the timer tasks, the
//! event channel and the shared [`MembershipView`].
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use snafu::location;
use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::api::config::{SwimConfig, DEFAULT_BUFFER_SIZE};
use crate::error::{Error, Result};
use crate::pb::{NodeAddress, NodeId, SwimMessage};

use super::event::Event;
use super::protocol::SwimProtocol;
use super::runtime::{AccumulatingRuntime, TimerToken};
use super::transport::TransportLayer;
use super::utils::send_message;
use super::view::MembershipView;

/// Inputs handled by the node actor.
#[derive(Debug)]
pub(crate) enum Input {
    Datagram(SwimMessage),
    Timeout(TimerToken),
    NatLiveness {
        candidates: Vec<NodeAddress>,
        reply: oneshot::Sender<Vec<NodeAddress>>,
    },
    SelfAddressChanged(NodeAddress),
}

pub struct SwimNode<T: TransportLayer + 'static> {
    addr: String,
    id: NodeId,
    socket: Arc<T>,
    config: Arc<SwimConfig>,
    inbox: mpsc::UnboundedSender<Input>,
    pending: Mutex<Option<(SwimProtocol, mpsc::UnboundedReceiver<Input>)>>,
    tasks: Mutex<Vec<AbortHandle>>,
    view: MembershipView,
    tx: broadcast::Sender<Event>,
}

impl<T: TransportLayer + 'static> SwimNode<T> {
    pub fn try_new(
        id: NodeId,
        socket: T,
        config: SwimConfig,
        tx: broadcast::Sender<Event>,
    ) -> Result<Self> {
        config.validate()?;
        let addr = socket.local_addr()?;
        let config = Arc::new(config);
        let protocol = SwimProtocol::new(NodeAddress::new(id, addr.clone()), config.clone());

        let view = MembershipView::new();
        view.sync(protocol.members());

        let (inbox, rx) = mpsc::unbounded_channel();

        Ok(Self {
            addr,
            id,
            socket: Arc::new(socket),
            config,
            inbox,
            pending: Mutex::new(Some((protocol, rx))),
            tasks: Mutex::new(Vec::new()),
            view,
            tx,
        })
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn config(&self) -> &SwimConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn membership(&self) -> &MembershipView {
        &self.view
    }

    /// Filters `candidates` down to the ones this node currently sees as `Alive`.
    ///
    /// Resolves once the node is running.
    pub async fn nat_liveness(&self, candidates: Vec<NodeAddress>) -> Result<Vec<NodeAddress>> {
        let (reply, rx) = oneshot::channel();
        self.submit(Input::NatLiveness { candidates, reply })?;

        rx.await.map_err(|e| Error::Internal {
            message: format!("node dropped NAT liveness request: {e}"),
            location: location!(),
        })
    }

    /// Announces a new address or parent set for this node.
    pub fn update_self_address(&self, address: NodeAddress) -> Result<()> {
        self.submit(Input::SelfAddressChanged(address))
    }

    /// Spawns the actor and the receive loop. A node can only be run once.
    pub async fn run(&self) -> Result<(JoinHandle<()>, JoinHandle<()>)> {
        let Some((protocol, inbox)) = self.pending.lock().await.take() else {
            return Err(Error::Internal {
                message: format!("node {} is already running", self.id),
                location: location!(),
            });
        };

        let actor = NodeActor {
            protocol,
            config: self.config.clone(),
            socket: self.socket.clone(),
            inbox: self.inbox.clone(),
            runtime: AccumulatingRuntime::new(),
            timers: HashMap::new(),
            view: self.view.clone(),
            tx: self.tx.clone(),
        };
        let actor_handle = tokio::spawn(actor.run(inbox));
        let recv_handle = self.dispatch();

        let mut tasks = self.tasks.lock().await;
        tasks.push(actor_handle.abort_handle());
        tasks.push(recv_handle.abort_handle());

        Ok((actor_handle, recv_handle))
    }

    /// Aborts the actor, its outstanding timeouts and the receive loop.
    pub async fn stop(&self) {
        tracing::info!("[{}] stopping node", self.id);

        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }

    fn submit(&self, input: Input) -> Result<()> {
        self.inbox.send(input).map_err(|_| Error::Internal {
            message: format!("node {} is no longer running", self.id),
            location: location!(),
        })
    }

    fn dispatch(&self) -> JoinHandle<()> {
        let id = self.id;
        let socket = self.socket.clone();
        let inbox = self.inbox.clone();

        tokio::spawn(async move {
            let mut buf = vec![0u8; DEFAULT_BUFFER_SIZE];

            loop {
                match socket.recv(&mut buf).await {
                    Ok(len) => match SwimMessage::from_bytes(&buf[..len]) {
                        Ok(message) => {
                            if inbox.send(Input::Datagram(message)).is_err() {
                                break;
                            }
                        }
                        Err(e) => tracing::warn!("[{}] error while decoding message: {}", id, e),
                    },
                    Err(e) => tracing::warn!("[{}] error while receiving message: {}", id, e),
                }
            }
        })
    }
}

impl<T: TransportLayer + 'static> std::fmt::Debug for SwimNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SwimNode")
            .field("addr", &self.addr)
            .field("id", &self.id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

struct NodeActor<T: TransportLayer + 'static> {
    protocol: SwimProtocol,
    config: Arc<SwimConfig>,
    socket: Arc<T>,
    inbox: mpsc::UnboundedSender<Input>,
    runtime: AccumulatingRuntime,
    timers: HashMap<TimerToken, JoinHandle<()>>,
    view: MembershipView,
    tx: broadcast::Sender<Event>,
}

impl<T: TransportLayer + 'static> NodeActor<T> {
    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Input>) {
        self.protocol.start();
        self.flush().await;

        let mut ping = interval_after(self.config.ping_initial_delay(), self.config.ping_interval());
        let mut status = self
            .config
            .status_interval()
            .map(|period| interval_after(period, period));

        loop {
            tokio::select! {
                _ = ping.tick() => self.protocol.handle_ping_tick(&mut self.runtime),
                _ = tick(&mut status) => self.protocol.handle_status_tick(&mut self.runtime),
                input = inbox.recv() => match input {
                    Some(input) => self.handle_input(input),
                    None => break,
                },
            }

            self.flush().await;
        }
    }

    fn handle_input(&mut self, input: Input) {
        match input {
            Input::Datagram(message) => self.protocol.handle_message(message, &mut self.runtime),
            Input::Timeout(token) => {
                self.timers.remove(&token);
                self.protocol.handle_timeout(token, &mut self.runtime);
            }
            Input::NatLiveness { candidates, reply } => {
                let alive = self.protocol.nat_liveness(&candidates);
                if reply.send(alive).is_err() {
                    tracing::debug!("[{}] NAT liveness requester is gone", self.protocol.id());
                }
            }
            Input::SelfAddressChanged(address) => self.protocol.update_self_address(address),
        }
    }

    /// Applies the effects buffered while handling the last input.
    async fn flush(&mut self) {
        let id = self.protocol.id();

        while let Some((to, message)) = self.runtime.to_send() {
            if let Err(e) = send_message(&*self.socket, &message, &to.endpoint).await {
                tracing::warn!("[{}] failed to send message to {}: {}", id, to, e);
            }
        }

        while let Some((token, after)) = self.runtime.to_schedule() {
            let inbox = self.inbox.clone();
            let handle = tokio::spawn(async move {
                tokio::time::sleep(after).await;
                let _ = inbox.send(Input::Timeout(token));
            });
            self.timers.insert(token, handle);
        }

        while let Some(token) = self.runtime.to_cancel() {
            if let Some(handle) = self.timers.remove(&token) {
                handle.abort();
            }
        }

        self.view.sync(self.protocol.members());

        while let Some(event) = self.runtime.to_notify() {
            // No subscribers is fine.
            let _ = self.tx.send(event);
        }
    }
}

impl<T: TransportLayer + 'static> Drop for NodeActor<T> {
    fn drop(&mut self) {
        for (_, handle) in self.timers.drain() {
            handle.abort();
        }
    }
}

fn interval_after(delay: Duration, period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + delay, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::sync::broadcast;

    use crate::api::config::SwimConfig;
    use crate::core::event::Event;
    use crate::pb::{swim_message::Action, NodeAddress, PeerSnapshot, PeerState, SwimMessage};
    use crate::test_utils::mocks::MockUdpSocket;

    use super::SwimNode;

    fn addr(id: u32) -> NodeAddress {
        NodeAddress::new(id, format!("NODE_{id}"))
    }

    fn create_node(socket: MockUdpSocket, known_peers: &[u32]) -> SwimNode<MockUdpSocket> {
        let config = SwimConfig::builder()
            .with_known_peers(known_peers.iter().map(|id| addr(*id)))
            .with_ping_initial_delay(Duration::from_millis(10))
            .with_ping_interval(Duration::from_millis(100))
            .with_ping_timeout(Duration::from_millis(50))
            .with_dead_timeout(Duration::from_millis(200))
            .with_seed(7)
            .build();
        let (tx, _) = broadcast::channel(32);

        SwimNode::try_new(1, socket, config, tx).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_sends_ping_to_known_peer() {
        let socket = MockUdpSocket::new();
        let node = create_node(socket.clone(), &[2]);

        node.run().await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let transmitted = socket.transmitted().await;
        let (target, message) = &transmitted[0];
        assert_eq!(target, "NODE_2");
        assert_eq!(message.from, Some(NodeAddress::new(1, "MockUdpSocket")));
        assert!(matches!(message.action, Some(Action::Ping(_))));

        node.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_answers_ping_and_updates_view() {
        let socket = MockUdpSocket::new();
        let node = create_node(socket.clone(), &[]);
        let mut rx = node.subscribe();

        node.run().await.unwrap();
        let piggyback = vec![PeerSnapshot::new(addr(2), PeerState::Alive, 1)];
        socket
            .deliver(&SwimMessage::new(addr(2), Action::new_ping(piggyback, 9, 1)))
            .await;

        let event = tokio::time::timeout(Duration::from_millis(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::NodeJoined(e) if e.new_member == 2));
        assert_eq!(node.membership().state_of(2), Some(PeerState::Alive));

        let transmitted = socket.transmitted().await;
        let (target, message) = &transmitted[0];
        assert_eq!(target, "NODE_2");
        assert!(matches!(&message.action, Some(Action::Pong(pong)) if pong.failure_timeout == 9));

        node.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_suspects_silent_peer() {
        let socket = MockUdpSocket::new();
        let node = create_node(socket.clone(), &[2]);
        let mut rx = node.subscribe();

        node.run().await.unwrap();

        let event = tokio::time::timeout(Duration::from_millis(100), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::NodeSuspected(e) if e.suspect == 2));
        assert_eq!(node.membership().state_of(2), Some(PeerState::Suspected));

        node.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_nat_liveness_and_address_change() {
        let socket = MockUdpSocket::new();
        let node = create_node(socket, &[2]);
        node.run().await.unwrap();

        let alive = node.nat_liveness(vec![addr(2), addr(3)]).await.unwrap();
        assert_eq!(alive, vec![addr(2)]);

        let relayed = NodeAddress::new(1, "RELAY").with_parents([addr(2)]);
        node.update_self_address(relayed.clone()).unwrap();
        node.nat_liveness(vec![]).await.unwrap();

        let local = node.membership().get(1).unwrap();
        assert_eq!(local.address, Some(relayed));
        assert_eq!(local.incarnation, 2);

        node.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_node_skips_malformed_datagram() {
        let socket = MockUdpSocket::new();
        let node = create_node(socket.clone(), &[]);
        let mut rx = node.subscribe();

        node.run().await.unwrap();
        socket.deliver_bytes(vec![0xff, 0xff, 0xff]).await;
        socket
            .deliver(&SwimMessage::new(addr(3), Action::new_ping(vec![], 4, 1)))
            .await;
        socket
            .deliver(&SwimMessage::new(addr(2), Action::new_pong(vec![], 4, 1)))
            .await;
        let piggyback = vec![PeerSnapshot::new(addr(3), PeerState::Alive, 1)];
        socket
            .deliver(&SwimMessage::new(addr(3), Action::new_ping(piggyback, 5, 2)))
            .await;

        let event = tokio::time::timeout(Duration::from_millis(10), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(event, Event::NodeJoined(e) if e.new_member == 3));

        let pongs = socket.transmitted().await;
        assert_eq!(pongs.len(), 2);

        node.stop().await;
    }

    #[tokio::test]
    async fn test_node_runs_once() {
        let node = create_node(MockUdpSocket::new(), &[]);

        assert!(node.run().await.is_ok());
        assert!(node.run().await.is_err());

        node.stop().await;
    }

    #[test]
    fn test_node_rejects_zero_periods() {
        let (tx, _) = broadcast::channel(32);

        let config = SwimConfig::builder()
            .with_status_reports(addr(9), Duration::ZERO)
            .build();
        assert!(SwimNode::try_new(1, MockUdpSocket::new(), config, tx.clone()).is_err());

        let config = SwimConfig::builder()
            .with_ping_interval(Duration::ZERO)
            .build();
        assert!(SwimNode::try_new(1, MockUdpSocket::new(), config, tx).is_err());
    }
}
