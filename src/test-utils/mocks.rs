use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::Result;
use crate::{core::transport::TransportLayer, pb::SwimMessage};

/// An in-process socket that records every sent datagram and hands out
/// datagrams injected through [`MockUdpSocket::deliver`].
#[derive(Clone, Debug)]
pub(crate) struct MockUdpSocket {
    transmitted: Arc<Mutex<Vec<(String, SwimMessage)>>>,
    inbound_tx: mpsc::UnboundedSender<Vec<u8>>,
    inbound_rx: Arc<Mutex<mpsc::UnboundedReceiver<Vec<u8>>>>,
}

impl MockUdpSocket {
    pub(crate) fn new() -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();

        Self {
            transmitted: Arc::new(Mutex::new(vec![])),
            inbound_tx,
            inbound_rx: Arc::new(Mutex::new(inbound_rx)),
        }
    }

    pub(crate) async fn transmitted(&self) -> Vec<(String, SwimMessage)> {
        let tx = self.transmitted.lock().await;
        (*tx).clone()
    }

    pub(crate) async fn deliver(&self, message: &SwimMessage) {
        self.deliver_bytes(message.to_bytes()).await;
    }

    pub(crate) async fn deliver_bytes(&self, buf: Vec<u8>) {
        let _ = self.inbound_tx.send(buf);
        tokio::task::yield_now().await;
    }
}

#[async_trait]
impl TransportLayer for MockUdpSocket {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        let mut rx = self.inbound_rx.lock().await;

        match rx.recv().await {
            Some(datagram) => {
                let len = datagram.len().min(buf.len());
                buf[..len].copy_from_slice(&datagram[..len]);
                Ok(len)
            }
            None => std::future::pending().await,
        }
    }

    async fn send_to(&self, buf: &[u8], target: &str) -> Result<usize> {
        let message = SwimMessage::from_bytes(buf)?;
        let mut tx = self.transmitted.lock().await;
        tx.push((target.to_string(), message));

        Ok(buf.len())
    }

    fn local_addr(&self) -> Result<String> {
        Ok("MockUdpSocket".to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        core::transport::TransportLayer,
        pb::{swim_message::Action, NodeAddress, SwimMessage},
        test_utils::mocks::MockUdpSocket,
    };

    fn create_message() -> SwimMessage {
        SwimMessage::new(NodeAddress::new(1, "NODE_A"), Action::new_ping(vec![], 1, 1))
    }

    #[tokio::test]
    async fn test_mock_udp_socket_send_to() {
        let socket = MockUdpSocket::new();
        let message = create_message();

        socket
            .send_to(&message.to_bytes(), "test_socket")
            .await
            .unwrap();

        let transmitted = socket.transmitted().await;
        assert_eq!(transmitted[0], ("test_socket".to_string(), message));
    }

    #[tokio::test]
    async fn test_mock_udp_socket_recv() {
        let socket = MockUdpSocket::new();
        let message = create_message();
        socket.deliver(&message).await;

        let mut buf = [0u8; 1536];
        let len = socket.recv(&mut buf).await.unwrap();

        assert_eq!(SwimMessage::from_bytes(&buf[..len]).unwrap(), message);
    }
}
