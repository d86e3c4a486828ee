//! # Transport Layer Module
//!
//! This module defines the `TransportLayer` trait, which abstracts the datagram transport
//! used by a SWIM node. Delivery is best effort: datagrams may be lost, delayed or reordered.
use crate::error::Result;
use async_trait::async_trait;
use tokio::net::UdpSocket;

/// The `TransportLayer` trait abstracts the network transport layer.
#[async_trait]
pub trait TransportLayer: Send + Sync {
    /// Receives a single datagram into the provided buffer.
    async fn recv(&self, buf: &mut [u8]) -> Result<usize>;

    /// Sends a single datagram to the endpoint `target`.
    async fn send_to(&self, buf: &[u8], target: &str) -> Result<usize>;

    /// Retrieves the local address that the socket is bound to.
    fn local_addr(&self) -> Result<String>;
}

#[async_trait]
impl TransportLayer for UdpSocket {
    async fn recv(&self, buf: &mut [u8]) -> Result<usize> {
        Ok(self.recv(buf).await?)
    }

    async fn send_to(&self, buf: &[u8], target: &str) -> Result<usize> {
        Ok(self.send_to(buf, target).await?)
    }

    fn local_addr(&self) -> Result<String> {
        let addr = self.local_addr()?;
        Ok(addr.to_string())
    }
}
