//! Wire schema of the gossip protocol.
//!
//! Every datagram is a single protobuf encoded [`SwimMessage`]. The message
//! types are derived with `prost` directly instead of being generated from a
//! `.proto` file, so the crate builds without `protoc`.

/// Key of a node inside a membership table.
pub type NodeId = u32;

/// Opaque identity of a node on the network.
///
/// `id` is the stable key used for membership lookups, `endpoint` is the
/// socket address datagrams are sent to and `parents` is the relay set of a
/// node sitting behind a NAT.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct NodeAddress {
    #[prost(uint32, tag = "1")]
    pub id: u32,
    #[prost(string, tag = "2")]
    pub endpoint: ::prost::alloc::string::String,
    #[prost(message, repeated, tag = "3")]
    pub parents: ::prost::alloc::vec::Vec<NodeAddress>,
}

/// State of a peer as seen by a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
#[repr(i32)]
pub enum PeerState {
    Alive = 0,
    Suspected = 1,
    Dead = 2,
}

/// A peer together with the state and incarnation known by the sender.
#[derive(Clone, PartialEq, Eq, Hash, ::prost::Message)]
pub struct PeerSnapshot {
    #[prost(message, optional, tag = "1")]
    pub address: ::core::option::Option<NodeAddress>,
    #[prost(enumeration = "PeerState", tag = "2")]
    pub state: i32,
    #[prost(uint32, tag = "3")]
    pub incarnation: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Ping {
    #[prost(message, repeated, tag = "1")]
    pub piggyback: ::prost::alloc::vec::Vec<PeerSnapshot>,
    #[prost(uint64, tag = "2")]
    pub failure_timeout: u64,
    #[prost(uint32, tag = "3")]
    pub seq: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Pong {
    #[prost(message, repeated, tag = "1")]
    pub piggyback: ::prost::alloc::vec::Vec<PeerSnapshot>,
    #[prost(uint64, tag = "2")]
    pub failure_timeout: u64,
    #[prost(uint32, tag = "3")]
    pub seq: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StartIndirectPing {
    #[prost(message, optional, tag = "1")]
    pub initiator: ::core::option::Option<PeerSnapshot>,
    #[prost(message, optional, tag = "2")]
    pub suspected: ::core::option::Option<PeerSnapshot>,
    #[prost(uint64, tag = "3")]
    pub dead_timeout: u64,
    #[prost(uint32, tag = "4")]
    pub seq: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndirectPing {
    #[prost(message, optional, tag = "1")]
    pub indirect_requester: ::core::option::Option<PeerSnapshot>,
    #[prost(uint64, tag = "2")]
    pub dead_timeout: u64,
    #[prost(uint32, tag = "3")]
    pub seq: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct IndirectPong {
    #[prost(message, optional, tag = "1")]
    pub initiator: ::core::option::Option<PeerSnapshot>,
    #[prost(message, optional, tag = "2")]
    pub suspected: ::core::option::Option<PeerSnapshot>,
    #[prost(uint64, tag = "3")]
    pub dead_timeout: u64,
    #[prost(uint32, tag = "4")]
    pub seq: u32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct StopIndirectPing {
    #[prost(message, optional, tag = "1")]
    pub suspected: ::core::option::Option<PeerSnapshot>,
    #[prost(uint64, tag = "2")]
    pub dead_timeout: u64,
    #[prost(uint32, tag = "3")]
    pub seq: u32,
}

/// Periodic report pushed to an external aggregator.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Status {
    #[prost(uint32, tag = "1")]
    pub received_ping_count: u32,
    #[prost(uint32, tag = "2")]
    pub dead_count: u32,
    #[prost(uint32, tag = "3")]
    pub alive_count: u32,
}

/// Envelope of every datagram. `from` is the transport level source.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SwimMessage {
    #[prost(message, optional, tag = "1")]
    pub from: ::core::option::Option<NodeAddress>,
    #[prost(oneof = "swim_message::Action", tags = "2, 3, 4, 5, 6, 7, 8")]
    pub action: ::core::option::Option<swim_message::Action>,
}

pub mod swim_message {
    #[derive(Clone, PartialEq, ::prost::Oneof)]
    pub enum Action {
        #[prost(message, tag = "2")]
        Ping(super::Ping),
        #[prost(message, tag = "3")]
        Pong(super::Pong),
        #[prost(message, tag = "4")]
        StartIndirectPing(super::StartIndirectPing),
        #[prost(message, tag = "5")]
        IndirectPing(super::IndirectPing),
        #[prost(message, tag = "6")]
        IndirectPong(super::IndirectPong),
        #[prost(message, tag = "7")]
        StopIndirectPing(super::StopIndirectPing),
        #[prost(message, tag = "8")]
        Status(super::Status),
    }
}
