use prost::Message;
use snafu::location;

use crate::error::{Error, Result};
use crate::pb::{
    swim_message::Action, IndirectPing, IndirectPong, NodeAddress, PeerSnapshot, Ping, Pong,
    StartIndirectPing, Status, StopIndirectPing, SwimMessage,
};

use super::runtime::TimerToken;

impl Action {
    pub fn new_ping(piggyback: Vec<PeerSnapshot>, failure_timeout: TimerToken, seq: u32) -> Self {
        Action::Ping(Ping {
            piggyback,
            failure_timeout,
            seq,
        })
    }

    pub fn new_pong(piggyback: Vec<PeerSnapshot>, failure_timeout: TimerToken, seq: u32) -> Self {
        Action::Pong(Pong {
            piggyback,
            failure_timeout,
            seq,
        })
    }

    pub fn new_start_indirect_ping(
        initiator: PeerSnapshot,
        suspected: PeerSnapshot,
        dead_timeout: TimerToken,
        seq: u32,
    ) -> Self {
        Action::StartIndirectPing(StartIndirectPing {
            initiator: Some(initiator),
            suspected: Some(suspected),
            dead_timeout,
            seq,
        })
    }

    pub fn new_indirect_ping(
        indirect_requester: PeerSnapshot,
        dead_timeout: TimerToken,
        seq: u32,
    ) -> Self {
        Action::IndirectPing(IndirectPing {
            indirect_requester: Some(indirect_requester),
            dead_timeout,
            seq,
        })
    }

    pub fn new_indirect_pong(
        initiator: PeerSnapshot,
        suspected: PeerSnapshot,
        dead_timeout: TimerToken,
        seq: u32,
    ) -> Self {
        Action::IndirectPong(IndirectPong {
            initiator: Some(initiator),
            suspected: Some(suspected),
            dead_timeout,
            seq,
        })
    }

    pub fn new_stop_indirect_ping(suspected: PeerSnapshot, dead_timeout: TimerToken, seq: u32) -> Self {
        Action::StopIndirectPing(StopIndirectPing {
            suspected: Some(suspected),
            dead_timeout,
            seq,
        })
    }

    pub fn new_status(received_ping_count: u32, dead_count: u32, alive_count: u32) -> Self {
        Action::Status(Status {
            received_ping_count,
            dead_count,
            alive_count,
        })
    }

    /// Sequence number of protocol messages. `Status` carries none.
    pub fn seq(&self) -> Option<u32> {
        match self {
            Action::Ping(v) => Some(v.seq),
            Action::Pong(v) => Some(v.seq),
            Action::StartIndirectPing(v) => Some(v.seq),
            Action::IndirectPing(v) => Some(v.seq),
            Action::IndirectPong(v) => Some(v.seq),
            Action::StopIndirectPing(v) => Some(v.seq),
            Action::Status(_) => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::Ping(_) => "PING",
            Action::Pong(_) => "PONG",
            Action::StartIndirectPing(_) => "START_INDIRECT_PING",
            Action::IndirectPing(_) => "INDIRECT_PING",
            Action::IndirectPong(_) => "INDIRECT_PONG",
            Action::StopIndirectPing(_) => "STOP_INDIRECT_PING",
            Action::Status(_) => "STATUS",
        }
    }
}

impl SwimMessage {
    pub fn new(from: NodeAddress, action: Action) -> Self {
        Self {
            from: Some(from),
            action: Some(action),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode_to_vec()
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let message = SwimMessage::decode(buf)?;
        if message.from.is_none() || message.action.is_none() {
            return Err(Error::InvalidData {
                message: "SwimMessage must contain 'from' and 'action'".to_string(),
                location: location!(),
            });
        }

        Ok(message)
    }
}
