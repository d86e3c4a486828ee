//! # Runtime Module
//!
//! The protocol state machine never performs I/O itself. Every effect it
//! produces (sending a message, scheduling or cancelling a timeout,
//! reporting a membership change) is handed to a [`Runtime`].
use std::collections::VecDeque;
use std::time::Duration;

use crate::pb::{NodeAddress, SwimMessage};

use super::event::Event;

/// Opaque identity of a scheduled timeout.
pub type TimerToken = u64;

/// Sink for the effects of the protocol state machine.
pub trait Runtime {
    /// Sends `message` to `to`. Delivery is best effort.
    fn send_to(&mut self, to: NodeAddress, message: SwimMessage);

    /// Requests [`SwimProtocol::handle_timeout`](super::protocol::SwimProtocol::handle_timeout)
    /// to be called with `token` once `after` elapsed.
    fn submit_after(&mut self, token: TimerToken, after: Duration);

    /// Withdraws a timeout. Cancelling an unknown token is a no-op.
    fn cancel(&mut self, token: TimerToken);

    /// Reports a membership change.
    fn notify(&mut self, event: Event);
}

impl<T: Runtime + ?Sized> Runtime for &mut T {
    fn send_to(&mut self, to: NodeAddress, message: SwimMessage) {
        (**self).send_to(to, message)
    }

    fn submit_after(&mut self, token: TimerToken, after: Duration) {
        (**self).submit_after(token, after)
    }

    fn cancel(&mut self, token: TimerToken) {
        (**self).cancel(token)
    }

    fn notify(&mut self, event: Event) {
        (**self).notify(event)
    }
}

/// A [`Runtime`] that buffers every effect until it is drained.
#[derive(Clone, Debug, Default)]
pub struct AccumulatingRuntime {
    to_send: VecDeque<(NodeAddress, SwimMessage)>,
    to_schedule: VecDeque<(TimerToken, Duration)>,
    to_cancel: VecDeque<TimerToken>,
    events: VecDeque<Event>,
}

impl AccumulatingRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn to_send(&mut self) -> Option<(NodeAddress, SwimMessage)> {
        self.to_send.pop_front()
    }

    pub fn to_schedule(&mut self) -> Option<(TimerToken, Duration)> {
        self.to_schedule.pop_front()
    }

    pub fn to_cancel(&mut self) -> Option<TimerToken> {
        self.to_cancel.pop_front()
    }

    pub fn to_notify(&mut self) -> Option<Event> {
        self.events.pop_front()
    }

    /// Number of buffered effects of any kind.
    pub fn backlog(&self) -> usize {
        self.to_send.len() + self.to_schedule.len() + self.to_cancel.len() + self.events.len()
    }

    pub fn clear(&mut self) {
        self.to_send.clear();
        self.to_schedule.clear();
        self.to_cancel.clear();
        self.events.clear();
    }
}

impl Runtime for AccumulatingRuntime {
    fn send_to(&mut self, to: NodeAddress, message: SwimMessage) {
        self.to_send.push_back((to, message));
    }

    fn submit_after(&mut self, token: TimerToken, after: Duration) {
        self.to_schedule.push_back((token, after));
    }

    fn cancel(&mut self, token: TimerToken) {
        self.to_cancel.push_back(token);
    }

    fn notify(&mut self, event: Event) {
        self.events.push_back(event);
    }
}
