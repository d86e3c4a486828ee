//! # Membership Protocol
//!
//! The per-node SWIM state machine. It owns the membership table, runs the
//! direct probe cycle, escalates unanswered probes through indirect probing
//! and folds every received piggyback into the local view.
//!
//! The state machine is synchronous and performs no I/O: all effects are
//! handed to a [`Runtime`], timeouts come back through
//! [`SwimProtocol::handle_timeout`]. Each handler runs to completion and
//! recovers from anything unexpected inline.
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::api::config::SwimConfig;
use crate::pb::{
    swim_message::Action, IndirectPing, IndirectPong, NodeAddress, NodeId, PeerSnapshot,
    PeerState, Ping, Pong, StartIndirectPing, Status, StopIndirectPing, SwimMessage,
};

use super::event::Event;
use super::member::MembershipList;
use super::merge::merge;
use super::peer::Peer;
use super::runtime::{Runtime, TimerToken};
use super::selection::{
    bump_infection_counters, select_indirect_probers, select_piggyback, select_ping_target,
};

/// A pending one-shot timeout and the peer it was scheduled for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Timeout {
    /// No PONG arrived from `target` in time.
    PingFailure { target: NodeId },
    /// No indirect probe vouched for `suspect` in time.
    Dead { suspect: NodeId },
}

pub struct SwimProtocol {
    members: MembershipList,
    config: Arc<SwimConfig>,
    rng: StdRng,
    sequence: u32,
    last_token: TimerToken,
    timeouts: HashMap<TimerToken, Timeout>,
    received_pings: u32,
}

impl SwimProtocol {
    pub fn new(address: NodeAddress, config: Arc<SwimConfig>) -> Self {
        let rng = match config.seed() {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let members = MembershipList::new(Peer::new(address, PeerState::Alive));

        Self {
            members,
            config,
            rng,
            sequence: 0,
            last_token: 0,
            timeouts: HashMap::new(),
            received_pings: 0,
        }
    }

    pub fn id(&self) -> NodeId {
        self.members.local_id()
    }

    pub fn address(&self) -> &NodeAddress {
        self.members.local().peer().address()
    }

    pub fn incarnation(&self) -> u32 {
        self.members.local().incarnation()
    }

    pub fn members(&self) -> &MembershipList {
        &self.members
    }

    pub fn config(&self) -> &SwimConfig {
        &self.config
    }

    /// The last sequence number used by this node.
    pub fn sequence(&self) -> u32 {
        self.sequence
    }

    pub fn received_pings(&self) -> u32 {
        self.received_pings
    }

    pub fn pending_timeout(&self, token: TimerToken) -> Option<Timeout> {
        self.timeouts.get(&token).copied()
    }

    pub fn pending_timeouts(&self) -> usize {
        self.timeouts.len()
    }

    /// Bumps the local incarnation and loads the bootstrap peers.
    pub fn start(&mut self) {
        let local = self.members.local_mut();
        let incarnation = local.incarnation().saturating_add(1);
        local.peer_mut().set_incarnation(incarnation);

        for peer in self.config.known_peers() {
            if self.members.add_member(peer.clone()) {
                tracing::info!("[{}] bootstrap node: {}", self.members.local_id(), peer);
            }
        }

        tracing::info!(
            "[{}] starting with incarnation {} and {} member(s)",
            self.id(),
            self.incarnation(),
            self.members.len()
        );
    }

    /// Runs one round of the direct probe cycle.
    pub fn handle_ping_tick(&mut self, runtime: &mut impl Runtime) {
        let local_id = self.id();
        let order = self.config.ping_target_order();

        let target = match select_ping_target(local_id, self.members.iter(), order, &mut self.rng) {
            Some(member) => member.peer().clone(),
            None => {
                tracing::debug!("[{}] no PING target available", local_id);
                return;
            }
        };

        let timeout = Timeout::PingFailure {
            target: target.id(),
        };
        let token = self.schedule(timeout, self.config.ping_timeout(), runtime);
        if let Some(member) = self.members.get_mut(target.id()) {
            member.mark_pinged();
        }

        let piggyback = self.select_piggyback();
        let piggyback = self.with_local(piggyback);
        let seq = self.next_seq();

        tracing::debug!(
            "[{}] sending PING to {} with {} entries",
            local_id,
            target,
            piggyback.len()
        );
        self.send(
            target.address().clone(),
            Action::new_ping(piggyback, token, seq),
            runtime,
        );
    }

    /// Sends the current [`Status`] to the aggregator, if one is configured.
    pub fn handle_status_tick(&mut self, runtime: &mut impl Runtime) {
        let Some(aggregator) = self.config.aggregator().cloned() else {
            return;
        };

        let status = self.status();
        tracing::info!(
            "[{}] sending status to aggregator {}: {:?}",
            self.id(),
            aggregator,
            status
        );
        self.send(aggregator, Action::Status(status), runtime);
    }

    pub fn handle_message(&mut self, message: SwimMessage, runtime: &mut impl Runtime) {
        let SwimMessage { from, action } = message;
        let (Some(from), Some(action)) = (from, action) else {
            tracing::warn!("[{}] dropping message without 'from' or 'action'", self.id());
            return;
        };

        let Some(seq) = action.seq() else {
            tracing::debug!("[{}] ignoring {} from {}", self.id(), action.name(), from);
            return;
        };

        if !self.members.is_causal_or_new(from.id, seq) {
            tracing::trace!(
                "[{}] dropping stale {} from {} with seq {}",
                self.id(),
                action.name(),
                from,
                seq
            );
            return;
        }

        tracing::debug!("[{}] handling {} from {}", self.id(), action.name(), from);

        match action {
            Action::Ping(v) => self.handle_ping(from, v, runtime),
            Action::Pong(v) => self.handle_pong(from, v, runtime),
            Action::StartIndirectPing(v) => self.handle_start_indirect_ping(v, runtime),
            Action::IndirectPing(v) => self.handle_indirect_ping(from, v, runtime),
            Action::IndirectPong(v) => self.handle_indirect_pong(v, runtime),
            Action::StopIndirectPing(v) => self.handle_stop_indirect_ping(v, runtime),
            Action::Status(_) => {}
        }
    }

    /// Fires the timeout identified by `token`. Unknown or cancelled tokens
    /// are ignored.
    pub fn handle_timeout(&mut self, token: TimerToken, runtime: &mut impl Runtime) {
        let Some(timeout) = self.timeouts.remove(&token) else {
            tracing::trace!("[{}] timeout {} is no longer pending", self.id(), token);
            return;
        };

        match timeout {
            Timeout::PingFailure { target } => self.handle_ping_failure(target, runtime),
            Timeout::Dead { suspect } => self.handle_dead_timeout(suspect, runtime),
        }
    }

    pub fn status(&self) -> Status {
        Status {
            received_ping_count: self.received_pings,
            dead_count: self.members.count(PeerState::Dead) as u32,
            alive_count: self.members.count(PeerState::Alive) as u32,
        }
    }

    /// Keeps the candidate parents that are currently `Alive` locally.
    pub fn nat_liveness(&self, candidates: &[NodeAddress]) -> Vec<NodeAddress> {
        candidates
            .iter()
            .filter(|c| self.members.state_of(c.id) == Some(PeerState::Alive))
            .cloned()
            .collect()
    }

    /// Replaces the local entry after the address or parent set of this
    /// node changed. The new entry is `Alive` with the next incarnation.
    pub fn update_self_address(&mut self, address: NodeAddress) {
        let previous = self.id();
        let local = self.members.replace_local(address);

        tracing::info!(
            "[{}] new address {} with {} parent(s), incarnation {}",
            previous,
            local.peer().address(),
            local.peer().address().parents.len(),
            local.incarnation()
        );
    }

    fn handle_ping(&mut self, from: NodeAddress, ping: Ping, runtime: &mut impl Runtime) {
        self.received_pings = self.received_pings.saturating_add(1);

        let piggyback = self.select_piggyback();
        self.apply_view(&ping.piggyback, runtime);
        self.members.observe_seq(from.id, ping.seq);

        let piggyback = self.with_local(piggyback);
        let seq = self.next_seq();
        tracing::debug!(
            "[{}] sending PONG to {} with {} entries",
            self.id(),
            from,
            piggyback.len()
        );
        self.send(
            from,
            Action::new_pong(piggyback, ping.failure_timeout, seq),
            runtime,
        );
    }

    fn handle_pong(&mut self, from: NodeAddress, pong: Pong, runtime: &mut impl Runtime) {
        if let Some(Timeout::PingFailure { .. }) = self.pending_timeout(pong.failure_timeout) {
            self.cancel(pong.failure_timeout, runtime);
        }

        self.apply_view(&pong.piggyback, runtime);
        self.members.observe_seq(from.id, pong.seq);
    }

    fn handle_start_indirect_ping(&mut self, msg: StartIndirectPing, runtime: &mut impl Runtime) {
        let (Some(initiator), Some(suspected)) = (msg.initiator, msg.suspected) else {
            tracing::warn!("[{}] START_INDIRECT_PING without peers", self.id());
            return;
        };
        let Some(target) = suspected.address else {
            tracing::warn!("[{}] START_INDIRECT_PING without suspect address", self.id());
            return;
        };

        let seq = self.next_seq();
        tracing::debug!("[{}] sending INDIRECT_PING to {}", self.id(), target);
        self.send(
            target,
            Action::new_indirect_ping(initiator, msg.dead_timeout, seq),
            runtime,
        );
    }

    fn handle_indirect_ping(&mut self, from: NodeAddress, msg: IndirectPing, runtime: &mut impl Runtime) {
        let Some(requester) = msg.indirect_requester else {
            tracing::warn!("[{}] INDIRECT_PING without requester", self.id());
            return;
        };

        let local = self.members.local().peer().snapshot();
        let seq = self.next_seq();
        tracing::debug!("[{}] sending INDIRECT_PONG to {}", self.id(), from);
        self.send(
            from,
            Action::new_indirect_pong(requester, local, msg.dead_timeout, seq),
            runtime,
        );
    }

    fn handle_indirect_pong(&mut self, msg: IndirectPong, runtime: &mut impl Runtime) {
        let (Some(initiator), Some(suspected)) = (msg.initiator, msg.suspected) else {
            tracing::warn!("[{}] INDIRECT_PONG without peers", self.id());
            return;
        };
        let Some(target) = initiator.address else {
            tracing::warn!("[{}] INDIRECT_PONG without initiator address", self.id());
            return;
        };

        let seq = self.next_seq();
        tracing::debug!("[{}] sending STOP_INDIRECT_PING to {}", self.id(), target);
        self.send(
            target,
            Action::new_stop_indirect_ping(suspected, msg.dead_timeout, seq),
            runtime,
        );
    }

    fn handle_stop_indirect_ping(&mut self, msg: StopIndirectPing, runtime: &mut impl Runtime) {
        let local_id = self.id();
        let Some(suspect) = msg.suspected.as_ref().and_then(PeerSnapshot::id) else {
            return;
        };

        // Only a pending dead timeout for this suspect can be answered.
        if self.pending_timeout(msg.dead_timeout) != Some(Timeout::Dead { suspect }) {
            tracing::debug!(
                "[{}] STOP_INDIRECT_PING for {} without a pending dead timeout",
                local_id,
                suspect
            );
            return;
        }
        self.cancel(msg.dead_timeout, runtime);

        let Some(member) = self.members.get_mut(suspect) else {
            return;
        };
        if member.transition(PeerState::Alive).is_some() {
            tracing::info!("[{}] {} was vouched for, ALIVE again", local_id, member.peer());
            let event = Event::new_node_recovered(local_id, member.id(), member.incarnation());
            runtime.notify(event);
        }
    }

    fn handle_ping_failure(&mut self, target: NodeId, runtime: &mut impl Runtime) {
        let local_id = self.id();

        let Some(member) = self.members.get_mut(target) else {
            tracing::debug!("[{}] PING to unknown node {} timed out", local_id, target);
            return;
        };

        match member.state() {
            PeerState::Dead => return,
            PeerState::Alive => {
                member.peer_mut().set_state(PeerState::Suspected);
                tracing::info!("[{}] no PONG from {}, SUSPECTED", local_id, member.peer());
                runtime.notify(Event::new_node_suspected(
                    local_id,
                    member.id(),
                    member.incarnation(),
                ));
            }
            PeerState::Suspected => {}
        }
        let suspected = member.peer().snapshot();

        let probers = select_indirect_probers(
            self.members.iter(),
            local_id,
            self.config.indirect_ping_group_size(),
            &mut self.rng,
        );
        if probers.is_empty() {
            tracing::info!("[{}] no indirect probers available for {}", local_id, target);
            return;
        }

        let timeout = Timeout::Dead { suspect: target };
        let token = self.schedule(timeout, self.config.dead_timeout(), runtime);
        let initiator = self.members.local().peer().snapshot();

        for prober in probers {
            let seq = self.next_seq();
            tracing::debug!(
                "[{}] sending START_INDIRECT_PING for {} to {}",
                local_id,
                target,
                prober
            );
            self.send(
                prober.address().clone(),
                Action::new_start_indirect_ping(initiator.clone(), suspected.clone(), token, seq),
                runtime,
            );
        }
    }

    fn handle_dead_timeout(&mut self, suspect: NodeId, runtime: &mut impl Runtime) {
        let local_id = self.id();

        let Some(member) = self.members.get_mut(suspect) else {
            return;
        };

        if member.transition(PeerState::Dead).is_some() {
            tracing::info!("[{}] declaring {} DEAD", local_id, member.peer());
            runtime.notify(Event::new_node_deceased(
                local_id,
                member.id(),
                member.incarnation(),
            ));
        }
    }

    /// Merges a received piggyback into the local table.
    fn apply_view(&mut self, piggyback: &[PeerSnapshot], runtime: &mut impl Runtime) {
        let local_id = self.id();
        let received: Vec<Peer> = piggyback
            .iter()
            .filter_map(|snapshot| match Peer::try_from(snapshot) {
                Ok(peer) => Some(peer),
                Err(e) => {
                    tracing::warn!("[{}] skipping piggyback entry: {}", local_id, e);
                    None
                }
            })
            .collect();

        let outcome = merge(&mut self.members, &received, self.config.merge_rules());

        if let Some(incarnation) = outcome.refuted {
            tracing::info!(
                "[{}] refuted rumour about itself, incarnation is now {}",
                local_id,
                incarnation
            );
        }

        for update in &outcome.updates {
            tracing::debug!(
                "[{}] merged {} {:?} -> {:?}#{}",
                local_id,
                update.id,
                update.previous,
                update.state,
                update.incarnation
            );
            if let Some(event) = Event::from_update(local_id, update) {
                runtime.notify(event);
            }
        }
    }

    /// Picks the remote entries of the next piggyback and counts them as
    /// disseminated once more.
    fn select_piggyback(&mut self) -> Vec<PeerSnapshot> {
        let selected = select_piggyback(
            self.members.remote(),
            self.config.piggyback_size().saturating_sub(1),
            self.config.max_infection_count(),
            self.config.piggyback_order(),
        );
        bump_infection_counters(&mut self.members, &selected);
        selected
    }

    /// Every piggyback leads with the current local entry.
    fn with_local(&self, mut piggyback: Vec<PeerSnapshot>) -> Vec<PeerSnapshot> {
        piggyback.insert(0, self.members.local().peer().snapshot());
        piggyback
    }

    fn next_seq(&mut self) -> u32 {
        self.sequence = self.sequence.saturating_add(1);
        self.sequence
    }

    fn schedule(&mut self, timeout: Timeout, after: Duration, runtime: &mut impl Runtime) -> TimerToken {
        self.last_token += 1;
        let token = self.last_token;

        self.timeouts.insert(token, timeout);
        runtime.submit_after(token, after);
        token
    }

    fn cancel(&mut self, token: TimerToken, runtime: &mut impl Runtime) {
        if self.timeouts.remove(&token).is_some() {
            runtime.cancel(token);
        }
    }

    fn send(&self, to: NodeAddress, action: Action, runtime: &mut impl Runtime) {
        runtime.send_to(to, SwimMessage::new(self.address().clone(), action));
    }
}
