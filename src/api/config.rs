use std::time::Duration;

use snafu::location;

use crate::core::merge::MergeRules;
use crate::core::selection::{PiggybackOrder, PingTargetOrder};
use crate::error::{Error, Result};
use crate::pb::NodeAddress;

/// Default interval between each PING message sent by a node.
const DEFAULT_PING_INTERVAL: Duration = Duration::from_millis(2000);

/// Default delay before the first PING message is sent.
const DEFAULT_PING_INITIAL_DELAY: Duration = Duration::from_millis(1000);

/// Default timeout for a PING message.
/// If no PONG is received within this duration, the node is considered `Suspected`.
const DEFAULT_PING_TIMEOUT: Duration = Duration::from_millis(1500);

/// Default timeout after which a `Suspected` node, that was not vouched for
/// by an indirect probe, is declared `Dead`.
const DEFAULT_DEAD_TIMEOUT: Duration = Duration::from_millis(10000);

/// Default maximum number of entries piggybacked on a PING or PONG.
const DEFAULT_PIGGYBACK_SIZE: usize = 10;

/// Default number of piggybacks an entry travels in before it stops being gossiped.
const DEFAULT_MAX_INFECTION_COUNT: u32 = 10;

/// Default number of nodes asked to probe a suspect indirectly.
const DEFAULT_INDIRECT_PING_GROUP_SIZE: usize = 2;

/// The buffer size for receiving new messages.
pub(crate) const DEFAULT_BUFFER_SIZE: usize = 65507;

/// Builder for creating a [`SwimConfig`] with customized settings for a SWIM protocol node.
/// Allows configuring timeouts, intervals, gossip bounds and known peers in the network.
#[derive(Clone, Debug)]
pub struct SwimConfigBuilder {
    /// Peers this node is bootstrapped with.
    known_peers: Vec<NodeAddress>,
    /// The duration between consecutive PING messages.
    ping_interval: Duration,
    /// The delay before the first PING message.
    ping_initial_delay: Duration,
    /// The duration to wait for a PONG after sending a PING.
    ping_timeout: Duration,
    /// The duration to wait for an indirect probe to vouch for a suspect.
    dead_timeout: Duration,
    /// The interval between status reports, if any.
    status_interval: Option<Duration>,
    /// The receiver of status reports, if any.
    aggregator: Option<NodeAddress>,
    /// The maximum number of entries per piggyback.
    piggyback_size: usize,
    /// The number of piggybacks an entry travels in at most.
    max_infection_count: u32,
    /// The number of other nodes asked to perform an indirect probe.
    indirect_ping_group_size: usize,
    /// Seed of the random number generator, random if `None`.
    seed: Option<u64>,
    piggyback_order: PiggybackOrder,
    ping_target_order: PingTargetOrder,
    merge_rules: MergeRules,
}

impl SwimConfigBuilder {
    /// Creates a new [`SwimConfigBuilder`] with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Consumes the builder and returns a fully constructed [`SwimConfig`].
    pub fn build(self) -> SwimConfig {
        SwimConfig {
            known_peers: self.known_peers,
            ping_interval: self.ping_interval,
            ping_initial_delay: self.ping_initial_delay,
            ping_timeout: self.ping_timeout,
            dead_timeout: self.dead_timeout,
            status_interval: self.status_interval,
            aggregator: self.aggregator,
            piggyback_size: self.piggyback_size,
            max_infection_count: self.max_infection_count,
            indirect_ping_group_size: self.indirect_ping_group_size,
            seed: self.seed,
            piggyback_order: self.piggyback_order,
            ping_target_order: self.ping_target_order,
            merge_rules: self.merge_rules,
        }
    }

    /// Sets the known peers for this node in the cluster.
    pub fn with_known_peers<T>(mut self, known_peers: T) -> Self
    where
        T: IntoIterator,
        T::Item: Into<NodeAddress>,
    {
        self.known_peers = known_peers.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the interval between each PING message sent by this node.
    pub fn with_ping_interval(mut self, ping_interval: Duration) -> Self {
        self.ping_interval = ping_interval;
        self
    }

    /// Sets the delay before the first PING message.
    pub fn with_ping_initial_delay(mut self, ping_initial_delay: Duration) -> Self {
        self.ping_initial_delay = ping_initial_delay;
        self
    }

    /// Sets the timeout for awaiting a PONG to a PING message.
    pub fn with_ping_timeout(mut self, ping_timeout: Duration) -> Self {
        self.ping_timeout = ping_timeout;
        self
    }

    /// Sets the timeout after which an unconfirmed suspect is declared dead.
    pub fn with_dead_timeout(mut self, dead_timeout: Duration) -> Self {
        self.dead_timeout = dead_timeout;
        self
    }

    /// Enables periodic status reports sent to `aggregator`.
    pub fn with_status_reports(mut self, aggregator: NodeAddress, interval: Duration) -> Self {
        self.aggregator = Some(aggregator);
        self.status_interval = Some(interval);
        self
    }

    /// Sets the maximum number of entries piggybacked on a message.
    /// The local entry always travels and counts towards it, so the size must be at least 1.
    pub fn with_piggyback_size(mut self, piggyback_size: usize) -> Self {
        self.piggyback_size = piggyback_size;
        self
    }

    /// Sets how many piggybacks an entry travels in before it stops being gossiped.
    pub fn with_max_infection_count(mut self, max_infection_count: u32) -> Self {
        self.max_infection_count = max_infection_count;
        self
    }

    /// Sets the number of nodes involved in an indirect probe when a node is suspected.
    pub fn with_indirect_ping_group_size(mut self, indirect_ping_group_size: usize) -> Self {
        self.indirect_ping_group_size = indirect_ping_group_size;
        self
    }

    /// Seeds the random number generator for reproducible runs.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_piggyback_order(mut self, piggyback_order: PiggybackOrder) -> Self {
        self.piggyback_order = piggyback_order;
        self
    }

    pub fn with_ping_target_order(mut self, ping_target_order: PingTargetOrder) -> Self {
        self.ping_target_order = ping_target_order;
        self
    }

    pub fn with_merge_rules(mut self, merge_rules: MergeRules) -> Self {
        self.merge_rules = merge_rules;
        self
    }
}

impl Default for SwimConfigBuilder {
    fn default() -> Self {
        Self {
            known_peers: vec![],
            ping_interval: DEFAULT_PING_INTERVAL,
            ping_initial_delay: DEFAULT_PING_INITIAL_DELAY,
            ping_timeout: DEFAULT_PING_TIMEOUT,
            dead_timeout: DEFAULT_DEAD_TIMEOUT,
            status_interval: None,
            aggregator: None,
            piggyback_size: DEFAULT_PIGGYBACK_SIZE,
            max_infection_count: DEFAULT_MAX_INFECTION_COUNT,
            indirect_ping_group_size: DEFAULT_INDIRECT_PING_GROUP_SIZE,
            seed: None,
            piggyback_order: PiggybackOrder::default(),
            ping_target_order: PingTargetOrder::default(),
            merge_rules: MergeRules::default(),
        }
    }
}

/// Configuration for a SWIM protocol node,
/// used to store parameters such as timeouts, intervals, gossip bounds and known peers.
#[derive(Clone, Debug)]
pub struct SwimConfig {
    known_peers: Vec<NodeAddress>,
    ping_interval: Duration,
    ping_initial_delay: Duration,
    ping_timeout: Duration,
    dead_timeout: Duration,
    status_interval: Option<Duration>,
    aggregator: Option<NodeAddress>,
    piggyback_size: usize,
    max_infection_count: u32,
    indirect_ping_group_size: usize,
    seed: Option<u64>,
    piggyback_order: PiggybackOrder,
    ping_target_order: PingTargetOrder,
    merge_rules: MergeRules,
}

impl SwimConfig {
    /// Creates a new [`SwimConfig`] with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a new [`SwimConfigBuilder`] to construct a [`SwimConfig`].
    pub fn builder() -> SwimConfigBuilder {
        SwimConfigBuilder::new()
    }

    /// Returns the bootstrap peers of the node.
    pub fn known_peers(&self) -> &[NodeAddress] {
        &self.known_peers
    }

    /// Returns the interval between PING messages.
    pub fn ping_interval(&self) -> Duration {
        self.ping_interval
    }

    /// Returns the delay before the first PING message.
    pub fn ping_initial_delay(&self) -> Duration {
        self.ping_initial_delay
    }

    /// Returns the timeout for awaiting a PONG to a PING message.
    pub fn ping_timeout(&self) -> Duration {
        self.ping_timeout
    }

    /// Returns the timeout after which an unconfirmed suspect is declared dead.
    pub fn dead_timeout(&self) -> Duration {
        self.dead_timeout
    }

    /// Returns the interval between status reports, if enabled.
    pub fn status_interval(&self) -> Option<Duration> {
        self.status_interval
    }

    /// Returns the receiver of status reports, if enabled.
    pub fn aggregator(&self) -> Option<&NodeAddress> {
        self.aggregator.as_ref()
    }

    pub fn piggyback_size(&self) -> usize {
        self.piggyback_size
    }

    pub fn max_infection_count(&self) -> u32 {
        self.max_infection_count
    }

    pub fn indirect_ping_group_size(&self) -> usize {
        self.indirect_ping_group_size
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    pub fn piggyback_order(&self) -> PiggybackOrder {
        self.piggyback_order
    }

    pub fn ping_target_order(&self) -> PingTargetOrder {
        self.ping_target_order
    }

    pub fn merge_rules(&self) -> &MergeRules {
        &self.merge_rules
    }

    /// Rejects settings a node cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.ping_interval.is_zero() {
            return Err(invalid("ping interval must be greater than zero"));
        }
        if self.status_interval.is_some_and(|interval| interval.is_zero()) {
            return Err(invalid("status interval must be greater than zero"));
        }
        if self.piggyback_size == 0 {
            return Err(invalid("piggyback size must be at least 1"));
        }

        Ok(())
    }
}

fn invalid(message: &str) -> Error {
    Error::InvalidData {
        message: message.to_string(),
        location: location!(),
    }
}

impl Default for SwimConfig {
    fn default() -> Self {
        SwimConfigBuilder::new().build()
    }
}
