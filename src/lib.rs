use lazy_static::lazy_static;
use tracing_subscriber::EnvFilter;

pub mod api;

mod core;
pub use crate::core::event::{Event, NodeDeceased, NodeJoined, NodeRecovered, NodeSuspected};
pub use crate::core::member::{Member, MembershipList};
pub use crate::core::merge::{merge, IncarnationRule, MergeOutcome, MergeRules, MergeUpdate};
pub use crate::core::node::SwimNode;
pub use crate::core::peer::Peer;
pub use crate::core::protocol::{SwimProtocol, Timeout};
pub use crate::core::runtime::{AccumulatingRuntime, Runtime, TimerToken};
pub use crate::core::selection::{
    bump_infection_counters, select_indirect_probers, select_piggyback, select_ping_target,
    PiggybackOrder, PingTargetOrder,
};
pub use crate::core::transport::TransportLayer;
pub use crate::core::view::MembershipView;

pub mod error;
pub use error::Result;

#[cfg(any(test, feature = "test-util"))]
#[path = "./test-utils/mod.rs"]
#[doc(hidden)]
mod test_utils;

pub mod pb;

lazy_static! {
    static ref TRACING: () = {
        // A subscriber installed by the application takes precedence.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();
    };
}

fn init_tracing() {
    lazy_static::initialize(&TRACING);
}
