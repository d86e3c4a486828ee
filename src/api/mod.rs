//! # SWIM API Module
//!
//! This module provides the primary API for running a SWIM membership node.
//!
//! ## Modules
//!
//! - [`config`]: Contains configuration structures and builders for customizing SWIM nodes.
//! - [`swim`]: Provides the `SwimCluster` struct for binding, running and querying a SWIM node.
pub mod config;
pub mod swim;
