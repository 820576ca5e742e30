// Licensed under the Apache-2.0 license

//! Shared support for the HIL suites.
//!
//! This crate provides the plumbing every suite leans on: the condition
//! poller used to wait for device state transitions, the SSH transport to
//! the device under test, the teardown stack, the artifact archiver, and
//! the suite configuration.

pub mod archiver;
pub mod config;
pub mod ssh;
pub mod teardown;
pub mod wait;

pub use archiver::Archiver;
pub use config::{NetworkConfig, SuiteConfig, WirelessConfig};
pub use teardown::Teardown;
pub use wait::{wait_until, wait_until_with, PollOptions};
