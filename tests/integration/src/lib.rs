// Licensed under the Apache-2.0 license

//! HIL suites for the host OS distribution.
//!
//! Every test here drives a real (or qemu-emulated) device through the
//! worker and cloud clients, so they are `#[ignore]`d by default and
//! expected to run through `cargo xtask run`, which exports the suite
//! configuration and executes the ignored tests serially.

mod test_chrony;
mod test_hup;
mod test_ssh_auth;

#[cfg(test)]
mod suite;
