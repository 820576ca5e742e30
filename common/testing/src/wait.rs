// Licensed under the Apache-2.0 license

//! Condition polling for device state transitions.

use anyhow::{bail, Result};
use std::time::Duration;

/// Attempt count and fixed inter-attempt delay for a poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOptions {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for PollOptions {
    fn default() -> Self {
        // 20 x 30s covers a full flash-and-boot cycle on the slowest
        // supported device types.
        PollOptions {
            attempts: 20,
            delay: Duration::from_secs(30),
        }
    }
}

impl PollOptions {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        PollOptions { attempts, delay }
    }
}

/// Polls `condition` with the default window until it returns `true`.
///
/// With `reject_on_end` set, exhausting the attempts is an error; otherwise
/// the poll settles and reports `Ok(false)`. An `Err` from the predicate is
/// not retried and aborts the poll immediately.
pub fn wait_until<F>(condition: F, reject_on_end: bool) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    wait_until_with(condition, reject_on_end, PollOptions::default())
}

/// Same as [`wait_until`] with an explicit polling window.
pub fn wait_until_with<F>(mut condition: F, reject_on_end: bool, opts: PollOptions) -> Result<bool>
where
    F: FnMut() -> Result<bool>,
{
    if opts.attempts == 0 {
        bail!("polling window has no attempts");
    }
    for attempt in 1..=opts.attempts {
        if condition()? {
            return Ok(true);
        }
        if attempt < opts.attempts {
            std::thread::sleep(opts.delay);
        }
    }
    if reject_on_end {
        bail!("condition did not hold after {} attempts", opts.attempts);
    }
    Ok(false)
}
