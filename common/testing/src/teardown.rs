// Licensed under the Apache-2.0 license

//! Cleanup hooks, run in reverse registration order.

use anyhow::Result;

type Hook = Box<dyn FnOnce() -> Result<()> + Send>;

/// A LIFO stack of cleanup actions.
///
/// Hook failures are logged and swallowed so later hooks still run. Any
/// hooks still registered when the stack is dropped run at that point.
#[derive(Default)]
pub struct Teardown {
    hooks: Vec<(String, Hook)>,
}

impl Teardown {
    pub fn new() -> Self {
        Teardown::default()
    }

    pub fn register<F>(&mut self, label: &str, hook: F)
    where
        F: FnOnce() -> Result<()> + Send + 'static,
    {
        self.hooks.push((label.to_string(), Box::new(hook)));
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Runs all registered hooks, most recent first.
    pub fn run(&mut self) {
        while let Some((label, hook)) = self.hooks.pop() {
            log::info!("teardown: {label}");
            if let Err(err) = hook() {
                log::warn!("teardown '{label}' failed: {err:?}");
            }
        }
    }
}

impl Drop for Teardown {
    fn drop(&mut self) {
        self.run();
    }
}
