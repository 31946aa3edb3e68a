//! Post-commit hooks.
//!
//! A hook runs after the primary transaction has committed. Its failure is
//! logged and swallowed: the primary effect (stock received, goods sold) is
//! what the caller asked for, the hook's work is a convenience on top.

use std::sync::Arc;

use thiserror::Error;

/// Failure reported by a hook.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("post-commit hook `{hook}` failed: {message}")]
pub struct HookError {
    pub hook: &'static str,
    pub message: String,
}

impl HookError {
    pub fn new(hook: &'static str, message: impl Into<String>) -> Self {
        Self {
            hook,
            message: message.into(),
        }
    }
}

/// Reacts to a committed event.
pub trait PostCommitHook<E>: Send + Sync {
    /// Stable name used in logs.
    fn name(&self) -> &'static str;

    fn after_commit(&self, event: &E) -> Result<(), HookError>;
}

/// Ordered set of hooks notified after every commit.
pub struct HookRegistry<E> {
    hooks: Vec<Arc<dyn PostCommitHook<E>>>,
}

impl<E> HookRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn PostCommitHook<E>>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run every hook in registration order, returning the failures.
    ///
    /// A failing hook does not stop the remaining ones.
    pub fn notify(&self, event: &E) -> Vec<HookError>
    where
        E: core::fmt::Debug,
    {
        let mut failures = Vec::new();
        for hook in &self.hooks {
            if let Err(err) = hook.after_commit(event) {
                tracing::warn!(hook = hook.name(), error = %err, ?event, "post-commit hook failed");
                failures.push(err);
            }
        }
        failures
    }
}

impl<E> Default for HookRegistry<E> {
    fn default() -> Self {
        Self { hooks: Vec::new() }
    }
}
