//! Pre-commit middleware pipeline
//!
//! Provides [`Middleware`], a hook that can rewrite or veto a pending write
//! before it touches the tree.

use crate::action::Action;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};
use warden_bus::isolate;

/// Pre-commit hook
///
/// # Contract
/// - `Ok(Some(action))` passes the (possibly rewritten) action on
/// - `Ok(None)` vetoes the write: no mutation, history entry or notification
/// - `Err(_)` or a panic is logged and the stage counts as a pass-through of
///   its input
///
/// Writes and resets issued from inside a middleware stage are queued
/// behind the write being processed.
pub trait Middleware: Send + Sync {
    /// Inspect or rewrite a pending action
    ///
    /// # Errors
    /// Any error is logged by the store and treated as a pass-through.
    fn handle(&self, action: Action, state: &Value) -> anyhow::Result<Option<Action>>;

    /// Name used in logs
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Middleware for F
where
    F: Fn(Action, &Value) -> anyhow::Result<Option<Action>> + Send + Sync,
{
    fn handle(&self, action: Action, state: &Value) -> anyhow::Result<Option<Action>> {
        self(action, state)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Wrap a closure as a shareable [`Middleware`]
#[inline]
pub fn middleware_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: Fn(Action, &Value) -> anyhow::Result<Option<Action>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Result of running the pipeline
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Verdict {
    /// Commit this action
    Commit(Action),
    /// A stage vetoed
    Veto {
        /// Index of the vetoing stage
        stage: usize,
    },
}

/// Ordered middleware stages
#[derive(Default, Clone)]
pub(crate) struct Pipeline {
    stages: Vec<Arc<dyn Middleware>>,
}

impl Pipeline {
    pub(crate) fn push(&mut self, middleware: Arc<dyn Middleware>) {
        self.stages.push(middleware);
    }

    pub(crate) fn len(&self) -> usize {
        self.stages.len()
    }

    /// Run every stage in registration order
    pub(crate) fn run(&self, mut action: Action, state: &Value) -> Verdict {
        for (stage, middleware) in self.stages.iter().enumerate() {
            let input = action.clone();
            match isolate(|| middleware.handle(action, state)) {
                Ok(Some(next)) => action = next,
                Ok(None) => {
                    debug!(
                        path = %input.path,
                        middleware = middleware.name(),
                        stage,
                        "write vetoed by middleware"
                    );
                    return Verdict::Veto { stage };
                }
                Err(failure) => {
                    warn!(
                        path = %input.path,
                        middleware = middleware.name(),
                        stage,
                        error = %failure,
                        "middleware failed, passing action through"
                    );
                    action = input;
                }
            }
        }
        Verdict::Commit(action)
    }
}
