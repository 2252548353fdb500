use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use crate::context::{AttemptContext, RequestDraft};
use crate::error::Error;
use crate::{BoxError, Result};

/// Signal returned by a middleware step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Hand the draft to the next step (or to the transport).
    Continue,
    /// Short-circuit: no further steps run and the request is not sent.
    /// The call fails with [`Error::Middleware`] without consuming a retry.
    Stop,
}

/// A named request-transforming step, applied to the draft before each
/// attempt. Steps may await external work (token refresh, signing) before
/// returning; the pipeline awaits each step fully before the next.
#[async_trait]
pub trait Middleware: Send + Sync {
    async fn handle(&self, draft: &mut RequestDraft, context: &AttemptContext)
        -> std::result::Result<Flow, BoxError>;
}

/// Adapter so plain synchronous closures can act as middleware.
pub(crate) struct FnMiddleware<F>(pub F);

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: Fn(&mut RequestDraft, &AttemptContext) -> std::result::Result<Flow, BoxError>
        + Send
        + Sync,
{
    async fn handle(
        &self,
        draft: &mut RequestDraft,
        context: &AttemptContext,
    ) -> std::result::Result<Flow, BoxError> {
        (self.0)(draft, context)
    }
}

/// Wraps a synchronous closure as a pipeline step.
pub(crate) fn fn_middleware<F>(step: F) -> Arc<dyn Middleware>
where
    F: Fn(&mut RequestDraft, &AttemptContext) -> std::result::Result<Flow, BoxError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnMiddleware(step))
}

#[derive(Clone)]
pub(crate) struct Entry {
    pub name: String,
    pub step: Arc<dyn Middleware>,
}

/// Ordered, name-keyed registration table.
///
/// Execution order is first-insertion order; re-registering a name swaps
/// the step in place without moving it. Lookup is O(1) via a name→index
/// map kept alongside the entry list.
#[derive(Default)]
pub(crate) struct Pipeline {
    entries: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl Pipeline {
    pub fn register(&mut self, name: impl Into<String>, step: Arc<dyn Middleware>) {
        let name = name.into();
        match self.index.get(&name) {
            Some(&position) => self.entries[position].step = step,
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push(Entry { name, step });
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let Some(position) = self.index.remove(name) else {
            return false;
        };
        self.entries.remove(position);
        for entry in self.entries.iter().skip(position) {
            if let Some(slot) = self.index.get_mut(&entry.name) {
                *slot -= 1;
            }
        }
        true
    }

    /// Entry set as it exists right now. Each attempt applies a snapshot,
    /// so concurrent register/remove never affects an apply in progress.
    pub fn snapshot(&self) -> Vec<Entry> {
        self.entries.clone()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub(crate) fn lock_unpoisoned(pipeline: &Mutex<Pipeline>) -> MutexGuard<'_, Pipeline> {
    match pipeline.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Applies a pipeline snapshot to a draft, strictly in insertion order.
/// Empty snapshots are a no-op.
pub(crate) async fn apply(
    entries: &[Entry],
    draft: &mut RequestDraft,
    context: &AttemptContext,
) -> Result<()> {
    for entry in entries {
        match entry.step.handle(draft, context).await {
            Ok(Flow::Continue) => {}
            Ok(Flow::Stop) => {
                #[cfg(feature = "tracing")]
                tracing::debug!(middleware = %entry.name, "middleware stopped the request");
                return Err(Error::Middleware {
                    name: entry.name.clone(),
                    source: None,
                });
            }
            Err(source) => {
                return Err(Error::Middleware {
                    name: entry.name.clone(),
                    source: Some(source),
                });
            }
        }
    }
    Ok(())
}
