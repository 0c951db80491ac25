//! Writes that go through the cache.
//!
//! A mutation never touches cached values directly. On success it marks the
//! keys it affects as stale and the next read refetches them.

use std::future::Future;

use tracing::debug;

use crate::core::error::{Error, Result};
use crate::query::cache::QueryCache;
use crate::query::key::KeyFilter;
use crate::query::state::{MutationState, MutationStatus};

type StatusCallback<'a> = Box<dyn FnMut(MutationStatus) + Send + 'a>;
type SuccessCallback<'a, T> = Box<dyn FnOnce(&T) + Send + 'a>;
type ErrorCallback<'a> = Box<dyn FnOnce(&Error) + Send + 'a>;

/// Side effects attached to one mutation.
pub struct MutationHooks<'a, T> {
    invalidates: Vec<KeyFilter>,
    on_status: Option<StatusCallback<'a>>,
    on_success: Option<SuccessCallback<'a, T>>,
    on_error: Option<ErrorCallback<'a>>,
}

impl<T> Default for MutationHooks<'_, T> {
    fn default() -> Self {
        Self {
            invalidates: Vec::new(),
            on_status: None,
            on_success: None,
            on_error: None,
        }
    }
}

impl<'a, T> MutationHooks<'a, T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invalidate(mut self, filter: impl Into<KeyFilter>) -> Self {
        self.invalidates.push(filter.into());
        self
    }

    /// Called with `Pending` before the mutation runs and with the final
    /// status once every other callback has run.
    pub fn on_status(mut self, f: impl FnMut(MutationStatus) + Send + 'a) -> Self {
        self.on_status = Some(Box::new(f));
        self
    }

    pub fn on_success(mut self, f: impl FnOnce(&T) + Send + 'a) -> Self {
        self.on_success = Some(Box::new(f));
        self
    }

    pub fn on_error(mut self, f: impl FnOnce(&Error) + Send + 'a) -> Self {
        self.on_error = Some(Box::new(f));
        self
    }
}

impl QueryCache {
    /// Runs a write. On success the listed keys are invalidated before
    /// `on_success` runs, so any read issued from the callback already sees
    /// them as stale. Failures are reported once and never retried.
    pub async fn mutate<T, Fut>(&self, mutation: Fut, hooks: MutationHooks<'_, T>) -> MutationState<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let MutationHooks {
            invalidates,
            mut on_status,
            on_success,
            on_error,
        } = hooks;

        if let Some(report) = on_status.as_mut() {
            report(MutationStatus::Pending);
        }

        let state = match mutation.await {
            Ok(data) => {
                if !invalidates.is_empty() {
                    self.invalidate(&invalidates);
                }
                if let Some(callback) = on_success {
                    callback(&data);
                }
                MutationState::succeeded(data)
            }
            Err(error) => {
                debug!(%error, "Mutation failed");
                if let Some(callback) = on_error {
                    callback(&error);
                }
                MutationState::failed(error)
            }
        };

        if let Some(report) = on_status.as_mut() {
            report(state.status);
        }
        state
    }
}
