//! Snapshots handed to readers and writers of the cache.

use chrono::{DateTime, Utc};

use crate::core::error::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryStatus {
    /// Disabled, never requested, or the viewer went away before resolution.
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// What a consumer sees for one key.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState<T> {
    pub status: QueryStatus,
    pub data: Option<T>,
    pub error: Option<Error>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Data is present but has been invalidated or outlived its stale time.
    pub is_stale: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self {
            status: QueryStatus::Idle,
            data: None,
            error: None,
            updated_at: None,
            is_stale: false,
        }
    }
}

impl<T> QueryState<T> {
    pub fn idle() -> Self {
        Self::default()
    }

    /// The viewer's signal fired first; nothing was written into its state.
    pub fn discarded() -> Self {
        Self {
            error: Some(Error::Cancelled),
            ..Self::default()
        }
    }

    pub fn success(data: T, updated_at: DateTime<Utc>) -> Self {
        Self {
            status: QueryStatus::Success,
            data: Some(data),
            error: None,
            updated_at: Some(updated_at),
            is_stale: false,
        }
    }

    /// `last_good` is the previously cached value, if any.
    pub fn failed(error: Error, last_good: Option<T>) -> Self {
        Self {
            status: QueryStatus::Error,
            data: last_good,
            error: Some(error),
            updated_at: None,
            is_stale: false,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.status == QueryStatus::Idle
    }

    pub fn is_loading(&self) -> bool {
        self.status == QueryStatus::Loading
    }

    pub fn is_success(&self) -> bool {
        self.status == QueryStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == QueryStatus::Error
    }

    /// Projects the data, leaving status and error untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> QueryState<U> {
        QueryState {
            status: self.status,
            data: self.data.map(f),
            error: self.error,
            updated_at: self.updated_at,
            is_stale: self.is_stale,
        }
    }

    pub fn as_ref(&self) -> QueryState<&T> {
        QueryState {
            status: self.status,
            data: self.data.as_ref(),
            error: self.error.clone(),
            updated_at: self.updated_at,
            is_stale: self.is_stale,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MutationStatus {
    #[default]
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationState<T> {
    pub status: MutationStatus,
    pub data: Option<T>,
    pub error: Option<Error>,
}

impl<T> MutationState<T> {
    pub fn succeeded(data: T) -> Self {
        Self {
            status: MutationStatus::Success,
            data: Some(data),
            error: None,
        }
    }

    pub fn failed(error: Error) -> Self {
        Self {
            status: MutationStatus::Error,
            data: None,
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == MutationStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == MutationStatus::Error
    }

    pub fn into_result(self) -> crate::core::error::Result<T> {
        match (self.data, self.error) {
            (Some(data), None) => Ok(data),
            (_, Some(error)) => Err(error),
            (None, None) => Err(Error::Cancelled),
        }
    }
}
