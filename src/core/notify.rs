//! User-visible notification capability.
//!
//! Mutating hooks report their outcome here. The capability is created
//! empty and becomes usable once a concrete [`Notifier`] is installed; using
//! it before that fails with [`Error::NotInitialized`].

use crate::core::error::{Error, Result};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

pub trait Notifier: Send + Sync {
    fn show_success(&self, message: &str);
    fn show_error(&self, message: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotifierState {
    Uninitialized,
    Ready,
}

#[derive(Clone, Default)]
pub struct Notifications {
    inner: Arc<RwLock<Option<Arc<dyn Notifier>>>>,
}

impl Notifications {
    pub fn uninitialized() -> Self {
        Self::default()
    }

    pub fn ready(notifier: Arc<dyn Notifier>) -> Self {
        let notifications = Self::default();
        notifications.init(notifier);
        notifications
    }

    /// Installs (or replaces) the notifier.
    pub fn init(&self, notifier: Arc<dyn Notifier>) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(notifier);
    }

    pub fn state(&self) -> NotifierState {
        let slot = self.inner.read().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            NotifierState::Ready
        } else {
            NotifierState::Uninitialized
        }
    }

    pub fn success(&self, message: &str) -> Result<()> {
        self.notifier()?.show_success(message);
        Ok(())
    }

    pub fn error(&self, message: &str) -> Result<()> {
        self.notifier()?.show_error(message);
        Ok(())
    }

    fn notifier(&self) -> Result<Arc<dyn Notifier>> {
        let slot = self.inner.read().unwrap_or_else(|e| e.into_inner());
        slot.clone().ok_or(Error::NotInitialized("notifier"))
    }
}

/// Notifier that only writes to the log.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn show_success(&self, message: &str) {
        info!(%message, "notification");
    }

    fn show_error(&self, message: &str) {
        warn!(%message, "notification");
    }
}
