//! Data-access hooks.
//!
//! One parameterised entry point per entity kind. Each hook builds its key
//! through [`crate::query::key`], decides whether the read is enabled and
//! hands a fetcher to the shared [`QueryCache`]. Mutating hooks declare the
//! keys they invalidate and report their outcome through [`Notifications`].

mod account;
mod league;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use tracing::warn;

use crate::core::backend::{AccountBackend, Session};
use crate::core::error::Error;
use crate::core::models::Platform;
use crate::core::notify::Notifications;
use crate::core::provider::LeagueProvider;
use crate::providers::avatar::ObjectUrlRegistry;
use crate::query::{QueryCache, QueryOptions};

pub use account::{TRADE_MARKET_LIMIT, TRADE_MARKET_STALE_TIME};
pub use league::{AVATAR_STALE_TIME, MAX_SEASON_HOPS};

/// The two platform adapters, addressed by [`Platform`].
#[derive(Clone)]
pub struct Providers {
    sleeper: Arc<dyn LeagueProvider>,
    yahoo: Arc<dyn LeagueProvider>,
}

impl Providers {
    pub fn new(sleeper: Arc<dyn LeagueProvider>, yahoo: Arc<dyn LeagueProvider>) -> Self {
        Self { sleeper, yahoo }
    }

    pub fn get(&self, platform: Platform) -> Arc<dyn LeagueProvider> {
        match platform {
            Platform::Sleeper => self.sleeper.clone(),
            Platform::Yahoo => self.yahoo.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Hooks {
    providers: Providers,
    backend: Arc<dyn AccountBackend>,
    cache: QueryCache,
    session: Session,
    notifications: Notifications,
    avatars: ObjectUrlRegistry,
}

impl Hooks {
    pub fn new(
        providers: Providers,
        backend: Arc<dyn AccountBackend>,
        cache: QueryCache,
        session: Session,
        notifications: Notifications,
    ) -> Self {
        Self {
            providers,
            backend,
            cache,
            session,
            notifications,
            avatars: ObjectUrlRegistry::new(),
        }
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn notifications(&self) -> &Notifications {
        &self.notifications
    }

    pub fn avatars(&self) -> &ObjectUrlRegistry {
        &self.avatars
    }

    pub fn provider(&self, platform: Platform) -> Arc<dyn LeagueProvider> {
        self.providers.get(platform)
    }

    fn options(&self, enabled: bool) -> QueryOptions {
        QueryOptions::enabled_if(enabled)
    }

    fn logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    fn report_success(&self, message: &str) {
        if let Err(err) = self.notifications.success(message) {
            warn!(%err, message, "Notification dropped");
        }
    }

    fn report_error(&self, message: &str, error: &Error) {
        warn!(%error, "{message}");
        if let Err(err) = self.notifications.error(message) {
            warn!(%err, message, "Notification dropped");
        }
    }
}
