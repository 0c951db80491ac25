//! Owned-backend contract and the session it authenticates

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, RwLock};

use crate::core::cancel::CancelToken;
use crate::core::error::Result;
use crate::core::models::{LeagueRef, Player, Profile, TradeMarketEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignUp {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Authenticated user as reported by the backend on login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub username: String,
    #[serde(skip_serializing)]
    pub token: Option<String>,
}

/// Payload of the saved-leagues endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedLeagues {
    #[serde(default)]
    pub leagues: Vec<LeagueRef>,
}

/// The team a user marked as theirs in a saved Sleeper league.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedTeam {
    pub league_id: String,
    /// Sleeper user id owning the saved team.
    pub saved_user: String,
    #[serde(default)]
    pub platform: Option<String>,
}

/// Application backend: accounts and saved-league associations. Every
/// non-2xx or transport failure maps to
/// [`crate::core::error::Error::Backend`].
#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn login(&self, credentials: &Credentials, cancel: &CancelToken) -> Result<AuthUser>;

    async fn signup(&self, signup: &SignUp, cancel: &CancelToken) -> Result<()>;

    async fn change_username(&self, username: &str, cancel: &CancelToken) -> Result<()>;

    async fn save_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<()>;

    async fn delete_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<()>;

    async fn saved_leagues(&self, cancel: &CancelToken) -> Result<SavedLeagues>;

    async fn is_user_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<bool>;

    /// Ends the server-side session.
    async fn logout(&self, cancel: &CancelToken) -> Result<()>;

    /// Saves `league_id` and records `user_id` as the user's team in it.
    async fn save_team(&self, league_id: &str, user_id: &str, cancel: &CancelToken) -> Result<()>;

    /// `None` when no team is saved for the league.
    async fn saved_team(&self, league_id: &str, cancel: &CancelToken) -> Result<Option<SavedTeam>>;

    async fn unlink_yahoo(&self, cancel: &CancelToken) -> Result<()>;

    async fn profile(&self, cancel: &CancelToken) -> Result<Profile>;

    async fn trade_market(
        &self,
        search: Option<&str>,
        limit: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<TradeMarketEntry>>;

    async fn lookup_players(&self, player_ids: &[String], cancel: &CancelToken)
    -> Result<Vec<Player>>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionUser {
    pub username: String,
    pub token: Option<String>,
}

/// Current user for this process. Shared between the backend adapter (which
/// reads the token) and the hooks (which gate queries on it).
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<Option<SessionUser>>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(username: impl Into<String>, token: Option<String>) -> Self {
        let session = Self::default();
        session.set(SessionUser {
            username: username.into(),
            token,
        });
        session
    }

    pub fn current(&self) -> Option<SessionUser> {
        self.inner
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_logged_in(&self) -> bool {
        self.current().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.current().and_then(|user| user.token)
    }

    pub fn set(&self, user: SessionUser) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = Some(user);
    }

    pub fn rename(&self, username: &str) {
        let mut slot = self.inner.write().unwrap_or_else(|e| e.into_inner());
        if let Some(user) = slot.as_mut() {
            user.username = username.to_string();
        }
    }

    pub fn clear(&self) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = None;
    }
}
