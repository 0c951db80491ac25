use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use super::Hooks;
use crate::core::backend::{AuthUser, Credentials, SavedLeagues, SavedTeam, SessionUser, SignUp};
use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result};
use crate::core::models::{LeagueRef, Platform, Profile, TradeMarketEntry};
use crate::query::{MutationHooks, MutationState, QueryKey, QueryKind, QueryState, key};

/// Page size requested from the trade market.
pub const TRADE_MARKET_LIMIT: u32 = 25;

/// The trade market is a live feed; older pages are shown while it refreshes.
pub const TRADE_MARKET_STALE_TIME: Duration = Duration::from_secs(30);

fn is_yahoo_search(key: &QueryKey) -> bool {
    matches!(key, QueryKey::SearchLeagues(search) if search.platform == Platform::Yahoo)
}

fn sleeper_only(league: &LeagueRef) -> Result<()> {
    match league.platform {
        Platform::Sleeper => Ok(()),
        platform => Err(Error::Unsupported {
            platform,
            operation: "saved teams",
        }),
    }
}

impl Hooks {
    pub async fn saved_leagues(&self, cancel: &CancelToken) -> QueryState<Vec<LeagueRef>> {
        let backend = self.backend.clone();
        self.cache
            .query_select(
                key::saved_leagues(),
                self.options(self.logged_in()),
                cancel,
                move |token| async move { backend.saved_leagues(&token).await },
                |saved: &SavedLeagues| saved.leagues.clone(),
            )
            .await
    }

    pub async fn is_user_league(&self, league: &LeagueRef, cancel: &CancelToken) -> QueryState<Arc<bool>> {
        let backend = self.backend.clone();
        let target = league.clone();
        self.cache
            .query(
                key::is_user_league(league.platform, &league.league_id),
                self.options(league.is_complete() && self.logged_in()),
                cancel,
                move |token| async move { backend.is_user_league(&target, &token).await },
            )
            .await
    }

    pub async fn trade_market(
        &self,
        search: Option<&str>,
        cancel: &CancelToken,
    ) -> QueryState<Arc<Vec<TradeMarketEntry>>> {
        let backend = self.backend.clone();
        let text = key::normalize_search(search);
        self.cache
            .query(
                key::trade_market(search),
                self.options(true)
                    .with_stale_time(TRADE_MARKET_STALE_TIME)
                    .with_background_refetch(),
                cancel,
                move |token| async move {
                    backend
                        .trade_market(text.as_deref(), TRADE_MARKET_LIMIT, &token)
                        .await
                },
            )
            .await
    }

    pub async fn profile(&self, cancel: &CancelToken) -> QueryState<Arc<Profile>> {
        let backend = self.backend.clone();
        self.cache
            .query(
                key::profile(),
                self.options(self.logged_in()),
                cancel,
                move |token| async move { backend.profile(&token).await },
            )
            .await
    }

    /// The team the user marked as theirs in a Sleeper league, `None` when
    /// nothing is saved.
    pub async fn saved_team(
        &self,
        league: &LeagueRef,
        cancel: &CancelToken,
    ) -> QueryState<Arc<Option<SavedTeam>>> {
        if let Err(err) = sleeper_only(league) {
            return QueryState::failed(err, None);
        }
        let backend = self.backend.clone();
        let id = league.league_id.clone();
        self.cache
            .query(
                key::saved_team(league.platform, &league.league_id),
                self.options(league.is_complete() && self.logged_in()),
                cancel,
                move |token| async move { backend.saved_team(&id, &token).await },
            )
            .await
    }

    /// Saves a Sleeper league together with the user's team in it.
    pub async fn save_team(
        &self,
        league: &LeagueRef,
        user_id: &str,
        cancel: &CancelToken,
    ) -> MutationState<()> {
        if let Err(err) = sleeper_only(league) {
            return MutationState::failed(err);
        }
        if !league.is_complete() {
            return MutationState::failed(Error::MissingParameter("league_id"));
        }
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return MutationState::failed(Error::MissingParameter("user_id"));
        }
        self.cache
            .mutate(
                self.backend.save_team(&league.league_id, user_id, cancel),
                self.league_membership_hooks(league)
                    .invalidate(key::saved_team(league.platform, &league.league_id))
                    .on_success(|_| self.report_success("Team saved successfully"))
                    .on_error(|err| self.report_error("Failed to save team", err)),
            )
            .await
    }

    pub async fn save_league(&self, league: &LeagueRef, cancel: &CancelToken) -> MutationState<()> {
        if !league.is_complete() {
            return MutationState::failed(Error::MissingParameter("league_id"));
        }
        self.cache
            .mutate(
                self.backend.save_league(league, cancel),
                self.league_membership_hooks(league)
                    .on_success(|_| self.report_success("League saved successfully"))
                    .on_error(|err| self.report_error("Failed to save league", err)),
            )
            .await
    }

    pub async fn delete_league(&self, league: &LeagueRef, cancel: &CancelToken) -> MutationState<()> {
        if !league.is_complete() {
            return MutationState::failed(Error::MissingParameter("league_id"));
        }
        self.cache
            .mutate(
                self.backend.delete_league(league, cancel),
                self.league_membership_hooks(league)
                    .on_success(|_| self.report_success("League removed successfully"))
                    .on_error(|err| self.report_error("Failed to remove league", err)),
            )
            .await
    }

    pub async fn change_username(&self, username: &str, cancel: &CancelToken) -> MutationState<()> {
        let username = username.trim();
        if username.is_empty() {
            return MutationState::failed(Error::MissingParameter("username"));
        }
        self.cache
            .mutate(
                self.backend.change_username(username, cancel),
                MutationHooks::new()
                    .invalidate(key::profile())
                    .on_success(|_| {
                        self.session.rename(username);
                        self.report_success("Username Changed");
                    })
                    .on_error(|err| self.report_error("Error Changing Username", err)),
            )
            .await
    }

    /// Signs in and replaces the session. A failed login leaves the current
    /// session untouched.
    pub async fn login(&self, credentials: &Credentials, cancel: &CancelToken) -> MutationState<AuthUser> {
        self.cache
            .mutate(
                self.backend.login(credentials, cancel),
                MutationHooks::new()
                    .invalidate(key::saved_leagues())
                    .invalidate(key::saved_league_details())
                    .invalidate(QueryKind::IsUserLeague)
                    .invalidate(key::profile())
                    .on_success(|user: &AuthUser| {
                        self.session.set(SessionUser {
                            username: user.username.clone(),
                            token: user.token.clone(),
                        });
                        self.cache.set_data(
                            key::profile(),
                            Profile {
                                username: user.username.clone(),
                                email: Some(credentials.email.clone()),
                            },
                        );
                        info!(username = %user.username, "Logged in");
                        self.report_success("Logged in");
                    })
                    .on_error(|err| self.report_error("Login failed", err)),
            )
            .await
    }

    pub async fn signup(&self, signup: &SignUp, cancel: &CancelToken) -> MutationState<()> {
        self.cache
            .mutate(
                self.backend.signup(signup, cancel),
                MutationHooks::new()
                    .on_success(|_| self.report_success("Account created"))
                    .on_error(|err| self.report_error("Failed to create account", err)),
            )
            .await
    }

    /// Removes the Yahoo link from the account. Yahoo league searches are
    /// refetched on next read.
    pub async fn unlink_yahoo(&self, cancel: &CancelToken) -> MutationState<()> {
        self.cache
            .mutate(
                self.backend.unlink_yahoo(cancel),
                MutationHooks::new()
                    .on_success(|_| {
                        self.cache.invalidate_where(is_yahoo_search);
                        self.report_success("Yahoo account unlinked");
                    })
                    .on_error(|err| self.report_error("Failed to unlink account", err)),
            )
            .await
    }

    /// Ends the server session, then clears the local session and drops
    /// every entry that belongs to the user. Local state is cleared even when
    /// the server call fails.
    pub async fn logout(&self, cancel: &CancelToken) -> MutationState<()> {
        let state = if self.logged_in() {
            self.cache
                .mutate(
                    self.backend.logout(cancel),
                    MutationHooks::new().on_error(|err| self.report_error("Failed to log out", err)),
                )
                .await
        } else {
            MutationState::succeeded(())
        };

        self.session.clear();
        let removed = self.cache.remove_where(|key| {
            is_yahoo_search(key)
                || matches!(
                    key.kind(),
                    QueryKind::SavedLeagues
                        | QueryKind::SavedLeagueDetails
                        | QueryKind::IsUserLeague
                        | QueryKind::SavedTeam
                        | QueryKind::Profile
                )
        });
        debug!(removed, "Logged out");
        state
    }

    fn league_membership_hooks<'a>(&self, league: &LeagueRef) -> MutationHooks<'a, ()> {
        MutationHooks::new()
            .invalidate(key::saved_leagues())
            .invalidate(key::is_user_league(league.platform, &league.league_id))
            .invalidate(key::saved_league_details())
    }
}
