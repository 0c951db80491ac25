use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use tracing::{debug, warn};

use super::Hooks;
use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result};
use crate::core::models::{
    AvatarRef, League, LeagueRef, LeagueSearch, Platform, Player, PlayersByTeam, SeasonLink, Team,
    Transaction, TransactionFilter,
};
use crate::providers::avatar::AvatarImage;
use crate::query::{QueryState, key};

/// Upper bound on `previous_league_id` hops when walking a league's history.
pub const MAX_SEASON_HOPS: usize = 25;

/// Avatar ids are content addressed, so their bytes rarely change.
pub const AVATAR_STALE_TIME: Duration = Duration::from_secs(60 * 60);

type Fetcher<T> = Box<dyn FnOnce(CancelToken) -> BoxFuture<'static, Result<T>> + Send>;

impl Hooks {
    pub async fn league_info(
        &self,
        league: &LeagueRef,
        cancel: &CancelToken,
    ) -> QueryState<Arc<League>> {
        self.cache
            .query(
                key::league_info(league.platform, &league.league_id),
                self.options(league.is_complete()),
                cancel,
                self.league_fetcher(league),
            )
            .await
    }

    pub async fn teams(&self, league: &LeagueRef, cancel: &CancelToken) -> QueryState<Arc<Vec<Team>>> {
        let provider = self.provider(league.platform);
        let id = league.league_id.clone();
        self.cache
            .query(
                key::teams(league.platform, &league.league_id),
                self.options(league.is_complete()),
                cancel,
                move |token| async move { provider.teams(&id, &token).await },
            )
            .await
    }

    pub async fn players_by_team(
        &self,
        league: &LeagueRef,
        cancel: &CancelToken,
    ) -> QueryState<Arc<PlayersByTeam>> {
        let provider = self.provider(league.platform);
        let id = league.league_id.clone();
        self.cache
            .query(
                key::players_by_team(league.platform, &league.league_id),
                self.options(league.is_complete()),
                cancel,
                move |token| async move { provider.players_by_team(&id, &token).await },
            )
            .await
    }

    /// Every transaction of the league, or one week's when `week` is given.
    pub async fn transactions(
        &self,
        league: &LeagueRef,
        week: Option<u32>,
        cancel: &CancelToken,
    ) -> QueryState<Arc<Vec<Transaction>>> {
        self.cache
            .query(
                key::transactions(league.platform, &league.league_id, week),
                self.options(league.is_complete()),
                cancel,
                self.transactions_fetcher(league, week),
            )
            .await
    }

    /// Same cache entry as [`Hooks::transactions`], filtered per consumer.
    pub async fn transactions_of_kind(
        &self,
        league: &LeagueRef,
        week: Option<u32>,
        filter: TransactionFilter,
        cancel: &CancelToken,
    ) -> QueryState<Vec<Transaction>> {
        self.cache
            .query_select(
                key::transactions(league.platform, &league.league_id, week),
                self.options(league.is_complete()),
                cancel,
                self.transactions_fetcher(league, week),
                move |all: &Vec<Transaction>| {
                    all.iter()
                        .filter(|tx| filter.matches(&tx.kind))
                        .cloned()
                        .collect()
                },
            )
            .await
    }

    /// Players moved by one transaction. Disabled when nothing moves.
    pub async fn players_in_transaction(
        &self,
        league: &LeagueRef,
        transaction: &Transaction,
        cancel: &CancelToken,
    ) -> QueryState<Arc<Vec<Player>>> {
        let provider = self.provider(league.platform);
        let tx = transaction.clone();
        self.cache
            .query(
                key::transaction_players(
                    league.platform,
                    &league.league_id,
                    &transaction.transaction_id,
                ),
                self.options(league.is_complete() && transaction.moves_players()),
                cancel,
                move |token| async move { provider.transaction_players(&tx, &token).await },
            )
            .await
    }

    /// Resolves an avatar into a handle owned by this caller. The bytes are
    /// cached once per avatar; every caller gets its own object URL.
    pub async fn avatar(&self, avatar: &AvatarRef, cancel: &CancelToken) -> QueryState<AvatarImage> {
        let provider = self.provider(avatar.platform);
        let id = avatar.id.clone();
        let registry = self.avatars.clone();
        self.cache
            .query_select(
                key::avatar(avatar.platform, &avatar.id),
                self.options(!avatar.id.trim().is_empty())
                    .with_stale_time(AVATAR_STALE_TIME),
                cancel,
                move |token| async move { provider.avatar(&id, &token).await },
                move |bytes: &Bytes| registry.create(bytes.clone()),
            )
            .await
    }

    /// Like [`Hooks::avatar`] with the platform given as a tag.
    pub async fn avatar_by_tag(
        &self,
        tag: &str,
        avatar_id: &str,
        cancel: &CancelToken,
    ) -> QueryState<AvatarImage> {
        match tag.parse::<Platform>() {
            Ok(platform) => self.avatar(&AvatarRef::new(platform, avatar_id), cancel).await,
            Err(err) => {
                warn!(%tag, "Avatar requested from an unknown source");
                QueryState::failed(err, None)
            }
        }
    }

    /// The league and every earlier season reachable through
    /// `previous_league_id`, newest first.
    pub async fn previous_seasons(
        &self,
        league: &LeagueRef,
        cancel: &CancelToken,
    ) -> QueryState<Arc<Vec<SeasonLink>>> {
        let provider = self.provider(league.platform);
        let start = league.league_id.clone();
        self.cache
            .query(
                key::previous_seasons(league.platform, &league.league_id),
                self.options(league.is_complete()),
                cancel,
                move |token| async move {
                    let mut seasons = Vec::new();
                    let mut visited = HashSet::new();
                    let mut next = Some(start);
                    while let Some(id) = next.take().filter(|id| !id.trim().is_empty() && id != "0")
                    {
                        if seasons.len() >= MAX_SEASON_HOPS || !visited.insert(id.clone()) {
                            warn!(%id, "Stopped walking league history");
                            break;
                        }
                        let info = provider.league(&id, &token).await?;
                        seasons.push(SeasonLink {
                            league_id: id,
                            season: info.season,
                        });
                        next = info.previous_league_id;
                    }
                    Ok(seasons)
                },
            )
            .await
    }

    /// Leagues the user can pick from on one platform. Sleeper searches by
    /// username; Yahoo searches the linked account and needs a session.
    pub async fn search_leagues(
        &self,
        search: &LeagueSearch,
        cancel: &CancelToken,
    ) -> QueryState<Arc<Vec<League>>> {
        let enabled = !search.season.trim().is_empty()
            && match search.platform {
                Platform::Sleeper => search
                    .username
                    .as_deref()
                    .is_some_and(|name| !name.trim().is_empty()),
                Platform::Yahoo => self.logged_in(),
            };
        let provider = self.provider(search.platform);
        let params = search.clone();
        self.cache
            .query(
                key::search_leagues(search),
                self.options(enabled),
                cancel,
                move |token| async move { provider.search_leagues(&params, &token).await },
            )
            .await
    }

    /// Saved leagues joined with their league info. Lookups go through the
    /// `LeagueInfo` entries, so they are shared with [`Hooks::league_info`].
    /// Leagues whose info cannot be loaded are skipped.
    pub async fn saved_league_details(&self, cancel: &CancelToken) -> QueryState<Arc<Vec<League>>> {
        let hooks = self.clone();
        self.cache
            .query(
                key::saved_league_details(),
                self.options(self.logged_in()),
                cancel,
                move |token| async move {
                    let saved = hooks.backend.saved_leagues(&token).await?;
                    let leagues: Vec<LeagueRef> = saved
                        .leagues
                        .into_iter()
                        .filter(LeagueRef::is_complete)
                        .collect();
                    let lookups: Vec<_> = leagues
                        .iter()
                        .map(|league| hooks.league_info(league, &token))
                        .collect();
                    let states = join_all(lookups).await;
                    if token.is_cancelled() {
                        return Err(Error::Cancelled);
                    }

                    let mut details = Vec::with_capacity(states.len());
                    for (league, state) in leagues.iter().zip(states) {
                        if let Some(err) = &state.error {
                            warn!(%league, %err, "Skipping saved league");
                            continue;
                        }
                        if let Some(info) = state.data {
                            details.push(League::clone(&info));
                        }
                    }
                    debug!(count = details.len(), "Loaded saved league details");
                    Ok(details)
                },
            )
            .await
    }

    fn league_fetcher(&self, league: &LeagueRef) -> Fetcher<League> {
        let provider = self.provider(league.platform);
        let id = league.league_id.clone();
        Box::new(move |token| async move { provider.league(&id, &token).await }.boxed())
    }

    fn transactions_fetcher(&self, league: &LeagueRef, week: Option<u32>) -> Fetcher<Vec<Transaction>> {
        let provider = self.provider(league.platform);
        let id = league.league_id.clone();
        Box::new(move |token| {
            async move { provider.transactions(&id, week, &token).await }.boxed()
        })
    }
}
