//! Platform adapter contract

use async_trait::async_trait;
use bytes::Bytes;

use crate::core::cancel::CancelToken;
use crate::core::error::Result;
use crate::core::models::{
    League, LeagueSearch, Platform, Player, PlayersByTeam, Team, Transaction,
};

/// One implementation per upstream fantasy platform. Implementations
/// translate platform payloads into the shared domain shapes and wrap every
/// non-2xx or transport failure into [`crate::core::error::Error::Upstream`].
#[async_trait]
pub trait LeagueProvider: Send + Sync {
    fn platform(&self) -> Platform;

    async fn league(&self, league_id: &str, cancel: &CancelToken) -> Result<League>;

    async fn teams(&self, league_id: &str, cancel: &CancelToken) -> Result<Vec<Team>>;

    async fn players_by_team(&self, league_id: &str, cancel: &CancelToken)
    -> Result<PlayersByTeam>;

    /// All transactions, or only those for `week` when given.
    async fn transactions(
        &self,
        league_id: &str,
        week: Option<u32>,
        cancel: &CancelToken,
    ) -> Result<Vec<Transaction>>;

    async fn transaction_players(
        &self,
        transaction: &Transaction,
        cancel: &CancelToken,
    ) -> Result<Vec<Player>>;

    async fn search_leagues(&self, search: &LeagueSearch, cancel: &CancelToken)
    -> Result<Vec<League>>;

    /// URL the avatar bytes are fetched from.
    fn avatar_target(&self, avatar_id: &str) -> Result<String>;

    async fn avatar(&self, avatar_id: &str, cancel: &CancelToken) -> Result<Bytes>;
}
