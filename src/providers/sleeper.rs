use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::try_join_all;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::core::backend::AccountBackend;
use crate::core::cancel::CancelToken;
use crate::core::config::SleeperProviderConfig;
use crate::core::error::{Error, Result, Source};
use crate::core::models::{
    AvatarRef, DraftPick, League, LeagueRef, LeagueSearch, Owner, Platform, Player, PlayersByTeam,
    Team, TeamRecord, Transaction, TransactionKind,
};
use crate::core::provider::LeagueProvider;
use crate::providers::util::{get_bytes, get_json, http_client, with_retry};

const SOURCE: Source = Source::Platform(Platform::Sleeper);
const RETRIES: usize = 2;
const RETRY_DELAY_MS: u64 = 250;

/// Sleeper's public read API. Player names come from the owned backend,
/// which mirrors Sleeper's player database.
pub struct SleeperProvider {
    base_url: String,
    avatar_base_url: String,
    sport: String,
    client: Client,
    players: Arc<dyn AccountBackend>,
}

impl SleeperProvider {
    pub fn new(config: &SleeperProviderConfig, players: Arc<dyn AccountBackend>) -> Self {
        SleeperProvider {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            avatar_base_url: config.avatar_base_url.trim_end_matches('/').to_string(),
            sport: config.sport.clone(),
            client: http_client(),
            players,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, cancel: &CancelToken) -> Result<T> {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Requesting {}", url);
        with_retry(
            || get_json(SOURCE, self.client.get(&url), cancel),
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await
    }

    async fn rosters(&self, league_id: &str, cancel: &CancelToken) -> Result<Vec<WireRoster>> {
        let league_id = required(league_id, "league_id")?;
        self.fetch(&format!("/league/{league_id}/rosters"), cancel)
            .await
    }

    async fn week_transactions(
        &self,
        league_id: &str,
        week: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<Transaction>> {
        let transactions: Vec<WireTransaction> = self
            .fetch(&format!("/league/{league_id}/transactions/{week}"), cancel)
            .await?;
        Ok(transactions.into_iter().map(Transaction::from).collect())
    }

    async fn current_week(&self, cancel: &CancelToken) -> Result<u32> {
        let state: WireState = self.fetch(&format!("/state/{}", self.sport), cancel).await?;
        Ok(state.week.max(1))
    }
}

fn required<'a>(value: &'a str, name: &'static str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        Err(Error::MissingParameter(name))
    } else {
        Ok(value)
    }
}

/// Sleeper answers unknown ids with `200 null`.
fn found<T>(value: Option<T>) -> Result<T> {
    value.ok_or_else(|| Error::status(SOURCE, 404, "Not Found"))
}

#[derive(Debug, Deserialize)]
struct WireLeagueSettings {
    num_teams: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct WireLeague {
    league_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    season: String,
    status: Option<String>,
    sport: Option<String>,
    avatar: Option<String>,
    previous_league_id: Option<String>,
    settings: Option<WireLeagueSettings>,
    #[serde(default)]
    scoring_settings: BTreeMap<String, f64>,
    #[serde(default)]
    roster_positions: Vec<String>,
}

impl From<WireLeague> for League {
    fn from(l: WireLeague) -> Self {
        League {
            league: LeagueRef::sleeper(l.league_id),
            name: l.name,
            season: l.season,
            status: l.status,
            sport: l.sport,
            num_teams: l.settings.and_then(|s| s.num_teams),
            avatar: non_empty(l.avatar).map(|id| AvatarRef::new(Platform::Sleeper, id)),
            previous_league_id: non_empty(l.previous_league_id).filter(|id| id != "0"),
            roster_positions: l.roster_positions,
            scoring_settings: l.scoring_settings,
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[derive(Debug, Default, Deserialize)]
struct WireRosterSettings {
    #[serde(default)]
    wins: u32,
    #[serde(default)]
    losses: u32,
    #[serde(default)]
    ties: u32,
}

#[derive(Debug, Deserialize)]
struct WireRoster {
    roster_id: u32,
    owner_id: Option<String>,
    #[serde(default)]
    players: Option<Vec<String>>,
    #[serde(default)]
    settings: WireRosterSettings,
}

#[derive(Debug, Default, Deserialize)]
struct WireUserMetadata {
    team_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireUser {
    user_id: String,
    display_name: Option<String>,
    avatar: Option<String>,
    #[serde(default)]
    metadata: Option<WireUserMetadata>,
}

#[derive(Debug, Deserialize)]
struct WireState {
    #[serde(default)]
    week: u32,
}

#[derive(Debug, Deserialize)]
struct WireDraftPick {
    season: String,
    round: u32,
    roster_id: u32,
    previous_owner_id: u32,
    owner_id: u32,
}

#[derive(Debug, Deserialize)]
struct WireTransaction {
    transaction_id: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    status: String,
    leg: Option<u32>,
    #[serde(default)]
    roster_ids: Vec<u32>,
    adds: Option<BTreeMap<String, u32>>,
    drops: Option<BTreeMap<String, u32>>,
    #[serde(default)]
    draft_picks: Vec<WireDraftPick>,
    status_updated: Option<i64>,
}

fn team_map(moves: Option<BTreeMap<String, u32>>) -> BTreeMap<String, String> {
    moves
        .unwrap_or_default()
        .into_iter()
        .map(|(player, roster)| (player, roster.to_string()))
        .collect()
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

impl From<WireTransaction> for Transaction {
    fn from(t: WireTransaction) -> Self {
        Transaction {
            transaction_id: t.transaction_id,
            kind: TransactionKind::parse(&t.kind),
            status: t.status,
            week: t.leg,
            team_ids: t.roster_ids.iter().map(u32::to_string).collect(),
            adds: team_map(t.adds),
            drops: team_map(t.drops),
            draft_picks: t
                .draft_picks
                .into_iter()
                .map(|p| DraftPick {
                    season: p.season,
                    round: p.round,
                    original_team_id: p.roster_id.to_string(),
                    previous_team_id: p.previous_owner_id.to_string(),
                    new_team_id: p.owner_id.to_string(),
                })
                .collect(),
            players: Vec::new(),
            updated_at: t.status_updated.and_then(millis_to_utc),
        }
    }
}

fn build_team(roster: WireRoster, users: &HashMap<String, WireUser>) -> Team {
    let user = roster.owner_id.as_ref().and_then(|id| users.get(id));
    let display_name = user.and_then(|u| u.display_name.clone());
    let name = user
        .and_then(|u| u.metadata.as_ref())
        .and_then(|m| non_empty(m.team_name.clone()))
        .or_else(|| display_name.clone())
        .unwrap_or_else(|| format!("Team {}", roster.roster_id));
    Team {
        team_id: roster.roster_id.to_string(),
        name,
        owner: Owner {
            id: roster.owner_id.clone(),
            display_name,
        },
        avatar: user
            .and_then(|u| non_empty(u.avatar.clone()))
            .map(|id| AvatarRef::new(Platform::Sleeper, id)),
        record: TeamRecord {
            wins: roster.settings.wins,
            losses: roster.settings.losses,
            ties: roster.settings.ties,
        },
        player_ids: roster.players.unwrap_or_default(),
    }
}

#[async_trait]
impl LeagueProvider for SleeperProvider {
    fn platform(&self) -> Platform {
        Platform::Sleeper
    }

    #[instrument(name = "SleeperLeague", skip(self, cancel))]
    async fn league(&self, league_id: &str, cancel: &CancelToken) -> Result<League> {
        let league_id = required(league_id, "league_id")?;
        let league: Option<WireLeague> = self.fetch(&format!("/league/{league_id}"), cancel).await?;
        found(league).map(League::from)
    }

    #[instrument(name = "SleeperTeams", skip(self, cancel))]
    async fn teams(&self, league_id: &str, cancel: &CancelToken) -> Result<Vec<Team>> {
        let rosters = self.rosters(league_id, cancel).await?;
        let users: Vec<WireUser> = self
            .fetch(&format!("/league/{}/users", league_id.trim()), cancel)
            .await?;
        let users: HashMap<String, WireUser> =
            users.into_iter().map(|u| (u.user_id.clone(), u)).collect();
        Ok(rosters
            .into_iter()
            .map(|roster| build_team(roster, &users))
            .collect())
    }

    #[instrument(name = "SleeperPlayersByTeam", skip(self, cancel))]
    async fn players_by_team(
        &self,
        league_id: &str,
        cancel: &CancelToken,
    ) -> Result<PlayersByTeam> {
        let rosters = self.rosters(league_id, cancel).await?;
        let mut ids: Vec<String> = rosters
            .iter()
            .flat_map(|r| r.players.iter().flatten().cloned())
            .collect();
        ids.sort();
        ids.dedup();

        let directory: HashMap<String, Player> = self
            .players
            .lookup_players(&ids, cancel)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        Ok(rosters
            .into_iter()
            .map(|roster| {
                let players = roster
                    .players
                    .iter()
                    .flatten()
                    .filter_map(|id| directory.get(id).cloned())
                    .collect();
                (roster.roster_id.to_string(), players)
            })
            .collect())
    }

    #[instrument(name = "SleeperTransactions", skip(self, cancel))]
    async fn transactions(
        &self,
        league_id: &str,
        week: Option<u32>,
        cancel: &CancelToken,
    ) -> Result<Vec<Transaction>> {
        let league_id = required(league_id, "league_id")?;
        if let Some(week) = week {
            return self.week_transactions(league_id, week, cancel).await;
        }
        // Sleeper only serves transactions per week; newest week first.
        let current = self.current_week(cancel).await?;
        let weeks = try_join_all(
            (1..=current)
                .rev()
                .map(|week| self.week_transactions(league_id, week, cancel)),
        )
        .await?;
        debug!(weeks = current, "Merged weekly transaction feeds");
        Ok(weeks.into_iter().flatten().collect())
    }

    async fn transaction_players(
        &self,
        transaction: &Transaction,
        cancel: &CancelToken,
    ) -> Result<Vec<Player>> {
        if !transaction.moves_players() {
            return Ok(Vec::new());
        }
        self.players
            .lookup_players(&transaction.player_ids(), cancel)
            .await
    }

    #[instrument(name = "SleeperSearch", skip(self, cancel))]
    async fn search_leagues(
        &self,
        search: &LeagueSearch,
        cancel: &CancelToken,
    ) -> Result<Vec<League>> {
        let username = required(search.username.as_deref().unwrap_or_default(), "username")?;
        let season = required(&search.season, "season")?;
        let user: Option<WireUser> = self.fetch(&format!("/user/{username}"), cancel).await?;
        let user = found(user)?;
        let leagues: Vec<WireLeague> = self
            .fetch(
                &format!("/user/{}/leagues/{}/{}", user.user_id, self.sport, season),
                cancel,
            )
            .await?;
        Ok(leagues.into_iter().map(League::from).collect())
    }

    fn avatar_target(&self, avatar_id: &str) -> Result<String> {
        let avatar_id = required(avatar_id, "avatar_id")?;
        Ok(format!("{}/{}", self.avatar_base_url, avatar_id))
    }

    #[instrument(name = "SleeperAvatar", skip(self, cancel))]
    async fn avatar(&self, avatar_id: &str, cancel: &CancelToken) -> Result<Bytes> {
        let url = self.avatar_target(avatar_id)?;
        debug!("Requesting avatar from {}", url);
        with_retry(
            || get_bytes(SOURCE, self.client.get(&url), cancel),
            RETRIES,
            RETRY_DELAY_MS,
        )
        .await
    }
}
