//! Yahoo Fantasy, reached through the owned backend's OAuth proxy.
//!
//! Yahoo payloads are XML converted to JSON upstream, so any repeated
//! element arrives as an object when it occurs once and as an array
//! otherwise, and numbers may arrive as strings.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use futures::future::try_join_all;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use tracing::{debug, instrument};

use crate::core::backend::Session;
use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result, Source};
use crate::core::models::{
    AvatarRef, League, LeagueRef, LeagueSearch, Owner, Platform, Player, PlayersByTeam, Team,
    TeamRecord, Transaction, TransactionKind,
};
use crate::core::normalize::OneOrMany;
use crate::core::provider::LeagueProvider;
use crate::providers::util::{get_bytes, get_json, http_client};

const SOURCE: Source = Source::Platform(Platform::Yahoo);

pub struct YahooProvider {
    base_url: String,
    client: Client,
    session: Session,
}

impl YahooProvider {
    pub fn new(base_url: &str, session: Session) -> Self {
        YahooProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(),
            session,
        }
    }

    fn request(&self, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Requesting {}", url);
        let request = self.client.get(url);
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn fetch<T: DeserializeOwned>(&self, endpoint: &str, cancel: &CancelToken) -> Result<T> {
        get_json(SOURCE, self.request(endpoint), cancel).await
    }

    async fn league_with_teams(&self, league_key: &str, cancel: &CancelToken) -> Result<WireLeague> {
        let league_key = required(league_key, "league_key")?;
        self.fetch(&format!("/leagues/{league_key}/teams"), cancel)
            .await
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

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    fn text(&self) -> String {
        match self {
            Scalar::Int(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Text(s) => s.clone(),
        }
    }

    fn int(&self) -> Option<i64> {
        match self {
            Scalar::Int(n) => Some(*n),
            Scalar::Float(n) => Some(*n as i64),
            Scalar::Text(s) => s.trim().parse().ok(),
        }
    }

    fn count(&self) -> u32 {
        self.int().and_then(|n| u32::try_from(n).ok()).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct WireLeagues {
    #[serde(default)]
    leagues: Vec<WireLeague>,
}

#[derive(Debug, Deserialize)]
struct WireLeague {
    league_key: String,
    #[serde(default)]
    name: String,
    season: Option<Scalar>,
    game_code: Option<String>,
    draft_status: Option<String>,
    num_teams: Option<Scalar>,
    logo_url: Option<String>,
    renew: Option<String>,
    standings: Option<WireStandings>,
    teams: Option<WireTeams>,
}

#[derive(Debug, Deserialize)]
struct WireStandings {
    teams: WireTeams,
}

#[derive(Debug, Deserialize)]
struct WireTeams {
    #[serde(default)]
    team: OneOrMany<WireTeam>,
}

#[derive(Debug, Deserialize)]
struct WireManagers {
    #[serde(default)]
    manager: OneOrMany<WireManager>,
}

#[derive(Debug, Deserialize)]
struct WireManager {
    guid: Option<String>,
    nickname: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTeamLogos {
    #[serde(default)]
    team_logo: OneOrMany<WireTeamLogo>,
}

#[derive(Debug, Deserialize)]
struct WireTeamLogo {
    url: String,
}

#[derive(Debug, Deserialize)]
struct WireOutcomeTotals {
    wins: Option<Scalar>,
    losses: Option<Scalar>,
    ties: Option<Scalar>,
}

#[derive(Debug, Deserialize)]
struct WireTeamStandings {
    outcome_totals: Option<WireOutcomeTotals>,
}

#[derive(Debug, Deserialize)]
struct WireTeam {
    team_key: String,
    #[serde(default)]
    name: String,
    managers: Option<WireManagers>,
    team_logos: Option<WireTeamLogos>,
    team_standings: Option<WireTeamStandings>,
}

#[derive(Debug, Deserialize)]
struct WireName {
    #[serde(default)]
    first: String,
    #[serde(default)]
    last: String,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    player_key: String,
    name: WireName,
    display_position: Option<String>,
    transaction_data: Option<OneOrMany<WireTransactionData>>,
}

impl WirePlayer {
    fn to_player(&self) -> Player {
        Player {
            id: self.player_key.clone(),
            first_name: self.name.first.clone(),
            last_name: self.name.last.clone(),
            position: self.display_position.clone().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct WirePlayers {
    #[serde(default)]
    player: OneOrMany<WirePlayer>,
}

#[derive(Debug, Deserialize)]
struct WireRoster {
    players: Option<WirePlayers>,
}

#[derive(Debug, Deserialize)]
struct WireRosterTeam {
    roster: Option<WireRoster>,
}

/// The proxy has shipped the roster both at the top level and nested in `team`.
#[derive(Debug, Deserialize)]
struct WireRosterResponse {
    roster: Option<WireRoster>,
    team: Option<WireRosterTeam>,
}

impl WireRosterResponse {
    fn into_players(self) -> Vec<Player> {
        self.roster
            .or_else(|| self.team.and_then(|t| t.roster))
            .and_then(|r| r.players)
            .map(|p| p.player.into_vec().iter().map(WirePlayer::to_player).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct WireTransactionData {
    #[serde(rename = "type")]
    kind: String,
    source_team_key: Option<String>,
    destination_team_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireTransaction {
    transaction_key: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    status: String,
    timestamp: Option<Scalar>,
    players: Option<WirePlayers>,
}

#[derive(Debug, Deserialize)]
struct WireTransactionList {
    #[serde(default)]
    transaction: OneOrMany<WireTransaction>,
}

#[derive(Debug, Deserialize)]
struct WireTransactions {
    transactions: Option<WireTransactionList>,
}

fn seconds_to_utc(seconds: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(seconds, 0).single()
}

impl From<&WireLeague> for League {
    fn from(l: &WireLeague) -> Self {
        League {
            league: LeagueRef::yahoo(l.league_key.clone()),
            name: l.name.clone(),
            season: l.season.as_ref().map(Scalar::text).unwrap_or_default(),
            status: l.draft_status.clone(),
            sport: l.game_code.clone(),
            num_teams: l.num_teams.as_ref().map(Scalar::count),
            avatar: l
                .logo_url
                .clone()
                .filter(|url| !url.is_empty())
                .map(|url| AvatarRef::new(Platform::Yahoo, url)),
            previous_league_id: previous_league_key(l),
            roster_positions: Vec::new(),
            scoring_settings: BTreeMap::new(),
        }
    }
}

/// `renew` is `"{game_id}_{league_id}"` of the previous season, empty for the first.
fn previous_league_key(league: &WireLeague) -> Option<String> {
    let (game_id, league_id) = league.renew.as_deref()?.split_once('_')?;
    if game_id.is_empty() || league_id.is_empty() {
        return None;
    }
    Some(format!("{game_id}.l.{league_id}"))
}

impl From<WireTeam> for Team {
    fn from(t: WireTeam) -> Self {
        let manager = t
            .managers
            .and_then(|m| m.manager.into_vec().into_iter().next());
        let logo = t
            .team_logos
            .and_then(|l| l.team_logo.into_vec().into_iter().next());
        let totals = t.team_standings.and_then(|s| s.outcome_totals);
        let count = |value: Option<&Scalar>| value.map(Scalar::count).unwrap_or_default();
        Team {
            team_id: t.team_key,
            name: t.name,
            owner: Owner {
                id: manager.as_ref().and_then(|m| m.guid.clone()),
                display_name: manager.and_then(|m| m.nickname),
            },
            avatar: logo.map(|l| AvatarRef::new(Platform::Yahoo, l.url)),
            record: TeamRecord {
                wins: count(totals.as_ref().and_then(|t| t.wins.as_ref())),
                losses: count(totals.as_ref().and_then(|t| t.losses.as_ref())),
                ties: count(totals.as_ref().and_then(|t| t.ties.as_ref())),
            },
            player_ids: Vec::new(),
        }
    }
}

impl From<WireTransaction> for Transaction {
    fn from(t: WireTransaction) -> Self {
        let mut adds = BTreeMap::new();
        let mut drops = BTreeMap::new();
        let mut team_ids: Vec<String> = Vec::new();
        let mut players = Vec::new();

        let wire_players = t.players.map(|p| p.player.into_vec()).unwrap_or_default();
        for wire in wire_players {
            players.push(wire.to_player());
            let moves = wire
                .transaction_data
                .map(OneOrMany::into_vec)
                .unwrap_or_default();
            for data in moves {
                if let Some(team) = data.destination_team_key.filter(|k| !k.is_empty()) {
                    adds.insert(wire.player_key.clone(), team.clone());
                    team_ids.push(team);
                }
                if let Some(team) = data.source_team_key.filter(|k| !k.is_empty()) {
                    if data.kind != "add" {
                        drops.insert(wire.player_key.clone(), team.clone());
                    }
                    team_ids.push(team);
                }
            }
        }
        team_ids.sort();
        team_ids.dedup();

        Transaction {
            transaction_id: t.transaction_key,
            kind: TransactionKind::parse(&t.kind),
            status: t.status,
            week: None,
            team_ids,
            adds,
            drops,
            draft_picks: Vec::new(),
            players,
            updated_at: t
                .timestamp
                .as_ref()
                .and_then(Scalar::int)
                .and_then(seconds_to_utc),
        }
    }
}

#[async_trait]
impl LeagueProvider for YahooProvider {
    fn platform(&self) -> Platform {
        Platform::Yahoo
    }

    #[instrument(name = "YahooLeague", skip(self, cancel))]
    async fn league(&self, league_key: &str, cancel: &CancelToken) -> Result<League> {
        let league = self.league_with_teams(league_key, cancel).await?;
        Ok(League::from(&league))
    }

    #[instrument(name = "YahooTeams", skip(self, cancel))]
    async fn teams(&self, league_key: &str, cancel: &CancelToken) -> Result<Vec<Team>> {
        let league = self.league_with_teams(league_key, cancel).await?;
        // standings carry the win/loss record; plain teams are the fallback
        let teams = league
            .standings
            .map(|s| s.teams)
            .or(league.teams)
            .map(|t| t.team.into_vec())
            .unwrap_or_default();
        Ok(teams.into_iter().map(Team::from).collect())
    }

    #[instrument(name = "YahooPlayersByTeam", skip(self, cancel))]
    async fn players_by_team(
        &self,
        league_key: &str,
        cancel: &CancelToken,
    ) -> Result<PlayersByTeam> {
        let teams = self.teams(league_key, cancel).await?;
        let rosters = try_join_all(teams.iter().map(|team| async move {
            let roster: WireRosterResponse = self
                .fetch(&format!("/roster/{}", team.team_id), cancel)
                .await?;
            Ok::<_, Error>((team.team_id.clone(), roster.into_players()))
        }))
        .await?;
        Ok(rosters.into_iter().collect())
    }

    #[instrument(name = "YahooTransactions", skip(self, cancel))]
    async fn transactions(
        &self,
        league_key: &str,
        week: Option<u32>,
        cancel: &CancelToken,
    ) -> Result<Vec<Transaction>> {
        let league_key = required(league_key, "league_key")?;
        if week.is_some() {
            return Err(Error::Unsupported {
                platform: Platform::Yahoo,
                operation: "weekly transactions",
            });
        }
        let response: Option<WireTransactions> = self
            .fetch(&format!("/league/{league_key}/transactions"), cancel)
            .await?;
        Ok(response
            .and_then(|r| r.transactions)
            .map(|list| list.transaction.into_vec())
            .unwrap_or_default()
            .into_iter()
            .map(Transaction::from)
            .collect())
    }

    async fn transaction_players(
        &self,
        transaction: &Transaction,
        _cancel: &CancelToken,
    ) -> Result<Vec<Player>> {
        Ok(transaction.players.clone())
    }

    #[instrument(name = "YahooSearch", skip(self, cancel))]
    async fn search_leagues(
        &self,
        search: &LeagueSearch,
        cancel: &CancelToken,
    ) -> Result<Vec<League>> {
        let season = required(&search.season, "season")?;
        let response: WireLeagues = self.fetch("/leagues", cancel).await?;
        Ok(response
            .leagues
            .iter()
            .filter(|l| l.season.as_ref().map(Scalar::text).as_deref() == Some(season))
            .map(League::from)
            .collect())
    }

    fn avatar_target(&self, avatar_id: &str) -> Result<String> {
        required(avatar_id, "avatar_id").map(str::to_string)
    }

    #[instrument(name = "YahooAvatar", skip(self, cancel))]
    async fn avatar(&self, avatar_id: &str, cancel: &CancelToken) -> Result<Bytes> {
        let url = self.avatar_target(avatar_id)?;
        debug!("Requesting avatar from {}", url);
        get_bytes(SOURCE, self.client.get(&url), cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(server: &MockServer) -> YahooProvider {
        YahooProvider::new(
            &format!("{}/yahoo", server.uri()),
            Session::with_user("kobe", Some("tok".into())),
        )
    }

    async fn mount_json(server: &MockServer, at: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(at))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(server)
            .await;
    }

    const LEAGUE_WITH_ONE_TEAM: &str = r#"{
        "league_key": "454.l.1",
        "name": "Yahoo Hoops",
        "season": "2025",
        "game_code": "nba",
        "num_teams": "1",
        "logo_url": "https://yimg.com/logo.png",
        "renew": "428_99",
        "standings": {
            "teams": {
                "team": {
                    "team_key": "454.l.1.t.1",
                    "name": "Splash",
                    "managers": {"manager": {"guid": "g1", "nickname": "steph"}},
                    "team_logos": {"team_logo": [{"size": "large", "url": "https://yimg.com/t1.png"}]},
                    "team_standings": {"outcome_totals": {"wins": "5", "losses": 2, "ties": 0}}
                }
            }
        }
    }"#;

    #[tokio::test]
    async fn test_league_normalizes_scalar_fields() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yahoo/leagues/454.l.1/teams"))
            .and(header("authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200).set_body_string(LEAGUE_WITH_ONE_TEAM))
            .mount(&server)
            .await;

        let league = provider(&server)
            .league("454.l.1", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(league.league, LeagueRef::yahoo("454.l.1"));
        assert_eq!(league.season, "2025");
        assert_eq!(league.num_teams, Some(1));
        assert_eq!(league.previous_league_id.as_deref(), Some("428.l.99"));
        assert_eq!(
            league.avatar,
            Some(AvatarRef::new(Platform::Yahoo, "https://yimg.com/logo.png"))
        );
    }

    #[tokio::test]
    async fn test_single_team_is_normalized_to_list() {
        let server = MockServer::start().await;
        mount_json(&server, "/yahoo/leagues/454.l.1/teams", LEAGUE_WITH_ONE_TEAM).await;

        let teams = provider(&server)
            .teams("454.l.1", &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(teams.len(), 1);
        assert_eq!(teams[0].team_id, "454.l.1.t.1");
        assert_eq!(teams[0].owner.display_name.as_deref(), Some("steph"));
        assert_eq!(teams[0].record.wins, 5);
        assert_eq!(teams[0].record.losses, 2);
        assert_eq!(
            teams[0].avatar,
            Some(AvatarRef::new(Platform::Yahoo, "https://yimg.com/t1.png"))
        );
    }

    #[tokio::test]
    async fn test_players_by_team_fetches_each_roster() {
        let server = MockServer::start().await;
        mount_json(&server, "/yahoo/leagues/454.l.1/teams", LEAGUE_WITH_ONE_TEAM).await;
        mount_json(
            &server,
            "/yahoo/roster/454.l.1.t.1",
            r#"{"team": {"roster": {"players": {"player": [
                {"player_key": "454.p.1", "name": {"full": "Stephen Curry", "first": "Stephen", "last": "Curry"}, "display_position": "PG"},
                {"player_key": "454.p.2", "name": {"full": "Draymond Green", "first": "Draymond", "last": "Green"}, "display_position": "PF"}
            ]}}}}"#,
        )
        .await;

        let by_team = provider(&server)
            .players_by_team("454.l.1", &CancelToken::new())
            .await
            .unwrap();
        let roster = &by_team["454.l.1.t.1"];
        assert_eq!(roster.len(), 2);
        assert_eq!(roster[1].full_name(), "Draymond Green");
        assert_eq!(roster[0].position, "PG");
    }

    #[tokio::test]
    async fn test_transactions_embed_players() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/yahoo/league/454.l.1/transactions",
            r#"{"transactions": {"transaction": {
                "transaction_key": "454.l.1.tr.7",
                "type": "add/drop",
                "status": "successful",
                "timestamp": "1700000000",
                "players": {"player": [
                    {"player_key": "454.p.1", "name": {"first": "Jalen", "last": "Brunson"},
                     "transaction_data": {"type": "add", "source_type": "freeagents", "destination_team_key": "454.l.1.t.2"}},
                    {"player_key": "454.p.2", "name": {"first": "Josh", "last": "Hart"},
                     "transaction_data": {"type": "drop", "source_team_key": "454.l.1.t.2", "destination_type": "waivers"}}
                ]}
            }}}"#,
        )
        .await;

        let provider = provider(&server);
        let cancel = CancelToken::new();
        let transactions = provider.transactions("454.l.1", None, &cancel).await.unwrap();
        assert_eq!(transactions.len(), 1);
        let tx = &transactions[0];
        assert_eq!(tx.kind, TransactionKind::FreeAgent);
        assert_eq!(tx.adds.get("454.p.1").map(String::as_str), Some("454.l.1.t.2"));
        assert_eq!(tx.drops.get("454.p.2").map(String::as_str), Some("454.l.1.t.2"));
        assert_eq!(tx.team_ids, vec!["454.l.1.t.2".to_string()]);
        assert_eq!(tx.updated_at.map(|t| t.timestamp()), Some(1_700_000_000));

        let players = provider.transaction_players(tx, &cancel).await.unwrap();
        assert_eq!(players.len(), 2);
        assert_eq!(players[0].full_name(), "Jalen Brunson");
    }

    #[tokio::test]
    async fn test_weekly_transactions_unsupported() {
        let server = MockServer::start().await;
        let err = provider(&server)
            .transactions("454.l.1", Some(3), &CancelToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Unsupported { platform: Platform::Yahoo, .. }));
    }

    #[tokio::test]
    async fn test_search_filters_by_season() {
        let server = MockServer::start().await;
        mount_json(
            &server,
            "/yahoo/leagues",
            r#"{"leagues": [
                {"league_key": "454.l.1", "name": "Now", "season": 2025},
                {"league_key": "428.l.9", "name": "Then", "season": 2024}
            ]}"#,
        )
        .await;

        let search = LeagueSearch {
            platform: Platform::Yahoo,
            username: None,
            season: "2024".into(),
        };
        let leagues = provider(&server)
            .search_leagues(&search, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(leagues.len(), 1);
        assert_eq!(leagues[0].name, "Then");
    }

    #[tokio::test]
    async fn test_unlinked_account_is_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/yahoo/leagues"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let search = LeagueSearch {
            platform: Platform::Yahoo,
            username: None,
            season: "2025".into(),
        };
        let err = provider(&server)
            .search_leagues(&search, &CancelToken::new())
            .await
            .unwrap_err();
        assert_eq!(
            err,
            Error::Upstream {
                platform: Platform::Yahoo,
                status_code: 403,
                status_text: "Forbidden".into()
            }
        );
    }

    #[test]
    fn test_avatar_target_is_the_url() {
        let provider = YahooProvider::new("http://localhost/yahoo", Session::new());
        assert_eq!(
            provider.avatar_target("https://yimg.com/a.png").unwrap(),
            "https://yimg.com/a.png"
        );
        assert_eq!(
            provider.avatar_target("").unwrap_err(),
            Error::MissingParameter("avatar_id")
        );
    }
}
