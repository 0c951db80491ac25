use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, instrument, warn};

use crate::core::backend::{
    AccountBackend, AuthUser, Credentials, SavedLeagues, SavedTeam, Session, SignUp,
};
use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result, Source};
use crate::core::models::{LeagueRef, Platform, Player, Profile, TradeMarketEntry};
use crate::core::normalize::OneOrMany;
use crate::providers::util::{get_json, http_client, read_json, send};

const AUTH_HEADER: &str = "Authentication";

/// The application's own server.
pub struct HttpBackend {
    base_url: String,
    client: Client,
    session: Session,
}

impl HttpBackend {
    pub fn new(base_url: &str, session: Session) -> Self {
        HttpBackend {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: http_client(),
            session,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn get(&self, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Requesting {}", url);
        self.authorized(self.client.get(url))
    }

    fn post(&self, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Posting to {}", url);
        self.authorized(self.client.post(url))
    }

    fn delete(&self, endpoint: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, endpoint);
        debug!("Deleting {}", url);
        self.authorized(self.client.delete(url))
    }

    fn league_endpoint(league: &LeagueRef) -> String {
        match league.platform {
            Platform::Sleeper => format!("/sleeper_league/{}", league.league_id),
            Platform::Yahoo => format!("/yahoo/league/{}", league.league_id),
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WirePlayer {
    #[serde(default)]
    id: String,
    #[serde(default)]
    first_name: String,
    #[serde(default)]
    last_name: String,
    #[serde(default)]
    position: Option<String>,
}

impl From<WirePlayer> for Player {
    fn from(p: WirePlayer) -> Self {
        Player {
            id: p.id,
            first_name: p.first_name,
            last_name: p.last_name,
            position: p.position.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PlayersResponse {
    /// One match list per requested id; single matches may arrive unwrapped.
    players: Option<Vec<OneOrMany<WirePlayer>>>,
    #[serde(default)]
    missing_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct TradeMarketRecord {
    #[serde(alias = "_id")]
    transaction_id: String,
    league_id: Option<String>,
    /// Milliseconds since the epoch.
    status_updated: Option<i64>,
    #[serde(default)]
    trades: Vec<Vec<WirePlayer>>,
}

fn millis_to_utc(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

impl From<TradeMarketRecord> for TradeMarketEntry {
    fn from(record: TradeMarketRecord) -> Self {
        TradeMarketEntry {
            transaction_id: record.transaction_id,
            league_id: record.league_id,
            status_updated: record.status_updated.and_then(millis_to_utc),
            sides: record
                .trades
                .into_iter()
                .map(|side| side.into_iter().map(Player::from).collect())
                .collect(),
        }
    }
}

#[async_trait]
impl AccountBackend for HttpBackend {
    #[instrument(name = "BackendLogin", skip(self, credentials, cancel), fields(email = %credentials.email))]
    async fn login(&self, credentials: &Credentials, cancel: &CancelToken) -> Result<AuthUser> {
        let request = self.post("/auth/login").json(credentials);
        let response = send(Source::Backend, request, cancel).await?;
        let token = response
            .headers()
            .get(AUTH_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.trim_start_matches("Bearer ").to_string());
        let body: Option<LoginResponse> = read_json(Source::Backend, response, cancel).await.ok();
        let username = body
            .and_then(|b| b.username)
            .unwrap_or_else(|| credentials.email.clone());
        Ok(AuthUser { username, token })
    }

    async fn signup(&self, signup: &SignUp, cancel: &CancelToken) -> Result<()> {
        let request = self.post("/auth/signup").json(signup);
        send(Source::Backend, request, cancel).await?;
        Ok(())
    }

    async fn change_username(&self, username: &str, cancel: &CancelToken) -> Result<()> {
        let url = format!("{}/user/username", self.base_url);
        debug!("Patching {}", url);
        let request = self
            .authorized(self.client.patch(url))
            .json(&json!({ "username": username }));
        send(Source::Backend, request, cancel).await?;
        Ok(())
    }

    #[instrument(name = "BackendSaveLeague", skip(self, cancel), fields(league = %league))]
    async fn save_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
        let request = self.post("/auth/addLeague").json(&json!({
            "league": { "platform": league.platform, "id": league.league_id }
        }));
        send(Source::Backend, request, cancel).await?;
        Ok(())
    }

    #[instrument(name = "BackendDeleteLeague", skip(self, cancel), fields(league = %league))]
    async fn delete_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
        let request = self.delete(&Self::league_endpoint(league));
        send(Source::Backend, request, cancel).await?;
        Ok(())
    }

    async fn saved_leagues(&self, cancel: &CancelToken) -> Result<SavedLeagues> {
        get_json(Source::Backend, self.get("/user/leagues"), cancel).await
    }

    #[instrument(name = "BackendIsUserLeague", skip(self, cancel), fields(league = %league))]
    async fn is_user_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<bool> {
        let request = self.get(&Self::league_endpoint(league));
        match send(Source::Backend, request, cancel).await {
            Ok(response) => {
                let body: serde_json::Value = read_json(Source::Backend, response, cancel)
                    .await
                    .unwrap_or(serde_json::Value::Null);
                Ok(!body.is_null())
            }
            Err(err) if err.status_code() == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn logout(&self, cancel: &CancelToken) -> Result<()> {
        send(Source::Backend, self.post("/auth/logout"), cancel).await?;
        Ok(())
    }

    #[instrument(name = "BackendSaveTeam", skip(self, cancel))]
    async fn save_team(&self, league_id: &str, user_id: &str, cancel: &CancelToken) -> Result<()> {
        let request = self.post("/sleeper_league/").json(&json!({
            "league": { "league_id": league_id, "user_id": user_id }
        }));
        send(Source::Backend, request, cancel).await?;
        Ok(())
    }

    #[instrument(name = "BackendSavedTeam", skip(self, cancel))]
    async fn saved_team(&self, league_id: &str, cancel: &CancelToken) -> Result<Option<SavedTeam>> {
        let request = self.get(&format!("/sleeper_league/{league_id}"));
        match get_json(Source::Backend, request, cancel).await {
            Ok(team) => Ok(team),
            Err(err) if err.status_code() == Some(StatusCode::NOT_FOUND.as_u16()) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn unlink_yahoo(&self, cancel: &CancelToken) -> Result<()> {
        send(Source::Backend, self.delete("/yahoo/unlink"), cancel).await?;
        Ok(())
    }

    async fn profile(&self, cancel: &CancelToken) -> Result<Profile> {
        get_json(Source::Backend, self.get("/user/profile"), cancel).await
    }

    async fn trade_market(
        &self,
        search: Option<&str>,
        limit: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<TradeMarketEntry>> {
        let mut request = self
            .get("/sleeper_trade_market")
            .query(&[("limit", limit.to_string())]);
        if let Some(text) = search.map(str::trim).filter(|s| !s.is_empty()) {
            request = request.query(&[("searchText", text)]);
        }
        let records: Vec<TradeMarketRecord> = get_json(Source::Backend, request, cancel).await?;
        Ok(records.into_iter().map(TradeMarketEntry::from).collect())
    }

    #[instrument(name = "BackendLookupPlayers", skip(self, cancel), fields(count = player_ids.len()))]
    async fn lookup_players(
        &self,
        player_ids: &[String],
        cancel: &CancelToken,
    ) -> Result<Vec<Player>> {
        if player_ids.is_empty() {
            return Ok(Vec::new());
        }
        let endpoint = format!("/sleeper_player/{}", player_ids.join("&"));
        let response: PlayersResponse = get_json(Source::Backend, self.get(&endpoint), cancel).await?;
        if !response.missing_ids.is_empty() {
            debug!(missing = ?response.missing_ids, "Backend has no record for some players");
        }
        let Some(players) = response.players else {
            warn!("Player lookup returned no players field, treating as empty");
            return Ok(Vec::new());
        };
        Ok(players
            .into_iter()
            .flat_map(OneOrMany::into_vec)
            .map(Player::from)
            .collect())
    }
}
