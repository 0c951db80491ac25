use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Hooks, Providers};
use crate::core::backend::{
    AccountBackend, AuthUser, Credentials, SavedLeagues, SavedTeam, Session, SignUp,
};
use crate::core::cancel::CancelToken;
use crate::core::error::{Error, Result, Source};
use crate::core::models::{
    League, LeagueRef, LeagueSearch, Owner, Platform, Player, PlayersByTeam, Profile, Team,
    TeamRecord, TradeMarketEntry, Transaction, TransactionKind,
};
use crate::core::notify::Notifications;
use crate::core::notify::testing::RecordingNotifier;
use crate::query::QueryCache;

pub fn league(platform: Platform, id: &str, season: &str, previous: Option<&str>) -> League {
    League {
        league: LeagueRef::new(platform, id),
        name: format!("League {id}"),
        season: season.to_string(),
        status: Some("in_season".to_string()),
        sport: Some("nba".to_string()),
        num_teams: Some(2),
        avatar: None,
        previous_league_id: previous.map(str::to_string),
        roster_positions: vec![],
        scoring_settings: BTreeMap::new(),
    }
}

pub fn player(id: &str) -> Player {
    Player {
        id: id.to_string(),
        first_name: "Player".to_string(),
        last_name: id.to_string(),
        position: "PG".to_string(),
    }
}

pub fn transaction(id: &str, kind: TransactionKind, week: Option<u32>, adds: &[&str]) -> Transaction {
    Transaction {
        transaction_id: id.to_string(),
        kind,
        status: "complete".to_string(),
        week,
        team_ids: vec!["1".to_string()],
        adds: adds.iter().map(|p| (p.to_string(), "1".to_string())).collect(),
        drops: BTreeMap::new(),
        draft_picks: vec![],
        players: vec![],
        updated_at: None,
    }
}

/// In-process adapter that counts every call.
pub struct MockProvider {
    pub platform: Platform,
    pub calls: AtomicUsize,
    pub delay: Duration,
    pub leagues: HashMap<String, League>,
    pub fail_with: Mutex<Option<Error>>,
}

impl MockProvider {
    pub fn new(platform: Platform) -> Self {
        Self {
            platform,
            calls: AtomicUsize::new(0),
            delay: Duration::from_millis(20),
            leagues: HashMap::new(),
            fail_with: Mutex::new(None),
        }
    }

    pub fn with_league(mut self, league: League) -> Self {
        self.leagues.insert(league.league.league_id.clone(), league);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, error: Error) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    async fn enter(&self, cancel: &CancelToken) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        cancel.run(async {
            tokio::time::sleep(self.delay).await;
            Ok(())
        })
        .await?;
        match self.fail_with.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn not_found(&self) -> Error {
        Error::status(Source::Platform(self.platform), 404, "Not Found")
    }
}

#[async_trait]
impl crate::core::provider::LeagueProvider for MockProvider {
    fn platform(&self) -> Platform {
        self.platform
    }

    async fn league(&self, league_id: &str, cancel: &CancelToken) -> Result<League> {
        self.enter(cancel).await?;
        self.leagues.get(league_id).cloned().ok_or_else(|| self.not_found())
    }

    async fn teams(&self, league_id: &str, cancel: &CancelToken) -> Result<Vec<Team>> {
        self.enter(cancel).await?;
        Ok(vec![Team {
            team_id: "1".to_string(),
            name: format!("{league_id} team"),
            owner: Owner {
                id: Some("u1".to_string()),
                display_name: Some("kobe".to_string()),
            },
            avatar: None,
            record: TeamRecord::default(),
            player_ids: vec!["p1".to_string()],
        }])
    }

    async fn players_by_team(
        &self,
        _league_id: &str,
        cancel: &CancelToken,
    ) -> Result<PlayersByTeam> {
        self.enter(cancel).await?;
        Ok(BTreeMap::from([("1".to_string(), vec![player("p1")])]))
    }

    async fn transactions(
        &self,
        _league_id: &str,
        week: Option<u32>,
        cancel: &CancelToken,
    ) -> Result<Vec<Transaction>> {
        self.enter(cancel).await?;
        Ok(vec![
            transaction("t1", TransactionKind::Trade, week, &["p1"]),
            transaction("t2", TransactionKind::FreeAgent, week, &["p2"]),
            transaction("t3", TransactionKind::Commissioner, week, &[]),
        ])
    }

    async fn transaction_players(
        &self,
        transaction: &Transaction,
        cancel: &CancelToken,
    ) -> Result<Vec<Player>> {
        self.enter(cancel).await?;
        Ok(transaction.player_ids().iter().map(|id| player(id)).collect())
    }

    async fn search_leagues(
        &self,
        search: &LeagueSearch,
        cancel: &CancelToken,
    ) -> Result<Vec<League>> {
        self.enter(cancel).await?;
        let mut found: Vec<League> = self
            .leagues
            .values()
            .filter(|l| l.season == search.season)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.league.cmp(&b.league));
        Ok(found)
    }

    fn avatar_target(&self, avatar_id: &str) -> Result<String> {
        Ok(format!("mock://{avatar_id}"))
    }

    async fn avatar(&self, avatar_id: &str, cancel: &CancelToken) -> Result<Bytes> {
        self.enter(cancel).await?;
        Ok(Bytes::from(avatar_id.as_bytes().to_vec()))
    }
}

/// In-process backend keeping saved leagues in memory.
pub struct MockBackend {
    pub calls: AtomicUsize,
    pub saved: Mutex<Vec<LeagueRef>>,
    /// Saved Sleeper teams, league id to user id.
    pub teams: Mutex<HashMap<String, String>>,
    pub username: Mutex<String>,
    pub logouts: AtomicUsize,
    pub fail_with: Mutex<Option<Error>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            saved: Mutex::new(Vec::new()),
            teams: Mutex::new(HashMap::new()),
            username: Mutex::new("kobe".to_string()),
            logouts: AtomicUsize::new(0),
            fail_with: Mutex::new(None),
        }
    }
}

impl MockBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, error: Error) {
        *self.fail_with.lock().unwrap() = Some(error);
    }

    async fn enter(&self, cancel: &CancelToken) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        cancel
            .run(async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(())
            })
            .await?;
        match self.fail_with.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl AccountBackend for MockBackend {
    async fn login(&self, credentials: &Credentials, cancel: &CancelToken) -> Result<AuthUser> {
        self.enter(cancel).await?;
        if credentials.password != "hunter2" {
            return Err(Error::status(Source::Backend, 401, "Unauthorized"));
        }
        Ok(AuthUser {
            username: self.username.lock().unwrap().clone(),
            token: Some("token-1".to_string()),
        })
    }

    async fn signup(&self, signup: &SignUp, cancel: &CancelToken) -> Result<()> {
        self.enter(cancel).await?;
        if signup.username.is_empty() {
            return Err(Error::status(Source::Backend, 400, "Bad Request"));
        }
        Ok(())
    }

    async fn change_username(&self, username: &str, cancel: &CancelToken) -> Result<()> {
        self.enter(cancel).await?;
        *self.username.lock().unwrap() = username.to_string();
        Ok(())
    }

    async fn save_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
        self.enter(cancel).await?;
        let mut saved = self.saved.lock().unwrap();
        if !saved.contains(league) {
            saved.push(league.clone());
        }
        Ok(())
    }

    async fn delete_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
        self.enter(cancel).await?;
        self.saved.lock().unwrap().retain(|l| l != league);
        Ok(())
    }

    async fn saved_leagues(&self, cancel: &CancelToken) -> Result<SavedLeagues> {
        self.enter(cancel).await?;
        Ok(SavedLeagues {
            leagues: self.saved.lock().unwrap().clone(),
        })
    }

    async fn is_user_league(&self, league: &LeagueRef, cancel: &CancelToken) -> Result<bool> {
        self.enter(cancel).await?;
        Ok(self.saved.lock().unwrap().contains(league))
    }

    async fn logout(&self, cancel: &CancelToken) -> Result<()> {
        self.enter(cancel).await?;
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn save_team(&self, league_id: &str, user_id: &str, cancel: &CancelToken) -> Result<()> {
        self.enter(cancel).await?;
        self.teams
            .lock()
            .unwrap()
            .insert(league_id.to_string(), user_id.to_string());
        let league = LeagueRef::sleeper(league_id);
        let mut saved = self.saved.lock().unwrap();
        if !saved.contains(&league) {
            saved.push(league);
        }
        Ok(())
    }

    async fn saved_team(&self, league_id: &str, cancel: &CancelToken) -> Result<Option<SavedTeam>> {
        self.enter(cancel).await?;
        Ok(self.teams.lock().unwrap().get(league_id).map(|user| SavedTeam {
            league_id: league_id.to_string(),
            saved_user: user.clone(),
            platform: Some("sleeper".to_string()),
        }))
    }

    async fn unlink_yahoo(&self, cancel: &CancelToken) -> Result<()> {
        self.enter(cancel).await
    }

    async fn profile(&self, cancel: &CancelToken) -> Result<Profile> {
        self.enter(cancel).await?;
        Ok(Profile {
            username: self.username.lock().unwrap().clone(),
            email: Some("kobe@example.com".to_string()),
        })
    }

    async fn trade_market(
        &self,
        search: Option<&str>,
        limit: u32,
        cancel: &CancelToken,
    ) -> Result<Vec<TradeMarketEntry>> {
        self.enter(cancel).await?;
        Ok((0..limit.min(2))
            .map(|n| TradeMarketEntry {
                transaction_id: format!("{}-{n}", search.unwrap_or("any")),
                league_id: None,
                status_updated: None,
                sides: vec![vec![player("p1")], vec![player("p2")]],
            })
            .collect())
    }

    async fn lookup_players(&self, player_ids: &[String], cancel: &CancelToken) -> Result<Vec<Player>> {
        self.enter(cancel).await?;
        Ok(player_ids.iter().map(|id| player(id)).collect())
    }
}

pub struct Fixture {
    pub hooks: Hooks,
    pub sleeper: Arc<MockProvider>,
    pub yahoo: Arc<MockProvider>,
    pub backend: Arc<MockBackend>,
    pub notifier: Arc<RecordingNotifier>,
}

pub fn fixture_with(sleeper: MockProvider, yahoo: MockProvider, logged_in: bool) -> Fixture {
    let sleeper = Arc::new(sleeper);
    let yahoo = Arc::new(yahoo);
    let backend = Arc::new(MockBackend::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let session = if logged_in {
        Session::with_user("kobe", Some("token-0".to_string()))
    } else {
        Session::new()
    };
    let hooks = Hooks::new(
        Providers::new(sleeper.clone(), yahoo.clone()),
        backend.clone(),
        QueryCache::default(),
        session,
        Notifications::ready(notifier.clone()),
    );
    Fixture {
        hooks,
        sleeper,
        yahoo,
        backend,
        notifier,
    }
}

pub fn fixture(logged_in: bool) -> Fixture {
    fixture_with(
        MockProvider::new(Platform::Sleeper).with_league(league(Platform::Sleeper, "100", "2024", None)),
        MockProvider::new(Platform::Yahoo),
        logged_in,
    )
}
