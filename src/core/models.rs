//! Shared domain shapes that both platform adapters normalize into

use crate::core::error::Error;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Sleeper,
    Yahoo,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Sleeper => "sleeper",
            Platform::Yahoo => "yahoo",
        }
    }
}

impl Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Platform::Sleeper => "Sleeper",
            Platform::Yahoo => "Yahoo",
        })
    }
}

impl FromStr for Platform {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sleeper" => Ok(Platform::Sleeper),
            "yahoo" => Ok(Platform::Yahoo),
            _ => Err(Error::UnknownSource(s.to_string())),
        }
    }
}

/// Identity of a league across platforms. Doubles as the saved-league record
/// returned by the owned backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeagueRef {
    pub platform: Platform,
    pub league_id: String,
}

impl LeagueRef {
    pub fn new(platform: Platform, league_id: impl Into<String>) -> Self {
        Self {
            platform,
            league_id: league_id.into(),
        }
    }

    pub fn sleeper(league_id: impl Into<String>) -> Self {
        Self::new(Platform::Sleeper, league_id)
    }

    pub fn yahoo(league_key: impl Into<String>) -> Self {
        Self::new(Platform::Yahoo, league_key)
    }

    pub fn is_complete(&self) -> bool {
        !self.league_id.trim().is_empty()
    }
}

impl Display for LeagueRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.platform.as_str(), self.league_id)
    }
}

/// Unresolved pointer to an avatar image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AvatarRef {
    pub platform: Platform,
    pub id: String,
}

impl AvatarRef {
    pub fn new(platform: Platform, id: impl Into<String>) -> Self {
        Self {
            platform,
            id: id.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct League {
    pub league: LeagueRef,
    pub name: String,
    pub season: String,
    pub status: Option<String>,
    pub sport: Option<String>,
    pub num_teams: Option<u32>,
    pub avatar: Option<AvatarRef>,
    /// Previous season's league id; `None` for the first season.
    pub previous_league_id: Option<String>,
    pub roster_positions: Vec<String>,
    pub scoring_settings: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub wins: u32,
    pub losses: u32,
    pub ties: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Sleeper roster id or Yahoo team key.
    pub team_id: String,
    pub name: String,
    pub owner: Owner,
    pub avatar: Option<AvatarRef>,
    pub record: TeamRecord,
    pub player_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub position: String,
}

impl Player {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_string()
    }
}

/// Players grouped by `Team::team_id`.
pub type PlayersByTeam = BTreeMap<String, Vec<Player>>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Trade,
    FreeAgent,
    Waiver,
    Commissioner,
    Other(String),
}

impl TransactionKind {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "trade" => TransactionKind::Trade,
            "free_agent" | "add" | "drop" | "add/drop" => TransactionKind::FreeAgent,
            "waiver" => TransactionKind::Waiver,
            // Sleeper misspells this one in some payloads
            "commissioner" | "commisioner" => TransactionKind::Commissioner,
            other => TransactionKind::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DraftPick {
    pub season: String,
    pub round: u32,
    pub original_team_id: String,
    pub previous_team_id: String,
    pub new_team_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: String,
    pub kind: TransactionKind,
    pub status: String,
    pub week: Option<u32>,
    pub team_ids: Vec<String>,
    /// player id -> receiving team id
    pub adds: BTreeMap<String, String>,
    /// player id -> releasing team id
    pub drops: BTreeMap<String, String>,
    pub draft_picks: Vec<DraftPick>,
    /// Players embedded in the payload by platforms that ship them inline.
    pub players: Vec<Player>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn moves_players(&self) -> bool {
        !self.adds.is_empty() || !self.drops.is_empty()
    }

    pub fn player_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.adds.keys().chain(self.drops.keys()).cloned().collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

/// Filter used by the transactions-of-kind projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionFilter {
    All,
    Trade,
    FreeAgent,
    Commissioner,
}

impl TransactionFilter {
    pub fn matches(&self, kind: &TransactionKind) -> bool {
        match self {
            TransactionFilter::All => true,
            TransactionFilter::Trade => *kind == TransactionKind::Trade,
            TransactionFilter::FreeAgent => *kind == TransactionKind::FreeAgent,
            TransactionFilter::Commissioner => *kind == TransactionKind::Commissioner,
        }
    }
}

/// Parameters for searching a user's leagues on one platform.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LeagueSearch {
    pub platform: Platform,
    /// Sleeper username; ignored by platforms that search the linked account.
    pub username: Option<String>,
    pub season: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeasonLink {
    pub league_id: String,
    pub season: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeMarketEntry {
    pub transaction_id: String,
    pub league_id: Option<String>,
    pub status_updated: Option<DateTime<Utc>>,
    /// One side of the trade per inner vector.
    pub sides: Vec<Vec<Player>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub email: Option<String>,
}
