//! Cache keys.
//!
//! Each entity kind has exactly one constructor here, so two call sites that
//! ask for the same data always build structurally equal keys.

use crate::core::models::{AvatarRef, LeagueRef, LeagueSearch, Platform};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    LeagueInfo(LeagueRef),
    Teams(LeagueRef),
    PlayersByTeam(LeagueRef),
    Transactions {
        league: LeagueRef,
        week: Option<u32>,
    },
    TransactionPlayers {
        league: LeagueRef,
        transaction_id: String,
    },
    Avatar(AvatarRef),
    SavedLeagues,
    SavedLeagueDetails,
    IsUserLeague(LeagueRef),
    SavedTeam(LeagueRef),
    PreviousSeasons(LeagueRef),
    SearchLeagues(LeagueSearch),
    TradeMarket {
        search: Option<String>,
    },
    Profile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryKind {
    LeagueInfo,
    Teams,
    PlayersByTeam,
    Transactions,
    TransactionPlayers,
    Avatar,
    SavedLeagues,
    SavedLeagueDetails,
    IsUserLeague,
    SavedTeam,
    PreviousSeasons,
    SearchLeagues,
    TradeMarket,
    Profile,
}

impl QueryKey {
    pub fn kind(&self) -> QueryKind {
        match self {
            QueryKey::LeagueInfo(_) => QueryKind::LeagueInfo,
            QueryKey::Teams(_) => QueryKind::Teams,
            QueryKey::PlayersByTeam(_) => QueryKind::PlayersByTeam,
            QueryKey::Transactions { .. } => QueryKind::Transactions,
            QueryKey::TransactionPlayers { .. } => QueryKind::TransactionPlayers,
            QueryKey::Avatar(_) => QueryKind::Avatar,
            QueryKey::SavedLeagues => QueryKind::SavedLeagues,
            QueryKey::SavedLeagueDetails => QueryKind::SavedLeagueDetails,
            QueryKey::IsUserLeague(_) => QueryKind::IsUserLeague,
            QueryKey::SavedTeam(_) => QueryKind::SavedTeam,
            QueryKey::PreviousSeasons(_) => QueryKind::PreviousSeasons,
            QueryKey::SearchLeagues(_) => QueryKind::SearchLeagues,
            QueryKey::TradeMarket { .. } => QueryKind::TradeMarket,
            QueryKey::Profile => QueryKind::Profile,
        }
    }

    /// League this key is scoped to, if any.
    pub fn league(&self) -> Option<&LeagueRef> {
        match self {
            QueryKey::LeagueInfo(league)
            | QueryKey::Teams(league)
            | QueryKey::PlayersByTeam(league)
            | QueryKey::IsUserLeague(league)
            | QueryKey::SavedTeam(league)
            | QueryKey::PreviousSeasons(league)
            | QueryKey::Transactions { league, .. }
            | QueryKey::TransactionPlayers { league, .. } => Some(league),
            _ => None,
        }
    }
}

pub fn league_info(platform: Platform, league_id: &str) -> QueryKey {
    QueryKey::LeagueInfo(LeagueRef::new(platform, league_id))
}

pub fn teams(platform: Platform, league_id: &str) -> QueryKey {
    QueryKey::Teams(LeagueRef::new(platform, league_id))
}

pub fn players_by_team(platform: Platform, league_id: &str) -> QueryKey {
    QueryKey::PlayersByTeam(LeagueRef::new(platform, league_id))
}

pub fn transactions(platform: Platform, league_id: &str, week: Option<u32>) -> QueryKey {
    QueryKey::Transactions {
        league: LeagueRef::new(platform, league_id),
        week,
    }
}

pub fn transaction_players(platform: Platform, league_id: &str, transaction_id: &str) -> QueryKey {
    QueryKey::TransactionPlayers {
        league: LeagueRef::new(platform, league_id),
        transaction_id: transaction_id.to_string(),
    }
}

pub fn avatar(platform: Platform, avatar_id: &str) -> QueryKey {
    QueryKey::Avatar(AvatarRef::new(platform, avatar_id))
}

pub fn saved_leagues() -> QueryKey {
    QueryKey::SavedLeagues
}

pub fn saved_league_details() -> QueryKey {
    QueryKey::SavedLeagueDetails
}

pub fn is_user_league(platform: Platform, league_id: &str) -> QueryKey {
    QueryKey::IsUserLeague(LeagueRef::new(platform, league_id))
}

pub fn saved_team(platform: Platform, league_id: &str) -> QueryKey {
    QueryKey::SavedTeam(LeagueRef::new(platform, league_id))
}

pub fn previous_seasons(platform: Platform, league_id: &str) -> QueryKey {
    QueryKey::PreviousSeasons(LeagueRef::new(platform, league_id))
}

pub fn search_leagues(search: &LeagueSearch) -> QueryKey {
    QueryKey::SearchLeagues(search.clone())
}

/// Trimmed, lowercased search text; blank searches collapse to `None`.
pub fn normalize_search(search: Option<&str>) -> Option<String> {
    search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_lowercase)
}

pub fn trade_market(search: Option<&str>) -> QueryKey {
    QueryKey::TradeMarket {
        search: normalize_search(search),
    }
}

pub fn profile() -> QueryKey {
    QueryKey::Profile
}

/// Selects cache entries for invalidation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFilter {
    Exact(QueryKey),
    Kind(QueryKind),
    /// Every key scoped to the league.
    League(LeagueRef),
}

impl KeyFilter {
    pub fn matches(&self, key: &QueryKey) -> bool {
        match self {
            KeyFilter::Exact(expected) => expected == key,
            KeyFilter::Kind(kind) => key.kind() == *kind,
            KeyFilter::League(league) => key.league() == Some(league),
        }
    }
}

impl From<QueryKey> for KeyFilter {
    fn from(key: QueryKey) -> Self {
        KeyFilter::Exact(key)
    }
}

impl From<QueryKind> for KeyFilter {
    fn from(kind: QueryKind) -> Self {
        KeyFilter::Kind(kind)
    }
}
