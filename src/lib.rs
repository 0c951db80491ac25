pub mod cli;
pub mod core;
pub mod hooks;
pub mod providers;
pub mod query;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, info};

use crate::core::backend::Session;
use crate::core::cancel::CancelToken;
use crate::core::config::AppConfig;
use crate::core::models::{LeagueRef, LeagueSearch, TransactionFilter};
use crate::core::notify::{Notifications, Notifier};
use crate::hooks::{Hooks, Providers};
use crate::providers::{HttpBackend, SleeperProvider, YahooProvider};
use crate::query::QueryCache;

pub enum AppCommand {
    League(LeagueRef),
    Teams(LeagueRef),
    Roster(LeagueRef),
    Transactions {
        league: LeagueRef,
        week: Option<u32>,
        filter: TransactionFilter,
    },
    Search(LeagueSearch),
    Seasons(LeagueRef),
    TradeMarket(Option<String>),
    Saved,
    Save(LeagueRef),
    Remove(LeagueRef),
}

/// Wires the adapters, the shared cache and the session into one [`Hooks`].
pub fn build_hooks(config: &AppConfig, session: Session, notifier: Arc<dyn Notifier>) -> Hooks {
    let backend = Arc::new(HttpBackend::new(&config.backend.base_url, session.clone()));
    let sleeper = SleeperProvider::new(&config.providers.sleeper, backend.clone());
    let yahoo = YahooProvider::new(&config.yahoo_base_url(), session.clone());

    Hooks::new(
        Providers::new(Arc::new(sleeper), Arc::new(yahoo)),
        backend,
        QueryCache::new(config.cache.stale_time()),
        session,
        Notifications::ready(notifier),
    )
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("dynasty-dash starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let hooks = build_hooks(
        &config,
        config.backend.session(),
        Arc::new(cli::ui::ConsoleNotifier),
    );
    let cancel = CancelToken::new();

    match command {
        AppCommand::League(league) => cli::league::show_league(&hooks, &league, &cancel).await,
        AppCommand::Teams(league) => cli::league::show_teams(&hooks, &league, &cancel).await,
        AppCommand::Roster(league) => cli::league::show_roster(&hooks, &league, &cancel).await,
        AppCommand::Transactions {
            league,
            week,
            filter,
        } => cli::activity::show_transactions(&hooks, &league, week, filter, &cancel).await,
        AppCommand::Search(search) => cli::league::show_search(&hooks, &search, &cancel).await,
        AppCommand::Seasons(league) => cli::league::show_seasons(&hooks, &league, &cancel).await,
        AppCommand::TradeMarket(search) => {
            cli::activity::show_trade_market(&hooks, search.as_deref(), &cancel).await
        }
        AppCommand::Saved => cli::account::show_saved(&hooks, &cancel).await,
        AppCommand::Save(league) => cli::account::save(&hooks, &league, &cancel).await,
        AppCommand::Remove(league) => cli::account::remove(&hooks, &league, &cancel).await,
    }
}
