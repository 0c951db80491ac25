use super::ui;
use crate::core::cancel::CancelToken;
use crate::core::models::{
    LeagueRef, Player, TradeMarketEntry, Transaction, TransactionFilter, TransactionKind,
};
use crate::hooks::Hooks;
use anyhow::Result;
use comfy_table::Cell;
use futures::future::join_all;
use std::collections::HashMap;

fn kind_label(kind: &TransactionKind) -> String {
    match kind {
        TransactionKind::Trade => "Trade".to_string(),
        TransactionKind::FreeAgent => "Free agent".to_string(),
        TransactionKind::Waiver => "Waiver".to_string(),
        TransactionKind::Commissioner => "Commissioner".to_string(),
        TransactionKind::Other(raw) => raw.clone(),
    }
}

fn player_names(ids: impl Iterator<Item = String>, names: &HashMap<String, String>) -> String {
    ids.map(|id| names.get(&id).cloned().unwrap_or(id))
        .collect::<Vec<_>>()
        .join(", ")
}

/// One row per transaction. `names` maps player ids to display names; ids
/// without a name are shown as-is.
pub fn transactions_table(transactions: &[Transaction], names: &HashMap<String, String>) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Week"),
        ui::header_cell("Type"),
        ui::header_cell("Status"),
        ui::header_cell("Adds"),
        ui::header_cell("Drops"),
        ui::header_cell("Picks"),
        ui::header_cell("Updated"),
    ]);
    for tx in transactions {
        table.add_row(vec![
            ui::format_optional_cell(tx.week, |w| w.to_string()),
            Cell::new(kind_label(&tx.kind)),
            Cell::new(&tx.status),
            Cell::new(player_names(tx.adds.keys().cloned(), names)),
            Cell::new(player_names(tx.drops.keys().cloned(), names)),
            ui::number_cell(tx.draft_picks.len()),
            ui::format_optional_cell(tx.updated_at, |at| at.format("%Y-%m-%d").to_string()),
        ]);
    }
    table.to_string()
}

pub fn trade_market_table(entries: &[TradeMarketEntry]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Date"),
        ui::header_cell("League"),
        ui::header_cell("Side A"),
        ui::header_cell("Side B"),
    ]);
    let side = |players: Option<&Vec<Player>>| {
        players
            .map(|p| p.iter().map(Player::full_name).collect::<Vec<_>>().join(", "))
            .unwrap_or_default()
    };
    for entry in entries {
        table.add_row(vec![
            ui::format_optional_cell(entry.status_updated, |at| at.format("%Y-%m-%d").to_string()),
            ui::format_optional_cell(entry.league_id.as_deref(), str::to_string),
            Cell::new(side(entry.sides.first())),
            Cell::new(side(entry.sides.get(1))),
        ]);
    }
    table.to_string()
}

pub async fn show_transactions(
    hooks: &Hooks,
    league: &LeagueRef,
    week: Option<u32>,
    filter: TransactionFilter,
    cancel: &CancelToken,
) -> Result<()> {
    let pb = ui::new_spinner("Loading transactions");
    let state = hooks.transactions_of_kind(league, week, filter, cancel).await;
    let Some(transactions) = ui::resolve(state, "transactions")? else {
        pb.finish_and_clear();
        println!("No league id given.");
        return Ok(());
    };

    pb.set_message("Resolving players");
    let lookups = transactions
        .iter()
        .filter(|tx| tx.moves_players())
        .map(|tx| hooks.players_in_transaction(league, tx, cancel));
    let mut names = HashMap::new();
    for state in join_all(lookups).await {
        if let Some(players) = ui::resolve(state, "transaction players")? {
            for player in players.iter() {
                names.insert(player.id.clone(), player.full_name());
            }
        }
    }
    pb.finish_and_clear();

    if transactions.is_empty() {
        println!("No transactions found for {league}.");
    } else {
        println!("{}", transactions_table(&transactions, &names));
    }
    Ok(())
}

pub async fn show_trade_market(hooks: &Hooks, search: Option<&str>, cancel: &CancelToken) -> Result<()> {
    let pb = ui::new_spinner("Loading trade market");
    let state = hooks.trade_market(search, cancel).await;
    pb.finish_and_clear();

    match ui::resolve(state, "trade market")? {
        Some(entries) if !entries.is_empty() => println!("{}", trade_market_table(&entries)),
        _ => println!("No trades found."),
    }
    Ok(())
}
