use super::ui;
use crate::core::cancel::CancelToken;
use crate::core::models::{League, LeagueRef, LeagueSearch, Player, SeasonLink, Team};
use crate::hooks::Hooks;
use anyhow::Result;
use comfy_table::Cell;

pub fn league_table(league: &League) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Setting"), ui::header_cell("Value")]);

    let rows = [
        ("Platform", league.league.platform.to_string()),
        ("League ID", league.league.league_id.clone()),
        ("Season", league.season.clone()),
        ("Status", league.status.clone().unwrap_or_default()),
        ("Sport", league.sport.clone().unwrap_or_default()),
        (
            "Previous league",
            league.previous_league_id.clone().unwrap_or_default(),
        ),
        ("Roster", league.roster_positions.join(", ")),
    ];
    for (label, value) in rows {
        table.add_row(vec![Cell::new(label), Cell::new(value)]);
    }
    table.add_row(vec![
        Cell::new("Teams"),
        ui::format_optional_cell(league.num_teams, |n| n.to_string()),
    ]);
    table.add_row(vec![
        Cell::new("Scoring rules"),
        ui::number_cell(league.scoring_settings.len()),
    ]);
    table.to_string()
}

/// Standings, best record first.
pub fn teams_table(teams: &[Team]) -> String {
    let mut sorted: Vec<&Team> = teams.iter().collect();
    sorted.sort_by(|a, b| {
        b.record
            .wins
            .cmp(&a.record.wins)
            .then(a.record.losses.cmp(&b.record.losses))
            .then(a.name.cmp(&b.name))
    });

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("#"),
        ui::header_cell("Team"),
        ui::header_cell("Owner"),
        ui::header_cell("W-L-T"),
        ui::header_cell("Players"),
    ]);
    for (rank, team) in sorted.iter().enumerate() {
        let record = &team.record;
        table.add_row(vec![
            ui::number_cell(rank + 1),
            Cell::new(&team.name),
            ui::format_optional_cell(team.owner.display_name.as_deref(), str::to_string),
            Cell::new(format!("{}-{}-{}", record.wins, record.losses, record.ties)),
            ui::number_cell(team.player_ids.len()),
        ]);
    }
    table.to_string()
}

pub fn players_table(players: &[Player]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Player"),
        ui::header_cell("Pos"),
        ui::header_cell("ID"),
    ]);
    for player in players {
        table.add_row(vec![
            Cell::new(player.full_name()),
            Cell::new(&player.position),
            Cell::new(&player.id),
        ]);
    }
    table.to_string()
}

pub fn seasons_table(seasons: &[SeasonLink]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Season"), ui::header_cell("League ID")]);
    for link in seasons {
        table.add_row(vec![Cell::new(&link.season), Cell::new(&link.league_id)]);
    }
    table.to_string()
}

pub fn leagues_table(leagues: &[League]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("League"),
        ui::header_cell("Platform"),
        ui::header_cell("ID"),
        ui::header_cell("Season"),
        ui::header_cell("Teams"),
    ]);
    for league in leagues {
        table.add_row(vec![
            Cell::new(&league.name),
            Cell::new(league.league.platform.to_string()),
            Cell::new(&league.league.league_id),
            Cell::new(&league.season),
            ui::format_optional_cell(league.num_teams, |n| n.to_string()),
        ]);
    }
    table.to_string()
}

pub async fn show_league(hooks: &Hooks, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
    let pb = ui::new_spinner("Loading league");
    let state = hooks.league_info(league, cancel).await;
    pb.finish_and_clear();

    match ui::resolve(state, "league")? {
        Some(info) => {
            println!("\n{}", ui::style_text(&info.name, ui::StyleType::Title));
            println!("{}", league_table(&info));
        }
        None => println!("No league id given."),
    }
    Ok(())
}

pub async fn show_teams(hooks: &Hooks, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
    let pb = ui::new_spinner("Loading teams");
    let state = hooks.teams(league, cancel).await;
    pb.finish_and_clear();

    match ui::resolve(state, "teams")? {
        Some(teams) if !teams.is_empty() => println!("{}", teams_table(&teams)),
        _ => println!("No teams found for {league}."),
    }
    Ok(())
}

pub async fn show_roster(hooks: &Hooks, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
    let pb = ui::new_spinner("Loading rosters");
    let (teams, players) = tokio::join!(
        hooks.teams(league, cancel),
        hooks.players_by_team(league, cancel)
    );
    pb.finish_and_clear();

    let (Some(teams), Some(players)) = (
        ui::resolve(teams, "teams")?,
        ui::resolve(players, "rosters")?,
    ) else {
        println!("No rosters found for {league}.");
        return Ok(());
    };

    let num_teams = teams.len();
    for (i, team) in teams.iter().enumerate() {
        println!("\n{}", ui::style_text(&team.name, ui::StyleType::Title));
        match players.get(&team.team_id) {
            Some(roster) if !roster.is_empty() => println!("{}", players_table(roster)),
            _ => println!("{}", ui::style_text("Empty roster", ui::StyleType::Subtle)),
        }
        if i < num_teams - 1 {
            ui::print_separator();
        }
    }
    Ok(())
}

pub async fn show_seasons(hooks: &Hooks, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
    let pb = ui::new_spinner("Walking league history");
    let state = hooks.previous_seasons(league, cancel).await;
    pb.finish_and_clear();

    match ui::resolve(state, "league history")? {
        Some(seasons) if !seasons.is_empty() => println!("{}", seasons_table(&seasons)),
        _ => println!("No seasons found for {league}."),
    }
    Ok(())
}

pub async fn show_search(hooks: &Hooks, search: &LeagueSearch, cancel: &CancelToken) -> Result<()> {
    let pb = ui::new_spinner("Searching leagues");
    let state = hooks.search_leagues(search, cancel).await;
    pb.finish_and_clear();

    if state.is_idle() && state.error.is_none() {
        println!(
            "{}",
            ui::style_text(
                "Search needs a season, plus a username for Sleeper or a signed-in account for Yahoo.",
                ui::StyleType::Error
            )
        );
        return Ok(());
    }
    match ui::resolve(state, "leagues")? {
        Some(leagues) if !leagues.is_empty() => println!("{}", leagues_table(&leagues)),
        _ => println!("No {} leagues found for {}.", search.platform, search.season),
    }
    Ok(())
}
