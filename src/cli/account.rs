use super::{league, ui};
use crate::core::cancel::CancelToken;
use crate::core::models::LeagueRef;
use crate::hooks::Hooks;
use anyhow::{Result, bail};

pub async fn show_saved(hooks: &Hooks, cancel: &CancelToken) -> Result<()> {
    if !hooks.session().is_logged_in() {
        bail!("Saved leagues need a signed-in account; set backend.username in the config");
    }

    let pb = ui::new_spinner("Loading saved leagues");
    let state = hooks.saved_league_details(cancel).await;
    pb.finish_and_clear();

    match ui::resolve(state, "saved leagues")? {
        Some(leagues) if !leagues.is_empty() => println!("{}", league::leagues_table(&leagues)),
        _ => println!("No saved leagues."),
    }
    Ok(())
}

pub async fn save(hooks: &Hooks, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
    let state = hooks.save_league(league, cancel).await;
    state.into_result()?;
    Ok(())
}

pub async fn remove(hooks: &Hooks, league: &LeagueRef, cancel: &CancelToken) -> Result<()> {
    let state = hooks.delete_league(league, cancel).await;
    state.into_result()?;
    Ok(())
}
