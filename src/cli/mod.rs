//! Terminal presentation for the `dynasty-dash` binary

pub mod account;
pub mod activity;
pub mod league;
pub mod setup;
pub mod ui;
