use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand, ValueEnum};
use dynasty_dash::cli::setup::setup;
use dynasty_dash::core::log::init_logging;
use dynasty_dash::core::models::{LeagueRef, LeagueSearch, Platform, TransactionFilter};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Sleeper,
    Yahoo,
}

impl From<PlatformArg> for Platform {
    fn from(arg: PlatformArg) -> Platform {
        match arg {
            PlatformArg::Sleeper => Platform::Sleeper,
            PlatformArg::Yahoo => Platform::Yahoo,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KindArg {
    All,
    Trade,
    FreeAgent,
    Commissioner,
}

impl From<KindArg> for TransactionFilter {
    fn from(arg: KindArg) -> TransactionFilter {
        match arg {
            KindArg::All => TransactionFilter::All,
            KindArg::Trade => TransactionFilter::Trade,
            KindArg::FreeAgent => TransactionFilter::FreeAgent,
            KindArg::Commissioner => TransactionFilter::Commissioner,
        }
    }
}

#[derive(Args)]
struct LeagueArgs {
    /// Sleeper league id or Yahoo league key
    league_id: String,

    #[arg(short, long, value_enum, default_value = "sleeper")]
    platform: PlatformArg,
}

impl From<LeagueArgs> for LeagueRef {
    fn from(args: LeagueArgs) -> LeagueRef {
        LeagueRef::new(args.platform.into(), args.league_id)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show league settings
    League(LeagueArgs),
    /// Show standings
    Teams(LeagueArgs),
    /// Show every team's players
    Roster(LeagueArgs),
    /// Show league transactions
    Transactions {
        #[command(flatten)]
        league: LeagueArgs,
        /// Only this week's transactions
        #[arg(short, long)]
        week: Option<u32>,
        #[arg(short, long, value_enum, default_value = "all")]
        kind: KindArg,
    },
    /// Find a user's leagues for a season
    Search {
        season: String,
        /// Sleeper username
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long, value_enum, default_value = "sleeper")]
        platform: PlatformArg,
    },
    /// Show a league's earlier seasons
    Seasons(LeagueArgs),
    /// Show recent trades across leagues
    TradeMarket {
        /// Player name to search for
        search: Option<String>,
    },
    /// Show saved leagues
    Saved,
    /// Save a league to the account
    Save(LeagueArgs),
    /// Remove a saved league
    Remove(LeagueArgs),
}

impl From<Commands> for dynasty_dash::AppCommand {
    fn from(cmd: Commands) -> dynasty_dash::AppCommand {
        use dynasty_dash::AppCommand;
        match cmd {
            Commands::League(args) => AppCommand::League(args.into()),
            Commands::Teams(args) => AppCommand::Teams(args.into()),
            Commands::Roster(args) => AppCommand::Roster(args.into()),
            Commands::Transactions { league, week, kind } => AppCommand::Transactions {
                league: league.into(),
                week,
                filter: kind.into(),
            },
            Commands::Search {
                season,
                username,
                platform,
            } => AppCommand::Search(LeagueSearch {
                platform: platform.into(),
                username,
                season,
            }),
            Commands::Seasons(args) => AppCommand::Seasons(args.into()),
            Commands::TradeMarket { search } => AppCommand::TradeMarket(search),
            Commands::Saved => AppCommand::Saved,
            Commands::Save(args) => AppCommand::Save(args.into()),
            Commands::Remove(args) => AppCommand::Remove(args.into()),
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => setup(),
        Some(cmd) => dynasty_dash::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
