mod commands;

use clap::{Parser, Subcommand};
use flipit_core::FlipItError;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "flipit")]
#[command(about = "FlipIt - coin-toss wagering against the FlipIt contract")]
#[command(version)]
struct Cli {
    /// Data directory for the simulated chain state
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Account to play as (defaults to the first chain account)
    #[arg(short, long, global = true)]
    account: Option<String>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Submit a wager on a coin toss
    Toss {
        /// heads or tails
        choice: String,
        /// Wager amount
        amount: String,
        /// Denomination of the amount (wei, gwei, finney, ether, ...)
        #[arg(short = 'n', long, default_value = "ether")]
        denomination: String,
    },
    /// Claim an unresolved win
    Claim {
        /// Query id of the win; defaults to the unclaimed win from a stats query
        query_id: Option<String>,
    },
    /// Show game statistics
    Stats,
    /// Show the active player account
    Account,
    /// Show recent contract events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
    },
    /// Game administration commands
    #[command(subcommand)]
    Admin(commands::AdminCommands),
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "flipit={},flipit_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("flipit")
    });

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    // Bring up the game session
    let game = commands::GameContext::open(&data_dir, cli.account.as_deref()).await?;

    // Execute command
    let result = match cli.command {
        Commands::Toss {
            choice,
            amount,
            denomination,
        } => commands::toss(&game, &choice, &amount, &denomination).await,
        Commands::Claim { query_id } => commands::claim(&game, query_id.as_deref()).await,
        Commands::Stats => commands::stats(&game).await,
        Commands::Account => commands::account(&game).await,
        Commands::Events { limit } => commands::events(&game, limit),
        Commands::Admin(cmd) => commands::handle_admin_command(cmd, &game).await,
    };

    // The chain is the source of truth; persist whatever it recorded, even
    // for commands that ended in a revert.
    game.save()?;

    if let Err(e) = result {
        match e {
            FlipItError::HeadsOrTails => {
                eprintln!("Error: choice must be 'heads' or 'tails'");
            }
            FlipItError::MinimumWager { wagered, minimum } => {
                eprintln!("Error: wager below the minimum");
                eprintln!("Wagered: {} wei, Minimum: {} wei", wagered, minimum);
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
