use clap::{Parser, Subcommand};
use eventrepo::cli::{self as prog_cli, Command, OutputMode};
use eventrepo::config::StoreConfig;
use eventrepo::repository::EventRepository;
use eventrepo::{logger, seed, store};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "eventrepo", version, about = "Geo-searchable event store CLI", long_about = None)]
struct Cli {
    #[arg(long, help = "Path to a config file (TOML). Falls back to EVENTREPO_CONFIG, then ./eventrepo.toml.")]
    config: Option<PathBuf>,
    #[arg(long, value_name = "N", help = "Insert N fake events before running the command")]
    seed: Option<usize>,
    #[arg(long, help = "Print results as JSON")]
    json: bool,
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    #[command(about = "List every event within DISTANCE metres of a point")]
    Nearby {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        distance: f64,
    },
    #[command(name = "nearby-page", about = "Fetch one page (1-based) of nearby events")]
    NearbyPage {
        #[arg(allow_negative_numbers = true)]
        lon: f64,
        #[arg(allow_negative_numbers = true)]
        lat: f64,
        distance: f64,
        page_size: usize,
        page: usize,
    },
    #[command(about = "Show one event")]
    Get { id: String },
    #[command(about = "Count one more visitor")]
    Visit { id: String },
    #[command(about = "Set the visitor counter back to zero")]
    Reset {
        id: String,
        #[arg(long, help = "Fail on concurrent increments instead of overwriting them")]
        checked: bool,
    },
    #[command(about = "Show collection and counters")]
    Info,
}

impl From<Cmd> for Command {
    fn from(cmd: Cmd) -> Self {
        match cmd {
            Cmd::Nearby { lon, lat, distance } => Self::Nearby { lon, lat, distance },
            Cmd::NearbyPage { lon, lat, distance, page_size, page } => {
                Self::NearbyPage { lon, lat, distance, page_size, page }
            }
            Cmd::Get { id } => Self::Get { id },
            Cmd::Visit { id } => Self::Visit { id },
            Cmd::Reset { id, checked } => Self::Reset { id, checked },
            Cmd::Info => Self::Info,
        }
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = StoreConfig::load(cli.config.as_deref())?;
    if let Err(e) = logger::init_from_config(&config.logging) {
        eprintln!("logging disabled: {e}");
    }
    log::info!("starting with {config:?}");
    let shared = store::connect(&config)?;
    let repo = EventRepository::open(shared, &config).await?;
    if let Some(n) = cli.seed {
        seed::seed_repository(&repo, n).await?;
    }
    let mode = if cli.json { OutputMode::Json } else { OutputMode::Human };
    let outcome = prog_cli::run(&repo, cli.command.into(), mode).await;
    repo.shutdown().await?;
    outcome?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
