//! schedsrv - applies coil schedules to the configured Modbus TCP controller
//!
//! The trigger (cron, operator, another service) decides when to call `run`.

mod config;

use crate::config::Config;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use common::sqlite::SqliteClient;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};
use utility_modbus::{ModbusSession, TcpConnector};
use utility_schedule::{execute_schedule, ControllerConfigProvider, RunOutcome, SqliteRepository};

#[derive(Parser, Debug)]
#[command(author, version, about = "Schedsrv - Modbus coil schedule executor")]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Execute one schedule now
    Run {
        /// Schedule id
        #[arg(short, long)]
        schedule: i64,

        /// Coil state to apply to every point
        #[arg(long, value_enum)]
        status: CoilState,
    },
    /// Connect to the configured controller and optionally read coils
    Probe {
        /// First coil to read
        #[arg(long)]
        address: Option<u16>,

        /// Number of coils to read
        #[arg(long, default_value_t = 1)]
        count: u16,
    },
    /// Create the database tables
    InitDb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CoilState {
    On,
    Off,
}

impl From<CoilState> for bool {
    fn from(state: CoilState) -> bool {
        state == CoilState::On
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref())?;
    common::logging::init_with_config(&config.log_config())
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!("Starting schedsrv v{}", env!("CARGO_PKG_VERSION"));

    let client = SqliteClient::new(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path))?;
    let repo = Arc::new(SqliteRepository::from_client(
        &client,
        config.session_settings(),
    ));

    match args.command {
        Commands::Run { schedule, status } => run(&config, repo, schedule, status.into()).await,
        Commands::Probe { address, count } => probe(&repo, address, count).await,
        Commands::InitDb => {
            repo.init_schema().await?;
            info!("Database ready at {}", client.path());
            Ok(ExitCode::SUCCESS)
        },
    }
}

async fn run(
    config: &Config,
    repo: Arc<SqliteRepository>,
    schedule_id: i64,
    status: bool,
) -> anyhow::Result<ExitCode> {
    let report = execute_schedule(
        TcpConnector,
        repo,
        config.history.policy,
        schedule_id,
        status,
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&report)?);

    let ok = match report.outcome {
        RunOutcome::Completed { failed, .. } => failed == 0,
        RunOutcome::ScheduleInactive => true,
        _ => false,
    };
    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn probe(
    repo: &SqliteRepository,
    address: Option<u16>,
    count: u16,
) -> anyhow::Result<ExitCode> {
    let Some(controller) = repo.fetch_config().await? else {
        bail!("No PLC connection found in the database");
    };

    let mut session = match ModbusSession::open(&TcpConnector, &controller).await {
        Ok(session) => session,
        Err(e) => {
            error!("Probe failed: {}", e);
            return Ok(ExitCode::FAILURE);
        },
    };

    let read = match address {
        Some(address) => Some(session.read_coils(address, count).await),
        None => None,
    };
    session.close().await;

    match read {
        Some(Ok(coils)) => {
            for (offset, value) in coils.iter().enumerate() {
                println!("coil {}: {}", usize::from(address.unwrap_or(0)) + offset, value);
            }
            Ok(ExitCode::SUCCESS)
        },
        Some(Err(e)) => {
            warn!("Coil read from {} failed: {}", controller.endpoint(), e);
            Ok(ExitCode::FAILURE)
        },
        None => {
            println!("{} reachable", controller.endpoint());
            Ok(ExitCode::SUCCESS)
        },
    }
}
