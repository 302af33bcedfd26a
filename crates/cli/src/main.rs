use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};

use flashscore_db::MongoConnector;
use flashscore_kernel::settings::{LoadOptions, OnExisting, Settings};
use flashscore_kernel::BootstrapError;

/// Exit code for failures outside the bootstrap error taxonomy.
const EXIT_INTERNAL: u8 = 1;

#[derive(Debug, Parser)]
#[command(
    name = "flashscore-init",
    version,
    about = "Create the flashscore admin principal and collection in MongoDB"
)]
struct Cli {
    /// Directory holding base.toml and <env>.toml
    #[arg(long, global = true, env = "FLASHSCORE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Deployment environment: local, staging or production
    #[arg(long = "env", global = true, env = "FLASHSCORE_ENV")]
    environment: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Ensure the principal and collection exist (default)
    Run(RunArgs),
    /// Check that a previous run left the deployment in the expected state
    Verify,
    /// Print the effective settings with credentials redacted
    ShowConfig,
}

#[derive(Debug, Default, Args)]
struct RunArgs {
    #[arg(long)]
    host: Option<String>,
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    database: Option<String>,
    #[arg(long)]
    collection: Option<String>,
    /// Behaviour when the principal or collection already exists
    #[arg(long, value_enum)]
    on_existing: Option<OnExistingArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OnExistingArg {
    Skip,
    Fail,
}

impl From<OnExistingArg> for OnExisting {
    fn from(value: OnExistingArg) -> Self {
        match value {
            OnExistingArg::Skip => OnExisting::Skip,
            OnExistingArg::Fail => OnExisting::Fail,
        }
    }
}

impl RunArgs {
    fn apply(self, settings: &mut Settings) {
        if let Some(host) = self.host {
            settings.database.host = host;
        }
        if let Some(port) = self.port {
            settings.database.port = port;
        }
        if let Some(database) = self.database {
            settings.database.name = database;
        }
        if let Some(collection) = self.collection {
            settings.collection.name = collection;
        }
        if let Some(policy) = self.on_existing {
            settings.bootstrap.on_existing = policy.into();
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let settings = match Settings::load_with(&LoadOptions {
        config_dir: cli.config_dir.clone(),
        environment: cli.environment.clone(),
    })
    .context("failed to load flashscore settings")
    {
        Ok(settings) => settings,
        Err(err) => return fail(BootstrapError::config(format!("{err:#}"))),
    };

    let result = match cli.command.unwrap_or(Command::Run(RunArgs::default())) {
        Command::ShowConfig => return show_config(&settings),
        Command::Run(args) => match start(&settings) {
            Some(runtime) => runtime.block_on(run(args, settings)),
            None => return ExitCode::from(EXIT_INTERNAL),
        },
        Command::Verify => match start(&settings) {
            Some(runtime) => runtime.block_on(check(settings)),
            None => return ExitCode::from(EXIT_INTERNAL),
        },
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(err),
    }
}

/// Install telemetry and build the runtime the engine commands run on.
fn start(settings: &Settings) -> Option<tokio::runtime::Runtime> {
    if let Err(err) = flashscore_telemetry::init(&settings.telemetry) {
        eprintln!("error: {err:#}");
        return None;
    }

    match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => Some(runtime),
        Err(err) => {
            tracing::error!(error = %err, "failed to start async runtime");
            None
        }
    }
}

async fn run(args: RunArgs, mut settings: Settings) -> Result<(), BootstrapError> {
    args.apply(&mut settings);
    let report = flashscore_init::bootstrap(&settings, &MongoConnector).await?;
    print!("{report}");
    Ok(())
}

async fn check(settings: Settings) -> Result<(), BootstrapError> {
    settings.validate()?;
    let report = flashscore_init::verify(&settings, &MongoConnector).await?;
    print!("{report}");
    report.into_result().map(|_| ())
}

fn fail(err: BootstrapError) -> ExitCode {
    tracing::error!(error = %err, exit_code = err.exit_code(), "flashscore-init failed");
    eprintln!("error: {err}");
    ExitCode::from(err.exit_code())
}

fn show_config(settings: &Settings) -> ExitCode {
    match serde_json::to_string_pretty(settings) {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: failed to render settings: {err}");
            ExitCode::from(EXIT_INTERNAL)
        }
    }
}
