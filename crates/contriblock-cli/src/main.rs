/*
[INPUT]:  CLI arguments, YAML configuration file, CONTRIBLOCK_* env, Ctrl-C
[OUTPUT]: Sign-in, sign-out and session inspection against the ContriBlock API
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, commands, or startup flow
*/

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use contriblock_cli::{App, CliConfig};

#[derive(Parser, Debug)]
#[command(name = "contriblock", version, about = "ContriBlock wallet sign-in client")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Overrides `session_dir` from the config
    #[arg(long = "session-dir", value_name = "PATH")]
    session_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in with an EVM key and store the session
    Login {
        /// Hex private key; falls back to CONTRIBLOCK_PRIVATE_KEY
        #[arg(long = "private-key", value_name = "HEX")]
        private_key: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// Validate the stored session and print the user
    Whoami,
    /// Print the stored session without contacting the API
    Status,
    /// Like whoami, but succeeds when signed out
    Restore,
    /// Validate configuration and exit
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(&args.log_level)?;

    let mut config = CliConfig::load(args.config_path.as_deref()).context("load config")?;
    if let Some(dir) = args.session_dir {
        config.session_dir = Some(dir);
    }
    config.validate().context("invalid configuration")?;
    info!(mode = ?config.mode, "configuration loaded");

    match args.command {
        Command::CheckConfig => {
            let yaml = serde_yaml::to_string(&config).context("serialize config")?;
            print!("{yaml}");
            println!("configuration OK");
        }
        Command::Login { private_key } => {
            let key = private_key.or_else(|| config.private_key.clone());
            let app = App::new(&config, key.as_deref())?;
            login(&app).await?;
        }
        Command::Logout => {
            let app = App::new(&config, None)?;
            app.logout();
            println!("logged out");
        }
        Command::Status => {
            let app = App::new(&config, None)?;
            match app.stored_session() {
                Some(session) => println!(
                    "signed in as {} since {}",
                    session.wallet_address,
                    session.issued_at.to_rfc3339()
                ),
                None => println!("not logged in"),
            }
        }
        Command::Whoami => {
            let app = App::new(&config, None)?;
            let user = app.restore().await?.ok_or_else(|| anyhow!("not logged in"))?;
            println!("{}", serde_json::to_string_pretty(&user)?);
        }
        Command::Restore => {
            let app = App::new(&config, None)?;
            match app.restore().await {
                Ok(Some(user)) => println!("session restored for {}", user.wallet),
                Ok(None) => println!("not logged in"),
                Err(err) => {
                    warn!(error = %err, "session could not be restored");
                    println!("not logged in");
                }
            }
        }
    }

    Ok(())
}

async fn login(app: &App) -> Result<()> {
    tokio::select! {
        result = app.login() => {
            let session = result?;
            let user = app.controller().current_user();
            println!("logged in as {}", session.wallet_address);
            if let Some(user) = user {
                println!("user id {} ({:?}, kyc {:?})", user.id, user.role, user.kyc_status);
            }
            Ok(())
        }
        _ = interrupted() => {
            app.abandon_login();
            bail!("login interrupted");
        }
    }
}

async fn interrupted() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install SIGINT handler");
        std::future::pending::<()>().await;
    }
    info!("received SIGINT");
}

fn init_tracing(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(())
}
