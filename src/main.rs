use kwci::cli::commands::{CliArgs, Commands};
use kwci::cli::handlers::{
    handle_check, handle_env, handle_last_sync, handle_projects, handle_xsync,
};
use kwci::util::logging::{init_logging, parse_level, LoggingConfig, LOG_JSON_ENV, LOG_LEVEL_ENV};
use kwci::{KwciConfig, NAME, VERSION};

use clap::Parser;
use std::env;
use std::process;
use tracing::{debug, error, Level};

#[tokio::main]
async fn main() {
    let args = CliArgs::parse();
    let config = KwciConfig::load(args.config.as_deref());

    init_logging_from_args(&args, config.as_ref().ok());

    debug!("{} v{} starting", NAME, VERSION);
    debug!("Arguments: {:?}", args);

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            error!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let exit_code = match &args.command {
        Commands::Env(env_args) => handle_env(env_args, &config).await,
        Commands::LastSync(sync_args) => handle_last_sync(sync_args, &config).await,
        Commands::Xsync(xsync_args) => handle_xsync(xsync_args, &config).await,
        Commands::Projects(projects_args) => handle_projects(projects_args, &config).await,
        Commands::Check(check_args) => handle_check(check_args, &config),
    };

    process::exit(exit_code);
}

/// `--log-level`, then `-v`/`-q`, then `KWCI_LOG_LEVEL` (already folded into the config)
fn init_logging_from_args(args: &CliArgs, config: Option<&KwciConfig>) {
    let level = if let Some(level_str) = &args.log_level {
        parse_level(level_str)
    } else if args.verbose {
        Level::DEBUG
    } else if args.quiet {
        Level::ERROR
    } else if let Some(config) = config {
        parse_level(&config.log_level)
    } else {
        env::var(LOG_LEVEL_ENV)
            .map(|l| parse_level(&l))
            .unwrap_or(Level::INFO)
    };

    let use_json = env::var(LOG_JSON_ENV)
        .ok()
        .and_then(|v| v.parse::<bool>().ok())
        .unwrap_or(false);

    init_logging(LoggingConfig {
        level,
        use_json,
        ..Default::default()
    });
}
