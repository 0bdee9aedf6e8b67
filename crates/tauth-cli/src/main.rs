//! TAuth CLI - drive the session controller from the command line.

mod commands;
mod headless;
mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tauth_config::LogConfig;

/// TAuth CLI - issue nonces, exchange credentials and end sessions.
#[derive(Parser)]
#[command(name = "tauth")]
#[command(about = "TAuth CLI for session authentication")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to <config dir>/tauth/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Session service base URL
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Tenant id
    #[arg(long, global = true)]
    tenant: Option<String>,

    /// Identity client id
    #[arg(long, global = true)]
    client_id: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text", global = true)]
    format: output::OutputFormat,

    /// Log level (trace, debug, info, warn, error). Overrides the config file
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Also write JSONL logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the validated configuration
    Config,

    /// Issue a nonce from the session service
    Nonce,

    /// Exchange an identity credential for a session profile
    Exchange {
        /// Raw identity-provider credential (ID token)
        #[arg(short, long, env = "TAUTH_CREDENTIAL")]
        credential: String,
    },

    /// End the current session
    Logout,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let overrides = commands::Overrides {
        config_path: cli.config.clone(),
        base_url: cli.base_url.clone(),
        tenant_id: cli.tenant.clone(),
        client_id: cli.client_id.clone(),
        log_level: cli.log_level.clone(),
    };
    let config = match commands::load_config(&overrides) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&format!("{:#}", e), &cli.format);
            std::process::exit(1);
        }
    };

    let logging = tauth_config::init_logging_with(LogConfig {
        service_name: "cli".into(),
        default_level: config.log_level.clone(),
        log_path: cli.log_file.clone(),
        also_stderr: false,
    });
    if let Err(e) = logging {
        eprintln!("Warning: logging disabled: {}", e);
    }

    let result = match cli.command {
        Commands::Config => commands::show_config(&config, &cli.format),
        Commands::Nonce => commands::nonce(&config, &cli.format).await,
        Commands::Exchange { credential } => {
            commands::exchange(config, &credential, &cli.format).await
        }
        Commands::Logout => commands::logout(config, &cli.format).await,
    };

    if let Err(e) = result {
        output::print_error(&format!("{:#}", e), &cli.format);
        std::process::exit(1);
    }
}
