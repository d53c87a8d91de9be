//! Lookout - an ad-hoc SQL console with a separate audit trail.

mod cli;
mod logging;
mod tui;

use cli::Cli;
use db_lookout::config::Config;
use db_lookout::console::{Console, Session};
use db_lookout::db::MockEngine;
use db_lookout::error::{LookoutError, Result};
use db_lookout::safety::StatementPolicy;
use std::process::ExitCode;
use tracing::{error, info};

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse_args();
    if cli.is_one_shot() {
        logging::init_stderr_logging();
    } else {
        logging::init_file_logging();
    }

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{}: {}", e.category(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = load_config(&cli)?;

    let console = if cli.mock_db {
        info!("Using the in-memory engine");
        Console::with_mock(&config, &MockEngine::new())?
    } else {
        Console::connect(&config)?
    };

    if cli.init_audit_table {
        console
            .audit_logger()
            .ensure_table()
            .await
            .map_err(|e| LookoutError::connection(e.to_string()))?;
        println!("Audit table {} is ready", console.audit_logger().table());
        return Ok(ExitCode::SUCCESS);
    }

    if let Some(query) = &cli.query {
        return Ok(run_once(&console, query, cli.visualize).await);
    }

    let app = tui::App::new(
        target_label(&cli, &config),
        config.console.statement_policy.to_string(),
    );
    tui::run(&console, app, &config.reference).await?;
    Ok(ExitCode::SUCCESS)
}

/// Loads the config file, then the environment, then CLI overrides.
fn load_config(cli: &Cli) -> Result<Config> {
    let path = cli.config_path();
    info!("Loading config from: {}", path.display());

    let mut config = Config::load_from_file(&path)?;
    config.apply_env_defaults(|key| std::env::var(key).ok());
    if cli.read_only {
        config.console.statement_policy = StatementPolicy::ReadOnly;
    }
    Ok(config)
}

fn target_label(cli: &Cli, config: &Config) -> String {
    if cli.mock_db {
        "in-memory".to_string()
    } else {
        config.profiles.data.display_string()
    }
}

/// Runs one query, prints the outcome, and reports success as the exit code.
async fn run_once(console: &Console, query: &str, visualize: bool) -> ExitCode {
    let mut session = Session::new();
    console.submit(&mut session, query).await;
    if visualize {
        console.open_visualizer(&mut session);
    }

    let view = session.view(console.renderer());
    if let Some(table) = &view.table {
        print!("{}", table.to_plain_text());
    }
    if let Some(handle) = &view.explorer {
        println!("Explorer payload written to {}", handle.location.display());
    }
    for notice in &view.notices {
        eprintln!("{}", notice);
    }

    if session.state().result().is_some() && view.notices.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
