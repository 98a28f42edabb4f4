//! Highway Healers Control - CLI shell for roadside emergency assistance

use anyhow::Result;
use clap::Parser;
use owo_colors::OwoColorize;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;
use tracing_subscriber::EnvFilter;

use healers_common::capability::{CapabilityAcquirer, DeviceCapabilities};
use healers_common::config::HealersConfig;
use healers_common::dispatch::DispatchController;
use healers_common::error::{EXIT_CONFIG, EXIT_SUCCESS};
use healers_common::flow_client::AiFlowClient;
use healers_common::flows::ResourceCounts;
use healers_common::sms::NotificationClient;
use healersctl::cli::{Cli, Commands};
use healersctl::commands;
use healersctl::errors::{error_details, exit_code_for};
use healersctl::logging::LogEntry;
use healersctl::shell::{SosOutcome, SosShell};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let started = Instant::now();
    let entry = LogEntry::new(cli.command.name(), std::env::args().skip(1).collect());

    let config = match HealersConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            init_tracing("warn");
            eprintln!("{} {:#}", "✗".bright_red(), e);
            let details = error_details(&e);
            entry
                .finish(EXIT_CONFIG, elapsed_ms(started), Some(details))
                .write(env_var);
            std::process::exit(EXIT_CONFIG);
        }
    };
    init_tracing(&config.log.level);
    info!("healersctl {} ({})", env!("HEALERS_VERSION"), cli.command.name());

    let (code, details) = match run(cli.command, &config).await {
        Ok(()) => (EXIT_SUCCESS, None),
        Err(e) => {
            eprintln!("{} {:#}", "✗".bright_red(), e);
            (exit_code_for(&e), Some(error_details(&e)))
        }
    };

    entry.finish(code, elapsed_ms(started), details).write(env_var);
    std::process::exit(code);
}

/// RUST_LOG wins over the configured level
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

/// Environment access for the invocation log, which is written even when
/// the config could not be loaded
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

async fn run(command: Commands, config: &HealersConfig) -> Result<()> {
    let mut stdout = io::stdout();

    match command {
        Commands::Sos { variant } => {
            let variant = variant.unwrap_or(config.dispatch.variant);
            let capabilities = Arc::new(DeviceCapabilities::from_config(&config.dispatch));
            let flows = AiFlowClient::from_config(&config.flow)?;
            let controller = DispatchController::from_config(&config.dispatch, capabilities, flows);
            let notifier = if config.sms.is_configured() {
                Some(NotificationClient::from_config(&config.sms)?)
            } else {
                None
            };

            let shell = SosShell::new(controller, notifier)
                .with_min_situation_chars(config.dispatch.min_situation_chars);
            let stdin = tokio::io::BufReader::new(tokio::io::stdin());
            match shell.run(variant, stdin, &mut stdout).await? {
                SosOutcome::HelpArrived(_) => info!("Help arrived"),
                SosOutcome::Closed { at } => info!("Flow closed at {:?}", at),
            }
            Ok(())
        }

        Commands::FirstAid { situation } => {
            let flows = AiFlowClient::from_config(&config.flow)?;
            commands::first_aid(
                &flows,
                config.dispatch.min_situation_chars,
                &situation,
                &mut stdout,
            )
            .await
        }

        Commands::Predict {
            scenario,
            ambulances,
            drones,
            doctors,
        } => {
            let flows = AiFlowClient::from_config(&config.flow)?;
            let counts = ResourceCounts {
                ambulances,
                drones,
                doctors,
            };
            commands::predict(
                &flows,
                config.dispatch.min_scenario_chars,
                &scenario,
                counts,
                &mut stdout,
            )
            .await
        }

        Commands::Sms { to, message } => {
            let client = NotificationClient::from_config(&config.sms)?;
            commands::sms(&client, &to, &message, &mut stdout).await?;
            Ok(())
        }

        Commands::Medicine {
            search,
            preorder,
            yes,
        } => commands::medicine(
            search.as_deref(),
            preorder.as_deref(),
            |prompt| yes || confirm(prompt),
            &mut stdout,
        ),

        Commands::Map { locate } => {
            let capabilities = DeviceCapabilities::from_config(&config.dispatch);
            let capabilities: Option<&dyn CapabilityAcquirer> = if locate {
                Some(&capabilities)
            } else {
                None
            };
            commands::map(&config.maps, capabilities, &mut stdout).await
        }
    }
}

/// Ask a yes/no question on the terminal; anything but yes declines
fn confirm(prompt: &str) -> bool {
    print!("{} [y/N] ", prompt);
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}
