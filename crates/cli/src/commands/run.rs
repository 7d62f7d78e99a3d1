//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::relay::{Relay, RelayConfig};

/// Execute the `run` command
pub async fn run_relay(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    info!(
        distributors = blueprint.distributors.len(),
        routes = blueprint.routes.len(),
        sessions = blueprint.sessions.len(),
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        print_config_summary(&blueprint);
        return Ok(());
    }

    let relay_config = RelayConfig {
        blueprint,
        input: args.input.clone(),
        use_routes: args.route,
        max_events: if args.max_events == 0 {
            None
        } else {
            Some(args.max_events)
        },
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        print_responses: !args.summary_only,
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    info!("Starting relay...");

    let stats = Relay::new(relay_config)
        .run(shutdown_signal())
        .await
        .context("Relay execution failed")?;

    info!(
        events = stats.events_relayed,
        session_messages = stats.session_messages,
        duration_secs = stats.duration.as_secs_f64(),
        "Relay completed"
    );
    stats.print_summary();

    info!("Event Relay finished");
    Ok(())
}

/// Resolves on Ctrl+C or SIGTERM
///
/// A handler that cannot be installed never resolves.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

/// Print configuration summary for dry-run mode
fn print_config_summary(blueprint: &contracts::RelayBlueprint) {
    println!("\n=== Configuration Summary ===\n");
    println!("Coordinator:");
    println!(
        "  Retry: {} attempts, {} ms delay",
        blueprint.coordinator.retry_attempts, blueprint.coordinator.retry_delay_ms
    );
    if blueprint.coordinator.enable_health_check {
        println!(
            "  Health check: every {} ms",
            blueprint.coordinator.health_check_interval_ms
        );
    } else {
        println!("  Health check: disabled");
    }

    println!("\nDistributors ({}):", blueprint.distributors.len());
    for spec in &blueprint.distributors {
        let state = if spec.enabled { "" } else { " [disabled]" };
        println!("  - {} ({}){}", spec.name, spec.protocol, state);
    }

    if !blueprint.routes.is_empty() {
        println!("\nRoutes ({}):", blueprint.routes.len());
        for route in &blueprint.routes {
            println!("  - {} -> {}", route.event, route.targets.join(", "));
        }
    }

    if !blueprint.sessions.is_empty() {
        println!("\nSessions ({}):", blueprint.sessions.len());
        for session in &blueprint.sessions {
            let protocols: Vec<&str> = session
                .config
                .distributors
                .keys()
                .map(String::as_str)
                .collect();
            println!("  - {} [{}]", session.id, protocols.join(", "));
        }
    }

    println!();
}
