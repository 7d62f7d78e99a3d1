//! `info` command implementation.

use anyhow::{Context, Result};
use contracts::{CoordinatorConfig, RelayBlueprint};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use tracing::info;

use crate::cli::InfoArgs;

/// Configuration info for JSON output
#[derive(Serialize)]
struct ConfigInfo {
    version: String,
    coordinator: CoordinatorConfig,
    distributors: Vec<DistributorInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    routes: Vec<RouteInfo>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    sessions: Vec<SessionInfo>,
    available_protocols: Vec<String>,
}

#[derive(Serialize)]
struct DistributorInfo {
    name: String,
    protocol: String,
    enabled: bool,
    #[serde(skip_serializing_if = "Map::is_empty")]
    config: Map<String, Value>,
}

#[derive(Serialize)]
struct RouteInfo {
    event: String,
    targets: Vec<String>,
}

#[derive(Serialize)]
struct SessionInfo {
    id: String,
    protocols: Vec<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    event_routing: BTreeMap<String, Vec<String>>,
}

/// Execute the `info` command
pub fn run_info(args: &InfoArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration info");

    if !args.config.exists() {
        anyhow::bail!("Configuration file not found: {}", args.config.display());
    }

    let blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    if args.json {
        let info = build_config_info(&blueprint, args);
        let json =
            serde_json::to_string_pretty(&info).context("Failed to serialize config info")?;
        println!("{}", json);
    } else {
        print_config_info(&blueprint, args);
    }

    Ok(())
}

fn build_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) -> ConfigInfo {
    let distributors = blueprint
        .distributors
        .iter()
        .map(|d| DistributorInfo {
            name: d.name.clone(),
            protocol: d.protocol.clone(),
            enabled: d.enabled,
            config: if args.distributors {
                d.config.clone()
            } else {
                Map::new()
            },
        })
        .collect();

    let routes = blueprint
        .routes
        .iter()
        .map(|r| RouteInfo {
            event: r.event.clone(),
            targets: r.targets.clone(),
        })
        .collect();

    let sessions = if args.sessions {
        blueprint
            .sessions
            .iter()
            .map(|s| SessionInfo {
                id: s.id.clone(),
                protocols: s.config.distributors.keys().cloned().collect(),
                event_routing: s
                    .config
                    .event_routing
                    .iter()
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect(),
            })
            .collect()
    } else {
        Vec::new()
    };

    ConfigInfo {
        version: format!("{:?}", blueprint.version),
        coordinator: blueprint.coordinator.clone(),
        distributors,
        routes,
        sessions,
        available_protocols: dispatcher::builtin_factories().protocols(),
    }
}

fn branch(i: usize, len: usize) -> &'static str {
    if i + 1 == len {
        "└─"
    } else {
        "├─"
    }
}

fn print_config_info(blueprint: &RelayBlueprint, args: &InfoArgs) {
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║               Event Relay Configuration                      ║");
    println!("╚══════════════════════════════════════════════════════════════╝\n");

    let coordinator = &blueprint.coordinator;
    println!("⚙️  Coordinator");
    println!("   ├─ Version: {:?}", blueprint.version);
    println!(
        "   ├─ Retry: {} attempts, {} ms delay",
        coordinator.retry_attempts, coordinator.retry_delay_ms
    );
    if coordinator.enable_health_check {
        println!(
            "   ├─ Health check: every {} ms",
            coordinator.health_check_interval_ms
        );
    } else {
        println!("   ├─ Health check: disabled");
    }
    println!(
        "   └─ Available protocols: {}",
        dispatcher::builtin_factories().protocols().join(", ")
    );

    println!("\n📤 Distributors ({})", blueprint.distributors.len());
    for (i, spec) in blueprint.distributors.iter().enumerate() {
        let is_last = i + 1 == blueprint.distributors.len();
        let child_prefix = if is_last { "   " } else { "│  " };
        let state = if spec.enabled { "" } else { " [disabled]" };

        println!(
            "   {} {} ({}){}",
            branch(i, blueprint.distributors.len()),
            spec.name,
            spec.protocol,
            state
        );

        if args.distributors {
            for (j, (key, value)) in spec.config.iter().enumerate() {
                println!(
                    "   {}  {} {} = {}",
                    child_prefix,
                    branch(j, spec.config.len()),
                    key,
                    value
                );
            }
        }
    }

    if !blueprint.routes.is_empty() {
        println!("\n🔀 Routes ({})", blueprint.routes.len());
        for (i, route) in blueprint.routes.iter().enumerate() {
            println!(
                "   {} {} -> {}",
                branch(i, blueprint.routes.len()),
                route.event,
                route.targets.join(", ")
            );
        }
    }

    if !blueprint.sessions.is_empty() {
        println!("\n🧵 Sessions ({})", blueprint.sessions.len());
        for (i, session) in blueprint.sessions.iter().enumerate() {
            let is_last = i + 1 == blueprint.sessions.len();
            let child_prefix = if is_last { "   " } else { "│  " };
            let protocols: Vec<&str> = session
                .config
                .distributors
                .keys()
                .map(String::as_str)
                .collect();

            println!(
                "   {} {} [{}]",
                branch(i, blueprint.sessions.len()),
                session.id,
                protocols.join(", ")
            );

            if args.sessions {
                let mut routes: Vec<_> = session.config.event_routing.iter().collect();
                routes.sort_by(|a, b| a.0.cmp(b.0));
                for (j, (key, ids)) in routes.iter().enumerate() {
                    println!(
                        "   {}  {} {} -> {}",
                        child_prefix,
                        branch(j, routes.len()),
                        key,
                        ids.join(", ")
                    );
                }
            }
        }
    }

    println!();
}
