//! `validate` command implementation.

use anyhow::{Context, Result};
use contracts::{session_distributor_id, RelayBlueprint};
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    config_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    warnings: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    summary: Option<ConfigSummary>,
}

#[derive(Serialize)]
struct ConfigSummary {
    version: String,
    distributor_count: usize,
    enabled_distributors: usize,
    route_count: usize,
    session_count: usize,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!(config = %args.config.display(), "Validating configuration");

    let result = validate_config(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Configuration validation failed")
    }
}

fn validate_config(args: &ValidateArgs) -> ValidationResult {
    let config_path = args.config.display().to_string();

    if !args.config.exists() {
        return ValidationResult {
            valid: false,
            config_path,
            error: Some(format!("File not found: {}", args.config.display())),
            warnings: None,
            summary: None,
        };
    }

    match config_loader::ConfigLoader::load_from_path(&args.config) {
        Ok(blueprint) => {
            let warnings = collect_warnings(&blueprint);
            ValidationResult {
                valid: true,
                config_path,
                error: None,
                warnings: if warnings.is_empty() {
                    None
                } else {
                    Some(warnings)
                },
                summary: Some(ConfigSummary {
                    version: format!("{:?}", blueprint.version),
                    distributor_count: blueprint.distributors.len(),
                    enabled_distributors: blueprint
                        .distributors
                        .iter()
                        .filter(|d| d.enabled)
                        .count(),
                    route_count: blueprint.routes.len(),
                    session_count: blueprint.sessions.len(),
                }),
            }
        }
        Err(e) => ValidationResult {
            valid: false,
            config_path,
            error: Some(e.to_string()),
            warnings: None,
            summary: None,
        },
    }
}

/// Collect configuration warnings (non-fatal issues)
fn collect_warnings(blueprint: &RelayBlueprint) -> Vec<String> {
    let mut warnings = Vec::new();
    let factories = dispatcher::builtin_factories();

    if blueprint.distributors.is_empty() && blueprint.sessions.is_empty() {
        warnings.push("No distributors or sessions configured - events will be dropped".to_string());
    }

    for spec in &blueprint.distributors {
        if !factories.contains(&spec.protocol) {
            warnings.push(format!(
                "Distributor '{}' uses protocol '{}' which this binary does not provide",
                spec.name, spec.protocol
            ));
        }
        if !spec.enabled {
            warnings.push(format!("Distributor '{}' is disabled", spec.name));
        }
    }

    for session in &blueprint.sessions {
        for protocol in session.config.distributors.keys() {
            if !factories.contains(protocol) {
                warnings.push(format!(
                    "Session '{}': protocol '{}' will be skipped",
                    session.id, protocol
                ));
            }
        }

        let known: Vec<String> = session
            .config
            .distributors
            .keys()
            .map(|protocol| session_distributor_id(protocol, &session.id))
            .collect();
        for (key, ids) in &session.config.event_routing {
            for id in ids.iter().filter(|id| !known.contains(id)) {
                warnings.push(format!(
                    "Session '{}': route '{}' targets unknown distributor '{}'",
                    session.id, key, id
                ));
            }
        }
    }

    if !blueprint.coordinator.enable_health_check {
        warnings.push("coordinator.enable_health_check is false - no health polling".to_string());
    }

    warnings
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!("✓ Configuration is valid: {}", result.config_path);

        if let Some(ref summary) = result.summary {
            println!("\n  Version: {}", summary.version);
            println!(
                "  Distributors: {} ({} enabled)",
                summary.distributor_count, summary.enabled_distributors
            );
            println!("  Routes: {}", summary.route_count);
            println!("  Sessions: {}", summary.session_count);
        }

        if let Some(ref warnings) = result.warnings {
            println!("\n⚠ Warnings:");
            for warning in warnings {
                println!("  - {}", warning);
            }
        }
    } else {
        println!("✗ Configuration is invalid: {}", result.config_path);
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn warns_on_unusable_session_routes() {
        let blueprint: RelayBlueprint = serde_json::from_value(json!({
            "coordinator": { "enable_health_check": false },
            "distributors": [{ "name": "mqtt", "protocol": "mqtt", "enabled": false }],
            "sessions": [{
                "id": "s1",
                "distributors": { "udp": { "addr": "127.0.0.1:9000" } },
                "event_routing": { "ping": ["udp_s1", "http_s1"] }
            }]
        }))
        .unwrap();

        let warnings = collect_warnings(&blueprint);
        assert!(warnings.iter().any(|w| w.contains("protocol 'mqtt'")));
        assert!(warnings.iter().any(|w| w.contains("'mqtt' is disabled")));
        assert!(warnings.iter().any(|w| w.contains("unknown distributor 'http_s1'")));
        assert!(!warnings.iter().any(|w| w.contains("'udp_s1'")));
        assert!(warnings.iter().any(|w| w.contains("no health polling")));
    }

    #[test]
    fn missing_file_is_invalid() {
        let args = ValidateArgs {
            config: "/nonexistent/relay.toml".into(),
            json: false,
        };
        let result = validate_config(&args);
        assert!(!result.valid);
        assert!(result.error.unwrap().contains("File not found"));
    }
}
