//! Config validation
//!
//! Rules:
//! - distributor names non-empty and unique
//! - distributor protocol non-empty
//! - retry_attempts >= 1, event_channel_capacity >= 1
//! - health_check_interval_ms > 0 when health checking is enabled
//! - route event non-empty, targets non-empty and known (or "all")
//! - session ids non-empty and unique

use std::collections::HashSet;

use contracts::{ALL_TARGETS, ContractError, RelayBlueprint};

/// Validate a RelayBlueprint
///
/// Returns the first error encountered, or Ok(()).
pub fn validate(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    validate_coordinator(blueprint)?;
    let names = validate_distributors(blueprint)?;
    validate_routes(blueprint, &names)?;
    validate_sessions(blueprint)?;
    Ok(())
}

fn validate_coordinator(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let coordinator = &blueprint.coordinator;

    if coordinator.retry_attempts == 0 {
        return Err(ContractError::config_validation(
            "coordinator.retry_attempts",
            "retry_attempts must be >= 1",
        ));
    }

    if coordinator.enable_health_check && coordinator.health_check_interval_ms == 0 {
        return Err(ContractError::config_validation(
            "coordinator.health_check_interval_ms",
            "health_check_interval_ms must be > 0 when health checking is enabled",
        ));
    }

    if coordinator.event_channel_capacity == 0 {
        return Err(ContractError::config_validation(
            "coordinator.event_channel_capacity",
            "event_channel_capacity must be >= 1",
        ));
    }

    Ok(())
}

/// Returns the set of declared distributor names
fn validate_distributors(blueprint: &RelayBlueprint) -> Result<HashSet<&str>, ContractError> {
    let mut seen = HashSet::new();
    for (idx, spec) in blueprint.distributors.iter().enumerate() {
        if spec.name.is_empty() {
            return Err(ContractError::config_validation(
                format!("distributors[{idx}].name"),
                "distributor name cannot be empty",
            ));
        }
        if spec.name == ALL_TARGETS {
            return Err(ContractError::config_validation(
                format!("distributors[{idx}].name"),
                format!("'{ALL_TARGETS}' is reserved"),
            ));
        }
        if spec.protocol.is_empty() {
            return Err(ContractError::config_validation(
                format!("distributors[name={}].protocol", spec.name),
                "protocol cannot be empty",
            ));
        }
        if !seen.insert(spec.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("distributors[name={}]", spec.name),
                "duplicate distributor name",
            ));
        }
    }
    Ok(seen)
}

fn validate_routes(blueprint: &RelayBlueprint, names: &HashSet<&str>) -> Result<(), ContractError> {
    for (idx, route) in blueprint.routes.iter().enumerate() {
        if route.event.is_empty() {
            return Err(ContractError::config_validation(
                format!("routes[{idx}].event"),
                "route event cannot be empty",
            ));
        }
        if route.targets.is_empty() {
            return Err(ContractError::config_validation(
                format!("routes[event={}].targets", route.event),
                "route needs at least one target",
            ));
        }
        for target in &route.targets {
            if target != ALL_TARGETS && !names.contains(target.as_str()) {
                return Err(ContractError::config_validation(
                    format!("routes[event={}].targets", route.event),
                    format!("target '{target}' not found in distributors"),
                ));
            }
        }
    }
    Ok(())
}

fn validate_sessions(blueprint: &RelayBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for (idx, session) in blueprint.sessions.iter().enumerate() {
        if session.id.is_empty() {
            return Err(ContractError::config_validation(
                format!("sessions[{idx}].id"),
                "session id cannot be empty",
            ));
        }
        if !seen.insert(session.id.as_str()) {
            return Err(ContractError::config_validation(
                format!("sessions[id={}]", session.id),
                "duplicate session id",
            ));
        }
    }
    Ok(())
}
