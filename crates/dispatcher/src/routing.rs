//! Event routing table
//!
//! Maps an event name to its targets and default options. Setting a route
//! for an existing event overwrites it.

use serde::Serialize;
use std::collections::HashMap;

use contracts::{DistributionOptions, RouteSpec, Targets, ALL_TARGETS};

/// Stored route for one event name
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRoute {
    pub event: String,
    #[serde(serialize_with = "serialize_targets")]
    pub targets: Targets,
    pub options: DistributionOptions,
}

impl EventRoute {
    pub fn new(event: impl Into<String>, targets: Targets, options: DistributionOptions) -> Self {
        Self {
            event: event.into(),
            targets,
            options,
        }
    }

    /// Options for one call: route options with `overrides` winning
    pub fn merged_options(&self, overrides: Option<&DistributionOptions>) -> DistributionOptions {
        match overrides {
            Some(overrides) => self.options.overlay(overrides),
            None => self.options.clone(),
        }
    }
}

impl From<&RouteSpec> for EventRoute {
    fn from(spec: &RouteSpec) -> Self {
        Self::new(
            spec.event.clone(),
            Targets::named(spec.targets.iter().cloned()),
            spec.options.clone(),
        )
    }
}

fn serialize_targets<S: serde::Serializer>(targets: &Targets, s: S) -> Result<S::Ok, S::Error> {
    match targets {
        Targets::All => s.collect_seq([ALL_TARGETS]),
        Targets::Named(names) => s.collect_seq(names),
    }
}

#[derive(Debug, Default)]
pub struct RoutingTable {
    routes: HashMap<String, EventRoute>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite; returns the previous route
    pub fn set(&mut self, route: EventRoute) -> Option<EventRoute> {
        self.routes.insert(route.event.clone(), route)
    }

    pub fn get(&self, event: &str) -> Option<&EventRoute> {
        self.routes.get(event)
    }

    pub fn remove(&mut self, event: &str) -> Option<EventRoute> {
        self.routes.remove(event)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Routes sorted by event name
    pub fn routes(&self) -> Vec<EventRoute> {
        let mut routes: Vec<EventRoute> = self.routes.values().cloned().collect();
        routes.sort_by(|a, b| a.event.cmp(&b.event));
        routes
    }

    pub fn clear(&mut self) {
        self.routes.clear();
    }
}
