//! # Job Catalog and Router
//!
//! The static mapping from routing key to job descriptor, and the lookup
//! that selects exactly one descriptor for a decoded request. The catalog
//! is built once at startup and injected read-only, so adding a job is a
//! data change and concurrent routing needs no synchronization.

use crate::decoder::RoutingRequest;
use crate::error::{DispatchError, DispatchResult};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry in the job catalog: which routing key it matches and how to
/// invoke the target procedure.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobDescriptor {
    /// Routing key this descriptor matches, exact and case-sensitive
    pub routing_key: String,
    /// Fully-qualified stored procedure identifier
    pub target: String,
    /// Invocation template; `{target}` expands to the target identifier and
    /// `{name}` slots expand from request parameters
    pub invocation_template: String,
    /// Submit with the backend's legacy SQL dialect
    pub use_legacy_dialect: bool,
}

impl JobDescriptor {
    /// Descriptor with the stock zero-argument `CALL` template
    pub fn new(routing_key: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            routing_key: routing_key.into(),
            target: target.into(),
            invocation_template: "CALL `{target}`()".to_string(),
            use_legacy_dialect: false,
        }
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.invocation_template = template.into();
        self
    }

    pub fn with_legacy_dialect(mut self, use_legacy_dialect: bool) -> Self {
        self.use_legacy_dialect = use_legacy_dialect;
        self
    }
}

/// Immutable routing-key → descriptor mapping, populated at startup.
#[derive(Debug, Clone)]
pub struct JobCatalog {
    entries: HashMap<String, JobDescriptor>,
}

impl JobCatalog {
    /// Build a catalog, rejecting duplicate routing keys.
    pub fn from_entries(
        entries: impl IntoIterator<Item = JobDescriptor>,
    ) -> DispatchResult<Self> {
        let mut map = HashMap::new();
        for descriptor in entries {
            if let Some(previous) = map.insert(descriptor.routing_key.clone(), descriptor) {
                return Err(DispatchError::configuration(
                    "catalog",
                    format!("duplicate routing key: {}", previous.routing_key),
                ));
            }
        }
        Ok(Self { entries: map })
    }

    /// Select the single descriptor for a decoded request.
    ///
    /// Pure lookup: same request and catalog always yield the same
    /// descriptor, and an unknown key is an explicit failure carrying the
    /// offending key for diagnostics.
    pub fn route(&self, request: &RoutingRequest) -> DispatchResult<&JobDescriptor> {
        self.entries
            .get(request.routing_key())
            .ok_or_else(|| DispatchError::unknown_routing_key(request.routing_key()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Routing keys this catalog accepts
    pub fn routing_keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Stock catalog shipped with the dispatcher service: the snapshot and
/// pivot procedures, qualified by the configured project.
pub fn stock_catalog(project_id: &str) -> DispatchResult<JobCatalog> {
    JobCatalog::from_entries([
        JobDescriptor::new(
            "sp_table_snapshots",
            format!("{project_id}.table_snapshots.sp_table_snapshots"),
        ),
        JobDescriptor::new(
            "sp_dynamic_pivot",
            format!("{project_id}.bq_dev_new.sp_dynamic_pivot"),
        ),
    ])
}
