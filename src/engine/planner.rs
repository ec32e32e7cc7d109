//! Execution planner
//!
//! Refreshes recorded state against the server, then compares it with the
//! manifest to decide what each address needs.

use anyhow::{Context, Result, anyhow};
use grantkit::resource::{self, Lifecycle};
use grantkit::data::is_fingerprint_of;
use grantkit::{Attributes, Provider, ResourceData, Value};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt;

use crate::schema::DesiredResource;
use crate::state::{ResourceState, StateFile};

/// What has to happen to one address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Create,
    Update,
    /// Delete, then create
    Replace,
    Delete,
    NoChange,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Replace => "replace",
            Action::Delete => "delete",
            Action::NoChange => "no-op",
        };
        f.write_str(s)
    }
}

/// One planned change.
#[derive(Debug, Clone)]
pub struct PlannedChange {
    pub address: String,
    pub action: Action,
    /// Refreshed state, absent for creates
    pub prior: Option<ResourceState>,
    /// Declared type and attributes, absent for deletes
    pub desired: Option<DesiredResource>,
    pub changed_fields: Vec<String>,
}

impl PlannedChange {
    /// Resource type the change is applied with.
    pub fn resource_type(&self) -> &str {
        match (&self.desired, &self.prior) {
            (Some(desired), _) => desired.resource_type,
            (None, Some(prior)) => &prior.resource_type,
            (None, None) => "unknown",
        }
    }
}

/// The ordered set of changes for one run.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Changes that do something.
    pub fn pending(&self) -> impl Iterator<Item = &PlannedChange> {
        self.changes.iter().filter(|c| c.action != Action::NoChange)
    }

    pub fn has_changes(&self) -> bool {
        self.pending().next().is_some()
    }

    pub fn count(&self, action: Action) -> usize {
        self.changes.iter().filter(|c| c.action == action).count()
    }

    /// Changes grouped into stages that can each run in parallel.
    ///
    /// Deletes run first, dependents before dependencies. Everything else
    /// follows, dependencies before dependents.
    pub fn stages(&self) -> Vec<Vec<&PlannedChange>> {
        let mut deletes: BTreeMap<usize, Vec<&PlannedChange>> = BTreeMap::new();
        let mut applies: BTreeMap<usize, Vec<&PlannedChange>> = BTreeMap::new();

        for change in &self.changes {
            let rank = type_rank(change.resource_type());
            if change.action == Action::Delete {
                deletes.entry(rank).or_default().push(change);
            } else {
                applies.entry(rank).or_default().push(change);
            }
        }

        deletes
            .into_values()
            .rev()
            .chain(applies.into_values())
            .collect()
    }
}

/// Dependency order: policies before databases, accounts and roles before
/// grants.
fn type_rank(resource_type: &str) -> usize {
    match resource_type {
        "placement_policy" => 0,
        "user" | "role" | "global_variable" => 1,
        "database" => 2,
        "grant" => 3,
        _ => 4,
    }
}

// ============================================================================
// Targets
// ============================================================================

/// A `--target` filter: a resource type or a full address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    resource_type: String,
    name: Option<String>,
}

impl Target {
    /// Parse a target string like "grant" or "grant.analyst_read".
    pub fn parse(target: &str) -> Self {
        match target.split_once('.') {
            Some((resource_type, name)) => Self {
                resource_type: resource_type.to_string(),
                name: Some(name.to_string()),
            },
            None => Self {
                resource_type: target.to_string(),
                name: None,
            },
        }
    }

    pub fn matches(&self, address: &str) -> bool {
        let (resource_type, name) = split_address(address);
        resource_type == self.resource_type
            && self.name.as_deref().is_none_or(|n| name == Some(n))
    }
}

/// Split "type.name" into its parts.
pub fn split_address(address: &str) -> (&str, Option<&str>) {
    match address.split_once('.') {
        Some((resource_type, name)) => (resource_type, Some(name)),
        None => (address, None),
    }
}

fn selected(target: Option<&Target>, address: &str) -> bool {
    target.is_none_or(|t| t.matches(address))
}

pub fn lifecycle(resource_type: &str) -> Result<&'static dyn Lifecycle> {
    resource::lifecycle_for(resource_type)
        .ok_or_else(|| anyhow!("Unknown resource type '{resource_type}'"))
}

// ============================================================================
// Refresh and Plan
// ============================================================================

/// Re-read every recorded resource selected by `target`.
///
/// Resources that no longer exist map to `None`.
pub fn refresh(
    provider: &Provider,
    state: &StateFile,
    target: Option<&Target>,
) -> Result<BTreeMap<String, Option<ResourceState>>> {
    let entries: Vec<(&String, &ResourceState)> = state
        .resources
        .iter()
        .filter(|(address, _)| selected(target, address))
        .collect();

    entries
        .par_iter()
        .map(|(address, recorded)| -> Result<(String, Option<ResourceState>)> {
            let lifecycle = lifecycle(&recorded.resource_type)?;
            let mut data = recorded.to_data();
            lifecycle
                .read(provider, &mut data)
                .with_context(|| format!("Failed to refresh {address}"))?;
            let refreshed = ResourceState::from_data(&recorded.resource_type, data);
            if refreshed.is_none() {
                log::info!("{address} no longer exists on the server");
            }
            Ok(((*address).clone(), refreshed))
        })
        .collect()
}

/// Compare refreshed state with the manifest.
pub fn plan(
    desired: &BTreeMap<String, DesiredResource>,
    refreshed: &BTreeMap<String, Option<ResourceState>>,
    target: Option<&Target>,
) -> Result<ExecutionPlan> {
    let mut changes = Vec::new();

    for (address, resource) in desired.iter().filter(|(a, _)| selected(target, a)) {
        let prior = refreshed.get(address).cloned().flatten();
        let change = match prior {
            None => PlannedChange {
                address: address.clone(),
                action: Action::Create,
                prior: None,
                desired: Some(resource.clone()),
                changed_fields: resource.attributes.keys().cloned().collect(),
            },
            Some(prior) => diff_one(address, prior, resource)?,
        };
        changes.push(change);
    }

    for (address, prior) in refreshed.iter().filter(|(a, _)| selected(target, a)) {
        if desired.contains_key(address) {
            continue;
        }
        if let Some(prior) = prior {
            changes.push(PlannedChange {
                address: address.clone(),
                action: Action::Delete,
                prior: Some(prior.clone()),
                desired: None,
                changed_fields: Vec::new(),
            });
        }
    }

    log::debug!("Planned {} changes", changes.len());
    Ok(ExecutionPlan { changes })
}

/// Plan that deletes every recorded resource selected by `target`.
pub fn plan_destroy(
    refreshed: &BTreeMap<String, Option<ResourceState>>,
    target: Option<&Target>,
) -> Result<ExecutionPlan> {
    plan(&BTreeMap::new(), refreshed, target)
}

fn diff_one(address: &str, prior: ResourceState, desired: &DesiredResource) -> Result<PlannedChange> {
    let lifecycle = lifecycle(desired.resource_type)?;

    if prior.resource_type != desired.resource_type {
        return Ok(PlannedChange {
            address: address.to_string(),
            action: Action::Replace,
            prior: Some(prior),
            desired: Some(desired.clone()),
            changed_fields: Vec::new(),
        });
    }

    let data = update_data(lifecycle, &prior, &desired.attributes);
    let changed_fields = data.changed_fields();
    let action = if changed_fields.is_empty() {
        Action::NoChange
    } else if lifecycle.requires_replacement(&data) {
        Action::Replace
    } else {
        Action::Update
    };

    Ok(PlannedChange {
        address: address.to_string(),
        action,
        prior: Some(prior),
        desired: Some(desired.clone()),
        changed_fields,
    })
}

/// Data moving `prior` to `declared`, keeping server-filled values for
/// computed fields the manifest leaves out.
///
/// A declared secret whose fingerprint is already recorded is replaced by
/// that fingerprint, so an unchanged password does not diff.
pub fn update_data(
    lifecycle: &dyn Lifecycle,
    prior: &ResourceState,
    declared: &Attributes,
) -> ResourceData {
    let mut config = declared.clone();
    for field in lifecycle.computed_fields() {
        if !config.contains_key(*field)
            && let Some(value) = prior.attributes.get(*field)
        {
            config.insert((*field).to_string(), value.clone());
        }
    }
    for field in lifecycle.sensitive_fields() {
        if let (Some(Value::Str(secret)), Some(Value::Str(recorded))) =
            (config.get_mut(*field), prior.attributes.get(*field))
            && is_fingerprint_of(recorded, secret)
        {
            *secret = recorded.clone();
        }
    }
    ResourceData::for_update(prior.id.clone(), prior.attributes.clone(), config)
}
