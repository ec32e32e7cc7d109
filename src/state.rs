use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use grantkit::{Attributes, ResourceData};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const STATE_VERSION: u32 = 1;

// ============================================================================
// State Structures
// ============================================================================

/// Everything dbconverge has created or imported, keyed by address.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct StateFile {
    pub version: u32,

    #[serde(default)]
    pub resources: BTreeMap<String, ResourceState>,

    /// Last time the state was updated
    pub last_updated: DateTime<Utc>,
}

/// Snapshot of one resource as last observed.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct ResourceState {
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub attributes: Attributes,
}

impl ResourceState {
    /// Snapshot of data that still has an id.
    pub fn from_data(resource_type: &str, data: ResourceData) -> Option<Self> {
        let (id, attributes) = data.into_parts();
        Some(Self {
            resource_type: resource_type.to_string(),
            id: id?,
            attributes,
        })
    }

    pub fn to_data(&self) -> ResourceData {
        ResourceData::from_state(self.id.clone(), self.attributes.clone())
    }
}

impl Default for StateFile {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            resources: BTreeMap::new(),
            last_updated: Utc::now(),
        }
    }
}

// ============================================================================
// StateFile Implementation
// ============================================================================

impl StateFile {
    /// Load state from disk, or return default if file doesn't exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("State file does not exist, using default state");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;

        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;

        if state.version > STATE_VERSION {
            bail!(
                "State file {} has version {}, newer than supported version {STATE_VERSION}",
                path.display(),
                state.version
            );
        }

        log::debug!(
            "Loaded {} resources from {}",
            state.resources.len(),
            path.display()
        );
        Ok(state)
    }

    /// Save state to disk
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent()
            && !dir.as_os_str().is_empty()
        {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let content =
            serde_json::to_string_pretty(&self).context("Failed to serialize state to JSON")?;

        fs::write(path, &content)
            .with_context(|| format!("Failed to write state file: {}", path.display()))?;

        log::debug!("Saved state to {}", path.display());
        Ok(())
    }

    /// Update the last_updated timestamp and save
    pub fn touch(&mut self, path: &Path) -> Result<()> {
        self.last_updated = Utc::now();
        self.save(path)
    }

    pub fn get(&self, address: &str) -> Option<&ResourceState> {
        self.resources.get(address)
    }

    /// Record `data` under `address`, or forget the address once the id is gone.
    pub fn record(&mut self, address: &str, resource_type: &str, data: ResourceData) {
        match ResourceState::from_data(resource_type, data) {
            Some(snapshot) => {
                self.resources.insert(address.to_string(), snapshot);
            }
            None => {
                self.resources.remove(address);
            }
        }
    }

    pub fn remove(&mut self, address: &str) -> Option<ResourceState> {
        self.resources.remove(address)
    }
}

// ============================================================================
// Tests
// ============================================================================
