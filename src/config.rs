//! File locations and server connection.

use anyhow::{Context, Result, bail};
use grantkit::backend::mysql::{ConnectionSettings, MySqlDatabase};
use std::path::{Path, PathBuf};

/// Get the config directory path (~/.config/dbconverge)
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".config").join("dbconverge"))
}

/// Resolved locations for one invocation.
#[derive(Debug, Clone)]
pub struct Paths {
    pub manifest: PathBuf,
    pub state: PathBuf,
}

impl Paths {
    /// Use the given paths, falling back to the config directory.
    pub fn resolve(manifest: Option<&Path>, state: Option<&Path>) -> Result<Self> {
        let manifest = match manifest {
            Some(path) => expand(path),
            None => config_dir()?.join("manifest.toml"),
        };
        let state = match state {
            Some(path) => expand(path),
            None => config_dir()?.join("state.json"),
        };
        Ok(Self { manifest, state })
    }
}

/// Expand `~` and environment variables in a path.
pub fn expand(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    match shellexpand::full(&raw) {
        Ok(expanded) => PathBuf::from(expanded.as_ref()),
        Err(_) => PathBuf::from(shellexpand::tilde(&raw).as_ref()),
    }
}

/// Open a connection pool from a URL, or from the manifest's `[connection]`.
pub fn connect(dsn: Option<&str>, settings: Option<&ConnectionSettings>) -> Result<MySqlDatabase> {
    if let Some(dsn) = dsn {
        log::debug!("Connecting with DSN");
        return MySqlDatabase::connect(dsn).context("Failed to connect to database");
    }
    if let Some(settings) = settings {
        log::debug!("Connecting to {}:{}", settings.host, settings.port);
        return MySqlDatabase::with_settings(settings).context("Failed to connect to database");
    }
    bail!("No connection configured: pass --dsn, set DBCONVERGE_DSN or add [connection] to the manifest")
}
