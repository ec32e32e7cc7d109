// Declarative commands
pub mod converge;

// State management
pub mod import;
pub mod show;
pub mod users;

use anyhow::Result;
use grantkit::Provider;
use std::sync::Arc;

use crate::Context;
use crate::config;
use crate::schema::Manifest;
use crate::state::StateFile;
use crate::ui;

/// Connected provider plus loaded state for one command.
pub struct Session {
    pub provider: Provider,
    pub state: StateFile,
    state_path: std::path::PathBuf,
}

impl Session {
    pub fn open(ctx: &Context, manifest: Option<&Manifest>) -> Result<Self> {
        let state = StateFile::load(&ctx.paths.state)?;
        let db = config::connect(
            ctx.dsn.as_deref(),
            manifest.and_then(|m| m.connection.as_ref()),
        )?;
        let provider = Provider::new(Arc::new(db));

        let server = provider.server_info()?;
        if !ctx.quiet {
            ui::kv("Server", &server.to_string());
            if ctx.verbose > 0 {
                ui::kv("Version string", &server.raw);
            }
        }

        Ok(Self {
            provider,
            state,
            state_path: ctx.paths.state.clone(),
        })
    }

    pub fn save(&mut self) -> Result<()> {
        self.state.touch(&self.state_path)
    }
}
