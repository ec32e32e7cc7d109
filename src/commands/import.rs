//! `import` - adopt an existing server object into state

use anyhow::{Context as AnyhowContext, Result, bail};

use crate::Context;
use crate::engine::planner::{lifecycle, split_address};
use crate::schema::Manifest;
use crate::ui;

use super::Session;

pub fn run(ctx: &Context, address: &str, id: &str) -> Result<()> {
    let (resource_type, name) = split_address(address);
    if name.is_none_or(str::is_empty) {
        bail!("Invalid address '{address}': expected <type>.<name>, e.g. grant.analyst_read");
    }
    let lifecycle = lifecycle(resource_type)?;

    let manifest = Manifest::load_optional(&ctx.paths.manifest)?;
    if let Some(manifest) = &manifest
        && !manifest.resources()?.contains_key(address)
    {
        ui::warn(&format!(
            "{address} is not declared in {}; the next apply will delete it",
            ctx.paths.manifest.display()
        ));
    }

    let mut session = Session::open(ctx, manifest.as_ref())?;
    if let Some(existing) = session.state.get(address) {
        bail!(
            "{address} is already managed (id {}); remove it from state first",
            existing.id
        );
    }

    let data = lifecycle
        .import(&session.provider, id)
        .with_context(|| format!("Failed to import {address} from '{id}'"))?;

    session.state.record(address, resource_type, data);
    session.save()?;

    ui::success(&format!("Imported {address}"));
    Ok(())
}
