//! Declarative commands
//!
//! - `plan` - Show what apply would change
//! - `apply` - Make the server match the manifest
//! - `destroy` - Remove everything recorded in state

use anyhow::{Result, bail};
use colored::Colorize;
use std::collections::BTreeMap;

use crate::Context;
use crate::cli::{ApplyArgs, DestroyArgs};
use crate::engine::planner::{self, Target};
use crate::engine::{ExecuteOptions, differ, execute};
use crate::progress;
use crate::schema::Manifest;
use crate::state::{ResourceState, StateFile};
use crate::ui;

use super::Session;

// ============================================================================
// Plan Command
// ============================================================================

pub fn plan(ctx: &Context, target: Option<&str>) -> Result<()> {
    let manifest = Manifest::load(&ctx.paths.manifest)?;
    let session = Session::open(ctx, Some(&manifest))?;
    let target = target.map(Target::parse);

    let refreshed = refresh(&session, target.as_ref())?;
    let plan = planner::plan(&manifest.resources()?, &refreshed, target.as_ref())?;

    differ::display_plan(&plan);
    Ok(())
}

// ============================================================================
// Apply Command
// ============================================================================

pub fn apply(ctx: &Context, args: &ApplyArgs) -> Result<()> {
    let manifest = Manifest::load(&ctx.paths.manifest)?;
    let mut session = Session::open(ctx, Some(&manifest))?;
    let target = args.target.as_deref().map(Target::parse);

    let refreshed = refresh(&session, target.as_ref())?;
    let plan = planner::plan(&manifest.resources()?, &refreshed, target.as_ref())?;

    let opts = ExecuteOptions {
        dry_run: args.dry_run,
        jobs: usize::from(args.jobs),
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };

    if !opts.dry_run {
        forget_vanished(&mut session.state, &refreshed);
    }
    let summary = execute(&plan, &session.provider, &mut session.state, &opts)?;

    if !opts.dry_run {
        session.save()?;
    }

    if !summary.is_success() {
        bail!("{} changes failed", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Destroy Command
// ============================================================================

pub fn destroy(ctx: &Context, args: &DestroyArgs) -> Result<()> {
    let manifest = Manifest::load_optional(&ctx.paths.manifest)?;
    let mut session = Session::open(ctx, manifest.as_ref())?;
    let target = args.target.as_deref().map(Target::parse);

    if session.state.resources.is_empty() {
        ui::info("Nothing recorded in state");
        return Ok(());
    }

    let refreshed = refresh(&session, target.as_ref())?;
    let plan = planner::plan_destroy(&refreshed, target.as_ref())?;

    println!();
    println!(
        "  {} Every selected object below will be removed from the server",
        "⚠".yellow()
    );

    let opts = ExecuteOptions {
        dry_run: false,
        jobs: usize::from(args.jobs),
        yes: args.yes,
        verbose: ctx.verbose > 0,
    };

    forget_vanished(&mut session.state, &refreshed);
    let summary = execute(&plan, &session.provider, &mut session.state, &opts)?;
    session.save()?;

    if !summary.is_success() {
        bail!("{} changes failed", summary.failed);
    }
    Ok(())
}

// ============================================================================
// Helpers
// ============================================================================

fn refresh(
    session: &Session,
    target: Option<&Target>,
) -> Result<BTreeMap<String, Option<ResourceState>>> {
    let pb = progress::spinner("Refreshing state...");
    let result = planner::refresh(&session.provider, &session.state, target);
    pb.finish_and_clear();
    result
}

/// Drop addresses whose objects were removed outside dbconverge.
fn forget_vanished(state: &mut StateFile, refreshed: &BTreeMap<String, Option<ResourceState>>) {
    for (address, snapshot) in refreshed {
        if snapshot.is_none() && state.remove(address).is_some() {
            ui::warn(&format!("{address} was removed outside dbconverge"));
        }
    }
}
