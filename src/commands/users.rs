//! `users` - list accounts on the server

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use grantkit::resource::user::{UserFilter, list_users};

use crate::Context;
use crate::cli::UsersArgs;
use crate::schema::Manifest;
use crate::ui;

use super::Session;

pub fn run(ctx: &Context, args: &UsersArgs) -> Result<()> {
    let manifest = Manifest::load_optional(&ctx.paths.manifest)?;
    let session = Session::open(ctx, manifest.as_ref())?;

    let filter = UserFilter {
        user_pattern: args.user_pattern.clone(),
        host_pattern: args.host_pattern.clone(),
        exclude: args.exclude.clone(),
    };
    let accounts =
        list_users(&session.provider, &filter).context("Failed to list user accounts")?;

    ui::section(&format!("Users ({})", accounts.len()));
    if accounts.is_empty() {
        ui::dim("No matching accounts");
        return Ok(());
    }
    for account in accounts {
        println!("  {} {}", "●".green(), account.to_string().bold());
    }
    Ok(())
}
