//! `show` - print recorded state

use anyhow::Result;
use colored::Colorize;
use grantkit::Value;
use std::collections::BTreeMap;

use crate::Context;
use crate::state::{ResourceState, StateFile};
use crate::ui;

pub fn run(ctx: &Context) -> Result<()> {
    let state = StateFile::load(&ctx.paths.state)?;

    ui::header("dbconverge state");
    ui::kv("File", &ctx.paths.state.display().to_string());
    ui::kv(
        "Updated",
        &state.last_updated.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );

    if state.resources.is_empty() {
        println!();
        ui::dim("No resources recorded");
        return Ok(());
    }

    let mut by_type: BTreeMap<&str, Vec<(&String, &ResourceState)>> = BTreeMap::new();
    for (address, resource) in &state.resources {
        by_type
            .entry(resource.resource_type.as_str())
            .or_default()
            .push((address, resource));
    }

    for (resource_type, resources) in by_type {
        ui::section(&format!("{resource_type} ({})", resources.len()));
        for (address, resource) in resources {
            println!("  {} {}", "●".green(), address.bold());
            ui::kv("  id", &resource.id);
            if !ctx.quiet {
                for (field, value) in &resource.attributes {
                    if !value.is_empty() {
                        ui::kv(&format!("  {field}"), &render(value));
                    }
                }
            }
        }
    }

    Ok(())
}

fn render(value: &Value) -> String {
    match value {
        Value::Bool(b) => b.to_string(),
        Value::Str(s) => s.clone(),
        Value::List(items) => items.join(", "),
    }
}
