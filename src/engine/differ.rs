//! Plan display

use colored::Colorize;
use grantkit::Value;
use grantkit::resource;
use std::collections::BTreeMap;

use super::planner::{Action, ExecutionPlan, PlannedChange};

/// Display the pending changes of a plan
pub fn display_plan(plan: &ExecutionPlan) {
    if !plan.has_changes() {
        println!();
        println!("  {} No changes needed", "✓".green());
        return;
    }

    // Group by resource type
    let mut by_type: BTreeMap<&str, Vec<&PlannedChange>> = BTreeMap::new();
    for change in plan.pending() {
        by_type.entry(change.resource_type()).or_default().push(change);
    }

    println!();
    println!(
        "┌─ {} ─────────────────────────────────────────┐",
        "Execution Plan".bold()
    );
    println!("│");

    for (resource_type, changes) in &by_type {
        let type_name = match *resource_type {
            "grant" => "Grants",
            "user" => "Users",
            "role" => "Roles",
            "database" => "Databases",
            "global_variable" => "Global variables",
            "placement_policy" => "Placement policies",
            _ => resource_type,
        };
        println!("│ {}", type_name.bold());

        for change in changes {
            let symbol = match change.action {
                Action::Create => "+".green(),
                Action::Delete => "-".red(),
                Action::Update => "~".yellow(),
                Action::Replace => "±".magenta(),
                Action::NoChange => "○".dimmed(),
            };
            let note = match change.action {
                Action::Replace => " (must be replaced)".red().to_string(),
                _ => String::new(),
            };
            println!("│   {} {}{}", symbol, change.address, note);

            for line in field_lines(change) {
                println!("│       {}", line.dimmed());
            }
        }
        println!("│");
    }

    println!("├─────────────────────────────────────────────────────┤");
    println!(
        "│ Plan: {} to create, {} to update, {} to replace, {} to delete",
        plan.count(Action::Create).to_string().green(),
        plan.count(Action::Update).to_string().yellow(),
        plan.count(Action::Replace).to_string().magenta(),
        plan.count(Action::Delete).to_string().red()
    );
    println!("└─────────────────────────────────────────────────────┘");
}

/// One "field: old → new" line per changed field.
pub fn field_lines(change: &PlannedChange) -> Vec<String> {
    let empty = BTreeMap::new();
    let prior = change.prior.as_ref().map_or(&empty, |p| &p.attributes);
    let desired = change.desired.as_ref().map_or(&empty, |d| &d.attributes);
    let sensitive = resource::lifecycle_for(change.resource_type())
        .map_or(&[][..], |lifecycle| lifecycle.sensitive_fields());
    let show = |field: &str, value: Option<&Value>| {
        if sensitive.contains(&field) && value.is_some_and(|v| !v.is_empty()) {
            "(sensitive value)".to_string()
        } else {
            render(value)
        }
    };

    match change.action {
        Action::Create => desired
            .iter()
            .filter(|(_, v)| !v.is_empty())
            .map(|(field, value)| format!("{field}: {}", show(field.as_str(), Some(value))))
            .collect(),
        Action::Update | Action::Replace => change
            .changed_fields
            .iter()
            .map(|field| {
                format!(
                    "{field}: {} → {}",
                    show(field.as_str(), prior.get(field)),
                    show(field.as_str(), desired.get(field))
                )
            })
            .collect(),
        Action::Delete => change
            .prior
            .as_ref()
            .map(|p| vec![format!("id: {}", p.id)])
            .unwrap_or_default(),
        Action::NoChange => Vec::new(),
    }
}

fn render(value: Option<&Value>) -> String {
    match value {
        None => "(unset)".to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Str(s)) => format!("\"{s}\""),
        Some(Value::List(items)) => format!("[{}]", items.join(", ")),
    }
}
