//! Execution engine - applies a plan with UI integration

use anyhow::{Context as AnyhowContext, Result};
use colored::Colorize;
use grantkit::{Provider, ResourceData};
use rayon::prelude::*;
use std::sync::{Arc, Mutex};

use crate::progress;
use crate::state::StateFile;

use super::differ::display_plan;
use super::planner::{Action, ExecutionPlan, PlannedChange, lifecycle, update_data};

/// Options for execution
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Don't make changes, just show what would happen
    pub dry_run: bool,
    /// Number of parallel jobs
    pub jobs: usize,
    /// Skip confirmation prompts
    pub yes: bool,
    /// Verbose output
    pub verbose: bool,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            dry_run: false,
            jobs: 4,
            yes: false,
            verbose: false,
        }
    }
}

/// Result of applying one change
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyResult {
    /// No changes needed
    NoChange,
    /// Resource was created
    Created,
    /// Resource was updated in place or replaced
    Modified,
    /// Resource was removed
    Removed,
    /// Apply failed
    Failed { error: String },
}

/// Outcome of one change, with the data to record for its address.
#[derive(Debug)]
pub struct ApplyOutcome {
    pub address: String,
    pub resource_type: String,
    pub result: ApplyResult,
    /// `None` leaves the recorded state untouched
    pub data: Option<ResourceData>,
}

/// Summary of execution results
#[derive(Debug, Default)]
pub struct ExecuteSummary {
    pub created: usize,
    pub modified: usize,
    pub removed: usize,
    pub skipped: usize,
    pub failed: usize,
    pub no_change: usize,
}

impl ExecuteSummary {
    pub fn total_changes(&self) -> usize {
        self.created + self.modified + self.removed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Show, confirm and apply `plan`, recording results in `state`.
pub fn execute(
    plan: &ExecutionPlan,
    provider: &Provider,
    state: &mut StateFile,
    opts: &ExecuteOptions,
) -> Result<ExecuteSummary> {
    // 1. Display what will change
    display_plan(plan);

    let pending = plan.pending().count();
    if pending == 0 {
        record_unchanged(plan, state);
        return Ok(ExecuteSummary {
            no_change: plan.changes.len(),
            ..Default::default()
        });
    }

    if opts.dry_run {
        println!();
        println!("  {} Dry run - no changes made", "ℹ".blue());
        return Ok(ExecuteSummary::default());
    }

    // 2. Confirm (unless --yes)
    if !opts.yes && !confirm_proceed()? {
        println!();
        println!("  {} Aborted", "✗".red());
        return Ok(ExecuteSummary {
            skipped: pending,
            ..Default::default()
        });
    }

    println!();
    println!("  {} Applying {} changes...", "→".cyan(), pending);

    // 3. Execute stage by stage, each stage in parallel
    let mut summary = ExecuteSummary::default();
    for stage in plan.stages() {
        let outcomes = execute_parallel(&stage, provider, opts.jobs, opts.verbose)?;
        merge_summary(&mut summary, &outcomes);
        for outcome in outcomes {
            if let ApplyResult::Failed { error } = &outcome.result {
                println!("    {} {}: {}", "✗".red(), outcome.address, error);
            }
            if let Some(data) = outcome.data {
                state.record(&outcome.address, &outcome.resource_type, data);
            }
        }
    }

    // 4. Summary
    print_summary(&summary);

    Ok(summary)
}

fn record_unchanged(plan: &ExecutionPlan, state: &mut StateFile) {
    for change in &plan.changes {
        if let Some(prior) = &change.prior {
            state.record(&change.address, &prior.resource_type, prior.to_data());
        }
    }
}

/// Execute changes in parallel
fn execute_parallel(
    changes: &[&PlannedChange],
    provider: &Provider,
    jobs: usize,
    verbose: bool,
) -> Result<Vec<ApplyOutcome>> {
    let pb = progress::bar(changes.len() as u64, "Applying");
    let results: Arc<Mutex<Vec<ApplyOutcome>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(jobs.max(1))
        .build()
        .context("Failed to create apply thread pool")?;

    pool.install(|| {
        changes.par_iter().for_each(|change| {
            let outcome = apply_change(change, provider);

            let symbol = match &outcome.result {
                ApplyResult::NoChange => "○",
                ApplyResult::Created | ApplyResult::Modified | ApplyResult::Removed => "✓",
                ApplyResult::Failed { .. } => "✗",
            };

            if verbose {
                pb.println(format!("  {} {} ({})", symbol, change.address, change.action));
            }
            pb.set_message(format!("{} {}", symbol, change.address));
            pb.inc(1);

            push_apply_result(&results, outcome);
        });
    });

    pb.finish_and_clear();

    into_apply_results(results)
}

/// Run one change against the server.
fn apply_change(change: &PlannedChange, provider: &Provider) -> ApplyOutcome {
    let resource_type = change.resource_type().to_string();
    let outcome = |result, data| ApplyOutcome {
        address: change.address.clone(),
        resource_type: resource_type.clone(),
        result,
        data,
    };
    let failed = |err: anyhow::Error| ApplyResult::Failed {
        error: describe_failure(&err),
    };

    match run_change(change, provider) {
        Ok((result, data)) => outcome(result, Some(data)),
        Err(ChangeError { err, data }) => {
            log::debug!("{} failed: {err:#}", change.address);
            outcome(failed(err), data)
        }
    }
}

/// Failure message, prefixed with its category when the library raised it.
fn describe_failure(err: &anyhow::Error) -> String {
    match err.downcast_ref::<grantkit::Error>() {
        Some(cause) => format!("{}: {err:#}", cause.category().description()),
        None => format!("{err:#}"),
    }
}

/// A failed change and the data to record, if any.
struct ChangeError {
    err: anyhow::Error,
    data: Option<ResourceData>,
}

impl<E: Into<anyhow::Error>> From<E> for ChangeError {
    fn from(err: E) -> Self {
        Self {
            err: err.into(),
            data: None,
        }
    }
}

fn run_change(
    change: &PlannedChange,
    provider: &Provider,
) -> std::result::Result<(ApplyResult, ResourceData), ChangeError> {
    match (change.action, &change.prior, &change.desired) {
        (Action::Create, _, Some(desired)) => {
            let lifecycle = lifecycle(desired.resource_type)?;
            let mut data = ResourceData::from_config(desired.attributes.clone());
            lifecycle.create(provider, &mut data)?;
            Ok((ApplyResult::Created, data))
        }
        (Action::Update, Some(prior), Some(desired)) => {
            let lifecycle = lifecycle(desired.resource_type)?;
            let mut data = update_data(lifecycle, prior, &desired.attributes);
            lifecycle.update(provider, &mut data)?;
            Ok((ApplyResult::Modified, data))
        }
        (Action::Replace, Some(prior), Some(desired)) => {
            let mut old = prior.to_data();
            lifecycle(&prior.resource_type)?.delete(provider, &mut old)?;

            let lifecycle = lifecycle(desired.resource_type)?;
            let mut data = ResourceData::from_config(desired.attributes.clone());
            if let Err(err) = lifecycle.create(provider, &mut data) {
                // The old object is gone either way.
                return Err(ChangeError {
                    err: err.into(),
                    data: Some(old),
                });
            }
            Ok((ApplyResult::Modified, data))
        }
        (Action::Delete, Some(prior), _) => {
            let mut data = prior.to_data();
            lifecycle(&prior.resource_type)?.delete(provider, &mut data)?;
            Ok((ApplyResult::Removed, data))
        }
        (Action::NoChange, Some(prior), _) => Ok((ApplyResult::NoChange, prior.to_data())),
        (action, _, _) => Err(anyhow::anyhow!(
            "Inconsistent plan entry for {} ({action})",
            change.address
        )
        .into()),
    }
}

fn push_apply_result(results: &Arc<Mutex<Vec<ApplyOutcome>>>, result: ApplyOutcome) {
    match results.lock() {
        Ok(mut locked) => locked.push(result),
        Err(poisoned) => poisoned.into_inner().push(result),
    }
}

fn into_apply_results(results: Arc<Mutex<Vec<ApplyOutcome>>>) -> Result<Vec<ApplyOutcome>> {
    let mutex = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to collect apply results: shared result state"))?;

    match mutex.into_inner() {
        Ok(collected) => Ok(collected),
        Err(poisoned) => Ok(poisoned.into_inner()),
    }
}

/// Merge results into summary
fn merge_summary(summary: &mut ExecuteSummary, outcomes: &[ApplyOutcome]) {
    for outcome in outcomes {
        match outcome.result {
            ApplyResult::NoChange => summary.no_change += 1,
            ApplyResult::Created => summary.created += 1,
            ApplyResult::Modified => summary.modified += 1,
            ApplyResult::Removed => summary.removed += 1,
            ApplyResult::Failed { .. } => summary.failed += 1,
        }
    }
}

/// Confirm with user
fn confirm_proceed() -> Result<bool> {
    use dialoguer::Confirm;

    let confirmed = Confirm::new()
        .with_prompt("Continue?")
        .default(true)
        .interact()?;

    Ok(confirmed)
}

/// Print final summary
fn print_summary(summary: &ExecuteSummary) {
    println!();
    if summary.is_success() && summary.total_changes() == 0 {
        println!("  {} Nothing was changed", "ℹ".blue());
    } else if summary.is_success() {
        println!("  {} Changes applied successfully!", "✓".green().bold());
    } else {
        println!("  {} Changes applied with errors", "⚠".yellow().bold());
    }

    if summary.created > 0 {
        println!("    • {} resources created", summary.created);
    }
    if summary.modified > 0 {
        println!("    • {} resources modified", summary.modified);
    }
    if summary.removed > 0 {
        println!("    • {} resources removed", summary.removed);
    }
    if summary.skipped > 0 {
        println!("    • {} resources skipped", summary.skipped);
    }
    if summary.failed > 0 {
        println!("    • {} {} failed", summary.failed, "resources".red());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::planner;
    use crate::schema::DesiredResource;
    use crate::state::ResourceState;
    use grantkit::backend::{MockDatabase, Row};
    use grantkit::{Attributes, Value};
    use std::collections::BTreeMap;

    fn outcome(result: ApplyResult) -> ApplyOutcome {
        ApplyOutcome {
            address: "role.r".into(),
            resource_type: "role".into(),
            result,
            data: None,
        }
    }

    fn named(name: &str) -> Attributes {
        [("name".to_string(), Value::from(name))].into_iter().collect()
    }

    fn yes() -> ExecuteOptions {
        ExecuteOptions {
            yes: true,
            jobs: 2,
            ..ExecuteOptions::default()
        }
    }

    #[test]
    fn push_apply_result_handles_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ApplyOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let _guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            panic!("intentional poison");
        })
        .join();

        push_apply_result(&results, outcome(ApplyResult::NoChange));

        let len = match results.lock() {
            Ok(locked) => locked.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        };
        assert_eq!(len, 1);
    }

    #[test]
    fn into_apply_results_recovers_from_poisoned_mutex() {
        let results: Arc<Mutex<Vec<ApplyOutcome>>> = Arc::new(Mutex::new(Vec::new()));
        let poisoned = Arc::clone(&results);

        let _ = std::thread::spawn(move || {
            let mut guard = poisoned
                .lock()
                .expect("lock should succeed before poisoning");
            guard.push(outcome(ApplyResult::NoChange));
            panic!("intentional poison");
        })
        .join();

        let collected = into_apply_results(results).expect("poisoned mutex should be recovered");
        assert_eq!(collected.len(), 1);
    }

    #[test]
    fn test_merge_summary() {
        let mut summary = ExecuteSummary::default();
        merge_summary(
            &mut summary,
            &[
                outcome(ApplyResult::Created),
                outcome(ApplyResult::Removed),
                outcome(ApplyResult::Failed {
                    error: "boom".into(),
                }),
            ],
        );
        assert_eq!(summary.total_changes(), 2);
        assert!(!summary.is_success());
    }

    #[test]
    fn test_execute_creates_and_deletes() {
        let db = MockDatabase::new();
        db.add_rows("SHOW ROLES", vec![Row::from_strs(&["reader"])]);
        let provider = Provider::new(Arc::new(db.clone()));

        let mut desired = BTreeMap::new();
        desired.insert(
            "role.reader".to_string(),
            DesiredResource {
                resource_type: "role",
                attributes: named("reader"),
            },
        );
        let mut refreshed = BTreeMap::new();
        refreshed.insert(
            "role.old".to_string(),
            Some(ResourceState {
                resource_type: "role".into(),
                id: "old".into(),
                attributes: named("old"),
            }),
        );

        let mut state = StateFile::default();
        state.record("role.old", "role", refreshed["role.old"].clone().unwrap().to_data());

        let plan = planner::plan(&desired, &refreshed, None).unwrap();
        let summary = execute(&plan, &provider, &mut state, &yes()).unwrap();

        assert_eq!(summary.created, 1);
        assert_eq!(summary.removed, 1);
        assert_eq!(
            db.executed(),
            vec!["DROP ROLE `old`".to_string(), "CREATE ROLE `reader`".to_string()]
        );
        assert!(state.get("role.old").is_none());
        assert_eq!(state.get("role.reader").unwrap().id, "reader");
    }

    #[test]
    fn test_failure_keeps_prior_state() {
        let db = MockDatabase::new();
        db.fail_with("DROP ROLE", 1396, "Operation DROP ROLE failed");
        let provider = Provider::new(Arc::new(db));

        let mut refreshed = BTreeMap::new();
        refreshed.insert(
            "role.old".to_string(),
            Some(ResourceState {
                resource_type: "role".into(),
                id: "old".into(),
                attributes: named("old"),
            }),
        );
        let mut state = StateFile::default();
        state.record("role.old", "role", refreshed["role.old"].clone().unwrap().to_data());

        let plan = planner::plan_destroy(&refreshed, None).unwrap();
        let summary = execute(&plan, &provider, &mut state, &yes()).unwrap();

        assert_eq!(summary.failed, 1);
        assert!(state.get("role.old").is_some());
    }

    #[test]
    fn test_dry_run_changes_nothing() {
        let db = MockDatabase::new();
        let provider = Provider::new(Arc::new(db.clone()));

        let mut desired = BTreeMap::new();
        desired.insert(
            "role.reader".to_string(),
            DesiredResource {
                resource_type: "role",
                attributes: named("reader"),
            },
        );
        let plan = planner::plan(&desired, &BTreeMap::new(), None).unwrap();
        let opts = ExecuteOptions {
            dry_run: true,
            ..ExecuteOptions::default()
        };

        let mut state = StateFile::default();
        execute(&plan, &provider, &mut state, &opts).unwrap();
        assert!(db.executed().is_empty());
        assert!(state.resources.is_empty());
    }

    #[test]
    fn test_failures_are_described_by_category() {
        let err = anyhow::Error::from(grantkit::Error::validation("role name is required"));
        assert_eq!(
            describe_failure(&err),
            "Invalid configuration: validation error: role name is required"
        );

        let err = anyhow::anyhow!("Inconsistent plan entry");
        assert_eq!(describe_failure(&err), "Inconsistent plan entry");
    }

    #[test]
    fn test_user_password_is_recorded_as_fingerprint() {
        let db = MockDatabase::new();
        let provider = Provider::new(Arc::new(db.clone()));

        let attributes: Attributes = [
            ("user", Value::from("jdoe")),
            ("host", Value::from("%")),
            ("password", Value::from("hunter2")),
            ("tls_option", Value::from("NONE")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let mut desired = BTreeMap::new();
        desired.insert(
            "user.jdoe".to_string(),
            DesiredResource {
                resource_type: "user",
                attributes,
            },
        );

        let plan = planner::plan(&desired, &BTreeMap::new(), None).unwrap();
        let mut state = StateFile::default();
        let summary = execute(&plan, &provider, &mut state, &yes()).unwrap();

        assert_eq!(summary.created, 1);
        let recorded = state.get("user.jdoe").unwrap();
        assert_eq!(recorded.id, "jdoe@%");
        let password = recorded.attributes["password"].as_str().unwrap();
        assert!(grantkit::data::is_fingerprint_of(password, "hunter2"));
    }
}
