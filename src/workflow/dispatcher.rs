//! Recursive step dispatch: maps each step's `type` to its
//! executor, threads `currentFrame`/parent scope and the active
//! `group_excel` row through a step list, and applies the ignore/sleep/
//! unknown-type rules.
//!
//! `array`, `group_action`, and `group_excel` live here rather than in
//! `executors.rs` because they recurse back into `dispatch_list`.

use std::time::Duration;

use crate::browser::AgenticBrowser;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::workflow::excel::{self, ExcelRow};
use crate::workflow::executors;
use crate::workflow::locator::{self, ParentPin};
use crate::workflow::scope::ScopeTracker;
use crate::workflow::step::StepData;

pub type Scope = ScopeTracker<ParentPin>;

/// The live handles a step needs to act: the browser (for `use_last_tab`
/// and `download_from_link`, which may open a fresh page) and the single
/// page every step scripts against.
pub struct ExecCtx<'a> {
    pub browser: &'a AgenticBrowser,
    pub page: &'a Page,
}

/// The result of running a step list to completion, or stopping early on
/// a fatal (unignored) failure.
pub struct DispatchOutcome {
    pub scope: Scope,
    pub fatal: Option<Error>,
}

/// Dispatches the top-level workflow.
pub async fn run_workflow(ctx: &ExecCtx<'_>, steps: &[StepData]) -> DispatchOutcome {
    dispatch_list(ctx, Scope::new(), steps, None, false).await
}

/// Runs every step in `steps` in order. `group_ignore` is the enclosing
/// group's own `ignore` flag, which widens to cover every nested failure
/// regardless of each nested step's own flag.
///
/// `currentFrame` changes (`goto`/`frame`/`main_frame`) thread forward to
/// later steps in *this* list; they do not leak back out to the caller
/// once this list finishes.
pub async fn dispatch_list(
    ctx: &ExecCtx<'_>,
    start_scope: Scope,
    steps: &[StepData],
    row: Option<&ExcelRow>,
    group_ignore: bool,
) -> DispatchOutcome {
    let mut scope = start_scope;
    for step in steps {
        let ignore = step.ignore() || group_ignore;
        let kind = step.step_type().unwrap_or_else(|| "?".to_string());
        let title = step.title().unwrap_or_else(|| kind.clone());

        tracing::info!(step = %kind, title = %title, "dispatching step");
        match dispatch_one(ctx, &scope, step, row, group_ignore).await {
            Ok(new_scope) => {
                if let Some(s) = new_scope {
                    scope = s;
                }
                sleep_after(step).await;
            }
            Err(e) => {
                if ignore {
                    tracing::warn!(step = %kind, title = %title, error = %e, "ignored step failure");
                    sleep_after(step).await;
                } else {
                    tracing::error!(step = %kind, title = %title, error = %e, "fatal step failure");
                    return DispatchOutcome { scope, fatal: Some(e) };
                }
            }
        }
    }
    DispatchOutcome { scope, fatal: None }
}

async fn sleep_after(step: &StepData) {
    if let Some(secs) = step.sleep_secs() {
        if secs > 0.0 {
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        }
    }
}

/// Dispatches a single step, returning `Ok(Some(new_scope))` when the step
/// reassigns `currentFrame`, `Ok(None)` otherwise.
async fn dispatch_one(
    ctx: &ExecCtx<'_>,
    scope: &Scope,
    step: &StepData,
    row: Option<&ExcelRow>,
    group_ignore: bool,
) -> Result<Option<Scope>> {
    let Some(kind) = step.step_type() else {
        return Err(Error::ConfigError("step missing \"type\"".into()));
    };

    match kind.as_str() {
        "goto" => Ok(Some(executors::exec_goto(ctx.page, step, scope).await?)),
        "refresh" => {
            executors::exec_refresh(ctx.page, step).await?;
            Ok(None)
        }
        "frame" => Ok(Some(executors::exec_frame(step, scope)?)),
        "main_frame" => Ok(Some(executors::exec_main_frame(scope))),
        "use_last_tab" => {
            executors::exec_use_last_tab(ctx.browser).await?;
            Ok(None)
        }
        "click" => {
            exec_click_with_condition(ctx, scope, step, row, group_ignore).await?;
            Ok(None)
        }
        "write" => {
            executors::exec_write(ctx.page, scope, step).await?;
            Ok(None)
        }
        "write_excel" => {
            executors::exec_write_excel(ctx.page, scope, step, row).await?;
            Ok(None)
        }
        "select" => {
            executors::exec_select(ctx.page, scope, step).await?;
            Ok(None)
        }
        "scroll" => {
            executors::exec_scroll(ctx.page, scope, step).await?;
            Ok(None)
        }
        "download_from_link" => {
            executors::exec_download_from_link(ctx.browser, ctx.page, scope, step).await?;
            Ok(None)
        }
        "array" => {
            exec_array(ctx, scope, step, row, group_ignore).await?;
            Ok(None)
        }
        "group_action" => {
            exec_group_action(ctx, scope, step, row, group_ignore).await?;
            Ok(None)
        }
        "group_excel" => {
            exec_group_excel(ctx, scope, step, group_ignore).await?;
            Ok(None)
        }
        other => Err(Error::UnknownStepType(other.to_string())),
    }
}

/// `click`'s `if` branch: an optional `if` object carrying its
/// own locator fields, a `status` ("found"/"not_found"), and a `click`
/// field (single object or list) run instead of the primary click when the
/// condition matches the declared status.
async fn exec_click_with_condition(
    ctx: &ExecCtx<'_>,
    scope: &Scope,
    step: &StepData,
    row: Option<&ExcelRow>,
    group_ignore: bool,
) -> Result<()> {
    if let Some(condition) = step.object_any(&["if"]) {
        let matched = executors::check_condition(ctx.page, scope, &condition).await?;
        if matched {
            let alt_clicks = condition.array_any(&["click"]);
            let outcome = dispatch_list(ctx, scope.clone(), &alt_clicks, row, group_ignore).await;
            return outcome.fatal.map_or(Ok(()), Err);
        }
    }
    executors::exec_click(ctx.page, scope, step).await
}

/// `array`: the step's own locator fields identify repeated
/// parent nodes (optionally narrowed by `if_find_text_inside`); its
/// `click` field is a nested step list dispatched once per matching
/// parent, scoped with that parent pinned.
async fn exec_array(
    ctx: &ExecCtx<'_>,
    scope: &Scope,
    step: &StepData,
    row: Option<&ExcelRow>,
    group_ignore: bool,
) -> Result<()> {
    let this_group_ignore = step.ignore() || group_ignore;
    let f = step.selector_fields();
    let selector = step.css_selector();
    let text_filter = step.str_any(&["if_find_text_inside"]);
    let children = step.array_any(&["click"]);

    let count = locator::count(ctx.page, scope, &selector, text_filter.as_deref()).await?;
    tracing::info!("array: {selector} matched {count} parent(s)");

    let indices: Vec<usize> = match f.array_select_one {
        Some(i) => vec![i],
        None => (0..count).collect(),
    };

    for idx in indices {
        let target = locator::resolve(ctx.page, scope, &selector, text_filter.as_deref(), idx).await?;
        let pin = locator::pin_parent(target);
        let child_scope = scope.with_parent(Some(pin));
        let outcome = dispatch_list(ctx, child_scope, &children, row, this_group_ignore).await;
        if let Some(e) = outcome.fatal {
            return Err(e);
        }
    }
    Ok(())
}

/// `group_action`: generalizes `array` to an arbitrary
/// `actions` list instead of a fixed `click` list, with a top-level
/// `global_actions` flag and a per-action `global` override that drops the
/// parent pin for that one action.
async fn exec_group_action(
    ctx: &ExecCtx<'_>,
    scope: &Scope,
    step: &StepData,
    row: Option<&ExcelRow>,
    group_ignore: bool,
) -> Result<()> {
    let this_group_ignore = step.ignore() || group_ignore;
    let f = step.selector_fields();
    let selector = step.css_selector();
    let text_filter = step.str_any(&["if_find_text_inside"]);
    let actions = step.array_any(&["actions"]);
    let global_actions = step.bool_any(&["global_actions"], false);

    let count = locator::count(ctx.page, scope, &selector, text_filter.as_deref()).await?;
    tracing::info!("group_action: {selector} matched {count} parent(s)");

    let indices: Vec<usize> = match f.array_select_one {
        Some(i) => vec![i],
        None => (0..count).collect(),
    };

    for idx in indices {
        let target = locator::resolve(ctx.page, scope, &selector, text_filter.as_deref(), idx).await?;
        let pin = locator::pin_parent(target);
        // Scope for this parent iteration; a `frame`/`main_frame`/`goto` among
        // the actions threads forward to later actions in the same iteration
        // (invariant 4), while the parent pin set here persists across
        // actions regardless of any single action's own `global` override.
        let mut iter_scope = scope.with_parent(Some(pin));

        for action in &actions {
            let action_global = action.bool_any(&["global"], global_actions);
            let action_scope = if action_global {
                iter_scope.without_parent()
            } else {
                iter_scope.clone()
            };
            let single = std::slice::from_ref(action);
            let outcome = dispatch_list(ctx, action_scope, single, row, this_group_ignore).await;
            if let Some(e) = outcome.fatal {
                return Err(e);
            }
            iter_scope = iter_scope.with_frame(outcome.scope.frame().cloned());
        }
    }
    Ok(())
}

/// `group_excel`: loads rows from the named
/// spreadsheet starting at `start_row` (default 2) and dispatches
/// `actions` once per row, with that row bound for any nested
/// `write_excel`. A `group_excel` nested inside another's `actions`
/// shadows the outer row for the duration of its own iteration.
async fn exec_group_excel(
    ctx: &ExecCtx<'_>,
    scope: &Scope,
    step: &StepData,
    group_ignore: bool,
) -> Result<()> {
    let this_group_ignore = step.ignore() || group_ignore;
    let path = step
        .str_any(&["file", "path", "spreadsheet", "excel_file"])
        .ok_or_else(|| Error::ConfigError("group_excel step missing file/path".into()))?;
    let start_row = step.usize_any(&["start_row"]).unwrap_or(2);
    let actions = step.array_any(&["actions"]);

    let rows = excel::load_excel_rows(std::path::Path::new(&path), start_row)?;
    tracing::info!("group_excel: loaded {} row(s) from {path}", rows.len());

    for row in &rows {
        let outcome = dispatch_list(ctx, scope.clone(), &actions, Some(row), this_group_ignore).await;
        if let Some(e) = outcome.fatal {
            return Err(e);
        }
    }
    Ok(())
}
