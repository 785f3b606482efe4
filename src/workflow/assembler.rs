//! Workflow fragment assembly: merges numbered JSON fragment
//! files into one workflow document, optionally wrapping the result in a
//! `group_excel` header when a spreadsheet path is supplied.
//!
//! Grounded on the original's fragment-assembly preprocessor: editors
//! author a workflow as `1.json`, `2.json`, ... so steps can be reordered
//! by renaming files, and the assembler concatenates them in numeric
//! order into the single JSON array the runner actually consumes.

use std::path::Path;

use regex::Regex;
use serde_json::Value;

/// The result of an assembly run — mirrors `AssembleOutcome` from the
/// original preprocessor: a boolean outcome plus a human-readable log,
/// since a missing or malformed fragment is a diagnostic, not necessarily
/// fatal to assembling everything else.
pub struct AssembleOutcome {
    pub success: bool,
    pub log: Vec<String>,
}

/// Merges every `<N>.json` fragment in `fragments_dir`, in ascending
/// numeric order, into a single workflow array written to `output_path`.
/// If `spreadsheet` is given, the merged steps are unconditionally
/// wrapped in a `group_excel` step iterating that file from row 2 (spec
/// §4.E step 6); otherwise `merged` is emitted directly.
pub fn assemble_workflow(
    fragments_dir: &Path,
    output_path: &Path,
    spreadsheet: Option<&Path>,
) -> AssembleOutcome {
    let mut log = Vec::new();

    let entries = match std::fs::read_dir(fragments_dir) {
        Ok(e) => e,
        Err(e) => {
            log.push(format!(
                "ERROR: cannot read fragments directory {}: {e}",
                fragments_dir.display()
            ));
            return AssembleOutcome { success: false, log };
        }
    };

    let numbered = Regex::new(r"^(\d+)\.json$").unwrap();
    let mut files: Vec<(u64, std::path::PathBuf)> = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if let Some(caps) = numbered.captures(name) {
                if let Ok(n) = caps[1].parse::<u64>() {
                    files.push((n, path));
                }
            }
        }
    }
    files.sort_by_key(|(n, _)| *n);

    if files.is_empty() {
        log.push(format!(
            "WARNING: no numbered fragment files found in {}",
            fragments_dir.display()
        ));
    }

    let mut steps: Vec<Value> = Vec::new();
    for (_, path) in &files {
        merge_fragment(path, &mut steps, &mut log);
    }

    let assembled = match spreadsheet {
        Some(sheet) => {
            log.push(format!(
                "Wrapping {} step(s) in a group_excel over {}",
                steps.len(),
                sheet.display()
            ));
            serde_json::json!([{
                "type": "group_excel",
                "file": sheet.display().to_string(),
                "start_row": 2,
                "actions": steps,
            }])
        }
        None => Value::Array(steps),
    };

    write_assembled(&assembled, output_path, &mut log)
}

fn is_group_excel(step: &Value) -> bool {
    step.get("type")
        .and_then(Value::as_str)
        .map(|t| t.eq_ignore_ascii_case("group_excel"))
        .unwrap_or(false)
}

/// Parses one fragment file and appends its steps to `steps`. A fragment
/// must be a JSON array of step objects (`build_exam_file.py:53-54`:
/// anything else is a diagnostic, not a hard stop for the rest of the
/// fragment set). Within an array, the "leading `group_excel`-shaped
/// fragment" special case (`build_exam_file.py:58-67`) is keyed on the
/// array's *first element*: if it is a `group_excel` object, only its
/// `actions` array is merged in, and any further elements in the fragment
/// produce a warning rather than being silently dropped.
fn merge_fragment(path: &Path, steps: &mut Vec<Value>, log: &mut Vec<String>) {
    let text = match std::fs::read_to_string(path) {
        Ok(t) => t,
        Err(e) => {
            log.push(format!("ERROR: cannot read fragment {}: {e}", path.display()));
            return;
        }
    };

    let value: Value = match serde_json::from_str(&text) {
        Ok(v) => v,
        Err(e) => {
            log.push(format!(
                "ERROR: fragment {} is not valid JSON, skipping: {e}",
                path.display()
            ));
            return;
        }
    };

    let Value::Array(items) = value else {
        log.push(format!(
            "ERROR: fragment {} is not a JSON array, skipping",
            path.display()
        ));
        return;
    };

    match items.split_first() {
        Some((head, rest)) if is_group_excel(head) => {
            let actions = head
                .get("actions")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            if !rest.is_empty() {
                log.push(format!(
                    "WARNING: fragment {} has {} element(s) after its leading group_excel, ignoring them",
                    path.display(),
                    rest.len()
                ));
            }
            log.push(format!(
                "Merged {} step(s) from {}'s leading group_excel actions",
                actions.len(),
                path.display()
            ));
            steps.extend(actions);
        }
        _ => {
            log.push(format!("Merged {} step(s) from {}", items.len(), path.display()));
            steps.extend(items);
        }
    }
}

fn write_assembled(assembled: &Value, output_path: &Path, log: &mut Vec<String>) -> AssembleOutcome {
    let pretty = match serde_json::to_string_pretty(assembled) {
        Ok(s) => s,
        Err(e) => {
            log.push(format!("ERROR: failed to serialize assembled workflow: {e}"));
            return AssembleOutcome {
                success: false,
                log: log.clone(),
            };
        }
    };

    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                log.push(format!("ERROR: cannot create output directory: {e}"));
                return AssembleOutcome {
                    success: false,
                    log: log.clone(),
                };
            }
        }
    }

    match std::fs::write(output_path, pretty) {
        Ok(()) => {
            log.push(format!("Wrote assembled workflow to {}", output_path.display()));
            AssembleOutcome {
                success: true,
                log: log.clone(),
            }
        }
        Err(e) => {
            log.push(format!("ERROR: failed to write {}: {e}", output_path.display()));
            AssembleOutcome {
                success: false,
                log: log.clone(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn merges_fragments_in_numeric_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("2.json"), r#"[{"type": "write", "value": "b"}]"#).unwrap();
        fs::write(dir.path().join("10.json"), r#"[{"type": "write", "value": "c"}]"#).unwrap();
        fs::write(dir.path().join("1.json"), r#"[{"type": "goto", "url": "https://x"}]"#).unwrap();

        let out = dir.path().join("assembled.json");
        let outcome = assemble_workflow(dir.path(), &out, None);
        assert!(outcome.success);

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let arr = written.as_array().unwrap();
        assert_eq!(arr.len(), 3);
        assert_eq!(arr[0]["type"], "goto");
        assert_eq!(arr[1]["value"], "b");
        assert_eq!(arr[2]["value"], "c");
    }

    #[test]
    fn non_array_fragment_is_skipped_with_diagnostic() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.json"), r#"{"type": "click"}"#).unwrap();
        fs::write(dir.path().join("2.json"), r#"[{"type": "write", "value": "ok"}]"#).unwrap();

        let out = dir.path().join("assembled.json");
        let outcome = assemble_workflow(dir.path(), &out, None);
        assert!(outcome.success);
        assert!(outcome.log.iter().any(|l| l.contains("is not a JSON array")));

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 1);
    }

    #[test]
    fn leading_group_excel_shaped_fragment_extracts_actions() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("1.json"),
            r#"[
                {"type": "group_excel", "file": "rows.xlsx", "actions": [{"type": "click"}]},
                {"type": "goto", "url": "https://should-warn"}
            ]"#,
        )
        .unwrap();

        let out = dir.path().join("assembled.json");
        let outcome = assemble_workflow(dir.path(), &out, None);
        assert!(outcome.success);
        assert!(outcome
            .log
            .iter()
            .any(|l| l.contains("element(s) after its leading group_excel")));

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let arr = written.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["type"], "click");
    }

    #[test]
    fn non_array_group_excel_shaped_fragment_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("1.json"),
            r#"{"type": "group_excel", "actions": [{"type": "click"}]}"#,
        )
        .unwrap();

        let out = dir.path().join("assembled.json");
        let outcome = assemble_workflow(dir.path(), &out, None);
        assert!(outcome.success);
        assert!(outcome.log.iter().any(|l| l.contains("is not a JSON array")));

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written.as_array().unwrap().len(), 0);
    }

    #[test]
    fn wrap_always_uses_the_spreadsheet_path_given_to_this_call() {
        // The lone fragment is itself group_excel-shaped; merge_fragment
        // splices its (here empty) actions, and the final wrap rebuilds
        // the header fresh from the spreadsheet path this call was given,
        // not whatever path the old fragment happened to carry.
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("1.json"),
            r#"[{"type": "group_excel", "file": "stale.xlsx", "start_row": 2, "actions": []}]"#,
        )
        .unwrap();

        let out = dir.path().join("assembled.json");
        let sheet = dir.path().join("rows.xlsx");
        let outcome = assemble_workflow(dir.path(), &out, Some(&sheet));
        assert!(outcome.success);

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let arr = written.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["type"], "group_excel");
        assert_eq!(arr[0]["file"], sheet.display().to_string());
        assert_eq!(arr[0]["actions"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn wraps_merged_steps_in_group_excel_when_spreadsheet_given() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("1.json"), r#"[{"type": "write_excel", "write_from_col": 1}]"#).unwrap();

        let out = dir.path().join("assembled.json");
        let sheet = dir.path().join("rows.xlsx");
        let outcome = assemble_workflow(dir.path(), &out, Some(&sheet));
        assert!(outcome.success);

        let written: Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();
        let arr = written.as_array().unwrap();
        assert_eq!(arr.len(), 1);
        assert_eq!(arr[0]["type"], "group_excel");
        assert_eq!(arr[0]["start_row"], 2);
        assert_eq!(arr[0]["actions"].as_array().unwrap().len(), 1);
    }
}
