use agentic_browser::workflow::dispatcher::{self, ExecCtx};
use agentic_browser::workflow::step::StepData;
use agentic_browser::AgenticBrowser;
use serde_json::json;

fn steps(value: serde_json::Value) -> Vec<StepData> {
    value
        .as_array()
        .unwrap()
        .iter()
        .map(|v| StepData::from_value(v.clone()).unwrap())
        .collect()
}

const PAGE_HTML: &str = "data:text/html,\
<html><body>\
<a id=\"lnk\" href=\"#go\">go</a>\
<input id=\"name\" type=\"text\">\
<button class=\"row\">one</button>\
<button class=\"row\">two</button>\
<button class=\"row\">three</button>\
</body></html>";

#[tokio::test]
async fn runs_goto_write_and_click_to_completion() {
    let browser = AgenticBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("failed to launch browser");
    let page = browser
        .new_page("about:blank")
        .await
        .expect("failed to open page");

    let workflow = steps(json!([
        {"type": "goto", "url": PAGE_HTML},
        {"type": "write", "tag": "input", "attr": "id", "value": "name", "write": "hello"},
        {"type": "click", "tag": "a", "attr": "id", "value": "lnk"},
    ]));

    let ctx = ExecCtx {
        browser: &browser,
        page: &page,
    };
    let outcome = dispatcher::run_workflow(&ctx, &workflow).await;
    assert!(outcome.fatal.is_none(), "workflow should complete without a fatal error");
}

#[tokio::test]
async fn unknown_step_type_is_a_fatal_failure() {
    let browser = AgenticBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("failed to launch browser");
    let page = browser
        .new_page(PAGE_HTML)
        .await
        .expect("failed to open page");

    let workflow = steps(json!([{"type": "not_a_real_step"}]));

    let ctx = ExecCtx {
        browser: &browser,
        page: &page,
    };
    let outcome = dispatcher::run_workflow(&ctx, &workflow).await;
    let err = outcome.fatal.expect("unknown step type should be fatal");
    assert!(err.to_string().contains("Unknown step type"));
}

#[tokio::test]
async fn ignored_step_failure_does_not_stop_the_workflow() {
    let browser = AgenticBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("failed to launch browser");
    let page = browser
        .new_page(PAGE_HTML)
        .await
        .expect("failed to open page");

    let workflow = steps(json!([
        {"type": "click", "tag": "div", "class": "does-not-exist", "ignore": true},
        {"type": "write", "tag": "input", "attr": "id", "value": "name", "write": "ok"},
    ]));

    let ctx = ExecCtx {
        browser: &browser,
        page: &page,
    };
    let outcome = dispatcher::run_workflow(&ctx, &workflow).await;
    assert!(outcome.fatal.is_none(), "ignored failure must not abort the run");
}

#[tokio::test]
async fn unignored_step_failure_stops_the_workflow() {
    let browser = AgenticBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("failed to launch browser");
    let page = browser
        .new_page(PAGE_HTML)
        .await
        .expect("failed to open page");

    let workflow = steps(json!([
        {"type": "click", "tag": "div", "class": "does-not-exist"},
        {"type": "write", "tag": "input", "attr": "id", "value": "name", "write": "never runs"},
    ]));

    let ctx = ExecCtx {
        browser: &browser,
        page: &page,
    };
    let outcome = dispatcher::run_workflow(&ctx, &workflow).await;
    assert!(outcome.fatal.is_some(), "an unignored selector failure must be fatal");
}

#[tokio::test]
async fn array_step_dispatches_once_per_matching_parent() {
    let browser = AgenticBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("failed to launch browser");
    let page = browser
        .new_page(PAGE_HTML)
        .await
        .expect("failed to open page");

    // Every "row" button click writes into #name; after 3 iterations the
    // field holds the last button's own click (each click is a no-op on
    // plain buttons, so this mainly proves the array fanned out 3 times
    // without erroring on a selector that matches multiple elements).
    let workflow = steps(json!([
        {
            "type": "array",
            "tag": "button",
            "class": "row",
            "click": [
                {"type": "click", "tag": "button", "class": "row"}
            ]
        }
    ]));

    let ctx = ExecCtx {
        browser: &browser,
        page: &page,
    };
    let outcome = dispatcher::run_workflow(&ctx, &workflow).await;
    assert!(outcome.fatal.is_none(), "array iteration over 3 matches should succeed");
}

#[tokio::test]
async fn group_excel_without_a_spreadsheet_row_rejects_write_excel() {
    let browser = AgenticBrowser::builder()
        .headless(true)
        .build()
        .await
        .expect("failed to launch browser");
    let page = browser
        .new_page(PAGE_HTML)
        .await
        .expect("failed to open page");

    // No group_excel wrapping this write_excel: it must fail with
    // NoRowContext, not silently write an empty string.
    let workflow = steps(json!([
        {"type": "write_excel", "tag": "input", "attr": "id", "value": "name", "write_from_col": 1}
    ]));

    let ctx = ExecCtx {
        browser: &browser,
        page: &page,
    };
    let outcome = dispatcher::run_workflow(&ctx, &workflow).await;
    let err = outcome.fatal.expect("write_excel outside group_excel must fail");
    assert!(err.to_string().contains("write_excel"));
}
