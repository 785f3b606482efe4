//! Leaf step executors: one function per step kind that does
//! not itself recurse into a nested action list. The recursing kinds
//! (`array`, `group_action`, `group_excel`) live in `dispatcher.rs` since
//! they call back into `dispatch_list`.

use std::time::Duration;

use rand::Rng;

use crate::browser::AgenticBrowser;
use crate::config::{DEFAULT_CLICK_TIMEOUT_MS, DEFAULT_TIMEOUT_MS};
use crate::error::{Error, Result};
use crate::page::Page;
use crate::workflow::download::{self, DownloadRequest};
use crate::workflow::excel::{column_value, ExcelRow};
use crate::workflow::locator::{self, ParentPin, ResolvedTarget};
use crate::workflow::scope::{FrameRoute, ScopeTracker};
use crate::workflow::step::{StepData, ALIAS_GOTO_URL, ALIAS_WRITE_PAYLOAD};

type Scope = ScopeTracker<ParentPin>;

/// `goto`: navigates, resets `currentFrame` to nil.
pub async fn exec_goto(page: &Page, step: &StepData, scope: &Scope) -> Result<Scope> {
    let url = step
        .str_any(ALIAS_GOTO_URL)
        .ok_or_else(|| Error::ConfigError("goto step missing url/value".into()))?;
    tracing::info!("Navigating to: {url}");
    page.goto(&url).await?;
    Ok(scope.with_frame(None))
}

/// `refresh`: reload; `currentFrame` is deliberately NOT reset
///.
pub async fn exec_refresh(page: &Page, _step: &StepData) -> Result<()> {
    tracing::info!("Refreshing page");
    page.reload().await
}

/// `frame`: switches to a subframe by exactly one of
/// selector/name/url/index.
pub fn exec_frame(step: &StepData, scope: &Scope) -> Result<Scope> {
    let route = if let Some(sel) = step.str_any(&["selector"]) {
        tracing::info!("Switching to frame by selector: {sel}");
        FrameRoute::Selector(sel)
    } else if let Some(name) = step.str_any(&["name"]) {
        tracing::info!("Switching to frame by name: {name}");
        FrameRoute::Name(name)
    } else if let Some(url) = step.str_any(&["url"]) {
        tracing::info!("Switching to frame by URL: {url}");
        FrameRoute::Url(url)
    } else if let Some(idx) = step.usize_any(&["index"]) {
        tracing::info!("Switching to frame by index: {idx}");
        FrameRoute::Index(idx)
    } else {
        return Err(Error::ConfigError(
            "frame step requires selector, name, url, or index".into(),
        ));
    };
    Ok(scope.with_frame(Some(route)))
}

/// `main_frame`: resets `currentFrame` to nil.
pub fn exec_main_frame(scope: &Scope) -> Scope {
    tracing::info!("Switching to main frame");
    scope.with_frame(None)
}

/// `use_last_tab`: brings the most recently opened page to the
/// front; no-op with a single tab.
pub async fn exec_use_last_tab(browser: &AgenticBrowser) -> Result<()> {
    let pages = browser.pages().await?;
    if pages.len() > 1 {
        let last = pages.last().unwrap();
        last.bring_to_front().await?;
        let url = last.url().await.unwrap_or_default();
        tracing::info!("Switched to last tab: {url}");
    } else {
        tracing::info!("Single tab open, use_last_tab is a no-op");
    }
    Ok(())
}

/// Evaluates an `if` block's `status` condition.
pub async fn check_condition(page: &Page, scope: &Scope, condition: &StepData) -> Result<bool> {
    let status = condition
        .str_any(&["status"])
        .ok_or_else(|| Error::ConfigError("condition missing \"status\"".into()))?;
    let f = condition.selector_fields();
    let selector = crate::selector::build_css_selector(
        f.tag.as_deref(),
        f.class.as_deref(),
        f.attr.as_deref(),
        f.value.as_deref(),
    );
    let n = locator::count(page, scope, &selector, f.text.as_deref()).await?;
    tracing::info!("Condition {selector} status={status}, found={n}");
    match status.as_str() {
        "found" => Ok(n > 0),
        "not_found" => Ok(n == 0),
        other => Err(Error::ConfigError(format!("unknown condition status: {other}"))),
    }
}

/// `click`, excluding the `if` branch (handled by the
/// dispatcher, which re-enters `dispatch_list` for the alternative clicks).
pub async fn exec_click(page: &Page, scope: &Scope, step: &StepData) -> Result<()> {
    let f = step.selector_fields();
    let selector = step.css_selector();
    let index = f.array_select_one.unwrap_or(0);
    let timeout = Duration::from_millis(step.timeout_ms(DEFAULT_CLICK_TIMEOUT_MS));

    tracing::info!("Clicking: {selector}");
    let target = locator::resolve(page, scope, &selector, f.text.as_deref(), index).await?;
    locator::wait_visible_and_scroll(page, &target, timeout).await?;

    let href = locator::get_href(page, &target).await.unwrap_or(None);
    click_target(page, &target).await?;

    if href.is_some() && page.wait_for_navigation_idle(Duration::from_secs(15)).await.is_err() {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }
    Ok(())
}

async fn click_target(page: &Page, target: &ResolvedTarget) -> Result<()> {
    match target {
        ResolvedTarget::Real(el) => el.click().await,
        ResolvedTarget::Virtual(node) => {
            let expr = format!(
                "(function() {{ var el = {node}; if (!el) return false; el.click(); return true; }})()",
                node = node.expr
            );
            page.evaluate_value(&expr).await?;
            Ok(())
        }
    }
}

/// `write`: focus, optionally clear, then type character by
/// character with a uniform 50-150ms delay per character (space adds
/// 100-200ms extra) — a real per-keystroke CDP delay for page/parent
/// roots, and an equivalent paced value-append for frame roots (see
/// `locator.rs` module docs for why frame roots cannot get real CDP
/// keyboard events here).
pub async fn exec_write(page: &Page, scope: &Scope, step: &StepData) -> Result<()> {
    exec_write_with_text(page, scope, step, None).await
}

/// `write_excel`: legal only inside `group_excel`; reads
/// `write_from_col` (1-based) from the current row, then behaves as
/// `write` with that value.
pub async fn exec_write_excel(
    page: &Page,
    scope: &Scope,
    step: &StepData,
    row: Option<&ExcelRow>,
) -> Result<()> {
    let Some(row) = row else {
        return Err(Error::NoRowContext("write_excel".into()));
    };
    let col = step.usize_any(&["write_from_col"]);
    let value = match col {
        Some(c) => column_value(row, c).unwrap_or_else(|| {
            tracing::warn!("write_excel: column {c} missing in row, using empty string");
            ""
        }),
        None => {
            tracing::warn!("write_excel: missing write_from_col, using empty string");
            ""
        }
    };
    exec_write_with_text(page, scope, step, Some(value)).await
}

async fn exec_write_with_text(
    page: &Page,
    scope: &Scope,
    step: &StepData,
    override_text: Option<&str>,
) -> Result<()> {
    let text = match override_text {
        Some(t) => t.to_string(),
        None => step
            .str_any(ALIAS_WRITE_PAYLOAD)
            .ok_or_else(|| Error::ConfigError("write step missing write/value/text".into()))?,
    };
    let f = step.selector_fields();
    let selector = step.css_selector();
    let index = f.array_select_one.unwrap_or(0);
    let timeout = Duration::from_millis(step.timeout_ms(DEFAULT_TIMEOUT_MS));
    let clear = step.bool_any(&["clear"], true);

    tracing::info!("Writing to: {selector}");
    let target = locator::resolve(page, scope, &selector, None, index).await?;
    locator::wait_visible_and_scroll(page, &target, timeout).await?;
    focus_and_clear(page, &target, clear).await?;
    human_type(page, &target, &text).await
}

async fn focus_and_clear(page: &Page, target: &ResolvedTarget, clear: bool) -> Result<()> {
    match target {
        ResolvedTarget::Real(el) => {
            el.click().await?;
            el.focus().await?;
            if clear {
                clear_real_element(el).await?;
            }
            Ok(())
        }
        ResolvedTarget::Virtual(node) => {
            let clear_js = if clear { "el.value = '';" } else { "" };
            let expr = format!(
                "(function() {{ var el = {node}; if (!el) return false; el.focus(); {clear} \
                 el.dispatchEvent(new Event('input', {{bubbles: true}})); return true; }})()",
                node = node.expr,
                clear = clear_js,
            );
            page.evaluate_value(&expr).await?;
            Ok(())
        }
    }
}

/// Clearing a real element via a trusted keyboard-level "select all +
/// delete" instead of blind value assignment, so framework-bound inputs
/// (React-controlled etc.) observe the change like a real user clearing
/// the field.
async fn clear_real_element(el: &crate::element::Element) -> Result<()> {
    el.press_key("Control+A").await.ok();
    el.press_key("Backspace").await.ok();
    Ok(())
}

/// Uniform 50-150ms delay per character, +100-200ms extra for spaces
/// — the cadence is required, not cosmetic.
async fn human_type(page: &Page, target: &ResolvedTarget, text: &str) -> Result<()> {
    let mut rng = rand::thread_rng();
    for ch in text.chars() {
        type_one_char(page, target, ch).await?;
        let mut delay_ms = rng.gen_range(50..=150);
        if ch == ' ' {
            delay_ms += rng.gen_range(100..=200);
        }
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
    }
    Ok(())
}

async fn type_one_char(page: &Page, target: &ResolvedTarget, ch: char) -> Result<()> {
    match target {
        ResolvedTarget::Real(el) => {
            let mut buf = [0u8; 4];
            el.inner()
                .type_str(ch.encode_utf8(&mut buf) as &str)
                .await
                .map_err(Error::CdpError)?;
            Ok(())
        }
        ResolvedTarget::Virtual(node) => {
            let ch_json = serde_json::to_string(&ch.to_string()).unwrap_or_else(|_| "\"\"".into());
            let expr = format!(
                "(function() {{ var el = {node}; if (!el) return false; \
                 el.value = (el.value || '') + {ch}; \
                 el.dispatchEvent(new Event('input', {{bubbles: true}})); return true; }})()",
                node = node.expr,
                ch = ch_json,
            );
            page.evaluate_value(&expr).await?;
            Ok(())
        }
    }
}

/// `select`: default tag `select`, exactly one of
/// `option_value`/`option_label`/`option_index`.
pub async fn exec_select(page: &Page, scope: &Scope, step: &StepData) -> Result<()> {
    let f = step.selector_fields();
    let tag = f.tag.clone().or_else(|| Some("select".to_string()));
    let selector = crate::selector::build_css_selector(
        tag.as_deref(),
        f.class.as_deref(),
        f.attr.as_deref(),
        f.value.as_deref(),
    );
    let index = f.array_select_one.unwrap_or(0);
    let timeout = Duration::from_millis(step.timeout_ms(DEFAULT_TIMEOUT_MS));

    let opt_value = step.str_any(&["option_value"]);
    let opt_label = step.str_any(&["option_label"]);
    let opt_index = step.usize_any(&["option_index"]);

    tracing::info!("Selecting option on: {selector}");
    let target = locator::resolve(page, scope, &selector, None, index).await?;
    locator::wait_visible_and_scroll(page, &target, timeout).await?;
    apply_select(page, &target, opt_value.as_deref(), opt_label.as_deref(), opt_index).await
}

async fn apply_select(
    page: &Page,
    target: &ResolvedTarget,
    opt_value: Option<&str>,
    opt_label: Option<&str>,
    opt_index: Option<usize>,
) -> Result<()> {
    let selector_script = match (opt_value, opt_label, opt_index) {
        (Some(v), _, _) => format!("el.value = {};", serde_json::to_string(v).unwrap()),
        (None, Some(l), _) => format!(
            "for (var i = 0; i < el.options.length; i++) {{ \
               if (el.options[i].label === {l} || el.options[i].text === {l}) {{ el.selectedIndex = i; break; }} \
             }}",
            l = serde_json::to_string(l).unwrap()
        ),
        (None, None, Some(i)) => format!("el.selectedIndex = {i};"),
        (None, None, None) => {
            return Err(Error::ConfigError(
                "select step requires option_value, option_label, or option_index".into(),
            ))
        }
    };

    match target {
        ResolvedTarget::Real(el) => {
            let expr = format!(
                "function() {{ var el = this; {selector_script} \
                 el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }}"
            );
            el.inner()
                .call_js_fn(&expr, false)
                .await
                .map_err(Error::CdpError)?;
            Ok(())
        }
        ResolvedTarget::Virtual(node) => {
            let expr = format!(
                "(function() {{ var el = {node}; if (!el) return false; {selector_script} \
                 el.dispatchEvent(new Event('change', {{bubbles: true}})); return true; }})()",
                node = node.expr,
            );
            page.evaluate_value(&expr).await?;
            Ok(())
        }
    }
}

/// `scroll`: positional (absolute window offset) or
/// element-based (scroll-into-view).
pub async fn exec_scroll(page: &Page, scope: &Scope, step: &StepData) -> Result<()> {
    let x = step.f64_any(&["x"]);
    let y = step.f64_any(&["y"]);

    if x.is_some() || y.is_some() {
        let x = x.unwrap_or(0.0);
        let y = y.unwrap_or(0.0);
        tracing::info!("Scrolling to position: {x}, {y}");
        page.evaluate_void(&format!("window.scrollTo({x}, {y})")).await?;
        return Ok(());
    }

    let f = step.selector_fields();
    let selector = step.css_selector();
    let index = f.array_select_one.unwrap_or(0);
    let timeout = Duration::from_millis(step.timeout_ms(DEFAULT_TIMEOUT_MS));

    tracing::info!("Scrolling to element: {selector}");
    let target = locator::resolve(page, scope, &selector, f.text.as_deref(), index).await?;
    locator::wait_visible_and_scroll(page, &target, timeout).await
}

/// `download_from_link`.
pub async fn exec_download_from_link(
    browser: &AgenticBrowser,
    page: &Page,
    scope: &Scope,
    step: &StepData,
) -> Result<()> {
    let f = step.selector_fields();
    let selector = step.css_selector();
    let index = f.array_select_one.unwrap_or(0);
    let timeout = Duration::from_millis(step.timeout_ms(DEFAULT_CLICK_TIMEOUT_MS));

    tracing::info!("Downloading via: {selector}");
    let target = locator::resolve(page, scope, &selector, f.text.as_deref(), index).await?;
    locator::wait_visible_and_scroll(page, &target, timeout).await?;

    let href = locator::get_href(page, &target)
        .await?
        .ok_or_else(|| Error::ConfigError("download_from_link target has no href".into()))?;

    let page_url = page.url().await.unwrap_or_default();
    let page_title = page.title().await.unwrap_or_else(|_| "download".to_string());
    let explicit_ext = step.str_any(&["extension", "ext"]);
    let download_index = step.f64_any(&["index"]).map(|n| n as i64).unwrap_or(1);
    let download_dir = step
        .str_any(&["download_dir"])
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::current_dir().unwrap_or_default());

    let req = DownloadRequest {
        href: &href,
        page_url: &page_url,
        page_title: &page_title,
        index: download_index,
        explicit_extension: explicit_ext.as_deref(),
        download_dir: &download_dir,
    };
    let outcome = download::download_from_link(browser, req).await?;
    tracing::info!(
        "Downloaded to: {} (subtitle protocol: {})",
        outcome.path.display(),
        outcome.via_subtitle_protocol
    );
    Ok(())
}

