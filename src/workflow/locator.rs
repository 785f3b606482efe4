//! Locator resolution: turn `(root, selector, textFilter, index)`
//! into a concrete, actionable target, honoring the scope stack's priority
//!.
//!
//! Two resolution strategies coexist, chosen by the active scope:
//!
//! - **Page / element-parent root**: resolved through real CDP element
//!   handles (`crate::element::Element`, via `Page`/`Element::find_elements`),
//!   giving genuine mouse/keyboard synthesis for clicks and human typing.
//! - **Frame root**: chromiumoxide has no first-class "query inside this
//!   iframe's document" CDP call wired up in this crate (`Page` only ever
//!   queries the top document). This crate reaches into same-origin
//!   frames the same way it already reaches across the whole page for
//!   batch queries — one JS expression
//!   evaluated via `Page::evaluate_value` (see `fill_form`,
//!   `query_selector_all_with_data`) — composing a self-contained
//!   "root expression" string that is safe to re-evaluate from scratch for
//!   every action. This is a documented limitation (see DESIGN.md): a
//!   cross-origin iframe cannot be reached this way, same as the spec's own
//!   documented attribute-escaping limitation in §4.A.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::element::Element;
use crate::error::{Error, Result};
use crate::page::Page;
use crate::workflow::scope::{EffectiveRoot, FrameRoute, ScopeTracker};

/// The runtime parent-pin payload threaded through `ScopeTracker`. `Element` for a page-rooted pin (real CDP handle,
/// reused for nested `find_elements` calls); `Virtual` for a pin taken
/// inside a frame scope (a composable JS root expression).
#[derive(Clone)]
pub enum ParentPin {
    Element(Arc<Element>),
    Virtual(VirtualNode),
}

/// A JS expression, re-evaluated fresh on every use, that yields either a
/// `Document` (frame root, no pin yet) or an `Element` (after a pin), or
/// `null` if the node has since disappeared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualNode {
    pub expr: String,
}

impl VirtualNode {
    pub fn new(expr: impl Into<String>) -> Self {
        Self { expr: expr.into() }
    }

    /// Composes a child query on top of this node: `querySelectorAll` on
    /// whatever this node resolves to, optionally text-filtered, indexed.
    pub fn child(&self, selector: &str, text_filter: Option<&str>, index: usize) -> VirtualNode {
        let sel_json = serde_json::to_string(selector).unwrap_or_else(|_| "\"*\"".into());
        let filter_js = match text_filter {
            Some(t) => {
                let t_json = serde_json::to_string(t).unwrap_or_else(|_| "\"\"".into());
                format!(
                    "nodes = nodes.filter(function(el) {{ return (el.innerText || el.textContent || '').includes({t_json}); }});"
                )
            }
            None => String::new(),
        };
        VirtualNode::new(format!(
            "(function() {{ var root = {root}; if (!root) return null; \
             var nodes = Array.prototype.slice.call(root.querySelectorAll({sel})); \
             {filter} return nodes[{idx}] || null; }})()",
            root = self.expr,
            sel = sel_json,
            filter = filter_js,
            idx = index,
        ))
    }

    /// Count of matches for a selector (+ optional text filter) under this
    /// node, without indexing — used for `array`/`group_action` fan-out and
    /// the `if` condition's `found`/`not_found` check.
    pub fn count_expr(&self, selector: &str, text_filter: Option<&str>) -> String {
        let sel_json = serde_json::to_string(selector).unwrap_or_else(|_| "\"*\"".into());
        let filter_js = match text_filter {
            Some(t) => {
                let t_json = serde_json::to_string(t).unwrap_or_else(|_| "\"\"".into());
                format!(
                    "nodes = nodes.filter(function(el) {{ return (el.innerText || el.textContent || '').includes({t_json}); }});"
                )
            }
            None => String::new(),
        };
        format!(
            "(function() {{ var root = {root}; if (!root) return 0; \
             var nodes = Array.prototype.slice.call(root.querySelectorAll({sel})); \
             {filter} return nodes.length; }})()",
            root = self.expr,
            sel = sel_json,
            filter = filter_js,
        )
    }
}

/// Translates a `frame` step's routing field into the JS expression used to
/// reach that frame's document from the top-level page context.
pub fn frame_route_js(route: &FrameRoute) -> VirtualNode {
    match route {
        FrameRoute::Selector(sel) => {
            let sel_json = serde_json::to_string(sel).unwrap_or_else(|_| "\"iframe\"".into());
            VirtualNode::new(format!(
                "(function() {{ var f = document.querySelector({sel}); \
                 try {{ return f ? f.contentDocument : null; }} catch (e) {{ return null; }} }})()",
                sel = sel_json,
            ))
        }
        FrameRoute::Name(name) => {
            let name_json = serde_json::to_string(name).unwrap_or_else(|_| "\"\"".into());
            VirtualNode::new(format!(
                "(function() {{ try {{ var w = window.frames[{name}]; return w ? w.document : null; }} \
                 catch (e) {{ return null; }} }})()",
                name = name_json,
            ))
        }
        FrameRoute::Url(needle) => {
            let needle_json = serde_json::to_string(needle).unwrap_or_else(|_| "\"\"".into());
            VirtualNode::new(format!(
                "(function() {{ var needle = {needle}; \
                 for (var i = 0; i < window.frames.length; i++) {{ \
                   try {{ if (window.frames[i].location.href.indexOf(needle) !== -1) return window.frames[i].document; }} \
                   catch (e) {{}} }} return null; }})()",
                needle = needle_json,
            ))
        }
        FrameRoute::Index(idx) => VirtualNode::new(format!(
            "(function() {{ try {{ var w = window.frames[{idx}]; return w ? w.document : null; }} \
             catch (e) {{ return null; }} }})()",
            idx = idx,
        )),
    }
}

/// Where a resolved locator ultimately points, ready for action.
pub enum ResolvedTarget {
    Real(Element),
    Virtual(VirtualNode),
}

/// `get_locator_root`: parent pin wins over frame, which
/// wins over the bare page.
pub enum EffectiveResolvedRoot {
    Page,
    Element(Arc<Element>),
    Virtual(VirtualNode),
}

pub fn effective_root(page_scope: &ScopeTracker<ParentPin>) -> EffectiveResolvedRoot {
    match page_scope.effective_root() {
        EffectiveRoot::Parent(ParentPin::Element(e)) => EffectiveResolvedRoot::Element(e),
        EffectiveRoot::Parent(ParentPin::Virtual(v)) => EffectiveResolvedRoot::Virtual(v),
        EffectiveRoot::Frame(route) => EffectiveResolvedRoot::Virtual(frame_route_js(&route)),
        EffectiveRoot::Page => EffectiveResolvedRoot::Page,
    }
}

/// Resolves `(tag, class, attr, value, text, index)` against the scope's
/// effective root: builds the selector, counts
/// matches, fails with `ElementNotFound`/`IndexOutOfRange` as documented.
/// Does NOT perform the visibility wait or scroll (steps 5-6) — those
/// require a concrete target and are done by the caller via
/// `wait_visible_and_scroll`, since some callers (the `if` condition) only
/// need the count.
pub async fn resolve(
    page: &Page,
    scope: &ScopeTracker<ParentPin>,
    selector: &str,
    text_filter: Option<&str>,
    index: usize,
) -> Result<ResolvedTarget> {
    match effective_root(scope) {
        EffectiveResolvedRoot::Page => {
            let mut matches = page.find_elements(selector).await.unwrap_or_default();
            let matches = filter_by_text(page, matches.drain(..), text_filter).await;
            let count = matches.len();
            if count == 0 {
                return Err(Error::ElementNotFound(selector.to_string()));
            }
            if index >= count {
                return Err(Error::IndexOutOfRange {
                    selector: selector.to_string(),
                    index,
                    count,
                });
            }
            Ok(ResolvedTarget::Real(matches.into_iter().nth(index).unwrap()))
        }
        EffectiveResolvedRoot::Element(parent) => {
            let mut matches = parent.find_elements(selector).await.unwrap_or_default();
            let matches = filter_by_text(page, matches.drain(..), text_filter).await;
            let count = matches.len();
            if count == 0 {
                return Err(Error::ElementNotFound(selector.to_string()));
            }
            if index >= count {
                return Err(Error::IndexOutOfRange {
                    selector: selector.to_string(),
                    index,
                    count,
                });
            }
            Ok(ResolvedTarget::Real(matches.into_iter().nth(index).unwrap()))
        }
        EffectiveResolvedRoot::Virtual(root) => {
            let count = count_matches(page, &root, selector, text_filter).await?;
            if count == 0 {
                return Err(Error::ElementNotFound(selector.to_string()));
            }
            if index >= count {
                return Err(Error::IndexOutOfRange {
                    selector: selector.to_string(),
                    index,
                    count,
                });
            }
            Ok(ResolvedTarget::Virtual(root.child(selector, text_filter, index)))
        }
    }
}

/// Match count only, for the `if` condition's `found`/`not_found` check and
/// for gating `array`/`group_action` iteration.
pub async fn count(
    page: &Page,
    scope: &ScopeTracker<ParentPin>,
    selector: &str,
    text_filter: Option<&str>,
) -> Result<usize> {
    match effective_root(scope) {
        EffectiveResolvedRoot::Page => {
            let matches = page.find_elements(selector).await.unwrap_or_default();
            let n = filter_by_text(page, matches.into_iter(), text_filter).await.len();
            Ok(n)
        }
        EffectiveResolvedRoot::Element(parent) => {
            let matches = parent.find_elements(selector).await.unwrap_or_default();
            let n = filter_by_text(page, matches.into_iter(), text_filter).await.len();
            Ok(n)
        }
        EffectiveResolvedRoot::Virtual(root) => count_matches(page, &root, selector, text_filter).await,
    }
}

async fn count_matches(
    page: &Page,
    root: &VirtualNode,
    selector: &str,
    text_filter: Option<&str>,
) -> Result<usize> {
    let expr = root.count_expr(selector, text_filter);
    let value = page.evaluate_value(&expr).await?;
    Ok(value.as_u64().unwrap_or(0) as usize)
}

async fn filter_by_text(
    _page: &Page,
    elements: impl Iterator<Item = Element>,
    text_filter: Option<&str>,
) -> Vec<Element> {
    let Some(needle) = text_filter else {
        return elements.collect();
    };
    let mut kept = Vec::new();
    for el in elements {
        if let Ok(text) = el.inner_text().await {
            if text.contains(needle) {
                kept.push(el);
            }
        }
    }
    kept
}

/// Steps 5-6 of the resolver: wait for visible state within `timeout`, then
/// scroll into view.
pub async fn wait_visible_and_scroll(
    page: &Page,
    target: &ResolvedTarget,
    timeout: Duration,
) -> Result<()> {
    match target {
        ResolvedTarget::Real(el) => {
            wait_real_visible(el, timeout).await?;
            el.scroll_into_view().await
        }
        ResolvedTarget::Virtual(node) => {
            wait_virtual_visible(page, node, timeout).await?;
            let expr = format!(
                "(function() {{ var el = {node}; if (el) el.scrollIntoView({{block: 'center'}}); return !!el; }})()",
                node = node.expr
            );
            page.evaluate_value(&expr).await?;
            Ok(())
        }
    }
}

async fn wait_real_visible(el: &Element, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    loop {
        let visible = el.is_visible().await.unwrap_or(false);
        if visible {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout("element did not become visible".into()));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

async fn wait_virtual_visible(page: &Page, node: &VirtualNode, timeout: Duration) -> Result<()> {
    let deadline = Instant::now() + timeout;
    let expr = format!(
        "(function() {{ var el = {node}; if (!el) return false; \
         if (typeof el.checkVisibility === 'function') return el.checkVisibility(); \
         return !!(el.offsetParent || el === document.body); }})()",
        node = node.expr
    );
    loop {
        let value = page.evaluate_value(&expr).await?;
        if matches!(value, Value::Bool(true)) {
            return Ok(());
        }
        if Instant::now() >= deadline {
            return Err(Error::Timeout("frame element did not become visible".into()));
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Gets an `href` attribute from a resolved target, for click-link-wait
/// detection and `download_from_link`.
pub async fn get_href(page: &Page, target: &ResolvedTarget) -> Result<Option<String>> {
    match target {
        ResolvedTarget::Real(el) => el.get_attribute("href").await,
        ResolvedTarget::Virtual(node) => {
            let expr = format!(
                "(function() {{ var el = {node}; return el ? el.getAttribute('href') : null; }})()",
                node = node.expr
            );
            let value = page.evaluate_value(&expr).await?;
            Ok(value.as_str().map(|s| s.to_string()))
        }
    }
}

/// Promotes a resolved target into a parent pin for nested iteration.
pub fn pin_parent(target: ResolvedTarget) -> ParentPin {
    match target {
        ResolvedTarget::Real(el) => ParentPin::Element(Arc::new(el)),
        ResolvedTarget::Virtual(node) => ParentPin::Virtual(node),
    }
}
