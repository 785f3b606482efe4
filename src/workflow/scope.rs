//! Pure tracking of "where do the next step's selectors resolve against" —
//! the frame switch set by a `frame`/`main_frame` step, and the parent
//! element pin set by `array`/`group_action` iteration.
//!
//! Deliberately free of any browser type so scope propagation and
//! ignore-locality can be unit tested without a live page.

/// How a `frame` step selected its target frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRoute {
    Selector(String),
    Name(String),
    Url(String),
    Index(usize),
}

/// Where a selector should be resolved, per `get_locator_root`'s priority:
/// an active parent pin wins over an active frame switch, which wins over
/// the bare page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectiveRoot<P> {
    Parent(P),
    Frame(FrameRoute),
    Page,
}

/// Carries the current frame route and parent pin through a sequence of
/// step executions. `P` is the live parent-element handle type at runtime;
/// tests instantiate it with a plain marker (e.g. `u32` or `&str`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeTracker<P> {
    frame: Option<FrameRoute>,
    parent: Option<P>,
}

impl<P> Default for ScopeTracker<P> {
    fn default() -> Self {
        Self {
            frame: None,
            parent: None,
        }
    }
}

impl<P: Clone> ScopeTracker<P> {
    pub fn new() -> Self {
        Self::default()
    }

    /// `frame` step: replaces the current frame route. `main_frame` passes
    /// `None` to reset to the page. A `refresh` step does NOT call this —
    /// the frame route survives a refresh.
    pub fn with_frame(&self, route: Option<FrameRoute>) -> Self {
        Self {
            frame: route,
            parent: self.parent.clone(),
        }
    }

    /// `array`/`group_action` iteration: pins a parent element for the
    /// duration of the nested actions.
    pub fn with_parent(&self, parent: Option<P>) -> Self {
        Self {
            frame: self.frame.clone(),
            parent,
        }
    }

    /// `group_action`'s per-action `global: true` override, or its
    /// top-level `global_actions: true`: drop the parent pin but keep
    /// whatever frame is active.
    pub fn without_parent(&self) -> Self {
        self.with_parent(None)
    }

    pub fn frame(&self) -> Option<&FrameRoute> {
        self.frame.as_ref()
    }

    pub fn parent(&self) -> Option<&P> {
        self.parent.as_ref()
    }

    /// `get_locator_root` priority: parent, then frame, then page.
    pub fn effective_root(&self) -> EffectiveRoot<P> {
        if let Some(p) = &self.parent {
            EffectiveRoot::Parent(p.clone())
        } else if let Some(f) = &self.frame {
            EffectiveRoot::Frame(f.clone())
        } else {
            EffectiveRoot::Page
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestScope = ScopeTracker<&'static str>;

    #[test]
    fn fresh_scope_resolves_to_page() {
        let scope = TestScope::new();
        assert_eq!(scope.effective_root(), EffectiveRoot::Page);
    }

    #[test]
    fn frame_switch_is_visible_until_reset() {
        let scope = TestScope::new().with_frame(Some(FrameRoute::Name("iframe1".into())));
        assert_eq!(
            scope.effective_root(),
            EffectiveRoot::Frame(FrameRoute::Name("iframe1".into()))
        );
    }

    #[test]
    fn main_frame_resets_to_page() {
        let scope = TestScope::new()
            .with_frame(Some(FrameRoute::Index(0)))
            .with_frame(None);
        assert_eq!(scope.effective_root(), EffectiveRoot::Page);
    }

    #[test]
    fn parent_pin_wins_over_frame() {
        let scope = TestScope::new()
            .with_frame(Some(FrameRoute::Index(0)))
            .with_parent(Some("row-3"));
        assert_eq!(scope.effective_root(), EffectiveRoot::Parent("row-3"));
    }

    #[test]
    fn dropping_parent_falls_back_to_frame() {
        let scope = TestScope::new()
            .with_frame(Some(FrameRoute::Selector("#f".into())))
            .with_parent(Some("row-1"))
            .without_parent();
        assert_eq!(
            scope.effective_root(),
            EffectiveRoot::Frame(FrameRoute::Selector("#f".into()))
        );
    }

    #[test]
    fn nested_parent_pin_shadows_outer_one() {
        let outer = TestScope::new().with_parent(Some("outer"));
        let inner = outer.with_parent(Some("inner"));
        assert_eq!(inner.effective_root(), EffectiveRoot::Parent("inner"));
        // outer scope is untouched — ScopeTracker is immutable/clone-based.
        assert_eq!(outer.effective_root(), EffectiveRoot::Parent("outer"));
    }
}
