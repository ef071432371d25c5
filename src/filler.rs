use crate::boundary;
use crate::debug::DebugLogger;
use crate::error::MulticolError;
use crate::fragment::{
    inner_html, is_blank_text, new_element, next_in_document_order, parse_fragment, shallow_clone,
};
use crate::metrics::FitChecker;
use crate::reopen::left_over_html;
use crate::types::FillState;
use kuchiki::NodeRef;
use std::collections::HashMap;
use std::rc::Rc;

fn node_key(node: &NodeRef) -> usize {
    Rc::as_ptr(&node.0) as usize
}

/// Bidirectional source<->mirror correspondence table.
///
/// Keyed by node identity rather than weak references: the food tree owns
/// source nodes, the mirror owns its clones, and entries are added/removed
/// in lockstep with mirror mutations so neither side outlives its key.
pub(crate) struct NodeMap {
    to_mirror: HashMap<usize, NodeRef>,
    to_source: HashMap<usize, NodeRef>,
}

impl NodeMap {
    fn new() -> Self {
        Self {
            to_mirror: HashMap::new(),
            to_source: HashMap::new(),
        }
    }

    fn reset(&mut self, source_root: &NodeRef, mirror_root: &NodeRef) {
        self.to_mirror.clear();
        self.to_source.clear();
        self.bind(source_root, mirror_root);
    }

    fn bind(&mut self, source: &NodeRef, mirror: &NodeRef) {
        self.to_mirror.insert(node_key(source), mirror.clone());
        self.to_source.insert(node_key(mirror), source.clone());
    }

    fn unbind(&mut self, source: &NodeRef, mirror: &NodeRef) {
        self.to_mirror.remove(&node_key(source));
        self.to_source.remove(&node_key(mirror));
    }

    fn mirror_of(&self, source: &NodeRef) -> Option<NodeRef> {
        self.to_mirror.get(&node_key(source)).cloned()
    }

    pub(crate) fn source_of(&self, mirror: &NodeRef) -> Option<NodeRef> {
        self.to_source.get(&node_key(mirror)).cloned()
    }

    pub(crate) fn len(&self) -> usize {
        self.to_mirror.len()
    }

    pub(crate) fn is_balanced(&self) -> bool {
        self.to_mirror.len() == self.to_source.len()
    }
}

/// Per-page chunk builder. Walks the source fragment in document order,
/// mirrors nodes into a measured clone tree, and stops at the exact node (or
/// character) where the mirror overflows.
///
/// The traversal position is an explicit cursor so a suspended fill can be
/// resumed by `nibble` after the measurement surface changes.
pub struct PageFiller {
    page_index: usize,
    food_root: NodeRef,
    mirror_root: NodeRef,
    map: NodeMap,
    cursor: Option<NodeRef>,
    terminal: Option<NodeRef>,
    placed_leaf: bool,
    checker: Option<Rc<dyn FitChecker>>,
    debug: Option<DebugLogger>,
}

impl PageFiller {
    pub fn new(page_index: usize) -> Self {
        let food_root = new_element("div");
        let mirror_root = new_element("div");
        let mut map = NodeMap::new();
        map.reset(&food_root, &mirror_root);
        Self {
            page_index,
            food_root,
            mirror_root,
            map,
            cursor: None,
            terminal: None,
            placed_leaf: false,
            checker: None,
            debug: None,
        }
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    /// Connects the filler to its measurement surface. Until this is called
    /// every fill or measurement attempt fails with NotAttached.
    pub fn attach(&mut self, checker: Rc<dyn FitChecker>) {
        self.checker = Some(checker);
    }

    pub fn is_attached(&self) -> bool {
        self.checker.is_some()
    }

    pub(crate) fn set_debug(&mut self, logger: DebugLogger) {
        self.debug = Some(logger);
    }

    pub fn fill_state(&self) -> Result<FillState, MulticolError> {
        let checker = self.checker.as_ref().ok_or(MulticolError::NotAttached)?;
        Ok(checker.fill_state(&self.mirror_root))
    }

    /// The last source node fully included in the page, or the fitting half
    /// of a split text node.
    pub(crate) fn terminal(&self) -> Option<NodeRef> {
        self.terminal.clone()
    }

    /// True once the traversal has consumed the entire source fragment.
    pub fn is_spent(&self) -> bool {
        self.cursor.is_none()
    }

    /// Serialized HTML of everything the page accepted so far.
    pub fn content_html(&self) -> String {
        inner_html(&self.mirror_root)
    }

    /// Replaces the source content and fills until overflow or exhaustion.
    ///
    /// `Ok(None)` when everything was consumed (or the filler was already
    /// Full, in which case nothing happens); `Ok(Some(html))` is the
    /// tag-reopened remainder for the next page.
    pub fn eat(&mut self, html: &str) -> Result<Option<String>, MulticolError> {
        if self.fill_state()? != FillState::Hungry {
            return Ok(None);
        }
        self.food_root = parse_fragment(html)?;
        self.map.reset(&self.food_root, &self.mirror_root);
        self.terminal = None;
        self.cursor = self.food_root.first_child();
        self.run()
    }

    /// Resumes a suspended fill, e.g. after the viewport grew. Same return
    /// contract as `eat`; `Ok(None)` without effect while Full or spent.
    pub fn nibble(&mut self) -> Result<Option<String>, MulticolError> {
        if self.fill_state()? != FillState::Hungry {
            return Ok(None);
        }
        if self.cursor.is_none() {
            return Ok(None);
        }
        self.run()
    }

    fn run(&mut self) -> Result<Option<String>, MulticolError> {
        let checker = self.checker.clone().ok_or(MulticolError::NotAttached)?;
        let mirror_root = self.mirror_root.clone();

        while let Some(node) = self.cursor.clone() {
            if node.as_element().is_none() && !is_text(&node) {
                // comments and other non-content nodes are never mirrored
                self.cursor = next_in_document_order(&node, &self.food_root);
                continue;
            }
            if is_blank_text(&node) {
                self.cursor = next_in_document_order(&node, &self.food_root);
                continue;
            }

            let clone = match shallow_clone(&node) {
                Some(clone) => clone,
                None => {
                    self.cursor = next_in_document_order(&node, &self.food_root);
                    continue;
                }
            };
            let mirror_parent = self.mirror_parent_of(&node)?;
            mirror_parent.append(clone.clone());
            self.map.bind(&node, &clone);

            let state = checker.fill_state(&mirror_root);
            if node.as_element().is_some() {
                match state {
                    FillState::Hungry => self.accept(&node, false),
                    FillState::Full => {
                        clone.detach();
                        self.map.unbind(&node, &clone);
                        self.count("nodes.rolled_back", 1);
                        if self.placed_leaf {
                            // resume retries this node
                            self.cursor = Some(node.clone());
                            return Ok(Some(self.emit_left_over(&node)));
                        }
                        // overfull element on an empty page: place it anyway
                        // so pagination keeps moving forward
                        mirror_parent.append(clone.clone());
                        self.map.bind(&node, &clone);
                        self.accept(&node, node.first_child().is_none());
                    }
                }
            } else {
                match state {
                    FillState::Hungry => self.accept(&node, true),
                    FillState::Full => {
                        let min_keep = if self.placed_leaf { 0 } else { 1 };
                        let split = boundary::find_and_split(
                            &node,
                            &clone,
                            || checker.fill_state(&mirror_root),
                            min_keep,
                        )?;
                        self.count("boundary.splits", 1);
                        self.map.unbind(&node, &clone);
                        self.map.bind(&split.fitting, &clone);
                        self.terminal = Some(split.fitting.clone());
                        if split.kept > 0 {
                            self.placed_leaf = true;
                        }
                        self.cursor = Some(split.remainder.clone());
                        return Ok(Some(self.emit_left_over(&split.remainder)));
                    }
                }
            }
        }
        Ok(None)
    }

    fn accept(&mut self, node: &NodeRef, leaf: bool) {
        self.terminal = Some(node.clone());
        if leaf {
            self.placed_leaf = true;
        }
        self.cursor = next_in_document_order(node, &self.food_root);
        self.count("nodes.placed", 1);
    }

    fn emit_left_over(&self, resume: &NodeRef) -> String {
        if let Some(debug) = &self.debug {
            debug.log_event(
                "page.full",
                &[("page", self.page_index.to_string())],
            );
        }
        left_over_html(&self.food_root, resume)
    }

    fn mirror_parent_of(&self, node: &NodeRef) -> Result<NodeRef, MulticolError> {
        let parent = node.parent().ok_or_else(|| {
            MulticolError::InvalidConfiguration("cursor node has no parent".to_string())
        })?;
        self.map.mirror_of(&parent).ok_or_else(|| {
            MulticolError::InvalidConfiguration("source parent has no mirror clone".to_string())
        })
    }

    fn count(&self, key: &str, amount: u64) {
        if let Some(debug) = &self.debug {
            debug.increment(key, amount);
        }
    }

    #[cfg(test)]
    pub(crate) fn map(&self) -> &NodeMap {
        &self.map
    }

    #[cfg(test)]
    pub(crate) fn mirror_root(&self) -> &NodeRef {
        &self.mirror_root
    }
}

fn is_text(node: &NodeRef) -> bool {
    node.as_text().is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ColumnGrid;

    fn attached(page: usize, chars_per_line: u64, lines: u64) -> PageFiller {
        let mut filler = PageFiller::new(page);
        filler.attach(Rc::new(
            ColumnGrid::from_grid(1, chars_per_line, lines).expect("grid"),
        ));
        filler
    }

    #[test]
    fn eat_requires_an_attached_surface() {
        let mut filler = PageFiller::new(0);
        let err = filler.eat("<p>x</p>");
        assert!(matches!(err, Err(MulticolError::NotAttached)));
        assert!(!filler.is_attached());
    }

    #[test]
    fn eat_consumes_fitting_content_entirely() {
        let mut filler = attached(0, 50, 10);
        let leftover = filler.eat("<p>small</p>").expect("eat");
        assert!(leftover.is_none());
        assert!(filler.is_spent());
        assert_eq!(filler.content_html(), "<p>small</p>");
        assert_eq!(filler.fill_state().expect("state"), FillState::Hungry);
    }

    #[test]
    fn overflowing_text_is_split_at_the_character_boundary() {
        let mut filler = attached(0, 50, 10);
        let long = "A".repeat(600);
        let leftover = filler
            .eat(&format!("<p>{long}</p>"))
            .expect("eat")
            .expect("leftover");

        let kept = "A".repeat(500);
        let rest = "A".repeat(100);
        assert_eq!(filler.content_html(), format!("<p>{kept}</p>"));
        assert_eq!(leftover, format!("<p>{rest}</p>"));
        assert!(!filler.is_spent());
        assert_eq!(filler.fill_state().expect("state"), FillState::Hungry);
    }

    #[test]
    fn overflowing_element_rolls_back_and_reopens_ancestors() {
        let mut filler = attached(0, 10, 1);
        // the paragraph fills the single line; the hr cannot be placed
        let leftover = filler
            .eat("<div><p>one line</p><hr><p>x</p></div>")
            .expect("eat")
            .expect("leftover");
        assert_eq!(leftover, "<div><hr><p>x</p></div>");
        assert_eq!(filler.content_html(), "<div><p>one line</p></div>");
        assert!(!filler.is_spent());
    }

    #[test]
    fn sibling_paragraph_split_leaves_reopened_context() {
        let mut filler = attached(0, 10, 2);
        let leftover = filler
            .eat("<div><p>aaaaaaaaaa bbbbbbbbbb</p><p>next</p></div>")
            .expect("eat")
            .expect("leftover");
        assert_eq!(leftover, "<div><p>next</p></div>");
        // the second paragraph opened on this page but none of its text fit
        assert_eq!(
            filler.content_html(),
            "<div><p>aaaaaaaaaa bbbbbbbbbb</p><p></p></div>"
        );
    }

    #[test]
    fn full_filler_refuses_to_eat_without_effect() {
        let mut filler = attached(0, 50, 10);
        assert!(filler.eat("<p>steady content</p>").expect("eat").is_none());
        let before = filler.content_html();
        // the viewport shrank underneath the page
        filler.attach(Rc::new(ColumnGrid::from_grid(1, 5, 0).expect("grid")));
        assert_eq!(filler.fill_state().expect("state"), FillState::Full);
        assert!(filler.eat("<p>more</p>").expect("eat").is_none());
        assert!(filler.nibble().expect("nibble").is_none());
        assert_eq!(filler.content_html(), before);
    }

    #[test]
    fn nibble_resumes_after_the_surface_grows() {
        let mut filler = attached(0, 10, 1);
        let leftover = filler
            .eat("<p>aaaaaaaaaa bbbbbbbbbb</p>")
            .expect("eat")
            .expect("leftover");
        assert_eq!(leftover, "<p>bbbbbbbbbb</p>");

        filler.attach(Rc::new(ColumnGrid::from_grid(1, 10, 10).expect("grid")));
        let rest = filler.nibble().expect("nibble");
        assert!(rest.is_none());
        assert!(filler.is_spent());
        assert_eq!(filler.content_html(), "<p>aaaaaaaaaa bbbbbbbbbb</p>");
    }

    #[test]
    fn nibble_is_a_no_op_when_spent() {
        let mut filler = attached(0, 50, 10);
        assert!(filler.eat("<p>done</p>").expect("eat").is_none());
        assert!(filler.nibble().expect("nibble").is_none());
    }

    #[test]
    fn blank_text_is_never_mirrored() {
        let mut filler = attached(0, 50, 10);
        let leftover = filler.eat("<p>a</p>\n   <p>b</p>").expect("eat");
        assert!(leftover.is_none());
        assert_eq!(filler.content_html(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn comments_are_skipped() {
        let mut filler = attached(0, 50, 10);
        let leftover = filler.eat("<p>a</p><!-- note --><p>b</p>").expect("eat");
        assert!(leftover.is_none());
        assert_eq!(filler.content_html(), "<p>a</p><p>b</p>");
    }

    #[test]
    fn correspondence_map_stays_balanced() {
        let mut filler = attached(0, 10, 2);
        let _ = filler
            .eat("<div><p>aaaaaaaaaa bbbbbbbbbb</p><p>next</p></div>")
            .expect("eat");
        assert!(filler.map().is_balanced());
        // roots, div, both paragraphs, the first text, the fitting half
        assert_eq!(filler.map().len(), 6);
        // every mirrored node resolves back to a live source node
        let mirror_p = filler
            .mirror_root()
            .first_child()
            .and_then(|div| div.first_child())
            .expect("p clone");
        let source = filler.map().source_of(&mirror_p).expect("source");
        assert_eq!(crate::fragment::tag_name(&source).as_deref(), Some("p"));
    }

    #[test]
    fn zero_capacity_viewport_still_makes_progress() {
        let mut filler = attached(0, 5, 0);
        let leftover = filler
            .eat("<p>abcdef</p>")
            .expect("eat")
            .expect("leftover");
        assert_eq!(filler.content_html(), "<p>a</p>");
        assert_eq!(leftover, "<p>bcdef</p>");
    }

    #[test]
    fn terminal_tracks_the_last_included_node() {
        let mut filler = attached(0, 50, 10);
        let _ = filler.eat("<p>alpha</p>").expect("eat");
        let terminal = filler.terminal().expect("terminal");
        assert_eq!(terminal.text_contents(), "alpha");
    }
}
