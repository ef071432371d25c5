use crate::error::MulticolError;
use crate::fragment::{inner_html, next_in_document_order, parent_chain, parse_fragment};
use kuchiki::NodeRef;

/// Marks the element a reading session starts from.
pub const START_ELEMENT_ATTR: &str = "data-multicol-start-element";

/// Outcome of one scope step. `terminal` means the walker hit the end of the
/// ancestor chain and stayed put.
pub struct WalkResult {
    pub terminal: bool,
    pub element: NodeRef,
}

/// Reading-scope selector over the ancestor chain of a start element.
///
/// The chain runs from the start element (index 0) up to the outermost
/// element below the fragment root. `widen` climbs one ancestor, `narrow`
/// descends back; both clamp at the chain ends. The selected element's inner
/// HTML is what gets handed to the paginator.
pub struct ScopeWalker {
    // holds the fragment alive: kuchiki parent links are weak
    _root: NodeRef,
    chain: Vec<NodeRef>,
    index: usize,
}

impl ScopeWalker {
    /// Parses the fragment and anchors on the element carrying
    /// [`START_ELEMENT_ATTR`].
    pub fn from_html(html: &str) -> Result<Self, MulticolError> {
        let root = parse_fragment(html)?;
        let start = find_start_element(&root).ok_or_else(|| {
            MulticolError::MalformedInput(format!("no element carries {START_ELEMENT_ATTR}"))
        })?;
        Self::new(root, start)
    }

    pub fn new(root: NodeRef, start: NodeRef) -> Result<Self, MulticolError> {
        if start.as_element().is_none() {
            return Err(MulticolError::MalformedInput(
                "scope start must be an element".to_string(),
            ));
        }
        if !start.ancestors().any(|ancestor| ancestor == root) {
            return Err(MulticolError::MalformedInput(
                "scope start is not inside the fragment".to_string(),
            ));
        }
        let mut chain = vec![start.clone()];
        let mut ancestors = parent_chain(&start, &root);
        ancestors.reverse();
        chain.extend(ancestors);
        Ok(Self {
            _root: root,
            chain,
            index: 0,
        })
    }

    pub fn current(&self) -> &NodeRef {
        &self.chain[self.index]
    }

    /// Number of selectable scopes.
    pub fn depth(&self) -> usize {
        self.chain.len()
    }

    /// Inner HTML of the current scope, ready for pagination.
    pub fn html(&self) -> String {
        inner_html(self.current())
    }

    /// Climbs to the next enclosing element.
    pub fn widen(&mut self) -> WalkResult {
        self.step(1)
    }

    /// Descends back toward the start element.
    pub fn narrow(&mut self) -> WalkResult {
        self.step(-1)
    }

    fn step(&mut self, direction: i64) -> WalkResult {
        let next = self.index as i64 + direction;
        if next >= 0 && (next as usize) < self.chain.len() {
            self.index = next as usize;
            WalkResult {
                terminal: false,
                element: self.current().clone(),
            }
        } else {
            WalkResult {
                terminal: true,
                element: self.current().clone(),
            }
        }
    }
}

fn find_start_element(root: &NodeRef) -> Option<NodeRef> {
    let mut cursor = root.first_child();
    while let Some(node) = cursor {
        if let Some(el) = node.as_element() {
            if el.attributes.borrow().contains(START_ELEMENT_ATTR) {
                return Some(node);
            }
        }
        cursor = next_in_document_order(&node, root);
    }
    None
}
