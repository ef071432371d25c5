use crate::error::MulticolError;
use html5ever::{LocalName, Namespace, QualName};
use kuchiki::traits::TendrilSink;
use kuchiki::{Attribute, ExpandedName, NodeRef};
use std::collections::BTreeMap;

const HTML_NS: &str = "http://www.w3.org/1999/xhtml";

/// Tags that establish a line/flow boundary. Mirrors the classic CSS block
/// display list; `br` is kept separate because it breaks without nesting.
const BLOCK_ELEMENTS: &[&str] = &[
    "address",
    "article",
    "aside",
    "blockquote",
    "body",
    "caption",
    "center",
    "col",
    "colgroup",
    "dd",
    "dir",
    "div",
    "dl",
    "dt",
    "fieldset",
    "figcaption",
    "figure",
    "footer",
    "form",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "header",
    "hr",
    "legend",
    "li",
    "main",
    "menu",
    "nav",
    "ol",
    "p",
    "pre",
    "section",
    "table",
    "tbody",
    "td",
    "tfoot",
    "th",
    "thead",
    "tr",
    "ul",
];

pub(crate) fn is_block_tag(tag: &str) -> bool {
    BLOCK_ELEMENTS.contains(&tag)
}

pub(crate) fn new_element(tag: &str) -> NodeRef {
    NodeRef::new_element(
        QualName::new(None, Namespace::from(HTML_NS), LocalName::from(tag)),
        BTreeMap::<ExpandedName, Attribute>::new(),
    )
}

/// Replaces `node` with a same-attribute element of a different tag, moving
/// the children over. No-op for non-element nodes.
pub(crate) fn retag(node: &NodeRef, tag: &str) -> Option<NodeRef> {
    let el = node.as_element()?;
    let fresh = NodeRef::new_element(
        QualName::new(None, Namespace::from(HTML_NS), LocalName::from(tag)),
        el.attributes.borrow().map.clone(),
    );
    while let Some(child) = node.first_child() {
        fresh.append(child);
    }
    node.insert_before(fresh.clone());
    node.detach();
    Some(fresh)
}

/// Lowercase local tag name, or None for non-element nodes.
pub(crate) fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element()
        .map(|el| el.name.local.as_ref().to_ascii_lowercase())
}

/// Parses an HTML fragment string (no single root required) into a detached
/// `<div>` holding the fragment's top-level nodes.
///
/// html5ever is forgiving, so a parse that yields no usable tree only happens
/// for structurally unusable input; that surfaces as MalformedInput.
pub(crate) fn parse_fragment(html: &str) -> Result<NodeRef, MulticolError> {
    let document = kuchiki::parse_html().one(html);
    let body = document
        .select_first("body")
        .map_err(|()| MulticolError::MalformedInput("fragment produced no body".to_string()))?;
    let root = new_element("div");
    let children: Vec<NodeRef> = body.as_node().children().collect();
    for child in children {
        root.append(child);
    }
    Ok(root)
}

/// Serialized HTML of the node's children, excluding the node's own tag.
pub(crate) fn inner_html(node: &NodeRef) -> String {
    let mut out = String::new();
    for child in node.children() {
        out.push_str(&child.to_string());
    }
    out
}

/// Shallow clone: same tag and attributes (or same text), no children.
/// Returns None for node kinds the filler never mirrors (comments, doctypes).
pub(crate) fn shallow_clone(node: &NodeRef) -> Option<NodeRef> {
    if let Some(el) = node.as_element() {
        return Some(NodeRef::new_element(
            el.name.clone(),
            el.attributes.borrow().map.clone(),
        ));
    }
    if let Some(text) = node.as_text() {
        return Some(NodeRef::new_text(text.borrow().clone()));
    }
    None
}

pub(crate) fn is_blank_text(node: &NodeRef) -> bool {
    match node.as_text() {
        Some(text) => text.borrow().trim().is_empty(),
        None => false,
    }
}

/// Depth-first pre-order successor within the subtree rooted at `root`.
pub(crate) fn next_in_document_order(node: &NodeRef, root: &NodeRef) -> Option<NodeRef> {
    if let Some(child) = node.first_child() {
        return Some(child);
    }
    let mut current = node.clone();
    loop {
        if current == *root {
            return None;
        }
        if let Some(sibling) = current.next_sibling() {
            return Some(sibling);
        }
        current = current.parent()?;
    }
}

/// Proper element ancestors of `node` below `root`, outermost first.
pub(crate) fn parent_chain(node: &NodeRef, root: &NodeRef) -> Vec<NodeRef> {
    let mut chain: Vec<NodeRef> = node
        .ancestors()
        .take_while(|ancestor| ancestor != root)
        .filter(|ancestor| ancestor.as_element().is_some())
        .collect();
    chain.reverse();
    chain
}
