use crate::error::MulticolError;
use crate::fragment::{
    inner_html, is_blank_text, is_block_tag, new_element, parse_fragment, retag, tag_name,
};
use kuchiki::NodeRef;

/// Attributes that survive stripping; everything else except `data-*` goes.
const ATTRIBUTES_TO_KEEP: &[&str] = &["href", "alt", "title", "lang", "src", "name"];

/// Structural elements that carry no content of their own.
const WRAPPERS: &[&str] = &["div", "span", "section", "article", "aside"];

/// Subtrees removed wholesale.
const NODES_TO_REMOVE: &[&str] = &["script", "style", "meta", "link", "head"];

/// Subtrees left untouched by every pass, descendants and attributes included.
const PRESERVED_SUBTREES: &[&str] = &["svg"];

const TINY_TEXT_LENGTH: usize = 20;

fn is_preserved_subtree(tag: &str) -> bool {
    PRESERVED_SUBTREES.contains(&tag)
}

fn keep_attribute(name: &str) -> bool {
    ATTRIBUTES_TO_KEEP.contains(&name) || name.starts_with("data-")
}

fn is_wrapper_tag(tag: &str) -> bool {
    WRAPPERS.contains(&tag)
}

/// What the passes threw away, by node name and attribute name.
#[derive(Debug, Default)]
pub struct SanitizeReport {
    pub removed_nodes: Vec<String>,
    pub removed_attributes: Vec<String>,
}

/// Reduces arbitrary page HTML to bare flowable content before pagination.
///
/// Four passes, meant to run in order: `remove_nodes` drops non-content
/// subtrees, `remove_attributes` strips presentation attributes,
/// `collapse_wrappers` flattens structural nesting and substitutes media
/// elements with placeholder links, `process_breaks` normalizes `<br>` runs
/// into paragraph boundaries. `strip` runs all four.
pub struct Sanitizer {
    root: NodeRef,
    report: SanitizeReport,
}

impl Sanitizer {
    pub fn from_html(html: &str) -> Result<Self, MulticolError> {
        Ok(Self::from_node(parse_fragment(html)?))
    }

    pub fn from_node(root: NodeRef) -> Self {
        Self {
            root,
            report: SanitizeReport::default(),
        }
    }

    pub fn strip(&mut self) {
        self.remove_nodes();
        self.remove_attributes();
        self.collapse_wrappers();
        self.process_breaks();
    }

    pub fn to_html(&self) -> String {
        inner_html(&self.root)
    }

    pub fn into_node(self) -> NodeRef {
        self.root
    }

    pub fn report(&self) -> &SanitizeReport {
        &self.report
    }

    /// Removes scripts, styles, metadata elements, comments and blank
    /// formatting text, subtrees included.
    pub fn remove_nodes(&mut self) {
        let mut doomed = Vec::new();
        collect_removable(&self.root, &mut doomed);
        for node in doomed {
            self.report.removed_nodes.push(node_label(&node));
            node.detach();
        }
    }

    /// Strips every attribute outside the keep list; `data-*` always stays.
    pub fn remove_attributes(&mut self) {
        let root = self.root.clone();
        self.strip_attributes(&root);
    }

    fn strip_attributes(&mut self, node: &NodeRef) {
        if let Some(tag) = tag_name(node) {
            if is_preserved_subtree(&tag) {
                return;
            }
        }
        if let Some(el) = node.as_element() {
            let mut attrs = el.attributes.borrow_mut();
            for name in attrs.map.keys() {
                if !keep_attribute(name.local.as_ref()) {
                    self.report
                        .removed_attributes
                        .push(name.local.as_ref().to_string());
                }
            }
            attrs.map.retain(|name, _| keep_attribute(name.local.as_ref()));
        }
        for child in node.children() {
            self.strip_attributes(&child);
        }
    }

    /// Bottom-up wrapper flattening: empty wrappers go, a wrapper around a
    /// single element is replaced by it, and a wrapper holding only other
    /// wrappers is unwrapped. Media elements are substituted with links on
    /// the way.
    pub fn collapse_wrappers(&mut self) {
        let root = self.root.clone();
        self.collapse_in(&root);
    }

    fn collapse_in(&mut self, parent: &NodeRef) {
        if let Some(tag) = tag_name(parent) {
            if is_preserved_subtree(&tag) {
                return;
            }
        }
        let children: Vec<NodeRef> = parent.children().collect();
        for node in children {
            let Some(tag) = tag_name(&node) else {
                continue;
            };
            self.collapse_in(&node);
            match tag.as_str() {
                "img" => {
                    self.substitute_image(&node);
                    continue;
                }
                "iframe" => {
                    self.substitute_iframe(&node);
                    continue;
                }
                "video" => {
                    self.substitute_video(&node);
                    continue;
                }
                _ => {}
            }
            if !is_wrapper_tag(&tag) {
                continue;
            }
            let count = node.children().count();
            if count == 0 {
                self.report.removed_nodes.push(tag);
                node.detach();
            } else if count == 1 {
                let only = node.first_child();
                if let Some(only) = only {
                    if only.as_element().is_some() {
                        node.insert_before(only);
                        node.detach();
                        self.report.removed_nodes.push(tag);
                    }
                }
            } else {
                let wrappers_only = node.children().all(|child| {
                    if is_blank_text(&child) {
                        return true;
                    }
                    match tag_name(&child) {
                        Some(t) => is_wrapper_tag(&t),
                        None => false,
                    }
                });
                if wrappers_only {
                    unwrap(&node);
                    self.report.removed_nodes.push(tag);
                }
            }
        }
    }

    /// Collapses `<br>` runs to a single break, deletes lone breaks, then
    /// turns each surviving break into a paragraph boundary by moving the
    /// inline runs around it into `<p>` elements. A `<p>` parent is retagged
    /// to `<div>` first since it cannot nest paragraphs.
    pub fn process_breaks(&mut self) {
        let breaks = collect_by_tag(&self.root, "br");
        let mut doomed = Vec::new();
        for br in &breaks {
            let prev_is_br = prev_content_sibling(br)
                .and_then(|n| tag_name(&n))
                .is_some_and(|t| t == "br");
            if prev_is_br {
                continue;
            }
            let mut run = vec![br.clone()];
            let mut next = next_content_sibling(br);
            while let Some(node) = next {
                if tag_name(&node).as_deref() != Some("br") {
                    break;
                }
                next = next_content_sibling(&node);
                run.push(node);
            }
            if run.len() >= 2 {
                doomed.extend(run.into_iter().skip(1));
            } else {
                doomed.push(run.remove(0));
            }
        }
        for br in doomed {
            self.report.removed_nodes.push("br".to_string());
            br.detach();
        }

        for br in collect_by_tag(&self.root, "br") {
            self.split_break(&br);
        }
    }

    fn split_break(&mut self, br: &NodeRef) {
        let Some(parent) = br.parent() else {
            return;
        };

        let mut befores = Vec::new();
        let mut cursor = prev_content_sibling(br);
        while let Some(node) = cursor {
            if is_flow_boundary(&node) {
                break;
            }
            cursor = prev_content_sibling(&node);
            befores.push(node);
        }
        befores.reverse();

        let mut afters = Vec::new();
        let mut cursor = next_content_sibling(br);
        while let Some(node) = cursor {
            if is_flow_boundary(&node) {
                break;
            }
            cursor = next_content_sibling(&node);
            afters.push(node);
        }

        if tag_name(&parent).as_deref() == Some("p") {
            retag(&parent, "div");
        }

        if !befores.is_empty() {
            let before_p = new_element("p");
            for node in befores {
                before_p.append(node);
            }
            br.insert_before(before_p);
        }
        if !afters.is_empty() {
            let after_p = new_element("p");
            for node in afters {
                after_p.append(node);
            }
            br.insert_before(after_p);
        }
        self.report.removed_nodes.push("br".to_string());
        br.detach();
    }

    fn substitute_image(&mut self, img: &NodeRef) {
        let Some(el) = img.as_element() else {
            return;
        };
        let (src, alt, width, height) = {
            let attrs = el.attributes.borrow();
            (
                attrs.get("src").map(String::from),
                attrs.get("alt").map(String::from),
                parse_dimension(attrs.get("width")),
                parse_dimension(attrs.get("height")),
            )
        };
        let Some(src) = src.filter(|s| !s.is_empty()) else {
            return;
        };
        let text = alt.filter(|a| !a.is_empty()).unwrap_or_else(|| src.clone());
        let link = tiny_link(&text, &src, "img");
        if let Some(link_el) = link.as_element() {
            let mut attrs = link_el.attributes.borrow_mut();
            if let Some(width) = width {
                attrs.insert("data-width", width.to_string());
            }
            if let Some(height) = height {
                attrs.insert("data-height", height.to_string());
            }
        }
        img.insert_before(link);
        img.detach();
        self.report.removed_nodes.push("img".to_string());
    }

    fn substitute_iframe(&mut self, iframe: &NodeRef) {
        let Some(el) = iframe.as_element() else {
            return;
        };
        let (src, title) = {
            let attrs = el.attributes.borrow();
            (
                attrs.get("src").map(String::from),
                attrs.get("title").map(String::from),
            )
        };
        let Some(src) = src.filter(|s| !s.is_empty()) else {
            return;
        };
        let text = title.filter(|t| !t.is_empty()).unwrap_or_else(|| src.clone());
        let link = tiny_link(&text, &src, "iframe");
        iframe.insert_before(link);
        iframe.detach();
        self.report.removed_nodes.push("iframe".to_string());
    }

    fn substitute_video(&mut self, video: &NodeRef) {
        let Some(el) = video.as_element() else {
            return;
        };
        let (src, title, poster) = {
            let attrs = el.attributes.borrow();
            (
                attrs.get("src").map(String::from),
                attrs.get("title").map(String::from),
                attrs.get("poster").map(String::from),
            )
        };
        let Some(src) = src.filter(|s| !s.is_empty()) else {
            return;
        };
        let text = title.filter(|t| !t.is_empty()).unwrap_or_else(|| src.clone());
        let link = tiny_link(&text, &src, "video");
        if let Some(poster) = poster.filter(|p| !p.is_empty()) {
            if let Some(link_el) = link.as_element() {
                link_el.attributes.borrow_mut().insert("data-poster", poster);
            }
        }
        video.insert_before(link);
        video.detach();
        self.report.removed_nodes.push("video".to_string());
    }
}

// zero and unparsable dimensions are treated as absent
fn parse_dimension(value: Option<&str>) -> Option<u64> {
    value.and_then(|v| v.trim().parse().ok()).filter(|&n| n > 0)
}

fn node_label(node: &NodeRef) -> String {
    if let Some(tag) = tag_name(node) {
        return tag;
    }
    if node.as_comment().is_some() {
        return "#comment".to_string();
    }
    "#text".to_string()
}

fn collect_removable(node: &NodeRef, doomed: &mut Vec<NodeRef>) {
    if let Some(tag) = tag_name(node) {
        if is_preserved_subtree(&tag) {
            return;
        }
        if NODES_TO_REMOVE.contains(&tag.as_str()) {
            doomed.push(node.clone());
            return;
        }
    }
    if node.as_comment().is_some() || is_blank_text(node) {
        doomed.push(node.clone());
        return;
    }
    for child in node.children() {
        collect_removable(&child, doomed);
    }
}

fn collect_by_tag(root: &NodeRef, tag: &str) -> Vec<NodeRef> {
    let mut found = Vec::new();
    let mut cursor = root.first_child();
    while let Some(node) = cursor {
        if tag_name(&node).as_deref() == Some(tag) {
            found.push(node.clone());
        }
        cursor = crate::fragment::next_in_document_order(&node, root);
    }
    found
}

fn prev_content_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut current = node.previous_sibling();
    while let Some(sibling) = current {
        if !is_blank_text(&sibling) {
            return Some(sibling);
        }
        current = sibling.previous_sibling();
    }
    None
}

fn next_content_sibling(node: &NodeRef) -> Option<NodeRef> {
    let mut current = node.next_sibling();
    while let Some(sibling) = current {
        if !is_blank_text(&sibling) {
            return Some(sibling);
        }
        current = sibling.next_sibling();
    }
    None
}

// br counts as a boundary so consecutive breaks split independently
fn is_flow_boundary(node: &NodeRef) -> bool {
    match tag_name(node) {
        Some(tag) => tag == "br" || is_block_tag(&tag),
        None => false,
    }
}

fn unwrap(node: &NodeRef) {
    while let Some(child) = node.first_child() {
        node.insert_before(child);
    }
    node.detach();
}

/// Placeholder link: truncated label text, full text preserved in `title`.
fn tiny_link(text: &str, href: &str, role: &str) -> NodeRef {
    let link = new_element("a");
    let display = if let Some(link_el) = link.as_element() {
        let mut attrs = link_el.attributes.borrow_mut();
        attrs.insert("href", href.to_string());
        attrs.insert("data-role", role.to_string());
        if text.chars().count() > TINY_TEXT_LENGTH {
            attrs.insert("title", text.to_string());
            let short: String = text.chars().take(TINY_TEXT_LENGTH).collect();
            format!("{short}...")
        } else {
            text.to_string()
        }
    } else {
        text.to_string()
    };
    link.append(NodeRef::new_text(display));
    link
}
