use crate::fragment::{inner_html, parent_chain};
use kuchiki::NodeRef;
use std::sync::atomic::{AtomicU64, Ordering};

static MARKER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Leftover HTML for everything at and after `resume` in the source tree:
/// ancestor open tags (outermost first, original attributes) followed by the
/// serialized remainder.
///
/// The split marker is a comment whose payload carries a process-unique
/// counter; text nodes cannot forge it because the serializer escapes `<`,
/// so the only occurrence of the serialized comment form is the marker
/// itself.
pub(crate) fn left_over_html(food_root: &NodeRef, resume: &NodeRef) -> String {
    let payload = format!("multicol-split-{:016x}", MARKER_SEQ.fetch_add(1, Ordering::Relaxed));
    let marker = NodeRef::new_comment(payload.clone());
    resume.insert_before(marker.clone());
    let serialized = inner_html(food_root);
    marker.detach();

    let token = format!("<!--{payload}-->");
    let suffix = serialized
        .splitn(2, token.as_str())
        .nth(1)
        .unwrap_or_default();

    let mut out = String::new();
    for ancestor in parent_chain(resume, food_root) {
        push_open_tag(&mut out, &ancestor);
    }
    out.push_str(suffix);
    out
}

fn push_open_tag(out: &mut String, element: &NodeRef) {
    let Some(el) = element.as_element() else {
        return;
    };
    out.push('<');
    out.push_str(el.name.local.as_ref());
    for (name, attr) in el.attributes.borrow().map.iter() {
        out.push(' ');
        out.push_str(name.local.as_ref());
        out.push_str("=\"");
        out.push_str(&escape_attr(&attr.value));
        out.push('"');
    }
    out.push('>');
}

// Same minimal escaping the HTML serializer applies to attribute values.
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::parse_fragment;

    fn text_node_containing(root: &NodeRef, needle: &str) -> NodeRef {
        let mut cursor = root.first_child();
        while let Some(node) = cursor {
            if node.as_text().is_some() && node.text_contents().contains(needle) {
                return node;
            }
            cursor = crate::fragment::next_in_document_order(&node, root);
        }
        panic!("text {needle:?} not found");
    }

    #[test]
    fn reopen_prefix_is_outermost_first_with_attributes() {
        let root = parse_fragment(
            r#"<div class="outer"><section id="s"><article><p lang="en">split here</p></article></section></div>"#,
        )
        .expect("parse");
        let text = text_node_containing(&root, "split here");
        let leftover = left_over_html(&root, &text);
        assert!(
            leftover.starts_with(
                r#"<div class="outer"><section id="s"><article><p lang="en">split here"#
            ),
            "got {leftover}"
        );
    }

    #[test]
    fn leftover_excludes_consumed_siblings() {
        let root = parse_fragment("<div><p>eaten</p><p>rest</p></div>").expect("parse");
        let second_p = root
            .first_child()
            .and_then(|div| div.last_child())
            .expect("second p");
        let leftover = left_over_html(&root, &second_p);
        assert_eq!(leftover, "<div><p>rest</p></div>");
    }

    #[test]
    fn leftover_from_first_child_keeps_whole_subtree() {
        let root = parse_fragment("<p><span>kept</span>tail</p>").expect("parse");
        let span = root
            .first_child()
            .and_then(|p| p.first_child())
            .expect("span");
        let leftover = left_over_html(&root, &span);
        assert_eq!(leftover, "<p><span>kept</span>tail</p>");
    }

    #[test]
    fn marker_is_removed_from_the_source_after_serialization() {
        let root = parse_fragment("<p>a</p><p>b</p>").expect("parse");
        let second = root.last_child().expect("p");
        let _ = left_over_html(&root, &second);
        assert_eq!(inner_html(&root), "<p>a</p><p>b</p>");
    }

    #[test]
    fn comment_lookalike_text_cannot_forge_the_marker() {
        let root =
            parse_fragment("<p>fake <!--multicol-split--> text</p><p>rest</p>").expect("parse");
        // the parser keeps the real comment; the filler never mirrors it, but
        // the splitter must still find its own marker, not the lookalike
        let second = root.last_child().expect("p");
        let leftover = left_over_html(&root, &second);
        assert_eq!(leftover, "<p>rest</p>");
    }

    #[test]
    fn attribute_values_are_escaped_in_reopen_tags() {
        let root = parse_fragment(r#"<div title="a &amp; b"><p>x</p>more</div>"#).expect("parse");
        let after = root
            .first_child()
            .and_then(|div| div.last_child())
            .expect("text");
        let leftover = left_over_html(&root, &after);
        assert_eq!(leftover, r#"<div title="a &amp; b">more</div>"#);
    }
}
