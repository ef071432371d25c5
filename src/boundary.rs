use crate::error::MulticolError;
use crate::types::FillState;
use kuchiki::NodeRef;

/// Maximum prefix length (in chars) that keeps the oracle Hungry.
///
/// The probe is expected to install the trial prefix and then measure; the
/// search narrows on the verdict. O(log n) probes. Returns 0 when even the
/// empty prefix overflows.
pub(crate) fn best_fit<F>(len: usize, mut probe: F) -> usize
where
    F: FnMut(usize) -> FillState,
{
    let mut left = 0i64;
    let mut right = len as i64;
    let mut best = 0usize;
    while left <= right {
        let mid = ((left + right) / 2) as usize;
        match probe(mid) {
            FillState::Hungry => {
                best = mid;
                left = mid as i64 + 1;
            }
            FillState::Full => {
                right = mid as i64 - 1;
            }
        }
    }
    best
}

/// Outcome of splitting an overflowing text node at its fit boundary.
pub(crate) struct TextSplit {
    /// Source-side prefix node that fits; the page's terminal node.
    pub fitting: NodeRef,
    /// Source-side remainder node; the resume point for the next page.
    pub remainder: NodeRef,
    /// Characters kept on the page.
    pub kept: usize,
}

fn char_prefix(chars: &[char], count: usize) -> String {
    chars[..count.min(chars.len())].iter().collect()
}

fn set_text(node: &NodeRef, value: String) -> Result<(), MulticolError> {
    match node.as_text() {
        Some(cell) => {
            *cell.borrow_mut() = value;
            Ok(())
        }
        None => Err(MulticolError::InvalidConfiguration(
            "boundary target is not a text node".to_string(),
        )),
    }
}

/// Binary-searches the boundary on the mirror clone, leaves the clone holding
/// the best-fitting prefix, and splits the source text node into prefix +
/// remainder in place.
///
/// `min_keep` forces progress when the page holds no text yet: a viewport
/// that cannot fit a single glyph still consumes one character per page
/// instead of looping forever.
pub(crate) fn find_and_split<F>(
    source: &NodeRef,
    mirror_clone: &NodeRef,
    mut oracle: F,
    min_keep: usize,
) -> Result<TextSplit, MulticolError>
where
    F: FnMut() -> FillState,
{
    let original = match source.as_text() {
        Some(cell) => cell.borrow().clone(),
        None => {
            return Err(MulticolError::InvalidConfiguration(
                "boundary source is not a text node".to_string(),
            ));
        }
    };
    let chars: Vec<char> = original.chars().collect();

    let mut kept = best_fit(chars.len(), |count| {
        // Errors cannot escape the probe; a non-text clone is caught below.
        if set_text(mirror_clone, char_prefix(&chars, count)).is_err() {
            return FillState::Full;
        }
        oracle()
    });
    if kept < min_keep {
        kept = min_keep.min(chars.len());
    }

    set_text(mirror_clone, char_prefix(&chars, kept))?;

    let fitting = NodeRef::new_text(char_prefix(&chars, kept));
    let remainder = NodeRef::new_text(chars[kept..].iter().collect::<String>());
    source.insert_before(fitting.clone());
    source.insert_after(remainder.clone());
    source.detach();

    Ok(TextSplit {
        fitting,
        remainder,
        kept,
    })
}
