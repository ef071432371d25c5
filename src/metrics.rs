use crate::error::MulticolError;
use crate::fragment::{is_block_tag, tag_name};
use crate::types::{FillState, Px, Size};
use kuchiki::NodeRef;

/// Measurement oracle for a mirror tree.
///
/// The filler and the boundary search only ever ask one question: does the
/// mirror overflow its viewport box right now. Any layout backend that can
/// answer it works — this crate ships a deterministic text-metrics grid, a
/// real browser engine would answer from reflow instead.
pub trait FitChecker {
    fn fill_state(&self, mirror: &NodeRef) -> FillState;
}

/// Headless multi-column layout estimator with a fixed glyph advance.
///
/// The viewport is a grid of `columns x lines_per_column` lines holding
/// `chars_per_line` characters each. Text flows with greedy word wrap and
/// hard breaks for overlong words; block boundaries and `<br>` start new
/// lines; replaced elements occupy one line. The line count is monotone
/// under appending or truncating trailing content, which the binary boundary
/// search depends on.
pub struct ColumnGrid {
    columns: u64,
    chars_per_line: u64,
    lines_per_column: u64,
}

impl ColumnGrid {
    pub fn new(
        viewport: Size,
        column_width: Px,
        line_height: Px,
        glyph_advance: Px,
    ) -> Result<Self, MulticolError> {
        if column_width <= Px::ZERO || line_height <= Px::ZERO || glyph_advance <= Px::ZERO {
            return Err(MulticolError::InvalidConfiguration(
                "column width, line height and glyph advance must be positive".to_string(),
            ));
        }
        let chars_per_line = column_width.div_floor(glyph_advance);
        if chars_per_line < 1 {
            return Err(MulticolError::InvalidConfiguration(
                "column width must fit at least one glyph".to_string(),
            ));
        }
        let columns = viewport.width.div_floor(column_width).max(1);
        let lines_per_column = viewport.height.div_floor(line_height);
        Ok(Self {
            columns: columns as u64,
            chars_per_line: chars_per_line as u64,
            lines_per_column: lines_per_column as u64,
        })
    }

    /// Grid dimensions given directly, bypassing pixel geometry.
    pub fn from_grid(
        columns: u64,
        chars_per_line: u64,
        lines_per_column: u64,
    ) -> Result<Self, MulticolError> {
        if columns < 1 || chars_per_line < 1 {
            return Err(MulticolError::InvalidConfiguration(
                "grid needs at least one column and one glyph per line".to_string(),
            ));
        }
        Ok(Self {
            columns,
            chars_per_line,
            lines_per_column,
        })
    }

    pub fn line_capacity(&self) -> u64 {
        self.columns * self.lines_per_column
    }

    fn measure_lines(&self, mirror: &NodeRef) -> u64 {
        let mut counter = LineCounter::new(self.chars_per_line);
        measure_children(mirror, &mut counter);
        counter.total_lines()
    }
}

impl FitChecker for ColumnGrid {
    fn fill_state(&self, mirror: &NodeRef) -> FillState {
        if self.measure_lines(mirror) > self.line_capacity() {
            FillState::Full
        } else {
            FillState::Hungry
        }
    }
}

struct LineCounter {
    width: u64,
    completed: u64,
    col: u64,
}

impl LineCounter {
    fn new(width: u64) -> Self {
        Self {
            width,
            completed: 0,
            col: 0,
        }
    }

    fn total_lines(&self) -> u64 {
        self.completed + if self.col > 0 { 1 } else { 0 }
    }

    fn break_line(&mut self) {
        if self.col > 0 {
            self.completed += 1;
            self.col = 0;
        }
    }

    fn take_line(&mut self) {
        self.break_line();
        self.completed += 1;
    }

    fn new_line(&mut self) {
        self.completed += 1;
        self.col = 0;
    }

    fn flow_text(&mut self, text: &str) {
        for word in text.split_whitespace() {
            let mut remaining = word.chars().count() as u64;
            loop {
                let space = if self.col == 0 { 0 } else { 1 };
                let avail = self.width - self.col;
                if space + remaining <= avail {
                    self.col += space + remaining;
                    break;
                }
                if self.col > 0 {
                    self.new_line();
                    continue;
                }
                // overlong word: hard break, break-word style
                let take = avail.min(remaining);
                self.col += take;
                remaining -= take;
                if remaining == 0 {
                    break;
                }
                self.new_line();
            }
        }
    }
}

fn measure_children(node: &NodeRef, counter: &mut LineCounter) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            counter.flow_text(&text.borrow());
            continue;
        }
        let Some(tag) = tag_name(&child) else {
            continue;
        };
        match tag.as_str() {
            "br" => counter.break_line(),
            "hr" | "img" => counter.take_line(),
            _ if is_block_tag(&tag) => {
                counter.break_line();
                measure_children(&child, counter);
                counter.break_line();
            }
            _ => measure_children(&child, counter),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::parse_fragment;

    fn lines(grid: &ColumnGrid, html: &str) -> u64 {
        let root = parse_fragment(html).expect("parse");
        grid.measure_lines(&root)
    }

    fn grid(chars_per_line: u64, lines_per_column: u64) -> ColumnGrid {
        ColumnGrid::from_grid(1, chars_per_line, lines_per_column).expect("grid")
    }

    #[test]
    fn geometry_derives_grid_dimensions() {
        let g = ColumnGrid::new(
            Size::from_f32(960.0, 600.0),
            Px::from_f32(400.0),
            Px::from_f32(24.0),
            Px::from_f32(8.0),
        )
        .expect("grid");
        assert_eq!(g.columns, 2);
        assert_eq!(g.chars_per_line, 50);
        assert_eq!(g.lines_per_column, 25);
        assert_eq!(g.line_capacity(), 50);
    }

    #[test]
    fn zero_geometry_is_rejected() {
        let err = ColumnGrid::new(
            Size::from_f32(960.0, 600.0),
            Px::ZERO,
            Px::from_f32(24.0),
            Px::from_f32(8.0),
        );
        assert!(matches!(err, Err(MulticolError::InvalidConfiguration(_))));
        assert!(ColumnGrid::from_grid(0, 10, 10).is_err());
    }

    #[test]
    fn words_wrap_greedily() {
        let g = grid(10, 100);
        assert_eq!(lines(&g, "<p>aaa bbb</p>"), 1); // "aaa bbb" = 7
        assert_eq!(lines(&g, "<p>aaaa bbbb cc</p>"), 2); // "aaaa bbbb" then "cc"
    }

    #[test]
    fn overlong_words_hard_break() {
        let g = grid(50, 100);
        let word = "A".repeat(500);
        assert_eq!(lines(&g, &format!("<p>{word}</p>")), 10);
        let word = "A".repeat(501);
        assert_eq!(lines(&g, &format!("<p>{word}</p>")), 11);
    }

    #[test]
    fn block_boundaries_and_br_start_new_lines() {
        let g = grid(50, 100);
        assert_eq!(lines(&g, "<p>one</p><p>two</p>"), 2);
        assert_eq!(lines(&g, "<p>one<br>two</p>"), 2);
        assert_eq!(lines(&g, "<p>one <em>two</em> three</p>"), 1);
    }

    #[test]
    fn replaced_elements_take_a_line() {
        let g = grid(50, 100);
        assert_eq!(lines(&g, "<p>text</p><hr><p>more</p>"), 3);
        assert_eq!(lines(&g, r#"<p>a<img src="x">b</p>"#), 3);
    }

    #[test]
    fn fill_state_flips_exactly_at_capacity() {
        let g = grid(50, 10);
        let fits = "A".repeat(500);
        let over = "A".repeat(501);
        let root = parse_fragment(&format!("<p>{fits}</p>")).expect("parse");
        assert_eq!(g.fill_state(&root), FillState::Hungry);
        let root = parse_fragment(&format!("<p>{over}</p>")).expect("parse");
        assert_eq!(g.fill_state(&root), FillState::Full);
    }

    #[test]
    fn line_count_is_monotone_in_trailing_text_length() {
        let g = grid(7, 100);
        let text = "lorem ipsum dolor sit amet consectetur";
        let mut last = 0;
        for k in 0..=text.chars().count() {
            let prefix: String = text.chars().take(k).collect();
            let count = lines(&g, &format!("<p>{prefix}</p>"));
            assert!(count >= last, "lines dropped at k={k}");
            last = count;
        }
    }
}
