use crate::debug::DebugLogger;
use crate::error::MulticolError;
use crate::filler::PageFiller;
use crate::metrics::{ColumnGrid, FitChecker};
use crate::types::{Px, Size};
use std::path::PathBuf;
use std::rc::Rc;

/// One pagination unit: the HTML that fit, frozen at build time.
///
/// `source_html` is the remaining input the page was seeded with; handing it
/// to a fresh `Paginator` rebuilds the sequence from this page forward,
/// which is the re-entry point after a viewport change.
pub struct Page {
    index: usize,
    html: String,
    source: String,
}

impl Page {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn source_html(&self) -> &str {
        &self.source
    }
}

/// Lazily builds and caches the ordered page sequence.
///
/// Pages are built strictly forward, one per navigation step past the cached
/// edge; earlier pages are always cached, so backward navigation never
/// regenerates. Page 0 exists from construction on (an empty input yields a
/// single empty page).
pub struct Paginator {
    checker: Rc<dyn FitChecker>,
    pages: Vec<Page>,
    page_index: usize,
    remaining: Option<String>,
    debug: Option<DebugLogger>,
}

impl Paginator {
    pub fn builder() -> PaginatorBuilder {
        PaginatorBuilder::new()
    }

    pub fn new(html: &str, checker: Rc<dyn FitChecker>) -> Result<Self, MulticolError> {
        let mut paginator = Self {
            checker,
            pages: Vec::new(),
            page_index: 0,
            remaining: Some(html.to_string()),
            debug: None,
        };
        paginator.build_next()?;
        Ok(paginator)
    }

    pub fn current_page(&self) -> &Page {
        // pages is never empty: page 0 is built in the constructor
        &self.pages[self.page_index]
    }

    pub fn page_index(&self) -> usize {
        self.page_index
    }

    pub fn built_pages(&self) -> usize {
        self.pages.len()
    }

    /// True once the whole source has been distributed onto pages.
    pub fn is_exhausted(&self) -> bool {
        self.remaining.is_none()
    }

    /// The remaining source at the start of the current page; feed this to a
    /// new `Paginator` to rebuild from here after the viewport changed.
    pub fn resume_source(&self) -> &str {
        self.current_page().source_html()
    }

    /// Advances to the next page, building it on demand. `Ok(None)` when the
    /// content is exhausted; the index does not move in that case.
    pub fn next_page(&mut self) -> Result<Option<&Page>, MulticolError> {
        if self.page_index + 1 < self.pages.len() {
            self.page_index += 1;
            return Ok(Some(&self.pages[self.page_index]));
        }
        if self.build_next()? {
            self.page_index += 1;
            return Ok(Some(&self.pages[self.page_index]));
        }
        Ok(None)
    }

    /// Steps back to the cached previous page; `None` at page 0.
    pub fn prev_page(&mut self) -> Option<&Page> {
        if self.page_index == 0 {
            return None;
        }
        self.page_index -= 1;
        Some(&self.pages[self.page_index])
    }

    fn build_next(&mut self) -> Result<bool, MulticolError> {
        let Some(remain) = self.remaining.take() else {
            return Ok(false);
        };
        let index = self.pages.len();
        let mut filler = PageFiller::new(index);
        filler.attach(Rc::clone(&self.checker));
        if let Some(debug) = &self.debug {
            filler.set_debug(debug.clone());
        }
        let leftover = filler.eat(&remain)?;
        if let Some(debug) = &self.debug {
            debug.increment("pages.built", 1);
            debug.log_event("page.built", &[("index", index.to_string())]);
            if leftover.is_none() {
                debug.emit_summary("paginate");
                debug.flush();
            }
        }
        self.pages.push(Page {
            index,
            html: filler.content_html(),
            source: remain,
        });
        self.remaining = leftover;
        Ok(true)
    }
}

/// Configuration surface for the pagination engine. Geometry defaults model
/// a desktop reading pane with 25em columns at a 16px em.
pub struct PaginatorBuilder {
    viewport: Size,
    column_width: Px,
    line_height: Px,
    glyph_advance: Px,
    checker: Option<Rc<dyn FitChecker>>,
    debug_path: Option<PathBuf>,
}

impl PaginatorBuilder {
    fn new() -> Self {
        Self {
            viewport: Size::from_f32(960.0, 600.0),
            column_width: Px::from_f32(400.0),
            line_height: Px::from_f32(24.0),
            glyph_advance: Px::from_f32(8.0),
            checker: None,
            debug_path: None,
        }
    }

    pub fn viewport(mut self, width: f32, height: f32) -> Self {
        self.viewport = Size::from_f32(width, height);
        self
    }

    pub fn column_width(mut self, width: f32) -> Self {
        self.column_width = Px::from_f32(width);
        self
    }

    pub fn line_height(mut self, height: f32) -> Self {
        self.line_height = Px::from_f32(height);
        self
    }

    pub fn glyph_advance(mut self, advance: f32) -> Self {
        self.glyph_advance = Px::from_f32(advance);
        self
    }

    /// Overrides the built-in column grid with another measurement backend.
    pub fn fit_checker(mut self, checker: Rc<dyn FitChecker>) -> Self {
        self.checker = Some(checker);
        self
    }

    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self, html: &str) -> Result<Paginator, MulticolError> {
        let checker: Rc<dyn FitChecker> = match self.checker {
            Some(checker) => checker,
            None => Rc::new(ColumnGrid::new(
                self.viewport,
                self.column_width,
                self.line_height,
                self.glyph_advance,
            )?),
        };
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let mut paginator = Paginator {
            checker,
            pages: Vec::new(),
            page_index: 0,
            remaining: Some(html.to_string()),
            debug,
        };
        paginator.build_next()?;
        if let Some(logger) = &paginator.debug {
            logger.flush();
        }
        Ok(paginator)
    }
}
