mod boundary;
mod debug;
mod error;
mod filler;
mod fragment;
mod metrics;
mod paginator;
mod reopen;
mod sanitize;
mod scope;
mod types;

pub use error::MulticolError;
pub use filler::PageFiller;
pub use metrics::{ColumnGrid, FitChecker};
pub use paginator::{Page, Paginator, PaginatorBuilder};
pub use sanitize::{SanitizeReport, Sanitizer};
pub use scope::{START_ELEMENT_ATTR, ScopeWalker, WalkResult};
pub use types::{FillState, Px, Size};
