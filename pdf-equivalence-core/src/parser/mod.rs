//! PDF Parser Module
//!
//! A native PDF reader limited to what document comparison needs: cross-reference
//! data, the object catalog, the page tree and content streams. Implements the
//! relevant parts of ISO 32000-1 (PDF 1.7).

pub mod content;
pub mod filters;
pub mod lexer;
pub mod object_stream;
pub mod objects;
pub mod page_tree;
pub mod reader;
pub mod trailer;
pub mod xref;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use self::content::{ContentOperation, ContentParser, TextElement};
pub use self::lexer::{Lexer, Token};
pub use self::objects::{
    ObjectParser, ObjectRef, PdfArray, PdfDictionary, PdfName, PdfObject, PdfStream, PdfString,
};
pub use self::page_tree::ParsedPage;
pub use self::reader::PdfReader;

/// Default upper bound on the number of pages a document may have
pub const DEFAULT_MAX_PAGES: usize = 100_000;

/// Default nesting limit for page trees, objects and form XObjects
pub const DEFAULT_MAX_DEPTH: usize = objects::DEFAULT_MAX_DEPTH;

/// Default number of form XObjects interpreted for a single page
pub const DEFAULT_MAX_FORMS_PER_PAGE: usize = 10_000;

/// Default upper bound on the decoded size of a single stream (256 MiB)
pub const DEFAULT_MAX_STREAM_SIZE: usize = 256 * 1024 * 1024;

/// Options controlling how tolerant loading is and how far traversal may go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOptions {
    /// Maximum number of pages discovered in the page tree
    pub max_pages: usize,
    /// Maximum nesting depth for the page tree, objects and form XObjects
    pub max_depth: usize,
    /// Maximum number of form XObject invocations interpreted per page
    pub max_forms_per_page: usize,
    /// Maximum decoded size of a single stream in bytes
    pub max_stream_size: usize,
    /// Rebuild the cross-reference table by scanning the file when it is unusable
    pub recover_xref: bool,
    /// Tolerate syntax deviations (wrong stream lengths, missing `endobj`, missing header)
    pub lenient_syntax: bool,
    /// Keep content-level warnings in the resulting document model
    pub collect_warnings: bool,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl LoadOptions {
    /// Strict parsing: no xref reconstruction and no syntax recovery
    pub fn strict() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: DEFAULT_MAX_DEPTH,
            max_forms_per_page: DEFAULT_MAX_FORMS_PER_PAGE,
            max_stream_size: DEFAULT_MAX_STREAM_SIZE,
            recover_xref: false,
            lenient_syntax: false,
            collect_warnings: true,
        }
    }

    /// Lenient parsing: best-effort recovery of damaged files
    pub fn lenient() -> Self {
        Self {
            max_pages: DEFAULT_MAX_PAGES,
            max_depth: DEFAULT_MAX_DEPTH,
            max_forms_per_page: DEFAULT_MAX_FORMS_PER_PAGE,
            max_stream_size: DEFAULT_MAX_STREAM_SIZE,
            recover_xref: true,
            lenient_syntax: true,
            collect_warnings: true,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_forms_per_page(mut self, max_forms: usize) -> Self {
        self.max_forms_per_page = max_forms;
        self
    }

    pub fn with_max_stream_size(mut self, max_bytes: usize) -> Self {
        self.max_stream_size = max_bytes;
        self
    }

    pub fn with_warnings(mut self, collect: bool) -> Self {
        self.collect_warnings = collect;
        self
    }
}
