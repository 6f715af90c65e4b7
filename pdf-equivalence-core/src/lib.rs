//! # pdf-equivalence
//!
//! Decides whether two PDF documents are semantically equivalent: same page count,
//! same text on every page, same fonts and same images, regardless of how the files
//! are laid out byte for byte.
//!
//! ## Features
//!
//! - **Native parser**: Tokenizer, object parser, classic and stream cross-reference
//!   tables, `/Prev` chains, object streams and xref reconstruction
//! - **Text extraction**: `/ToUnicode` CMaps, simple encodings with `/Differences`,
//!   builtin Symbol encoding and form XObjects
//! - **Image metadata**: Dimensions, filter based suffix and `/Decode` arrays
//! - **Immutable model**: [`DocumentModel`] owns everything the comparison needs
//! - **Parallel loading**: [`load_pair`] loads both sides at once
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdf_equivalence::{compare, load_document};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let base = load_document(&std::fs::read("base.pdf")?)?;
//! let candidate = load_document(&std::fs::read("candidate.pdf")?)?;
//!
//! if compare::are_equivalent(&base, &candidate) {
//!     println!("Documents are equivalent");
//! }
//! println!("Page 1 mentions invoice: {}", base.find_text_on_page(1, "Invoice"));
//! # Ok(())
//! # }
//! ```
//!
//! ### Per-facet report
//!
//! ```rust,no_run
//! use pdf_equivalence::{load_pair, LoadOptions, PdfComparer};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let a = std::fs::read("a.pdf")?;
//! let b = std::fs::read("b.pdf")?;
//! let (a, b) = load_pair(&a, &b, &LoadOptions::lenient());
//! let (a, b) = (a?, b?);
//!
//! let report = PdfComparer::new(&a, &b).report();
//! println!("{report}");
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`parser`] - PDF objects, cross-reference data, page tree and content streams
//! - [`text`] - Font decoding and text extraction
//! - [`operations`] - Image metadata extraction
//! - [`model`] - The comparison-ready document model
//! - [`compare`] - Equivalence checks

pub mod compare;
pub mod error;
pub mod model;
pub mod operations;
pub mod parser;
pub mod text;

pub use compare::{
    are_equivalent, same_fonts, same_full_text, same_images, same_page_count,
    same_text_per_page, ComparisonReport, PdfComparer,
};
pub use error::{LoadError, Result};
pub use model::{DocumentModel, PageContent};
pub use operations::ImageInfo;
pub use parser::{LoadOptions, ParsedPage, PdfObject, PdfReader};

use std::path::Path;
use tracing::debug;

/// Current version of pdf-equivalence
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Load a document from memory with lenient options
pub fn load_document(data: &[u8]) -> Result<DocumentModel> {
    load_document_with_options(data, &LoadOptions::default())
}

/// Load a document from memory
pub fn load_document_with_options(data: &[u8], options: &LoadOptions) -> Result<DocumentModel> {
    DocumentModel::from_bytes(data, options)
}

/// Read a file and load it with lenient options
pub fn load_document_from_path<P: AsRef<Path>>(path: P) -> Result<DocumentModel> {
    let data = std::fs::read(path)?;
    load_document(&data)
}

/// Load two documents in parallel
pub fn load_pair(
    a: &[u8],
    b: &[u8],
    options: &LoadOptions,
) -> (Result<DocumentModel>, Result<DocumentModel>) {
    debug!("Loading document pair ({} and {} bytes)", a.len(), b.len());
    rayon::join(
        || load_document_with_options(a, options),
        || load_document_with_options(b, options),
    )
}

/// Load two documents and evaluate every comparison facet
pub fn compare_documents(a: &[u8], b: &[u8], options: &LoadOptions) -> Result<ComparisonReport> {
    let (a, b) = load_pair(a, b, options);
    let (a, b) = (a?, b?);
    Ok(PdfComparer::new(&a, &b).report())
}
