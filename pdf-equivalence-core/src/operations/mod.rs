//! Document-level operations
//!
//! Resource inspection used to build the document model. Currently limited to image
//! metadata.

pub mod extract_images;

pub use extract_images::{suffix_for_filters, ImageExtractor, ImageInfo, PageImages};
