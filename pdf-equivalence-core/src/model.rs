//! Document model
//!
//! The immutable, comparison-ready view of a PDF: page count, and per page the
//! extracted text, the set of font names and the image metadata. Built once from a
//! [`PdfReader`]; the object catalog is dropped afterwards.

use crate::error::Result;
use crate::operations::{ImageExtractor, ImageInfo};
use crate::parser::objects::{PdfDictionary, PdfObject};
use crate::parser::page_tree::ParsedPage;
use crate::parser::reader::PdfReader;
use crate::parser::LoadOptions;
use crate::text::{font_name, TextExtractor};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{debug, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Content of a single page, used to assemble a model directly
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageContent {
    pub text: String,
    pub fonts: BTreeSet<String>,
    pub images: Vec<ImageInfo>,
}

impl PageContent {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_font(mut self, font: impl Into<String>) -> Self {
        self.fonts.insert(font.into());
        self
    }

    pub fn with_image(mut self, image: ImageInfo) -> Self {
        self.images.push(image);
        self
    }
}

/// Comparison-ready view of a loaded document
///
/// Pages are numbered from 1. Every page has an entry in each of the per-page
/// maps, possibly empty.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DocumentModel {
    number_of_pages: usize,
    page_text: BTreeMap<u32, String>,
    page_fonts: BTreeMap<u32, BTreeSet<String>>,
    page_images: BTreeMap<u32, Vec<ImageInfo>>,
    warnings: Vec<String>,
}

impl DocumentModel {
    /// Load a document from a file with lenient options
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = PdfReader::open(path, LoadOptions::default())?;
        Self::from_reader(&reader)
    }

    /// Load a document from memory
    pub fn from_bytes(data: &[u8], options: &LoadOptions) -> Result<Self> {
        let reader = PdfReader::from_bytes(data, options.clone())?;
        Self::from_reader(&reader)
    }

    /// Build the model from a loaded reader
    ///
    /// Fails only on structural errors from page discovery; damaged content is
    /// skipped and reported through [`warnings`](Self::warnings).
    pub fn from_reader(reader: &PdfReader) -> Result<Self> {
        let pages = reader.pages()?;
        let text_extractor = TextExtractor::new(reader);
        let image_extractor = ImageExtractor::new(reader);
        let collect_warnings = reader.options().collect_warnings;

        let mut model = DocumentModel {
            number_of_pages: pages.len(),
            ..Default::default()
        };

        for page in &pages {
            let mut page_warnings = Vec::new();

            let text = text_extractor.extract_page(page);
            page_warnings.extend(text.warnings);

            let mut fonts = resource_fonts(reader, page, &mut page_warnings);
            fonts.extend(text.fonts);

            let images = image_extractor.extract(&page.resources);
            page_warnings.extend(images.warnings);

            if collect_warnings {
                model.warnings.extend(
                    page_warnings
                        .into_iter()
                        .map(|w| format!("page {}: {}", page.number, w)),
                );
            }
            model.page_text.insert(page.number, text.text);
            model.page_fonts.insert(page.number, fonts);
            model.page_images.insert(page.number, images.images);
        }

        debug!(
            "Built document model: {} pages, {} warnings",
            model.number_of_pages,
            model.warnings.len()
        );
        Ok(model)
    }

    /// Assemble a model from page contents, numbered from 1
    pub fn from_pages(pages: impl IntoIterator<Item = PageContent>) -> Self {
        let mut model = DocumentModel::default();
        for (index, page) in pages.into_iter().enumerate() {
            let number = index as u32 + 1;
            model.page_text.insert(number, page.text);
            model.page_fonts.insert(number, page.fonts);
            model.page_images.insert(number, page.images);
            model.number_of_pages += 1;
        }
        model
    }

    pub fn page_count(&self) -> usize {
        self.number_of_pages
    }

    /// Text of a page, `None` when the page does not exist
    pub fn page_text(&self, page: u32) -> Option<&str> {
        self.page_text.get(&page).map(String::as_str)
    }

    /// Whether the page's text contains `needle`
    pub fn find_text_on_page(&self, page: u32, needle: &str) -> bool {
        self.page_text(page).is_some_and(|text| text.contains(needle))
    }

    /// All page texts concatenated in page order
    pub fn full_text(&self) -> String {
        self.page_text.values().map(String::as_str).collect()
    }

    pub fn page_fonts(&self, page: u32) -> Option<&BTreeSet<String>> {
        self.page_fonts.get(&page)
    }

    pub fn page_images(&self, page: u32) -> Option<&[ImageInfo]> {
        self.page_images.get(&page).map(Vec::as_slice)
    }

    /// Page texts keyed by page number
    pub fn texts(&self) -> &BTreeMap<u32, String> {
        &self.page_text
    }

    /// Font sets keyed by page number
    pub fn fonts(&self) -> &BTreeMap<u32, BTreeSet<String>> {
        &self.page_fonts
    }

    /// Image lists keyed by page number
    pub fn images(&self) -> &BTreeMap<u32, Vec<ImageInfo>> {
        &self.page_images
    }

    /// Content-level problems met while loading
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }
}

/// Names of every font in the page's `/Font` resource dictionary
fn resource_fonts(
    reader: &PdfReader,
    page: &ParsedPage,
    warnings: &mut Vec<String>,
) -> BTreeSet<String> {
    let mut names = BTreeSet::new();

    let fonts: &PdfDictionary = match reader.resolve_entry(&page.resources, "Font") {
        Ok(Some(PdfObject::Dictionary(fonts))) => fonts,
        Ok(_) => return names,
        Err(e) => {
            record(warnings, format!("font resources unavailable: {e}"));
            return names;
        }
    };

    for (key, entry) in fonts.iter() {
        match reader.resolve_dict(entry) {
            Ok(font) => {
                names.insert(font_name(reader, key, Some(font)));
            }
            Err(e) => {
                record(warnings, format!("font /{key} unavailable: {e}"));
                names.insert(font_name(reader, key, None));
            }
        }
    }
    names
}

fn record(warnings: &mut Vec<String>, message: String) {
    warn!("{}", message);
    warnings.push(message);
}
