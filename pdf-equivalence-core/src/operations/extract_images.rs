//! Image metadata extraction
//!
//! Enumerates the image XObjects of a resource dictionary in dictionary order and
//! reports their dimensions, a file suffix derived from the filter chain and the
//! `/Decode` array. Pixel data is never decoded.

use crate::parser::objects::{PdfDictionary, PdfObject};
use crate::parser::reader::PdfReader;
use tracing::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Width or height reported when the image dictionary has no usable value
pub const MISSING_DIMENSION: i64 = -1;

/// Metadata of one image XObject
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ImageInfo {
    pub width: i64,
    pub height: i64,
    /// `"jpg"` for DCTDecode, `"jp2"` for JPXDecode, `"png"` for anything else
    pub suffix: String,
    pub decode: Option<Vec<f64>>,
}

impl ImageInfo {
    pub fn new(width: i64, height: i64, suffix: impl Into<String>) -> Self {
        Self {
            width,
            height,
            suffix: suffix.into(),
            decode: None,
        }
    }

    pub fn with_decode(mut self, decode: Vec<f64>) -> Self {
        self.decode = Some(decode);
        self
    }
}

/// File suffix for a filter chain; the last filter wins
pub fn suffix_for_filters<S: AsRef<str>>(filters: &[S]) -> &'static str {
    match filters.last().map(AsRef::as_ref) {
        Some("DCTDecode") | Some("DCT") => "jpg",
        Some("JPXDecode") => "jp2",
        // Any other filter, or none, falls into the default bucket
        _ => "png",
    }
}

/// Images found in one resource dictionary
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageImages {
    pub images: Vec<ImageInfo>,
    pub warnings: Vec<String>,
}

/// Image extractor
pub struct ImageExtractor<'r> {
    reader: &'r PdfReader,
}

impl<'r> ImageExtractor<'r> {
    pub fn new(reader: &'r PdfReader) -> Self {
        Self { reader }
    }

    /// Extract image metadata from a page's resource dictionary
    pub fn extract(&self, resources: &PdfDictionary) -> PageImages {
        let mut result = PageImages::default();

        let xobjects = match self.reader.resolve_entry(resources, "XObject") {
            Ok(Some(PdfObject::Dictionary(xobjects))) => xobjects,
            Ok(_) => return result,
            Err(e) => {
                // An unreadable /XObject dictionary counts as empty
                record(&mut result.warnings, format!("XObject resources unavailable: {e}"));
                return result;
            }
        };

        for (name, entry) in xobjects.iter() {
            let dict = match self.reader.resolve_object(entry) {
                Ok(object) => match object.as_dict() {
                    Some(dict) => dict,
                    None => continue,
                },
                Err(e) => {
                    record(&mut result.warnings, format!("XObject /{name} skipped: {e}"));
                    continue;
                }
            };
            if dict.get("Subtype").and_then(PdfObject::as_name) != Some("Image") {
                continue;
            }
            result.images.push(self.image_info(dict));
        }

        result
    }

    fn image_info(&self, dict: &PdfDictionary) -> ImageInfo {
        let filters = self.filter_names(dict);
        ImageInfo {
            width: self.integer(dict, "Width"),
            height: self.integer(dict, "Height"),
            suffix: suffix_for_filters(&filters).to_string(),
            decode: self.decode_array(dict),
        }
    }

    fn integer(&self, dict: &PdfDictionary, key: &str) -> i64 {
        self.reader
            .resolve_entry(dict, key)
            .ok()
            .flatten()
            .and_then(PdfObject::as_integer)
            .unwrap_or(MISSING_DIMENSION)
    }

    /// Filter names in chain order, resolving indirect values
    fn filter_names(&self, dict: &PdfDictionary) -> Vec<String> {
        match self.reader.resolve_entry(dict, "Filter") {
            Ok(Some(PdfObject::Name(name))) => vec![name.as_str().to_string()],
            Ok(Some(PdfObject::Array(filters))) => filters
                .iter()
                .filter_map(|f| self.reader.resolve_object(f).ok())
                .filter_map(PdfObject::as_name)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    /// `/Decode` numbers; absent, damaged or unresolvable arrays are `None`
    fn decode_array(&self, dict: &PdfDictionary) -> Option<Vec<f64>> {
        let array = self.reader.resolve_entry(dict, "Decode").ok()??.as_array()?;
        array
            .iter()
            .map(|item| self.reader.resolve_object(item).ok()?.as_real())
            .collect()
    }
}

fn record(warnings: &mut Vec<String>, message: String) {
    warn!("{}", message);
    warnings.push(message);
}
