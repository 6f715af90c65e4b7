//! Semantic comparison of two document models
//!
//! Each facet check is a pure function of two [`DocumentModel`]s. Per-page facets
//! require equal page counts first.

use crate::model::DocumentModel;
use std::collections::BTreeSet;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

pub fn same_page_count(a: &DocumentModel, b: &DocumentModel) -> bool {
    a.page_count() == b.page_count()
}

/// Concatenated page texts are byte equal
pub fn same_full_text(a: &DocumentModel, b: &DocumentModel) -> bool {
    a.full_text() == b.full_text()
}

/// Every page has the same text in both documents
pub fn same_text_per_page(a: &DocumentModel, b: &DocumentModel) -> bool {
    same_page_count(a, b) && a.texts() == b.texts()
}

/// Every page uses the same set of fonts, regardless of order
pub fn same_fonts(a: &DocumentModel, b: &DocumentModel) -> bool {
    same_page_count(a, b) && a.fonts() == b.fonts()
}

/// Every page has the same images in the same order
pub fn same_images(a: &DocumentModel, b: &DocumentModel) -> bool {
    if !same_page_count(a, b) || a.images().len() != b.images().len() {
        return false;
    }
    a.images().iter().all(|(page, images)| {
        b.page_images(*page).is_some_and(|other| {
            images.len() == other.len()
                && images.iter().zip(other).all(|(x, y)| {
                    x.width == y.width
                        && x.height == y.height
                        && x.suffix == y.suffix
                        && x.decode == y.decode
                })
        })
    })
}

/// Page count, text per page, fonts and images all match
pub fn are_equivalent(a: &DocumentModel, b: &DocumentModel) -> bool {
    same_page_count(a, b) && same_text_per_page(a, b) && same_fonts(a, b) && same_images(a, b)
}

/// Compares a base document against a comparison document
#[derive(Debug, Clone, Copy)]
pub struct PdfComparer<'a> {
    base: &'a DocumentModel,
    comparison: &'a DocumentModel,
}

impl<'a> PdfComparer<'a> {
    pub fn new(base: &'a DocumentModel, comparison: &'a DocumentModel) -> Self {
        Self { base, comparison }
    }

    pub fn base(&self) -> &'a DocumentModel {
        self.base
    }

    pub fn comparison(&self) -> &'a DocumentModel {
        self.comparison
    }

    pub fn same_page_count(&self) -> bool {
        same_page_count(self.base, self.comparison)
    }

    pub fn same_full_text(&self) -> bool {
        same_full_text(self.base, self.comparison)
    }

    pub fn same_text_per_page(&self) -> bool {
        same_text_per_page(self.base, self.comparison)
    }

    pub fn same_fonts(&self) -> bool {
        same_fonts(self.base, self.comparison)
    }

    pub fn same_images(&self) -> bool {
        same_images(self.base, self.comparison)
    }

    pub fn are_equivalent(&self) -> bool {
        are_equivalent(self.base, self.comparison)
    }

    /// Pages present in either document whose text, fonts or images differ
    pub fn differing_pages(&self) -> Vec<u32> {
        let pages: BTreeSet<u32> = self
            .base
            .texts()
            .keys()
            .chain(self.comparison.texts().keys())
            .copied()
            .collect();

        pages
            .into_iter()
            .filter(|&page| {
                self.base.page_text(page) != self.comparison.page_text(page)
                    || self.base.page_fonts(page) != self.comparison.page_fonts(page)
                    || self.base.page_images(page) != self.comparison.page_images(page)
            })
            .collect()
    }

    /// Evaluate every facet
    pub fn report(&self) -> ComparisonReport {
        ComparisonReport {
            same_page_count: self.same_page_count(),
            same_full_text: self.same_full_text(),
            same_text_per_page: self.same_text_per_page(),
            same_fonts: self.same_fonts(),
            same_images: self.same_images(),
            differing_pages: self.differing_pages(),
        }
    }
}

/// Verdict for every comparison facet
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComparisonReport {
    pub same_page_count: bool,
    pub same_full_text: bool,
    pub same_text_per_page: bool,
    pub same_fonts: bool,
    pub same_images: bool,
    /// Pages whose text, fonts or images differ, in ascending order
    pub differing_pages: Vec<u32>,
}

impl ComparisonReport {
    pub fn is_equivalent(&self) -> bool {
        self.same_page_count && self.same_text_per_page && self.same_fonts && self.same_images
    }

    /// Names of the facets that did not match
    pub fn mismatches(&self) -> Vec<&'static str> {
        [
            ("page count", self.same_page_count),
            ("full text", self.same_full_text),
            ("text per page", self.same_text_per_page),
            ("fonts", self.same_fonts),
            ("images", self.same_images),
        ]
        .into_iter()
        .filter(|(_, same)| !same)
        .map(|(name, _)| name)
        .collect()
    }
}

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_equivalent() && self.same_full_text {
            return write!(f, "equivalent");
        }
        write!(f, "different: {}", self.mismatches().join(", "))?;
        if !self.differing_pages.is_empty() {
            let pages: Vec<String> = self.differing_pages.iter().map(u32::to_string).collect();
            write!(f, " (pages {})", pages.join(", "))?;
        }
        Ok(())
    }
}
