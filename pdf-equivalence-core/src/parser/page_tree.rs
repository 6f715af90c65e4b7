//! PDF Page Tree Parser
//!
//! Walks `/Root/Pages` depth-first in `/Kids` order. Traversal order defines page
//! numbering. `/Resources` is inherited from the nearest ancestor that defines it.
//!
//! The walk is bounded: a node reached twice (a cycle or a shared subtree), a tree
//! deeper than [`LoadOptions::max_depth`](super::LoadOptions) or more pages than
//! [`LoadOptions::max_pages`](super::LoadOptions) fail with
//! [`LoadError::StructuralLimitExceeded`].

use super::objects::{ObjectRef, PdfDictionary, PdfObject};
use super::reader::PdfReader;
use crate::error::{LoadError, Result};
use std::collections::HashSet;
use tracing::debug;

/// A single page with its effective resources
#[derive(Debug, Clone)]
pub struct ParsedPage {
    /// 1-based position in document order
    pub number: u32,
    /// Object reference of the page dictionary (None for a direct kid)
    pub obj_ref: Option<ObjectRef>,
    /// The page dictionary
    pub dict: PdfDictionary,
    /// Own or inherited resource dictionary, already resolved
    pub resources: PdfDictionary,
}

impl ParsedPage {
    /// Decoded content streams in order.
    ///
    /// `/Contents` may be a stream or an array of streams. Each stream is decoded on
    /// its own so one damaged stream does not hide the others.
    pub fn content_streams(&self, reader: &PdfReader) -> Vec<Result<Vec<u8>>> {
        let contents = match reader.resolve_entry(&self.dict, "Contents") {
            Ok(Some(contents)) => contents,
            Ok(None) => return Vec::new(),
            Err(e) => return vec![Err(e)],
        };

        match contents {
            PdfObject::Stream(stream) => vec![reader.decode_stream(stream)],
            PdfObject::Array(parts) => parts
                .iter()
                .map(|part| {
                    let part = reader.resolve_object(part)?;
                    let stream = part.as_stream().ok_or_else(|| {
                        LoadError::object(0, "Content array entry is not a stream")
                    })?;
                    reader.decode_stream(stream)
                })
                .collect(),
            PdfObject::Null => Vec::new(),
            _ => vec![Err(LoadError::object(
                0,
                format!("Page {} /Contents is not a stream or array", self.number),
            ))],
        }
    }
}

/// One pending node of the depth-first walk
struct PendingNode<'a> {
    node: &'a PdfObject,
    depth: usize,
    inherited_resources: Option<&'a PdfObject>,
}

/// Collect every page of the document in order
pub fn collect_pages(reader: &PdfReader) -> Result<Vec<ParsedPage>> {
    let options = reader.options();
    let catalog = reader.catalog()?;
    let root = catalog
        .get("Pages")
        .ok_or_else(|| LoadError::object(0, "Catalog has no /Pages"))?;

    let mut pages = Vec::new();
    let mut visited: HashSet<ObjectRef> = HashSet::new();
    let mut stack = vec![PendingNode {
        node: root,
        depth: 0,
        inherited_resources: None,
    }];

    while let Some(pending) = stack.pop() {
        if pending.depth > options.max_depth {
            return Err(LoadError::StructuralLimitExceeded(format!(
                "page tree deeper than {}",
                options.max_depth
            )));
        }

        let obj_ref = pending.node.as_reference();
        if let Some(id) = obj_ref {
            if !visited.insert(id) {
                return Err(LoadError::StructuralLimitExceeded(format!(
                    "page tree node {id} is reachable more than once"
                )));
            }
        }

        let dict = reader.resolve_object(pending.node)?.as_dict().ok_or_else(|| {
            LoadError::object(0, "Page tree node is not a dictionary")
        })?;
        let resources = dict.get("Resources").or(pending.inherited_resources);

        if is_pages_node(dict) {
            let kids = match reader.resolve_entry(dict, "Kids")? {
                Some(PdfObject::Array(kids)) => kids,
                Some(_) => return Err(LoadError::object(0, "/Kids is not an array")),
                None => {
                    debug!("Pages node without /Kids treated as empty");
                    continue;
                }
            };
            // Reverse so the first kid is visited first
            for kid in kids.iter().rev() {
                stack.push(PendingNode {
                    node: kid,
                    depth: pending.depth + 1,
                    inherited_resources: resources,
                });
            }
            continue;
        }

        if pages.len() >= options.max_pages {
            return Err(LoadError::StructuralLimitExceeded(format!(
                "document has more than {} pages",
                options.max_pages
            )));
        }

        let resources = match resources {
            Some(resources) => reader.resolve_dict(resources)?.clone(),
            None => PdfDictionary::new(),
        };
        pages.push(ParsedPage {
            number: pages.len() as u32 + 1,
            obj_ref,
            dict: dict.clone(),
            resources,
        });
    }

    debug!("Page tree contains {} pages", pages.len());
    Ok(pages)
}

/// `/Type /Pages`, or no usable `/Type` but a `/Kids` entry
fn is_pages_node(dict: &PdfDictionary) -> bool {
    match dict.get_type() {
        Some("Pages") => true,
        Some("Page") => false,
        _ => dict.contains_key("Kids"),
    }
}
