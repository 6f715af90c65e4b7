//! PDF Document Reader
//!
//! Loads a complete PDF file: header, cross-reference data, trailer and the catalog
//! of every object reachable from `/Root`. After loading the reader is immutable and
//! only answers lookups.

use super::filters;
use super::object_stream::ObjectStream;
use super::objects::{ObjectParser, ObjectRef, PdfArray, PdfDictionary, PdfObject, PdfStream};
use super::page_tree::{self, ParsedPage};
use super::trailer::PdfTrailer;
use super::xref::{scan_object_headers, XRefEntry, XRefTable};
use super::LoadOptions;
use crate::error::{LoadError, Result};
use std::cell::OnceCell;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// Bytes searched for the `%PDF-` header
const HEADER_SEARCH_LIMIT: usize = 1024;

/// A loaded PDF document
#[derive(Debug)]
pub struct PdfReader {
    version: String,
    trailer: PdfTrailer,
    objects: HashMap<ObjectRef, Result<PdfObject>>,
    options: LoadOptions,
    reconstructed: bool,
}

impl PdfReader {
    /// Open a PDF file from a path
    pub fn open<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_bytes(&data, options)
    }

    /// Load a PDF from memory
    pub fn from_bytes(data: &[u8], options: LoadOptions) -> Result<Self> {
        let version = parse_header(data, &options)?;
        let xref = XRefTable::load(data, &options)?;

        if xref.trailer().is_encrypted() {
            return Err(LoadError::EncryptedDocument);
        }
        let root = xref.trailer().root()?;

        let objects = CatalogLoader::new(data, &xref, &options).load_reachable(root);
        debug!(
            "Loaded PDF {} with {} reachable objects",
            version,
            objects.len()
        );

        Ok(PdfReader {
            version,
            trailer: xref.trailer().clone(),
            objects,
            options,
            reconstructed: xref.is_reconstructed(),
        })
    }

    /// PDF version from the header, e.g. "1.7"
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Whether the cross-reference table had to be rebuilt
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    /// Number of objects in the catalog (including recorded parse failures)
    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// The document catalog (`/Root`)
    pub fn catalog(&self) -> Result<&PdfDictionary> {
        let root = self.trailer.root()?;
        let object = self.resolve(root)?;
        object
            .as_dict()
            .ok_or_else(|| LoadError::object(0, format!("Catalog {root} is not a dictionary")))
    }

    /// Look up an indirect object
    pub fn resolve(&self, id: ObjectRef) -> Result<&PdfObject> {
        match self.objects.get(&id) {
            Some(Ok(object)) => Ok(object),
            Some(Err(failure)) => Err(failure.clone()),
            None => Err(LoadError::UnresolvedReference(id.number, id.generation)),
        }
    }

    /// Follow references until a direct object is reached
    pub fn resolve_object<'a>(&'a self, object: &'a PdfObject) -> Result<&'a PdfObject> {
        let mut current = object;
        let mut hops = 0;
        while let Some(id) = current.as_reference() {
            hops += 1;
            if hops > self.options.max_depth {
                return Err(LoadError::StructuralLimitExceeded(format!(
                    "reference chain through {id} is too long"
                )));
            }
            current = self.resolve(id)?;
        }
        Ok(current)
    }

    /// Resolve an object that must be a dictionary (or a stream's dictionary)
    pub fn resolve_dict<'a>(&'a self, object: &'a PdfObject) -> Result<&'a PdfDictionary> {
        self.resolve_object(object)?
            .as_dict()
            .ok_or_else(|| LoadError::object(0, "Expected a dictionary"))
    }

    /// Resolve a dictionary entry; a missing key is `Ok(None)`
    pub fn resolve_entry<'a>(
        &'a self,
        dict: &'a PdfDictionary,
        key: &str,
    ) -> Result<Option<&'a PdfObject>> {
        dict.get(key).map(|value| self.resolve_object(value)).transpose()
    }

    /// Decode a stream, resolving indirect `/Filter` and `/DecodeParms` values first
    pub fn decode_stream(&self, stream: &PdfStream) -> Result<Vec<u8>> {
        let mut filter_dict = PdfDictionary::new();
        for key in ["Filter", "DecodeParms"] {
            if let Some(value) = self.resolve_entry(&stream.dict, key)? {
                filter_dict.insert(key, self.resolve_array_items(value));
            }
        }
        filters::decode_stream(&stream.data, &filter_dict, self.options.max_stream_size)
    }

    /// Resolve references one level inside an array; unresolvable items become null
    fn resolve_array_items(&self, value: &PdfObject) -> PdfObject {
        match value {
            PdfObject::Array(array) => PdfObject::Array(PdfArray(
                array
                    .iter()
                    .map(|item| self.resolve_object(item).cloned().unwrap_or(PdfObject::Null))
                    .collect(),
            )),
            other => other.clone(),
        }
    }

    /// Pages in document order
    pub fn pages(&self) -> Result<Vec<ParsedPage>> {
        page_tree::collect_pages(self)
    }
}

/// Locate `%PDF-x.y` near the start of the file and return the version
fn parse_header(data: &[u8], options: &LoadOptions) -> Result<String> {
    let window = &data[..data.len().min(HEADER_SEARCH_LIMIT)];
    if let Some(pos) = super::lexer::find_bytes(window, b"%PDF-") {
        let version: String = data[pos + 5..]
            .iter()
            .take_while(|b| b.is_ascii_digit() || **b == b'.')
            .map(|b| *b as char)
            .collect();
        if pos > 0 {
            debug!("PDF header found at offset {}", pos);
        }
        return Ok(version);
    }

    if options.lenient_syntax {
        warn!("Missing %PDF header, continuing");
        Ok(String::new())
    } else {
        Err(LoadError::UnreadableDocument(
            "missing %PDF header".to_string(),
        ))
    }
}

/// Builds the object catalog by walking references from the root
struct CatalogLoader<'a> {
    data: &'a [u8],
    xref: &'a XRefTable,
    options: &'a LoadOptions,
    object_streams: HashMap<u32, Result<ObjectStream>>,
    scanned_offsets: OnceCell<HashMap<u32, usize>>,
}

impl<'a> CatalogLoader<'a> {
    fn new(data: &'a [u8], xref: &'a XRefTable, options: &'a LoadOptions) -> Self {
        Self {
            data,
            xref,
            options,
            object_streams: HashMap::new(),
            scanned_offsets: OnceCell::new(),
        }
    }

    /// Load every object reachable from `root`; each object is loaded once
    fn load_reachable(&mut self, root: ObjectRef) -> HashMap<ObjectRef, Result<PdfObject>> {
        let mut objects: HashMap<ObjectRef, Result<PdfObject>> = HashMap::new();
        let mut pending = vec![root];

        while let Some(id) = pending.pop() {
            if objects.contains_key(&id) {
                continue;
            }
            let result = self.load(id);
            match &result {
                Ok(object) => object.for_each_reference(&mut |r| {
                    if !objects.contains_key(&r) {
                        pending.push(r);
                    }
                }),
                // Missing objects stay absent from the catalog
                Err(LoadError::UnresolvedReference(..)) => continue,
                Err(e) => warn!("Object {} failed to parse: {}", id, e),
            }
            objects.insert(id, result);
        }

        objects
    }

    fn load(&mut self, id: ObjectRef) -> Result<PdfObject> {
        match self.xref.get(id.number) {
            Some(XRefEntry::InUse { offset, generation }) => {
                // The xref entry describes another incarnation of this object number
                if generation != id.generation {
                    if !self.options.lenient_syntax {
                        return Err(LoadError::UnresolvedReference(id.number, id.generation));
                    }
                    warn!("Reference {} resolved to generation {} from the xref", id, generation);
                }
                self.parse_direct(id, offset)
            }
            Some(XRefEntry::Compressed { stream, index }) => {
                if !self.object_streams.contains_key(&stream) {
                    let parsed = self.load_object_stream(stream);
                    self.object_streams.insert(stream, parsed);
                }
                match self.object_streams.get(&stream) {
                    Some(Ok(objects)) => objects
                        .get_by_index(index as usize, id.number)
                        .unwrap_or(Err(LoadError::UnresolvedReference(id.number, id.generation))),
                    Some(Err(e)) => Err(e.clone()),
                    None => Err(LoadError::UnresolvedReference(id.number, id.generation)),
                }
            }
            Some(XRefEntry::Free) | None => {
                Err(LoadError::UnresolvedReference(id.number, id.generation))
            }
        }
    }

    /// Parse `N G obj ... endobj` at `offset`, verifying the header
    fn parse_direct(&self, id: ObjectRef, offset: usize) -> Result<PdfObject> {
        match self.parse_at(offset) {
            Ok((found, object)) if found.number == id.number => Ok(object),
            result => {
                // Wrong offset: look for the real header when recovery is allowed
                if self.options.recover_xref {
                    if let Some(&actual) = self.scanned_offsets().get(&id.number) {
                        if actual != offset {
                            debug!("Object {} found at {} instead of {}", id, actual, offset);
                            return self.parse_at(actual).map(|(_, object)| object);
                        }
                    }
                }
                match result {
                    Ok((found, _)) => Err(LoadError::object(
                        offset,
                        format!("Expected object {id}, found {found}"),
                    )),
                    Err(e) => Err(e),
                }
            }
        }
    }

    fn parse_at(&self, offset: usize) -> Result<(ObjectRef, PdfObject)> {
        let resolve_length = |r: ObjectRef| self.direct_integer(r);
        ObjectParser::at(self.data, offset)
            .with_max_depth(self.options.max_depth)
            .with_lenient(self.options.lenient_syntax)
            .with_length_resolver(&resolve_length)
            .parse_indirect()
    }

    /// Value of an indirect integer such as a stream `/Length`
    fn direct_integer(&self, id: ObjectRef) -> Option<i64> {
        match self.xref.get(id.number)? {
            XRefEntry::InUse { offset, .. } => {
                let (_, object) = ObjectParser::at(self.data, offset).parse_indirect().ok()?;
                object.as_integer()
            }
            _ => None,
        }
    }

    fn scanned_offsets(&self) -> &HashMap<u32, usize> {
        self.scanned_offsets.get_or_init(|| {
            scan_object_headers(self.data)
                .into_iter()
                .map(|(id, offset)| (id.number, offset))
                .collect()
        })
    }

    fn load_object_stream(&self, number: u32) -> Result<ObjectStream> {
        let offset = match self.xref.get(number) {
            Some(XRefEntry::InUse { offset, .. }) => offset,
            _ => return Err(LoadError::UnresolvedReference(number, 0)),
        };
        let object = self.parse_direct(ObjectRef::new(number, 0), offset)?;
        let stream = object
            .as_stream()
            .ok_or_else(|| LoadError::object(offset, format!("Object {number} is not an object stream")))?;
        let data = filters::decode_stream(&stream.data, &stream.dict, self.options.max_stream_size)?;
        ObjectStream::parse(&stream.dict, &data, self.options.max_depth)
    }
}
