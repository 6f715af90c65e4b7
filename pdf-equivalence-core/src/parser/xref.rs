//! PDF Cross-Reference Parser
//!
//! Parses xref tables and xref streams according to ISO 32000-1 Sections 7.5.4 and 7.5.8,
//! follows `/Prev` chains of incremental updates and rebuilds the table by scanning the
//! file when the stored one is unusable.

use super::filters;
use super::lexer::{find_bytes, is_regular, is_whitespace, Lexer, Token};
use super::object_stream::ObjectStream;
use super::objects::{ObjectParser, ObjectRef, PdfDictionary, PdfObject, PdfStream};
use super::trailer::{find_last_trailer, find_startxref, PdfTrailer};
use super::LoadOptions;
use crate::error::{LoadError, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Cross-reference entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Free (deleted) object
    Free,
    /// Object stored directly in the file at a byte offset
    InUse { offset: usize, generation: u16 },
    /// Object stored inside an object stream
    Compressed { stream: u32, index: u32 },
}

/// One xref section: its entries and its trailer dictionary
#[derive(Debug, Clone)]
struct XRefSection {
    entries: Vec<(u32, XRefEntry)>,
    trailer: PdfTrailer,
}

/// Cross-reference table merged over all sections of a file
#[derive(Debug, Clone, Default)]
pub struct XRefTable {
    entries: BTreeMap<u32, XRefEntry>,
    trailer: PdfTrailer,
    reconstructed: bool,
}

impl XRefTable {
    /// Read the cross-reference data of a file.
    ///
    /// Starts at `startxref`; falls back to reconstruction when allowed by `options`.
    pub fn load(data: &[u8], options: &LoadOptions) -> Result<Self> {
        match find_startxref(data) {
            Some(offset) => match Self::load_chain(data, offset, options) {
                Ok(table) if table.trailer.has_root() => return Ok(table),
                Ok(_) => warn!("Cross-reference trailer has no /Root"),
                Err(e) => warn!("Cannot read cross-reference data at {}: {}", offset, e),
            },
            None => debug!("No startxref marker found"),
        }

        if options.recover_xref {
            Self::reconstruct(data, options)
        } else {
            Err(LoadError::UnreadableDocument(
                "no valid cross-reference table or trailer".to_string(),
            ))
        }
    }

    /// Follow the section at `start` and every older section linked through `/Prev`
    fn load_chain(data: &[u8], start: usize, options: &LoadOptions) -> Result<Self> {
        let mut table = XRefTable::default();
        let mut visited = HashSet::new();
        let mut next = Some(start);
        let mut newest = true;

        while let Some(offset) = next {
            if !visited.insert(offset) {
                warn!("Cross-reference /Prev loop at offset {}", offset);
                break;
            }
            let section = match parse_section(data, offset, options) {
                Ok(section) => section,
                Err(e) if !newest => {
                    warn!("Ignoring unreadable older xref section at {}: {}", offset, e);
                    break;
                }
                Err(e) => return Err(e),
            };

            // Hybrid-reference files: the stream's entries take precedence over the table's
            if let Some(stm_offset) = section.trailer.xref_stm() {
                if visited.insert(stm_offset) {
                    match parse_section(data, stm_offset, options) {
                        Ok(stm) => table.merge_entries(stm.entries),
                        Err(e) => warn!("Cannot read /XRefStm at {}: {}", stm_offset, e),
                    }
                }
            }
            table.merge_entries(section.entries);

            if newest {
                table.trailer = section.trailer.clone();
            } else {
                table.trailer.merge_older(section.trailer.dict());
            }
            next = section.trailer.prev();
            newest = false;
        }

        debug!("Loaded {} xref entries from {} section(s)", table.len(), visited.len());
        Ok(table)
    }

    /// Older sections never override entries already known from newer ones
    fn merge_entries(&mut self, entries: Vec<(u32, XRefEntry)>) {
        for (number, entry) in entries {
            self.entries.entry(number).or_insert(entry);
        }
    }

    /// Rebuild the table by scanning the whole file for `N G obj` headers
    pub fn reconstruct(data: &[u8], options: &LoadOptions) -> Result<Self> {
        let headers = scan_object_headers(data);
        if headers.is_empty() {
            return Err(LoadError::UnreadableDocument(
                "no trailer and no objects found".to_string(),
            ));
        }
        warn!("Reconstructing cross-reference table from {} object headers", headers.len());

        let mut table = XRefTable {
            reconstructed: true,
            ..Default::default()
        };
        // Later definitions (incremental updates) win
        for (id, offset) in &headers {
            table.entries.insert(
                id.number,
                XRefEntry::InUse {
                    offset: *offset,
                    generation: id.generation,
                },
            );
        }

        let offsets: HashMap<u32, usize> = headers.iter().map(|(id, off)| (id.number, *off)).collect();
        let resolve_length = |id: ObjectRef| -> Option<i64> {
            let offset = *offsets.get(&id.number)?;
            let (_, object) = ObjectParser::at(data, offset).parse_indirect().ok()?;
            object.as_integer()
        };

        let mut stream_trailer = None;
        let mut compressed = Vec::new();
        for (id, offset) in &headers {
            let parsed = ObjectParser::at(data, *offset)
                .with_max_depth(options.max_depth)
                .with_length_resolver(&resolve_length)
                .parse_indirect();
            let object = match parsed {
                Ok((_, object)) => object,
                Err(_) => continue,
            };
            match object.as_dict().and_then(PdfDictionary::get_type) {
                Some("XRef") if object.as_dict().is_some_and(|d| d.contains_key("Root")) => {
                    stream_trailer = object.as_dict().cloned();
                }
                Some("ObjStm") => {
                    if let PdfObject::Stream(stream) = &object {
                        if let Some(numbers) = object_stream_members(stream, options) {
                            compressed.extend(numbers.into_iter().enumerate().map(
                                |(index, number)| (number, id.number, index as u32),
                            ));
                        }
                    }
                }
                _ => {}
            }
        }
        for (number, stream, index) in compressed {
            table
                .entries
                .entry(number)
                .or_insert(XRefEntry::Compressed { stream, index });
        }

        // Only a real trailer dictionary is accepted, never a bare catalog
        table.trailer = if let Some(trailer) = find_last_trailer(data) {
            trailer
        } else if let Some(dict) = stream_trailer {
            PdfTrailer::from_dict(dict)
        } else {
            return Err(LoadError::UnreadableDocument(
                "no trailer dictionary found".to_string(),
            ));
        };

        Ok(table)
    }

    /// Get an entry by object number
    pub fn get(&self, number: u32) -> Option<XRefEntry> {
        self.entries.get(&number).copied()
    }

    pub fn trailer(&self) -> &PdfTrailer {
        &self.trailer
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the table was rebuilt by scanning instead of read from the file
    pub fn is_reconstructed(&self) -> bool {
        self.reconstructed
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, XRefEntry)> + '_ {
        self.entries.iter().map(|(n, e)| (*n, *e))
    }
}

/// Parse the xref section at `offset`: either a classic table or an xref stream object
fn parse_section(data: &[u8], offset: usize, options: &LoadOptions) -> Result<XRefSection> {
    if offset >= data.len() {
        return Err(LoadError::UnreadableDocument(format!(
            "startxref offset {offset} beyond end of file"
        )));
    }
    let mut lexer = Lexer::at(data, offset);
    lexer.skip_whitespace();
    let start = lexer.position();

    if lexer.remaining().starts_with(b"xref") {
        return parse_table(data, start + b"xref".len());
    }

    let (id, object) = ObjectParser::at(data, start)
        .with_max_depth(options.max_depth)
        .with_lenient(options.lenient_syntax)
        .parse_indirect()?;
    match object {
        PdfObject::Stream(stream) if stream.dict.get_type() == Some("XRef") => {
            let entries = parse_xref_stream(&stream, options.max_stream_size)?;
            Ok(XRefSection {
                entries,
                trailer: PdfTrailer::from_dict(stream.dict),
            })
        }
        _ => Err(LoadError::object(
            start,
            format!("Object {id} at startxref is not an xref stream"),
        )),
    }
}

/// Parse classic xref subsections up to and including the trailer dictionary
fn parse_table(data: &[u8], offset: usize) -> Result<XRefSection> {
    let mut lexer = Lexer::at(data, offset);
    let mut entries = Vec::new();

    loop {
        lexer.skip_whitespace();
        let position = lexer.position();
        match lexer.next_token()? {
            Token::Keyword(k) if k == "trailer" => {
                let trailer = PdfTrailer::parse_at(data, position)?;
                return Ok(XRefSection { entries, trailer });
            }
            Token::Integer(first) => {
                let count = match lexer.next_token()? {
                    Token::Integer(count) if count >= 0 => count,
                    _ => return Err(LoadError::object(position, "Bad xref subsection header")),
                };
                let first = u32::try_from(first)
                    .map_err(|_| LoadError::object(position, "Bad xref subsection start"))?;
                parse_subsection(&mut lexer, first, count, &mut entries)?;
            }
            other => {
                return Err(LoadError::object(
                    position,
                    format!("Unexpected {other:?} in xref table"),
                ))
            }
        }
    }
}

fn parse_subsection(
    lexer: &mut Lexer<'_>,
    first: u32,
    count: i64,
    entries: &mut Vec<(u32, XRefEntry)>,
) -> Result<()> {
    let mut first = first;
    for i in 0..count {
        let position = lexer.position();
        let (offset, generation, kind) =
            match (lexer.next_token()?, lexer.next_token()?, lexer.next_token()?) {
                (Token::Integer(o), Token::Integer(g), Token::Keyword(k)) => (o, g, k),
                _ => return Err(LoadError::object(position, "Malformed xref entry")),
            };

        // Writers that number the first subsection from 1 but still emit the free head
        if i == 0 && first == 1 && kind == "f" && generation == 65535 {
            first = 0;
        }
        let number = first.saturating_add(i as u32);

        let entry = match kind.as_str() {
            "n" if offset > 0 => XRefEntry::InUse {
                offset: usize::try_from(offset)
                    .map_err(|_| LoadError::object(position, "Negative xref offset"))?,
                generation: u16::try_from(generation).unwrap_or(u16::MAX),
            },
            "n" | "f" => XRefEntry::Free,
            _ => return Err(LoadError::object(position, format!("Bad xref entry type '{kind}'"))),
        };
        entries.push((number, entry));
    }
    Ok(())
}

fn integer_array(dict: &PdfDictionary, key: &str) -> Option<Vec<i64>> {
    dict.get(key)?
        .as_array()?
        .iter()
        .map(PdfObject::as_integer)
        .collect()
}

/// Decode the binary entries of an xref stream (`/W`, `/Index`, `/Size`)
fn parse_xref_stream(stream: &PdfStream, max_size: usize) -> Result<Vec<(u32, XRefEntry)>> {
    let dict = &stream.dict;
    let widths = integer_array(dict, "W")
        .filter(|w| w.len() == 3 && w.iter().all(|v| (0..=8).contains(v)))
        .ok_or_else(|| LoadError::object(0, "Xref stream /W must hold three small integers"))?;
    let widths: Vec<usize> = widths.into_iter().map(|w| w as usize).collect();

    let size = dict.get("Size").and_then(PdfObject::as_integer).unwrap_or(0);
    let index = integer_array(dict, "Index").unwrap_or_else(|| vec![0, size]);
    if index.len() % 2 != 0 {
        return Err(LoadError::object(0, "Xref stream /Index has odd length"));
    }

    let data = filters::decode_stream(&stream.data, dict, max_size)?;
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(LoadError::object(0, "Xref stream rows are empty"));
    }
    let mut rows = data.chunks_exact(row_len);
    let mut entries = Vec::new();

    for pair in index.chunks(2) {
        let (first, count) = (pair[0], pair[1]);
        for i in 0..count.max(0) {
            let row = match rows.next() {
                Some(row) => row,
                None => {
                    warn!("Xref stream data truncated");
                    return Ok(entries);
                }
            };
            let Some(number) = first.checked_add(i).and_then(|n| u32::try_from(n).ok()) else {
                continue;
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            // A zero-width type field defaults to type 1
            let kind = if widths[0] == 0 { 1 } else { read_field(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::InUse {
                    offset: read_field(f2) as usize,
                    generation: u16::try_from(read_field(f3)).unwrap_or(u16::MAX),
                },
                2 => XRefEntry::Compressed {
                    stream: read_field(f2) as u32,
                    index: read_field(f3) as u32,
                },
                // Unknown types are references to the null object
                _ => XRefEntry::Free,
            };
            entries.push((number, entry));
        }
    }

    Ok(entries)
}

/// Big-endian field of the given width
fn read_field(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, b| (acc << 8) | *b as u64)
}

/// Decode an object stream just far enough to list its member object numbers
fn object_stream_members(stream: &PdfStream, options: &LoadOptions) -> Option<Vec<u32>> {
    let data = filters::decode_stream(&stream.data, &stream.dict, options.max_stream_size).ok()?;
    let parsed = ObjectStream::parse(&stream.dict, &data, options.max_depth).ok()?;
    Some(parsed.object_numbers().collect())
}

/// Find every `N G obj` header in file order
pub fn scan_object_headers(data: &[u8]) -> Vec<(ObjectRef, usize)> {
    let mut found = Vec::new();
    let mut cursor = 0;

    while let Some(relative) = find_bytes(&data[cursor..], b"obj") {
        let at = cursor + relative;
        cursor = at + 3;
        if data.get(at + 3).is_some_and(|b| is_regular(*b)) {
            continue;
        }
        if let Some((id, start)) = header_before(data, at) {
            found.push((id, start));
        }
    }

    found
}

/// Walk backwards from `obj` over `<ws> gen <ws> num`
fn header_before(data: &[u8], keyword: usize) -> Option<(ObjectRef, usize)> {
    let mut p = keyword;
    let skip_ws = |p: &mut usize| {
        let end = *p;
        while *p > 0 && is_whitespace(data[*p - 1]) {
            *p -= 1;
        }
        *p != end
    };
    let skip_digits = |p: &mut usize| {
        let end = *p;
        while *p > 0 && data[*p - 1].is_ascii_digit() {
            *p -= 1;
        }
        (*p != end).then_some((*p, end))
    };

    if !skip_ws(&mut p) {
        return None;
    }
    let (gen_start, gen_end) = skip_digits(&mut p)?;
    if !skip_ws(&mut p) {
        return None;
    }
    let (num_start, num_end) = skip_digits(&mut p)?;
    if num_start > 0 && is_regular(data[num_start - 1]) {
        return None;
    }

    let number: u32 = std::str::from_utf8(&data[num_start..num_end]).ok()?.parse().ok()?;
    let generation: u16 = std::str::from_utf8(&data[gen_start..gen_end]).ok()?.parse().ok()?;
    Some((ObjectRef::new(number, generation), num_start))
}
