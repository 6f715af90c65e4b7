//! CMap and ToUnicode support for text extraction
//!
//! Implements the parts of ISO 32000-1 Section 9.10.3 (ToUnicode CMaps) that text
//! extraction needs: code space ranges, `bfchar` and `bfrange` mappings (including the
//! array form of `bfrange`), for one- and two-byte codes.

use crate::error::Result;
use crate::parser::lexer::{Lexer, Token};
use std::collections::HashMap;

/// Upper bound on codes expanded from a single `bfrange` array
const MAX_RANGE_EXPANSION: usize = 0x1_0000;

/// Character code range of the code space
#[derive(Debug, Clone, PartialEq)]
pub struct CodeRange {
    pub start: Vec<u8>,
    pub end: Vec<u8>,
}

impl CodeRange {
    /// Check if a code is within this range, byte by byte
    pub fn contains(&self, code: &[u8]) -> bool {
        if code.len() != self.start.len() || code.len() != self.end.len() {
            return false;
        }
        code.iter()
            .zip(self.start.iter().zip(&self.end))
            .all(|(c, (lo, hi))| lo <= c && c <= hi)
    }
}

/// Range mapping: consecutive codes map to consecutive destinations
#[derive(Debug, Clone)]
struct RangeMapping {
    src_start: Vec<u8>,
    src_end: Vec<u8>,
    dst_start: Vec<u8>,
}

/// A parsed ToUnicode CMap
#[derive(Debug, Clone, Default)]
pub struct CMap {
    pub name: Option<String>,
    pub codespace_ranges: Vec<CodeRange>,
    single_mappings: HashMap<Vec<u8>, Vec<u8>>,
    range_mappings: Vec<RangeMapping>,
}

impl CMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a CMap program
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut cmap = Self::new();
        let mut lexer = Lexer::new(data);
        let mut operands: Vec<Token> = Vec::new();

        loop {
            let token = lexer.next_token()?;
            match token {
                Token::Eof => break,
                Token::Keyword(ref kw) => {
                    match kw.as_str() {
                        "begincodespacerange" => cmap.read_codespace(&mut lexer)?,
                        "beginbfchar" => cmap.read_bfchar(&mut lexer)?,
                        "beginbfrange" => cmap.read_bfrange(&mut lexer)?,
                        "def" => {
                            if let [Token::Name(key), Token::Name(value)] = operands.as_slice() {
                                if key == "CMapName" {
                                    cmap.name = Some(value.clone());
                                }
                            }
                        }
                        _ => {}
                    }
                    operands.clear();
                }
                other => {
                    operands.push(other);
                    if operands.len() > 2 {
                        operands.remove(0);
                    }
                }
            }
        }

        Ok(cmap)
    }

    fn read_codespace(&mut self, lexer: &mut Lexer<'_>) -> Result<()> {
        while let Some(start) = next_hex(lexer, "endcodespacerange")? {
            if let Some(end) = next_hex(lexer, "endcodespacerange")? {
                self.codespace_ranges.push(CodeRange { start, end });
            } else {
                break;
            }
        }
        Ok(())
    }

    fn read_bfchar(&mut self, lexer: &mut Lexer<'_>) -> Result<()> {
        while let Some(src) = next_hex(lexer, "endbfchar")? {
            match next_destination(lexer, "endbfchar")? {
                Some(Destination::Bytes(dst)) => {
                    self.single_mappings.insert(src, dst);
                }
                Some(Destination::Array(_)) => {}
                None => break,
            }
        }
        Ok(())
    }

    fn read_bfrange(&mut self, lexer: &mut Lexer<'_>) -> Result<()> {
        while let Some(src_start) = next_hex(lexer, "endbfrange")? {
            let Some(src_end) = next_hex(lexer, "endbfrange")? else {
                break;
            };
            match next_destination(lexer, "endbfrange")? {
                Some(Destination::Bytes(dst_start)) => self.range_mappings.push(RangeMapping {
                    src_start,
                    src_end,
                    dst_start,
                }),
                Some(Destination::Array(destinations)) => {
                    let mut code = src_start;
                    for dst in destinations.into_iter().take(MAX_RANGE_EXPANSION) {
                        if code > src_end {
                            break;
                        }
                        self.single_mappings.insert(code.clone(), dst);
                        code = increment(&code);
                    }
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Destination bytes (UTF-16BE) for a code
    pub fn map(&self, code: &[u8]) -> Option<Vec<u8>> {
        if let Some(dst) = self.single_mappings.get(code) {
            return Some(dst.clone());
        }

        self.range_mappings
            .iter()
            .find(|r| {
                code.len() == r.src_start.len()
                    && code >= r.src_start.as_slice()
                    && code <= r.src_end.as_slice()
            })
            .map(|r| add_offset(&r.dst_start, calculate_offset(code, &r.src_start)))
    }

    /// Unicode text for a code
    pub fn lookup(&self, code: &[u8]) -> Option<String> {
        self.map(code).and_then(|mapped| to_unicode(&mapped))
    }

    /// Length in bytes of the code starting at `bytes[0]`
    pub fn code_length(&self, bytes: &[u8]) -> usize {
        for len in 1..=4.min(bytes.len()) {
            if self.codespace_ranges.iter().any(|r| r.contains(&bytes[..len])) {
                return len;
            }
        }
        self.default_code_length()
    }

    /// Code length when the code space does not cover a code
    fn default_code_length(&self) -> usize {
        self.codespace_ranges
            .iter()
            .map(|r| r.start.len())
            .min()
            .or_else(|| self.single_mappings.keys().map(Vec::len).min())
            .or_else(|| self.range_mappings.iter().map(|r| r.src_start.len()).min())
            .unwrap_or(1)
            .max(1)
    }

    pub fn is_empty(&self) -> bool {
        self.single_mappings.is_empty() && self.range_mappings.is_empty()
    }
}

enum Destination {
    Bytes(Vec<u8>),
    Array(Vec<Vec<u8>>),
}

/// Next hex string, or None once `end` (or the end of input) is reached
fn next_hex(lexer: &mut Lexer<'_>, end: &str) -> Result<Option<Vec<u8>>> {
    loop {
        match lexer.next_token()? {
            Token::HexString(bytes) | Token::LiteralString(bytes) => return Ok(Some(bytes)),
            Token::Eof => return Ok(None),
            token if token.is_keyword(end) => return Ok(None),
            _ => {}
        }
    }
}

fn next_destination(lexer: &mut Lexer<'_>, end: &str) -> Result<Option<Destination>> {
    loop {
        match lexer.next_token()? {
            Token::HexString(bytes) | Token::LiteralString(bytes) => {
                return Ok(Some(Destination::Bytes(bytes)))
            }
            // A glyph name destination
            Token::Name(name) => {
                let bytes = crate::text::encoding::glyph_to_char(&name)
                    .map(|ch| ch.to_string().encode_utf16().flat_map(u16::to_be_bytes).collect())
                    .unwrap_or_default();
                return Ok(Some(Destination::Bytes(bytes)));
            }
            Token::ArrayStart => {
                let mut items = Vec::new();
                loop {
                    match lexer.next_token()? {
                        Token::HexString(bytes) | Token::LiteralString(bytes) => items.push(bytes),
                        Token::ArrayEnd | Token::Eof => break,
                        _ => {}
                    }
                }
                return Ok(Some(Destination::Array(items)));
            }
            Token::Eof => return Ok(None),
            token if token.is_keyword(end) => return Ok(None),
            _ => {}
        }
    }
}

/// Interpret destination bytes as UTF-16BE
pub fn to_unicode(mapped: &[u8]) -> Option<String> {
    if mapped.is_empty() {
        return None;
    }
    if mapped.len() % 2 == 0 {
        let units: Vec<u16> = mapped
            .chunks(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect();
        String::from_utf16(&units).ok()
    } else {
        // Single-byte destinations seen in some producers
        Some(mapped.iter().map(|&b| b as char).collect())
    }
}

/// Calculate offset between two byte arrays
fn calculate_offset(code: &[u8], start: &[u8]) -> u32 {
    let value = |bytes: &[u8]| bytes.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
    value(code).saturating_sub(value(start))
}

/// Add `offset` to the big-endian number in `bytes`, keeping its width
fn add_offset(bytes: &[u8], offset: u32) -> Vec<u8> {
    let mut result = bytes.to_vec();
    let mut carry = offset;
    for byte in result.iter_mut().rev() {
        if carry == 0 {
            break;
        }
        let sum = *byte as u32 + (carry & 0xFF);
        *byte = sum as u8;
        carry = (carry >> 8) + (sum >> 8);
    }
    result
}

fn increment(code: &[u8]) -> Vec<u8> {
    add_offset(code, 1)
}
