//! PDF Trailer Parser
//!
//! Parses PDF trailer according to ISO 32000-1 Section 7.5.5

use super::lexer::{find_bytes, Lexer, Token};
use super::objects::{ObjectParser, ObjectRef, PdfDictionary, PdfObject};
use crate::error::{LoadError, Result};

/// PDF Trailer information
#[derive(Debug, Clone, Default)]
pub struct PdfTrailer {
    /// The trailer dictionary
    pub dict: PdfDictionary,
}

impl PdfTrailer {
    pub fn from_dict(dict: PdfDictionary) -> Self {
        PdfTrailer { dict }
    }

    /// Parse `trailer << ... >>` starting at `offset`
    pub fn parse_at(data: &[u8], offset: usize) -> Result<Self> {
        let mut lexer = Lexer::at(data, offset);
        let keyword_pos = lexer.position();
        if !lexer.next_token()?.is_keyword("trailer") {
            return Err(LoadError::object(keyword_pos, "Expected 'trailer'"));
        }
        let mut parser = ObjectParser::from_lexer(lexer);
        match parser.parse_object()? {
            PdfObject::Dictionary(dict) => Ok(Self::from_dict(dict)),
            _ => Err(LoadError::object(offset, "Trailer is not a dictionary")),
        }
    }

    /// Get the root object reference (document catalog)
    pub fn root(&self) -> Result<ObjectRef> {
        self.dict
            .get("Root")
            .and_then(PdfObject::as_reference)
            .ok_or_else(|| LoadError::UnreadableDocument("trailer has no /Root".to_string()))
    }

    pub fn has_root(&self) -> bool {
        self.root().is_ok()
    }

    /// Check if this PDF is encrypted
    pub fn is_encrypted(&self) -> bool {
        self.dict
            .get("Encrypt")
            .is_some_and(|value| !value.is_null())
    }

    /// Byte offset of the previous xref section
    pub fn prev(&self) -> Option<usize> {
        offset_entry(&self.dict, "Prev")
    }

    /// Byte offset of the xref stream of a hybrid-reference file
    pub fn xref_stm(&self) -> Option<usize> {
        offset_entry(&self.dict, "XRefStm")
    }

    /// Fill keys missing here from an older trailer of an incremental update chain
    pub fn merge_older(&mut self, older: &PdfDictionary) {
        for (key, value) in older.iter() {
            if matches!(key, "Prev" | "XRefStm") {
                continue;
            }
            if !self.dict.contains_key(key) {
                self.dict.insert(key, value.clone());
            }
        }
    }

    pub fn dict(&self) -> &PdfDictionary {
        &self.dict
    }
}

fn offset_entry(dict: &PdfDictionary, key: &str) -> Option<usize> {
    dict.get(key)
        .and_then(PdfObject::as_integer)
        .and_then(|i| usize::try_from(i).ok())
}

/// Locate the last `trailer` dictionary in the file that names a `/Root`
pub fn find_last_trailer(data: &[u8]) -> Option<PdfTrailer> {
    let mut found = None;
    let mut search_from = 0;
    while let Some(relative) = find_bytes(&data[search_from..], b"trailer") {
        let pos = search_from + relative;
        if let Ok(trailer) = PdfTrailer::parse_at(data, pos) {
            if trailer.has_root() {
                found = Some(trailer);
            }
        }
        search_from = pos + b"trailer".len();
    }
    found
}

/// Read the offset following the last `startxref` keyword
pub fn find_startxref(data: &[u8]) -> Option<usize> {
    let mut lexer = Lexer::new(data);
    let keyword = lexer.rfind(b"startxref")?;
    lexer.seek(keyword + b"startxref".len());
    match lexer.next_token() {
        Ok(Token::Integer(offset)) => usize::try_from(offset).ok(),
        _ => None,
    }
}
