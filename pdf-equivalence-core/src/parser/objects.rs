//! PDF Object Parser
//!
//! Parses PDF objects from tokens according to ISO 32000-1 Section 7.3.
//! `N G R` triples are folded into references here, the lexer never tags them.

use super::lexer::{find_bytes, Lexer, Token};
use crate::error::{LoadError, Result};
use indexmap::IndexMap;
use std::borrow::Borrow;
use std::fmt;

/// Default nesting limit for arrays and dictionaries
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Indirect object identifier: object number and generation.
///
/// This is only ever a lookup key into the object catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub number: u32,
    pub generation: u16,
}

impl ObjectRef {
    pub fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// PDF Name object
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PdfName(pub String);

impl PdfName {
    pub fn new(name: impl Into<String>) -> Self {
        PdfName(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for PdfName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// PDF String object (raw bytes, literal or hexadecimal)
#[derive(Debug, Clone, PartialEq)]
pub struct PdfString(pub Vec<u8>);

impl PdfString {
    pub fn new(data: Vec<u8>) -> Self {
        PdfString(data)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

/// PDF Array object
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfArray(pub Vec<PdfObject>);

impl PdfArray {
    pub fn new() -> Self {
        PdfArray(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&PdfObject> {
        self.0.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PdfObject> {
        self.0.iter()
    }
}

/// PDF Dictionary object.
///
/// Keys keep their parse order so that enumerating resources is deterministic.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PdfDictionary(pub IndexMap<PdfName, PdfObject>);

impl PdfDictionary {
    pub fn new() -> Self {
        PdfDictionary(IndexMap::new())
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&PdfObject> {
        self.0.get(key)
    }

    /// Insert a key-value pair, replacing an earlier value in place
    pub fn insert(&mut self, key: impl Into<String>, value: PdfObject) {
        self.0.insert(PdfName(key.into()), value);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PdfObject)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the dictionary type (value of /Type key)
    pub fn get_type(&self) -> Option<&str> {
        self.get("Type").and_then(PdfObject::as_name)
    }
}

/// PDF Stream object: dictionary plus the raw (still encoded) bytes
#[derive(Debug, Clone, PartialEq)]
pub struct PdfStream {
    pub dict: PdfDictionary,
    pub data: Vec<u8>,
}

impl PdfStream {
    /// Get the raw (possibly compressed) stream data
    pub fn raw_data(&self) -> &[u8] {
        &self.data
    }
}

/// PDF Object types
#[derive(Debug, Clone, PartialEq)]
pub enum PdfObject {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    String(PdfString),
    Name(PdfName),
    Array(PdfArray),
    Dictionary(PdfDictionary),
    Stream(PdfStream),
    Reference(u32, u16),
}

impl PdfObject {
    pub fn is_null(&self) -> bool {
        matches!(self, PdfObject::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PdfObject::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            PdfObject::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric value; integers are widened
    pub fn as_real(&self) -> Option<f64> {
        match self {
            PdfObject::Real(r) => Some(*r),
            PdfObject::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_string(&self) -> Option<&PdfString> {
        match self {
            PdfObject::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_name(&self) -> Option<&str> {
        match self {
            PdfObject::Name(n) => Some(n.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&PdfArray> {
        match self {
            PdfObject::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Dictionary view; a stream exposes its stream dictionary
    pub fn as_dict(&self) -> Option<&PdfDictionary> {
        match self {
            PdfObject::Dictionary(d) => Some(d),
            PdfObject::Stream(s) => Some(&s.dict),
            _ => None,
        }
    }

    pub fn as_stream(&self) -> Option<&PdfStream> {
        match self {
            PdfObject::Stream(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_reference(&self) -> Option<ObjectRef> {
        match self {
            PdfObject::Reference(obj, gen) => Some(ObjectRef::new(*obj, *gen)),
            _ => None,
        }
    }

    /// Calls `f` for every reference nested anywhere inside this object
    pub fn for_each_reference(&self, f: &mut dyn FnMut(ObjectRef)) {
        match self {
            PdfObject::Reference(obj, gen) => f(ObjectRef::new(*obj, *gen)),
            PdfObject::Array(array) => {
                for item in array.iter() {
                    item.for_each_reference(f);
                }
            }
            PdfObject::Dictionary(dict) => {
                for (_, value) in dict.iter() {
                    value.for_each_reference(f);
                }
            }
            PdfObject::Stream(stream) => {
                for (_, value) in stream.dict.iter() {
                    value.for_each_reference(f);
                }
            }
            _ => {}
        }
    }
}

/// Object parser over a [`Lexer`].
///
/// Returns one [`PdfObject`] per call. Indirect `/Length` values of streams are
/// looked up through an optional resolver supplied by the document loader.
pub struct ObjectParser<'a, 'r> {
    lexer: Lexer<'a>,
    max_depth: usize,
    depth: usize,
    lenient: bool,
    length_resolver: Option<&'r dyn Fn(ObjectRef) -> Option<i64>>,
}

impl<'a, 'r> ObjectParser<'a, 'r> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::from_lexer(Lexer::new(data))
    }

    /// Parser positioned at a byte offset
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self::from_lexer(Lexer::at(data, offset))
    }

    pub fn from_lexer(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            max_depth: DEFAULT_MAX_DEPTH,
            depth: 0,
            lenient: true,
            length_resolver: None,
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// In lenient mode a wrong stream `/Length` falls back to scanning for `endstream`
    pub fn with_lenient(mut self, lenient: bool) -> Self {
        self.lenient = lenient;
        self
    }

    pub fn with_length_resolver(mut self, resolver: &'r dyn Fn(ObjectRef) -> Option<i64>) -> Self {
        self.length_resolver = Some(resolver);
        self
    }

    pub fn lexer(&mut self) -> &mut Lexer<'a> {
        &mut self.lexer
    }

    pub fn position(&self) -> usize {
        self.lexer.position()
    }

    /// Parse the next object
    pub fn parse_object(&mut self) -> Result<PdfObject> {
        let position = self.lexer.position();
        let token = self.lexer.next_token()?;
        self.parse_object_from(token, position)
    }

    /// Parse an object whose first token has already been read at `position`
    pub fn parse_object_from(&mut self, token: Token, position: usize) -> Result<PdfObject> {
        self.depth = 0;
        self.parse_value(token, position)
    }

    fn parse_value(&mut self, token: Token, position: usize) -> Result<PdfObject> {
        match token {
            Token::Null => Ok(PdfObject::Null),
            Token::Boolean(b) => Ok(PdfObject::Boolean(b)),
            Token::Integer(i) => Ok(self.integer_or_reference(i)),
            Token::Real(r) => Ok(PdfObject::Real(r)),
            Token::LiteralString(s) | Token::HexString(s) => Ok(PdfObject::String(PdfString(s))),
            Token::Name(n) => Ok(PdfObject::Name(PdfName(n))),
            Token::ArrayStart => self.parse_array(position),
            Token::DictStart => self.parse_dictionary_or_stream(position),
            Token::ArrayEnd => Err(LoadError::object(position, "Unbalanced ]")),
            Token::DictEnd => Err(LoadError::object(position, "Unbalanced >>")),
            Token::Keyword(k) => Err(LoadError::object(
                position,
                format!("Unexpected keyword '{k}'"),
            )),
            Token::Eof => Err(LoadError::object(position, "Unexpected end of input")),
        }
    }

    /// Parse `N G obj <object> endobj`
    pub fn parse_indirect(&mut self) -> Result<(ObjectRef, PdfObject)> {
        let start = self.lexer.position();
        let header = self.parse_indirect_header()?;
        let object = self.parse_object()?;

        let end = self.lexer.position();
        let has_endobj = matches!(self.lexer.next_token(), Ok(ref t) if t.is_keyword("endobj"));
        if !has_endobj {
            if !self.lenient {
                return Err(LoadError::object(start, format!("Missing endobj for {header}")));
            }
            self.lexer.seek(end);
        }
        Ok((header, object))
    }

    /// Parse the `N G obj` header only
    pub fn parse_indirect_header(&mut self) -> Result<ObjectRef> {
        self.lexer.skip_whitespace();
        let start = self.lexer.position();
        let number = self.lexer.next_token()?;
        let generation = self.lexer.next_token()?;
        let keyword = self.lexer.next_token()?;
        match (number, generation, keyword) {
            (Token::Integer(n), Token::Integer(g), kw) if kw.is_keyword("obj") => {
                match (u32::try_from(n), u16::try_from(g)) {
                    (Ok(n), Ok(g)) => Ok(ObjectRef::new(n, g)),
                    _ => Err(LoadError::object(start, "Object header out of range")),
                }
            }
            _ => Err(LoadError::object(start, "Expected 'N G obj' header")),
        }
    }

    fn enter(&mut self, position: usize) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(LoadError::StructuralLimitExceeded(format!(
                "object nesting deeper than {} at byte {position}",
                self.max_depth
            )));
        }
        Ok(())
    }

    fn integer_or_reference(&mut self, value: i64) -> PdfObject {
        let saved = self.lexer.position();
        if let Ok(number) = u32::try_from(value) {
            if let Ok(Token::Integer(gen)) = self.lexer.next_token() {
                if let Ok(generation) = u16::try_from(gen) {
                    if matches!(self.lexer.next_token(), Ok(ref t) if t.is_keyword("R")) {
                        return PdfObject::Reference(number, generation);
                    }
                }
            }
        }
        self.lexer.seek(saved);
        PdfObject::Integer(value)
    }

    fn parse_array(&mut self, start: usize) -> Result<PdfObject> {
        self.enter(start)?;
        let mut elements = Vec::new();

        loop {
            let position = self.lexer.position();
            match self.lexer.next_token()? {
                Token::ArrayEnd => break,
                Token::Eof => return Err(LoadError::object(start, "Unterminated array")),
                token => elements.push(self.parse_value(token, position)?),
            }
        }

        self.depth -= 1;
        Ok(PdfObject::Array(PdfArray(elements)))
    }

    fn parse_dictionary_or_stream(&mut self, start: usize) -> Result<PdfObject> {
        let dict = self.parse_dictionary_body(start)?;

        let after_dict = self.lexer.position();
        match self.lexer.next_token() {
            Ok(token) if token.is_keyword("stream") => {
                let data = self.parse_stream_data(&dict, start)?;
                Ok(PdfObject::Stream(PdfStream { dict, data }))
            }
            _ => {
                self.lexer.seek(after_dict);
                Ok(PdfObject::Dictionary(dict))
            }
        }
    }

    /// Parse dictionary entries after `<<` up to and including `>>`
    fn parse_dictionary_body(&mut self, start: usize) -> Result<PdfDictionary> {
        self.enter(start)?;
        let mut dict = PdfDictionary::new();

        loop {
            let position = self.lexer.position();
            match self.lexer.next_token()? {
                Token::DictEnd => break,
                Token::Name(key) => {
                    let value_position = self.lexer.position();
                    let value_token = self.lexer.next_token()?;
                    if value_token == Token::DictEnd && self.lenient {
                        // `/Key >>`: treat the missing value as null
                        dict.insert(key, PdfObject::Null);
                        break;
                    }
                    let value = self.parse_value(value_token, value_position)?;
                    dict.insert(key, value);
                }
                Token::Eof => return Err(LoadError::object(start, "Unterminated dictionary")),
                other => {
                    return Err(LoadError::object(
                        position,
                        format!("Expected dictionary key, found {other:?}"),
                    ))
                }
            }
        }

        self.depth -= 1;
        Ok(dict)
    }

    fn stream_length(&self, dict: &PdfDictionary) -> Option<usize> {
        let length = match dict.get("Length")? {
            PdfObject::Integer(len) => *len,
            PdfObject::Reference(obj, gen) => {
                let resolver = self.length_resolver?;
                resolver(ObjectRef::new(*obj, *gen))?
            }
            _ => return None,
        };
        usize::try_from(length).ok()
    }

    fn parse_stream_data(&mut self, dict: &PdfDictionary, start: usize) -> Result<Vec<u8>> {
        self.lexer.skip_eol();
        let data_start = self.lexer.position();

        if let Some(length) = self.stream_length(dict) {
            if let Ok(bytes) = self.lexer.read_bytes(length) {
                let after_data = self.lexer.position();
                if self.lexer.next_token().is_ok_and(|t| t.is_keyword("endstream")) {
                    return Ok(bytes.to_vec());
                }
                self.lexer.seek(after_data);
            }
            if !self.lenient {
                return Err(LoadError::object(start, "Stream /Length does not match data"));
            }
        } else if !self.lenient {
            return Err(LoadError::object(start, "Stream without usable /Length"));
        }

        // Recovery: the data ends at the next `endstream`
        let data = self.lexer.data();
        let end = find_bytes(&data[data_start..], b"endstream")
            .map(|i| i + data_start)
            .ok_or_else(|| LoadError::object(start, "Unterminated stream"))?;
        let mut data_end = end;
        if data_end > data_start && data[data_end - 1] == b'\n' {
            data_end -= 1;
        }
        if data_end > data_start && data[data_end - 1] == b'\r' {
            data_end -= 1;
        }
        tracing::debug!(
            "Recovered stream at byte {} by scanning for endstream ({} bytes)",
            start,
            data_end - data_start
        );
        self.lexer.seek(end + b"endstream".len());
        Ok(data[data_start..data_end].to_vec())
    }
}
