//! PDF Object Stream Parser
//!
//! Handles compressed objects stored in object streams (PDF 1.5+, ISO 32000-1 Section 7.5.7)

use super::lexer::{Lexer, Token};
use super::objects::{ObjectParser, PdfDictionary, PdfObject};
use crate::error::{LoadError, Result};

/// Objects of one decoded object stream, in stream order
#[derive(Debug, Clone)]
pub struct ObjectStream {
    entries: Vec<(u32, Result<PdfObject>)>,
}

impl ObjectStream {
    /// Parse an object stream from its dictionary and decoded data
    pub fn parse(dict: &PdfDictionary, data: &[u8], max_depth: usize) -> Result<Self> {
        let n = dict
            .get("N")
            .and_then(PdfObject::as_integer)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| LoadError::object(0, "Object stream without /N"))?;
        let first = dict
            .get("First")
            .and_then(PdfObject::as_integer)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| LoadError::object(0, "Object stream without /First"))?;

        // Header: N pairs of "object-number offset"
        let mut lexer = Lexer::new(data);
        let mut header = Vec::with_capacity(n.min(data.len()));
        for _ in 0..n {
            match (lexer.next_token()?, lexer.next_token()?) {
                (Token::Integer(number), Token::Integer(offset)) => {
                    let number = u32::try_from(number)
                        .map_err(|_| LoadError::object(lexer.position(), "Bad object number"))?;
                    let offset = usize::try_from(offset)
                        .map_err(|_| LoadError::object(lexer.position(), "Bad object offset"))?;
                    header.push((number, offset));
                }
                _ => {
                    return Err(LoadError::object(
                        lexer.position(),
                        "Malformed object stream header",
                    ))
                }
            }
        }

        let entries = header
            .into_iter()
            .map(|(number, offset)| {
                let object = ObjectParser::at(data, first.saturating_add(offset))
                    .with_max_depth(max_depth)
                    .parse_object();
                (number, object)
            })
            .collect();

        Ok(ObjectStream { entries })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Object at `index` (the xref stream's type-2 entry field), checked against its number
    pub fn get_by_index(&self, index: usize, number: u32) -> Option<Result<PdfObject>> {
        match self.entries.get(index) {
            Some((n, object)) if *n == number => Some(object.clone()),
            // Index mismatch: fall back to a lookup by number
            _ => self.get(number),
        }
    }

    /// Object by number
    pub fn get(&self, number: u32) -> Option<Result<PdfObject>> {
        self.entries
            .iter()
            .find(|(n, _)| *n == number)
            .map(|(_, object)| object.clone())
    }

    /// Object numbers contained in this stream
    pub fn object_numbers(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.iter().map(|(n, _)| *n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfName;

    fn objstm_dict(n: i64, first: i64) -> PdfDictionary {
        let mut dict = PdfDictionary::new();
        dict.insert("Type", PdfObject::Name(PdfName::new("ObjStm")));
        dict.insert("N", PdfObject::Integer(n));
        dict.insert("First", PdfObject::Integer(first));
        dict
    }

    #[test]
    fn test_parse_object_stream() {
        let data = b"10 0 11 11 << /A 1 >> [1 2 3]";
        let stream = ObjectStream::parse(&objstm_dict(2, 11), data, 16).unwrap();

        assert_eq!(stream.len(), 2);
        let first = stream.get(10).unwrap().unwrap();
        assert_eq!(first.as_dict().unwrap().get("A").unwrap().as_integer(), Some(1));
        let second = stream.get_by_index(1, 11).unwrap().unwrap();
        assert_eq!(second.as_array().unwrap().len(), 3);
        assert_eq!(stream.object_numbers().collect::<Vec<_>>(), vec![10, 11]);
    }

    #[test]
    fn test_index_mismatch_falls_back_to_number() {
        let data = b"10 0 11 2 5 6";
        let stream = ObjectStream::parse(&objstm_dict(2, 10), data, 16).unwrap();
        let object = stream.get_by_index(0, 11).unwrap().unwrap();
        assert_eq!(object.as_integer(), Some(6));
        assert!(stream.get(12).is_none());
    }

    #[test]
    fn test_missing_keys() {
        let mut dict = PdfDictionary::new();
        dict.insert("N", PdfObject::Integer(1));
        assert!(ObjectStream::parse(&dict, b"1 0 null", 16).is_err());
    }

    #[test]
    fn test_damaged_member_is_recorded() {
        let data = b"5 0 6 2 ] 7";
        let stream = ObjectStream::parse(&objstm_dict(2, 8), data, 16).unwrap();
        assert!(matches!(
            stream.get(5).unwrap(),
            Err(LoadError::MalformedObject { .. })
        ));
        assert_eq!(stream.get(6).unwrap().unwrap().as_integer(), Some(7));
    }
}
