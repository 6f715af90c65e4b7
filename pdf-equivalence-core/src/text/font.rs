//! Font resources: display names and text decoding
//!
//! A font's name is taken from `/FontDescriptor /FontName`, then `/BaseFont`, then the
//! resource key. Subset tags such as `ABCDEF+` are kept verbatim.
//!
//! Decoding prefers the `/ToUnicode` CMap, then the simple-font `/Encoding` with its
//! `/Differences`, then the built-in encoding of the Symbol font, and finally maps each
//! byte to the character with the same code point.

use super::cmap::CMap;
use super::encoding::{ByteEncoding, TextEncoding};
use crate::parser::objects::{PdfDictionary, PdfObject};
use crate::parser::reader::PdfReader;
use tracing::warn;

/// Name of a font resource
pub fn font_name(reader: &PdfReader, key: &str, font: Option<&PdfDictionary>) -> String {
    let Some(font) = font else {
        return key.to_string();
    };

    descriptor_font_name(reader, font)
        .or_else(|| descendant(reader, font).and_then(|d| descriptor_font_name(reader, d)))
        .or_else(|| base_font(reader, font))
        .unwrap_or_else(|| key.to_string())
}

fn descriptor_font_name(reader: &PdfReader, font: &PdfDictionary) -> Option<String> {
    let descriptor = reader.resolve_entry(font, "FontDescriptor").ok()??.as_dict()?;
    let name = reader.resolve_entry(descriptor, "FontName").ok()??;
    name.as_name().map(str::to_string)
}

fn base_font(reader: &PdfReader, font: &PdfDictionary) -> Option<String> {
    let name = reader.resolve_entry(font, "BaseFont").ok()??;
    name.as_name().map(str::to_string)
}

/// First entry of a Type0 font's `/DescendantFonts`
fn descendant<'a>(reader: &'a PdfReader, font: &'a PdfDictionary) -> Option<&'a PdfDictionary> {
    let descendants = reader.resolve_entry(font, "DescendantFonts").ok()??.as_array()?;
    reader.resolve_dict(descendants.get(0)?).ok()
}

/// Turns the bytes of a text-showing operator into text for one font
#[derive(Debug, Clone, Default)]
pub struct FontDecoder {
    to_unicode: Option<CMap>,
    encoding: Option<ByteEncoding>,
    composite: bool,
}

impl FontDecoder {
    /// Decoder mapping every byte to the same code point
    pub fn raw() -> Self {
        Self::default()
    }

    /// Build the decoder for a font dictionary.
    ///
    /// Damaged `/ToUnicode` or `/Encoding` entries are skipped and reported in `warnings`.
    pub fn from_font(reader: &PdfReader, font: &PdfDictionary, warnings: &mut Vec<String>) -> Self {
        let composite = font.get("Subtype").and_then(PdfObject::as_name) == Some("Type0");
        let to_unicode = load_to_unicode(reader, font, warnings);
        let encoding = if composite {
            None
        } else {
            simple_encoding(reader, font, warnings)
        };

        Self {
            to_unicode,
            encoding,
            composite,
        }
    }

    pub fn has_to_unicode(&self) -> bool {
        self.to_unicode.is_some()
    }

    pub fn is_composite(&self) -> bool {
        self.composite
    }

    /// Decode the string operand of `Tj`, `TJ`, `'` or `"`
    pub fn decode(&self, bytes: &[u8]) -> String {
        let mut text = String::with_capacity(bytes.len());
        let mut position = 0;

        while position < bytes.len() {
            let rest = &bytes[position..];
            let length = match (&self.to_unicode, self.composite) {
                (Some(cmap), true) => cmap.code_length(rest),
                (None, true) => 2,
                (_, false) => 1,
            }
            .min(rest.len());
            let code = &rest[..length];

            match self.to_unicode.as_ref().and_then(|cmap| cmap.lookup(code)) {
                Some(mapped) => text.push_str(&mapped),
                None => {
                    for &byte in code {
                        text.push(self.decode_byte(byte));
                    }
                }
            }
            position += length;
        }

        text
    }

    fn decode_byte(&self, byte: u8) -> char {
        self.encoding
            .as_ref()
            .and_then(|encoding| encoding.decode_byte(byte))
            .unwrap_or(byte as char)
    }
}

fn load_to_unicode(
    reader: &PdfReader,
    font: &PdfDictionary,
    warnings: &mut Vec<String>,
) -> Option<CMap> {
    let stream = match reader.resolve_entry(font, "ToUnicode") {
        Ok(Some(PdfObject::Stream(stream))) => stream,
        // Names such as /Identity-H carry no mapping
        Ok(_) => return None,
        Err(e) => {
            record(warnings, format!("ToUnicode CMap unavailable: {e}"));
            return None;
        }
    };

    let parsed = reader
        .decode_stream(stream)
        .and_then(|data| CMap::parse(&data));
    match parsed {
        Ok(cmap) if !cmap.is_empty() => Some(cmap),
        Ok(_) => None,
        Err(e) => {
            record(warnings, format!("ToUnicode CMap ignored: {e}"));
            None
        }
    }
}

fn simple_encoding(
    reader: &PdfReader,
    font: &PdfDictionary,
    warnings: &mut Vec<String>,
) -> Option<ByteEncoding> {
    let builtin = builtin_encoding(reader, font);

    match reader.resolve_entry(font, "Encoding") {
        Ok(Some(PdfObject::Name(name))) => match TextEncoding::from_name(name.as_str()) {
            Some(encoding) => Some(ByteEncoding::new(encoding)),
            None => builtin.map(ByteEncoding::new),
        },
        Ok(Some(PdfObject::Dictionary(dict))) => {
            let base = dict
                .get("BaseEncoding")
                .and_then(PdfObject::as_name)
                .and_then(TextEncoding::from_name)
                .or(builtin)
                .unwrap_or(TextEncoding::StandardEncoding);
            let mut encoding = ByteEncoding::new(base);
            match reader.resolve_entry(dict, "Differences") {
                Ok(Some(PdfObject::Array(differences))) => encoding.apply_differences(differences),
                Ok(_) => {}
                Err(e) => record(warnings, format!("Encoding /Differences ignored: {e}")),
            }
            Some(encoding)
        }
        Ok(_) => builtin.map(ByteEncoding::new),
        Err(e) => {
            record(warnings, format!("Font /Encoding ignored: {e}"));
            builtin.map(ByteEncoding::new)
        }
    }
}

/// Built-in encodings of the symbolic base-14 fonts
fn builtin_encoding(reader: &PdfReader, font: &PdfDictionary) -> Option<TextEncoding> {
    let base = base_font(reader, font)?;
    // Subset tags do not change the built-in encoding
    let base = base.split_once('+').map_or(base.as_str(), |(_, name)| name);
    match base {
        "Symbol" => Some(TextEncoding::SymbolEncoding),
        _ => None,
    }
}

fn record(warnings: &mut Vec<String>, message: String) {
    warn!("{}", message);
    warnings.push(message);
}
