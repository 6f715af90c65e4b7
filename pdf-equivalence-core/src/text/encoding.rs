//! Simple font encodings
//!
//! Byte to Unicode tables for the predefined encodings of ISO 32000-1 Annex D,
//! glyph name lookup for `/Differences` arrays, and the built-in encoding of the
//! Symbol font.

use crate::parser::objects::{PdfArray, PdfObject};
use std::collections::HashMap;

/// Predefined encodings of simple fonts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    StandardEncoding,
    MacRomanEncoding,
    WinAnsiEncoding,
    PdfDocEncoding,
    /// Built-in encoding of the Symbol font
    SymbolEncoding,
}

impl TextEncoding {
    /// Encoding for an `/Encoding` or `/BaseEncoding` name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "StandardEncoding" => Some(TextEncoding::StandardEncoding),
            "MacRomanEncoding" => Some(TextEncoding::MacRomanEncoding),
            "WinAnsiEncoding" => Some(TextEncoding::WinAnsiEncoding),
            "PDFDocEncoding" => Some(TextEncoding::PdfDocEncoding),
            _ => None,
        }
    }

    /// Character for a single byte, if the encoding defines one
    pub fn decode_byte(&self, byte: u8) -> Option<char> {
        match self {
            TextEncoding::WinAnsiEncoding => win_ansi(byte),
            TextEncoding::MacRomanEncoding => mac_roman(byte),
            TextEncoding::StandardEncoding => standard(byte),
            TextEncoding::PdfDocEncoding => pdf_doc(byte),
            TextEncoding::SymbolEncoding => symbol(byte),
        }
    }

    /// Decode a byte string; undefined bytes map to the same code point
    pub fn decode(&self, data: &[u8]) -> String {
        data.iter()
            .map(|&byte| self.decode_byte(byte).unwrap_or(byte as char))
            .collect()
    }
}

/// A complete byte to character table: base encoding plus `/Differences`
#[derive(Debug, Clone, PartialEq)]
pub struct ByteEncoding {
    table: Vec<Option<char>>,
}

impl ByteEncoding {
    pub fn new(base: TextEncoding) -> Self {
        Self {
            table: (0..=255u8).map(|b| base.decode_byte(b)).collect(),
        }
    }

    /// Apply a `/Differences` array: `[code /name /name ... code /name ...]`
    ///
    /// Unknown glyph names leave the code undefined.
    pub fn apply_differences(&mut self, differences: &PdfArray) {
        let mut code: Option<usize> = None;
        for item in differences.iter() {
            match item {
                PdfObject::Integer(start) => code = usize::try_from(*start).ok(),
                PdfObject::Name(name) => {
                    if let Some(slot) = code.and_then(|c| self.table.get_mut(c)) {
                        *slot = glyph_to_char(name.as_str());
                    }
                    code = code.map(|c| c + 1);
                }
                _ => {}
            }
        }
    }

    pub fn decode_byte(&self, byte: u8) -> Option<char> {
        self.table.get(byte as usize).copied().flatten()
    }
}

lazy_static::lazy_static! {
    static ref GLYPH_NAMES: HashMap<&'static str, char> = {
        let mut names = HashMap::new();

        for (name, ch) in ASCII_GLYPHS {
            names.insert(*name, *ch);
        }
        for (offset, name) in LATIN1_GLYPHS.iter().enumerate() {
            if let Some(ch) = char::from_u32(0xA1 + offset as u32) {
                names.insert(*name, ch);
            }
        }
        for (name, ch) in EXTRA_GLYPHS {
            names.insert(*name, *ch);
        }

        names
    };
}

/// Unicode character for a glyph name.
///
/// Handles the Adobe glyph list subset used by the standard encodings, `uniXXXX`,
/// `uXXXX[XX]` and single-character names such as `A`.
pub fn glyph_to_char(name: &str) -> Option<char> {
    if let Some(ch) = GLYPH_NAMES.get(name) {
        return Some(*ch);
    }

    // Variants such as "a.sc" or "f_i" fall back to the base name
    let base = name.split('.').next().unwrap_or(name);
    if base != name && !base.is_empty() {
        return glyph_to_char(base);
    }

    if let Some(hex) = name.strip_prefix("uni") {
        if hex.len() >= 4 {
            return u32::from_str_radix(&hex[..4], 16).ok().and_then(char::from_u32);
        }
    }
    if let Some(hex) = name.strip_prefix('u') {
        if (4..=6).contains(&hex.len()) {
            return u32::from_str_radix(hex, 16).ok().and_then(char::from_u32);
        }
    }

    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(ch), None) => Some(ch),
        _ => None,
    }
}

fn win_ansi(byte: u8) -> Option<char> {
    let ch = match byte {
        0x20..=0x7E | 0xA0..=0xFF => byte as char,
        0x80 => '\u{20AC}',
        0x82 => '\u{201A}',
        0x83 => '\u{0192}',
        0x84 => '\u{201E}',
        0x85 => '\u{2026}',
        0x86 => '\u{2020}',
        0x87 => '\u{2021}',
        0x88 => '\u{02C6}',
        0x89 => '\u{2030}',
        0x8A => '\u{0160}',
        0x8B => '\u{2039}',
        0x8C => '\u{0152}',
        0x8E => '\u{017D}',
        0x91 => '\u{2018}',
        0x92 => '\u{2019}',
        0x93 => '\u{201C}',
        0x94 => '\u{201D}',
        0x95 => '\u{2022}',
        0x96 => '\u{2013}',
        0x97 => '\u{2014}',
        0x98 => '\u{02DC}',
        0x99 => '\u{2122}',
        0x9A => '\u{0161}',
        0x9B => '\u{203A}',
        0x9C => '\u{0153}',
        0x9E => '\u{017E}',
        0x9F => '\u{0178}',
        // Control characters pass through so line breaks in strings survive
        0x09 | 0x0A | 0x0D => byte as char,
        _ => return None,
    };
    Some(ch)
}

const MAC_ROMAN_HIGH: [char; 128] = [
    'Ä', 'Å', 'Ç', 'É', 'Ñ', 'Ö', 'Ü', 'á', 'à', 'â', 'ä', 'ã', 'å', 'ç', 'é', 'è', //
    'ê', 'ë', 'í', 'ì', 'î', 'ï', 'ñ', 'ó', 'ò', 'ô', 'ö', 'õ', 'ú', 'ù', 'û', 'ü', //
    '†', '°', '¢', '£', '§', '•', '¶', 'ß', '®', '©', '™', '´', '¨', '≠', 'Æ', 'Ø', //
    '∞', '±', '≤', '≥', '¥', 'µ', '∂', '∑', '∏', 'π', '∫', 'ª', 'º', 'Ω', 'æ', 'ø', //
    '¿', '¡', '¬', '√', 'ƒ', '≈', '∆', '«', '»', '…', '\u{00A0}', 'À', 'Ã', 'Õ', 'Œ', 'œ', //
    '–', '—', '“', '”', '‘', '’', '÷', '◊', 'ÿ', 'Ÿ', '⁄', '¤', '‹', '›', 'ﬁ', 'ﬂ', //
    '‡', '·', '‚', '„', '‰', 'Â', 'Ê', 'Á', 'Ë', 'È', 'Í', 'Î', 'Ï', 'Ì', 'Ó', 'Ô', //
    '\u{F8FF}', 'Ò', 'Ú', 'Û', 'Ù', 'ı', 'ˆ', '˜', '¯', '˘', '˙', '˚', '¸', '˝', '˛', 'ˇ', //
];

fn mac_roman(byte: u8) -> Option<char> {
    match byte {
        0x20..=0x7E | 0x09 | 0x0A | 0x0D => Some(byte as char),
        0x80..=0xFF => Some(MAC_ROMAN_HIGH[(byte - 0x80) as usize]),
        _ => None,
    }
}

fn standard(byte: u8) -> Option<char> {
    let ch = match byte {
        0x27 => '\u{2019}',
        0x60 => '\u{2018}',
        0x20..=0x7E | 0x09 | 0x0A | 0x0D => byte as char,
        0xA1 => '¡',
        0xA2 => '¢',
        0xA3 => '£',
        0xA4 => '⁄',
        0xA5 => '¥',
        0xA6 => 'ƒ',
        0xA7 => '§',
        0xA8 => '¤',
        0xA9 => '\'',
        0xAA => '“',
        0xAB => '«',
        0xAC => '‹',
        0xAD => '›',
        0xAE => 'ﬁ',
        0xAF => 'ﬂ',
        0xB1 => '–',
        0xB2 => '†',
        0xB3 => '‡',
        0xB4 => '·',
        0xB6 => '¶',
        0xB7 => '•',
        0xB8 => '‚',
        0xB9 => '„',
        0xBA => '”',
        0xBB => '»',
        0xBC => '…',
        0xBD => '‰',
        0xBF => '¿',
        0xC1 => '`',
        0xC2 => '´',
        0xC3 => 'ˆ',
        0xC4 => '˜',
        0xC5 => '¯',
        0xC6 => '˘',
        0xC7 => '˙',
        0xC8 => '¨',
        0xCA => '˚',
        0xCB => '¸',
        0xCD => '˝',
        0xCE => '˛',
        0xCF => 'ˇ',
        0xD0 => '—',
        0xE1 => 'Æ',
        0xE3 => 'ª',
        0xE8 => 'Ł',
        0xE9 => 'Ø',
        0xEA => 'Œ',
        0xEB => 'º',
        0xF1 => 'æ',
        0xF5 => 'ı',
        0xF8 => 'ł',
        0xF9 => 'ø',
        0xFA => 'œ',
        0xFB => 'ß',
        _ => return None,
    };
    Some(ch)
}

const PDF_DOC_LOW: [char; 8] = ['˘', 'ˇ', 'ˆ', '˙', '˝', '˛', '˚', '˜'];

const PDF_DOC_HIGH: [char; 31] = [
    '•', '†', '‡', '…', '—', '–', 'ƒ', '⁄', '‹', '›', '−', '‰', '„', '“', '”', '‘', //
    '’', '‚', '™', 'ﬁ', 'ﬂ', 'Ł', 'Œ', 'Š', 'Ÿ', 'Ž', 'ı', 'ł', 'œ', 'š', 'ž',
];

fn pdf_doc(byte: u8) -> Option<char> {
    match byte {
        0x18..=0x1F => Some(PDF_DOC_LOW[(byte - 0x18) as usize]),
        0x80..=0x9E => Some(PDF_DOC_HIGH[(byte - 0x80) as usize]),
        0xA0 => Some('€'),
        0x7F | 0x9F | 0xAD => None,
        0x09 | 0x0A | 0x0D | 0x20..=0xFF => Some(byte as char),
        _ => None,
    }
}

const SYMBOL_UPPER: [char; 26] = [
    'Α', 'Β', 'Χ', 'Δ', 'Ε', 'Φ', 'Γ', 'Η', 'Ι', 'ϑ', 'Κ', 'Λ', 'Μ', 'Ν', 'Ο', 'Π', 'Θ', 'Ρ',
    'Σ', 'Τ', 'Υ', 'ς', 'Ω', 'Ξ', 'Ψ', 'Ζ',
];

const SYMBOL_LOWER: [char; 26] = [
    'α', 'β', 'χ', 'δ', 'ε', 'φ', 'γ', 'η', 'ι', 'ϕ', 'κ', 'λ', 'μ', 'ν', 'ο', 'π', 'θ', 'ρ',
    'σ', 'τ', 'υ', 'ϖ', 'ω', 'ξ', 'ψ', 'ζ',
];

fn symbol(byte: u8) -> Option<char> {
    let ch = match byte {
        b'A'..=b'Z' => SYMBOL_UPPER[(byte - b'A') as usize],
        b'a'..=b'z' => SYMBOL_LOWER[(byte - b'a') as usize],
        0x22 => '∀',
        0x24 => '∃',
        0x27 => '∋',
        0x2A => '∗',
        0x2D => '−',
        0x40 => '≅',
        0x5C => '∴',
        0x5E => '⊥',
        0xB1 => '±',
        0xB4 => '×',
        0xB8 => '÷',
        0xB9 => '≠',
        0xBA => '≡',
        0xBB => '≈',
        0xA3 => '≤',
        0xB3 => '≥',
        0xA5 => '∞',
        0xB7 => '•',
        0xBC => '…',
        0xB0 => '°',
        0xD6 => '√',
        0xE5 => '∑',
        0xF2 => '∫',
        0x20..=0x7E => byte as char,
        _ => return None,
    };
    Some(ch)
}

/// Names of printable ASCII glyphs other than single letters
const ASCII_GLYPHS: &[(&str, char)] = &[
    ("space", ' '),
    ("exclam", '!'),
    ("quotedbl", '"'),
    ("numbersign", '#'),
    ("dollar", '$'),
    ("percent", '%'),
    ("ampersand", '&'),
    ("quotesingle", '\''),
    ("parenleft", '('),
    ("parenright", ')'),
    ("asterisk", '*'),
    ("plus", '+'),
    ("comma", ','),
    ("hyphen", '-'),
    ("period", '.'),
    ("slash", '/'),
    ("zero", '0'),
    ("one", '1'),
    ("two", '2'),
    ("three", '3'),
    ("four", '4'),
    ("five", '5'),
    ("six", '6'),
    ("seven", '7'),
    ("eight", '8'),
    ("nine", '9'),
    ("colon", ':'),
    ("semicolon", ';'),
    ("less", '<'),
    ("equal", '='),
    ("greater", '>'),
    ("question", '?'),
    ("at", '@'),
    ("bracketleft", '['),
    ("backslash", '\\'),
    ("bracketright", ']'),
    ("asciicircum", '^'),
    ("underscore", '_'),
    ("grave", '`'),
    ("braceleft", '{'),
    ("bar", '|'),
    ("braceright", '}'),
    ("asciitilde", '~'),
];

/// Glyph names for U+00A1..=U+00FF in code point order
const LATIN1_GLYPHS: [&str; 95] = [
    "exclamdown", "cent", "sterling", "currency", "yen", "brokenbar", "section", "dieresis",
    "copyright", "ordfeminine", "guillemotleft", "logicalnot", "sfthyphen", "registered",
    "macron", "degree", "plusminus", "twosuperior", "threesuperior", "acute", "mu",
    "paragraph", "periodcentered", "cedilla", "onesuperior", "ordmasculine", "guillemotright",
    "onequarter", "onehalf", "threequarters", "questiondown", "Agrave", "Aacute",
    "Acircumflex", "Atilde", "Adieresis", "Aring", "AE", "Ccedilla", "Egrave", "Eacute",
    "Ecircumflex", "Edieresis", "Igrave", "Iacute", "Icircumflex", "Idieresis", "Eth",
    "Ntilde", "Ograve", "Oacute", "Ocircumflex", "Otilde", "Odieresis", "multiply", "Oslash",
    "Ugrave", "Uacute", "Ucircumflex", "Udieresis", "Yacute", "Thorn", "germandbls", "agrave",
    "aacute", "acircumflex", "atilde", "adieresis", "aring", "ae", "ccedilla", "egrave",
    "eacute", "ecircumflex", "edieresis", "igrave", "iacute", "icircumflex", "idieresis",
    "eth", "ntilde", "ograve", "oacute", "ocircumflex", "otilde", "odieresis", "divide",
    "oslash", "ugrave", "uacute", "ucircumflex", "udieresis", "yacute", "thorn", "ydieresis",
];

const EXTRA_GLYPHS: &[(&str, char)] = &[
    ("nbspace", '\u{00A0}'),
    ("quoteleft", '‘'),
    ("quoteright", '’'),
    ("quotesinglbase", '‚'),
    ("quotedblleft", '“'),
    ("quotedblright", '”'),
    ("quotedblbase", '„'),
    ("guilsinglleft", '‹'),
    ("guilsinglright", '›'),
    ("bullet", '•'),
    ("dagger", '†'),
    ("daggerdbl", '‡'),
    ("ellipsis", '…'),
    ("emdash", '—'),
    ("endash", '–'),
    ("florin", 'ƒ'),
    ("fraction", '⁄'),
    ("minus", '−'),
    ("perthousand", '‰'),
    ("trademark", '™'),
    ("Euro", '€'),
    ("fi", 'ﬁ'),
    ("fl", 'ﬂ'),
    ("ff", 'ﬀ'),
    ("ffi", 'ﬃ'),
    ("ffl", 'ﬄ'),
    ("Lslash", 'Ł'),
    ("lslash", 'ł'),
    ("OE", 'Œ'),
    ("oe", 'œ'),
    ("Scaron", 'Š'),
    ("scaron", 'š'),
    ("Zcaron", 'Ž'),
    ("zcaron", 'ž'),
    ("Ydieresis", 'Ÿ'),
    ("dotlessi", 'ı'),
    ("circumflex", 'ˆ'),
    ("tilde", '˜'),
    ("breve", '˘'),
    ("caron", 'ˇ'),
    ("dotaccent", '˙'),
    ("hungarumlaut", '˝'),
    ("ogonek", '˛'),
    ("ring", '˚'),
];

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::objects::PdfName;

    #[test]
    fn test_win_ansi_decoding() {
        let encoding = TextEncoding::WinAnsiEncoding;
        assert_eq!(encoding.decode(b"Caf\xE9 \x80 \x93ok\x94"), "Café € “ok”");
    }

    #[test]
    fn test_mac_roman_decoding() {
        let encoding = TextEncoding::MacRomanEncoding;
        assert_eq!(encoding.decode(b"\x8E\x87"), "éá");
        assert_eq!(encoding.decode_byte(0xD2), Some('“'));
    }

    #[test]
    fn test_standard_encoding_quotes() {
        let encoding = TextEncoding::StandardEncoding;
        assert_eq!(encoding.decode(b"`it's'"), "‘it’s’");
        assert_eq!(encoding.decode_byte(0xAE), Some('ﬁ'));
        assert_eq!(encoding.decode_byte(0xA0), None);
    }

    #[test]
    fn test_pdf_doc_encoding() {
        let encoding = TextEncoding::PdfDocEncoding;
        assert_eq!(encoding.decode_byte(0x84), Some('—'));
        assert_eq!(encoding.decode_byte(0xA0), Some('€'));
        assert_eq!(encoding.decode_byte(0xE9), Some('é'));
    }

    #[test]
    fn test_symbol_encoding() {
        assert_eq!(TextEncoding::SymbolEncoding.decode(b"abg"), "αβγ");
        assert_eq!(TextEncoding::SymbolEncoding.decode(b"1+1"), "1+1");
    }

    #[test]
    fn test_encoding_from_name() {
        assert_eq!(
            TextEncoding::from_name("WinAnsiEncoding"),
            Some(TextEncoding::WinAnsiEncoding)
        );
        assert_eq!(TextEncoding::from_name("Identity-H"), None);
    }

    #[test]
    fn test_glyph_names() {
        assert_eq!(glyph_to_char("A"), Some('A'));
        assert_eq!(glyph_to_char("eacute"), Some('é'));
        assert_eq!(glyph_to_char("germandbls"), Some('ß'));
        assert_eq!(glyph_to_char("ydieresis"), Some('ÿ'));
        assert_eq!(glyph_to_char("seven"), Some('7'));
        assert_eq!(glyph_to_char("uni20AC"), Some('€'));
        assert_eq!(glyph_to_char("u1F600"), Some('😀'));
        assert_eq!(glyph_to_char("a.sc"), Some('a'));
        assert_eq!(glyph_to_char("g123"), None);
    }

    #[test]
    fn test_differences() {
        let mut encoding = ByteEncoding::new(TextEncoding::WinAnsiEncoding);
        let differences = PdfArray(vec![
            PdfObject::Integer(65),
            PdfObject::Name(PdfName::new("Omega")),
            PdfObject::Name(PdfName::new("bullet")),
            PdfObject::Integer(200),
            PdfObject::Name(PdfName::new("unknownglyph")),
        ]);
        encoding.apply_differences(&differences);

        // "Omega" is not in the table and is more than one character
        assert_eq!(encoding.decode_byte(65), None);
        assert_eq!(encoding.decode_byte(66), Some('•'));
        assert_eq!(encoding.decode_byte(67), Some('C'));
        assert_eq!(encoding.decode_byte(200), None);
    }
}
