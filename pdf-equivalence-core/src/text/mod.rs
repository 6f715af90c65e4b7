//! Text decoding and extraction
//!
//! Maps the bytes of text-showing operators to Unicode using the font's
//! `/ToUnicode` CMap, its simple encoding or a builtin one, and walks content
//! streams to collect page text.

pub mod cmap;
pub mod encoding;
pub mod extraction;
pub mod font;

pub use cmap::CMap;
pub use encoding::{glyph_to_char, ByteEncoding, TextEncoding};
pub use extraction::{PageText, TextExtractor};
pub use font::{font_name, FontDecoder};
