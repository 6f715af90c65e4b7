//! PDF Lexer
//!
//! Tokenizes PDF syntax according to ISO 32000-1 Section 7.2. The lexer works over
//! a borrowed byte slice so the loader can position it anywhere in the file
//! (cross-reference offsets, `startxref`, object headers).

use crate::error::{LoadError, Result};

/// PDF Token types
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Boolean: true or false
    Boolean(bool),

    /// Integer number
    Integer(i64),

    /// Real number
    Real(f64),

    /// Null object
    Null,

    /// Name object with `#xx` escapes resolved (e.g. /Type)
    Name(String),

    /// Literal string `( ... )` with escapes resolved
    LiteralString(Vec<u8>),

    /// Hexadecimal string `< ... >`
    HexString(Vec<u8>),

    /// Left square bracket [
    ArrayStart,

    /// Right square bracket ]
    ArrayEnd,

    /// Dictionary start <<
    DictStart,

    /// Dictionary end >>
    DictEnd,

    /// Any other bare word: `obj`, `R`, `stream`, content operators, ...
    Keyword(String),

    /// End of input
    Eof,
}

impl Token {
    /// Returns true if this token is the keyword `kw`
    pub fn is_keyword(&self, kw: &str) -> bool {
        matches!(self, Token::Keyword(k) if k == kw)
    }
}

/// PDF whitespace characters (Table 1)
pub fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b'\0' | b'\t' | b'\n' | b'\x0C' | b'\r' | b' ')
}

/// PDF delimiter characters (Table 2)
pub fn is_delimiter(byte: u8) -> bool {
    matches!(
        byte,
        b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%'
    )
}

/// Regular characters are everything that is neither whitespace nor a delimiter
pub fn is_regular(byte: u8) -> bool {
    !is_whitespace(byte) && !is_delimiter(byte)
}

fn hex_value(byte: u8) -> Option<u8> {
    match byte {
        b'0'..=b'9' => Some(byte - b'0'),
        b'a'..=b'f' => Some(byte - b'a' + 10),
        b'A'..=b'F' => Some(byte - b'A' + 10),
        _ => None,
    }
}

/// PDF Lexer over a byte slice
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer positioned at the start of `data`
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Create a lexer positioned at `offset`
    pub fn at(data: &'a [u8], offset: usize) -> Self {
        Self {
            data,
            position: offset.min(data.len()),
        }
    }

    /// Current byte offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// Move to an absolute byte offset (clamped to the input length)
    pub fn seek(&mut self, position: usize) {
        self.position = position.min(self.data.len());
    }

    /// The complete input
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Remaining unread input
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    pub fn is_eof(&self) -> bool {
        self.position >= self.data.len()
    }

    fn peek_byte(&self) -> Option<u8> {
        self.data.get(self.position).copied()
    }

    fn peek_byte_at(&self, offset: usize) -> Option<u8> {
        self.data.get(self.position + offset).copied()
    }

    /// Get the next token
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_whitespace();

        let ch = match self.peek_byte() {
            Some(ch) => ch,
            None => return Ok(Token::Eof),
        };

        let start = self.position;
        match ch {
            b'/' => Ok(self.read_name()),
            b'(' => self.read_literal_string(),
            b'<' => {
                if self.peek_byte_at(1) == Some(b'<') {
                    self.position += 2;
                    Ok(Token::DictStart)
                } else {
                    self.read_hex_string()
                }
            }
            b'>' => {
                if self.peek_byte_at(1) == Some(b'>') {
                    self.position += 2;
                    Ok(Token::DictEnd)
                } else {
                    self.position += 1;
                    Err(LoadError::syntax(start, "Unexpected '>'"))
                }
            }
            b'[' => {
                self.position += 1;
                Ok(Token::ArrayStart)
            }
            b']' => {
                self.position += 1;
                Ok(Token::ArrayEnd)
            }
            b'{' | b'}' => {
                self.position += 1;
                Ok(Token::Keyword((ch as char).to_string()))
            }
            b')' => {
                self.position += 1;
                Err(LoadError::syntax(start, "Unexpected ')'"))
            }
            b'+' | b'-' | b'.' | b'0'..=b'9' => self.read_number(),
            _ => Ok(self.read_keyword()),
        }
    }

    /// Skip whitespace and comments
    pub fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_byte() {
            if is_whitespace(ch) {
                self.position += 1;
            } else if ch == b'%' {
                while let Some(c) = self.peek_byte() {
                    if c == b'\n' || c == b'\r' {
                        break;
                    }
                    self.position += 1;
                }
            } else {
                break;
            }
        }
    }

    /// Skip the end-of-line marker that follows the `stream` keyword (CRLF, LF or a lone CR)
    pub fn skip_eol(&mut self) {
        // Some writers leave spaces between `stream` and the EOL
        while self.peek_byte() == Some(b' ') {
            self.position += 1;
        }
        match self.peek_byte() {
            Some(b'\r') => {
                self.position += 1;
                if self.peek_byte() == Some(b'\n') {
                    self.position += 1;
                }
            }
            Some(b'\n') => self.position += 1,
            _ => {}
        }
    }

    /// Read exactly `n` raw bytes
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8]> {
        let end = self
            .position
            .checked_add(n)
            .filter(|end| *end <= self.data.len())
            .ok_or_else(|| {
                LoadError::syntax(self.position, format!("Cannot read {n} bytes past end of input"))
            })?;
        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Offset of the next occurrence of `needle` at or after the current position
    pub fn find_forward(&self, needle: &[u8]) -> Option<usize> {
        find_bytes(&self.data[self.position..], needle).map(|i| i + self.position)
    }

    /// Offset of the last occurrence of `needle` in the whole input
    pub fn rfind(&self, needle: &[u8]) -> Option<usize> {
        rfind_bytes(self.data, needle)
    }

    /// Skip the binary payload of an inline image.
    ///
    /// Must be called right after the `ID` operator. Leaves the lexer after the
    /// matching `EI`, which has to be surrounded by whitespace (or end of input).
    pub fn skip_inline_image_data(&mut self) -> Result<()> {
        let start = self.position;
        // A single whitespace byte separates ID from the data
        if self.peek_byte().is_some_and(is_whitespace) {
            self.position += 1;
        }
        let mut cursor = self.position;
        while let Some(found) = find_bytes(&self.data[cursor..], b"EI") {
            let at = cursor + found;
            let before_ok = at == 0 || is_whitespace(self.data[at - 1]);
            let after_ok = self
                .data
                .get(at + 2)
                .map_or(true, |b| is_whitespace(*b) || is_delimiter(*b));
            if before_ok && after_ok {
                self.position = at + 2;
                return Ok(());
            }
            cursor = at + 2;
        }
        self.position = self.data.len();
        Err(LoadError::syntax(start, "Inline image without EI"))
    }

    fn read_name(&mut self) -> Token {
        // Skip '/'
        self.position += 1;
        let mut bytes = Vec::new();
        while let Some(ch) = self.peek_byte() {
            if !is_regular(ch) {
                break;
            }
            if ch == b'#' {
                let hi = self.peek_byte_at(1).and_then(hex_value);
                let lo = self.peek_byte_at(2).and_then(hex_value);
                if let (Some(hi), Some(lo)) = (hi, lo) {
                    bytes.push(hi << 4 | lo);
                    self.position += 3;
                    continue;
                }
            }
            bytes.push(ch);
            self.position += 1;
        }
        Token::Name(decode_name_bytes(bytes))
    }

    fn read_literal_string(&mut self) -> Result<Token> {
        let start = self.position;
        // Skip '('
        self.position += 1;
        let mut result = Vec::new();
        let mut depth = 1usize;

        loop {
            let ch = match self.peek_byte() {
                Some(ch) => ch,
                None => return Err(LoadError::syntax(start, "Unterminated string")),
            };
            self.position += 1;
            match ch {
                b'(' => {
                    depth += 1;
                    result.push(ch);
                }
                b')' => {
                    depth -= 1;
                    if depth == 0 {
                        break;
                    }
                    result.push(ch);
                }
                b'\\' => self.read_escape(&mut result),
                b'\r' => {
                    // EOL inside a string is always read as LF
                    if self.peek_byte() == Some(b'\n') {
                        self.position += 1;
                    }
                    result.push(b'\n');
                }
                _ => result.push(ch),
            }
        }

        Ok(Token::LiteralString(result))
    }

    fn read_escape(&mut self, out: &mut Vec<u8>) {
        let ch = match self.peek_byte() {
            Some(ch) => ch,
            None => return,
        };
        self.position += 1;
        match ch {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'(' | b')' | b'\\' => out.push(ch),
            b'0'..=b'7' => {
                let mut value = (ch - b'0') as u32;
                for _ in 0..2 {
                    match self.peek_byte() {
                        Some(d @ b'0'..=b'7') => {
                            value = value * 8 + (d - b'0') as u32;
                            self.position += 1;
                        }
                        _ => break,
                    }
                }
                out.push((value & 0xFF) as u8);
            }
            b'\r' => {
                // Line continuation
                if self.peek_byte() == Some(b'\n') {
                    self.position += 1;
                }
            }
            b'\n' => {}
            // Unknown escapes drop the backslash
            other => out.push(other),
        }
    }

    fn read_hex_string(&mut self) -> Result<Token> {
        let start = self.position;
        // Skip '<'
        self.position += 1;
        let mut digits = Vec::new();

        loop {
            let ch = match self.peek_byte() {
                Some(ch) => ch,
                None => return Err(LoadError::syntax(start, "Unterminated hex string")),
            };
            self.position += 1;
            if ch == b'>' {
                break;
            }
            if is_whitespace(ch) {
                continue;
            }
            match hex_value(ch) {
                Some(v) => digits.push(v),
                None => {
                    return Err(LoadError::syntax(
                        self.position - 1,
                        format!("Invalid hex digit '{}'", ch as char),
                    ))
                }
            }
        }

        // Odd digit count: the final digit is followed by an implicit 0
        if digits.len() % 2 == 1 {
            digits.push(0);
        }
        let bytes = digits.chunks(2).map(|pair| pair[0] << 4 | pair[1]).collect();
        Ok(Token::HexString(bytes))
    }

    fn read_number(&mut self) -> Result<Token> {
        let start = self.position;
        let mut text = String::new();
        let mut has_dot = false;
        let mut has_digit = false;

        if let Some(sign @ (b'+' | b'-')) = self.peek_byte() {
            text.push(sign as char);
            self.position += 1;
            // Tolerate doubled signs such as "--5" written by some producers
            while matches!(self.peek_byte(), Some(b'+' | b'-')) {
                self.position += 1;
            }
        }

        while let Some(ch) = self.peek_byte() {
            match ch {
                b'0'..=b'9' => {
                    has_digit = true;
                    text.push(ch as char);
                }
                b'.' if !has_dot => {
                    has_dot = true;
                    text.push('.');
                }
                _ => break,
            }
            self.position += 1;
        }

        // Swallow trailing garbage like "1.2.3" or "12abc" into the same token
        while self.peek_byte().is_some_and(is_regular) {
            self.position += 1;
        }

        if !has_digit {
            return Err(LoadError::syntax(start, format!("Invalid number '{text}'")));
        }

        if !has_dot {
            if let Ok(value) = text.parse::<i64>() {
                return Ok(Token::Integer(value));
            }
        }
        text.parse::<f64>()
            .map(Token::Real)
            .map_err(|_| LoadError::syntax(start, format!("Invalid number '{text}'")))
    }

    fn read_keyword(&mut self) -> Token {
        let start = self.position;
        while self.peek_byte().is_some_and(is_regular) {
            self.position += 1;
        }
        let word = String::from_utf8_lossy(&self.data[start..self.position]).into_owned();
        match word.as_str() {
            "true" => Token::Boolean(true),
            "false" => Token::Boolean(false),
            "null" => Token::Null,
            _ => Token::Keyword(word),
        }
    }
}

/// Names are byte sequences; most are ASCII. Non-UTF-8 names keep one char per byte.
fn decode_name_bytes(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(s) => s,
        Err(e) => e.into_bytes().into_iter().map(char::from).collect(),
    }
}

pub(crate) fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

pub(crate) fn rfind_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).rposition(|w| w == needle)
}
