//! PDF Content Stream Parser
//!
//! Turns a content stream into the operators text extraction needs. Everything else is
//! kept as [`ContentOperation::Other`] with its operands discarded.
//!
//! Parsing never fails as a whole. A malformed token or an operator with operands of the
//! wrong type is skipped and reported as a warning.

use super::lexer::Token;
use super::objects::{ObjectParser, PdfObject};
use tracing::warn;

/// Represents a single operator in a PDF content stream
#[derive(Debug, Clone, PartialEq)]
pub enum ContentOperation {
    // Text object operators
    BeginText, // BT
    EndText,   // ET

    // Text state operators
    SetFont(String, f32), // Tf
    SetLeading(f32),      // TL

    // Text positioning operators
    MoveText(f32, f32),                          // Td
    MoveTextSetLeading(f32, f32),                // TD
    SetTextMatrix(f32, f32, f32, f32, f32, f32), // Tm
    NextLine,                                    // T*

    // Text showing operators
    ShowText(Vec<u8>),                             // Tj
    ShowTextArray(Vec<TextElement>),               // TJ
    NextLineShowText(Vec<u8>),                     // '
    SetSpacingNextLineShowText(f32, f32, Vec<u8>), // "

    // XObject operator
    PaintXObject(String), // Do

    /// Any other operator (inline images appear as `BI`)
    Other(String),
}

/// Element of a `TJ` array
#[derive(Debug, Clone, PartialEq)]
pub enum TextElement {
    Text(Vec<u8>),
    Spacing(f32),
}

/// Content stream parser
pub struct ContentParser<'a> {
    parser: ObjectParser<'a, 'static>,
    warnings: Vec<String>,
}

impl<'a> ContentParser<'a> {
    pub fn new(content: &'a [u8]) -> Self {
        Self {
            parser: ObjectParser::new(content).with_lenient(true),
            warnings: Vec::new(),
        }
    }

    /// Parse a content stream into operations
    pub fn parse(content: &[u8]) -> Vec<ContentOperation> {
        ContentParser::new(content).parse_operations().0
    }

    /// Parse a content stream, also returning the warnings for skipped units
    pub fn parse_with_warnings(content: &[u8]) -> (Vec<ContentOperation>, Vec<String>) {
        ContentParser::new(content).parse_operations()
    }

    fn parse_operations(mut self) -> (Vec<ContentOperation>, Vec<String>) {
        let mut operations = Vec::new();
        let mut operands: Vec<PdfObject> = Vec::new();

        loop {
            self.parser.lexer().skip_whitespace();
            let position = self.parser.position();
            let token = match self.parser.lexer().next_token() {
                Ok(Token::Eof) => break,
                Ok(token) => token,
                Err(e) => {
                    self.recover(position, e.to_string());
                    operands.clear();
                    continue;
                }
            };

            match token {
                Token::Keyword(op) if op == "BI" => {
                    self.skip_inline_image(position);
                    operands.clear();
                    operations.push(ContentOperation::Other(op));
                }
                Token::Keyword(op) => {
                    match Self::operation(&op, &mut operands) {
                        Some(operation) => operations.push(operation),
                        None => self.warn(position, format!("Operator {op} with invalid operands skipped")),
                    }
                    operands.clear();
                }
                token => match self.parser.parse_object_from(token, position) {
                    Ok(operand) => operands.push(operand),
                    Err(e) => {
                        self.recover(position, e.to_string());
                        operands.clear();
                    }
                },
            }
        }

        (operations, self.warnings)
    }

    fn operation(op: &str, operands: &mut Vec<PdfObject>) -> Option<ContentOperation> {
        let operation = match op {
            "BT" => ContentOperation::BeginText,
            "ET" => ContentOperation::EndText,

            "Tf" => {
                let size = pop_number(operands)?;
                let font = pop_name(operands)?;
                ContentOperation::SetFont(font, size)
            }
            "TL" => ContentOperation::SetLeading(pop_number(operands)?),

            "Td" => {
                let ty = pop_number(operands)?;
                let tx = pop_number(operands)?;
                ContentOperation::MoveText(tx, ty)
            }
            "TD" => {
                let ty = pop_number(operands)?;
                let tx = pop_number(operands)?;
                ContentOperation::MoveTextSetLeading(tx, ty)
            }
            "Tm" => {
                let [a, b, c, d, e, f] = pop_matrix(operands)?;
                ContentOperation::SetTextMatrix(a, b, c, d, e, f)
            }
            "T*" => ContentOperation::NextLine,

            "Tj" => ContentOperation::ShowText(pop_string(operands)?),
            "TJ" => ContentOperation::ShowTextArray(pop_text_array(operands)?),
            "'" => ContentOperation::NextLineShowText(pop_string(operands)?),
            "\"" => {
                let text = pop_string(operands)?;
                let char_spacing = pop_number(operands)?;
                let word_spacing = pop_number(operands)?;
                ContentOperation::SetSpacingNextLineShowText(word_spacing, char_spacing, text)
            }

            "Do" => ContentOperation::PaintXObject(pop_name(operands)?),

            other => ContentOperation::Other(other.to_string()),
        };
        Some(operation)
    }

    /// Skip the inline image dictionary and its binary data up to `EI`
    fn skip_inline_image(&mut self, position: usize) {
        loop {
            match self.parser.lexer().next_token() {
                Ok(token) if token.is_keyword("ID") => break,
                Ok(Token::Eof) => {
                    self.warn(position, "Inline image without ID".to_string());
                    return;
                }
                Ok(_) => {}
                Err(e) => {
                    self.warn(position, e.to_string());
                    return;
                }
            }
        }
        if let Err(e) = self.parser.lexer().skip_inline_image_data() {
            self.warn(position, e.to_string());
        }
    }

    /// Record a warning and make sure the cursor moves past the failing byte
    fn recover(&mut self, position: usize, message: String) {
        if self.parser.position() <= position {
            self.parser.lexer().seek(position + 1);
        }
        self.warn(position, message);
    }

    fn warn(&mut self, position: usize, message: String) {
        warn!("Content stream at byte {}: {}", position, message);
        self.warnings
            .push(format!("content stream byte {position}: {message}"));
    }
}

fn pop_number(operands: &mut Vec<PdfObject>) -> Option<f32> {
    operands.pop()?.as_real().map(|n| n as f32)
}

fn pop_name(operands: &mut Vec<PdfObject>) -> Option<String> {
    operands.pop()?.as_name().map(str::to_string)
}

fn pop_string(operands: &mut Vec<PdfObject>) -> Option<Vec<u8>> {
    match operands.pop()? {
        PdfObject::String(s) => Some(s.0),
        _ => None,
    }
}

fn pop_matrix(operands: &mut Vec<PdfObject>) -> Option<[f32; 6]> {
    let mut matrix = [0.0; 6];
    for slot in matrix.iter_mut().rev() {
        *slot = pop_number(operands)?;
    }
    Some(matrix)
}

fn pop_text_array(operands: &mut Vec<PdfObject>) -> Option<Vec<TextElement>> {
    match operands.pop()? {
        PdfObject::Array(array) => Some(
            array
                .0
                .into_iter()
                .filter_map(|element| match element {
                    PdfObject::String(s) => Some(TextElement::Text(s.0)),
                    PdfObject::Integer(i) => Some(TextElement::Spacing(i as f32)),
                    PdfObject::Real(r) => Some(TextElement::Spacing(r as f32)),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}
