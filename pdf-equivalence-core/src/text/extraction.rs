//! Text extraction from PDF content streams
//!
//! Text is collected in content stream order; there is no geometric reflow. A line
//! break is appended when `T*`, `'` or `"` start a new line, or when `Td`, `TD` or
//! `Tm` move the line origin vertically. Form XObjects painted with `Do` are
//! interpreted in place.

use super::font::{font_name, FontDecoder};
use crate::parser::content::{ContentOperation, ContentParser, TextElement};
use crate::parser::objects::{ObjectRef, PdfDictionary, PdfObject};
use crate::parser::page_tree::ParsedPage;
use crate::parser::reader::PdfReader;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;
use tracing::warn;

const IDENTITY: [f64; 6] = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// Vertical moves smaller than this stay on the same line
const LINE_TOLERANCE: f64 = 0.01;

/// Text and fonts found on one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageText {
    pub text: String,
    /// Fonts selected with `Tf`
    pub fonts: BTreeSet<String>,
    pub warnings: Vec<String>,
}

/// Text extraction state
struct TextState {
    /// Current text line matrix
    text_line_matrix: [f64; 6],
    /// Text leading (line spacing)
    leading: f64,
    font: Rc<FontDecoder>,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            text_line_matrix: IDENTITY,
            leading: 0.0,
            font: Rc::new(FontDecoder::raw()),
        }
    }
}

/// Text extractor for PDF pages
pub struct TextExtractor<'r> {
    reader: &'r PdfReader,
    max_depth: usize,
    max_forms: usize,
}

impl<'r> TextExtractor<'r> {
    pub fn new(reader: &'r PdfReader) -> Self {
        Self {
            reader,
            max_depth: reader.options().max_depth,
            max_forms: reader.options().max_forms_per_page,
        }
    }

    /// Limit the nesting of form XObjects
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Limit how many form XObjects one page may paint in total
    pub fn with_max_forms(mut self, max_forms: usize) -> Self {
        self.max_forms = max_forms;
        self
    }

    /// Extract text from a specific page
    pub fn extract_page(&self, page: &ParsedPage) -> PageText {
        let mut run = PageRun::new(self.reader, self.max_depth, self.max_forms);

        // Streams are joined with a newline so tokens never fuse across them
        let mut content = Vec::new();
        for (index, stream) in page.content_streams(self.reader).into_iter().enumerate() {
            match stream {
                Ok(data) => {
                    if !content.is_empty() {
                        content.push(b'\n');
                    }
                    content.extend_from_slice(&data);
                }
                Err(e) => run.warn(format!(
                    "page {} content stream {} skipped: {}",
                    page.number, index, e
                )),
            }
        }

        run.execute(&content, &page.resources, 0);
        run.output
    }
}

/// Extraction of a single page, including the forms it paints
struct PageRun<'r> {
    reader: &'r PdfReader,
    max_depth: usize,
    max_forms: usize,
    /// Every `Do` of a form counts, repeats included
    forms_painted: usize,
    form_budget_spent: bool,
    output: PageText,
    decoders: HashMap<ObjectRef, Rc<FontDecoder>>,
    active_forms: HashSet<ObjectRef>,
    line_y: Option<f64>,
}

impl<'r> PageRun<'r> {
    fn new(reader: &'r PdfReader, max_depth: usize, max_forms: usize) -> Self {
        Self {
            reader,
            max_depth,
            max_forms,
            forms_painted: 0,
            form_budget_spent: false,
            output: PageText::default(),
            decoders: HashMap::new(),
            active_forms: HashSet::new(),
            line_y: None,
        }
    }

    fn execute(&mut self, content: &[u8], resources: &PdfDictionary, depth: usize) {
        let (operations, warnings) = ContentParser::parse_with_warnings(content);
        self.output.warnings.extend(warnings);

        let mut state = TextState::default();
        for operation in operations {
            match operation {
                ContentOperation::BeginText => {
                    state.text_line_matrix = IDENTITY;
                }
                ContentOperation::EndText | ContentOperation::Other(_) => {}

                ContentOperation::SetFont(name, _size) => {
                    state.font = self.select_font(resources, &name);
                }
                ContentOperation::SetLeading(leading) => {
                    state.leading = leading as f64;
                }

                ContentOperation::MoveText(tx, ty) => {
                    self.move_text(&mut state, tx as f64, ty as f64);
                }
                ContentOperation::MoveTextSetLeading(tx, ty) => {
                    state.leading = -(ty as f64);
                    self.move_text(&mut state, tx as f64, ty as f64);
                }
                ContentOperation::SetTextMatrix(a, b, c, d, e, f) => {
                    let matrix = [a as f64, b as f64, c as f64, d as f64, e as f64, f as f64];
                    state.text_line_matrix = matrix;
                    self.place_line(matrix[5]);
                }
                ContentOperation::NextLine => self.next_line(&mut state),

                ContentOperation::ShowText(bytes) => self.show(&state, &bytes),
                ContentOperation::ShowTextArray(elements) => {
                    for element in elements {
                        if let TextElement::Text(bytes) = element {
                            self.show(&state, &bytes);
                        }
                    }
                }
                ContentOperation::NextLineShowText(bytes)
                | ContentOperation::SetSpacingNextLineShowText(_, _, bytes) => {
                    self.next_line(&mut state);
                    self.show(&state, &bytes);
                }

                ContentOperation::PaintXObject(name) => {
                    self.paint_xobject(resources, &name, depth);
                }
            }
        }
    }

    fn show(&mut self, state: &TextState, bytes: &[u8]) {
        let decoded = state.font.decode(bytes);
        self.output.text.push_str(&decoded);
    }

    fn move_text(&mut self, state: &mut TextState, tx: f64, ty: f64) {
        state.text_line_matrix =
            multiply_matrix(&[1.0, 0.0, 0.0, 1.0, tx, ty], &state.text_line_matrix);
        self.place_line(state.text_line_matrix[5]);
    }

    fn next_line(&mut self, state: &mut TextState) {
        state.text_line_matrix = multiply_matrix(
            &[1.0, 0.0, 0.0, 1.0, 0.0, -state.leading],
            &state.text_line_matrix,
        );
        self.line_break();
        self.line_y = Some(state.text_line_matrix[5]);
    }

    /// Record the vertical position of the current line, breaking the line if it moved
    fn place_line(&mut self, y: f64) {
        if let Some(previous) = self.line_y {
            if (previous - y).abs() > LINE_TOLERANCE {
                self.line_break();
            }
        }
        self.line_y = Some(y);
    }

    fn line_break(&mut self) {
        let text = &mut self.output.text;
        if !text.is_empty() && !text.ends_with('\n') {
            text.push('\n');
        }
    }

    /// Record the font selected by `Tf` and return its decoder
    fn select_font(&mut self, resources: &PdfDictionary, key: &str) -> Rc<FontDecoder> {
        let reader = self.reader;
        let fonts = match reader.resolve_entry(resources, "Font") {
            Ok(fonts) => fonts.and_then(PdfObject::as_dict),
            Err(e) => {
                self.warn(format!("font resources unavailable: {e}"));
                None
            }
        };

        let Some(entry) = fonts.and_then(|fonts| fonts.get(key)) else {
            self.warn(format!("font /{key} not found in resources"));
            self.output.fonts.insert(key.to_string());
            return Rc::new(FontDecoder::raw());
        };
        let font = match reader.resolve_dict(entry) {
            Ok(font) => font,
            Err(e) => {
                self.warn(format!("font /{key} unavailable: {e}"));
                self.output.fonts.insert(key.to_string());
                return Rc::new(FontDecoder::raw());
            }
        };

        self.output.fonts.insert(font_name(reader, key, Some(font)));

        let id = entry.as_reference();
        if let Some(decoder) = id.and_then(|id| self.decoders.get(&id)) {
            return Rc::clone(decoder);
        }
        let decoder = Rc::new(FontDecoder::from_font(reader, font, &mut self.output.warnings));
        if let Some(id) = id {
            self.decoders.insert(id, Rc::clone(&decoder));
        }
        decoder
    }

    /// Interpret a form XObject painted with `Do`; images are ignored here
    fn paint_xobject(&mut self, resources: &PdfDictionary, name: &str, depth: usize) {
        let reader = self.reader;
        let xobjects = match reader.resolve_entry(resources, "XObject") {
            Ok(xobjects) => xobjects.and_then(PdfObject::as_dict),
            Err(e) => {
                self.warn(format!("XObject resources unavailable: {e}"));
                None
            }
        };
        let Some(entry) = xobjects.and_then(|xobjects| xobjects.get(name)) else {
            self.warn(format!("XObject /{name} not found in resources"));
            return;
        };
        let stream = match reader.resolve_object(entry) {
            Ok(PdfObject::Stream(stream)) => stream,
            Ok(_) => return,
            Err(e) => {
                self.warn(format!("XObject /{name} unavailable: {e}"));
                return;
            }
        };
        if stream.dict.get("Subtype").and_then(PdfObject::as_name) != Some("Form") {
            return;
        }

        if depth >= self.max_depth {
            self.warn(format!("form /{name} nested deeper than {}", self.max_depth));
            return;
        }
        if self.forms_painted >= self.max_forms {
            if !self.form_budget_spent {
                self.form_budget_spent = true;
                self.warn(format!(
                    "more than {} forms painted, /{name} and later forms skipped",
                    self.max_forms
                ));
            }
            return;
        }
        self.forms_painted += 1;
        let id = entry.as_reference();
        if let Some(id) = id {
            if !self.active_forms.insert(id) {
                self.warn(format!("form /{name} ({id}) paints itself"));
                return;
            }
        }

        match reader.decode_stream(stream) {
            Ok(data) => {
                let form_resources = match reader.resolve_entry(&stream.dict, "Resources") {
                    Ok(Some(PdfObject::Dictionary(own))) => own,
                    Ok(_) => resources,
                    Err(e) => {
                        self.warn(format!("form /{name} resources unavailable: {e}"));
                        resources
                    }
                };
                self.execute(&data, form_resources, depth + 1);
            }
            Err(e) => self.warn(format!("form /{name} skipped: {e}")),
        }

        if let Some(id) = id {
            self.active_forms.remove(&id);
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.output.warnings.push(message);
    }
}

/// Multiply two transformation matrices
fn multiply_matrix(a: &[f64; 6], b: &[f64; 6]) -> [f64; 6] {
    [
        a[0] * b[0] + a[1] * b[2],
        a[0] * b[1] + a[1] * b[3],
        a[2] * b[0] + a[3] * b[2],
        a[2] * b[1] + a[3] * b[3],
        a[4] * b[0] + a[5] * b[2] + b[4],
        a[4] * b[1] + a[5] * b[3] + b[5],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::test_helpers::{build_pdf, create_text_pdf, stream_object};
    use crate::parser::LoadOptions;

    const HELVETICA: &[u8] = b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>";

    /// One page with object 3 as font /F1 and the given content streams as objects 10, 11, ...
    fn single_page(contents: &[&[u8]], extra: &[(u32, Vec<u8>)], resources: &str) -> PdfReader {
        let refs: Vec<String> = (0..contents.len())
            .map(|i| format!("{} 0 R", 10 + i))
            .collect();
        let mut objects = vec![
            (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
            (2, b"<< /Type /Pages /Kids [4 0 R] /Count 1 >>".to_vec()),
            (3, HELVETICA.to_vec()),
            (
                4,
                format!(
                    "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 3 0 R >> {resources} >> /Contents [{}] >>",
                    refs.join(" ")
                )
                .into_bytes(),
            ),
        ];
        for (i, content) in contents.iter().enumerate() {
            objects.push((10 + i as u32, stream_object("", content)));
        }
        objects.extend_from_slice(extra);
        PdfReader::from_bytes(&build_pdf(&objects, "/Root 1 0 R"), LoadOptions::strict()).unwrap()
    }

    fn extract(reader: &PdfReader) -> PageText {
        let pages = reader.pages().unwrap();
        TextExtractor::new(reader).extract_page(&pages[0])
    }

    #[test]
    fn test_matrix_multiplication() {
        let translation = [1.0, 0.0, 0.0, 1.0, 10.0, 20.0];
        assert_eq!(multiply_matrix(&IDENTITY, &translation), translation);
        assert_eq!(multiply_matrix(&translation, &IDENTITY), translation);

        let scaled = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let moved = multiply_matrix(&[1.0, 0.0, 0.0, 1.0, 0.0, -5.0], &scaled);
        assert_eq!(moved[5], -10.0);
    }

    #[test]
    fn test_simple_page_text() {
        let reader =
            PdfReader::from_bytes(&create_text_pdf(&["Hello World"]), LoadOptions::strict())
                .unwrap();
        let page = extract(&reader);
        assert_eq!(page.text, "Hello World");
        assert_eq!(page.fonts, BTreeSet::from(["Helvetica".to_string()]));
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn test_line_breaks() {
        let reader = single_page(
            &[b"BT /F1 12 Tf 14 TL 72 720 Td (a) Tj 0 -14 Td (b) Tj 10 0 Td (c) Tj T* (d) Tj (e) ' 0 2 (f) \" ET"],
            &[],
            "",
        );
        assert_eq!(extract(&reader).text, "a\nbc\nd\ne\nf");
    }

    #[test]
    fn test_text_matrix_line_breaks() {
        let reader = single_page(
            &[b"BT /F1 12 Tf 1 0 0 1 72 700 Tm (x) Tj 1 0 0 1 100 700 Tm (y) Tj 1 0 0 1 72 680 Tm (z) Tj ET"],
            &[],
            "",
        );
        assert_eq!(extract(&reader).text, "xy\nz");
    }

    #[test]
    fn test_new_text_object_on_same_line() {
        let reader = single_page(
            &[b"BT /F1 12 Tf 72 720 Td (a) Tj ET BT /F1 12 Tf 100 720 Td (b) Tj ET BT 72 700 Td (c) Tj ET"],
            &[],
            "",
        );
        assert_eq!(extract(&reader).text, "ab\nc");
    }

    #[test]
    fn test_text_array() {
        let reader = single_page(&[b"BT /F1 12 Tf [(Hel) -50 (lo)] TJ ET"], &[], "");
        assert_eq!(extract(&reader).text, "Hello");
    }

    #[test]
    fn test_content_streams_joined() {
        let reader = single_page(
            &[b"BT /F1 12 Tf 72 720 Td (a) Tj", b"T* (b) Tj ET"],
            &[],
            "",
        );
        let page = extract(&reader);
        assert_eq!(page.text, "a\nb");
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn test_unknown_font_is_recorded_by_key() {
        let reader = single_page(&[b"BT /F9 12 Tf (x) Tj ET"], &[], "");
        let page = extract(&reader);
        assert_eq!(page.text, "x");
        assert_eq!(page.fonts, BTreeSet::from(["F9".to_string()]));
        assert_eq!(page.warnings.len(), 1);
    }

    #[test]
    fn test_form_xobject_text() {
        let form = stream_object(
            "/Type /XObject /Subtype /Form /BBox [0 0 100 100] \
             /Resources << /Font << /F2 21 0 R >> >>",
            b"BT /F2 10 Tf 72 700 Td (form) Tj ET",
        );
        let reader = single_page(
            &[b"BT /F1 12 Tf 72 720 Td (page) Tj ET /Fm1 Do"],
            &[
                (20, form),
                (21, b"<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>".to_vec()),
            ],
            "/XObject << /Fm1 20 0 R >>",
        );
        let page = extract(&reader);
        assert_eq!(page.text, "page\nform");
        assert_eq!(
            page.fonts,
            BTreeSet::from(["Courier".to_string(), "Helvetica".to_string()])
        );
    }

    #[test]
    fn test_form_inherits_page_resources() {
        let form = stream_object("/Subtype /Form", b"BT /F1 12 Tf (inside) Tj ET");
        let reader = single_page(&[b"/Fm1 Do"], &[(20, form)], "/XObject << /Fm1 20 0 R >>");
        assert_eq!(extract(&reader).text, "inside");
    }

    #[test]
    fn test_self_painting_form_terminates() {
        let form = stream_object(
            "/Subtype /Form /Resources << /XObject << /Fm1 20 0 R >> /Font << /F1 3 0 R >> >>",
            b"BT /F1 12 Tf (loop) Tj ET /Fm1 Do",
        );
        let reader = single_page(&[b"/Fm1 Do"], &[(20, form)], "/XObject << /Fm1 20 0 R >>");
        let page = extract(&reader);
        assert_eq!(page.text, "loop");
        assert_eq!(page.warnings.len(), 1);
    }

    #[test]
    fn test_form_depth_limit() {
        let form = stream_object("/Subtype /Form", b"BT /F1 12 Tf (deep) Tj ET");
        let reader = single_page(&[b"/Fm1 Do"], &[(20, form)], "/XObject << /Fm1 20 0 R >>");
        let pages = reader.pages().unwrap();
        let page = TextExtractor::new(&reader)
            .with_max_depth(0)
            .extract_page(&pages[0]);
        assert_eq!(page.text, "");
        assert_eq!(page.warnings.len(), 1);
    }

    /// Forms 20..20+levels, each painting the next one twice; the last shows "x"
    fn doubling_forms(levels: u32) -> Vec<(u32, Vec<u8>)> {
        let mut forms = Vec::new();
        for level in 0..levels {
            let number = 20 + level;
            let form = if level + 1 == levels {
                stream_object(
                    "/Subtype /Form /Resources << /Font << /F1 3 0 R >> >>",
                    b"BT /F1 12 Tf (x) Tj ET",
                )
            } else {
                stream_object(
                    &format!("/Subtype /Form /Resources << /XObject << /Y {} 0 R >> >>", number + 1),
                    b"/Y Do /Y Do",
                )
            };
            forms.push((number, form));
        }
        forms
    }

    #[test]
    fn test_form_fan_out_is_bounded() {
        let reader = single_page(&[b"/Fm1 Do"], &doubling_forms(20), "/XObject << /Fm1 20 0 R >>");
        let pages = reader.pages().unwrap();
        let page = TextExtractor::new(&reader)
            .with_max_forms(64)
            .extract_page(&pages[0]);

        assert!(!page.text.is_empty());
        assert!(page.text.chars().all(|c| c == 'x'));
        assert!(page.text.len() <= 64);
        assert_eq!(page.warnings.len(), 1);
    }

    #[test]
    fn test_form_budget_allows_small_fan_out() {
        // 1 + 2 + 4 + 8 forms, all within the default budget
        let reader = single_page(&[b"/Fm1 Do"], &doubling_forms(4), "/XObject << /Fm1 20 0 R >>");
        let page = extract(&reader);
        assert_eq!(page.text, "xxxxxxxx");
        assert!(page.warnings.is_empty());
    }

    #[test]
    fn test_image_xobject_ignored() {
        let image = stream_object("/Subtype /Image /Width 1 /Height 1", b"\x00");
        let reader = single_page(&[b"/Im1 Do"], &[(20, image)], "/XObject << /Im1 20 0 R >>");
        let page = extract(&reader);
        assert_eq!(page.text, "");
        assert!(page.warnings.is_empty());
    }
}
