//! In-memory PDF builder for integration tests
//!
//! Objects are written in the order they are added and every cross-reference
//! offset is computed from the bytes actually written.

#![allow(dead_code)]

use std::io::Write;

pub const HEADER: &[u8] = b"%PDF-1.5\n%\xE2\xE3\xCF\xD3\n";

/// A stream object body with a matching `/Length`
pub fn stream(dict_entries: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!("<< /Length {} {} >>\nstream\n", data.len(), dict_entries).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

/// Flate-compressed stream object body
pub fn flate_stream(dict_entries: &str, data: &[u8]) -> Vec<u8> {
    stream(&format!("/Filter /FlateDecode {dict_entries}"), &deflate(data))
}

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

#[derive(Debug, Clone, Default)]
pub struct PdfBuilder {
    objects: Vec<(u32, Vec<u8>)>,
    compressed: Vec<(u32, Vec<u8>)>,
}

impl PdfBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn object(mut self, number: u32, body: impl AsRef<[u8]>) -> Self {
        self.objects.push((number, body.as_ref().to_vec()));
        self
    }

    /// Object stored inside an object stream (only used by [`build_xref_stream`](Self::build_xref_stream))
    pub fn compressed_object(mut self, number: u32, body: impl AsRef<[u8]>) -> Self {
        self.compressed.push((number, body.as_ref().to_vec()));
        self
    }

    /// Write the objects followed by a classic xref table and trailer
    pub fn build(&self, trailer_entries: &str) -> Vec<u8> {
        let mut out = HEADER.to_vec();
        let offsets = self.write_objects(&mut out);
        let size = offsets.keys().max().map_or(1, |max| max + 1);

        let xref_start = out.len();
        write_xref_table(&mut out, &offsets, size);
        out.extend_from_slice(
            format!("trailer\n<< /Size {size} {trailer_entries} >>\nstartxref\n{xref_start}\n%%EOF\n")
                .as_bytes(),
        );
        out
    }

    /// Write the objects, an object stream holding the compressed objects and a
    /// PNG-predicted cross-reference stream
    pub fn build_xref_stream(&self, trailer_entries: &str) -> Vec<u8> {
        let mut out = HEADER.to_vec();
        let mut offsets = self.write_objects(&mut out);

        let max_plain = offsets.keys().copied().max().unwrap_or(0);
        let max_compressed = self.compressed.iter().map(|(n, _)| *n).max().unwrap_or(0);
        let objstm_number = max_plain.max(max_compressed) + 1;
        let xref_number = objstm_number + 1;

        let mut compressed_index = std::collections::BTreeMap::new();
        if !self.compressed.is_empty() {
            let mut header = String::new();
            let mut bodies = Vec::new();
            for (index, (number, body)) in self.compressed.iter().enumerate() {
                header.push_str(&format!("{} {} ", number, bodies.len()));
                bodies.extend_from_slice(body);
                bodies.push(b'\n');
                compressed_index.insert(*number, index as u32);
            }
            let mut data = header.into_bytes();
            let first = data.len();
            data.extend_from_slice(&bodies);

            offsets.insert(objstm_number, out.len());
            out.extend_from_slice(format!("{objstm_number} 0 obj\n").as_bytes());
            out.extend_from_slice(&flate_stream(
                &format!("/Type /ObjStm /N {} /First {first}", self.compressed.len()),
                &data,
            ));
            out.extend_from_slice(b"\nendobj\n");
        }

        let xref_offset = out.len();
        offsets.insert(xref_number, xref_offset);
        let size = xref_number + 1;

        // Rows of [type:1][field2:4][field3:2], each prefixed with PNG Up (2)
        let mut rows = Vec::new();
        let mut previous = [0u8; 7];
        for number in 0..size {
            let row: [u8; 7] = if let Some(index) = compressed_index.get(&number) {
                let stream = objstm_number.to_be_bytes();
                let index = (*index as u16).to_be_bytes();
                [2, stream[0], stream[1], stream[2], stream[3], index[0], index[1]]
            } else if let Some(offset) = offsets.get(&number) {
                let offset = (*offset as u32).to_be_bytes();
                [1, offset[0], offset[1], offset[2], offset[3], 0, 0]
            } else {
                [0, 0, 0, 0, 0, 0xFF, 0xFF]
            };
            rows.push(2);
            rows.extend(row.iter().zip(previous.iter()).map(|(b, p)| b.wrapping_sub(*p)));
            previous = row;
        }

        out.extend_from_slice(format!("{xref_number} 0 obj\n").as_bytes());
        out.extend_from_slice(&flate_stream(
            &format!(
                "/Type /XRef /Size {size} /W [1 4 2] \
                 /DecodeParms << /Predictor 12 /Columns 7 >> {trailer_entries}"
            ),
            &rows,
        ));
        out.extend_from_slice(format!("\nendobj\nstartxref\n{xref_offset}\n%%EOF\n").as_bytes());
        out
    }

    fn write_objects(&self, out: &mut Vec<u8>) -> std::collections::BTreeMap<u32, usize> {
        let mut offsets = std::collections::BTreeMap::new();
        for (number, body) in &self.objects {
            offsets.insert(*number, out.len());
            out.extend_from_slice(format!("{number} 0 obj\n").as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }
        offsets
    }
}

fn write_xref_table(out: &mut Vec<u8>, offsets: &std::collections::BTreeMap<u32, usize>, size: u32) {
    out.extend_from_slice(format!("xref\n0 {size}\n").as_bytes());
    for number in 0..size {
        match offsets.get(&number) {
            Some(offset) => out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes()),
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
}

/// Append an incremental update replacing or adding `objects`
pub fn incremental_update(base: &[u8], objects: &[(u32, Vec<u8>)], trailer_entries: &str) -> Vec<u8> {
    let previous = last_startxref(base);
    let mut out = base.to_vec();

    let mut sections = Vec::new();
    for (number, body) in objects {
        sections.push((*number, out.len()));
        out.extend_from_slice(format!("{number} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(b"xref\n");
    for (number, offset) in &sections {
        out.extend_from_slice(format!("{number} 1\n{offset:010} 00000 n \n").as_bytes());
    }
    let size = sections.iter().map(|(n, _)| n + 1).max().unwrap_or(1);
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {size} /Prev {previous} {trailer_entries} >>\nstartxref\n{xref_start}\n%%EOF\n"
        )
        .as_bytes(),
    );
    out
}

fn last_startxref(data: &[u8]) -> usize {
    let text = String::from_utf8_lossy(data);
    let position = text.rfind("startxref").unwrap();
    text[position + "startxref".len()..]
        .split_whitespace()
        .next()
        .unwrap()
        .parse()
        .unwrap()
}

/// Catalog, page tree and one Helvetica page per text, numbered from 10
pub fn text_document(pages: &[&str]) -> PdfBuilder {
    text_document_with_fonts(pages, &["Helvetica"])
}

/// Like [`text_document`], listing every font in each page's resources and
/// selecting the first one
pub fn text_document_with_fonts(pages: &[&str], fonts: &[&str]) -> PdfBuilder {
    let mut builder = PdfBuilder::new().object(1, "<< /Type /Catalog /Pages 2 0 R >>");

    let font_entries: Vec<String> = (0..fonts.len())
        .map(|i| format!("/F{} {} 0 R", i + 1, 3 + i))
        .collect();
    let kids: Vec<String> = (0..pages.len())
        .map(|i| format!("{} 0 R", 10 + 2 * i))
        .collect();
    builder = builder.object(
        2,
        format!("<< /Type /Pages /Kids [{}] /Count {} >>", kids.join(" "), pages.len()),
    );
    for (i, font) in fonts.iter().enumerate() {
        builder = builder.object(
            3 + i as u32,
            format!("<< /Type /Font /Subtype /Type1 /BaseFont /{font} >>"),
        );
    }
    for (i, text) in pages.iter().enumerate() {
        let page = 10 + 2 * i as u32;
        builder = builder
            .object(
                page,
                format!(
                    "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                     /Resources << /Font << {} >> >> /Contents {} 0 R >>",
                    font_entries.join(" "),
                    page + 1
                ),
            )
            .object(
                page + 1,
                stream("", format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET").as_bytes()),
            );
    }
    builder
}
