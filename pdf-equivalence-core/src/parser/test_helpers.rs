//! Helper functions for creating valid test PDFs with correct offsets

/// Wraps `data` into a stream object body with a matching `/Length`
pub fn stream_object(dict_entries: &str, data: &[u8]) -> Vec<u8> {
    let mut body = format!("<< /Length {} {} >>\nstream\n", data.len(), dict_entries).into_bytes();
    body.extend_from_slice(data);
    body.extend_from_slice(b"\nendstream");
    body
}

/// Builds a PDF from object bodies, writing a classic xref table with computed offsets.
///
/// `trailer_entries` is spliced into the trailer dictionary after `/Size`.
pub fn build_pdf(objects: &[(u32, Vec<u8>)], trailer_entries: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let max = objects.iter().map(|(n, _)| *n).max().unwrap_or(0);
    let mut offsets = vec![None; max as usize + 1];

    for (number, body) in objects {
        offsets[*number as usize] = Some(out.len());
        out.extend_from_slice(format!("{number} 0 obj\n").as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }

    let xref_start = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n", max + 1).as_bytes());
    for offset in &offsets {
        match offset {
            Some(o) => out.extend_from_slice(format!("{o:010} 00000 n \n").as_bytes()),
            None => out.extend_from_slice(b"0000000000 65535 f \n"),
        }
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} {} >>\nstartxref\n{}\n%%EOF\n",
            max + 1,
            trailer_entries,
            xref_start
        )
        .as_bytes(),
    );
    out
}

/// Creates a minimal valid PDF with no pages
pub fn create_minimal_pdf() -> Vec<u8> {
    build_pdf(
        &[
            (1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()),
            (2, b"<< /Type /Pages /Kids [] /Count 0 >>".to_vec()),
        ],
        "/Root 1 0 R",
    )
}

/// Creates a PDF with one page per entry, each showing its text in Helvetica
pub fn create_text_pdf(pages: &[&str]) -> Vec<u8> {
    let mut objects = vec![(
        3,
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>".to_vec(),
    )];
    let mut kids = Vec::new();
    for (i, text) in pages.iter().enumerate() {
        let page_num = 4 + 2 * i as u32;
        let content_num = page_num + 1;
        kids.push(format!("{page_num} 0 R"));
        objects.push((
            page_num,
            format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
                 /Resources << /Font << /F1 3 0 R >> >> /Contents {content_num} 0 R >>"
            )
            .into_bytes(),
        ));
        let content = format!("BT /F1 12 Tf 72 720 Td ({text}) Tj ET");
        objects.push((content_num, stream_object("", content.as_bytes())));
    }
    objects.push((1, b"<< /Type /Catalog /Pages 2 0 R >>".to_vec()));
    objects.push((
        2,
        format!(
            "<< /Type /Pages /Kids [{}] /Count {} >>",
            kids.join(" "),
            pages.len()
        )
        .into_bytes(),
    ));
    build_pdf(&objects, "/Root 1 0 R")
}
