//! Loading documents with the various cross-reference and compression layouts

mod common;

use common::{flate_stream, incremental_update, stream, text_document, PdfBuilder};
use pdf_equivalence::compare::are_equivalent;
use pdf_equivalence::{load_document, load_document_with_options, LoadError, LoadOptions, PdfReader};
use pretty_assertions::assert_eq;

fn catalog_and_single_page(page_entries: &str) -> PdfBuilder {
    PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            format!(
                "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 4 0 R >> >> {page_entries} >>"
            ),
        )
        .object(4, "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica >>")
}

#[cfg(feature = "compression")]
#[test]
fn test_flate_compressed_content() {
    let data = catalog_and_single_page("/Contents 5 0 R")
        .object(5, flate_stream("", b"BT /F1 12 Tf 72 720 Td (Compressed text) Tj ET"))
        .build("/Root 1 0 R");

    let model = load_document(&data).unwrap();
    assert_eq!(model.page_text(1), Some("Compressed text"));
}

#[cfg(feature = "compression")]
#[test]
fn test_xref_stream_with_object_stream() {
    let data = PdfBuilder::new()
        .object(3, stream("", b"BT /F1 12 Tf 72 720 Td (Packed) Tj ET"))
        .compressed_object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .compressed_object(2, "<< /Type /Pages /Kids [4 0 R] /Count 1 >>")
        .compressed_object(
            4,
            "<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 5 0 R >> >> /Contents 3 0 R >>",
        )
        .compressed_object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Courier >>")
        .build_xref_stream("/Root 1 0 R");

    let reader = PdfReader::from_bytes(&data, LoadOptions::strict()).unwrap();
    assert!(!reader.is_reconstructed());
    assert_eq!(reader.version(), "1.5");

    let model = load_document_with_options(&data, &LoadOptions::strict()).unwrap();
    assert_eq!(model.page_count(), 1);
    assert_eq!(model.page_text(1), Some("Packed"));
    assert!(model.page_fonts(1).unwrap().contains("Courier"));
}

#[cfg(feature = "compression")]
#[test]
fn test_same_document_in_both_xref_layouts() {
    let classic = text_document(&["one", "two"]).build("/Root 1 0 R");
    let streamed = text_document(&["one", "two"]).build_xref_stream("/Root 1 0 R");

    let a = load_document_with_options(&classic, &LoadOptions::strict()).unwrap();
    let b = load_document_with_options(&streamed, &LoadOptions::strict()).unwrap();
    assert_eq!(a, b);
    assert!(are_equivalent(&a, &b));
}

#[test]
fn test_prev_chain_newest_revision_wins() {
    let base = text_document(&["first draft"]).build("/Root 1 0 R");
    let updated = incremental_update(
        &base,
        &[(11, stream("", b"BT /F1 12 Tf 72 720 Td (final text) Tj ET"))],
        "/Root 1 0 R",
    );

    let before = load_document_with_options(&base, &LoadOptions::strict()).unwrap();
    let after = load_document_with_options(&updated, &LoadOptions::strict()).unwrap();

    assert_eq!(before.page_text(1), Some("first draft"));
    assert_eq!(after.page_text(1), Some("final text"));
}

#[test]
fn test_prev_chain_adds_pages() {
    let base = text_document(&["a"]).build("/Root 1 0 R");
    let updated = incremental_update(
        &base,
        &[
            (2, b"<< /Type /Pages /Kids [10 0 R 30 0 R] /Count 2 >>".to_vec()),
            (
                30,
                b"<< /Type /Page /Parent 2 0 R /Resources << /Font << /F1 3 0 R >> >> /Contents 31 0 R >>"
                    .to_vec(),
            ),
            (31, stream("", b"BT /F1 12 Tf (b) Tj ET")),
        ],
        "/Root 1 0 R",
    );

    let model = load_document_with_options(&updated, &LoadOptions::strict()).unwrap();
    assert_eq!(model.page_count(), 2);
    assert_eq!(model.full_text(), "ab");
}

#[test]
fn test_reconstruction_of_broken_xref() {
    let mut data = text_document(&["recovered"]).build("/Root 1 0 R");
    let marker = data.windows(9).rposition(|w| w == b"startxref").unwrap();
    data.truncate(marker);
    data.extend_from_slice(b"startxref\n123456789\n%%EOF\n");

    assert!(matches!(
        load_document_with_options(&data, &LoadOptions::strict()),
        Err(LoadError::UnreadableDocument(_))
    ));

    let reader = PdfReader::from_bytes(&data, LoadOptions::lenient()).unwrap();
    assert!(reader.is_reconstructed());
    let model = load_document(&data).unwrap();
    assert_eq!(model.page_text(1), Some("recovered"));
}

#[test]
fn test_objects_without_xref_or_trailer_are_unreadable() {
    let data = b"%PDF-1.3\n\
        1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n\
        2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n\
        3 0 obj << /Type /Page /Parent 2 0 R /Contents 4 0 R >> endobj\n\
        4 0 obj << /Length 999 >>\nstream\nBT (bare) Tj ET\nendstream\nendobj\n";

    assert!(matches!(load_document(data), Err(LoadError::UnreadableDocument(_))));
}

/// Everything from the cross-reference table onwards removed
fn cut_before_xref(data: &[u8]) -> Vec<u8> {
    let at = data.windows(6).rposition(|w| w == b"\nxref\n").unwrap();
    data[..at].to_vec()
}

#[test]
fn test_cut_off_trailer_is_unreadable() {
    let data = cut_before_xref(&text_document(&["Hello"]).build("/Root 1 0 R"));

    assert!(matches!(load_document(&data), Err(LoadError::UnreadableDocument(_))));
    assert!(matches!(
        load_document_with_options(&data, &LoadOptions::strict()),
        Err(LoadError::UnreadableDocument(_))
    ));
}

#[test]
fn test_cut_off_trailer_never_exposes_encrypted_text() {
    let data = text_document(&["secret"])
        .object(50, "<< /Filter /Standard /V 1 /R 2 /O (x) /U (y) /P -4 >>")
        .build("/Root 1 0 R /Encrypt 50 0 R");

    assert!(matches!(load_document(&data), Err(LoadError::EncryptedDocument)));
    assert!(matches!(
        load_document(&cut_before_xref(&data)),
        Err(LoadError::UnreadableDocument(_))
    ));
}

#[test]
fn test_cyclic_page_tree() {
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Pages /Kids [2 0 R] /Count 1 >>")
        .build("/Root 1 0 R");

    assert!(matches!(
        load_document(&data),
        Err(LoadError::StructuralLimitExceeded(_))
    ));
}

#[test]
fn test_page_limit() {
    let data = text_document(&["a", "b", "c"]).build("/Root 1 0 R");
    let options = LoadOptions::default().with_max_pages(2);

    assert!(matches!(
        load_document_with_options(&data, &options),
        Err(LoadError::StructuralLimitExceeded(_))
    ));
}

#[test]
fn test_inherited_resources() {
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(
            2,
            "<< /Type /Pages /Kids [3 0 R] /Count 1 /Resources << /Font << /F1 5 0 R >> >> >>",
        )
        .object(3, "<< /Type /Pages /Parent 2 0 R /Kids [4 0 R] /Count 1 >>")
        .object(4, "<< /Type /Page /Parent 3 0 R /Contents 6 0 R >>")
        .object(5, "<< /Type /Font /Subtype /Type1 /BaseFont /Times-Roman >>")
        .object(6, stream("", b"BT /F1 12 Tf (inherited) Tj ET"))
        .build("/Root 1 0 R");

    let model = load_document(&data).unwrap();
    assert_eq!(model.page_text(1), Some("inherited"));
    assert!(model.page_fonts(1).unwrap().contains("Times-Roman"));
    assert!(model.warnings().is_empty());
}

#[test]
fn test_to_unicode_and_forms() {
    let cmap = b"/CIDInit /ProcSet findresource begin 12 dict begin begincmap\n\
        1 begincodespacerange <0000> <FFFF> endcodespacerange\n\
        2 beginbfchar <0001> <0048> <0002> <0069> endbfchar\n\
        endcmap CMapName currentdict /CMap defineresource pop end end";
    let data = PdfBuilder::new()
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /Contents 4 0 R \
             /Resources << /Font << /F1 5 0 R >> /XObject << /Fm0 8 0 R >> >> >>",
        )
        .object(4, stream("", b"BT /F1 12 Tf 72 720 Td <00010002> Tj ET /Fm0 Do"))
        .object(
            5,
            "<< /Type /Font /Subtype /Type0 /BaseFont /ABCDEF+NotoSans \
             /Encoding /Identity-H /DescendantFonts [6 0 R] /ToUnicode 7 0 R >>",
        )
        .object(
            6,
            "<< /Type /Font /Subtype /CIDFontType2 /BaseFont /ABCDEF+NotoSans \
             /FontDescriptor 9 0 R >>",
        )
        .object(7, stream("", cmap))
        .object(
            8,
            stream(
                "/Type /XObject /Subtype /Form /BBox [0 0 100 100]",
                b"BT /F1 12 Tf 0 -20 Td <0002> Tj ET",
            ),
        )
        .object(9, "<< /Type /FontDescriptor /FontName /ABCDEF+NotoSans >>")
        .build("/Root 1 0 R");

    let model = load_document(&data).unwrap();
    assert_eq!(model.page_text(1), Some("Hi\ni"));
    let fonts: Vec<&str> = model.page_fonts(1).unwrap().iter().map(String::as_str).collect();
    assert_eq!(fonts, vec!["ABCDEF+NotoSans"]);
}

#[test]
fn test_damaged_content_degrades_to_warnings() {
    let data = catalog_and_single_page("/Contents [5 0 R 6 0 R 7 0 R]")
        .object(5, stream("", b"BT /F1 12 Tf 72 720 Td (kept) Tj ET"))
        .object(6, stream("/Filter /FlateDecode", b"definitely not zlib"))
        .object(7, stream("", b"BT /F1 12 Tf 72 700 Td (also kept) Tj ET"))
        .build("/Root 1 0 R");

    let model = load_document(&data).unwrap();
    assert_eq!(model.page_text(1), Some("kept\nalso kept"));
    assert_eq!(model.warnings().len(), 1);
    assert!(model.warnings()[0].starts_with("page 1: "));
}

#[cfg(feature = "compression")]
#[test]
fn test_oversized_content_stream_is_skipped() {
    let data = catalog_and_single_page("/Contents [5 0 R 6 0 R]")
        .object(5, flate_stream("", &vec![b' '; 100_000]))
        .object(6, stream("", b"BT /F1 12 Tf (small) Tj ET"))
        .build("/Root 1 0 R");

    let options = LoadOptions::default().with_max_stream_size(10_000);
    let model = load_document_with_options(&data, &options).unwrap();
    assert_eq!(model.page_text(1), Some("small"));
    assert_eq!(model.warnings().len(), 1);
}

#[test]
fn test_missing_file() {
    let result = PdfReader::open("/no/such/file.pdf", LoadOptions::default());
    assert!(matches!(result, Err(LoadError::Io(_))));
}
