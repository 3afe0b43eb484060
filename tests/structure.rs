mod common;

use std::io::{Cursor, Write};

use common::{DocxBuilder, png, sample_target};
use docx_place::model::NodeKind;
use docx_place::{Error, analyze};

#[test]
fn sample_target_nodes() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = sample_target().write(&dir.path().join("target.docx"));

    let structure = analyze(&target).unwrap();
    assert_eq!(structure.len(), 12);
    for (i, node) in structure.nodes.iter().enumerate() {
        assert_eq!(node.id, i, "ids must be contiguous from 0");
    }

    let kinds: Vec<NodeKind> = structure.nodes.iter().map(|n| n.kind).collect();
    use NodeKind::*;
    assert_eq!(
        kinds,
        vec![
            Heading(1),
            Paragraph,
            BlankGap,
            Heading(2),
            Paragraph,
            BlankGap,
            BlankGap,
            Heading(2),
            Paragraph,
            BlankGap,
            Heading(1),
            Paragraph,
        ]
    );
    assert_eq!(structure.nodes[0].text, "Project Overview");
    assert_eq!(structure.nodes[0].style.as_deref(), Some("heading 1"));
    assert_eq!(structure.headings().count(), 4);
    assert_eq!(structure.blank_gap_runs(), vec![2..3, 5..7, 9..10]);
    // US Letter with one-inch margins.
    assert_eq!(structure.content_width_pt, 468.0);
    assert_eq!(structure.existing_drawings, 0);
}

#[test]
fn reanalysis_is_identical() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = sample_target().write(&dir.path().join("target.docx"));

    let first = analyze(&target).unwrap();
    let second = analyze(&target).unwrap();
    assert_eq!(first.nodes, second.nodes);
    assert_eq!(first.max_drawing_id, second.max_drawing_id);
}

#[test]
fn heading_levels_from_styles_and_outline() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = DocxBuilder::new()
        .styled("ChapterTitle", "Inherited from Heading2")
        .outline(0, "Direct outline level")
        .styled("BodyNote", "Outline level 9 is body text")
        .heading(3, "Named heading without outline")
        .styled("Heading4", "Unknown style id that reads as a heading")
        .raw(r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/><w:outlineLvl w:val="9"/></w:pPr><w:r><w:t>Demoted</w:t></w:r></w:p>"#)
        .para("Plain")
        .write(&dir.path().join("headings.docx"));

    let structure = analyze(&target).unwrap();
    let kinds: Vec<NodeKind> = structure.nodes.iter().map(|n| n.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::Heading(2),
            NodeKind::Heading(1),
            NodeKind::Paragraph,
            NodeKind::Heading(3),
            NodeKind::Heading(4),
            NodeKind::Paragraph,
            NodeKind::Paragraph,
        ]
    );
}

#[test]
fn pictures_and_whitespace() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = DocxBuilder::new()
        .para("Intro")
        .spaces()
        .image(png(8, 8, [0, 0, 0, 255]), "png")
        .blank()
        .write(&dir.path().join("pictures.docx"));

    let structure = analyze(&target).unwrap();
    assert_eq!(structure.len(), 4);
    assert_eq!(structure.nodes[1].kind, NodeKind::BlankGap);
    // A picture-only paragraph has no text but is not a gap.
    assert_eq!(structure.nodes[2].kind, NodeKind::Paragraph);
    assert!(structure.nodes[2].has_drawing);
    assert_eq!(structure.nodes[3].kind, NodeKind::BlankGap);
    assert_eq!(structure.existing_drawings, 1);
    assert_eq!(structure.max_drawing_id, 1);
}

#[test]
fn table_paragraphs_are_not_nodes() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = DocxBuilder::new()
        .para("Before the table")
        .table("Inside a cell")
        .para("After the table")
        .write(&dir.path().join("table.docx"));

    let structure = analyze(&target).unwrap();
    let texts: Vec<&str> = structure.nodes.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texts, vec!["Before the table", "After the table"]);
}

#[test]
fn content_control_paragraphs_are_nodes() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = DocxBuilder::new()
        .para("Intro")
        .raw(concat!(
            "<w:sdt><w:sdtPr><w:alias w:val=\"Summary\"/></w:sdtPr><w:sdtContent>",
            "<w:p><w:pPr><w:pStyle w:val=\"Heading2\"/></w:pPr><w:r><w:t>Inside SDT</w:t></w:r></w:p>",
            "<w:p/>",
            "</w:sdtContent></w:sdt>",
        ))
        .para("Outro")
        .write(&dir.path().join("sdt.docx"));

    let structure = analyze(&target).unwrap();
    let texts: Vec<&str> = structure.nodes.iter().map(|n| n.text.as_str()).collect();
    assert_eq!(texts, vec!["Intro", "Inside SDT", "", "Outro"]);
    assert_eq!(structure.nodes[1].kind, NodeKind::Heading(2));
    assert_eq!(structure.nodes[2].kind, NodeKind::BlankGap);
}

#[test]
fn custom_wml_prefix() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let target = sample_target()
        .wml_prefix("ns0")
        .write(&dir.path().join("prefixed.docx"));

    let structure = analyze(&target).unwrap();
    assert_eq!(structure.len(), 12);
    assert_eq!(structure.nodes[3].kind, NodeKind::Heading(2));
}

#[test]
fn malformed_documents_are_rejected() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();

    let not_zip = dir.path().join("not_zip.docx");
    std::fs::write(&not_zip, b"plain text, not a package").unwrap();
    assert!(matches!(analyze(&not_zip), Err(Error::MalformedDocument(_))));

    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    zip.start_file("hello.txt", zip::write::SimpleFileOptions::default())
        .unwrap();
    zip.write_all(b"hi").unwrap();
    let no_document = dir.path().join("no_document.docx");
    std::fs::write(&no_document, zip.finish().unwrap().into_inner()).unwrap();
    assert!(matches!(analyze(&no_document), Err(Error::MalformedDocument(_))));

    let broken = DocxBuilder::new()
        .raw("<w:p><w:r><w:t>unclosed")
        .write(&dir.path().join("broken.docx"));
    assert!(matches!(analyze(&broken), Err(Error::MalformedDocument(_))));

    let missing = dir.path().join("missing.docx");
    assert!(matches!(analyze(&missing), Err(Error::Io(_))));
}
