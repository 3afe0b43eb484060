mod common;

use common::{DocxBuilder, corrupt_png, jpeg, png, sample_source};
use docx_place::extract_images;

#[test]
fn images_in_document_order_with_dimensions() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let source = sample_source(3).write(&dir.path().join("source.docx"));
    let out = dir.path().join("images");

    let assets = extract_images(&source, &out).unwrap();
    assert_eq!(assets.len(), 3);
    for (i, asset) in assets.iter().enumerate() {
        assert_eq!(asset.id, i);
        assert_eq!(asset.ordinal, i);
        assert_eq!(asset.extension, "png");
        assert_eq!(asset.content_type, "image/png");
        assert_eq!(asset.file_name, format!("image_{i}.png"));
        assert_eq!(std::fs::read(&asset.path).unwrap(), asset.data);
    }
    assert_eq!(assets[0].dimensions(), Some((40, 30)));
    assert_eq!(assets[2].dimensions(), Some((60, 40)));
}

#[test]
fn vml_and_unreferenced_images() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let source = DocxBuilder::new()
        .unreferenced_image(png(5, 5, [0, 0, 0, 255]), "png")
        .vml_image(jpeg(12, 6), "jpeg")
        .image(png(7, 3, [255, 0, 0, 255]), "png")
        .write(&dir.path().join("mixed.docx"));

    let assets = extract_images(&source, &dir.path().join("images")).unwrap();
    let sizes: Vec<_> = assets.iter().map(|a| a.dimensions()).collect();
    // Body order first, then the image the body never references.
    assert_eq!(sizes, vec![Some((12, 6)), Some((7, 3)), Some((5, 5))]);
    assert_eq!(assets[0].extension, "jpg");
    assert_eq!(assets[0].content_type, "image/jpeg");
}

#[test]
fn undecodable_images_are_still_extracted() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let source = DocxBuilder::new()
        .image(corrupt_png(), "png")
        .write(&dir.path().join("corrupt.docx"));

    let assets = extract_images(&source, &dir.path().join("images")).unwrap();
    assert_eq!(assets.len(), 1);
    assert_eq!(assets[0].dimensions(), None);
    assert_eq!(assets[0].data, corrupt_png());
}

#[test]
fn document_without_images() {
    let _ = env_logger::try_init();
    let dir = tempfile::tempdir().unwrap();
    let source = DocxBuilder::new()
        .para("No pictures here")
        .write(&dir.path().join("plain.docx"));

    let assets = extract_images(&source, &dir.path().join("images")).unwrap();
    assert!(assets.is_empty());
}
