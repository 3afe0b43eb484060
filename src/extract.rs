use std::collections::HashSet;
use std::io::Cursor;
use std::path::Path;

use crate::docx::{Package, body, document_relationships, image_references, resolve_part_target};
use crate::error::Error;
use crate::model::ImageAsset;

/// Extract every image the source document's main part refers to. Images are
/// ordered as they first appear in the body; image relationships the body
/// never references follow in relationship order. Each payload is also
/// written to `out_dir` as `image_<ordinal>.<ext>`.
pub fn extract_images(source: &Path, out_dir: &Path) -> Result<Vec<ImageAsset>, Error> {
    let package = Package::open(source)?;
    extract_from_package(&package, out_dir)
}

pub fn extract_from_package(package: &Package, out_dir: &Path) -> Result<Vec<ImageAsset>, Error> {
    let rels = document_relationships(package)?;
    let image_rels: Vec<_> = rels.iter().filter(|r| r.is_image()).collect();

    let xml_content = package.document_xml()?;
    let xml = roxmltree::Document::parse(xml_content)?;
    let body = body(&xml)?;

    let mut ordered: Vec<&str> = Vec::new();
    for rel_id in image_references(body) {
        if !ordered.contains(&rel_id) && image_rels.iter().any(|r| r.id == rel_id) {
            ordered.push(rel_id);
        }
    }
    for rel in &image_rels {
        if !ordered.contains(&rel.id.as_str()) {
            ordered.push(rel.id.as_str());
        }
    }

    std::fs::create_dir_all(out_dir)?;

    let mut seen_parts = HashSet::new();
    let mut assets = Vec::new();
    for rel_id in ordered {
        let Some(rel) = image_rels.iter().find(|r| r.id == rel_id) else {
            continue;
        };
        let part_name = resolve_part_target(&rel.target);
        // Several relationships may point at one media part.
        if !seen_parts.insert(part_name.clone()) {
            continue;
        }
        let Some(data) = package.part(&part_name) else {
            log::warn!("Relationship {} points at missing part {part_name}, skipping", rel.id);
            continue;
        };

        let ordinal = assets.len();
        let extension = extension_of(&part_name);
        let file_name = format!("image_{ordinal}.{extension}");
        let path = out_dir.join(&file_name);
        std::fs::write(&path, data)?;

        let dimensions = image::ImageReader::new(Cursor::new(data))
            .with_guessed_format()
            .ok()
            .and_then(|reader| reader.into_dimensions().ok());
        if dimensions.is_none() {
            log::warn!("Cannot read dimensions of {file_name} ({part_name})");
        }

        log::debug!("Extracted {file_name} from {part_name} ({} bytes)", data.len());
        assets.push(ImageAsset {
            id: ordinal,
            ordinal,
            content_type: content_type_for(&extension).to_string(),
            file_name,
            extension,
            path,
            data: data.to_vec(),
            pixel_width: dimensions.map(|(w, _)| w),
            pixel_height: dimensions.map(|(_, h)| h),
        });
    }

    log::info!("Extracted {} images to {}", assets.len(), out_dir.display());
    Ok(assets)
}

fn extension_of(part_name: &str) -> String {
    let ext = part_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string());
    if ext == "jpeg" { "jpg".to_string() } else { ext }
}

pub(crate) fn content_type_for(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "bmp" => "image/bmp",
        "tif" | "tiff" => "image/tiff",
        "webp" => "image/webp",
        "emf" => "image/x-emf",
        "wmf" => "image/x-wmf",
        "svg" => "image/svg+xml",
        _ => "application/octet-stream",
    }
}
