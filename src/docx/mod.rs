mod drawing;
mod styles;

pub(crate) use drawing::{
    ImageParagraph, add_image_relationship, ensure_default_content_type, image_paragraph_xml,
    next_relationship_id, parse_placed_image_name, placed_image_name,
};
pub(crate) use styles::{level_from_outline, parse_styles};

use std::io::{Cursor, Read, Write};
use std::path::Path;

use zip::CompressionMethod;
use zip::write::SimpleFileOptions;

use crate::error::Error;

pub(crate) const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
pub(crate) const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
pub(crate) const WPD_NS: &str =
    "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
pub(crate) const REL_NS: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const VML_NS: &str = "urn:schemas-microsoft-com:vml";

pub(crate) const IMAGE_REL_TYPE: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/image";

pub(crate) const DOCUMENT_PART: &str = "word/document.xml";
pub(crate) const DOCUMENT_RELS_PART: &str = "word/_rels/document.xml.rels";
pub(crate) const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
pub(crate) const STYLES_PART: &str = "word/styles.xml";

/// Content width used when the document carries no section geometry (6 inches).
pub(crate) const DEFAULT_CONTENT_WIDTH_PT: f32 = 432.0;

pub(crate) fn twips_to_pts(twips: f32) -> f32 {
    twips / 20.0
}

pub(crate) fn wml<'a>(node: roxmltree::Node<'a, 'a>, name: &str) -> Option<roxmltree::Node<'a, 'a>> {
    node.children()
        .find(|n| n.tag_name().name() == name && n.tag_name().namespace() == Some(WML_NS))
}

pub(crate) fn wml_attr<'a>(node: roxmltree::Node<'a, 'a>, child: &str) -> Option<&'a str> {
    wml(node, child).and_then(|n| n.attribute((WML_NS, "val")))
}

pub(crate) fn twips_attr(node: roxmltree::Node, attr: &str) -> Option<f32> {
    node.attribute((WML_NS, attr))
        .and_then(|v| v.parse::<f32>().ok())
        .map(twips_to_pts)
}

fn is_wml(node: roxmltree::Node, name: &str) -> bool {
    node.tag_name().name() == name && node.tag_name().namespace() == Some(WML_NS)
}

struct PackageEntry {
    name: String,
    data: Vec<u8>,
    compression: CompressionMethod,
    is_dir: bool,
}

/// A DOCX (OPC) package held in memory, entries kept in archive order so a
/// rewrite reproduces the original layout.
pub struct Package {
    entries: Vec<PackageEntry>,
}

impl Package {
    pub fn open(path: &Path) -> Result<Self, Error> {
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound | std::io::ErrorKind::PermissionDenied => Error::Io(
                std::io::Error::new(e.kind(), format!("{}: {}", e, path.display())),
            ),
            _ => Error::Io(e),
        })?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|_| Error::MalformedDocument("file is not a ZIP archive".into()))?;

        let mut entries = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let mut file = zip.by_index(i)?;
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            let compression = match file.compression() {
                CompressionMethod::Stored => CompressionMethod::Stored,
                _ => CompressionMethod::Deflated,
            };
            entries.push(PackageEntry {
                name: file.name().to_string(),
                data,
                compression,
                is_dir: file.is_dir(),
            });
        }

        let package = Package { entries };
        if !package.contains(DOCUMENT_PART) {
            return Err(Error::MalformedDocument(
                "missing word/document.xml (is this a DOCX file?)".into(),
            ));
        }
        Ok(package)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| !e.is_dir && e.name == name)
    }

    pub fn part(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|e| !e.is_dir && e.name == name)
            .map(|e| e.data.as_slice())
    }

    /// UTF-8 text of an XML part, `None` when the part is absent.
    pub fn part_text(&self, name: &str) -> Result<Option<&str>, Error> {
        let Some(data) = self.part(name) else {
            return Ok(None);
        };
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::MalformedDocument(format!("{name} is not valid UTF-8")))?;
        Ok(Some(text.strip_prefix('\u{feff}').unwrap_or(text)))
    }

    pub(crate) fn document_xml(&self) -> Result<&str, Error> {
        self.part_text(DOCUMENT_PART)?.ok_or_else(|| {
            Error::MalformedDocument("missing word/document.xml (is this a DOCX file?)".into())
        })
    }

    /// Replace a part's bytes, or append a new part.
    pub fn put_part(&mut self, name: &str, data: Vec<u8>) {
        if let Some(entry) = self.entries.iter_mut().find(|e| !e.is_dir && e.name == name) {
            entry.data = data;
            return;
        }
        // Media is already compressed; XML parts deflate well.
        let compression = if name.ends_with(".xml") || name.ends_with(".rels") {
            CompressionMethod::Deflated
        } else {
            CompressionMethod::Stored
        };
        self.entries.push(PackageEntry {
            name: name.to_string(),
            data,
            compression,
            is_dir: false,
        });
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        for entry in &self.entries {
            let options = SimpleFileOptions::default().compression_method(entry.compression);
            if entry.is_dir {
                writer.add_directory(entry.name.as_str(), options)?;
                continue;
            }
            writer.start_file(entry.name.as_str(), options)?;
            writer.write_all(&entry.data)?;
        }
        Ok(writer.finish()?.into_inner())
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Relationship {
    pub(crate) id: String,
    pub(crate) rel_type: String,
    pub(crate) target: String,
    pub(crate) external: bool,
}

impl Relationship {
    pub(crate) fn is_image(&self) -> bool {
        !self.external && self.rel_type.ends_with("/image")
    }
}

pub(crate) fn parse_rels_xml(xml_content: &str) -> Result<Vec<Relationship>, Error> {
    let xml = roxmltree::Document::parse(xml_content)?;
    let mut rels = Vec::new();
    for node in xml.root_element().children() {
        if node.tag_name().name() == "Relationship"
            && let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target"))
        {
            rels.push(Relationship {
                id: id.to_string(),
                rel_type: node.attribute("Type").unwrap_or_default().to_string(),
                target: target.to_string(),
                external: node.attribute("TargetMode") == Some("External"),
            });
        }
    }
    Ok(rels)
}

pub(crate) fn document_relationships(package: &Package) -> Result<Vec<Relationship>, Error> {
    match package.part_text(DOCUMENT_RELS_PART)? {
        Some(xml) => parse_rels_xml(xml),
        None => Ok(Vec::new()),
    }
}

/// Resolve a relationship target of word/document.xml to a package part name.
pub(crate) fn resolve_part_target(target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = vec!["word"];
    for seg in target.split('/') {
        match seg {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    segments.join("/")
}

pub(crate) fn body<'a>(xml: &'a roxmltree::Document<'a>) -> Result<roxmltree::Node<'a, 'a>, Error> {
    let root = xml.root_element();
    if !is_wml(root, "document") {
        return Err(Error::MalformedDocument(
            "word/document.xml root is not w:document".into(),
        ));
    }
    wml(root, "body").ok_or_else(|| Error::MalformedDocument("missing w:body".into()))
}

/// Flatten SDT wrappers: descend into w:sdtContent and collect effective children.
fn collect_block_nodes<'a>(parent: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    let mut nodes = Vec::new();
    for child in parent.children() {
        if is_wml(child, "sdt") {
            if let Some(content) = wml(child, "sdtContent") {
                nodes.extend(collect_block_nodes(content));
            }
        } else {
            nodes.push(child);
        }
    }
    nodes
}

/// Body-level paragraphs in document order. Paragraphs inside tables are not
/// addressable.
pub(crate) fn body_paragraphs<'a>(body: roxmltree::Node<'a, 'a>) -> Vec<roxmltree::Node<'a, 'a>> {
    collect_block_nodes(body)
        .into_iter()
        .filter(|n| is_wml(*n, "p"))
        .collect()
}

pub(crate) fn paragraph_text(para: roxmltree::Node) -> String {
    let mut text = String::new();
    for node in para.descendants() {
        if node.tag_name().namespace() != Some(WML_NS) {
            continue;
        }
        match node.tag_name().name() {
            "t" => text.push_str(node.text().unwrap_or_default()),
            "tab" if node.parent().is_some_and(|p| is_wml(p, "r")) => text.push('\t'),
            "br" | "cr" => text.push('\n'),
            _ => {}
        }
    }
    text
}

/// Relationship ids of every image reference under `node`, in document order.
/// Covers DrawingML blips and legacy VML image data.
pub(crate) fn image_references<'a>(node: roxmltree::Node<'a, 'a>) -> Vec<&'a str> {
    node.descendants()
        .filter_map(|n| {
            let tag = n.tag_name();
            match (tag.namespace(), tag.name()) {
                (Some(DML_NS), "blip") => n.attribute((REL_NS, "embed")),
                (Some(VML_NS), "imagedata") => n.attribute((REL_NS, "id")),
                _ => None,
            }
        })
        .collect()
}

/// `(id, name)` of every `wp:docPr` under `node`.
pub(crate) fn drawing_properties<'a>(node: roxmltree::Node<'a, 'a>) -> Vec<(u32, &'a str)> {
    node.descendants()
        .filter(|n| n.tag_name().name() == "docPr" && n.tag_name().namespace() == Some(WPD_NS))
        .map(|n| {
            let id = n.attribute("id").and_then(|v| v.parse().ok()).unwrap_or(0);
            (id, n.attribute("name").unwrap_or_default())
        })
        .collect()
}

/// Usable text width of the final section: page width minus side margins.
pub(crate) fn content_width_pt(body: roxmltree::Node) -> f32 {
    let Some(sect) = wml(body, "sectPr") else {
        return DEFAULT_CONTENT_WIDTH_PT;
    };
    let pg_sz = wml(sect, "pgSz");
    let pg_mar = wml(sect, "pgMar");

    let page_width = pg_sz.and_then(|n| twips_attr(n, "w")).unwrap_or(612.0);
    let margin_left = pg_mar
        .and_then(|n| twips_attr(n, "left").or_else(|| twips_attr(n, "start")))
        .unwrap_or(90.0);
    let margin_right = pg_mar
        .and_then(|n| twips_attr(n, "right").or_else(|| twips_attr(n, "end")))
        .unwrap_or(90.0);

    let width = page_width - margin_left - margin_right;
    if width > 0.0 { width } else { DEFAULT_CONTENT_WIDTH_PT }
}
