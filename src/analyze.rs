use std::ops::Range;
use std::path::Path;

use crate::docx::{
    Package, WML_NS, body, body_paragraphs, content_width_pt, drawing_properties,
    image_references, level_from_outline, paragraph_text, parse_styles, wml, wml_attr,
};
use crate::error::Error;
use crate::model::{NodeKind, StructuralNode};

/// Snapshot of a target document's addressable structure. Valid only for the
/// unmodified document it was taken from.
#[derive(Clone, Debug)]
pub struct Structure {
    pub nodes: Vec<StructuralNode>,
    /// Page width minus side margins, in points.
    pub content_width_pt: f32,
    /// Pictures already present in the body.
    pub existing_drawings: usize,
    /// Highest `wp:docPr` id in use; new drawings are numbered above it.
    pub max_drawing_id: u32,
    /// Byte range of each node's `w:p` element in word/document.xml.
    pub(crate) anchors: Vec<Range<usize>>,
    pub(crate) document_len: usize,
    /// Prefix the document binds to the WordprocessingML namespace.
    pub(crate) wml_prefix: Option<String>,
}

impl Structure {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: usize) -> Option<&StructuralNode> {
        self.nodes.get(id)
    }

    pub fn headings(&self) -> impl Iterator<Item = &StructuralNode> {
        self.nodes.iter().filter(|n| n.heading_level().is_some())
    }

    /// Runs of consecutive blank-gap nodes, as id ranges.
    pub fn blank_gap_runs(&self) -> Vec<Range<usize>> {
        let mut runs: Vec<Range<usize>> = Vec::new();
        for node in self.nodes.iter().filter(|n| n.is_blank_gap()) {
            match runs.last_mut() {
                Some(run) if run.end == node.id => run.end += 1,
                _ => runs.push(node.id..node.id + 1),
            }
        }
        runs
    }
}

pub fn analyze(path: &Path) -> Result<Structure, Error> {
    let package = Package::open(path)?;
    analyze_package(&package)
}

pub fn analyze_package(package: &Package) -> Result<Structure, Error> {
    let styles = parse_styles(package)?;
    let xml_content = package.document_xml()?;
    let xml = roxmltree::Document::parse(xml_content)?;
    let body = body(&xml)?;

    let mut nodes = Vec::new();
    let mut anchors = Vec::new();

    for (id, para) in body_paragraphs(body).into_iter().enumerate() {
        let ppr = wml(para, "pPr");
        let style_id = styles.resolve_style_id(ppr.and_then(|n| wml_attr(n, "pStyle")));

        let direct_outline = ppr
            .and_then(|n| wml_attr(n, "outlineLvl"))
            .and_then(|v| v.parse::<u8>().ok());
        let heading_level = match direct_outline {
            Some(outline) => level_from_outline(outline),
            None => style_id.and_then(|id| styles.heading_level(id)),
        };

        let text = paragraph_text(para).trim().to_string();
        let has_drawing = !image_references(para).is_empty();

        let kind = match heading_level {
            Some(level) => NodeKind::Heading(level),
            None if text.is_empty() && !has_drawing => NodeKind::BlankGap,
            None => NodeKind::Paragraph,
        };

        nodes.push(StructuralNode {
            id,
            kind,
            text,
            style: style_id.map(|id| styles.style_name(id).unwrap_or(id).to_string()),
            has_drawing,
        });
        anchors.push(para.range());
    }

    let drawings = drawing_properties(body);
    let structure = Structure {
        nodes,
        content_width_pt: content_width_pt(body),
        existing_drawings: image_references(body).len(),
        max_drawing_id: drawings.iter().map(|(id, _)| *id).max().unwrap_or(0),
        anchors,
        document_len: xml_content.len(),
        wml_prefix: xml
            .root_element()
            .lookup_prefix(WML_NS)
            .map(str::to_string),
    };

    log::info!(
        "Analyzed target: {} nodes, {} headings, {} blank gaps, content width {:.0}pt",
        structure.len(),
        structure.headings().count(),
        structure.nodes.iter().filter(|n| n.is_blank_gap()).count(),
        structure.content_width_pt,
    );
    Ok(structure)
}
