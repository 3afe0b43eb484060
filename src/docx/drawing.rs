//! XML fragments for inline pictures and the package bookkeeping that goes
//! with them (relationships, content types).

use crate::error::Error;
use crate::model::Alignment;

use super::{DML_NS, IMAGE_REL_TYPE, REL_NS, WML_NS, WPD_NS};

const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const PKG_REL_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";

const PLACED_PREFIX: &str = "placed-image-";

const EMU_PER_PT: f32 = 12700.0;

pub(crate) fn placed_image_name(asset: usize) -> String {
    format!("{PLACED_PREFIX}{asset}")
}

pub(crate) fn parse_placed_image_name(name: &str) -> Option<usize> {
    name.strip_prefix(PLACED_PREFIX)?.parse().ok()
}

pub(crate) fn pt_to_emu(pt: f32) -> u64 {
    (pt * EMU_PER_PT).round().max(1.0) as u64
}

pub(crate) struct ImageParagraph<'a> {
    /// Whether the fragment must declare the `w` prefix itself (the host
    /// document binds WordprocessingML to some other prefix).
    pub(crate) declare_wml: bool,
    pub(crate) alignment: Alignment,
    pub(crate) rel_id: &'a str,
    pub(crate) drawing_id: u32,
    pub(crate) name: &'a str,
    pub(crate) width_pt: f32,
    pub(crate) height_pt: f32,
}

/// A standalone `w:p` holding one inline picture. Every prefix other than
/// `w` is declared locally so the fragment is valid wherever it is spliced.
pub(crate) fn image_paragraph_xml(p: &ImageParagraph) -> String {
    let cx = pt_to_emu(p.width_pt);
    let cy = pt_to_emu(p.height_pt);
    let wml_decl = if p.declare_wml {
        format!(r#" xmlns:w="{WML_NS}""#)
    } else {
        String::new()
    };
    let jc = p.alignment.wml_val();
    let id = p.drawing_id;
    let name = p.name;
    let rel_id = p.rel_id;

    format!(
        concat!(
            r#"<w:p{wml_decl}><w:pPr><w:jc w:val="{jc}"/></w:pPr><w:r><w:drawing>"#,
            r#"<wp:inline xmlns:wp="{wpd}" distT="0" distB="0" distL="0" distR="0">"#,
            r#"<wp:extent cx="{cx}" cy="{cy}"/>"#,
            r#"<wp:effectExtent l="0" t="0" r="0" b="0"/>"#,
            r#"<wp:docPr id="{id}" name="{name}"/>"#,
            r#"<wp:cNvGraphicFramePr><a:graphicFrameLocks xmlns:a="{dml}" noChangeAspect="1"/></wp:cNvGraphicFramePr>"#,
            r#"<a:graphic xmlns:a="{dml}"><a:graphicData uri="{pic}">"#,
            r#"<pic:pic xmlns:pic="{pic}">"#,
            r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="{name}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
            r#"<pic:blipFill><a:blip xmlns:r="{rel}" r:embed="{rel_id}"/><a:stretch><a:fillRect/></a:stretch></pic:blipFill>"#,
            r#"<pic:spPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="{cx}" cy="{cy}"/></a:xfrm>"#,
            r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></pic:spPr>"#,
            r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
        ),
        wml_decl = wml_decl,
        jc = jc,
        wpd = WPD_NS,
        dml = DML_NS,
        pic = PIC_NS,
        rel = REL_NS,
        cx = cx,
        cy = cy,
        id = id,
        name = name,
        rel_id = rel_id,
    )
}

/// Smallest `rIdN` not already taken.
pub(crate) fn next_relationship_id<'a>(taken: impl Iterator<Item = &'a str>) -> String {
    let max = taken
        .filter_map(|id| id.strip_prefix("rId"))
        .filter_map(|n| n.parse::<u32>().ok())
        .max()
        .unwrap_or(0);
    format!("rId{}", max + 1)
}

/// Append an image relationship to `word/_rels/document.xml.rels`, creating
/// the part when the document has none.
pub(crate) fn add_image_relationship(
    rels_xml: Option<&str>,
    id: &str,
    target: &str,
) -> Result<String, Error> {
    let entry = format!(r#"<Relationship Id="{id}" Type="{IMAGE_REL_TYPE}" Target="{target}"/>"#);
    let Some(xml) = rels_xml else {
        return Ok(format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="{PKG_REL_NS}">{entry}</Relationships>"#
        ));
    };
    let close = xml.rfind("</Relationships>").ok_or_else(|| {
        Error::MalformedDocument("document relationships part has no closing tag".into())
    })?;
    let mut out = String::with_capacity(xml.len() + entry.len());
    out.push_str(&xml[..close]);
    out.push_str(&entry);
    out.push_str(&xml[close..]);
    Ok(out)
}

/// Register a `Default` content type for `extension` unless one exists.
pub(crate) fn ensure_default_content_type(
    types_xml: &str,
    extension: &str,
    content_type: &str,
) -> Result<String, Error> {
    let xml = roxmltree::Document::parse(types_xml)?;
    let registered = xml.root_element().children().any(|n| {
        n.tag_name().name() == "Default"
            && n.attribute("Extension")
                .is_some_and(|e| e.eq_ignore_ascii_case(extension))
    });
    if registered {
        return Ok(types_xml.to_string());
    }

    let close = types_xml.rfind("</Types>").ok_or_else(|| {
        Error::MalformedDocument("[Content_Types].xml has no closing tag".into())
    })?;
    let entry = format!(r#"<Default Extension="{extension}" ContentType="{content_type}"/>"#);
    let mut out = String::with_capacity(types_xml.len() + entry.len());
    out.push_str(&types_xml[..close]);
    out.push_str(&entry);
    out.push_str(&types_xml[close..]);
    Ok(out)
}
