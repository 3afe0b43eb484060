use std::collections::HashMap;

use crate::error::Error;

use super::{Package, STYLES_PART, WML_NS, wml, wml_attr};

/// Longest `w:basedOn` chain followed before giving up (guards against cycles).
const MAX_STYLE_DEPTH: usize = 16;

pub(crate) struct ParagraphStyle {
    name: Option<String>,
    outline_level: Option<u8>,
    based_on: Option<String>,
}

#[derive(Default)]
pub(crate) struct StyleSheet {
    paragraph_styles: HashMap<String, ParagraphStyle>,
    default_paragraph_style: Option<String>,
}

/// Parse `word/styles.xml`. A package without a style part yields an empty
/// sheet; a style part that is present but unparsable is a malformed document.
pub(crate) fn parse_styles(package: &Package) -> Result<StyleSheet, Error> {
    let Some(xml_content) = package.part_text(STYLES_PART)? else {
        return Ok(StyleSheet::default());
    };
    let xml = roxmltree::Document::parse(xml_content)
        .map_err(|e| Error::MalformedDocument(format!("word/styles.xml: {e}")))?;

    let mut sheet = StyleSheet::default();
    for style_node in xml.root_element().children() {
        if style_node.tag_name().name() != "style"
            || style_node.tag_name().namespace() != Some(WML_NS)
        {
            continue;
        }
        if style_node.attribute((WML_NS, "type")) != Some("paragraph") {
            continue;
        }
        let Some(style_id) = style_node.attribute((WML_NS, "styleId")) else {
            continue;
        };

        if matches!(style_node.attribute((WML_NS, "default")), Some("1" | "true")) {
            sheet.default_paragraph_style = Some(style_id.to_string());
        }

        let outline_level = wml(style_node, "pPr")
            .and_then(|ppr| wml_attr(ppr, "outlineLvl"))
            .and_then(|v| v.parse::<u8>().ok());

        sheet.paragraph_styles.insert(
            style_id.to_string(),
            ParagraphStyle {
                name: wml_attr(style_node, "name").map(str::to_string),
                outline_level,
                based_on: wml_attr(style_node, "basedOn").map(str::to_string),
            },
        );
    }
    Ok(sheet)
}

/// "heading 2", "Heading2", "HEADING 2" → 2.
pub(crate) fn level_from_style_name(name: &str) -> Option<u8> {
    let lower = name.trim().to_ascii_lowercase();
    let rest = lower.strip_prefix("heading")?.trim();
    match rest.parse::<u8>() {
        Ok(level @ 1..=9) => Some(level),
        _ => None,
    }
}

/// Outline level 0..=8 is heading 1..=9; 9 marks body text.
pub(crate) fn level_from_outline(outline: u8) -> Option<u8> {
    (outline < 9).then_some(outline + 1)
}

impl StyleSheet {
    pub(crate) fn resolve_style_id<'a>(&'a self, direct: Option<&'a str>) -> Option<&'a str> {
        direct.or(self.default_paragraph_style.as_deref())
    }

    pub(crate) fn style_name(&self, style_id: &str) -> Option<&str> {
        self.paragraph_styles
            .get(style_id)
            .and_then(|s| s.name.as_deref())
    }

    /// Heading level implied by a paragraph style, following `w:basedOn`.
    pub(crate) fn heading_level(&self, style_id: &str) -> Option<u8> {
        let mut current = Some(style_id);
        for _ in 0..MAX_STYLE_DEPTH {
            let id = current?;
            let Some(style) = self.paragraph_styles.get(id) else {
                // Unknown style: the id itself may still read "Heading1".
                return level_from_style_name(id);
            };
            if let Some(outline) = style.outline_level {
                return level_from_outline(outline);
            }
            if let Some(level) = style
                .name
                .as_deref()
                .and_then(level_from_style_name)
                .or_else(|| level_from_style_name(id))
            {
                return Some(level);
            }
            current = style.based_on.as_deref();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn heading_names() {
        assert_eq!(level_from_style_name("heading 1"), Some(1));
        assert_eq!(level_from_style_name("Heading3"), Some(3));
        assert_eq!(level_from_style_name("Heading 10"), None);
        assert_eq!(level_from_style_name("Normal"), None);
        assert_eq!(level_from_style_name("Title"), None);
    }

    #[test]
    fn outline_levels() {
        assert_eq!(level_from_outline(0), Some(1));
        assert_eq!(level_from_outline(8), Some(9));
        assert_eq!(level_from_outline(9), None);
    }
}
