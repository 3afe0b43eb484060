use std::fmt::Write;

use crate::analyze::Structure;
use crate::model::{ImageAsset, NodeKind};

/// First `max_chars` characters of `text` on one line, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    let flat = flat.trim();
    if flat.chars().count() <= max_chars {
        return flat.to_string();
    }
    let mut cut: String = flat.chars().take(max_chars).collect();
    cut.push('…');
    cut
}

fn format_runs(runs: &[std::ops::Range<usize>]) -> String {
    runs.iter()
        .map(|r| {
            if r.len() == 1 {
                r.start.to_string()
            } else {
                format!("{}-{}", r.start, r.end - 1)
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_bytes(n: usize) -> String {
    if n >= 1024 * 1024 {
        format!("{:.1} MB", n as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.0} KB", (n as f64 / 1024.0).ceil())
    }
}

/// The textual half of a placement request. Every asset is listed, whether
/// or not it is among `attached` (ids sent as visual content, in send order).
pub fn render_context(
    structure: &Structure,
    assets: &[ImageAsset],
    attached: &[usize],
    excerpt_chars: usize,
) -> String {
    let mut out = String::new();
    let gap_runs = structure.blank_gap_runs();

    let _ = writeln!(
        out,
        "You are a document formatting assistant. Place {} images taken from a source document into the target document below.",
        assets.len()
    );
    out.push('\n');
    let _ = writeln!(out, "Target document structure:");
    let _ = writeln!(out, "Nodes: {}", structure.len());
    let _ = writeln!(out, "Headings: {}", structure.headings().count());
    let _ = writeln!(
        out,
        "Blank gaps: {}",
        structure.nodes.iter().filter(|n| n.is_blank_gap()).count()
    );
    out.push('\n');

    let _ = writeln!(out, "Node list (id, kind, text):");
    for node in &structure.nodes {
        let text = match node.kind {
            NodeKind::BlankGap => "[empty]".to_string(),
            _ if node.text.is_empty() && node.has_drawing => "[image]".to_string(),
            _ => {
                let mut t = excerpt(&node.text, excerpt_chars);
                if node.has_drawing {
                    t.push_str(" [image]");
                }
                t
            }
        };
        let _ = writeln!(out, "  [{}] {}: {}", node.id, node.kind, text);
    }
    out.push('\n');

    if gap_runs.is_empty() {
        let _ = writeln!(out, "Blank gap nodes: none");
    } else {
        let _ = writeln!(
            out,
            "Blank gap nodes (preferred insertion points): {}",
            format_runs(&gap_runs)
        );
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "Images ({} total, {} attached as pictures in the order listed):",
        assets.len(),
        attached.len()
    );
    for asset in assets {
        let size = match asset.dimensions() {
            Some((w, h)) => format!("{w}x{h}px"),
            None => "unknown size".to_string(),
        };
        let visual = match attached.iter().position(|id| *id == asset.id) {
            Some(i) => format!("attached picture #{}", i + 1),
            None => "not attached".to_string(),
        };
        let _ = writeln!(
            out,
            "  image {}: {}, {}, source order {}, {}",
            asset.id,
            size,
            format_bytes(asset.byte_size()),
            asset.ordinal,
            visual
        );
    }
    if !attached.is_empty() && attached.len() < assets.len() {
        let _ = writeln!(
            out,
            "Images that are not attached must be placed from their source order and the surrounding images."
        );
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "Rules:
1. Place each image near the heading or paragraph whose topic it illustrates.
2. Prefer blank gap nodes; placing after a heading is the next best choice.
3. Spread images across sections, at most two per section.
4. Never split a heading from the text that follows it.
5. Keep images from the same source region together and in source order.
6. Leave an image out if nothing in the document fits it.

Reply with a JSON array only, one object per image you place:
[
  {{\"image\": 0, \"node\": 6, \"position\": \"after\", \"width_inches\": 5.5, \"reason\": \"illustrates the project overview\"}}
]
\"position\" is \"before\" or \"after\" the node; \"width_inches\" is optional."
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excerpt_respects_char_boundaries() {
        assert_eq!(excerpt("项目概述与背景说明", 4), "项目概述…");
        assert_eq!(excerpt("short", 60), "short");
        assert_eq!(excerpt("a\tb\nc", 60), "a b c");
    }

    #[test]
    fn runs_collapse() {
        assert_eq!(format_runs(&[2..3, 5..8]), "2, 5-7");
    }
}
