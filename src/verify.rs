use std::path::Path;

use crate::analyze::Structure;
use crate::docx::{
    Package, body, body_paragraphs, drawing_properties, image_references, paragraph_text,
    parse_placed_image_name,
};
use crate::error::Error;
use crate::model::{ExecutionResult, PlacementDecision, RelativePosition};

/// Post-execution checks on the written output. Problems are reported, never
/// raised.
#[derive(Clone, Debug, Default)]
pub struct Verification {
    pub openable: bool,
    pub expected_images: usize,
    pub found_images: usize,
    /// Assets whose picture is missing or not next to its anchor.
    pub misplaced: Vec<usize>,
    pub problems: Vec<String>,
}

impl Verification {
    pub fn is_ok(&self) -> bool {
        self.openable && self.expected_images == self.found_images && self.misplaced.is_empty()
    }
}

enum BodyEntry {
    /// A picture paragraph this tool inserted.
    Placed(usize),
    /// A paragraph that was present before insertion, by original position.
    Original { id: usize, text: String },
}

pub fn verify(output: &Path, structure: &Structure, result: &ExecutionResult) -> Verification {
    let mut report = Verification {
        expected_images: structure.existing_drawings + result.applied_count(),
        ..Verification::default()
    };
    if let Err(e) = check(output, structure, result, &mut report) {
        report.problems.push(format!("cannot read output: {e}"));
    }

    if report.is_ok() {
        log::info!(
            "Verified {}: {} images, all placements adjacent to their anchors",
            output.display(),
            report.found_images
        );
    } else {
        for problem in &report.problems {
            log::warn!("Verification: {problem}");
        }
    }
    report
}

fn check(
    output: &Path,
    structure: &Structure,
    result: &ExecutionResult,
    report: &mut Verification,
) -> Result<(), Error> {
    let package = Package::open(output)?;
    let xml_content = package.document_xml()?;
    let xml = roxmltree::Document::parse(xml_content)?;
    let body = body(&xml)?;
    report.openable = true;

    report.found_images = image_references(body).len();
    if report.found_images != report.expected_images {
        report.problems.push(format!(
            "expected {} images ({} existing + {} placed), found {}",
            report.expected_images,
            structure.existing_drawings,
            result.applied_count(),
            report.found_images
        ));
    }

    let mut entries = Vec::new();
    let mut original_id = 0;
    for para in body_paragraphs(body) {
        let placed = drawing_properties(para)
            .into_iter()
            .filter(|(id, _)| *id > structure.max_drawing_id)
            .find_map(|(_, name)| parse_placed_image_name(name));
        match placed {
            Some(asset) => entries.push(BodyEntry::Placed(asset)),
            None => {
                entries.push(BodyEntry::Original {
                    id: original_id,
                    text: paragraph_text(para).trim().to_string(),
                });
                original_id += 1;
            }
        }
    }
    if original_id != structure.len() {
        report.problems.push(format!(
            "output has {original_id} original paragraphs, target had {}",
            structure.len()
        ));
    }

    for decision in result.applied() {
        if let Err(problem) = check_adjacency(decision, &entries, structure) {
            report.misplaced.push(decision.asset);
            report.problems.push(problem);
        }
    }
    Ok(())
}

fn check_adjacency(
    decision: &PlacementDecision,
    entries: &[BodyEntry],
    structure: &Structure,
) -> Result<(), String> {
    let at = entries
        .iter()
        .position(|e| matches!(e, BodyEntry::Placed(a) if *a == decision.asset))
        .ok_or_else(|| format!("image {} is missing from the output", decision.asset))?;

    let neighbour = match decision.position {
        RelativePosition::Before => entries[at + 1..]
            .iter()
            .find(|e| matches!(e, BodyEntry::Original { .. })),
        RelativePosition::After => entries[..at]
            .iter()
            .rev()
            .find(|e| matches!(e, BodyEntry::Original { .. })),
    };

    let expected_text = structure.node(decision.node).map(|n| n.text.as_str());
    match neighbour {
        Some(BodyEntry::Original { id, text })
            if *id == decision.node && Some(text.as_str()) == expected_text =>
        {
            Ok(())
        }
        Some(BodyEntry::Original { id, .. }) => Err(format!(
            "image {} should be {} node {} but is next to node {id}",
            decision.asset, decision.position, decision.node
        )),
        _ => Err(format!(
            "image {} should be {} node {} but has no neighbour there",
            decision.asset, decision.position, decision.node
        )),
    }
}
