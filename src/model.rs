use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

/// An image pulled out of the source document.
#[derive(Clone, Debug)]
pub struct ImageAsset {
    pub id: usize,
    /// Position in extraction order.
    pub ordinal: usize,
    pub file_name: String,
    pub extension: String,
    pub content_type: String,
    pub path: PathBuf,
    pub data: Vec<u8>,
    pub pixel_width: Option<u32>,
    pub pixel_height: Option<u32>,
}

impl ImageAsset {
    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.pixel_width.zip(self.pixel_height)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum NodeKind {
    Heading(u8),
    Paragraph,
    BlankGap,
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKind::Heading(level) => write!(f, "heading {level}"),
            NodeKind::Paragraph => f.write_str("paragraph"),
            NodeKind::BlankGap => f.write_str("blank"),
        }
    }
}

/// One body paragraph of the target document. `id` is its 0-based position
/// at analysis time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StructuralNode {
    pub id: usize,
    pub kind: NodeKind,
    pub text: String,
    pub style: Option<String>,
    /// The paragraph already carries a picture; such paragraphs are never gaps.
    pub has_drawing: bool,
}

impl StructuralNode {
    pub fn heading_level(&self) -> Option<u8> {
        match self.kind {
            NodeKind::Heading(level) => Some(level),
            _ => None,
        }
    }

    pub fn is_blank_gap(&self) -> bool {
        self.kind == NodeKind::BlankGap
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RelativePosition {
    Before,
    After,
}

impl FromStr for RelativePosition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" | "above" => Ok(RelativePosition::Before),
            "after" | "below" => Ok(RelativePosition::After),
            other => Err(format!("unknown position '{other}'")),
        }
    }
}

impl fmt::Display for RelativePosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativePosition::Before => f.write_str("before"),
            RelativePosition::After => f.write_str("after"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacementDecision {
    pub asset: usize,
    pub node: usize,
    pub position: RelativePosition,
    pub width_inches: Option<f32>,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Alignment {
    Left,
    Center,
    Right,
}

impl Alignment {
    pub(crate) fn wml_val(self) -> &'static str {
        match self {
            Alignment::Left => "left",
            Alignment::Center => "center",
            Alignment::Right => "right",
        }
    }
}

impl FromStr for Alignment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "left" => Ok(Alignment::Left),
            "center" | "centre" => Ok(Alignment::Center),
            "right" => Ok(Alignment::Right),
            other => Err(format!("unknown alignment '{other}' (left, center, right)")),
        }
    }
}

impl fmt::Display for Alignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wml_val())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum InferenceMode {
    TextOnly,
    Multimodal,
}

impl fmt::Display for InferenceMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InferenceMode::TextOnly => f.write_str("text-only"),
            InferenceMode::Multimodal => f.write_str("multimodal"),
        }
    }
}

/// Why multimodal inference was requested but not used.
#[derive(Clone, Debug, PartialEq)]
pub enum Degradation {
    /// The multimodal call failed and the text-only retry was used.
    MultimodalFailed(String),
    /// The configured provider cannot take image input.
    MultimodalUnsupported(String),
    /// Multimodal mode was on but no asset could be prepared for sending.
    NoAttachableImages,
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Degradation::MultimodalFailed(cause) => {
                write!(f, "multimodal call failed ({cause}); fell back to text-only")
            }
            Degradation::MultimodalUnsupported(provider) => {
                write!(f, "{provider} does not accept images; used text-only")
            }
            Degradation::NoAttachableImages => {
                f.write_str("no image could be prepared for the model; used text-only")
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// The model made no decision for the asset.
    Declined,
    /// The model's decision for the asset was dropped during validation.
    InvalidPlanReference(String),
    AssetEmbedFailure(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Declined => f.write_str("no placement proposed"),
            SkipReason::InvalidPlanReference(why) => write!(f, "invalid plan reference: {why}"),
            SkipReason::AssetEmbedFailure(why) => write!(f, "embed failed: {why}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Outcome {
    Applied,
    Skipped(SkipReason),
}

#[derive(Clone, Debug)]
pub struct DecisionOutcome {
    pub decision: PlacementDecision,
    pub outcome: Outcome,
}

#[derive(Clone, Debug)]
pub struct ExecutionResult {
    /// In application order.
    pub outcomes: Vec<DecisionOutcome>,
    pub output_path: PathBuf,
    pub backup_path: PathBuf,
}

impl ExecutionResult {
    pub fn applied(&self) -> impl Iterator<Item = &PlacementDecision> {
        self.outcomes
            .iter()
            .filter(|o| o.outcome == Outcome::Applied)
            .map(|o| &o.decision)
    }

    pub fn applied_count(&self) -> usize {
        self.applied().count()
    }
}
