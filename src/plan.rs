use std::collections::HashSet;
use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::error::InferenceError;
use crate::model::{ImageAsset, PlacementDecision, RelativePosition};

/// One entry of a model reply before validation. Ids are kept signed so a
/// negative id is reported rather than failing the whole reply.
#[derive(Clone, Debug, PartialEq)]
pub struct ProposedPlacement {
    pub image: i64,
    pub node: i64,
    pub position: RelativePosition,
    pub width_inches: Option<f32>,
    pub reason: String,
}

#[derive(Deserialize)]
struct ReplyEntry {
    #[serde(alias = "image_index", alias = "image_id", alias = "asset")]
    image: i64,
    #[serde(alias = "insert_after_para", alias = "node_id", alias = "paragraph")]
    node: i64,
    #[serde(default)]
    position: Option<String>,
    #[serde(default)]
    width_inches: Option<f32>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PlanReferenceError {
    UnknownNode(i64),
    UnknownAsset(i64),
    DuplicateAsset(usize),
    Malformed(String),
}

impl fmt::Display for PlanReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanReferenceError::UnknownNode(id) => write!(f, "unknown node {id}"),
            PlanReferenceError::UnknownAsset(id) => write!(f, "unknown image {id}"),
            PlanReferenceError::DuplicateAsset(id) => write!(f, "image {id} placed more than once"),
            PlanReferenceError::Malformed(why) => write!(f, "malformed entry: {why}"),
        }
    }
}

/// A reply entry that did not make it into the plan.
#[derive(Clone, Debug, PartialEq)]
pub struct DroppedEntry {
    /// The entry as the model wrote it.
    pub raw: String,
    /// The image id the entry named, if it could be read at all.
    pub image: Option<i64>,
    /// The asset the entry named, when that asset exists.
    pub asset: Option<usize>,
    pub error: PlanReferenceError,
}

impl DroppedEntry {
    /// Attach the named asset to an entry that was rejected before the asset
    /// list was known.
    pub fn resolve_asset(&mut self, assets: &[ImageAsset]) {
        if self.asset.is_none() {
            self.asset = self.image.and_then(|id| known_asset(id, assets));
        }
    }
}

fn known_asset(image: i64, assets: &[ImageAsset]) -> Option<usize> {
    usize::try_from(image)
        .ok()
        .filter(|id| assets.iter().any(|a| a.id == *id))
}

/// Validated placement decisions: every node id exists in the snapshot, every
/// asset id is known, no asset appears twice. Only built by [`PlacementPlan::validate`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlacementPlan {
    decisions: Vec<PlacementDecision>,
}

impl PlacementPlan {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn validate(
        proposals: Vec<ProposedPlacement>,
        node_count: usize,
        assets: &[ImageAsset],
    ) -> (PlacementPlan, Vec<DroppedEntry>) {
        let mut decisions = Vec::new();
        let mut dropped = Vec::new();
        let mut placed = HashSet::new();

        for proposal in proposals {
            let asset = known_asset(proposal.image, assets);
            let node = usize::try_from(proposal.node)
                .ok()
                .filter(|id| *id < node_count);

            let error = match (asset, node) {
                (None, _) => Some(PlanReferenceError::UnknownAsset(proposal.image)),
                (Some(_), None) => Some(PlanReferenceError::UnknownNode(proposal.node)),
                (Some(asset), Some(_)) if placed.contains(&asset) => {
                    Some(PlanReferenceError::DuplicateAsset(asset))
                }
                _ => None,
            };
            if let Some(error) = error {
                log::warn!("Dropping placement of image {}: {error}", proposal.image);
                dropped.push(DroppedEntry {
                    raw: describe(&proposal),
                    image: Some(proposal.image),
                    asset,
                    error,
                });
                continue;
            }

            let (Some(asset), Some(node)) = (asset, node) else {
                continue;
            };
            placed.insert(asset);
            decisions.push(PlacementDecision {
                asset,
                node,
                position: proposal.position,
                width_inches: proposal.width_inches.filter(|w| w.is_finite() && *w > 0.0),
                reason: proposal.reason,
            });
        }

        (PlacementPlan { decisions }, dropped)
    }

    pub fn decisions(&self) -> &[PlacementDecision] {
        &self.decisions
    }

    pub fn len(&self) -> usize {
        self.decisions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decisions.is_empty()
    }

    pub fn decision_for(&self, asset: usize) -> Option<&PlacementDecision> {
        self.decisions.iter().find(|d| d.asset == asset)
    }
}

fn describe(p: &ProposedPlacement) -> String {
    format!("image {} {} node {}", p.image, p.position, p.node)
}

const PLAN_KEYS: [&str; 4] = ["placements", "decisions", "insertion_plan", "plan"];

/// Pull the placement entries out of a model reply. Accepts a bare JSON
/// array, an object holding the array, and either of those inside a Markdown
/// code fence or surrounded by prose. Entries that do not have the expected
/// shape are returned as dropped rather than failing the reply; their
/// `asset` is filled in later by [`DroppedEntry::resolve_asset`].
pub fn parse_reply(text: &str) -> Result<(Vec<ProposedPlacement>, Vec<DroppedEntry>), InferenceError> {
    let value = locate_json(text)
        .ok_or_else(|| InferenceError::MalformedReply(snippet(text)))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let key = PLAN_KEYS
                .into_iter()
                .find(|k| map.get(*k).is_some_and(Value::is_array))
                .ok_or_else(|| InferenceError::MalformedReply("object without a placement array".into()))?;
            match map.remove(key) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            }
        }
        _ => return Err(InferenceError::MalformedReply(snippet(text))),
    };

    let mut proposals = Vec::new();
    let mut dropped = Vec::new();
    for item in items {
        let raw = item.to_string();
        let image = ["image", "image_index", "image_id", "asset"]
            .into_iter()
            .find_map(|k| item.get(k).and_then(Value::as_i64));
        let entry = match serde_json::from_value::<ReplyEntry>(item) {
            Ok(entry) => entry,
            Err(e) => {
                dropped.push(DroppedEntry {
                    raw,
                    image,
                    asset: None,
                    error: PlanReferenceError::Malformed(e.to_string()),
                });
                continue;
            }
        };
        let position = match entry.position.as_deref() {
            None => RelativePosition::After,
            Some(p) => match p.parse() {
                Ok(position) => position,
                Err(e) => {
                    dropped.push(DroppedEntry {
                        raw,
                        image: Some(entry.image),
                        asset: None,
                        error: PlanReferenceError::Malformed(e),
                    });
                    continue;
                }
            },
        };
        proposals.push(ProposedPlacement {
            image: entry.image,
            node: entry.node,
            position,
            width_inches: entry.width_inches,
            reason: entry.reason.unwrap_or_default(),
        });
    }
    Ok((proposals, dropped))
}

fn locate_json(text: &str) -> Option<Value> {
    let trimmed = text.trim();
    if let Ok(value) = serde_json::from_str(trimmed) {
        return Some(value);
    }

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        let body = body.find("```").map(|end| &body[..end]).unwrap_or(body);
        if let Ok(value) = serde_json::from_str(body.trim()) {
            return Some(value);
        }
    }

    // Prose may contain brackets of its own, so try every opening bracket and
    // keep the first value that can hold placements.
    trimmed
        .match_indices(['[', '{'])
        .filter_map(|(start, _)| {
            serde_json::Deserializer::from_str(&trimmed[start..])
                .into_iter::<Value>()
                .next()
                .and_then(Result::ok)
        })
        .find(holds_placements)
}

fn holds_placements(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty() || items.iter().any(Value::is_object),
        Value::Object(map) => PLAN_KEYS.iter().any(|k| map.get(*k).is_some_and(Value::is_array)),
        _ => false,
    }
}

fn snippet(text: &str) -> String {
    let mut s: String = text.trim().chars().take(120).collect();
    if text.trim().chars().count() > 120 {
        s.push('…');
    }
    if s.is_empty() { "<empty>".to_string() } else { s }
}
