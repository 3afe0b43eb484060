//! Plan executor: splices one picture paragraph per decision into a copy of
//! the target document.
//!
//! Node ids in a plan refer to the document as it was analyzed. Each insertion
//! shifts everything after it, so ids are translated to live positions through
//! an [`OffsetTable`] rather than re-scanning the document.

use std::fs::OpenOptions;
use std::io::Write;
use std::ops::Range;
use std::path::{Path, PathBuf};

use image::ImageFormat;

use crate::analyze::Structure;
use crate::config::{Config, file_stem};
use crate::docx::{
    CONTENT_TYPES_PART, DOCUMENT_PART, DOCUMENT_RELS_PART, ImageParagraph, Package,
    add_image_relationship, document_relationships, ensure_default_content_type,
    image_paragraph_xml, next_relationship_id, placed_image_name,
};
use crate::error::Error;
use crate::model::{
    Alignment, DecisionOutcome, ExecutionResult, ImageAsset, Outcome, PlacementDecision,
    RelativePosition, SkipReason,
};
use crate::plan::PlacementPlan;

const PX_TO_PT: f32 = 0.75;
const MAX_BACKUPS: u32 = 10_000;

/// Maps original node ids to positions in the live segment list.
///
/// `shift[k]` counts segments inserted ahead of node `k`; `after[k]` counts
/// segments inserted directly behind it.
#[derive(Debug)]
pub struct OffsetTable {
    base: Vec<usize>,
    shift: Vec<usize>,
    after: Vec<usize>,
}

impl OffsetTable {
    /// Table for `nodes` nodes whose original segment indices are `2k + 1`
    /// (segments alternate with the XML between paragraphs).
    pub fn new(nodes: usize) -> Self {
        OffsetTable {
            base: (0..nodes).map(|k| 2 * k + 1).collect(),
            shift: vec![0; nodes],
            after: vec![0; nodes],
        }
    }

    /// Current segment index of node `k`.
    pub fn live_index(&self, k: usize) -> usize {
        self.base[k] + self.shift[k]
    }

    /// Index a new segment takes when placed relative to node `k`.
    pub fn insertion_index(&self, k: usize, position: RelativePosition) -> usize {
        match position {
            RelativePosition::Before => self.live_index(k),
            RelativePosition::After => self.live_index(k) + 1 + self.after[k],
        }
    }

    pub fn record(&mut self, k: usize, position: RelativePosition) {
        let first_shifted = match position {
            RelativePosition::Before => k,
            RelativePosition::After => {
                self.after[k] += 1;
                k + 1
            }
        };
        for shift in &mut self.shift[first_shifted..] {
            *shift += 1;
        }
    }
}

enum Segment {
    Original(Range<usize>),
    Inserted(String),
}

/// word/document.xml as original byte ranges interleaved with new fragments.
struct LiveBody<'a> {
    xml: &'a str,
    segments: Vec<Segment>,
}

impl<'a> LiveBody<'a> {
    fn new(xml: &'a str, anchors: &[Range<usize>]) -> Self {
        let mut segments = Vec::with_capacity(anchors.len() * 2 + 1);
        let mut cursor = 0;
        for anchor in anchors {
            segments.push(Segment::Original(cursor..anchor.start));
            segments.push(Segment::Original(anchor.clone()));
            cursor = anchor.end;
        }
        segments.push(Segment::Original(cursor..xml.len()));
        LiveBody { xml, segments }
    }

    fn insert(&mut self, index: usize, fragment: String) {
        self.segments.insert(index, Segment::Inserted(fragment));
    }

    fn render(&self) -> String {
        let mut out = String::with_capacity(self.xml.len());
        for segment in &self.segments {
            match segment {
                Segment::Original(range) => out.push_str(&self.xml[range.clone()]),
                Segment::Inserted(fragment) => out.push_str(fragment),
            }
        }
        out
    }
}

#[derive(Clone, Debug)]
pub struct ExecuteOptions {
    pub output_path: PathBuf,
    pub backup_dir: PathBuf,
    /// Widest an inserted picture may be, in points.
    pub max_width_pt: f32,
    pub alignment: Alignment,
}

impl ExecuteOptions {
    pub fn from_config(config: &Config) -> Self {
        ExecuteOptions {
            output_path: config.output_path(),
            backup_dir: config.backup_dir.clone(),
            max_width_pt: config.max_image_width_inches * 72.0,
            alignment: config.alignment,
        }
    }
}

/// Display size in points: natural size at 96 dpi, shrunk to fit every cap,
/// aspect ratio preserved.
pub(crate) fn fit_extent(
    pixel_width: u32,
    pixel_height: u32,
    requested_width_pt: Option<f32>,
    max_width_pt: f32,
    content_width_pt: f32,
) -> (f32, f32) {
    let natural_w = pixel_width as f32 * PX_TO_PT;
    let natural_h = pixel_height as f32 * PX_TO_PT;
    let mut width = natural_w.min(max_width_pt).min(content_width_pt);
    if let Some(requested) = requested_width_pt {
        width = width.min(requested);
    }
    let width = width.max(1.0);
    (width, natural_h * width / natural_w)
}

fn media_type(format: ImageFormat) -> Option<(&'static str, &'static str)> {
    match format {
        ImageFormat::Png => Some(("png", "image/png")),
        ImageFormat::Jpeg => Some(("jpeg", "image/jpeg")),
        ImageFormat::Gif => Some(("gif", "image/gif")),
        ImageFormat::Bmp => Some(("bmp", "image/bmp")),
        ImageFormat::Tiff => Some(("tiff", "image/tiff")),
        _ => None,
    }
}

struct CheckedImage {
    extension: &'static str,
    content_type: &'static str,
    width: u32,
    height: u32,
}

fn check_image(asset: &ImageAsset) -> Result<CheckedImage, String> {
    let format = image::guess_format(&asset.data).map_err(|e| format!("unknown format: {e}"))?;
    let (extension, content_type) =
        media_type(format).ok_or_else(|| format!("unsupported format {format:?}"))?;
    let decoded = image::load_from_memory_with_format(&asset.data, format)
        .map_err(|e| format!("cannot decode: {e}"))?;
    if decoded.width() == 0 || decoded.height() == 0 {
        return Err("image has zero size".into());
    }
    Ok(CheckedImage {
        extension,
        content_type,
        width: decoded.width(),
        height: decoded.height(),
    })
}

/// Copy `original` to `<backup_dir>/<stem>.backup-<n>.<ext>` under the first
/// `n` not already taken.
pub fn write_backup(original: &[u8], target: &Path, backup_dir: &Path) -> Result<PathBuf, Error> {
    std::fs::create_dir_all(backup_dir)?;
    let stem = file_stem(target);
    let ext = target
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("docx");

    for n in 1..=MAX_BACKUPS {
        let path = backup_dir.join(format!("{stem}.backup-{n}.{ext}"));
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::Io(e)),
        };
        file.write_all(original)?;
        file.sync_all()?;
        log::info!("Backed up {} to {}", target.display(), path.display());
        return Ok(path);
    }
    Err(Error::Io(std::io::Error::new(
        std::io::ErrorKind::AlreadyExists,
        format!("no free backup name in {}", backup_dir.display()),
    )))
}

fn write_atomically(path: &Path, bytes: &[u8]) -> Result<(), Error> {
    let write_err = |reason: String| Error::DocumentWrite {
        path: path.to_path_buf(),
        reason,
    };
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(|e| write_err(e.to_string()))?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| write_err(e.to_string()))?;
    tmp.write_all(bytes).map_err(|e| write_err(e.to_string()))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| write_err(e.to_string()))?;
    tmp.persist(path).map_err(|e| write_err(e.error.to_string()))?;
    Ok(())
}

/// Package edits accumulated while applying a plan.
struct Edits<'a> {
    package: Package,
    body: LiveBody<'a>,
    offsets: OffsetTable,
    rels_xml: Option<String>,
    types_xml: String,
    rel_ids: Vec<String>,
    next_drawing_id: u32,
}

impl Edits<'_> {
    fn media_part_name(&self, asset: usize, extension: &str) -> String {
        let mut name = format!("word/media/placed_image_{asset}.{extension}");
        let mut n = 1;
        while self.package.contains(&name) {
            n += 1;
            name = format!("word/media/placed_image_{asset}_{n}.{extension}");
        }
        name
    }

    fn embed(
        &mut self,
        decision: &PlacementDecision,
        asset: &ImageAsset,
        checked: &CheckedImage,
        structure: &Structure,
        options: &ExecuteOptions,
    ) -> Result<(), Error> {
        let part_name = self.media_part_name(asset.id, checked.extension);
        let target = part_name.trim_start_matches("word/").to_string();
        self.package.put_part(&part_name, asset.data.clone());

        let rel_id = next_relationship_id(self.rel_ids.iter().map(String::as_str));
        self.rels_xml = Some(add_image_relationship(
            self.rels_xml.as_deref(),
            &rel_id,
            &target,
        )?);
        self.rel_ids.push(rel_id.clone());
        self.types_xml =
            ensure_default_content_type(&self.types_xml, checked.extension, checked.content_type)?;

        let (width_pt, height_pt) = fit_extent(
            checked.width,
            checked.height,
            decision.width_inches.map(|w| w * 72.0),
            options.max_width_pt,
            structure.content_width_pt,
        );
        let drawing_id = self.next_drawing_id;
        self.next_drawing_id += 1;
        let name = placed_image_name(asset.id);
        let fragment = image_paragraph_xml(&ImageParagraph {
            declare_wml: structure.wml_prefix.as_deref() != Some("w"),
            alignment: options.alignment,
            rel_id: &rel_id,
            drawing_id,
            name: &name,
            width_pt,
            height_pt,
        });

        let index = self.offsets.insertion_index(decision.node, decision.position);
        self.body.insert(index, fragment);
        self.offsets.record(decision.node, decision.position);

        log::info!(
            "Inserted image {} {} node {} as {part_name} ({width_pt:.0}x{height_pt:.0}pt)",
            asset.id,
            decision.position,
            decision.node
        );
        Ok(())
    }
}

/// Apply `plan` to the document at `target`, writing the result to
/// `options.output_path`. A backup of the untouched target is written before
/// anything else.
pub fn execute(
    target: &Path,
    structure: &Structure,
    plan: &PlacementPlan,
    assets: &[ImageAsset],
    options: &ExecuteOptions,
) -> Result<ExecutionResult, Error> {
    if let Some(decision) = plan.decisions().iter().find(|d| d.node >= structure.len()) {
        return Err(Error::MalformedDocument(format!(
            "plan places image {} at node {}, but the document has {} nodes",
            decision.asset,
            decision.node,
            structure.len()
        )));
    }

    let original = std::fs::read(target)?;
    let backup_path = write_backup(&original, target, &options.backup_dir)?;

    let package = Package::from_bytes(&original)?;
    let xml = package.document_xml()?.to_string();
    if xml.len() != structure.document_len || structure.anchors.len() != structure.len() {
        return Err(Error::MalformedDocument(
            "target document changed since it was analyzed".into(),
        ));
    }
    let types_xml = package
        .part_text(CONTENT_TYPES_PART)?
        .ok_or_else(|| Error::MalformedDocument("missing [Content_Types].xml".into()))?
        .to_string();
    let rels_xml = package.part_text(DOCUMENT_RELS_PART)?.map(str::to_string);
    let rel_ids = document_relationships(&package)?
        .into_iter()
        .map(|r| r.id)
        .collect();

    let mut edits = Edits {
        package,
        body: LiveBody::new(&xml, &structure.anchors),
        offsets: OffsetTable::new(structure.len()),
        rels_xml,
        types_xml,
        rel_ids,
        next_drawing_id: structure.max_drawing_id + 1,
    };

    let ordinal_of = |id: usize| assets.iter().find(|a| a.id == id).map(|a| a.ordinal);
    let mut ordered: Vec<&PlacementDecision> = plan.decisions().iter().collect();
    ordered.sort_by_key(|d| (d.node, ordinal_of(d.asset).unwrap_or(usize::MAX)));

    let mut outcomes = Vec::with_capacity(ordered.len());
    for decision in ordered {
        let checked = assets
            .iter()
            .find(|a| a.id == decision.asset)
            .ok_or_else(|| format!("image {} was not extracted", decision.asset))
            .and_then(|asset| check_image(asset).map(|c| (asset, c)));

        let outcome = match checked {
            Ok((asset, checked)) => {
                edits.embed(decision, asset, &checked, structure, options)?;
                Outcome::Applied
            }
            Err(why) => {
                log::warn!("Skipping image {}: {why}", decision.asset);
                Outcome::Skipped(SkipReason::AssetEmbedFailure(why))
            }
        };
        outcomes.push(DecisionOutcome {
            decision: decision.clone(),
            outcome,
        });
    }

    let Edits {
        mut package,
        body,
        rels_xml,
        types_xml,
        ..
    } = edits;
    if outcomes.iter().any(|o| o.outcome == Outcome::Applied) {
        package.put_part(DOCUMENT_PART, body.render().into_bytes());
        if let Some(rels) = rels_xml {
            package.put_part(DOCUMENT_RELS_PART, rels.into_bytes());
        }
        package.put_part(CONTENT_TYPES_PART, types_xml.into_bytes());
    }

    let bytes = package.to_bytes()?;
    write_atomically(&options.output_path, &bytes)?;
    log::info!("Wrote {}", options.output_path.display());

    Ok(ExecutionResult {
        outcomes,
        output_path: options.output_path.clone(),
        backup_path,
    })
}
