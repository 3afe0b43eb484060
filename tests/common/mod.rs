#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::BTreeSet;
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};

use docx_place::{Config, InferenceError, InferenceRequest, ModelReply, PlacementModel};
use image::{ImageFormat, Rgba, RgbaImage};
use zip::write::SimpleFileOptions;

pub const WML_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const REL_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const WPD_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/wordprocessingDrawing";
const DML_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/main";
const PIC_NS: &str = "http://schemas.openxmlformats.org/drawingml/2006/picture";
const VML_NS: &str = "urn:schemas-microsoft-com:vml";

pub fn png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    encode(RgbaImage::from_pixel(width, height, Rgba(color)), ImageFormat::Png)
}

pub fn jpeg(width: u32, height: u32) -> Vec<u8> {
    let rgb = image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([40, 90, 160, 255]),
    ))
    .to_rgb8();
    let mut out = Cursor::new(Vec::new());
    rgb.write_to(&mut out, ImageFormat::Jpeg).unwrap();
    out.into_inner()
}

/// PNG signature followed by garbage: recognised as PNG, fails to decode.
pub fn corrupt_png() -> Vec<u8> {
    let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    data.extend_from_slice(b"definitely not an IHDR chunk");
    data
}

fn encode(img: RgbaImage, format: ImageFormat) -> Vec<u8> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, format).unwrap();
    out.into_inner()
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Builds minimal but well-formed DOCX packages in memory.
#[derive(Default)]
pub struct DocxBuilder {
    paragraphs: Vec<String>,
    media: Vec<(String, Vec<u8>)>,
    image_rels: Vec<(String, String)>,
    wml_prefix: Option<String>,
    drawing_id: u32,
}

impl DocxBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn heading(self, level: u8, text: &str) -> Self {
        self.styled(&format!("Heading{level}"), text)
    }

    pub fn styled(mut self, style_id: &str, text: &str) -> Self {
        self.paragraphs.push(format!(
            r#"<w:p><w:pPr><w:pStyle w:val="{style_id}"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
            escape(text)
        ));
        self
    }

    pub fn outline(mut self, outline_level: u8, text: &str) -> Self {
        self.paragraphs.push(format!(
            r#"<w:p><w:pPr><w:outlineLvl w:val="{outline_level}"/></w:pPr><w:r><w:t>{}</w:t></w:r></w:p>"#,
            escape(text)
        ));
        self
    }

    pub fn para(mut self, text: &str) -> Self {
        self.paragraphs.push(format!(
            r#"<w:p><w:r><w:t xml:space="preserve">{}</w:t></w:r></w:p>"#,
            escape(text)
        ));
        self
    }

    pub fn blank(mut self) -> Self {
        self.paragraphs.push("<w:p/>".to_string());
        self
    }

    /// Whitespace-only runs still count as blank.
    pub fn spaces(mut self) -> Self {
        self.paragraphs
            .push(r#"<w:p><w:r><w:t xml:space="preserve">   </w:t></w:r></w:p>"#.to_string());
        self
    }

    pub fn raw(mut self, xml: &str) -> Self {
        self.paragraphs.push(xml.to_string());
        self
    }

    pub fn table(self, cell_text: &str) -> Self {
        let xml = format!(
            "<w:tbl><w:tr><w:tc><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:tc></w:tr></w:tbl>",
            escape(cell_text)
        );
        self.raw(&xml)
    }

    fn add_media(&mut self, data: Vec<u8>, ext: &str) -> String {
        let n = self.media.len() + 1;
        let rel_id = format!("rId{}", 100 + n);
        self.media.push((format!("word/media/image{n}.{ext}"), data));
        self.image_rels
            .push((rel_id.clone(), format!("media/image{n}.{ext}")));
        rel_id
    }

    /// A paragraph holding an inline DrawingML picture.
    pub fn image(mut self, data: Vec<u8>, ext: &str) -> Self {
        let rel_id = self.add_media(data, ext);
        self.drawing_id += 1;
        let id = self.drawing_id;
        self.paragraphs.push(format!(
            concat!(
                r#"<w:p><w:r><w:drawing><wp:inline><wp:extent cx="952500" cy="952500"/>"#,
                r#"<wp:docPr id="{id}" name="Picture {id}"/>"#,
                r#"<a:graphic><a:graphicData uri="{pic}"><pic:pic>"#,
                r#"<pic:nvPicPr><pic:cNvPr id="{id}" name="Picture {id}"/><pic:cNvPicPr/></pic:nvPicPr>"#,
                r#"<pic:blipFill><a:blip r:embed="{rel}"/></pic:blipFill><pic:spPr/>"#,
                r#"</pic:pic></a:graphicData></a:graphic></wp:inline></w:drawing></w:r></w:p>"#,
            ),
            id = id,
            pic = PIC_NS,
            rel = rel_id,
        ));
        self
    }

    /// A paragraph holding a legacy VML picture.
    pub fn vml_image(mut self, data: Vec<u8>, ext: &str) -> Self {
        let rel_id = self.add_media(data, ext);
        self.paragraphs.push(format!(
            r#"<w:p><w:r><w:pict><v:shape><v:imagedata r:id="{rel_id}"/></v:shape></w:pict></w:r></w:p>"#
        ));
        self
    }

    /// An image relationship nothing in the body refers to.
    pub fn unreferenced_image(mut self, data: Vec<u8>, ext: &str) -> Self {
        self.add_media(data, ext);
        self
    }

    /// Bind WordprocessingML to `prefix` instead of `w` in document.xml.
    pub fn wml_prefix(mut self, prefix: &str) -> Self {
        self.wml_prefix = Some(prefix.to_string());
        self
    }

    pub fn document_xml(&self) -> String {
        let xml = format!(
            concat!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
                "\n",
                r#"<w:document xmlns:w="{w}" xmlns:r="{r}" xmlns:wp="{wp}" xmlns:a="{a}" xmlns:pic="{pic}" xmlns:v="{v}">"#,
                "<w:body>{body}",
                r#"<w:sectPr><w:pgSz w:w="12240" w:h="15840"/>"#,
                r#"<w:pgMar w:top="1440" w:right="1440" w:bottom="1440" w:left="1440"/></w:sectPr>"#,
                "</w:body></w:document>",
            ),
            w = WML_NS,
            r = REL_NS,
            wp = WPD_NS,
            a = DML_NS,
            pic = PIC_NS,
            v = VML_NS,
            body = self.paragraphs.join("\n"),
        );
        match &self.wml_prefix {
            Some(prefix) => xml
                .replace("w:", &format!("{prefix}:"))
                .replace("xmlns:w=", &format!("xmlns:{prefix}=")),
            None => xml,
        }
    }

    pub fn build(&self) -> Vec<u8> {
        let extensions: BTreeSet<&str> = self
            .media
            .iter()
            .filter_map(|(name, _)| name.rsplit_once('.').map(|(_, ext)| ext))
            .collect();
        let mut types = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/>"#,
        );
        for ext in extensions {
            let ct = image_content_type(ext);
            types.push_str(&format!(r#"<Default Extension="{ext}" ContentType="{ct}"/>"#));
        }
        types.push_str(r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/><Override PartName="/word/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml"/></Types>"#);

        let mut doc_rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#,
        );
        for (id, target) in &self.image_rels {
            doc_rels.push_str(&format!(
                r#"<Relationship Id="{id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="{target}"/>"#
            ));
        }
        doc_rels.push_str("</Relationships>");

        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts = SimpleFileOptions::default();
        let mut put = |name: &str, data: &[u8]| {
            zip.start_file(name, opts).unwrap();
            zip.write_all(data).unwrap();
        };
        put("[Content_Types].xml", types.as_bytes());
        put("_rels/.rels", ROOT_RELS.as_bytes());
        put("word/document.xml", self.document_xml().as_bytes());
        put("word/_rels/document.xml.rels", doc_rels.as_bytes());
        put("word/styles.xml", STYLES.as_bytes());
        for (name, data) in &self.media {
            put(name, data);
        }
        zip.finish().unwrap().into_inner()
    }

    pub fn write(&self, path: &Path) -> PathBuf {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, self.build()).unwrap();
        path.to_path_buf()
    }
}

fn image_content_type(ext: &str) -> &'static str {
    match ext {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        _ => "application/octet-stream",
    }
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/></Relationships>"#;

const STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:styles xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:style w:type="paragraph" w:default="1" w:styleId="Normal"><w:name w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="Heading1"><w:name w:val="heading 1"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="0"/></w:pPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading2"><w:name w:val="heading 2"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="1"/></w:pPr></w:style>
  <w:style w:type="paragraph" w:styleId="Heading3"><w:name w:val="heading 3"/><w:basedOn w:val="Normal"/></w:style>
  <w:style w:type="paragraph" w:styleId="ChapterTitle"><w:name w:val="Chapter Title"/><w:basedOn w:val="Heading2"/></w:style>
  <w:style w:type="paragraph" w:styleId="BodyNote"><w:name w:val="Body Note"/><w:basedOn w:val="Normal"/><w:pPr><w:outlineLvl w:val="9"/></w:pPr></w:style>
</w:styles>"#;

/// The target most tests place into. Node ids:
///
/// ```text
///  0 H1 Project Overview       6 blank
///  1 paragraph                 7 H2 Results
///  2 blank                     8 paragraph
///  3 H2 Architecture           9 blank
///  4 paragraph                10 H1 Conclusion
///  5 blank                    11 paragraph
/// ```
pub fn sample_target() -> DocxBuilder {
    DocxBuilder::new()
        .heading(1, "Project Overview")
        .para("This project builds a document pipeline.")
        .blank()
        .heading(2, "Architecture")
        .para("The system has four stages.")
        .blank()
        .blank()
        .heading(2, "Results")
        .para("Throughput doubled.")
        .blank()
        .heading(1, "Conclusion")
        .para("Done.")
}

/// A source document with `n` PNG images of distinct sizes, one per paragraph.
pub fn sample_source(n: usize) -> DocxBuilder {
    let mut builder = DocxBuilder::new().para("Figures");
    for i in 0..n {
        let i = i as u32;
        builder = builder.image(png(40 + 10 * i, 30 + 5 * i, [200, 30 * (i as u8 % 8), 60, 255]), "png");
    }
    builder
}

/// Workspace config rooted in `dir`.
pub fn test_config(dir: &Path, source: PathBuf, target: PathBuf) -> Config {
    Config {
        source_path: source,
        target_path: target,
        output_dir: dir.join("output"),
        backup_dir: dir.join("backup"),
        temp_dir: dir.join("temp"),
        ..Config::default()
    }
}

/// JSON reply placing `(image, node, position)` triples.
pub fn reply(entries: &[(i64, i64, &str)]) -> String {
    let items: Vec<String> = entries
        .iter()
        .map(|(image, node, position)| {
            format!(
                r#"{{"image": {image}, "node": {node}, "position": "{position}", "reason": "test"}}"#
            )
        })
        .collect();
    format!("[{}]", items.join(", "))
}

/// A model double with a canned reply that records every request.
pub struct ScriptedModel {
    pub name: String,
    pub supports_images: bool,
    pub fail_multimodal: bool,
    pub fail_text: bool,
    /// Reply to multimodal requests when it differs from `reply`.
    pub multimodal_reply: Option<String>,
    pub reply: String,
    pub requests: RefCell<Vec<InferenceRequest>>,
}

impl ScriptedModel {
    pub fn replying(reply: impl Into<String>) -> Self {
        ScriptedModel {
            name: "scripted".to_string(),
            supports_images: true,
            fail_multimodal: false,
            fail_text: false,
            multimodal_reply: None,
            reply: reply.into(),
            requests: RefCell::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }
}

impl PlacementModel for ScriptedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_images(&self) -> bool {
        self.supports_images
    }

    fn infer(&self, request: &InferenceRequest) -> Result<ModelReply, InferenceError> {
        self.requests.borrow_mut().push(request.clone());
        let multimodal = !request.images.is_empty();
        if multimodal && self.fail_multimodal {
            return Err(InferenceError::Timeout(request.timeout));
        }
        if !multimodal && self.fail_text {
            return Err(InferenceError::Transport("connection refused".into()));
        }
        let text = match (&self.multimodal_reply, multimodal) {
            (Some(reply), true) => reply.clone(),
            _ => self.reply.clone(),
        };
        Ok(ModelReply {
            text,
            model: "scripted-1".to_string(),
        })
    }
}

pub fn read_part(docx: &Path, name: &str) -> Option<Vec<u8>> {
    let file = std::fs::File::open(docx).unwrap();
    let mut zip = zip::ZipArchive::new(file).unwrap();
    let mut entry = zip.by_name(name).ok()?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    Some(data)
}

pub fn part_names(docx: &Path) -> Vec<String> {
    let file = std::fs::File::open(docx).unwrap();
    let zip = zip::ZipArchive::new(file).unwrap();
    zip.file_names().map(str::to_string).collect()
}

/// Body paragraphs of `docx` in order: `img:<asset>` for pictures placed by
/// the tool, `pic` for other pictures, otherwise the trimmed text.
pub fn body_labels(docx: &Path) -> Vec<String> {
    let xml = String::from_utf8(read_part(docx, "word/document.xml").unwrap()).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let body = doc
        .root_element()
        .children()
        .find(|n| n.tag_name().name() == "body")
        .unwrap();
    body.children()
        .filter(|n| n.tag_name().name() == "p" && n.tag_name().namespace() == Some(WML_NS))
        .map(|p| {
            if let Some(doc_pr) = p.descendants().find(|n| n.tag_name().name() == "docPr") {
                let name = doc_pr.attribute("name").unwrap_or_default();
                return match name.strip_prefix("placed-image-") {
                    Some(asset) => format!("img:{asset}"),
                    None => "pic".to_string(),
                };
            }
            p.descendants()
                .filter(|n| n.tag_name().name() == "t")
                .filter_map(|n| n.text())
                .collect::<String>()
                .trim()
                .to_string()
        })
        .collect()
}
