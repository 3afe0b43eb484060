use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::model::Alignment;

pub const DEFAULT_GLM_BASE_URL: &str = "https://open.bigmodel.cn/api/coding/paas/v4/";
pub const DEFAULT_GLM_MODEL: &str = "GLM-4.6";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProviderKind {
    /// GLM through its OpenAI-compatible chat completions endpoint.
    Glm,
    Gemini,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 2] = [ProviderKind::Glm, ProviderKind::Gemini];
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "glm" => Ok(ProviderKind::Glm),
            "gemini" => Ok(ProviderKind::Gemini),
            other => Err(format!(
                "unsupported LLM provider '{other}' (supported: glm, gemini)"
            )),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Glm => f.write_str("glm"),
            ProviderKind::Gemini => f.write_str("gemini"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct EndpointConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    pub provider: ProviderKind,
    pub glm: EndpointConfig,
    pub gemini: EndpointConfig,

    pub enable_multimodal: bool,
    pub max_images_per_call: usize,
    /// Longest edge, in pixels, of images sent to the model.
    pub max_image_edge: u32,
    pub multimodal_timeout: Duration,
    pub text_timeout: Duration,
    pub temperature: f32,
    /// Characters of each paragraph shown to the model.
    pub excerpt_chars: usize,

    pub source_path: PathBuf,
    pub target_path: PathBuf,
    /// Explicit output file; defaults to `<output_dir>/<target stem>_result.docx`.
    pub output_path: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub keep_temp: bool,

    pub max_image_width_inches: f32,
    pub alignment: Alignment,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: ProviderKind::Glm,
            glm: EndpointConfig {
                api_key: String::new(),
                base_url: DEFAULT_GLM_BASE_URL.to_string(),
                model: DEFAULT_GLM_MODEL.to_string(),
            },
            gemini: EndpointConfig {
                api_key: String::new(),
                base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
                model: DEFAULT_GEMINI_MODEL.to_string(),
            },
            enable_multimodal: false,
            max_images_per_call: 5,
            max_image_edge: 1024,
            multimodal_timeout: Duration::from_secs(60),
            text_timeout: Duration::from_secs(120),
            temperature: 0.0,
            excerpt_chars: 60,
            source_path: PathBuf::from("from/source.docx"),
            target_path: PathBuf::from("to/target.docx"),
            output_path: None,
            output_dir: PathBuf::from("output"),
            backup_dir: PathBuf::from("backup"),
            temp_dir: PathBuf::from("temp"),
            keep_temp: false,
            max_image_width_inches: 6.0,
            alignment: Alignment::Center,
        }
    }
}

impl Config {
    pub fn endpoint(&self, kind: ProviderKind) -> &EndpointConfig {
        match kind {
            ProviderKind::Glm => &self.glm,
            ProviderKind::Gemini => &self.gemini,
        }
    }

    /// Providers with an API key configured.
    pub fn available_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::ALL
            .into_iter()
            .filter(|k| !self.endpoint(*k).api_key.is_empty())
            .collect()
    }

    pub fn output_path(&self) -> PathBuf {
        if let Some(path) = &self.output_path {
            return path.clone();
        }
        let stem = file_stem(&self.target_path);
        let ext = self
            .target_path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("docx");
        self.output_dir.join(format!("{stem}_result.{ext}"))
    }

    /// Every problem that would stop a run, in one pass.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.endpoint(self.provider).api_key.is_empty() {
            errors.push(format!(
                "{}_API_KEY is not set (required for LLM_PROVIDER={})",
                self.provider.to_string().to_ascii_uppercase(),
                self.provider
            ));
        }
        if !self.source_path.exists() {
            errors.push(format!("Source document not found: {}", self.source_path.display()));
        }
        if !self.target_path.exists() {
            errors.push(format!("Target document not found: {}", self.target_path.display()));
        }
        if self.max_images_per_call == 0 && self.enable_multimodal {
            errors.push("MAX_IMAGES_PER_CALL must be at least 1 when multimodal is enabled".into());
        }
        if self.max_image_edge < 16 {
            errors.push(format!("MAX_IMAGE_EDGE {} is too small", self.max_image_edge));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            errors.push(format!("TEMPERATURE {} is outside 0..=2", self.temperature));
        }
        if self.max_image_width_inches <= 0.0 {
            errors.push("Maximum image width must be positive".into());
        }
        if self.output_path() == self.source_path {
            errors.push("Output path must differ from the source document".into());
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    pub fn summary(&self) -> String {
        let endpoint = self.endpoint(self.provider);
        format!(
            "Configuration:
  Source document:   {}
  Target document:   {}
  Output document:   {}
  Backup directory:  {}
  Temp directory:    {}{}

  Provider:          {} (model {})
  API key set:       {}
  Temperature:       {}
  Multimodal:        {}
  Images per call:   {}
  Max image edge:    {}px
  Timeouts:          multimodal {}s, text {}s

  Max image width:   {} in
  Image alignment:   {}",
            self.source_path.display(),
            self.target_path.display(),
            self.output_path().display(),
            self.backup_dir.display(),
            self.temp_dir.display(),
            if self.keep_temp { " (kept)" } else { "" },
            self.provider,
            endpoint.model,
            if endpoint.api_key.is_empty() { "no" } else { "yes" },
            self.temperature,
            if self.enable_multimodal { "enabled" } else { "disabled" },
            self.max_images_per_call,
            self.max_image_edge,
            self.multimodal_timeout.as_secs(),
            self.text_timeout.as_secs(),
            self.max_image_width_inches,
            self.alignment,
        )
    }
}

pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string())
}
