use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use docx_place::config::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL, DEFAULT_GLM_BASE_URL, DEFAULT_GLM_MODEL,
};
use docx_place::model::Alignment;
use docx_place::{Config, ProviderKind};

/// Place the images of one DOCX into another, letting a language model pick
/// where each one goes.
#[derive(Parser, Debug)]
#[command(name = "docx-place")]
#[command(version, about, long_about = None)]
struct Args {
    /// Document to take images from
    #[arg(long, env = "SOURCE_DOCX", default_value = "from/source.docx")]
    source: PathBuf,

    /// Document to place images into
    #[arg(long, env = "TARGET_DOCX", default_value = "to/target.docx")]
    target: PathBuf,

    /// Output file (default: <output-dir>/<target stem>_result.docx)
    #[arg(short, long, env = "OUTPUT_DOCX")]
    output: Option<PathBuf>,

    #[arg(long, env = "OUTPUT_DIR", default_value = "output")]
    output_dir: PathBuf,

    #[arg(long, env = "BACKUP_DIR", default_value = "backup")]
    backup_dir: PathBuf,

    /// Root for per-run working directories
    #[arg(long, env = "TEMP_DIR", default_value = "temp")]
    temp_dir: PathBuf,

    /// Keep extracted images after the run
    #[arg(long, env = "KEEP_TEMP")]
    keep_temp: bool,

    /// glm or gemini
    #[arg(long, env = "LLM_PROVIDER", default_value = "glm")]
    provider: ProviderKind,

    #[arg(long, env = "GLM_API_KEY", hide_env_values = true, default_value = "")]
    glm_api_key: String,

    #[arg(long, env = "GLM_BASE_URL", default_value = DEFAULT_GLM_BASE_URL)]
    glm_base_url: String,

    #[arg(long, env = "GLM_MODEL", default_value = DEFAULT_GLM_MODEL)]
    glm_model: String,

    #[arg(long, env = "GEMINI_API_KEY", hide_env_values = true, default_value = "")]
    gemini_api_key: String,

    #[arg(long, env = "GEMINI_BASE_URL", default_value = DEFAULT_GEMINI_BASE_URL)]
    gemini_base_url: String,

    #[arg(long, env = "GEMINI_MODEL", default_value = DEFAULT_GEMINI_MODEL)]
    gemini_model: String,

    /// Send images to the model along with the document outline
    #[arg(long, env = "ENABLE_MULTIMODAL")]
    multimodal: bool,

    #[arg(long, env = "MAX_IMAGES_PER_CALL", default_value = "5")]
    max_images_per_call: usize,

    /// Longest edge in pixels of images sent to the model
    #[arg(long, env = "MAX_IMAGE_EDGE", default_value = "1024")]
    max_image_edge: u32,

    /// Multimodal request timeout in seconds
    #[arg(long, env = "INFERENCE_TIMEOUT_SECS", default_value = "60")]
    timeout: u64,

    /// Text-only request timeout in seconds
    #[arg(long, env = "TEXT_TIMEOUT_SECS", default_value = "120")]
    text_timeout: u64,

    #[arg(long, env = "TEMPERATURE", default_value = "0.0")]
    temperature: f32,

    /// Characters of each paragraph shown to the model
    #[arg(long, env = "EXCERPT_CHARS", default_value = "60")]
    excerpt_chars: usize,

    /// Widest an inserted image may be, in inches
    #[arg(long, env = "MAX_IMAGE_WIDTH_INCHES", default_value = "6.0")]
    max_width: f32,

    /// left, center or right
    #[arg(long, env = "IMAGE_ALIGNMENT", default_value = "center")]
    alignment: Alignment,
}

impl Args {
    fn into_config(self) -> Config {
        let mut config = Config {
            provider: self.provider,
            enable_multimodal: self.multimodal,
            max_images_per_call: self.max_images_per_call,
            max_image_edge: self.max_image_edge,
            multimodal_timeout: Duration::from_secs(self.timeout),
            text_timeout: Duration::from_secs(self.text_timeout),
            temperature: self.temperature,
            excerpt_chars: self.excerpt_chars,
            source_path: self.source,
            target_path: self.target,
            output_path: self.output,
            output_dir: self.output_dir,
            backup_dir: self.backup_dir,
            temp_dir: self.temp_dir,
            keep_temp: self.keep_temp,
            max_image_width_inches: self.max_width,
            alignment: self.alignment,
            ..Config::default()
        };
        config.glm.api_key = self.glm_api_key;
        config.glm.base_url = self.glm_base_url;
        config.glm.model = self.glm_model;
        config.gemini.api_key = self.gemini_api_key;
        config.gemini.base_url = self.gemini_base_url;
        config.gemini.model = self.gemini_model;
        config
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();

    println!("docx-place {}", env!("CARGO_PKG_VERSION"));
    println!("{}", config.summary());
    println!();

    if let Err(problems) = config.validate() {
        eprintln!("Configuration errors:");
        for problem in &problems {
            eprintln!("  - {problem}");
        }
        eprintln!();
        eprintln!("Set the API key for the selected provider (GLM_API_KEY or GEMINI_API_KEY),");
        eprintln!("or choose another provider with --provider / LLM_PROVIDER.");
        let available = config.available_providers();
        if !available.is_empty() {
            let names: Vec<String> = available.iter().map(ToString::to_string).collect();
            eprintln!("Providers with a key configured: {}", names.join(", "));
        }
        return ExitCode::FAILURE;
    }

    match docx_place::place_images(&config) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("{e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
