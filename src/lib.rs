pub mod advisor;
pub mod analyze;
pub mod config;
mod docx;
mod error;
pub mod execute;
pub mod extract;
pub mod model;
pub mod pipeline;
pub mod plan;
pub mod report;
pub mod verify;

pub use advisor::{Advice, Advisor, AdvisorSettings, InferenceRequest, ModelReply, PlacementModel};
pub use analyze::{Structure, analyze};
pub use config::{Config, ProviderKind};
pub use docx::Package;
pub use error::{Error, InferenceError};
pub use execute::{ExecuteOptions, execute};
pub use extract::extract_images;
pub use plan::PlacementPlan;
pub use report::RunSummary;
pub use verify::{Verification, verify};

/// Run the whole pipeline with the provider selected in `config`.
pub fn place_images(config: &Config) -> Result<RunSummary, Error> {
    let model = advisor::model_from_config(config)?;
    pipeline::run(config, model.as_ref())
}
