//! Placement advisor: turns a structure snapshot and the extracted assets into
//! a validated [`PlacementPlan`] by asking a reasoning model.
//!
//! The model sits behind [`PlacementModel`]; providers only move bytes. The
//! multimodal → text-only fallback lives here so every provider gets the same
//! degradation behaviour.

mod gemini;
mod openai;
mod prompt;
mod vision;

pub use gemini::GeminiModel;
pub use openai::OpenAiCompatibleModel;
pub use prompt::{excerpt, render_context};
pub use vision::{prepare_payload, select_payloads};

use std::time::{Duration, Instant};

use crate::analyze::Structure;
use crate::config::{Config, ProviderKind};
use crate::error::{Error, InferenceError};
use crate::model::{Degradation, ImageAsset, InferenceMode};
use crate::plan::{DroppedEntry, PlacementPlan, parse_reply};

/// An image prepared for transmission.
#[derive(Clone, Debug)]
pub struct ImagePayload {
    pub asset: usize,
    pub mime_type: &'static str,
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug)]
pub struct InferenceRequest {
    pub context: String,
    /// Empty for text-only requests.
    pub images: Vec<ImagePayload>,
    /// Providers never transmit more than this many images.
    pub max_images: usize,
    pub timeout: Duration,
    pub temperature: f32,
}

impl InferenceRequest {
    pub fn mode(&self) -> InferenceMode {
        if self.images.is_empty() {
            InferenceMode::TextOnly
        } else {
            InferenceMode::Multimodal
        }
    }

    /// The images a provider should send, honouring the cap.
    pub fn images_to_send(&self) -> &[ImagePayload] {
        &self.images[..self.images.len().min(self.max_images)]
    }
}

#[derive(Clone, Debug)]
pub struct ModelReply {
    pub text: String,
    pub model: String,
}

/// The reasoning capability consumed by the advisor.
pub trait PlacementModel {
    fn name(&self) -> &str;

    fn supports_images(&self) -> bool;

    fn infer(&self, request: &InferenceRequest) -> Result<ModelReply, InferenceError>;
}

pub fn model_from_config(config: &Config) -> Result<Box<dyn PlacementModel>, Error> {
    let endpoint = config.endpoint(config.provider);
    if endpoint.api_key.is_empty() {
        return Err(Error::Config(format!(
            "{}_API_KEY not set",
            config.provider.to_string().to_ascii_uppercase()
        )));
    }
    log::info!("Creating LLM provider: {} ({})", config.provider, endpoint.model);
    Ok(match config.provider {
        ProviderKind::Glm => Box::new(OpenAiCompatibleModel::new(
            "glm",
            &endpoint.base_url,
            &endpoint.api_key,
            &endpoint.model,
        )?),
        ProviderKind::Gemini => Box::new(GeminiModel::new(
            &endpoint.base_url,
            &endpoint.api_key,
            &endpoint.model,
        )?),
    })
}

#[derive(Clone, Debug)]
pub struct AdvisorSettings {
    pub enable_multimodal: bool,
    pub max_images_per_call: usize,
    pub max_image_edge: u32,
    pub multimodal_timeout: Duration,
    pub text_timeout: Duration,
    pub temperature: f32,
    pub excerpt_chars: usize,
}

impl From<&Config> for AdvisorSettings {
    fn from(config: &Config) -> Self {
        AdvisorSettings {
            enable_multimodal: config.enable_multimodal,
            max_images_per_call: config.max_images_per_call,
            max_image_edge: config.max_image_edge,
            multimodal_timeout: config.multimodal_timeout,
            text_timeout: config.text_timeout,
            temperature: config.temperature,
            excerpt_chars: config.excerpt_chars,
        }
    }
}

impl Default for AdvisorSettings {
    fn default() -> Self {
        AdvisorSettings::from(&Config::default())
    }
}

/// What the advisor produced, including everything it had to discard.
#[derive(Clone, Debug)]
pub struct Advice {
    pub plan: PlacementPlan,
    pub dropped: Vec<DroppedEntry>,
    /// Mode of the call whose reply became the plan.
    pub mode: InferenceMode,
    pub degradation: Option<Degradation>,
    /// Images transmitted in the call whose reply became the plan.
    pub images_sent: usize,
    pub provider: String,
}

pub struct Advisor<'a> {
    model: &'a dyn PlacementModel,
    settings: AdvisorSettings,
}

impl<'a> Advisor<'a> {
    pub fn new(model: &'a dyn PlacementModel, settings: AdvisorSettings) -> Self {
        Advisor { model, settings }
    }

    pub fn advise(&self, structure: &Structure, assets: &[ImageAsset]) -> Result<Advice, Error> {
        let provider = self.model.name().to_string();
        if assets.is_empty() {
            log::info!("No images to place, skipping inference");
            return Ok(Advice {
                plan: PlacementPlan::empty(),
                dropped: Vec::new(),
                mode: InferenceMode::TextOnly,
                degradation: None,
                images_sent: 0,
                provider,
            });
        }

        let mut degradation = None;
        if self.settings.enable_multimodal {
            if !self.model.supports_images() {
                log::warn!("{provider} does not accept image input; using text-only mode");
                degradation = Some(Degradation::MultimodalUnsupported(provider.clone()));
            } else {
                let images = select_payloads(
                    assets,
                    self.settings.max_images_per_call,
                    self.settings.max_image_edge,
                );
                if images.is_empty() {
                    log::warn!("None of the {} images could be prepared; using text-only mode", assets.len());
                    degradation = Some(Degradation::NoAttachableImages);
                } else {
                    let attached: Vec<usize> = images.iter().map(|p| p.asset).collect();
                    let request = InferenceRequest {
                        context: render_context(structure, assets, &attached, self.settings.excerpt_chars),
                        images,
                        max_images: self.settings.max_images_per_call,
                        timeout: self.settings.multimodal_timeout,
                        temperature: self.settings.temperature,
                    };
                    match self.request_plan(&request, structure, assets) {
                        Ok((plan, dropped)) => {
                            return Ok(Advice {
                                plan,
                                dropped,
                                mode: InferenceMode::Multimodal,
                                degradation: None,
                                images_sent: request.images_to_send().len(),
                                provider,
                            });
                        }
                        Err(e) => {
                            log::warn!("Multimodal inference failed ({e}); retrying text-only");
                            degradation = Some(Degradation::MultimodalFailed(e.to_string()));
                        }
                    }
                }
            }
        }

        let request = InferenceRequest {
            context: render_context(structure, assets, &[], self.settings.excerpt_chars),
            images: Vec::new(),
            max_images: self.settings.max_images_per_call,
            timeout: self.settings.text_timeout,
            temperature: self.settings.temperature,
        };
        let (plan, dropped) = self
            .request_plan(&request, structure, assets)
            .map_err(|source| Error::InferenceTransport {
                provider: provider.clone(),
                source,
            })?;

        Ok(Advice {
            plan,
            dropped,
            mode: InferenceMode::TextOnly,
            degradation,
            images_sent: 0,
            provider,
        })
    }

    fn request_plan(
        &self,
        request: &InferenceRequest,
        structure: &Structure,
        assets: &[ImageAsset],
    ) -> Result<(PlacementPlan, Vec<DroppedEntry>), InferenceError> {
        let t0 = Instant::now();
        log::info!(
            "Querying {} ({}, {} images attached)",
            self.model.name(),
            request.mode(),
            request.images_to_send().len()
        );
        log::debug!("Prompt:\n{}", request.context);

        let reply = self.model.infer(request)?;
        log::debug!("Reply from {}:\n{}", reply.model, reply.text);
        if reply.text.trim().is_empty() {
            return Err(InferenceError::EmptyReply);
        }

        let (proposals, mut dropped) = parse_reply(&reply.text)?;
        for entry in &mut dropped {
            entry.resolve_asset(assets);
        }
        let (plan, invalid) = PlacementPlan::validate(proposals, structure.len(), assets);
        dropped.extend(invalid);

        log::info!(
            "Plan: {} placements, {} dropped ({:.1}s)",
            plan.len(),
            dropped.len(),
            t0.elapsed().as_secs_f64()
        );
        for decision in plan.decisions() {
            log::info!(
                "  image {} -> {} node {}: {}",
                decision.asset,
                decision.position,
                decision.node,
                if decision.reason.is_empty() { "no reason given" } else { &decision.reason }
            );
        }
        if plan.len() + dropped.len() < assets.len() {
            log::warn!(
                "Model proposed {} placements for {} images",
                plan.len() + dropped.len(),
                assets.len()
            );
        }
        Ok((plan, dropped))
    }
}
