//! Google Gemini `generateContent` client.

use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{InferenceRequest, ModelReply, PlacementModel};
use crate::error::{Error, InferenceError};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<ContentBlock>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct ContentBlock {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    Inline { inline_data: InlineData },
}

#[derive(Debug, Serialize)]
struct InlineData {
    mime_type: &'static str,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

pub struct GeminiModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl GeminiModel {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(GeminiModel {
            client,
            endpoint: format!(
                "{}/models/{}:generateContent",
                base_url.trim_end_matches('/'),
                model
            ),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn build_body(request: &InferenceRequest) -> GenerateRequest {
        let mut parts = vec![Part::Text {
            text: request.context.clone(),
        }];
        for image in request.images_to_send() {
            parts.push(Part::Inline {
                inline_data: InlineData {
                    mime_type: image.mime_type,
                    data: base64::engine::general_purpose::STANDARD.encode(&image.data),
                },
            });
        }
        GenerateRequest {
            contents: vec![ContentBlock { role: "user", parts }],
            generation_config: GenerationConfig {
                temperature: request.temperature,
            },
        }
    }
}

impl PlacementModel for GeminiModel {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_images(&self) -> bool {
        true
    }

    fn infer(&self, request: &InferenceRequest) -> Result<ModelReply, InferenceError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", &self.api_key)
            .timeout(request.timeout)
            .json(&Self::build_body(request))
            .send()
            .map_err(|e| InferenceError::from_reqwest(e, request.timeout))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(InferenceError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| InferenceError::from_reqwest(e, request.timeout))?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(InferenceError::EmptyReply);
        }

        Ok(ModelReply {
            text,
            model: parsed.model_version.unwrap_or_else(|| self.model.clone()),
        })
    }
}
