//! OpenAI-compatible chat completions client (GLM and anything speaking the
//! same protocol).

use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use super::{InferenceRequest, ModelReply, PlacementModel};
use crate::error::{Error, InferenceError};

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<Content>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Content {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    model: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

pub struct OpenAiCompatibleModel {
    client: Client,
    provider: String,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatibleModel {
    pub fn new(provider: &str, base_url: &str, api_key: &str, model: &str) -> Result<Self, Error> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {e}")))?;
        Ok(OpenAiCompatibleModel {
            client,
            provider: provider.to_string(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.to_string(),
            model: model.to_string(),
        })
    }

    fn build_body(&self, request: &InferenceRequest) -> ChatRequest<'_> {
        let images = request.images_to_send();
        let content = if images.is_empty() {
            MessageContent::Text(request.context.clone())
        } else {
            let mut parts = vec![Content::Text {
                text: request.context.clone(),
            }];
            for image in images {
                let encoded = base64::engine::general_purpose::STANDARD.encode(&image.data);
                parts.push(Content::ImageUrl {
                    image_url: ImageUrl {
                        url: format!("data:{};base64,{encoded}", image.mime_type),
                    },
                });
            }
            MessageContent::Parts(parts)
        };
        ChatRequest {
            model: &self.model,
            messages: vec![Message {
                role: "user",
                content,
            }],
            temperature: request.temperature,
        }
    }
}

impl PlacementModel for OpenAiCompatibleModel {
    fn name(&self) -> &str {
        &self.provider
    }

    /// Only vision variants (GLM-4V and similar) take images.
    fn supports_images(&self) -> bool {
        let model = self.model.to_ascii_lowercase();
        model.contains("4v") || model.contains("vision")
    }

    fn infer(&self, request: &InferenceRequest) -> Result<ModelReply, InferenceError> {
        if !request.images.is_empty() && !self.supports_images() {
            return Err(InferenceError::ImagesUnsupported);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(request.timeout)
            .json(&self.build_body(request))
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

        let parsed: ChatResponse = response
            .json()
            .map_err(|e| InferenceError::from_reqwest(e, request.timeout))?;
        let text = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|t| !t.trim().is_empty())
            .ok_or(InferenceError::EmptyReply)?;

        Ok(ModelReply {
            text,
            model: parsed.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}
