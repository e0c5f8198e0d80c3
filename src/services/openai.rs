use crate::config::Config;
use anyhow::Result;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Option<Vec<Choice>>,
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    prompt_tokens: Option<i64>,
    completion_tokens: Option<i64>,
}

#[derive(Serialize)]
struct ImageGenerationRequest {
    model: String,
    prompt: String,
    size: String,
    quality: String,
    n: u32,
}

#[derive(Deserialize)]
struct ImageGenerationResponse {
    data: Option<Vec<GeneratedImage>>,
}

#[derive(Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescribeMode {
    Standard,
    Medical,
}

impl DescribeMode {
    fn system_prompt(self) -> &'static str {
        match self {
            DescribeMode::Standard => STANDARD_SYSTEM,
            DescribeMode::Medical => MEDICAL_SYSTEM,
        }
    }

    fn user_prompt(self) -> &'static str {
        match self {
            DescribeMode::Standard => "Describe this photo.",
            DescribeMode::Medical => "Perform a medical analysis of this image.",
        }
    }

    fn max_tokens(self) -> u32 {
        match self {
            DescribeMode::Standard => 200,
            DescribeMode::Medical => 600,
        }
    }
}

/// Outcome of a vision call. On any failure `text` carries the error message
/// and both token counts are zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    pub text: String,
    pub input_tokens: i64,
    pub output_tokens: i64,
}

impl Description {
    fn failed(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            input_tokens: 0,
            output_tokens: 0,
        }
    }
}

const STANDARD_SYSTEM: &str = "You are an assistant that describes photos. Answer briefly.";

const MEDICAL_SYSTEM: &str = r#"You are an advanced medical AI assistant. Perform a professional analysis of the visible image (X-ray, CT, skin, injuries). Identify the visible anatomical structures and any anomalies. Use professional medical terminology, but explain it in plain language in parentheses.
IMPORTANT: End with the disclaimer: "This is an AI analysis, not medical advice. Consult a doctor.""#;

pub const MISSING_KEY_MESSAGE: &str = "Error: the OpenAI API key is not configured (set OPENAI_API_KEY).";

/// Client for the OpenAI-compatible vision and image-generation endpoints.
/// Built once at startup and shared through `AppState`.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    vision_model: String,
    image_model: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.ai_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            api_key: config.openai_api_key.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            vision_model: config.vision_model.clone(),
            image_model: config.image_model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        !self.api_key.is_empty()
    }

    pub fn vision_model(&self) -> &str {
        &self.vision_model
    }

    pub fn image_model(&self) -> &str {
        &self.image_model
    }

    /// Describe the image at `path`. Never fails: errors come back as text.
    pub async fn describe_image(&self, path: &Path, mode: DescribeMode) -> Description {
        if !self.is_configured() {
            return Description::failed(MISSING_KEY_MESSAGE);
        }

        let bytes = match tokio::fs::read(path).await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!("Failed to read {}: {}", path.display(), e);
                return Description::failed("Error: could not read the image file.");
            }
        };

        match self.request_description(&bytes, mode).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(?mode, "Vision request failed: {:#}", e);
                Description::failed(format!("API error: {}", e))
            }
        }
    }

    async fn request_description(&self, image_bytes: &[u8], mode: DescribeMode) -> Result<Description> {
        let mime = image::guess_format(image_bytes)
            .map(|f| f.to_mime_type())
            .unwrap_or("image/jpeg");
        let b64 = base64::engine::general_purpose::STANDARD.encode(image_bytes);

        let req = ChatRequest {
            model: self.vision_model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".into(),
                    content: MessageContent::Text(mode.system_prompt().into()),
                },
                ChatMessage {
                    role: "user".into(),
                    content: MessageContent::Parts(vec![
                        ContentPart::Text {
                            text: mode.user_prompt().into(),
                        },
                        ContentPart::ImageUrl {
                            image_url: ImageUrl {
                                url: format!("data:{};base64,{}", mime, b64),
                            },
                        },
                    ]),
                },
            ],
            max_tokens: mode.max_tokens(),
        };

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error {}: {}", status, body);
        }

        let data: ChatResponse = resp.json().await?;
        parse_chat_response(data)
    }

    /// Generate an image from `prompt` and return its URL, or `None` on failure.
    pub async fn generate_image(&self, prompt: &str) -> Option<String> {
        if !self.is_configured() {
            tracing::warn!("Image generation skipped: API key not configured");
            return None;
        }

        tracing::info!(model = %self.image_model, "Generating image from prompt");
        match self.request_image(prompt).await {
            Ok(url) => Some(url),
            Err(e) => {
                tracing::error!("Image generation failed: {:#}", e);
                None
            }
        }
    }

    async fn request_image(&self, prompt: &str) -> Result<String> {
        let req = ImageGenerationRequest {
            model: self.image_model.clone(),
            prompt: prompt.into(),
            size: "1024x1024".into(),
            quality: "standard".into(),
            n: 1,
        };

        let resp = self
            .http
            .post(format!("{}/images/generations", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&req)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI images error {}: {}", status, body);
        }

        let data: ImageGenerationResponse = resp.json().await?;
        data.data
            .and_then(|d| d.into_iter().next())
            .and_then(|img| img.url)
            .ok_or_else(|| anyhow::anyhow!("No image URL in response"))
    }
}

fn parse_chat_response(data: ChatResponse) -> Result<Description> {
    let choice = data
        .choices
        .and_then(|c| c.into_iter().next())
        .ok_or_else(|| anyhow::anyhow!("No choices in OpenAI response"))?;
    let text = choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| anyhow::anyhow!("OpenAI response choice had no content"))?;

    Ok(Description {
        text: text.trim().to_string(),
        input_tokens: data.usage.as_ref().and_then(|u| u.prompt_tokens).unwrap_or(0),
        output_tokens: data.usage.as_ref().and_then(|u| u.completion_tokens).unwrap_or(0),
    })
}
