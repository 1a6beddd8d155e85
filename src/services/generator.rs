//! Text generation collaborator
//!
//! The engine only needs `generate(prompt, profile) -> text`. The Ollama
//! client here turns an OCEAN vector into a coaching style instruction and
//! calls the local `/api/generate` endpoint.

use crate::error::{MotivateError, Result};
use crate::types::{Dimension, OceanVector};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Produces a response to `prompt` styled by `profile`
///
/// May fail or hang; callers wrap it in a timeout and substitute a
/// placeholder on failure.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ResponseGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, profile: &OceanVector) -> Result<String>;
}

/// Configuration for the Ollama generator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Ollama server (default: http://localhost:11434)
    pub base_url: String,

    /// Model to use (default: mistral)
    pub model: String,

    /// Max tokens to generate
    pub max_tokens: u32,

    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,

    /// HTTP request timeout
    pub request_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "mistral".to_string(),
            max_tokens: 100,
            temperature: 0.8,
            top_p: 0.9,
            top_k: 40,
            request_timeout_secs: 30,
        }
    }
}

/// Style text for the high and low pole of each dimension
fn pole_instructions(dimension: Dimension) -> (&'static str, &'static str) {
    match dimension {
        Dimension::Openness => (
            "Be highly creative and unconventional. Suggest unique, out-of-the-box ideas and experimental approaches.",
            "Be practical and conventional. Focus only on tried-and-true methods that are proven to work.",
        ),
        Dimension::Conscientiousness => (
            "Be very structured and detailed. Emphasize planning, schedules, organization, and step-by-step systems.",
            "Be casual and spontaneous. Avoid rigid plans and encourage going with the flow.",
        ),
        Dimension::Extraversion => (
            "Be energetic and social. Emphasize teamwork, talking to others, and taking bold action.",
            "Be calm and introspective. Focus on quiet reflection, alone time, and inner work.",
        ),
        Dimension::Agreeableness => (
            "Be extremely warm and supportive. Show empathy, validate feelings, and be encouraging.",
            "Be blunt and direct. Give tough love and focus on facts over feelings.",
        ),
        Dimension::Neuroticism => (
            "Acknowledge stress and anxiety. Provide reassurance and calming strategies.",
            "Be confident and bold. Ignore worry and push for resilience.",
        ),
    }
}

/// Build the system instruction for a profile
///
/// Dimensions at or above 0.7 contribute their high-pole style, at or below
/// 0.3 their low-pole style; anything in between is left unstated.
pub fn style_instruction(profile: &OceanVector) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for dim in Dimension::ALL {
        let value = profile.get(dim);
        let (high, low) = pole_instructions(dim);
        if value >= 0.7 {
            parts.push(high);
        } else if value <= 0.3 {
            parts.push(low);
        }
    }

    if parts.is_empty() {
        parts.push("Provide balanced, helpful motivational advice.");
    }

    format!(
        "You are a motivational coach. {} Make your response VERY DIFFERENT from other approaches. Keep response to 1-2 short sentences. Be concise and general.",
        parts.join(" ")
    )
}

/// Keep the first paragraph and at most two sentences
fn tidy_response(raw: &str) -> String {
    let first_paragraph = raw.trim().lines().next().unwrap_or("").trim();
    let sentences: Vec<&str> = first_paragraph.split(". ").collect();
    if sentences.len() > 2 {
        format!("{}.", sentences[..2].join(". "))
    } else {
        first_paragraph.to_string()
    }
}

/// Ollama `/api/generate` request
#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    num_predict: u32,
}

/// Ollama `/api/generate` response
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Generator backed by a local Ollama server
pub struct OllamaGenerator {
    config: GeneratorConfig,
    client: reqwest::Client,
}

impl OllamaGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(MotivateError::ValidationError(
                "generator base_url cannot be empty".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| MotivateError::CollaboratorUnavailable(e.to_string()))?;

        Ok(Self { config, client })
    }

    pub fn with_default() -> Result<Self> {
        Self::new(GeneratorConfig::default())
    }

    /// Probe `GET /api/tags`
    pub async fn is_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url.trim_end_matches('/'));
        match self
            .client
            .get(url)
            .timeout(Duration::from_secs(2))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    async fn call_api(&self, full_prompt: String) -> Result<String> {
        debug!("Calling Ollama generate with model {}", self.config.model);

        let request = GenerateRequest {
            model: self.config.model.clone(),
            prompt: full_prompt,
            stream: false,
            options: GenerateOptions {
                temperature: self.config.temperature,
                top_p: self.config.top_p,
                top_k: self.config.top_k,
                num_predict: self.config.max_tokens,
            },
        };

        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .json(&request)
            .send()
            .await
            .map_err(|e| MotivateError::CollaboratorUnavailable(format!("generator: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(MotivateError::CollaboratorUnavailable(format!(
                "generator returned status {}: {}",
                status, error_text
            )));
        }

        let body: GenerateResponse = response.json().await.map_err(|e| {
            MotivateError::CollaboratorUnavailable(format!(
                "failed to parse generator response: {}",
                e
            ))
        })?;

        Ok(body.response)
    }
}

#[async_trait]
impl ResponseGenerator for OllamaGenerator {
    async fn generate(&self, prompt: &str, profile: &OceanVector) -> Result<String> {
        profile.validate()?;
        let full_prompt = format!("{}\n\nPerson: {}\n\nCoach:", style_instruction(profile), prompt);

        let text = tidy_response(&self.call_api(full_prompt).await?);
        if text.is_empty() {
            return Err(MotivateError::CollaboratorUnavailable(
                "generator returned an empty response".to_string(),
            ));
        }
        Ok(text)
    }
}
