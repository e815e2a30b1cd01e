use anyhow::{Context, Result};
use log::error;
use serde::{Deserialize, Serialize};
use std::env;

/// Answer returned in place of model output when the model call fails
pub const LLM_ERROR_PLACEHOLDER: &str = "Error generating response.";

const DEFAULT_GENERATE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash-thinking-exp-01-21:generateContent";

/// Configuration for Gemini API
#[derive(Clone, Debug)]
pub struct GeminiConfig {
    pub api_key: String,
    pub generate_url: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: String::new(),
            generate_url: DEFAULT_GENERATE_URL.to_string(),
        }
    }
}

impl GeminiConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let api_key = env::var("GEMINI_API_KEY").context("GEMINI_API_KEY not set")?;
        let generate_url =
            env::var("GEMINI_GENERATE_URL").unwrap_or_else(|_| DEFAULT_GENERATE_URL.to_string());

        Ok(GeminiConfig {
            api_key,
            generate_url,
        })
    }
}

/// Sampling parameters for a generation request
#[derive(Debug, Clone, Copy, Serialize)]
pub struct GenerationConfig {
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: i32,
    pub max_output_tokens: i32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        GenerationConfig {
            temperature: 0.2,
            top_p: 0.8,
            top_k: 40,
            max_output_tokens: 2048,
        }
    }
}

/// Something that turns a prompt into generated text.
///
/// Implementations never fail: errors come back as [`LLM_ERROR_PLACEHOLDER`].
#[allow(async_fn_in_trait)]
pub trait AskLlm {
    async fn ask_llm(&self, prompt: &str) -> String;
}

/// Client for interacting with Gemini API
#[derive(Clone)]
pub struct GeminiClient {
    config: GeminiConfig,
    generation: GenerationConfig,
    client: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client
    pub fn new(config: GeminiConfig) -> Self {
        let client = reqwest::Client::new();
        GeminiClient {
            config,
            generation: GenerationConfig::default(),
            client,
        }
    }

    /// Generate text for a single user prompt
    pub async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = GenerateRequest::new(prompt, self.generation);

        let url = format!("{}?key={}", self.config.generate_url, self.config.api_key);

        let response = self.client.post(&url).json(&request).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow::anyhow!(
                "API request failed: {} {}",
                status,
                error_text
            ));
        }

        let response_data: GenerateResponse = response.json().await?;
        response_data.into_text()
    }
}

impl AskLlm for GeminiClient {
    async fn ask_llm(&self, prompt: &str) -> String {
        match self.generate_text(prompt).await {
            Ok(text) => text.trim().to_string(),
            Err(e) => {
                error!("Gemini error: {:#}", e);
                LLM_ERROR_PLACEHOLDER.to_string()
            }
        }
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

impl<'a> GenerateRequest<'a> {
    fn new(prompt: &'a str, generation_config: GenerationConfig) -> Self {
        GenerateRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
                role: "user",
            }],
            generation_config,
        }
    }
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
    role: &'static str,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Deserialize, Debug)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

impl GenerateResponse {
    /// Text of the first part of the first candidate
    fn into_text(self) -> Result<String> {
        self.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow::anyhow!("No response generated"))
    }
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Deserialize, Debug)]
struct ResponseContent {
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: String,
}
