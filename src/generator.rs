//! Text generation backends.
//!
//! | Config Value | Backend | Endpoint |
//! |-------------|---------|----------|
//! | `"none"` | [`NoopGenerator`] | none; echoes the prompt as an evidence-only briefing |
//! | `"openai"` | [`OpenAiGenerator`] | `POST /v1/responses` |
//! | `"ollama"` | [`OllamaGenerator`] | `POST /api/generate` (`stream: false`) |
//!
//! `openai` without `OPENAI_API_KEY` falls back to `none` with a warning,
//! so a half-configured machine still produces evidence-only briefings.

use anyhow::{bail, Result};
use research_brief_core::Generator;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GeneratorConfig;
use crate::http::{post_json, JsonRequest};

const OPENAI_RESPONSES_URL: &str = "https://api.openai.com/v1/responses";
const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1-mini";
const DEFAULT_OPENAI_TIMEOUT_SECS: u64 = 90;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.1";
const DEFAULT_OLLAMA_TIMEOUT_SECS: u64 = 120;

/// Evidence-only mode: returns the prompt under a short header.
pub struct NoopGenerator;

impl Generator for NoopGenerator {
    fn name(&self) -> &str {
        "none"
    }

    fn generate(&self, _system: &str, user: &str) -> Result<String> {
        Ok(format!(
            "# Briefing\n\n\
             Evidence-only mode (no LLM configured).\n\
             Set [generator] provider in the config.\n\n{}",
            user
        ))
    }
}

/// OpenAI Responses API.
pub struct OpenAiGenerator {
    model: String,
    url: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiGenerator {
    pub fn new(config: &GeneratorConfig, api_key: String) -> Self {
        Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| OPENAI_RESPONSES_URL.to_string()),
            api_key,
            timeout: Duration::from_secs(
                config.timeout_secs.unwrap_or(DEFAULT_OPENAI_TIMEOUT_SECS),
            ),
            max_retries: config.max_retries,
        }
    }
}

impl Generator for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "input": format!("{}\n\n{}", system, user),
        });
        let json = post_json(&JsonRequest {
            service: "OpenAI",
            url: &self.url,
            bearer: Some(&self.api_key),
            body: &body,
            timeout: self.timeout,
            max_retries: self.max_retries,
        })?;
        Ok(parse_responses_output(&json))
    }
}

/// Concatenate every `output[].content[]` item of type `output_text`.
fn parse_responses_output(json: &serde_json::Value) -> String {
    let mut out = String::new();
    let items = json.get("output").and_then(|o| o.as_array());
    for item in items.into_iter().flatten() {
        let contents = item.get("content").and_then(|c| c.as_array());
        for content in contents.into_iter().flatten() {
            if content.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                if let Some(text) = content.get("text").and_then(|t| t.as_str()) {
                    out.push_str(text);
                }
            }
        }
    }
    out.trim().to_string()
}

/// Local Ollama instance.
pub struct OllamaGenerator {
    model: String,
    url: String,
    timeout: Duration,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GeneratorConfig) -> Self {
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
        Self {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_MODEL.to_string()),
            url: url.trim_end_matches('/').to_string(),
            timeout: Duration::from_secs(
                config.timeout_secs.unwrap_or(DEFAULT_OLLAMA_TIMEOUT_SECS),
            ),
            max_retries: config.max_retries,
        }
    }
}

impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": format!("{}\n\n{}", system, user),
            "stream": false,
        });
        let endpoint = format!("{}/api/generate", self.url);
        let json = post_json(&JsonRequest {
            service: "Ollama",
            url: &endpoint,
            bearer: None,
            body: &body,
            timeout: self.timeout,
            max_retries: self.max_retries,
        })?;
        Ok(json
            .get("response")
            .and_then(|r| r.as_str())
            .unwrap_or_default()
            .trim()
            .to_string())
    }
}

/// Create the configured generator.
pub fn create_generator(config: &GeneratorConfig) -> Result<Box<dyn Generator>> {
    let generator: Box<dyn Generator> = match config.provider.as_str() {
        "none" => Box::new(NoopGenerator),
        "openai" => match std::env::var("OPENAI_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Box::new(OpenAiGenerator::new(config, key)),
            _ => {
                warn!("OPENAI_API_KEY not set, falling back to evidence-only generator");
                Box::new(NoopGenerator)
            }
        },
        "ollama" => Box::new(OllamaGenerator::new(config)),
        other => bail!("Unknown generator provider: {}", other),
    };
    info!(provider = %config.provider, generator = generator.name(), "generator ready");
    Ok(generator)
}
