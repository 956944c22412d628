use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;

// --- Provider trait ---

pub trait AIProvider {
    fn complete(&self, system_prompt: Option<&str>, user_prompt: &str, max_tokens: u32)
        -> Result<String>;
    #[allow(dead_code)]
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    Ollama,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    // "ollama:<model>" runs any local model without an API key
    if let Some(model) = name.strip_prefix("ollama:") {
        return Ok(ModelSpec {
            provider: ProviderKind::Ollama,
            model_id: model.to_string(),
            short_name: format!("ollama:{model}"),
        });
    }

    match name {
        // Direct Anthropic API (requires ANTHROPIC_API_KEY)
        "sonnet" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-sonnet-4-5-20250929".to_string(),
            short_name: "sonnet".to_string(),
        }),
        "opus" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-opus-4-6".to_string(),
            short_name: "opus".to_string(),
        }),
        "haiku" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-haiku-4-5-20251001".to_string(),
            short_name: "haiku".to_string(),
        }),
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-4o" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-4o".to_string(),
            short_name: "gpt-4o".to_string(),
        }),
        "gpt-4.1" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-4.1".to_string(),
            short_name: "gpt-4.1".to_string(),
        }),
        "o3" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "o3".to_string(),
            short_name: "o3".to_string(),
        }),
        // Local Ollama (no key needed)
        "llama3.2" | "mistral" => Ok(ModelSpec {
            provider: ProviderKind::Ollama,
            model_id: name.to_string(),
            short_name: name.to_string(),
        }),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: gpt-4o (default), gpt-4.1, o3, sonnet, opus, haiku, \
             llama3.2, mistral, or ollama:<model>",
            name
        )),
    }
}

pub fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    match spec.provider {
        ProviderKind::Anthropic => {
            let provider = AnthropicProvider::new(spec.model_id.clone())?;
            Ok(Box::new(provider))
        }
        ProviderKind::OpenAI => {
            let provider = OpenAIProvider::new(spec.model_id.clone())?;
            Ok(Box::new(provider))
        }
        ProviderKind::Ollama => {
            let provider = OllamaProvider::new(spec.model_id.clone());
            Ok(Box::new(provider))
        }
    }
}

// --- Anthropic provider ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Serialize)]
struct AnthropicMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[allow(dead_code)]
    #[serde(rename = "type")]
    content_type: String,
    text: String,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicContentBlock>,
}

#[derive(Debug)]
pub struct AnthropicProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("ANTHROPIC_API_KEY")
            .context("ANTHROPIC_API_KEY environment variable not set. Set it with: export ANTHROPIC_API_KEY=your-key-here")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }
}

impl AIProvider for AnthropicProvider {
    fn complete(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let request = AnthropicRequest {
            model: self.model_id.clone(),
            max_tokens,
            system: system_prompt.map(str::to_string),
            messages: vec![AnthropicMessage {
                role: "user".to_string(),
                content: user_prompt.to_string(),
            }],
        };

        let response = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to Anthropic API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Anthropic API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: AnthropicResponse = response
            .json()
            .context("Failed to parse Anthropic API response")?;

        api_response
            .content
            .first()
            .map(|block| block.text.clone())
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI provider ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<OpenAIMessage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
}

#[derive(Debug)]
pub struct OpenAIProvider {
    api_key: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY")
            .context("OPENAI_API_KEY environment variable not set. Set it with: export OPENAI_API_KEY=your-key-here")?;
        let client = reqwest::blocking::Client::new();
        Ok(Self { api_key, model_id, client })
    }
}

impl AIProvider for OpenAIProvider {
    fn complete(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
        max_tokens: u32,
    ) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(OpenAIMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(OpenAIMessage {
            role: "user".to_string(),
            content: user_prompt.to_string(),
        });

        let request = OpenAIRequest {
            model: self.model_id.clone(),
            max_tokens,
            messages,
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .context("Failed to send request to OpenAI API")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "OpenAI API request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OpenAIResponse = response
            .json()
            .context("Failed to parse OpenAI API response")?;

        api_response
            .choices
            .first()
            .map(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Ollama provider (local, no API key) ---

const OLLAMA_DEFAULT_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponseMessage {
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaResponseMessage,
}

#[derive(Debug)]
pub struct OllamaProvider {
    base_url: String,
    model_id: String,
    client: reqwest::blocking::Client,
}

impl OllamaProvider {
    pub fn new(model_id: String) -> Self {
        let base_url = env::var("OLLAMA_HOST").unwrap_or_else(|_| OLLAMA_DEFAULT_URL.to_string());
        let client = reqwest::blocking::Client::new();
        Self { base_url, model_id, client }
    }
}

impl AIProvider for OllamaProvider {
    fn complete(
        &self,
        system_prompt: Option<&str>,
        user_prompt: &str,
        _max_tokens: u32,
    ) -> Result<String> {
        let mut messages = Vec::new();
        if let Some(system) = system_prompt {
            messages.push(OllamaMessage {
                role: "system".to_string(),
                content: system.to_string(),
            });
        }
        messages.push(OllamaMessage {
            role: "user".to_string(),
            content: user_prompt.to_string(),
        });

        let request = OllamaRequest {
            model: self.model_id.clone(),
            messages,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/chat", self.base_url))
            .json(&request)
            .send()
            .with_context(|| {
                format!(
                    "Failed to reach Ollama at {}. Is the ollama daemon running?",
                    self.base_url
                )
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().unwrap_or_default();
            return Err(anyhow!(
                "Ollama request failed with status {}: {}",
                status,
                error_text
            ));
        }

        let api_response: OllamaResponse = response
            .json()
            .context("Failed to parse Ollama response")?;

        Ok(api_response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}
