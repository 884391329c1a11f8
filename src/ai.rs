use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::time::{Duration, Instant};

// --- Provider trait ---

#[async_trait]
pub trait AIProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String>;
    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone)]
pub enum ProviderKind {
    Anthropic,
    OpenAI,
    ClaudeCode,
}

#[derive(Debug, Clone)]
pub struct ModelSpec {
    pub provider: ProviderKind,
    pub model_id: String,
    pub short_name: String,
}

pub const DEFAULT_MODEL: &str = "api-sonnet";

pub fn resolve_model(name: &str) -> Result<ModelSpec> {
    match name {
        // Claude Code provider (uses `claude` CLI, no API key needed)
        "claude-sonnet" | "sonnet" => Ok(ModelSpec {
            provider: ProviderKind::ClaudeCode,
            model_id: "claude-sonnet-4-5-20250929".to_string(),
            short_name: "claude-sonnet".to_string(),
        }),
        "claude-opus" | "opus" => Ok(ModelSpec {
            provider: ProviderKind::ClaudeCode,
            model_id: "claude-opus-4-6".to_string(),
            short_name: "claude-opus".to_string(),
        }),
        "claude-haiku" | "haiku" => Ok(ModelSpec {
            provider: ProviderKind::ClaudeCode,
            model_id: "claude-haiku-4-5-20251001".to_string(),
            short_name: "claude-haiku".to_string(),
        }),
        // Direct Anthropic API (requires ANTHROPIC_API_KEY)
        "api-sonnet" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-sonnet-4-5-20250929".to_string(),
            short_name: "api-sonnet".to_string(),
        }),
        "api-opus" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-opus-4-6".to_string(),
            short_name: "api-opus".to_string(),
        }),
        "api-haiku" => Ok(ModelSpec {
            provider: ProviderKind::Anthropic,
            model_id: "claude-haiku-4-5-20251001".to_string(),
            short_name: "api-haiku".to_string(),
        }),
        // OpenAI (requires OPENAI_API_KEY)
        "gpt-5.2" | "gpt5" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-5.2".to_string(),
            short_name: "gpt-5.2".to_string(),
        }),
        "gpt-4o" => Ok(ModelSpec {
            provider: ProviderKind::OpenAI,
            model_id: "gpt-4o".to_string(),
            short_name: "gpt-4o".to_string(),
        }),
        _ => Err(anyhow!(
            "Unknown model '{}'. Available: api-sonnet (default), api-opus, api-haiku, \
             claude-sonnet, claude-opus, claude-haiku, gpt-5.2, gpt-4o",
            name
        )),
    }
}

pub async fn create_provider(spec: &ModelSpec) -> Result<Box<dyn AIProvider>> {
    tracing::info!(model = %spec.short_name, "using model");
    match spec.provider {
        ProviderKind::ClaudeCode => Ok(Box::new(ClaudeCodeProvider::new(spec.model_id.clone()).await?)),
        ProviderKind::Anthropic => Ok(Box::new(AnthropicProvider::new(spec.model_id.clone())?)),
        ProviderKind::OpenAI => Ok(Box::new(OpenAIProvider::new(spec.model_id.clone())?)),
    }
}

const LLM_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

/// Request body shared by the Anthropic messages and OpenAI chat endpoints.
#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [ChatMessage<'a>; 1],
}

impl<'a> ChatRequest<'a> {
    fn user(model: &'a str, prompt: &'a str, max_tokens: u32) -> Self {
        Self {
            model,
            max_tokens,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
        }
    }
}

fn api_key(var: &str) -> Result<String> {
    env::var(var).with_context(|| {
        format!("{var} environment variable not set. Set it with: export {var}=your-key-here")
    })
}

fn http_client() -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(LLM_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")
}

/// Sends a prepared request and decodes a successful JSON reply.
async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder, api: &str) -> Result<T> {
    let started = Instant::now();
    let response = request
        .send()
        .await
        .with_context(|| format!("Failed to send request to {api} API"))?;
    tracing::debug!(api, status = %response.status(), elapsed_ms = started.elapsed().as_millis() as u64, "llm reply");

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(anyhow!("{api} API request failed with status {status}: {error_text}"));
    }
    response
        .json()
        .await
        .with_context(|| format!("Failed to parse {api} API response"))
}

// --- Anthropic ---

const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";

#[derive(Debug, Deserialize)]
struct AnthropicContentBlock {
    #[serde(default)]
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
    client: reqwest::Client,
}

impl AnthropicProvider {
    pub fn new(model_id: String) -> Result<Self> {
        Ok(Self {
            api_key: api_key("ANTHROPIC_API_KEY")?,
            model_id,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl AIProvider for AnthropicProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = self
            .client
            .post(ANTHROPIC_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&ChatRequest::user(&self.model_id, prompt, max_tokens));
        let reply: AnthropicResponse = send_json(request, "Anthropic").await?;

        reply
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .ok_or_else(|| anyhow!("No content in Anthropic API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Claude Code (shells out to the `claude` CLI) ---

#[derive(Debug)]
pub struct ClaudeCodeProvider {
    model_id: String,
}

impl ClaudeCodeProvider {
    pub async fn new(model_id: String) -> Result<Self> {
        tokio::process::Command::new("claude")
            .arg("--version")
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await
            .context("'claude' CLI not found. Install it or use api-sonnet/gpt-5.2 instead.")?;
        Ok(Self { model_id })
    }
}

#[async_trait]
impl AIProvider for ClaudeCodeProvider {
    async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String> {
        let output = tokio::time::timeout(
            LLM_TIMEOUT,
            tokio::process::Command::new("claude")
                .args(["-p", prompt, "--model", self.model_id.as_str()])
                .kill_on_drop(true)
                .output(),
        )
        .await
        .context("claude CLI timed out")?
        .context("Failed to run 'claude' CLI")?;

        if !output.status.success() {
            return Err(anyhow!("claude CLI failed: {}", String::from_utf8_lossy(&output.stderr)));
        }
        let response = String::from_utf8(output.stdout).context("Invalid UTF-8 in claude CLI output")?;
        if response.trim().is_empty() {
            return Err(anyhow!("Empty response from claude CLI"));
        }
        Ok(response)
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- OpenAI ---

const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    #[serde(default)]
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
    client: reqwest::Client,
}

impl OpenAIProvider {
    pub fn new(model_id: String) -> Result<Self> {
        Ok(Self {
            api_key: api_key("OPENAI_API_KEY")?,
            model_id,
            client: http_client()?,
        })
    }
}

#[async_trait]
impl AIProvider for OpenAIProvider {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String> {
        let request = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest::user(&self.model_id, prompt, max_tokens));
        let reply: OpenAIResponse = send_json(request, "OpenAI").await?;

        reply
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("No choices in OpenAI API response"))
    }

    fn model_name(&self) -> &str {
        &self.model_id
    }
}

// --- Structured completions ---

/// Parses a model reply that should be a JSON object, tolerating a
/// surrounding ```json fence.
pub fn parse_json_response<T: DeserializeOwned>(response: &str) -> Result<T> {
    let mut text = response.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    serde_json::from_str(text.trim()).map_err(|e| {
        let preview: String = response.chars().take(500).collect();
        anyhow!("Failed to parse model response as JSON: {}\nResponse: {}", e, preview)
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JobAnalysis {
    pub title: Option<String>,
    pub company: Option<String>,
    pub requirements: Vec<String>,
    pub skills: Vec<String>,
    pub experience: Option<String>,
    pub salary: Option<String>,
    pub location: Option<String>,
    pub disqualifiers: Vec<String>,
}

pub async fn analyze_job(
    provider: &dyn AIProvider,
    job_url: &str,
    job_text: &str,
) -> Result<JobAnalysis> {
    let prompt = format!(
        "Analyze this job posting and extract structured information. Return ONLY valid JSON with no additional text.\n\n\
        Job URL: {job_url}\n\n\
        Job Text:\n{job_text}\n\n\
        Extract the following information and return as JSON:\n\
        {{\n\
          \"title\": \"Job title\",\n\
          \"company\": \"Company name\",\n\
          \"requirements\": [\"List of key requirements\"],\n\
          \"skills\": [\"List of technical and soft skills required\"],\n\
          \"experience\": \"Years of experience required (e.g., '5+ years') or null\",\n\
          \"salary\": \"Salary range if mentioned or null\",\n\
          \"location\": \"Job location or null\",\n\
          \"disqualifiers\": [\"Hard requirements that could disqualify candidates, e.g. 'US Citizenship Required', 'TS/SCI Clearance'\"]\n\
        }}\n\n\
        Be thorough but concise. Return ONLY the JSON object."
    );

    let response = provider.complete(&prompt, 3000).await?;
    parse_json_response(&response)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    /// Safe to submit without review.
    Auto,
    Review,
    /// Sensitive or low-confidence; the applicant should write it.
    Manual,
}

impl Confidence {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "auto" => Confidence::Auto,
            "manual" => Confidence::Manual,
            _ => Confidence::Review,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub answer: String,
    pub confidence: Confidence,
}

#[derive(Deserialize)]
struct RawQuestionAnswer {
    #[serde(default)]
    answer: String,
    #[serde(default)]
    confidence: String,
}

pub async fn answer_question(
    provider: &dyn AIProvider,
    question: &str,
    user_profile: &serde_json::Value,
    job_context: &serde_json::Value,
) -> Result<QuestionAnswer> {
    let profile = serde_json::to_string_pretty(user_profile)?;
    let job = serde_json::to_string_pretty(job_context)?;
    let prompt = format!(
        "You are helping a job applicant answer an application question honestly and effectively.\n\n\
        Question: {question}\n\n\
        User Profile:\n{profile}\n\n\
        Job Context:\n{job}\n\n\
        Instructions:\n\
        1. Generate a thoughtful, honest answer based on the user's profile\n\
        2. Tailor the answer to the specific job context\n\
        3. Determine confidence level:\n   \
           - \"auto\": High confidence, can be submitted automatically\n   \
           - \"review\": Medium confidence, user should review before submitting\n   \
           - \"manual\": Low confidence or sensitive question, user must write manually\n\n\
        Return ONLY valid JSON with no additional text:\n\
        {{\n  \"answer\": \"Your thoughtful answer here\",\n  \"confidence\": \"auto\"\n}}"
    );

    let response = provider.complete(&prompt, 2000).await?;
    let raw: RawQuestionAnswer = parse_json_response(&response)?;
    Ok(QuestionAnswer {
        answer: raw.answer,
        confidence: Confidence::parse(&raw.confidence),
    })
}
