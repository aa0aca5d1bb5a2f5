use std::time::Duration;

use anyhow::{anyhow, Context};
use serde::{Deserialize, Serialize};

use crate::config::ResolvedBackend;

use super::ChatModel;

#[derive(Clone, Debug)]
pub struct HttpModelConfig {
    pub name: String,
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

impl From<&ResolvedBackend> for HttpModelConfig {
    fn from(b: &ResolvedBackend) -> Self {
        Self {
            name: b.name.clone(),
            api_base: b.api_base.clone(),
            model: b.model.clone(),
            api_key: b.api_key.clone(),
            max_tokens: b.max_tokens,
            temperature: b.temperature,
            timeout_secs: b.timeout_secs,
        }
    }
}

/// OpenAI-compatible `/chat/completions` client.
pub struct HttpChatModel {
    cfg: HttpModelConfig,
    client: reqwest::blocking::Client,
}

impl HttpChatModel {
    pub fn connect(cfg: HttpModelConfig) -> anyhow::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(cfg.timeout_secs))
            .build()
            .context("build http client")?;
        Ok(Self { cfg, client })
    }

    pub fn name(&self) -> &str {
        &self.cfg.name
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

impl ChatModel for HttpChatModel {
    fn chat(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!("{}/chat/completions", self.cfg.api_base);
        let body = ChatRequest {
            model: &self.cfg.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.cfg.max_tokens,
            temperature: self.cfg.temperature,
        };

        let mut req = self.client.post(&url).json(&body);
        if let Some(key) = self.cfg.api_key.as_deref() {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .with_context(|| format!("chat request to {} ({url})", self.cfg.name))?;
        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().unwrap_or_default();
            let head: String = detail.chars().take(240).collect();
            return Err(anyhow!("chat backend {} returned {status}: {head}", self.cfg.name));
        }

        let parsed: ChatResponse = resp.json().context("parse chat response")?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("chat backend {} returned no choices", self.cfg.name))?;
        Ok(content)
    }
}
