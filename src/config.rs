use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use serde::Deserialize;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub pipeline: PipelineSection,
    #[serde(default)]
    pub llm: LlmSection,
    #[serde(default)]
    pub dictionary: DictionarySection,
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub prompts: PromptsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PipelineSection {
    /// LLM backend used for dictionary-miss definitions.
    #[serde(default)]
    pub define_backend: Option<String>,
    /// LLM backend used for sentence translation (defaults to define_backend).
    #[serde(default)]
    pub translate_backend: Option<String>,

    /// Max phrases/sentences per batched LLM request.
    #[serde(default)]
    pub batch_max_items: Option<usize>,

    #[serde(default)]
    pub trace_dir: Option<String>,
    #[serde(default)]
    pub trace_prompts: Option<bool>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LlmSection {
    #[serde(default)]
    pub backends: HashMap<String, LlmBackend>,
}

/// One OpenAI-compatible chat endpoint.
#[derive(Clone, Debug, Deserialize, Default)]
pub struct LlmBackend {
    pub api_base: String,
    pub model: String,
    /// Environment variable holding the API key. Local servers may not need one.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub ctx_size: Option<u32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct DictionarySection {
    /// CC-CEDICT file path; relative paths resolve against the config dir.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct CacheSection {
    /// Root directory of the persistent analysis/audio caches.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PromptsSection {
    #[serde(default)]
    pub define_batch: Option<String>,
    #[serde(default)]
    pub translate_batch: Option<String>,
}

/// A backend with its key resolved from the environment, ready to connect.
#[derive(Clone, Debug)]
pub struct ResolvedBackend {
    pub name: String,
    pub api_base: String,
    pub model: String,
    pub api_key: Option<String>,
    pub ctx_size: u32,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_secs: u64,
}

pub fn find_file_upwards(start: &Path, filename: &str, max_depth: usize) -> Option<PathBuf> {
    let mut dir = Some(start.to_path_buf());
    for _ in 0..=max_depth {
        let d = dir?;
        let cand = d.join(filename);
        if cand.is_file() {
            return Some(cand);
        }
        dir = d.parent().map(|p| p.to_path_buf());
    }
    None
}

pub fn find_default_config(workdir: &Path, filename: &str) -> Option<PathBuf> {
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, filename, 8) {
            return Some(p);
        }
    }
    if let Some(p) = find_file_upwards(workdir, filename, 8) {
        return Some(p);
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, filename, 10) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

pub fn resolve_backend(cfg: &AppConfig, name: &str) -> anyhow::Result<ResolvedBackend> {
    let b = cfg
        .llm
        .backends
        .get(name)
        .ok_or_else(|| anyhow!("llm backend not configured: {name}"))?;
    if b.api_base.trim().is_empty() || b.model.trim().is_empty() {
        return Err(anyhow!("llm backend {name}: api_base and model are required"));
    }

    let api_key = b
        .api_key_env
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|var| std::env::var(var).ok())
        .filter(|k| !k.trim().is_empty());

    Ok(ResolvedBackend {
        name: name.to_string(),
        api_base: b.api_base.trim_end_matches('/').to_string(),
        model: b.model.clone(),
        api_key,
        ctx_size: b.ctx_size.unwrap_or(8192),
        max_tokens: b.max_tokens.unwrap_or(2048),
        temperature: b.temperature.unwrap_or(0.2),
        timeout_secs: b.timeout_secs.unwrap_or(120),
    })
}
