use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::{AppConfig, PromptsSection};

pub const DEFAULT_PROMPTS_DIR: &str = "prompts";

pub const DEFAULT_DEFINE_BATCH: &str = "define_batch.txt";
pub const DEFAULT_TRANSLATE_BATCH: &str = "translate_batch.txt";

#[derive(Clone, Debug)]
pub struct PromptSet {
    pub define_batch: String,
    pub translate_batch: String,
}

impl PromptSet {
    /// Loads prompt templates, preferring files next to the config and
    /// falling back to the built-in defaults.
    pub fn load(config_path: &Path, cfg: &AppConfig) -> anyhow::Result<Self> {
        let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
        let p = cfg.prompts.clone();
        Ok(Self {
            define_batch: read_prompt(
                config_dir,
                &p,
                "define_batch",
                DEFAULT_DEFINE_BATCH,
                DEFAULT_DEFINE_BATCH_TEXT,
            )?,
            translate_batch: read_prompt(
                config_dir,
                &p,
                "translate_batch",
                DEFAULT_TRANSLATE_BATCH,
                DEFAULT_TRANSLATE_BATCH_TEXT,
            )?,
        })
    }

    pub fn builtin() -> Self {
        Self {
            define_batch: DEFAULT_DEFINE_BATCH_TEXT.to_string(),
            translate_batch: DEFAULT_TRANSLATE_BATCH_TEXT.to_string(),
        }
    }
}

fn read_prompt(
    config_dir: &Path,
    p: &PromptsSection,
    key: &str,
    default_filename: &str,
    default_text: &str,
) -> anyhow::Result<String> {
    let rel = format!("{DEFAULT_PROMPTS_DIR}/{default_filename}");
    let (path, explicit) = match key {
        "define_batch" => (p.define_batch.clone(), p.define_batch.is_some()),
        "translate_batch" => (p.translate_batch.clone(), p.translate_batch.is_some()),
        _ => (None, false),
    };
    let path = path.unwrap_or(rel);

    let mut file = PathBuf::from(path);
    if file.is_relative() {
        file = config_dir.join(&file);
    }
    if !file.exists() {
        if explicit {
            return Err(anyhow::anyhow!(
                "prompt file not found for {key}: {} (run: hanscan --init-config)",
                file.display()
            ));
        }
        return Ok(default_text.to_string());
    }
    let text = std::fs::read_to_string(&file)
        .with_context(|| format!("read prompt: {}", file.display()))?;
    Ok(text)
}

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

pub fn default_prompt_files() -> Vec<(&'static str, &'static str)> {
    vec![
        (DEFAULT_DEFINE_BATCH, DEFAULT_DEFINE_BATCH_TEXT),
        (DEFAULT_TRANSLATE_BATCH, DEFAULT_TRANSLATE_BATCH_TEXT),
    ]
}

pub const DEFAULT_DEFINE_BATCH_TEXT: &str = r#"You are a Chinese-English dictionary.
For each numbered Chinese phrase below, output EXACTLY one line:
N. [pinyin with tone marks] short English definition

Rules:
- Keep the input numbering; one line per phrase.
- The pinyin goes in square brackets; leave the brackets empty if unsure.
- Keep definitions short (a gloss, not an essay).
- Do NOT add any other text.

PHRASES:
{{numbered_block}}"#;

pub const DEFAULT_TRANSLATE_BATCH_TEXT: &str = r#"Translate each numbered Chinese sentence into natural English.
Output EXACTLY one line per sentence:
N. English translation

Rules:
- Keep the input numbering; one line per sentence.
- Translate everything; do not summarize.
- Do NOT add any other text.

SENTENCES:
{{numbered_block}}"#;
