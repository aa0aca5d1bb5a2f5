use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};

use crate::config::{
    find_default_config, load_config, resolve_backend, AppConfig, ResolvedBackend,
};
use crate::pipeline::prompts::{default_prompt_files, PromptSet, DEFAULT_PROMPTS_DIR};

pub const CONFIG_FILENAME: &str = "hanscan.toml";
pub const CONFIG_ENV: &str = "HANSCAN_CONFIG";

#[derive(Clone, Debug)]
pub struct PipelineConfig {
    pub workdir: PathBuf,
    pub config_path: PathBuf,

    pub define_backend: ResolvedBackend,
    pub translate_backend: ResolvedBackend,

    pub dict_path: PathBuf,
    pub cache_dir: PathBuf,

    pub batch_max_items: usize,
    pub trace_dir: PathBuf,
    pub trace_prompts: bool,

    pub prompts: PromptSet,
}

impl PipelineConfig {
    pub fn from_args(
        workdir: &Path,
        config_path: Option<PathBuf>,
        define_backend: Option<String>,
        translate_backend: Option<String>,
    ) -> anyhow::Result<Self> {
        let workdir = workdir.canonicalize().unwrap_or_else(|_| workdir.to_path_buf());

        let cfg_file = config_path
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from))
            .or_else(|| find_default_config(&workdir, CONFIG_FILENAME));

        let mut file_cfg = AppConfig::default();
        if let Some(p) = cfg_file.as_ref() {
            if p.exists() {
                file_cfg = load_config(p)?;
            }
        }
        let cfg_path = cfg_file.unwrap_or_else(|| workdir.join(CONFIG_FILENAME));
        let cfg_dir = cfg_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let define_name = define_backend
            .or_else(|| file_cfg.pipeline.define_backend.clone())
            .ok_or_else(|| {
                anyhow!("no define backend configured (run: hanscan --init-config)")
            })?;
        let translate_name = translate_backend
            .or_else(|| file_cfg.pipeline.translate_backend.clone())
            .unwrap_or_else(|| define_name.clone());

        let define_backend = resolve_backend(&file_cfg, &define_name)?;
        let translate_backend = resolve_backend(&file_cfg, &translate_name)?;

        let dict_path = file_cfg
            .dictionary
            .path
            .clone()
            .ok_or_else(|| anyhow!("[dictionary] path not set in {}", cfg_path.display()))?;
        let dict_path = resolve_relative(&cfg_dir, dict_path);

        let cache_dir = resolve_relative(
            &cfg_dir,
            file_cfg.cache.dir.clone().unwrap_or_else(|| PathBuf::from("cache")),
        );

        let trace_dir = resolve_relative(
            &cfg_dir,
            PathBuf::from(
                file_cfg
                    .pipeline
                    .trace_dir
                    .clone()
                    .unwrap_or_else(|| "_trace".to_string()),
            ),
        );
        let trace_prompts = file_cfg.pipeline.trace_prompts.unwrap_or(false);
        let batch_max_items = file_cfg.pipeline.batch_max_items.unwrap_or(32).max(1);

        let prompts = PromptSet::load(&cfg_path, &file_cfg).context("load prompts")?;

        Ok(Self {
            workdir,
            config_path: cfg_path,
            define_backend,
            translate_backend,
            dict_path,
            cache_dir,
            batch_max_items,
            trace_dir,
            trace_prompts,
            prompts,
        })
    }
}

fn resolve_relative(base: &Path, p: PathBuf) -> PathBuf {
    if p.is_relative() {
        base.join(p)
    } else {
        p
    }
}

/// Writes a default config plus the default prompt files, then returns the
/// config path. Existing files are kept unless `force` is set.
pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);

    let prompts_dir = dir.join(DEFAULT_PROMPTS_DIR);
    std::fs::create_dir_all(&prompts_dir)
        .with_context(|| format!("create prompts dir: {}", prompts_dir.display()))?;

    for (fname, body) in default_prompt_files() {
        let p = prompts_dir.join(fname);
        if p.exists() && !force {
            continue;
        }
        std::fs::write(&p, body).with_context(|| format!("write prompt: {}", p.display()))?;
    }

    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }

    let cfg_text = r#"[pipeline]
define_backend = "gpt_mini"
# translate_backend defaults to define_backend; set it to use a second model
# for sentence translation.
# translate_backend = "gpt_mini"

batch_max_items = 32

trace_dir = "_trace"
trace_prompts = false

[dictionary]
# CC-CEDICT file, e.g. https://www.mdbg.net/chinese/dictionary?page=cedict
path = "cedict_ts.u8"

[cache]
dir = "cache"

[prompts]
define_batch = "prompts/define_batch.txt"
translate_batch = "prompts/translate_batch.txt"

[llm.backends.gpt_mini]
api_base = "https://api.openai.com/v1"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
ctx_size = 16384
max_tokens = 2048
temperature = 0.2
timeout_secs = 120

[llm.backends.local]
api_base = "http://127.0.0.1:8080/v1"
model = "qwen2.5-7b-instruct"
ctx_size = 8192
"#;

    std::fs::write(&cfg_path, cfg_text)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}
