mod analyzer;
mod batch;
mod config;
mod definitions;
mod prompts;
mod protocol;
mod sentences;
mod trace;

pub use analyzer::Analyzer;
pub use batch::BatchSettings;
pub use config::{init_default_config, PipelineConfig, CONFIG_ENV, CONFIG_FILENAME};
pub use definitions::DefinitionResolver;
pub use prompts::{render_template, PromptSet};
pub use protocol::{cleanup_model_text, parse_numbered_reply, render_numbered_block};
pub use sentences::SentenceTranslator;
pub use trace::TraceWriter;

use std::sync::Arc;

use anyhow::Context;

use crate::cache::JsonDirStore;
use crate::dict::Dictionary;
use crate::models::{ChatModel, HttpChatModel};
use crate::progress::ConsoleProgress;
use crate::segment::DictSegmenter;

/// Wires a ready-to-use analyzer from a resolved config: dictionary,
/// file-backed cache store, segmenter, and HTTP chat backends.
pub fn build_analyzer(
    cfg: &PipelineConfig,
    progress: Arc<ConsoleProgress>,
) -> anyhow::Result<Analyzer> {
    let dict = Arc::new(Dictionary::load(&cfg.dict_path)?);
    progress.info(format!(
        "dictionary: {} entries from {}",
        dict.len(),
        cfg.dict_path.display()
    ));
    let store = Arc::new(JsonDirStore::open(&cfg.cache_dir)?);
    let trace = Arc::new(TraceWriter::new(cfg.trace_dir.clone(), cfg.trace_prompts)?);

    let define_model: Arc<dyn ChatModel> =
        Arc::new(HttpChatModel::connect((&cfg.define_backend).into()).context("define backend")?);
    let translate_model: Arc<dyn ChatModel> = if cfg.translate_backend.name == cfg.define_backend.name
    {
        define_model.clone()
    } else {
        Arc::new(
            HttpChatModel::connect((&cfg.translate_backend).into()).context("translate backend")?,
        )
    };

    let resolver = DefinitionResolver::new(
        dict.clone(),
        define_model,
        cfg.prompts.define_batch.clone(),
        BatchSettings::from_ctx_size(cfg.define_backend.ctx_size, cfg.batch_max_items),
        trace.clone(),
        progress.clone(),
    );
    let translator = SentenceTranslator::new(
        translate_model,
        cfg.prompts.translate_batch.clone(),
        BatchSettings::from_ctx_size(cfg.translate_backend.ctx_size, cfg.batch_max_items),
        trace,
        progress.clone(),
    );
    let segmenter = Arc::new(DictSegmenter::new(dict));

    Ok(Analyzer::new(store, segmenter, resolver, translator, progress))
}
