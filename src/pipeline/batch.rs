use std::collections::HashMap;

use crate::models::ChatModel;
use crate::progress::ConsoleProgress;

use super::prompts::render_template;
use super::protocol::{cleanup_model_text, parse_numbered_reply, render_numbered_block};
use super::trace::TraceWriter;

/// Caps one batched request: item count and total payload characters
/// (derived from the backend's context size).
#[derive(Clone, Copy, Debug)]
pub struct BatchSettings {
    pub max_items: usize,
    pub max_chars: usize,
}

impl BatchSettings {
    pub fn from_ctx_size(ctx_size: u32, max_items: usize) -> Self {
        let max_chars = (ctx_size as usize).saturating_mul(2).saturating_sub(1200).max(2000);
        Self {
            max_items: max_items.max(1),
            max_chars,
        }
    }
}

/// Sends `items` through the numbered-batch protocol and returns
/// 0-based item index -> reply payload. Missing indices are the caller's
/// per-item degradation; transport errors degrade the whole affected batch
/// without raising. A reply that parses to nothing splits the batch in half
/// and retries once per half before giving up.
pub fn resolve_numbered_batches(
    model: &dyn ChatModel,
    prompt_tmpl: &str,
    items: &[String],
    settings: BatchSettings,
    stage: &str,
    trace: &TraceWriter,
    progress: &ConsoleProgress,
) -> HashMap<usize, String> {
    let mut resolved: HashMap<usize, String> = HashMap::new();
    if items.is_empty() {
        return resolved;
    }

    let mut chunk: Vec<usize> = Vec::new();
    let mut used = 0usize;
    let mut sent = 0usize;
    for (idx, item) in items.iter().enumerate() {
        let add = item.chars().count() + 8;
        if !chunk.is_empty() && (used + add > settings.max_chars || chunk.len() >= settings.max_items)
        {
            resolve_chunk(
                model, prompt_tmpl, items, &chunk, stage, trace, progress, 0, &mut resolved,
            );
            sent += chunk.len();
            progress.progress(stage, sent, items.len());
            chunk.clear();
            used = 0;
        }
        used += add;
        chunk.push(idx);
    }
    if !chunk.is_empty() {
        resolve_chunk(
            model, prompt_tmpl, items, &chunk, stage, trace, progress, 0, &mut resolved,
        );
        sent += chunk.len();
        progress.progress(stage, sent, items.len());
    }
    resolved
}

#[allow(clippy::too_many_arguments)]
fn resolve_chunk(
    model: &dyn ChatModel,
    prompt_tmpl: &str,
    items: &[String],
    indices: &[usize],
    stage: &str,
    trace: &TraceWriter,
    progress: &ConsoleProgress,
    depth: usize,
    resolved: &mut HashMap<usize, String>,
) {
    if indices.is_empty() {
        return;
    }
    let first = indices[0];
    let last = *indices.last().unwrap_or(&first);

    let batch: Vec<String> = indices.iter().map(|&i| items[i].clone()).collect();
    let block = render_numbered_block(&batch);
    let prompt = render_template(prompt_tmpl, &[("numbered_block", &block)]);
    let _ = trace.write_named_text(&format!("{stage}.{first:04}-{last:04}.prompt.txt"), &prompt);

    let raw = match model.chat(&prompt) {
        Ok(r) => r,
        Err(e) => {
            progress.warn(format!("{stage} batch {first}-{last} failed: {e}"));
            return;
        }
    };
    let cleaned = cleanup_model_text(&raw);
    let _ = trace.write_named_text(
        &format!("{stage}.{first:04}-{last:04}.reply.txt"),
        &cleaned,
    );

    let parsed = parse_numbered_reply(&cleaned, indices.len());
    if parsed.is_empty() && indices.len() > 1 && depth < 2 {
        let mid = indices.len() / 2;
        resolve_chunk(
            model, prompt_tmpl, items, &indices[..mid], stage, trace, progress,
            depth + 1, resolved,
        );
        resolve_chunk(
            model, prompt_tmpl, items, &indices[mid..], stage, trace, progress,
            depth + 1, resolved,
        );
        return;
    }

    for (n, payload) in parsed {
        // n is 1-based within this chunk.
        if let Some(&idx) = indices.get(n - 1) {
            resolved.entry(idx).or_insert(payload);
        }
    }
}
