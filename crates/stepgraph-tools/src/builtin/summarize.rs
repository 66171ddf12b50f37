use futures::future::BoxFuture;
use serde_json::json;

use stepgraph_core::error::{Result, StepgraphError};
use stepgraph_core::traits::Tool;
use stepgraph_core::value::StateMap;

const DEFAULT_CHUNK_SIZE: u64 = 80;
const DEFAULT_SUMMARY_MAX_WORDS: u64 = 60;

fn str_field<'a>(state: &'a StateMap, key: &str) -> &'a str {
    state.get(key).and_then(|v| v.as_str()).unwrap_or("")
}

fn str_list(state: &StateMap, key: &str) -> Vec<String> {
    state
        .get(key)
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Read a positive integer setting, accepting numbers or numeric strings.
fn usize_field(state: &StateMap, key: &str, default: u64) -> Result<usize> {
    let n = match state.get(key) {
        None | Some(serde_json::Value::Null) => default,
        Some(serde_json::Value::Number(n)) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
            .ok_or_else(|| StepgraphError::tool(format!("{key} must be a non-negative number")))?,
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse()
            .map_err(|_| StepgraphError::tool(format!("{key} is not a number: {s:?}")))?,
        Some(other) => {
            return Err(StepgraphError::tool(format!(
                "{key} must be a number, got {other}"
            )))
        }
    };
    Ok(n as usize)
}

// ── SplitTextTool ───────────────────────────────────────────────

/// Splits `input_text` into chunks of `chunk_size` words.
pub struct SplitTextTool;

impl Tool for SplitTextTool {
    fn description(&self) -> &str {
        "Split input_text into chunks of chunk_size words (default 80)."
    }

    fn invoke<'a>(&'a self, state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        Box::pin(async move {
            let text = str_field(state, "input_text");
            if text.trim().is_empty() {
                return Ok(Some(json!({ "chunks": [] })));
            }
            let chunk_size = usize_field(state, "chunk_size", DEFAULT_CHUNK_SIZE)?;
            if chunk_size == 0 {
                return Err(StepgraphError::tool("chunk_size must be at least 1"));
            }
            let words: Vec<&str> = text.split_whitespace().collect();
            let chunks: Vec<String> = words.chunks(chunk_size).map(|c| c.join(" ")).collect();
            Ok(Some(json!({ "chunks": chunks })))
        })
    }
}

// ── SummarizeChunksTool ─────────────────────────────────────────

/// Keeps the first half of each chunk's words (at least one word).
pub struct SummarizeChunksTool;

impl Tool for SummarizeChunksTool {
    fn description(&self) -> &str {
        "Summarize each chunk by keeping the first half of its words."
    }

    fn invoke<'a>(&'a self, state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        Box::pin(async move {
            let summaries: Vec<String> = str_list(state, "chunks")
                .iter()
                .map(|chunk| {
                    let words: Vec<&str> = chunk.split_whitespace().collect();
                    if words.is_empty() {
                        return String::new();
                    }
                    let half = (words.len() / 2).max(1);
                    words[..half].join(" ")
                })
                .collect();
            Ok(Some(json!({ "summaries": summaries })))
        })
    }
}

// ── MergeSummariesTool ──────────────────────────────────────────

pub struct MergeSummariesTool;

impl Tool for MergeSummariesTool {
    fn description(&self) -> &str {
        "Join the non-empty chunk summaries into merged_summary."
    }

    fn invoke<'a>(&'a self, state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        Box::pin(async move {
            let merged = str_list(state, "summaries")
                .iter()
                .filter(|s| !s.trim().is_empty())
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(" ");
            Ok(Some(json!({ "merged_summary": merged })))
        })
    }
}

// ── RefineSummaryTool ───────────────────────────────────────────

/// Shortens the summary by a fifth per invocation until it fits within
/// `summary_max_words`, then reports `refinement_done`.
pub struct RefineSummaryTool;

impl Tool for RefineSummaryTool {
    fn description(&self) -> &str {
        "Shorten final_summary toward summary_max_words (default 60), one pass per call."
    }

    fn invoke<'a>(&'a self, state: &'a StateMap) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        Box::pin(async move {
            let max_words = usize_field(state, "summary_max_words", DEFAULT_SUMMARY_MAX_WORDS)?;
            let base = match str_field(state, "final_summary") {
                "" => str_field(state, "merged_summary"),
                s => s,
            };
            let words: Vec<&str> = base.split_whitespace().collect();
            let current_len = words.len();

            if current_len <= max_words {
                return Ok(Some(json!({
                    "final_summary": base,
                    "final_summary_word_count": current_len,
                    "refinement_done": true,
                })));
            }

            // Drop at least one word so short summaries still converge
            let target_len = max_words.max((current_len * 4).div_ceil(5).min(current_len - 1));
            let shortened = words[..target_len].join(" ");
            Ok(Some(json!({
                "final_summary": shortened,
                "final_summary_word_count": target_len,
                "refinement_done": target_len <= max_words,
            })))
        })
    }
}

/// Register the summarization tools under their graph names.
pub fn register_summarization_tools(registry: &mut crate::ToolRegistry) {
    registry.register("split_text", SplitTextTool);
    registry.register("summarize_chunks", SummarizeChunksTool);
    registry.register("merge_summaries", MergeSummariesTool);
    registry.register("refine_summary", RefineSummaryTool);
}
