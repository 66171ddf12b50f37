use std::collections::HashMap;

use serde_json::json;
use stepgraph_core::types::{CompareOp, Condition, GraphSpec, NodeConfig};

/// Name of the graph registered at startup.
pub const SUMMARIZATION_GRAPH: &str = "summarization_and_refinement";

/// The default summarization pipeline.
///
/// `split_text -> summarize_chunks -> merge_summaries -> refine_summary`,
/// with `refine_summary` looping on itself until `refinement_done` is true.
pub fn summarization_graph() -> GraphSpec {
    let mut nodes = HashMap::new();
    nodes.insert(
        "split_text".to_string(),
        NodeConfig::new("split_text").with_next("summarize_chunks"),
    );
    nodes.insert(
        "summarize_chunks".to_string(),
        NodeConfig::new("summarize_chunks").with_next("merge_summaries"),
    );
    nodes.insert(
        "merge_summaries".to_string(),
        NodeConfig::new("merge_summaries").with_next("refine_summary"),
    );
    nodes.insert(
        "refine_summary".to_string(),
        NodeConfig::new("refine_summary").with_condition(
            Condition::new("refinement_done", CompareOp::Eq, json!(true)).on_false("refine_summary"),
        ),
    );

    GraphSpec {
        name: SUMMARIZATION_GRAPH.to_string(),
        nodes,
        start_node: "split_text".to_string(),
    }
}
