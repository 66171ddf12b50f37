pub mod summarize;

pub use summarize::{
    register_summarization_tools, MergeSummariesTool, RefineSummaryTool, SplitTextTool,
    SummarizeChunksTool,
};
