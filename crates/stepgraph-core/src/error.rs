use thiserror::Error;

#[derive(Debug, Error)]
pub enum StepgraphError {
    // Run failures
    #[error("Unknown node: {0}")]
    UnknownNode(String),

    #[error("Unknown tool '{tool}' in node '{node}'")]
    UnknownTool { node: String, tool: String },

    #[error("Error in node '{node}' with tool '{tool}': {message}")]
    ToolInvocation {
        node: String,
        tool: String,
        message: String,
    },

    #[error("Tool '{tool}' must return an object, got {actual}")]
    InvalidToolResult { tool: String, actual: String },

    #[error("Unsupported operator '{op}' between {left} and {right}")]
    UnsupportedOperator {
        op: String,
        left: String,
        right: String,
    },

    #[error("Max steps exceeded ({0})")]
    MaxStepsExceeded(usize),

    // Raised by tool implementations
    #[error("{0}")]
    Tool(String),

    // Graph errors
    #[error("Invalid graph: {0}")]
    InvalidGraph(String),

    #[error("Graph not found: {0}")]
    GraphNotFound(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    // Step sink errors
    #[error("Step delivery failed: {0}")]
    Delivery(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl StepgraphError {
    /// Convenience constructor for failures raised inside a tool.
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StepgraphError>;
