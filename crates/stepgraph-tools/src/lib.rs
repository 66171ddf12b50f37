//! Tool registry, closure adapters, and the built-in summarization
//! workflow.

pub mod builtin;
pub mod func;
pub mod registry;
pub mod workflows;

pub use func::{AsyncFnTool, FnTool};
pub use registry::ToolRegistry;
