pub mod config;
pub mod error;
pub mod event;
pub mod traits;
pub mod types;
pub mod value;

pub use config::AppConfig;
pub use error::{Result, StepgraphError};
pub use event::EventBus;
pub use traits::{StepSink, Tool};
pub use types::*;
pub use value::StateMap;
