pub mod builtin;
pub mod context;
pub mod deep_research;
pub mod document_generation;
pub mod executor;
pub mod image_generation;
pub mod matcher;
pub mod registry;
pub mod result;
pub mod router;
pub mod schema;

pub use builtin::default_registry;
pub use context::{ExecutionContext, ProgressReporter, ToolProgress};
pub use deep_research::DeepResearchTool;
pub use document_generation::DocumentGenerationTool;
pub use executor::ToolInvoker;
pub use image_generation::ImageGenerationTool;
pub use matcher::{is_phrase_match, MatchResult};
pub use registry::{
    handler_fn, RegistryError, ToolCall, ToolDefinition, ToolHandler, ToolRegistry,
    ToolRegistryBuilder,
};
pub use result::{is_file_response, is_image_response, is_text_response, ResponseType, ToolResult};
pub use router::{IntentRouter, ToolMatch};
pub use schema::{parameters_schema, validate_params};
