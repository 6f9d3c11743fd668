//! 内置工具集：deep_research / image_generation / document_generation

use std::sync::Arc;

use crate::client::{GenerationClient, JobClient};
use crate::research::PollOptions;

use super::deep_research::DeepResearchTool;
use super::document_generation::DocumentGenerationTool;
use super::image_generation::ImageGenerationTool;
use super::registry::{RegistryError, ToolRegistry};

/// 构建内置工具注册表（进程启动时调用一次）
pub fn default_registry(
    jobs: Arc<dyn JobClient>,
    generation: Arc<dyn GenerationClient>,
    poll: PollOptions,
) -> Result<ToolRegistry, RegistryError> {
    Ok(ToolRegistry::builder()
        .register(DeepResearchTool::new(jobs, poll).definition())?
        .register(ImageGenerationTool::new(Arc::clone(&generation)).definition())?
        .register(DocumentGenerationTool::new(generation).definition())?
        .build())
}
