//! Command handlers for the Umrah Guide CLI.

pub mod ask;
pub mod build;
pub mod route;
pub mod stats;

pub use ask::AskCommand;
pub use build::BuildCommand;
pub use route::RouteCommand;
pub use stats::StatsCommand;

use std::sync::Arc;
use umrah_core::{config::AppConfig, AppResult};
use umrah_knowledge::{create_provider, EngineSettings, JsonFileSource, RagEngine};
use umrah_llm::create_client;
use umrah_prompt::PromptLibrary;

/// Wire providers, prompts and the source snapshot into an engine.
pub(crate) fn build_engine(config: &AppConfig) -> AppResult<RagEngine> {
    let embedder = create_provider(&config.embedding, config.embedding_api_key().as_deref())?;
    let llm = create_client(&config.generation, config.generation_api_key().as_deref())?;
    let prompts = PromptLibrary::load(&config.workspace)?;
    let source = JsonFileSource::new(config.data_file());

    tracing::debug!(
        index = %config.index_file().display(),
        data = %config.data_file().display(),
        "Engine configured"
    );

    Ok(RagEngine::new(
        EngineSettings::from_config(config),
        embedder,
        llm,
        Arc::new(prompts),
        Arc::new(source),
    ))
}
