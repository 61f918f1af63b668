use std::sync::Arc;

use crate::core::config::{AppPaths, ConfigService};
use crate::llm::LlmService;
use crate::rag::{
    EmbeddingProvider, HttpEmbedder, IngestionService, RetrievalConfig, RetrievalService,
};

pub mod error;

use error::InitializationError;

/// Global application state shared across all routes.
///
/// Holds the configuration, the process-wide embedder, the LLM service and
/// the two retrieval-pipeline services.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub config: ConfigService,
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: LlmService,
    pub ingestion: IngestionService,
    pub retrieval: RetrievalService,
}

impl AppState {
    /// Initializes the application state.
    ///
    /// Configuration problems (missing embedding model, unknown LLM
    /// provider, missing API key) fail here, before the server starts
    /// serving requests.
    pub async fn initialize() -> Result<Arc<Self>, InitializationError> {
        let paths = Arc::new(AppPaths::new());
        let config = ConfigService::new(paths.clone());

        let settings = config
            .load_config()
            .map_err(|e| InitializationError::Config(e.into()))?;

        let embedder: Arc<dyn EmbeddingProvider> = HttpEmbedder::shared(&settings)
            .map_err(|e| InitializationError::Embedding(e.into()))?;

        let llm =
            LlmService::from_config(&settings).map_err(|e| InitializationError::Llm(e.into()))?;

        let retrieval_config = RetrievalConfig::from_config(&settings);
        let ingestion = IngestionService::new(
            paths.vector_dir.clone(),
            retrieval_config,
            embedder.clone(),
        );
        let retrieval = RetrievalService::new(paths.vector_dir.clone(), embedder.clone());

        Ok(Arc::new(AppState {
            paths,
            config,
            embedder,
            llm,
            ingestion,
            retrieval,
        }))
    }
}
