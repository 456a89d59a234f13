use std::sync::Arc;

use async_openai::{config::OpenAIConfig, Client};
use common::{
    storage::{db::SurrealDbClient, store::StorageManager},
    utils::{config::AppConfig, embedding::EmbeddingProvider},
};
use ingestion_pipeline::TabularIngestor;

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<SurrealDbClient>,
    pub config: AppConfig,
    pub storage: StorageManager,
    pub openai_client: Arc<Client<OpenAIConfig>>,
    pub embedding_provider: Arc<EmbeddingProvider>,
    pub ingestor: TabularIngestor,
}

impl ApiState {
    pub async fn new(
        config: &AppConfig,
        storage: StorageManager,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let surreal_db_client = Arc::new(
            SurrealDbClient::new(
                &config.surrealdb_address,
                &config.surrealdb_username,
                &config.surrealdb_password,
                &config.surrealdb_namespace,
                &config.surrealdb_database,
            )
            .await?,
        );

        surreal_db_client
            .ensure_document_index(config.embedding_dimensions)
            .await?;

        let openai_client = Arc::new(Client::with_config(
            OpenAIConfig::new()
                .with_api_key(config.openai_api_key.clone())
                .with_api_base(config.openai_base_url.clone()),
        ));

        let embedding_provider = Arc::new(EmbeddingProvider::from_config(
            config,
            Some(openai_client.clone()),
        )?);

        let ingestor =
            TabularIngestor::new(storage.clone(), embedding_provider.as_ref().clone());

        Ok(Self {
            db: surreal_db_client,
            config: config.clone(),
            storage,
            openai_client,
            embedding_provider,
            ingestor,
        })
    }
}
