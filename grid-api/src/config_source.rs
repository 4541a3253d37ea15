use crate::object_store::{ObjectStore, StoreError};
use crate::paths::ObjectPath;
use crate::types::Configuration;
use async_trait::async_trait;
use std::sync::Arc;

#[derive(thiserror::Error, Debug)]
pub enum ConfigSourceError {
    #[error("could not read config: {0}")]
    Store(#[from] StoreError),

    #[error("could not parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Loads the dashboard configuration stored at a scope's config path.
#[async_trait]
pub trait ConfigSource: Send + Sync {
    async fn load(&self, config_path: &ObjectPath) -> Result<Configuration, ConfigSourceError>;
}

/// Reads the YAML configuration document through the object store.
pub struct StoreConfigSource {
    store: Arc<dyn ObjectStore>,
}

impl StoreConfigSource {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        StoreConfigSource { store }
    }
}

#[async_trait]
impl ConfigSource for StoreConfigSource {
    async fn load(&self, config_path: &ObjectPath) -> Result<Configuration, ConfigSourceError> {
        let data = self.store.get(config_path).await?;
        let config: Configuration = serde_yaml::from_slice(&data)?;
        tracing::debug!(
            config_path = %config_path,
            dashboards = config.dashboards.len(),
            "Loaded configuration"
        );
        Ok(config)
    }
}
