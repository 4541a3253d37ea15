pub mod api;
pub mod config;
pub mod config_cache;
pub mod config_source;
pub mod grid_format;
pub mod grid_service;
pub mod metrics_defs;
pub mod name_index;
pub mod object_store;
pub mod paths;
pub mod rle;
pub mod types;

#[cfg(test)]
mod testutils;

use config::{Config, ValidationError};
use config_cache::{CacheOptions, ConfigCache};
use config_source::StoreConfigSource;
use grid_service::{GridService, GridServiceOptions};
use object_store::{StoreError, get_store};
use paths::PathResolutionMode;
use shared::admin_service::AdminService;
use shared::http::run_http_service;
use std::sync::Arc;
use std::time::Duration;

const WARM_BASE_DELAY: Duration = Duration::from_millis(500);
const WARM_MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(thiserror::Error, Debug)]
pub enum GridViewError {
    #[error("invalid config: {0}")]
    InvalidConfig(#[from] ValidationError),
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
    #[error("api error: {0}")]
    Api(#[from] api::GridApiError),
    #[error("admin listener error: {0}")]
    Admin(#[from] std::io::Error),
}

/// Builds the grid service described by `config`.
pub async fn build_service(config: &Config) -> Result<GridService, GridViewError> {
    config.validate()?;

    let store = get_store(config.object_store.clone()).await?;
    let source = Arc::new(StoreConfigSource::new(store.clone()));
    let cache = ConfigCache::new(
        source,
        CacheOptions {
            default_scope: config.default_scope.clone(),
            max_age: Duration::from_secs(config.config_max_age_secs),
            serve_stale: config.serve_stale_config,
        },
    );

    let path_mode =
        PathResolutionMode::from_prefixes(&config.grid_path_prefix, config.tab_path_prefix.as_deref());
    if let PathResolutionMode::TestGroup { group_prefix } = &path_mode {
        tracing::warn!(
            group_prefix = %group_prefix,
            "No tab_path_prefix configured, reading grids per test group"
        );
    }

    Ok(GridService::new(
        cache,
        store,
        GridServiceOptions {
            path_mode,
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            compression: config.grid_compression,
        },
    ))
}

/// Serves the grid API and the admin probes until either listener fails.
pub async fn run(config: Config) -> Result<(), GridViewError> {
    let service = build_service(&config).await?;

    // Load the default scope in the background; /ready reports when it is done.
    let warm_service = service.clone();
    tokio::spawn(async move {
        let mut delay = WARM_BASE_DELAY;
        while let Err(e) = warm_service.warm().await {
            tracing::error!(error = %e, retry_in = ?delay, "Failed to load default scope configuration");
            tokio::time::sleep(delay).await;
            delay = (delay * 2).min(WARM_MAX_DELAY);
        }
    });

    let ready_service = service.clone();
    let admin = AdminService::new(move || ready_service.is_ready());
    let admin_task = async {
        run_http_service(&config.admin_listener.host, config.admin_listener.port, admin).await?;
        Ok::<(), GridViewError>(())
    };
    let api_task = async {
        api::serve(config.listener.clone(), service).await?;
        Ok::<(), GridViewError>(())
    };

    tokio::try_join!(api_task, admin_task)?;
    Ok(())
}
