//! Resolves a (scope, dashboard, tab) request to its grid and projects the grid
//! into header and row records.
use crate::config_cache::{ConfigCache, ConfigError};
use crate::grid_format::{Compression, GridCodec, GridFormatError};
use crate::metrics_defs::{GRID_FETCH_DURATION, GRID_MALFORMED};
use crate::name_index::LookupError;
use crate::object_store::{ObjectStore, StoreError};
use crate::paths::{ObjectPath, PathError, PathResolutionMode};
use crate::rle::{self, RleError};
use crate::types::{AlertInfo, Grid, Row, Timestamp};
use serde::Serialize;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(thiserror::Error, Debug)]
pub enum GridError {
    #[error("configuration unavailable: {0}")]
    ConfigUnavailable(#[source] ConfigError),

    #[error("dashboard {dashboard:?} or tab {tab:?} not found")]
    NotFound {
        dashboard: String,
        tab: String,
        #[source]
        source: LookupError,
    },

    #[error("invalid reference: {0}")]
    InvalidReference(#[from] PathError),

    #[error("grid unavailable at {path}: {source}")]
    GridUnavailable {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("grid not found at {0}")]
    NilGrid(String),

    #[error("malformed grid: row {row:?}: {source}")]
    MalformedGrid {
        row: String,
        #[source]
        source: MalformedRow,
    },

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,
}

impl GridError {
    /// Errors the caller can correct by asking for something that exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GridError::NotFound { .. } | GridError::NilGrid(_))
    }
}

impl From<ConfigError> for GridError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::InvalidScope(e) => GridError::InvalidReference(e),
            other => GridError::ConfigUnavailable(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Format(#[from] GridFormatError),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum MalformedRow {
    #[error("bad results encoding: {0}")]
    Encoding(#[from] RleError),

    #[error(
        "{results} results but {cell_ids} cell ids, {messages} messages and {icons} icons"
    )]
    LengthMismatch {
        results: usize,
        cell_ids: usize,
        messages: usize,
        icons: usize,
    },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GridRequest {
    pub scope: String,
    pub dashboard: String,
    pub tab: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    pub name: String,
    pub build: String,
    pub started: Timestamp,
    pub extra: Vec<String>,
    pub hotlist_ids: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ListHeadersResponse {
    pub headers: Vec<Header>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cell {
    pub result: i32,
    pub cell_id: String,
    pub message: String,
    pub icon: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowRecord {
    pub name: String,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<AlertInfo>,
    pub cells: Vec<Cell>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct ListRowsResponse {
    pub rows: Vec<RowRecord>,
}

#[derive(Clone, Debug)]
pub struct GridServiceOptions {
    pub path_mode: PathResolutionMode,
    pub request_timeout: Duration,
    pub compression: Compression,
}

#[derive(Clone)]
pub struct GridService {
    cache: ConfigCache,
    store: Arc<dyn ObjectStore>,
    codec: GridCodec,
    path_mode: PathResolutionMode,
    request_timeout: Duration,
}

impl GridService {
    pub fn new(cache: ConfigCache, store: Arc<dyn ObjectStore>, options: GridServiceOptions) -> Self {
        GridService {
            cache,
            store,
            codec: GridCodec::new(options.compression),
            path_mode: options.path_mode,
            request_timeout: options.request_timeout,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.cache.is_ready()
    }

    /// Preloads the default scope's configuration.
    pub async fn warm(&self) -> Result<(), ConfigError> {
        self.cache.warm().await
    }

    pub async fn list_headers(
        &self,
        request: &GridRequest,
        cancel: &CancellationToken,
    ) -> Result<ListHeadersResponse, GridError> {
        let grid = self.bounded(cancel, self.grid(request)).await?;
        Ok(ListHeadersResponse {
            headers: headers(&grid),
        })
    }

    pub async fn list_rows(
        &self,
        request: &GridRequest,
        cancel: &CancellationToken,
    ) -> Result<ListRowsResponse, GridError> {
        let grid = self.bounded(cancel, self.grid(request)).await?;
        let rows = rows(grid).inspect_err(|e| {
            counter!(GRID_MALFORMED).increment(1);
            tracing::error!(
                dashboard = %request.dashboard,
                tab = %request.tab,
                error = %e,
                "Rejecting malformed grid"
            );
        })?;
        Ok(ListRowsResponse { rows })
    }

    /// Applies the request deadline and caller cancellation to `fut`. Dropping
    /// `fut` early is safe: configuration refreshes run in their own task.
    async fn bounded<T, F>(&self, cancel: &CancellationToken, fut: F) -> Result<T, GridError>
    where
        F: Future<Output = Result<T, GridError>>,
    {
        tokio::select! {
            _ = cancel.cancelled() => Err(GridError::Cancelled),
            result = tokio::time::timeout(self.request_timeout, fut) => {
                result.unwrap_or(Err(GridError::Timeout(self.request_timeout)))
            }
        }
    }

    async fn grid(&self, request: &GridRequest) -> Result<Grid, GridError> {
        let snapshot = self.cache.get(&request.scope).await?;
        let identity =
            snapshot
                .lookup(&request.dashboard, &request.tab)
                .map_err(|source| GridError::NotFound {
                    dashboard: request.dashboard.clone(),
                    tab: request.tab.clone(),
                    source,
                })?;
        drop(snapshot);

        let base = self.cache.config_path(&request.scope)?;
        let path = self.path_mode.resolve(&base, &identity)?;
        tracing::debug!(
            dashboard = %identity.dashboard,
            tab = %identity.tab,
            test_group = %identity.test_group,
            path = %path,
            "Resolved grid"
        );

        self.fetch(&path).await
    }

    async fn fetch(&self, path: &ObjectPath) -> Result<Grid, GridError> {
        let started = Instant::now();
        let unavailable = |source: FetchError| GridError::GridUnavailable {
            path: path.to_string(),
            source,
        };

        let data = match self.store.get(path).await {
            Ok(data) => data,
            Err(StoreError::NotFound(_)) => return Err(GridError::NilGrid(path.to_string())),
            Err(e) => return Err(unavailable(e.into())),
        };
        if data.is_empty() {
            return Err(GridError::NilGrid(path.to_string()));
        }

        let grid = self
            .codec
            .read(&data[..])
            .map_err(|e| unavailable(e.into()))?;
        histogram!(GRID_FETCH_DURATION).record(started.elapsed().as_secs_f64());
        Ok(grid)
    }
}

pub fn headers(grid: &Grid) -> Vec<Header> {
    grid.columns
        .iter()
        .map(|column| Header {
            name: column.name.clone(),
            build: column.build.clone(),
            started: Timestamp::from_float_millis(column.started),
            extra: column.extra.clone(),
            hotlist_ids: column.hotlist_ids.clone(),
        })
        .collect()
}

/// Expands every row into cells. Fails on the first row whose decoded results
/// do not line up with its cell ids, messages and icons.
pub fn rows(grid: Grid) -> Result<Vec<RowRecord>, GridError> {
    grid.rows.into_iter().map(row_record).collect()
}

fn row_record(row: Row) -> Result<RowRecord, GridError> {
    let malformed = |source: MalformedRow| GridError::MalformedGrid {
        row: row.name.clone(),
        source,
    };

    // Checked before expanding so a bogus run length cannot force a huge allocation.
    let len = rle::decoded_len(&row.results).map_err(|e| malformed(e.into()))?;
    if row.cell_ids.len() != len || row.messages.len() != len || row.icons.len() != len {
        return Err(malformed(MalformedRow::LengthMismatch {
            results: len,
            cell_ids: row.cell_ids.len(),
            messages: row.messages.len(),
            icons: row.icons.len(),
        }));
    }
    let results = rle::decode(&row.results).map_err(|e| malformed(e.into()))?;

    let cells = results
        .into_iter()
        .zip(row.cell_ids)
        .zip(row.messages)
        .zip(row.icons)
        .map(|(((result, cell_id), message), icon)| Cell {
            result,
            cell_id,
            message,
            icon,
        })
        .collect();

    Ok(RowRecord {
        name: row.name,
        issues: row.issues,
        alert: row.alert_info,
        cells,
    })
}
