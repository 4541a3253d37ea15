//! Per-scope cache of configuration snapshots.
//!
//! Each scope has a slot holding the current `Arc<ConfigSnapshot>` and, while a
//! refresh is running, the receiving end of the channel that refresh will
//! report on. The refresh itself runs in its own task and clears the marker
//! when it finishes, so callers that give up waiting never leave a slot stuck.
//! A slot whose first load fails is removed again, so scopes that never load
//! do not accumulate.
use crate::config_source::{ConfigSource, ConfigSourceError};
use crate::metrics_defs::{CONFIG_REFRESH_DURATION, CONFIG_REFRESH_FAILED, CONFIG_SERVED_STALE};
use crate::name_index::{ConfigSnapshot, SnapshotError};
use crate::paths::{ObjectPath, PathError, scope_config_path};
use parking_lot::{Mutex, RwLock};
use shared::{counter, histogram};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::watch;

#[derive(thiserror::Error, Debug, Clone)]
pub enum ConfigError {
    #[error("invalid scope: {0}")]
    InvalidScope(#[from] PathError),

    #[error("configuration unavailable at {path}: {source}")]
    Unavailable {
        path: String,
        #[source]
        source: Arc<ConfigSourceError>,
    },

    #[error("malformed configuration at {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: SnapshotError,
    },

    #[error("configuration refresh for {0} ended without a result")]
    Abandoned(String),
}

type RefreshOutcome = Result<Arc<ConfigSnapshot>, ConfigError>;

#[derive(Clone, Debug)]
pub struct CacheOptions {
    pub default_scope: Option<String>,
    /// Snapshots older than this are refreshed on the next request.
    pub max_age: Duration,
    /// Answer from a stale snapshot while its refresh runs in the background,
    /// instead of waiting for the refresh.
    pub serve_stale: bool,
}

impl Default for CacheOptions {
    fn default() -> Self {
        CacheOptions {
            default_scope: None,
            max_age: Duration::from_secs(300),
            serve_stale: true,
        }
    }
}

struct Cached {
    snapshot: Arc<ConfigSnapshot>,
    loaded_at: Instant,
}

#[derive(Default)]
struct RefreshState {
    in_flight: Option<watch::Receiver<Option<RefreshOutcome>>>,
    // Set once the slot has been removed from the map.
    retired: bool,
}

#[derive(Default)]
struct ScopeSlot {
    current: RwLock<Option<Cached>>,
    refresh: Mutex<RefreshState>,
}

impl ScopeSlot {
    fn current(&self, max_age: Duration) -> Option<(Arc<ConfigSnapshot>, bool)> {
        self.current
            .read()
            .as_ref()
            .map(|c| (c.snapshot.clone(), c.loaded_at.elapsed() < max_age))
    }
}

struct ConfigCacheInner {
    source: Arc<dyn ConfigSource>,
    options: CacheOptions,
    slots: RwLock<HashMap<ObjectPath, Arc<ScopeSlot>>>,
    // Used by the readiness probe. Set once the default scope has loaded.
    ready: AtomicBool,
}

#[derive(Clone)]
pub struct ConfigCache {
    inner: Arc<ConfigCacheInner>,
}

impl ConfigCache {
    pub fn new(source: Arc<dyn ConfigSource>, options: CacheOptions) -> Self {
        ConfigCache {
            inner: Arc::new(ConfigCacheInner {
                source,
                options,
                slots: RwLock::new(HashMap::new()),
                ready: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the snapshot for `scope`, loading it if needed. An empty scope
    /// selects the default scope.
    pub async fn get(&self, scope: &str) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        let config_path = self.config_path(scope)?;

        let mut rx = loop {
            let slot = self.slot(&config_path);

            match slot.current(self.inner.options.max_age) {
                Some((snapshot, true)) => return Ok(snapshot),
                Some((snapshot, false)) if self.inner.options.serve_stale => {
                    self.start_refresh(&config_path, &slot);
                    counter!(CONFIG_SERVED_STALE).increment(1);
                    tracing::debug!(config_path = %config_path, "Serving stale configuration");
                    return Ok(snapshot);
                }
                _ => {}
            }

            // A retired slot was just removed by a failed load; look it up again.
            if let Some(rx) = self.start_refresh(&config_path, &slot) {
                break rx;
            }
        };
        let outcome = rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| ConfigError::Abandoned(config_path.to_string()))?;

        outcome
            .as_ref()
            .cloned()
            .unwrap_or_else(|| Err(ConfigError::Abandoned(config_path.to_string())))
    }

    /// The configuration object for `scope`. Grids are addressed relative to it.
    pub fn config_path(&self, scope: &str) -> Result<ObjectPath, PathError> {
        scope_config_path(scope, self.inner.options.default_scope.as_deref())
    }

    /// Loads the default scope, if any, and marks the cache ready.
    pub async fn warm(&self) -> Result<(), ConfigError> {
        if let Some(scope) = self.inner.options.default_scope.clone() {
            let snapshot = self.get(&scope).await?;
            tracing::info!(
                scope = %scope,
                dashboards = snapshot.dashboard_count(),
                "Default scope configuration loaded"
            );
        }
        self.inner.ready.store(true, Ordering::Relaxed);
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Relaxed)
    }

    fn slot(&self, config_path: &ObjectPath) -> Arc<ScopeSlot> {
        if let Some(slot) = self.inner.slots.read().get(config_path) {
            return slot.clone();
        }
        self.inner
            .slots
            .write()
            .entry(config_path.clone())
            .or_default()
            .clone()
    }

    /// Joins the refresh in flight for this slot, or spawns one. Returns
    /// `None` if the slot has been retired.
    fn start_refresh(
        &self,
        config_path: &ObjectPath,
        slot: &Arc<ScopeSlot>,
    ) -> Option<watch::Receiver<Option<RefreshOutcome>>> {
        let mut state = slot.refresh.lock();
        if state.retired {
            return None;
        }

        // A closed channel means the refresh task died without reporting.
        if let Some(rx) = state.in_flight.as_ref()
            && rx.has_changed().is_ok()
        {
            return Some(rx.clone());
        }

        // A refresh may have completed since the caller looked at the slot.
        if let Some((snapshot, true)) = slot.current(self.inner.options.max_age) {
            let (_, rx) = watch::channel(Some(Ok(snapshot)));
            return Some(rx);
        }

        let (tx, rx) = watch::channel(None);
        state.in_flight = Some(rx.clone());
        drop(state);

        let inner = self.inner.clone();
        let slot = slot.clone();
        let config_path = config_path.clone();
        tokio::spawn(async move {
            let outcome = refresh(inner.source.as_ref(), &config_path).await;
            match &outcome {
                Ok(snapshot) => {
                    *slot.current.write() = Some(Cached {
                        snapshot: snapshot.clone(),
                        loaded_at: Instant::now(),
                    });
                    slot.refresh.lock().in_flight = None;
                }
                Err(_) => inner.finish_failed(&config_path, &slot),
            }
            // Nobody may be waiting any more, which is fine.
            let _ = tx.send(Some(outcome));
        });

        Some(rx)
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.inner.slots.read().len()
    }
}

impl ConfigCacheInner {
    /// Clears the refresh marker and drops the slot if it never loaded.
    /// Lock order: `slots`, then the slot's refresh state.
    fn finish_failed(&self, config_path: &ObjectPath, slot: &Arc<ScopeSlot>) {
        let mut slots = self.slots.write();
        let mut state = slot.refresh.lock();
        state.in_flight = None;

        if slot.current.read().is_none() {
            state.retired = true;
            if slots.get(config_path).is_some_and(|s| Arc::ptr_eq(s, slot)) {
                slots.remove(config_path);
            }
        }
    }
}

/// Loads and indexes a configuration. Runs without holding any slot lock.
async fn refresh(source: &dyn ConfigSource, config_path: &ObjectPath) -> RefreshOutcome {
    let started = Instant::now();
    let path = config_path.to_string();

    let result = match source.load(config_path).await {
        Ok(config) => ConfigSnapshot::build(config)
            .map(Arc::new)
            .map_err(|source| ConfigError::Malformed {
                path: path.clone(),
                source,
            }),
        Err(source) => Err(ConfigError::Unavailable {
            path: path.clone(),
            source: Arc::new(source),
        }),
    };

    histogram!(CONFIG_REFRESH_DURATION).record(started.elapsed().as_secs_f64());
    match &result {
        Ok(snapshot) => tracing::info!(
            config_path = %path,
            dashboards = snapshot.dashboard_count(),
            "Configuration refreshed"
        ),
        Err(e) => {
            counter!(CONFIG_REFRESH_FAILED).increment(1);
            tracing::warn!(config_path = %path, error = %e, "Configuration refresh failed");
        }
    }
    result
}
