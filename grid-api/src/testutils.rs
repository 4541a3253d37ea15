use crate::config_source::{ConfigSource, ConfigSourceError};
use crate::object_store::{ObjectStore, StoreError};
use crate::paths::ObjectPath;
use crate::types::Configuration;
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Object store backed by a map of full object paths to contents.
#[derive(Default)]
pub struct MemoryStore {
    objects: Mutex<HashMap<String, Bytes>>,
    delay: Option<Duration>,
    gets: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(delay: Duration) -> Self {
        MemoryStore {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub fn insert(&self, path: &str, data: impl Into<Bytes>) {
        self.objects.lock().insert(path.to_string(), data.into());
    }

    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn get(&self, path: &ObjectPath) -> Result<Bytes, StoreError> {
        self.gets.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.objects
            .lock()
            .get(&path.to_string())
            .cloned()
            .ok_or_else(|| StoreError::NotFound(path.to_string()))
    }
}

/// Config source that counts loads and can be made slow or failing.
#[derive(Default)]
pub struct CountingConfigSource {
    configs: Mutex<HashMap<String, Configuration>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: AtomicUsize,
    fail: AtomicBool,
}

impl CountingConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, config_path: &str, config: Configuration) {
        self.configs.lock().insert(config_path.to_string(), config);
    }

    pub fn set_delay(&self, config_path: &str, delay: Duration) {
        self.delays.lock().insert(config_path.to_string(), delay);
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigSource for CountingConfigSource {
    async fn load(&self, config_path: &ObjectPath) -> Result<Configuration, ConfigSourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = config_path.to_string();

        let delay = self.delays.lock().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Io(io::Error::other("config source unavailable")).into());
        }

        self.configs
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key).into())
    }
}
