use crate::grid_format::Compression;
use serde::Deserialize;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("request_timeout_secs must be greater than 0")]
    InvalidTimeout,

    #[error("default_scope {0:?} is not a valid location: {1}")]
    InvalidDefaultScope(String, String),
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "lowercase")]
#[serde(tag = "type")]
pub enum ObjectStoreType {
    Filesystem { base_dir: String },
    Gcs,
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Listener {
    pub host: String,
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

impl Default for Listener {
    fn default() -> Self {
        Listener {
            host: "127.0.0.1".into(),
            port: 8080,
        }
    }
}

fn default_admin_listener() -> Listener {
    Listener {
        host: "127.0.0.1".into(),
        port: 8081,
    }
}

fn default_grid_path_prefix() -> String {
    "grid".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_config_max_age_secs() -> u64 {
    300
}

fn default_serve_stale_config() -> bool {
    true
}

#[derive(Clone, Deserialize, Debug, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listener: Listener,
    #[serde(default = "default_admin_listener")]
    pub admin_listener: Listener,
    /// Scope used when a request does not name one, e.g. `gs://my-bucket`.
    pub default_scope: Option<String>,
    #[serde(default = "default_grid_path_prefix")]
    pub grid_path_prefix: String,
    /// Serve per-tab grids from this prefix. Without it grids are read per
    /// test group from `grid_path_prefix`.
    pub tab_path_prefix: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_config_max_age_secs")]
    pub config_max_age_secs: u64,
    #[serde(default = "default_serve_stale_config")]
    pub serve_stale_config: bool,
    #[serde(default)]
    pub grid_compression: Compression,
    pub object_store: ObjectStoreType,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;
        self.admin_listener.validate()?;

        if self.request_timeout_secs == 0 {
            return Err(ValidationError::InvalidTimeout);
        }

        if let Some(scope) = &self.default_scope {
            crate::paths::scope_config_path("", Some(scope)).map_err(|e| {
                ValidationError::InvalidDefaultScope(scope.clone(), e.to_string())
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let yaml = r#"
listener:
    host: 0.0.0.0
    port: 3000
default_scope: gs://my-bucket
tab_path_prefix: tabs
grid_compression:
    type: zstd
    level: 3
object_store:
    type: filesystem
    base_dir: /var/lib/gridview
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.listener.port, 3000);
        assert_eq!(config.admin_listener, default_admin_listener());
        assert_eq!(config.grid_path_prefix, "grid");
        assert_eq!(config.tab_path_prefix.as_deref(), Some("tabs"));
        assert_eq!(config.request_timeout_secs, 10);
        assert!(config.serve_stale_config);
        assert_eq!(config.grid_compression, Compression::Zstd { level: 3 });
        assert_eq!(
            config.object_store,
            ObjectStoreType::Filesystem {
                base_dir: "/var/lib/gridview".into()
            }
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate() {
        let yaml = r#"
request_timeout_secs: 0
object_store:
    type: gcs
"#;
        let mut config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.grid_compression, Compression::Zlib);
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));

        config.request_timeout_secs = 5;
        config.listener.port = 0;
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));

        config.listener.port = 8080;
        config.default_scope = Some("s3://bucket".into());
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidDefaultScope(..))
        ));
    }
}
