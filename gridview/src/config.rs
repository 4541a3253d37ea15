use grid_api::config::Config as GridViewConfig;
use serde::Deserialize;
use std::fs::File;

fn default_metrics_prefix() -> String {
    "gridview".into()
}

#[derive(Deserialize, Debug)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
    #[serde(default = "default_metrics_prefix")]
    pub prefix: String,
}

#[derive(Deserialize, Debug)]
pub struct LoggingConfig {
    pub sentry_dsn: Option<String>,
    /// Default filter when RUST_LOG is unset.
    pub filter: Option<String>,
}

#[derive(Deserialize, Debug, Default)]
pub struct CommonConfig {
    pub metrics: Option<MetricsConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Deserialize, Debug)]
pub struct Config {
    #[serde(flatten)]
    pub common: CommonConfig,
    pub gridview: GridViewConfig,
}

impl Config {
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let config: Config = serde_yaml::from_reader(file)?;
        config.gridview.validate()?;

        Ok(config)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
    #[error("invalid config: {0}")]
    ValidationError(#[from] grid_api::config::ValidationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use grid_api::config::ObjectStoreType;
    use std::io::Write;

    fn write_tmp_file(s: &str) -> tempfile::NamedTempFile {
        let mut tmp = tempfile::NamedTempFile::new().expect("create temp file");
        write!(tmp, "{}", s).expect("write yaml");

        tmp
    }

    #[test]
    fn gridview_config() {
        let yaml = r#"
            gridview:
                listener:
                    host: 0.0.0.0
                    port: 8080
                default_scope: gs://testgrid-data
                tab_path_prefix: tabs
                object_store:
                    type: gcs
            metrics:
                statsd_host: 127.0.0.1
                statsd_port: 8125
            "#;
        let tmp = write_tmp_file(yaml);
        let config = Config::from_file(tmp.path()).expect("load config");
        assert_eq!(config.gridview.listener.host, "0.0.0.0");
        assert_eq!(
            config.gridview.default_scope.as_deref(),
            Some("gs://testgrid-data")
        );
        assert_eq!(config.gridview.object_store, ObjectStoreType::Gcs);
        let metrics = config.common.metrics.expect("metrics config");
        assert_eq!(metrics.statsd_port, 8125);
        assert_eq!(metrics.prefix, "gridview");
        assert!(config.common.logging.is_none());
    }

    #[test]
    fn invalid_config() {
        let tmp = write_tmp_file("gridview:\n  request_timeout_secs: 1\n");
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ParseError(_))
        ));

        let yaml = r#"
            gridview:
                admin_listener:
                    host: 127.0.0.1
                    port: 0
                object_store:
                    type: filesystem
                    base_dir: /tmp
            "#;
        let tmp = write_tmp_file(yaml);
        assert!(matches!(
            Config::from_file(tmp.path()),
            Err(ConfigError::ValidationError(_))
        ));

        assert!(matches!(
            Config::from_file(std::path::Path::new("/nonexistent/gridview.yaml")),
            Err(ConfigError::LoadError(_))
        ));
    }
}
