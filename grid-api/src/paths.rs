//! Object store addressing. Grids live next to the scope's configuration
//! object, e.g. `gs://bucket/config` resolves `grid/foo` to `gs://bucket/grid/foo`.
use crate::types::Identity;
use percent_encoding::{AsciiSet, CONTROLS, percent_decode_str, utf8_percent_encode};
use std::fmt;
use url::Url;

const CONFIG_OBJECT: &str = "config";

// Characters that would otherwise be read as URL syntax inside a path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}');

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum PathError {
    #[error("invalid location {location:?}: {reason}")]
    InvalidLocation { location: String, reason: String },

    #[error("unsupported scheme {0:?}, expected gs:// or file://")]
    UnsupportedScheme(String),

    #[error("gs:// location {0:?} has no bucket")]
    MissingBucket(String),

    #[error("empty reference")]
    EmptyReference,

    #[error("reference {reference:?} leaves bucket {bucket:?}")]
    BucketChanged { reference: String, bucket: String },

    #[error("no scope given and no default scope configured")]
    NoScope,

    #[error("location {0:?} has a relative path segment")]
    DotSegment(String),

    #[error("local scope {0:?} can only be configured as the default scope")]
    LocalScope(String),
}

/// A fully-qualified `gs://bucket/object` or `file:///path` address.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ObjectPath {
    url: Url,
}

impl ObjectPath {
    pub fn parse(location: &str) -> Result<Self, PathError> {
        let url = Url::parse(location).map_err(|e| PathError::InvalidLocation {
            location: location.to_string(),
            reason: e.to_string(),
        })?;
        Self::from_url(url)
    }

    fn from_url(url: Url) -> Result<Self, PathError> {
        match url.scheme() {
            "gs" => {
                if url.host_str().is_none_or(str::is_empty) {
                    return Err(PathError::MissingBucket(url.to_string()));
                }
            }
            "file" => {}
            other => return Err(PathError::UnsupportedScheme(other.to_string())),
        }

        // The parser folds literal dot segments; encoded slashes can still
        // smuggle them into the decoded object name.
        let path = ObjectPath { url };
        if path.object().split('/').any(|s| s == "." || s == "..") {
            return Err(PathError::DotSegment(path.url.to_string()));
        }
        Ok(path)
    }

    /// Bucket name; empty for local paths.
    pub fn bucket(&self) -> &str {
        self.url.host_str().unwrap_or_default()
    }

    /// Object name within the bucket, or the absolute path for local files.
    pub fn object(&self) -> String {
        let decoded = percent_decode_str(self.url.path()).decode_utf8_lossy();
        if self.is_local() {
            decoded.into_owned()
        } else {
            decoded.trim_start_matches('/').to_string()
        }
    }

    pub fn is_local(&self) -> bool {
        self.url.scheme() == "file"
    }

    /// Resolves the `/`-joined `parts` against this location. Relative parts
    /// replace the last segment, a leading `/` starts at the bucket root.
    pub fn resolve_reference(&self, parts: &[&str]) -> Result<ObjectPath, PathError> {
        let absolute = parts.first().is_some_and(|p| p.starts_with('/'));
        let segments: Vec<String> = parts
            .iter()
            .flat_map(|p| p.split('/'))
            .filter(|s| !s.is_empty() && *s != ".")
            .map(|s| utf8_percent_encode(s, SEGMENT).to_string())
            .collect();

        if segments.is_empty() {
            return Err(PathError::EmptyReference);
        }

        let reference = if absolute {
            format!("/{}", segments.join("/"))
        } else {
            format!("./{}", segments.join("/"))
        };

        let url = self
            .url
            .join(&reference)
            .map_err(|e| PathError::InvalidLocation {
                location: reference.clone(),
                reason: e.to_string(),
            })?;
        let resolved = Self::from_url(url)?;

        if resolved.bucket() != self.bucket() {
            return Err(PathError::BucketChanged {
                reference,
                bucket: self.bucket().to_string(),
            });
        }
        Ok(resolved)
    }
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}

/// The configuration object for `scope`, falling back to `default_scope` when
/// the request does not name one. Only the default scope may be a local
/// `file://` location.
pub fn scope_config_path(scope: &str, default_scope: Option<&str>) -> Result<ObjectPath, PathError> {
    let (scope, requested) = match scope.trim() {
        "" => (
            default_scope
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .ok_or(PathError::NoScope)?,
            false,
        ),
        s => (s, true),
    };

    let path = ObjectPath::parse(&format!("{}/{CONFIG_OBJECT}", scope.trim_end_matches('/')))?;
    if requested && path.is_local() {
        return Err(PathError::LocalScope(scope.to_string()));
    }
    Ok(path)
}

pub fn resolve_test_group_path(
    base: &ObjectPath,
    group_prefix: &str,
    test_group: &str,
) -> Result<ObjectPath, PathError> {
    base.resolve_reference(&[group_prefix, test_group])
}

pub fn resolve_tab_path(
    base: &ObjectPath,
    tab_prefix: &str,
    dashboard: &str,
    tab: &str,
) -> Result<ObjectPath, PathError> {
    base.resolve_reference(&[tab_prefix, dashboard, tab])
}

/// How grids are addressed. Chosen once when the service is built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PathResolutionMode {
    /// Legacy layout: one grid per test group under the group prefix.
    TestGroup { group_prefix: String },
    /// Tabulated layout: one grid per dashboard tab under the tab prefix.
    Tab { tab_prefix: String },
}

impl PathResolutionMode {
    /// An absent or blank tab prefix selects the test group layout.
    pub fn from_prefixes(group_prefix: &str, tab_prefix: Option<&str>) -> Self {
        match tab_prefix.map(str::trim).filter(|p| !p.is_empty()) {
            Some(tab_prefix) => PathResolutionMode::Tab {
                tab_prefix: tab_prefix.to_string(),
            },
            None => PathResolutionMode::TestGroup {
                group_prefix: group_prefix.to_string(),
            },
        }
    }

    pub fn resolve(&self, base: &ObjectPath, identity: &Identity) -> Result<ObjectPath, PathError> {
        match self {
            PathResolutionMode::TestGroup { group_prefix } => {
                resolve_test_group_path(base, group_prefix, &identity.test_group)
            }
            PathResolutionMode::Tab { tab_prefix } => {
                resolve_tab_path(base, tab_prefix, &identity.dashboard, &identity.tab)
            }
        }
    }
}
