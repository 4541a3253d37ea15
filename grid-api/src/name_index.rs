//! Case and whitespace insensitive resolution of dashboard and tab names.
use crate::types::{Configuration, Dashboard, Identity};
use std::collections::HashMap;
use std::collections::hash_map::Entry;

/// Lowercases and collapses whitespace runs, so `"  My   Dash "` and
/// `"my dash"` share a key.
pub fn normalize(name: &str) -> String {
    name.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LookupError {
    #[error("dashboard {key:?} not found")]
    DashboardNotFound { key: String },

    #[error("tab {key:?} not found in dashboard {dashboard:?}")]
    TabNotFound { dashboard: String, key: String },

    #[error("test group not found for tab {tab:?} in dashboard {dashboard:?}")]
    TestGroupNotFound { dashboard: String, tab: String },
}

impl LookupError {
    /// The identity fields resolved before the lookup failed.
    pub fn partial_identity(&self) -> Identity {
        match self {
            LookupError::DashboardNotFound { .. } => Identity::default(),
            LookupError::TabNotFound { dashboard, .. } => Identity {
                dashboard: dashboard.clone(),
                ..Default::default()
            },
            LookupError::TestGroupNotFound { dashboard, tab } => Identity {
                dashboard: dashboard.clone(),
                tab: tab.clone(),
                ..Default::default()
            },
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("dashboards {first:?} and {second:?} normalize to the same name")]
    DuplicateDashboard { first: String, second: String },

    #[error("tabs {first:?} and {second:?} in dashboard {dashboard:?} normalize to the same name")]
    DuplicateTab {
        dashboard: String,
        first: String,
        second: String,
    },
}

/// Normalized name to canonical name maps.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NameIndex {
    dashboards: HashMap<String, String>,
    tabs: HashMap<String, HashMap<String, String>>,
}

impl NameIndex {
    pub fn build(config: &Configuration) -> Result<Self, SnapshotError> {
        let mut index = NameIndex::default();

        for dashboard in &config.dashboards {
            let dashboard_key = normalize(&dashboard.name);
            match index.dashboards.entry(dashboard_key.clone()) {
                Entry::Occupied(existing) => {
                    return Err(SnapshotError::DuplicateDashboard {
                        first: existing.get().clone(),
                        second: dashboard.name.clone(),
                    });
                }
                Entry::Vacant(slot) => {
                    slot.insert(dashboard.name.clone());
                }
            }

            let tabs = index.tabs.entry(dashboard_key).or_default();
            for tab in &dashboard.dashboard_tab {
                match tabs.entry(normalize(&tab.name)) {
                    Entry::Occupied(existing) => {
                        return Err(SnapshotError::DuplicateTab {
                            dashboard: dashboard.name.clone(),
                            first: existing.get().clone(),
                            second: tab.name.clone(),
                        });
                    }
                    Entry::Vacant(slot) => {
                        slot.insert(tab.name.clone());
                    }
                }
            }
        }

        Ok(index)
    }

    /// Maps display names to canonical (dashboard, tab) names.
    pub fn canonical(&self, dashboard: &str, tab: &str) -> Result<(&str, &str), LookupError> {
        let dashboard_key = normalize(dashboard);
        let tab_key = normalize(tab);

        let dashboard_name = self
            .dashboards
            .get(&dashboard_key)
            .ok_or_else(|| LookupError::DashboardNotFound {
                key: dashboard_key.clone(),
            })?;

        let tab_name = self
            .tabs
            .get(&dashboard_key)
            .and_then(|tabs| tabs.get(&tab_key))
            .ok_or_else(|| LookupError::TabNotFound {
                dashboard: dashboard_name.clone(),
                key: tab_key,
            })?;

        Ok((dashboard_name.as_str(), tab_name.as_str()))
    }

    pub fn dashboard_count(&self) -> usize {
        self.dashboards.len()
    }
}

/// An immutable configuration plus its derived name index. Refreshes build a
/// new snapshot rather than mutating this one.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ConfigSnapshot {
    dashboards: HashMap<String, Dashboard>,
    index: NameIndex,
}

impl ConfigSnapshot {
    pub fn build(config: Configuration) -> Result<Self, SnapshotError> {
        let index = NameIndex::build(&config)?;
        let dashboards = config
            .dashboards
            .into_iter()
            .map(|d| (d.name.clone(), d))
            .collect();

        Ok(ConfigSnapshot { dashboards, index })
    }

    pub fn lookup(&self, dashboard: &str, tab: &str) -> Result<Identity, LookupError> {
        let (dashboard_name, tab_name) = self.index.canonical(dashboard, tab)?;

        let test_group = self
            .dashboards
            .get(dashboard_name)
            .and_then(|d| d.dashboard_tab.iter().find(|t| t.name == tab_name))
            .map(|t| t.test_group_name.as_str())
            .filter(|group| !group.is_empty())
            .ok_or_else(|| LookupError::TestGroupNotFound {
                dashboard: dashboard_name.to_string(),
                tab: tab_name.to_string(),
            })?;

        Ok(Identity {
            dashboard: dashboard_name.to_string(),
            tab: tab_name.to_string(),
            test_group: test_group.to_string(),
        })
    }

    pub fn dashboard_count(&self) -> usize {
        self.index.dashboard_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DashboardTab;

    fn get_config() -> Configuration {
        Configuration {
            dashboards: vec![
                Dashboard::new(
                    "My Dash",
                    vec![
                        DashboardTab::new("Tab1", "group-a"),
                        DashboardTab::new("Flaky Tests", "group-b"),
                        DashboardTab::new("Orphan", ""),
                    ],
                ),
                Dashboard::new("sig-node", vec![DashboardTab::new("e2e", "node-e2e")]),
            ],
        }
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("  My   Dash  "), "my dash");
        assert_eq!(normalize("My\tDash\n"), "my dash");
        assert_eq!(normalize("ÄBC"), "äbc");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(&normalize(" A  b ")), normalize(" A  b "));
    }

    #[test]
    fn test_lookup_is_normalization_insensitive() {
        let snapshot = ConfigSnapshot::build(get_config()).unwrap();
        let expected = Identity {
            dashboard: "My Dash".into(),
            tab: "Tab1".into(),
            test_group: "group-a".into(),
        };
        assert_eq!(snapshot.lookup("My Dash", "Tab1"), Ok(expected.clone()));
        assert_eq!(snapshot.lookup("  my   dash  ", "tab1"), Ok(expected));
        assert_eq!(
            snapshot.lookup("MY DASH", " flaky\ttests").unwrap().test_group,
            "group-b"
        );
    }

    #[test]
    fn test_lookup_tiers() {
        let snapshot = ConfigSnapshot::build(get_config()).unwrap();

        let err = snapshot.lookup("missing", "Tab1").unwrap_err();
        assert_eq!(
            err,
            LookupError::DashboardNotFound {
                key: "missing".into()
            }
        );
        assert_eq!(err.partial_identity(), Identity::default());

        let err = snapshot.lookup("sig-node", "Tab1").unwrap_err();
        assert_eq!(
            err,
            LookupError::TabNotFound {
                dashboard: "sig-node".into(),
                key: "tab1".into()
            }
        );
        assert_eq!(err.partial_identity().dashboard, "sig-node");
        assert_eq!(err.partial_identity().tab, "");

        let err = snapshot.lookup("my dash", "orphan").unwrap_err();
        assert_eq!(
            err,
            LookupError::TestGroupNotFound {
                dashboard: "My Dash".into(),
                tab: "Orphan".into()
            }
        );
        assert_eq!(err.partial_identity().tab, "Orphan");
    }

    #[test]
    fn test_duplicate_names() {
        let config = Configuration {
            dashboards: vec![
                Dashboard::new("My Dash", vec![]),
                Dashboard::new("my  dash", vec![]),
            ],
        };
        assert_eq!(
            ConfigSnapshot::build(config),
            Err(SnapshotError::DuplicateDashboard {
                first: "My Dash".into(),
                second: "my  dash".into()
            })
        );

        let config = Configuration {
            dashboards: vec![Dashboard::new(
                "d",
                vec![DashboardTab::new("A", "g1"), DashboardTab::new("a", "g2")],
            )],
        };
        assert!(matches!(
            ConfigSnapshot::build(config),
            Err(SnapshotError::DuplicateTab { .. })
        ));
    }
}
