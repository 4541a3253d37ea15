use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// A decoded grid snapshot for one test group or dashboard tab.
#[derive(Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct Grid {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

#[derive(Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct Column {
    pub name: String,
    pub build: String,
    // milliseconds since the epoch
    pub started: f64,
    pub extra: Vec<String>,
    pub hotlist_ids: String,
}

/// One test case. `results` is run-length encoded as (value, count) pairs while
/// `cell_ids`, `messages` and `icons` are aligned to the decoded results.
#[derive(Clone, Debug, Default, PartialEq, Encode, Decode)]
pub struct Row {
    pub name: String,
    pub results: Vec<i32>,
    pub cell_ids: Vec<String>,
    pub messages: Vec<String>,
    pub icons: Vec<String>,
    pub issues: Vec<String>,
    pub alert_info: Option<AlertInfo>,
}

#[derive(Clone, Debug, Default, PartialEq, Encode, Decode, Serialize)]
pub struct AlertInfo {
    pub fail_count: i32,
    pub fail_build_id: String,
    pub latest_fail_build_id: String,
    pub fail_time: Option<Timestamp>,
    pub pass_time: Option<Timestamp>,
    pub failure_message: String,
    pub fail_test_id: String,
    pub latest_fail_test_id: String,
    pub hotlist_ids: Vec<String>,
    pub email_addresses: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Encode, Decode, Serialize)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    /// Splits epoch milliseconds into whole seconds and a non-negative
    /// nanosecond remainder, e.g. -1 ms is -1 s + 999_000_000 ns.
    pub fn from_millis(millis: i64) -> Self {
        Timestamp {
            seconds: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) * 1_000_000) as i32,
        }
    }

    /// Grids store start times as floating point milliseconds. Fractions of a
    /// millisecond are dropped and non-finite values map to the epoch.
    pub fn from_float_millis(millis: f64) -> Self {
        if !millis.is_finite() {
            return Timestamp::default();
        }
        // `as` saturates at the i64 bounds
        Timestamp::from_millis(millis.trunc() as i64)
    }
}

/// Raw dashboard configuration, as read from `<scope>/config`.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Configuration {
    #[serde(default)]
    pub dashboards: Vec<Dashboard>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Dashboard {
    pub name: String,
    #[serde(default)]
    pub dashboard_tab: Vec<DashboardTab>,
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DashboardTab {
    pub name: String,
    pub test_group_name: String,
}

impl Dashboard {
    pub fn new<N: Into<String>>(name: N, tabs: Vec<DashboardTab>) -> Self {
        Dashboard {
            name: name.into(),
            dashboard_tab: tabs,
        }
    }
}

impl DashboardTab {
    pub fn new<N, G>(name: N, test_group_name: G) -> Self
    where
        N: Into<String>,
        G: Into<String>,
    {
        DashboardTab {
            name: name.into(),
            test_group_name: test_group_name.into(),
        }
    }
}

/// A request resolved to its stored dashboard, tab and backing test group.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Identity {
    pub dashboard: String,
    pub tab: String,
    pub test_group: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_from_millis() {
        assert_eq!(
            Timestamp::from_millis(1500),
            Timestamp {
                seconds: 1,
                nanos: 500_000_000
            }
        );
        assert_eq!(
            Timestamp::from_millis(-1),
            Timestamp {
                seconds: -1,
                nanos: 999_000_000
            }
        );
        assert_eq!(
            Timestamp::from_millis(-1000),
            Timestamp {
                seconds: -1,
                nanos: 0
            }
        );
    }

    #[test]
    fn test_timestamp_from_float_millis() {
        assert_eq!(
            Timestamp::from_float_millis(1_650_000_000_123.9),
            Timestamp {
                seconds: 1_650_000_000,
                nanos: 123_000_000
            }
        );
        assert_eq!(Timestamp::from_float_millis(f64::NAN), Timestamp::default());
        assert_eq!(
            Timestamp::from_float_millis(-1500.0),
            Timestamp {
                seconds: -2,
                nanos: 500_000_000
            }
        );
    }
}
