//! Metrics definitions for the grid API.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CONFIG_REFRESH_DURATION: MetricDef = MetricDef {
    name: "config.refresh.duration",
    metric_type: MetricType::Histogram,
    description: "Time to load and index a scope's configuration in seconds",
};

pub const CONFIG_REFRESH_FAILED: MetricDef = MetricDef {
    name: "config.refresh.failed",
    metric_type: MetricType::Counter,
    description: "Number of configuration refreshes that failed",
};

pub const CONFIG_SERVED_STALE: MetricDef = MetricDef {
    name: "config.served_stale",
    metric_type: MetricType::Counter,
    description: "Number of requests answered from a stale configuration snapshot",
};

pub const GRID_FETCH_DURATION: MetricDef = MetricDef {
    name: "grid.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch and parse a grid blob in seconds",
};

pub const GRID_MALFORMED: MetricDef = MetricDef {
    name: "grid.malformed",
    metric_type: MetricType::Counter,
    description: "Number of grids rejected for violating the row encoding",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CONFIG_REFRESH_DURATION,
    CONFIG_REFRESH_FAILED,
    CONFIG_SERVED_STALE,
    GRID_FETCH_DURATION,
    GRID_MALFORMED,
];
