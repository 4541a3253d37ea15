//! Common types for metrics definitions.
//!
//! Each crate declares its metrics as `MetricDef` constants and records them
//! through the `counter!`, `gauge!` and `histogram!` macros below, so names
//! and descriptions live in one place.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

impl MetricType {
    pub const fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "Counter",
            MetricType::Gauge => "Gauge",
            MetricType::Histogram => "Histogram",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

/// Registers descriptions with the installed recorder. Call once after the
/// exporter is set up.
pub fn describe_all(defs: &[MetricDef]) {
    for def in defs {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
        tracing::trace!(name = def.name, kind = def.metric_type.as_str(), "Described metric");
    }
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

#[macro_export]
macro_rules! gauge {
    ($def:expr) => {
        metrics::gauge!($def.name)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUESTS: MetricDef = MetricDef {
        name: "test.requests",
        metric_type: MetricType::Counter,
        description: "Requests seen by the test",
    };

    #[test]
    fn test_macros_without_recorder() {
        // No recorder installed: recording and describing are no-ops.
        describe_all(&[REQUESTS]);
        counter!(REQUESTS).increment(1);
        histogram!(MetricDef {
            name: "test.latency",
            metric_type: MetricType::Histogram,
            description: "",
        })
        .record(0.5);
        assert_eq!(REQUESTS.metric_type.as_str(), "Counter");
    }
}
