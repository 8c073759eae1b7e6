//! Metrics definitions for the configuration resolver.

use shared::metrics_defs::{MetricDef, MetricType};

pub const CACHE_HIT: MetricDef = MetricDef {
    name: "config.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of resolutions served from the configuration cache",
};

pub const CACHE_MISS: MetricDef = MetricDef {
    name: "config.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of resolutions that had to fetch the configuration",
};

pub const CACHE_LOAD_ERROR: MetricDef = MetricDef {
    name: "config.cache.load_error",
    metric_type: MetricType::Counter,
    description: "Number of failed reads from the configuration cache",
};

pub const CACHE_SAVE_ERROR: MetricDef = MetricDef {
    name: "config.cache.save_error",
    metric_type: MetricType::Counter,
    description: "Number of failed writes to the configuration cache",
};

pub const RESOLVE_FAILED: MetricDef = MetricDef {
    name: "config.resolve.failed",
    metric_type: MetricType::Counter,
    description: "Number of resolutions that ended with a fatal error",
};

pub const FETCH_DURATION: MetricDef = MetricDef {
    name: "config.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch the configuration from the remote endpoint in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    CACHE_HIT,
    CACHE_MISS,
    CACHE_LOAD_ERROR,
    CACHE_SAVE_ERROR,
    RESOLVE_FAILED,
    FETCH_DURATION,
];
