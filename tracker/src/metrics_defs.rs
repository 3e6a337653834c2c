//! Metrics definitions for the tracker.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

#[macro_export]
macro_rules! counter {
    ($def:expr $(, $key:expr => $value:expr)* $(,)?) => {
        metrics::counter!($def.name $(, $key => $value)*)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr $(, $key:expr => $value:expr)* $(,)?) => {
        metrics::histogram!($def.name $(, $key => $value)*)
    };
}

pub const SHEETS_REQUEST_DURATION: MetricDef = MetricDef {
    name: "sheets.request.duration",
    metric_type: MetricType::Histogram,
    description: "Time spent on a Google Sheets API call in seconds, tagged by op",
};

pub const SHEETS_REQUEST_FAILED: MetricDef = MetricDef {
    name: "sheets.request.failed",
    metric_type: MetricType::Counter,
    description: "Google Sheets API calls that failed or returned a non-success status",
};

pub const TRACKING_LOOKUP: MetricDef = MetricDef {
    name: "tracking.lookup",
    metric_type: MetricType::Counter,
    description: "Record lookups by identifier, tagged by outcome",
};

pub const TRACKING_UPSERT: MetricDef = MetricDef {
    name: "tracking.upsert",
    metric_type: MetricType::Counter,
    description: "Records written, tagged created or updated",
};

pub const TRACKING_DELETE: MetricDef = MetricDef {
    name: "tracking.delete",
    metric_type: MetricType::Counter,
    description: "Records removed through the admin API",
};

pub const ADMIN_LOGIN_FAILED: MetricDef = MetricDef {
    name: "admin.login.failed",
    metric_type: MetricType::Counter,
    description: "Admin logins rejected for bad credentials",
};

pub const ALL_METRICS: &[MetricDef] = &[
    SHEETS_REQUEST_DURATION,
    SHEETS_REQUEST_FAILED,
    TRACKING_LOOKUP,
    TRACKING_UPSERT,
    TRACKING_DELETE,
    ADMIN_LOGIN_FAILED,
];

/// Registers descriptions with the installed recorder.
pub fn describe_all() {
    for def in ALL_METRICS {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_metric_names_unique() {
        let names: HashSet<&str> = ALL_METRICS.iter().map(|m| m.name).collect();
        assert_eq!(names.len(), ALL_METRICS.len());
    }
}
