use serde::{Deserialize, Serialize};

/// One archive, as named on the wire rather than as the engine's internal
/// `ArchiveConfig` — keeps this crate free of a dependency on the storage
/// engine.
///
/// ```text
/// Wire shape:
///   { "aggregation_type": "average" | "min" | "max",
///     "aggregation": u32, "count": u32, "threshold": f32 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveSpec {
    pub aggregation_type: String,
    pub aggregation: u32,
    pub count: u32,
    #[serde(default = "default_threshold")]
    pub threshold: f32,
}

fn default_threshold() -> f32 {
    0.5
}

/// Request frames. Tagged by `command`, mirroring the broker's request
/// taxonomy: `create`, `update` (alias `append`), `fetch`, `info`,
/// `get_config`, `exists`, `delete`, `list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Request {
    Create {
        series: String,
        series_type: String,
        start_epoch: i64,
        interval: u32,
        timezone_name: String,
        archives: Vec<ArchiveSpec>,
    },
    Update {
        series: String,
        batch: Vec<(i64, f32)>,
    },
    Append {
        series: String,
        readings: Vec<(i64, f64)>,
    },
    Fetch {
        series: String,
        aggregation_type: String,
        resolution: u32,
        period_start: i64,
        period_end: i64,
    },
    Info {
        series: String,
    },
    GetConfig {
        series: String,
    },
    Exists {
        series: String,
    },
    Delete {
        series: String,
    },
    List,
}

/// Response frames. `Ok` carries a command-specific JSON payload; the
/// broker never needs to know its shape, only the client does.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ok { value: serde_json::Value },
    Error { kind: String, message: String },
}

impl Response {
    pub fn ok(value: impl Serialize) -> Self {
        Response::Ok {
            value: serde_json::to_value(value).unwrap_or(serde_json::Value::Null),
        }
    }

    pub fn error(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Response::Error {
            kind: kind.into(),
            message: message.into(),
        }
    }
}
