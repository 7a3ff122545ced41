use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Shaping options for `get_data`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct GraphOptions {
    /// Output layout requested by the graph widget (e.g. "list", "dict").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    /// Restrict the returned columns. Empty = all fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GetDataParams {
    /// Device uuid whose samples are requested.
    pub uuid: String,
    /// Range start, unix seconds.
    pub timestamp_start: i64,
    /// Range end, unix seconds.
    pub timestamp_end: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<GraphOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PurgeDataParams {
    pub uuid: String,
    /// Delete samples older than this, unix seconds.
    pub timestamp_until: i64,
}

define_service! {
    /// Time-series storage behind the graph widgets.
    DatabaseService => "database": "Graph data queries and retention" {
        get_data(GetDataParams) => "get_data": "Fetch samples for a device in a time range.";
        purge_data(PurgeDataParams) => "purge_data": "Delete samples older than a timestamp.";
    }
}
