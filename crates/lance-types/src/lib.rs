pub mod api;
pub mod models;

/// A table row as returned by the data platform. Columns the server does not
/// know about pass through untouched.
pub type Row = serde_json::Map<String, serde_json::Value>;
