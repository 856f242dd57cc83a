//! Raw list payload → `ListResult`.

mod fields;
mod shape;

pub use fields::{as_i64, as_text, first, lookup, CanonicalRow, FieldMap, ParentRef, UNKNOWN_PARENT};
pub use shape::{RawListResponse, ResponseShape};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::domain::Resource;
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListResult {
    pub items: Vec<CanonicalRow>,
    /// Server-reported count across all pages.
    pub total: u64,
}

impl ListResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn row(&self, id: shared::domain::RecordId) -> Option<&CanonicalRow> {
        self.items.iter().find(|row| row.id == id)
    }
}

/// Decodes the envelope and maps every row. Unrecognized payloads become an
/// empty result.
pub fn normalize_list(resource: Resource, body: &Value) -> ListResult {
    let decoded = RawListResponse::decode(resource, body);
    let shape = decoded.shape();
    if shape == ResponseShape::Unrecognized {
        warn!(%resource, kind = json_kind(body), "unrecognized list payload; treating as empty");
        return ListResult::empty();
    }

    let (raw_rows, reported_total) = decoded.into_parts();
    let map = FieldMap::for_resource(resource);
    let raw_count = raw_rows.len();
    let items: Vec<CanonicalRow> = raw_rows.iter().filter_map(|raw| map.map_row(raw)).collect();
    if items.len() != raw_count {
        warn!(
            %resource,
            dropped = raw_count - items.len(),
            "dropped list rows without a usable id"
        );
    }

    let total = reported_total.unwrap_or(items.len() as u64);
    debug!(%resource, ?shape, rows = items.len(), total, "normalized list payload");
    ListResult { items, total }
}

fn json_kind(body: &Value) -> &'static str {
    match body {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "../tests/normalize_tests.rs"]
mod tests;
