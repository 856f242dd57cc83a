use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::RecordId;

/// Query string sent to `GET /{resource}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListParams {
    pub page: u32,
    pub per_page: u32,
    #[serde(flatten)]
    pub filters: BTreeMap<String, String>,
}

impl ListParams {
    /// Flattened `(name, value)` pairs in a stable order: paging first, then
    /// filters sorted by name.
    pub fn to_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::with_capacity(self.filters.len() + 2);
        pairs.push(("page".to_string(), self.page.to_string()));
        pairs.push(("per_page".to_string(), self.per_page.to_string()));
        pairs.extend(
            self.filters
                .iter()
                .map(|(name, value)| (name.clone(), value.clone())),
        );
        pairs
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSequenceRequest {
    pub id: RecordId,
    pub new_seq_no: i64,
}

/// Result of a bulk CSV import as reported by the backend.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    #[serde(default)]
    pub created: u64,
    #[serde(default)]
    pub updated: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl ImportSummary {
    pub fn processed(&self) -> u64 {
        self.created + self.updated + self.failed
    }
}
