//! In-process [`BackofficeApi`] over JSON fixture rows.
//!
//! Serves list requests the way the real backend does (filter, order by
//! sequence, page window, total), applies sequence moves within a sibling
//! collection, and accepts CSV imports. Used for offline runs of the console
//! and in tests.

use std::{cmp::Ordering, collections::HashMap, path::Path};

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use shared::{
    domain::{RecordId, RecordStatus, Resource},
    protocol::{ImportSummary, ListParams, UpdateSequenceRequest},
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::{
    error::TransportError,
    normalize::{as_i64, as_text, first, FieldMap, ResponseShape},
    pagination::{slice_page, PageSize},
    transport::{BackofficeApi, CsvUpload},
};

/// Every call the backend received, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    FetchList {
        resource: Resource,
        params: ListParams,
    },
    UpdateSequence {
        resource: Resource,
        request: UpdateSequenceRequest,
    },
    ImportCsv {
        resource: Resource,
        filename: String,
    },
}

struct MemoryState {
    tables: HashMap<Resource, Vec<Value>>,
    calls: Vec<RecordedCall>,
    fail_next_update: Option<TransportError>,
    fail_next_fetch: Option<TransportError>,
}

pub struct InMemoryBackend {
    shape: ResponseShape,
    inner: Mutex<MemoryState>,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(ResponseShape::DataNamed)
    }
}

impl InMemoryBackend {
    /// `shape` selects the envelope list responses are wrapped in.
    pub fn new(shape: ResponseShape) -> Self {
        Self::with_tables(shape, HashMap::new())
    }

    pub fn with_tables(shape: ResponseShape, tables: HashMap<Resource, Vec<Value>>) -> Self {
        Self {
            shape,
            inner: Mutex::new(MemoryState {
                tables,
                calls: Vec::new(),
                fail_next_update: None,
                fail_next_fetch: None,
            }),
        }
    }

    /// Fixture document: `{"items": [...], "categories": [...], ...}` keyed
    /// by resource path.
    pub fn from_fixture(document: &Value, shape: ResponseShape) -> anyhow::Result<Self> {
        let object = document
            .as_object()
            .ok_or_else(|| anyhow!("fixture document must be a JSON object"))?;
        let mut tables = HashMap::new();
        for (name, rows) in object {
            let resource: Resource = name.parse()?;
            let rows = rows
                .as_array()
                .ok_or_else(|| anyhow!("fixture '{name}' must be an array"))?;
            tables.insert(resource, rows.clone());
        }
        Ok(Self::with_tables(shape, tables))
    }

    pub async fn from_fixture_file(path: &Path, shape: ResponseShape) -> anyhow::Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read fixture file '{}'", path.display()))?;
        let document: Value = serde_json::from_str(&raw)
            .with_context(|| format!("fixture file '{}' is not JSON", path.display()))?;
        Self::from_fixture(&document, shape)
    }

    pub async fn insert_rows(&self, resource: Resource, rows: Vec<Value>) {
        self.inner
            .lock()
            .await
            .tables
            .entry(resource)
            .or_default()
            .extend(rows);
    }

    pub async fn rows(&self, resource: Resource) -> Vec<Value> {
        self.inner
            .lock()
            .await
            .tables
            .get(&resource)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.inner.lock().await.calls.clone()
    }

    pub async fn fetch_calls(&self) -> Vec<ListParams> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::FetchList { params, .. } => Some(params),
                _ => None,
            })
            .collect()
    }

    pub async fn sequence_updates(&self) -> Vec<UpdateSequenceRequest> {
        self.calls()
            .await
            .into_iter()
            .filter_map(|call| match call {
                RecordedCall::UpdateSequence { request, .. } => Some(request),
                _ => None,
            })
            .collect()
    }

    pub async fn fail_next_update(&self, err: TransportError) {
        self.inner.lock().await.fail_next_update = Some(err);
    }

    pub async fn fail_next_fetch(&self, err: TransportError) {
        self.inner.lock().await.fail_next_fetch = Some(err);
    }

    fn envelope(&self, resource: Resource, rows: Vec<Value>, total: usize) -> Value {
        let key = resource.collection_keys()[0];
        match self.shape {
            ResponseShape::BareArray => Value::Array(rows),
            ResponseShape::DataArray => json!({ "data": rows, "total": total }),
            ResponseShape::Named => json!({ key: rows, "total": total }),
            ResponseShape::DataNamed => json!({ "data": { key: rows }, "total": total }),
            ResponseShape::Unrecognized => json!({ "unexpected": rows }),
        }
    }
}

fn matches_filter(map: &FieldMap, row: &Value, name: &str, wanted: &str) -> bool {
    let candidates: &[&str] = match name {
        "status" => map.status,
        n if n.ends_with("category_id") || n == "parent_id" => map.parent_id,
        _ => &[],
    };
    let actual = first(row, &[name]).or_else(|| first(row, candidates));
    let Some(actual) = actual else {
        return false;
    };
    if name == "status" {
        return RecordStatus::from_json(actual) == RecordStatus::from_json(&Value::from(wanted));
    }
    let actual = as_text(actual).unwrap_or_default();
    if candidates.is_empty() {
        actual.to_lowercase().contains(&wanted.to_lowercase())
    } else {
        actual == wanted
    }
}

fn by_sequence(map: &FieldMap) -> impl Fn(&Value, &Value) -> Ordering + '_ {
    move |a, b| {
        let key = |row: &Value| {
            (
                first(row, map.sequence).and_then(as_i64).unwrap_or(i64::MAX),
                first(row, map.id).and_then(as_i64).unwrap_or(i64::MAX),
            )
        };
        key(a).cmp(&key(b))
    }
}

fn sequence_key(map: &FieldMap) -> &'static str {
    map.sequence.first().copied().unwrap_or("seq_no")
}

/// CSV cells are text; columns the field map reads as integers are stored
/// as numbers so imported rows look like the ones the backend serves.
fn csv_cell(map: &FieldMap, header: &str, raw: &str) -> Value {
    let numeric = [map.id, map.sequence, map.parent_id, map.status]
        .iter()
        .any(|paths| paths.contains(&header));
    match raw.parse::<i64>() {
        Ok(number) if numeric => Value::from(number),
        _ => Value::from(raw),
    }
}

#[async_trait]
impl BackofficeApi for InMemoryBackend {
    async fn fetch_list(
        &self,
        resource: Resource,
        params: &ListParams,
    ) -> Result<Value, TransportError> {
        let mut state = self.inner.lock().await;
        state.calls.push(RecordedCall::FetchList {
            resource,
            params: params.clone(),
        });
        if let Some(err) = state.fail_next_fetch.take() {
            return Err(err);
        }

        let map = FieldMap::for_resource(resource);
        let mut rows: Vec<Value> = state
            .tables
            .get(&resource)
            .map(|rows| {
                rows.iter()
                    .filter(|row| {
                        params
                            .filters
                            .iter()
                            .all(|(name, wanted)| matches_filter(map, row, name, wanted))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        rows.sort_by(by_sequence(map));

        let total = rows.len();
        let page_size = PageSize::fixed(params.per_page)
            .map_err(|err| TransportError::Status {
                status: 422,
                message: err.to_string(),
            })?;
        let window = slice_page(&rows, params.page, page_size).to_vec();
        debug!(%resource, total, returned = window.len(), "served in-memory list");
        Ok(self.envelope(resource, window, total))
    }

    async fn update_sequence(
        &self,
        resource: Resource,
        request: &UpdateSequenceRequest,
    ) -> Result<(), TransportError> {
        let mut state = self.inner.lock().await;
        state.calls.push(RecordedCall::UpdateSequence {
            resource,
            request: *request,
        });
        if let Some(err) = state.fail_next_update.take() {
            return Err(err);
        }

        let map = FieldMap::for_resource(resource);
        let seq_key = sequence_key(map);
        let rows = state.tables.entry(resource).or_default();
        let id_of = |row: &Value| first(row, map.id).and_then(as_i64).map(RecordId);
        let parent_of = |row: &Value| first(row, map.parent_id).and_then(as_i64);
        let seq_of = |row: &Value| first(row, map.sequence).and_then(as_i64).unwrap_or(0);

        let Some(source) = rows.iter().find(|row| id_of(row) == Some(request.id)) else {
            return Err(TransportError::Status {
                status: 404,
                message: format!("{resource} {} not found", request.id),
            });
        };
        let scope = parent_of(source);
        let old = seq_of(source);
        let new = request.new_seq_no;

        for row in rows.iter_mut().filter(|row| parent_of(row) == scope) {
            let seq = seq_of(row);
            let moved = if id_of(row) == Some(request.id) {
                new
            } else if new < old && (new..old).contains(&seq) {
                seq + 1
            } else if new > old && (old + 1..=new).contains(&seq) {
                seq - 1
            } else {
                continue;
            };
            if let Some(object) = row.as_object_mut() {
                object.insert(seq_key.to_string(), Value::from(moved));
            }
        }
        info!(%resource, id = %request.id, old, new, "sequence moved");
        Ok(())
    }

    async fn import_csv(
        &self,
        resource: Resource,
        upload: CsvUpload,
    ) -> Result<ImportSummary, TransportError> {
        let mut state = self.inner.lock().await;
        state.calls.push(RecordedCall::ImportCsv {
            resource,
            filename: upload.filename.clone(),
        });

        let map = FieldMap::for_resource(resource);
        let seq_key = sequence_key(map);
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(upload.bytes.as_slice());
        let headers = reader
            .headers()
            .map_err(|err| TransportError::Status {
                status: 422,
                message: format!("invalid csv header: {err}"),
            })?
            .clone();

        let rows = state.tables.entry(resource).or_default();
        let mut next_id = rows
            .iter()
            .filter_map(|row| first(row, map.id).and_then(as_i64))
            .max()
            .unwrap_or(0);
        let mut next_seq = rows
            .iter()
            .filter_map(|row| first(row, map.sequence).and_then(as_i64))
            .max()
            .unwrap_or(0);

        let mut summary = ImportSummary::default();
        for (line, record) in reader.records().enumerate() {
            let record = match record {
                Ok(record) => record,
                Err(err) => {
                    summary.failed += 1;
                    summary.errors.push(format!("line {}: {err}", line + 2));
                    continue;
                }
            };
            let mut object: Map<String, Value> = headers
                .iter()
                .zip(record.iter())
                .filter(|(_, value)| !value.is_empty())
                .map(|(name, value)| (name.to_string(), csv_cell(map, name, value)))
                .collect();
            let row = Value::Object(object.clone());
            if first(&row, map.name).is_none() {
                summary.failed += 1;
                summary
                    .errors
                    .push(format!("line {}: missing {}", line + 2, map.name[0]));
                continue;
            }

            let existing = first(&row, map.id)
                .and_then(as_i64)
                .and_then(|id| {
                    rows.iter_mut()
                        .find(|row| first(row, map.id).and_then(as_i64) == Some(id))
                });
            match existing.and_then(Value::as_object_mut) {
                Some(current) => {
                    object.retain(|key, _| !map.id.contains(&key.as_str()));
                    current.extend(object);
                    summary.updated += 1;
                }
                None => {
                    next_id += 1;
                    next_seq += 1;
                    object.insert("id".to_string(), Value::from(next_id));
                    object
                        .entry(seq_key.to_string())
                        .or_insert_with(|| Value::from(next_seq));
                    rows.push(Value::Object(object));
                    summary.created += 1;
                }
            }
        }
        info!(
            %resource,
            created = summary.created,
            updated = summary.updated,
            failed = summary.failed,
            "csv imported"
        );
        Ok(summary)
    }
}

#[cfg(test)]
#[path = "tests/memory_tests.rs"]
mod tests;
