//! Decoding of the list payload envelopes the backend is known to send.

use serde_json::{Map, Value};
use shared::domain::Resource;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// `[...]`
    BareArray,
    /// `{"data": [...]}`
    DataArray,
    /// `{"<collection>": [...]}`
    Named,
    /// `{"data": {"<collection>": [...]}}`
    DataNamed,
    Unrecognized,
}

/// A list payload decoded into one of the documented envelopes.
#[derive(Debug, Clone, PartialEq)]
pub enum RawListResponse {
    BareArray(Vec<Value>),
    DataArray {
        rows: Vec<Value>,
        total: Option<u64>,
    },
    Named {
        key: String,
        rows: Vec<Value>,
        total: Option<u64>,
    },
    DataNamed {
        key: String,
        rows: Vec<Value>,
        total: Option<u64>,
    },
    Unrecognized,
}

impl RawListResponse {
    /// Tries each envelope decoder in turn. Anything that matches none of them
    /// is `Unrecognized`; decoding never fails.
    pub fn decode(resource: Resource, body: &Value) -> Self {
        decode_bare_array(body)
            .or_else(|| decode_data_array(body))
            .or_else(|| decode_named(resource, body))
            .or_else(|| decode_data_named(resource, body))
            .unwrap_or(RawListResponse::Unrecognized)
    }

    pub fn shape(&self) -> ResponseShape {
        match self {
            RawListResponse::BareArray(_) => ResponseShape::BareArray,
            RawListResponse::DataArray { .. } => ResponseShape::DataArray,
            RawListResponse::Named { .. } => ResponseShape::Named,
            RawListResponse::DataNamed { .. } => ResponseShape::DataNamed,
            RawListResponse::Unrecognized => ResponseShape::Unrecognized,
        }
    }

    /// Rows plus the server-reported total, if the envelope carried one.
    pub fn into_parts(self) -> (Vec<Value>, Option<u64>) {
        match self {
            RawListResponse::BareArray(rows) => (rows, None),
            RawListResponse::DataArray { rows, total }
            | RawListResponse::Named { rows, total, .. }
            | RawListResponse::DataNamed { rows, total, .. } => (rows, total),
            RawListResponse::Unrecognized => (Vec::new(), None),
        }
    }
}

fn decode_bare_array(body: &Value) -> Option<RawListResponse> {
    body.as_array()
        .map(|rows| RawListResponse::BareArray(rows.clone()))
}

fn decode_data_array(body: &Value) -> Option<RawListResponse> {
    let object = body.as_object()?;
    let rows = object.get("data")?.as_array()?;
    Some(RawListResponse::DataArray {
        rows: rows.clone(),
        total: read_total(object),
    })
}

fn decode_named(resource: Resource, body: &Value) -> Option<RawListResponse> {
    let object = body.as_object()?;
    let (key, rows) = find_collection(resource, object)?;
    Some(RawListResponse::Named {
        key,
        rows,
        total: read_total(object),
    })
}

fn decode_data_named(resource: Resource, body: &Value) -> Option<RawListResponse> {
    let object = body.as_object()?;
    let data = object.get("data")?.as_object()?;
    let (key, rows) = find_collection(resource, data)?;
    Some(RawListResponse::DataNamed {
        key,
        rows,
        total: read_total(object).or_else(|| read_total(data)),
    })
}

fn find_collection(resource: Resource, object: &Map<String, Value>) -> Option<(String, Vec<Value>)> {
    resource.collection_keys().iter().find_map(|key| {
        object
            .get(*key)
            .and_then(Value::as_array)
            .map(|rows| (key.to_string(), rows.clone()))
    })
}

/// `total` as a non-negative integer or a numeric string.
fn read_total(object: &Map<String, Value>) -> Option<u64> {
    match object.get("total")? {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0 && f.fract() == 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
