use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::domain::{RecordId, RecordStatus, Resource, SiblingScope};

pub const UNKNOWN_PARENT: &str = "Unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentRef {
    pub id: Option<RecordId>,
    pub name: String,
}

impl Default for ParentRef {
    fn default() -> Self {
        Self {
            id: None,
            name: UNKNOWN_PARENT.to_string(),
        }
    }
}

/// Stable row shape every screen renders, whatever the backend called things.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalRow {
    pub id: RecordId,
    pub name: String,
    /// Barcode, SKU, promo code, phone... whatever the resource's secondary
    /// identifier is.
    pub code: String,
    pub description: String,
    pub sequence_number: i64,
    pub parent: ParentRef,
    pub status: RecordStatus,
}

impl CanonicalRow {
    pub fn scope(&self) -> SiblingScope {
        SiblingScope {
            parent_id: self.parent.id,
        }
    }
}

/// Candidate source paths per canonical field, tried in order. Dotted paths
/// walk into nested relation objects. Ids must be integers, or strings
/// holding one.
#[derive(Debug)]
pub struct FieldMap {
    pub id: &'static [&'static str],
    pub name: &'static [&'static str],
    pub code: &'static [&'static str],
    pub description: &'static [&'static str],
    pub sequence: &'static [&'static str],
    pub parent_id: &'static [&'static str],
    pub parent_name: &'static [&'static str],
    pub status: &'static [&'static str],
}

const SEQUENCE: &[&str] = &["seq_no", "sequence_number", "sequence", "position"];
const STATUS: &[&str] = &["status", "is_active", "active"];
const DESCRIPTION: &[&str] = &["description", "desc"];

static ITEMS: FieldMap = FieldMap {
    id: &["id", "product_id", "item_id"],
    name: &["product_name", "item_name", "name", "title"],
    code: &["barcode", "sku", "code"],
    description: DESCRIPTION,
    sequence: SEQUENCE,
    parent_id: &["category_id", "category.id", "categories.id"],
    parent_name: &[
        "category.category_name",
        "categories.category_name",
        "category.name",
        "category_name",
    ],
    status: STATUS,
};

static CATEGORIES: FieldMap = FieldMap {
    id: &["id", "category_id"],
    name: &["category_name", "name"],
    code: &["code", "slug"],
    description: DESCRIPTION,
    sequence: SEQUENCE,
    parent_id: &["parent_id", "parent.id"],
    parent_name: &["parent.category_name", "parent.name", "parent_name"],
    status: STATUS,
};

static MODIFIERS: FieldMap = FieldMap {
    id: &["id", "modifier_id", "attribute_id"],
    name: &["modifier_name", "attribute_name", "name"],
    code: &["code", "sku"],
    description: DESCRIPTION,
    sequence: SEQUENCE,
    parent_id: &[
        "modifier_category_id",
        "modifier_categories.id",
        "modifier_category.id",
    ],
    parent_name: &[
        "modifier_categories.modifier_category",
        "modifier_category.modifier_category",
        "modifier_category.name",
        "modifier_category_name",
    ],
    status: STATUS,
};

static MODIFIER_CATEGORIES: FieldMap = FieldMap {
    id: &["id", "modifier_category_id"],
    name: &["modifier_category", "modifier_category_name", "name"],
    code: &["code"],
    description: DESCRIPTION,
    sequence: SEQUENCE,
    parent_id: &[],
    parent_name: &[],
    status: STATUS,
};

static CUSTOMERS: FieldMap = FieldMap {
    id: &["id", "customer_id"],
    name: &["customer_name", "full_name", "name"],
    code: &["phone", "email", "customer_code"],
    description: &["address", "notes"],
    sequence: &[],
    parent_id: &["group_id", "customer_group.id"],
    parent_name: &["customer_group.name", "group_name"],
    status: STATUS,
};

static PROMOTIONS: FieldMap = FieldMap {
    id: &["id", "promotion_id"],
    name: &["promotion_name", "title", "name"],
    code: &["promo_code", "coupon_code", "code"],
    description: DESCRIPTION,
    sequence: &["priority"],
    parent_id: &[],
    parent_name: &[],
    status: STATUS,
};

static TAGS: FieldMap = FieldMap {
    id: &["id", "tag_id"],
    name: &["tag_name", "name"],
    code: &["color", "code"],
    description: DESCRIPTION,
    sequence: SEQUENCE,
    parent_id: &[],
    parent_name: &[],
    status: STATUS,
};

impl FieldMap {
    pub fn for_resource(resource: Resource) -> &'static FieldMap {
        match resource {
            Resource::Items => &ITEMS,
            Resource::Categories => &CATEGORIES,
            Resource::Modifiers => &MODIFIERS,
            Resource::ModifierCategories => &MODIFIER_CATEGORIES,
            Resource::Customers => &CUSTOMERS,
            Resource::Promotions => &PROMOTIONS,
            Resource::Tags => &TAGS,
        }
    }

    /// Maps one raw record. `None` only when no usable id is present; every
    /// other field falls back to its default.
    pub fn map_row(&self, raw: &Value) -> Option<CanonicalRow> {
        let id = first(raw, self.id).and_then(as_i64).map(RecordId)?;
        let parent_id = first(raw, self.parent_id)
            .and_then(as_i64)
            .map(RecordId);
        Some(CanonicalRow {
            id,
            name: text_or_default(raw, self.name),
            code: text_or_default(raw, self.code),
            description: text_or_default(raw, self.description),
            sequence_number: first(raw, self.sequence).and_then(as_i64).unwrap_or(0),
            parent: ParentRef {
                id: parent_id,
                name: first(raw, self.parent_name)
                    .and_then(as_text)
                    .filter(|name| !name.is_empty())
                    .unwrap_or_else(|| UNKNOWN_PARENT.to_string()),
            },
            status: first(raw, self.status)
                .map(RecordStatus::from_json)
                .unwrap_or_default(),
        })
    }
}

/// Follows a dotted path (`"category.name"`) through nested objects.
pub fn lookup<'a>(raw: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.')
        .try_fold(raw, |value, segment| value.get(segment))
        .filter(|value| !value.is_null())
}

/// First non-null value among `paths`.
pub fn first<'a>(raw: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|path| lookup(raw, path))
}

pub fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_or_default(raw: &Value, paths: &[&str]) -> String {
    first(raw, paths).and_then(as_text).unwrap_or_default()
}
