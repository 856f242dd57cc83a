use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(RecordId);

/// A back-office resource screen backed by a list endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    Items,
    Categories,
    Modifiers,
    ModifierCategories,
    Customers,
    Promotions,
    Tags,
}

impl Resource {
    pub const ALL: [Resource; 7] = [
        Resource::Items,
        Resource::Categories,
        Resource::Modifiers,
        Resource::ModifierCategories,
        Resource::Customers,
        Resource::Promotions,
        Resource::Tags,
    ];

    /// URL path segment and cache-key prefix.
    pub fn path(self) -> &'static str {
        match self {
            Resource::Items => "items",
            Resource::Categories => "categories",
            Resource::Modifiers => "modifiers",
            Resource::ModifierCategories => "modifier_categories",
            Resource::Customers => "customers",
            Resource::Promotions => "promotions",
            Resource::Tags => "tags",
        }
    }

    /// Object keys a backend may wrap the row array in.
    pub fn collection_keys(self) -> &'static [&'static str] {
        match self {
            Resource::Items => &["items", "products"],
            Resource::Categories => &["categories"],
            Resource::Modifiers => &["modifiers", "attributes"],
            Resource::ModifierCategories => &["modifier_categories", "attribute_categories"],
            Resource::Customers => &["customers"],
            Resource::Promotions => &["promotions"],
            Resource::Tags => &["tags"],
        }
    }

    /// Whether rows carry a manually maintained sequence number.
    pub fn is_sequenced(self) -> bool {
        matches!(
            self,
            Resource::Items
                | Resource::Categories
                | Resource::Modifiers
                | Resource::ModifierCategories
        )
    }
}

impl fmt::Display for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

#[derive(Debug, Error)]
#[error("unknown resource '{0}'")]
pub struct ParseResourceError(pub String);

impl FromStr for Resource {
    type Err = ParseResourceError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Resource::ALL
            .into_iter()
            .find(|resource| {
                resource.path() == normalized || resource.collection_keys().contains(&normalized.as_str())
            })
            .ok_or_else(|| ParseResourceError(raw.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Active,
    Inactive,
    #[default]
    Unknown,
}

impl RecordStatus {
    /// Backends report status as strings, booleans or 0/1 flags.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(true) => RecordStatus::Active,
            serde_json::Value::Bool(false) => RecordStatus::Inactive,
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(1) => RecordStatus::Active,
                Some(0) => RecordStatus::Inactive,
                _ => RecordStatus::Unknown,
            },
            serde_json::Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "active" | "enabled" | "1" | "true" => RecordStatus::Active,
                "inactive" | "disabled" | "0" | "false" => RecordStatus::Inactive,
                _ => RecordStatus::Unknown,
            },
            _ => RecordStatus::Unknown,
        }
    }

    pub fn as_filter_value(self) -> Option<&'static str> {
        match self {
            RecordStatus::Active => Some("1"),
            RecordStatus::Inactive => Some("0"),
            RecordStatus::Unknown => None,
        }
    }
}

/// Sibling collection a sequence number is scoped to: rows sharing the same
/// parent (category, modifier category) are ordered together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct SiblingScope {
    pub parent_id: Option<RecordId>,
}

impl SiblingScope {
    pub const ROOT: SiblingScope = SiblingScope { parent_id: None };

    pub fn within(parent_id: RecordId) -> Self {
        Self {
            parent_id: Some(parent_id),
        }
    }
}

impl fmt::Display for SiblingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.parent_id {
            Some(parent) => write!(f, "parent:{parent}"),
            None => f.write_str("root"),
        }
    }
}
