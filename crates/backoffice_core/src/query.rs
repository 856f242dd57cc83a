use std::{collections::BTreeMap, fmt};

use shared::{domain::Resource, protocol::ListParams};

use crate::pagination::{PageSize, Pagination};

/// Everything that identifies one list request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub resource: Resource,
    pub page: u32,
    pub page_size: PageSize,
    pub filters: BTreeMap<String, String>,
}

impl ListQuery {
    pub fn new(resource: Resource) -> Self {
        Self {
            resource,
            page: 1,
            page_size: PageSize::default(),
            filters: BTreeMap::new(),
        }
    }

    pub fn from_parts(
        resource: Resource,
        pagination: &Pagination,
        filters: BTreeMap<String, String>,
    ) -> Self {
        Self {
            resource,
            page: pagination.current_page(),
            page_size: pagination.page_size(),
            filters,
        }
    }

    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    pub fn request_page(&self) -> u32 {
        if self.page_size.is_all() {
            1
        } else {
            self.page.max(1)
        }
    }

    fn canonical_filters(&self) -> BTreeMap<String, String> {
        self.filters
            .iter()
            .filter(|(_, value)| !value.trim().is_empty())
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    pub fn to_params(&self) -> ListParams {
        ListParams {
            page: self.request_page(),
            per_page: self.page_size.per_page(),
            filters: self.canonical_filters(),
        }
    }

    pub fn cache_key(&self) -> CacheKey {
        let params = self.to_params();
        let query = params
            .to_pairs()
            .into_iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        CacheKey(format!("{}{query}", CacheKey::resource_prefix(self.resource)))
    }
}

/// Cache identity of a list request: `"{resource}:page=..&per_page=..&<filters>"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Prefix shared by every key of `resource`; pass it to
    /// [`RemoteDataCache::invalidate`](crate::cache::RemoteDataCache::invalidate).
    pub fn resource_prefix(resource: Resource) -> String {
        format!("{}:", resource.path())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_key_sorts_filters_and_drops_empty_values() {
        let a = ListQuery::new(Resource::Items)
            .with_filter("status", "1")
            .with_filter("product_name", "Burger")
            .with_filter("barcode", "");
        let b = ListQuery::new(Resource::Items)
            .with_filter("product_name", "Burger")
            .with_filter("status", "1");
        assert_eq!(a.cache_key(), b.cache_key());
        assert_eq!(
            a.cache_key().as_str(),
            "items:page=1&per_page=10&product_name=Burger&status=1"
        );
    }

    #[test]
    fn all_page_size_collapses_page_in_key_and_params() {
        let mut query = ListQuery::new(Resource::Categories).with_page_size(PageSize::All);
        query.page = 6;
        let params = query.to_params();
        assert_eq!(params.page, 1);
        assert_eq!(params.per_page, crate::pagination::ALL_PAGE_SIZE);

        query.page = 2;
        assert_eq!(
            query.cache_key().as_str(),
            "categories:page=1&per_page=99999"
        );
    }

    #[test]
    fn resource_prefix_does_not_match_sibling_resources() {
        let key = ListQuery::new(Resource::ModifierCategories).cache_key();
        assert!(!key.starts_with(&CacheKey::resource_prefix(Resource::Modifiers)));
        assert!(key.starts_with(&CacheKey::resource_prefix(Resource::ModifierCategories)));
    }
}
