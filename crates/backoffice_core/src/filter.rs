//! Per-screen filter values.
//!
//! Text fields go through a [`Debouncer`] before they are applied; select
//! fields (dropdowns) apply immediately. Only applied values reach the
//! outgoing [`ListQuery`](crate::query::ListQuery).

use std::{
    collections::{BTreeMap, HashMap},
    future::Future,
    time::Duration,
};

use shared::domain::Resource;
use thiserror::Error;
use tracing::trace;

use crate::debounce::{DebounceToken, Debouncer};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("unknown filter field '{0}'")]
    UnknownField(String),
    #[error("filter field '{key}' is a {actual:?} field")]
    WrongKind { key: String, actual: FilterKind },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Free text, debounced.
    Text,
    /// Dropdown value, applied immediately.
    Select,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterField {
    pub key: String,
    pub kind: FilterKind,
}

impl FilterField {
    pub fn text(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FilterKind::Text,
        }
    }

    pub fn select(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: FilterKind::Select,
        }
    }
}

/// Filter fields each resource screen exposes. Keys are the backend's query
/// parameter names.
pub fn default_fields(resource: Resource) -> Vec<FilterField> {
    match resource {
        Resource::Items => vec![
            FilterField::text("product_name"),
            FilterField::text("barcode"),
            FilterField::select("category_id"),
            FilterField::select("status"),
        ],
        Resource::Categories => vec![
            FilterField::text("category_name"),
            FilterField::text("seq_no"),
            FilterField::select("status"),
        ],
        Resource::Modifiers => vec![
            FilterField::text("modifier_name"),
            FilterField::select("modifier_category_id"),
            FilterField::select("status"),
        ],
        Resource::ModifierCategories => vec![
            FilterField::text("modifier_category"),
            FilterField::select("status"),
        ],
        Resource::Customers => vec![
            FilterField::text("customer_name"),
            FilterField::text("phone"),
            FilterField::select("status"),
        ],
        Resource::Promotions => vec![
            FilterField::text("promotion_name"),
            FilterField::select("status"),
        ],
        Resource::Tags => vec![FilterField::text("tag_name")],
    }
}

/// Raw and applied filter values, without any timers.
#[derive(Debug, Clone, Default)]
pub struct FilterState {
    kinds: BTreeMap<String, FilterKind>,
    pending: BTreeMap<String, String>,
    applied: BTreeMap<String, String>,
}

impl FilterState {
    pub fn new(fields: &[FilterField]) -> Self {
        Self {
            kinds: fields
                .iter()
                .map(|field| (field.key.clone(), field.kind))
                .collect(),
            pending: BTreeMap::new(),
            applied: BTreeMap::new(),
        }
    }

    fn expect_kind(&self, key: &str, expected: FilterKind) -> Result<(), FilterError> {
        match self.kinds.get(key) {
            None => Err(FilterError::UnknownField(key.to_string())),
            Some(actual) if *actual != expected => Err(FilterError::WrongKind {
                key: key.to_string(),
                actual: *actual,
            }),
            Some(_) => Ok(()),
        }
    }

    pub fn kind(&self, key: &str) -> Option<FilterKind> {
        self.kinds.get(key).copied()
    }

    /// Records what the user typed. Nothing is applied yet.
    pub fn input_text(&mut self, key: &str, value: &str) -> Result<(), FilterError> {
        self.expect_kind(key, FilterKind::Text)?;
        self.pending.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Applies the pending input of `key`. Returns whether the applied value
    /// changed.
    pub fn commit_text(&mut self, key: &str) -> Result<bool, FilterError> {
        self.expect_kind(key, FilterKind::Text)?;
        let Some(raw) = self.pending.remove(key) else {
            return Ok(false);
        };
        Ok(self.apply(key, raw.trim()))
    }

    pub fn set_select(&mut self, key: &str, value: &str) -> Result<bool, FilterError> {
        self.expect_kind(key, FilterKind::Select)?;
        Ok(self.apply(key, value.trim()))
    }

    pub fn clear(&mut self, key: &str) -> Result<bool, FilterError> {
        if !self.kinds.contains_key(key) {
            return Err(FilterError::UnknownField(key.to_string()));
        }
        self.pending.remove(key);
        Ok(self.applied.remove(key).is_some())
    }

    /// Drops every pending and applied value. Returns whether anything
    /// applied was removed.
    pub fn reset(&mut self) -> bool {
        self.pending.clear();
        let had_applied = !self.applied.is_empty();
        self.applied.clear();
        had_applied
    }

    fn apply(&mut self, key: &str, value: &str) -> bool {
        if value.is_empty() {
            return self.applied.remove(key).is_some();
        }
        match self.applied.get(key) {
            Some(current) if current == value => false,
            _ => {
                self.applied.insert(key.to_string(), value.to_string());
                true
            }
        }
    }

    pub fn applied(&self, key: &str) -> Option<&str> {
        self.applied.get(key).map(String::as_str)
    }

    pub fn pending_inputs(&self) -> &BTreeMap<String, String> {
        &self.pending
    }

    /// Flattened applied values; empty values never appear.
    pub fn to_filter_map(&self) -> BTreeMap<String, String> {
        self.applied.clone()
    }
}

/// [`FilterState`] plus one debouncer per text field.
pub struct FilterController {
    state: FilterState,
    debouncers: HashMap<String, Debouncer>,
    quiet: Duration,
}

impl FilterController {
    pub fn new(fields: &[FilterField], quiet: Duration) -> Self {
        Self {
            state: FilterState::new(fields),
            debouncers: HashMap::new(),
            quiet,
        }
    }

    pub fn state(&self) -> &FilterState {
        &self.state
    }

    /// Records the input and (re)arms the field's timer. `on_quiet` receives
    /// the token to hand back to [`FilterController::commit_text`].
    pub fn input_text<F, Fut>(
        &mut self,
        key: &str,
        value: &str,
        on_quiet: F,
    ) -> Result<DebounceToken, FilterError>
    where
        F: FnOnce(DebounceToken) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.state.input_text(key, value)?;
        let quiet = self.quiet;
        let debouncer = self
            .debouncers
            .entry(key.to_string())
            .or_insert_with(|| Debouncer::new(quiet));
        let token = debouncer.schedule(on_quiet);
        trace!(field = key, ?token, "debounce armed");
        Ok(token)
    }

    /// Applies the pending text when `token` is still the field's latest.
    /// Returns whether the applied filters changed.
    pub fn commit_text(&mut self, key: &str, token: DebounceToken) -> Result<bool, FilterError> {
        let accepted = self
            .debouncers
            .get_mut(key)
            .is_some_and(|debouncer| debouncer.accept(token));
        if !accepted {
            trace!(field = key, ?token, "stale debounce firing ignored");
            return Ok(false);
        }
        self.state.commit_text(key)
    }

    /// Applies a pending text value right away (e.g. the user pressed enter).
    pub fn flush_text(&mut self, key: &str) -> Result<bool, FilterError> {
        if let Some(debouncer) = self.debouncers.get_mut(key) {
            debouncer.cancel();
        }
        self.state.commit_text(key)
    }

    pub fn set_select(&mut self, key: &str, value: &str) -> Result<bool, FilterError> {
        self.state.set_select(key, value)
    }

    pub fn clear(&mut self, key: &str) -> Result<bool, FilterError> {
        if let Some(debouncer) = self.debouncers.get_mut(key) {
            debouncer.cancel();
        }
        self.state.clear(key)
    }

    pub fn reset(&mut self) -> bool {
        self.cancel_pending();
        self.state.reset()
    }

    /// Stops every armed timer; pending raw inputs stay visible but are not
    /// applied.
    pub fn cancel_pending(&mut self) -> usize {
        self.debouncers
            .values_mut()
            .filter_map(|debouncer| debouncer.cancel().then_some(()))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn has_pending_timers(&self) -> bool {
        self.debouncers.values().any(Debouncer::is_pending)
    }

    pub fn to_filter_map(&self) -> BTreeMap<String, String> {
        self.state.to_filter_map()
    }
}

#[cfg(test)]
#[path = "tests/filter_tests.rs"]
mod tests;
