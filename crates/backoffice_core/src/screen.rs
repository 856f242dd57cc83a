//! One mounted list screen: filters, pagination and reordering composed over
//! the fetch orchestrator.
//!
//! State changes are published twice: a [`ScreenSnapshot`] on a watch channel
//! for whatever renders the screen, and [`ScreenEvent`]s on a broadcast
//! channel for notifications. Every fetch is numbered and only the latest one
//! is applied; nothing is applied once the screen is unmounted.

use std::{
    collections::BTreeMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use shared::{
    domain::{RecordId, Resource},
    protocol::ImportSummary,
};
use tokio::sync::{broadcast, watch, Mutex};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use crate::{
    config::ConsoleSettings,
    debounce::{DebounceToken, DEFAULT_QUIET_PERIOD},
    error::{ScreenError, TransportError},
    events::{Notification, ScreenEvent},
    filter::{FilterController, FilterError, FilterField},
    normalize::ListResult,
    orchestrator::DataFetchOrchestrator,
    pagination::{PageSize, Pagination},
    query::ListQuery,
    reorder::{DropOutcome, ReorderEngine, ReorderError, ReorderPhase, ReorderRequest},
    transport::CsvUpload,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScreenOptions {
    pub debounce: Duration,
    pub page_size: PageSize,
}

impl Default for ScreenOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_QUIET_PERIOD,
            page_size: PageSize::default(),
        }
    }
}

impl ScreenOptions {
    pub fn from_settings(settings: &ConsoleSettings) -> Self {
        Self {
            debounce: settings.debounce(),
            page_size: settings.page_size(),
        }
    }
}

/// What a renderer needs to draw the screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenSnapshot {
    pub resource: Resource,
    pub query: ListQuery,
    pub result: ListResult,
    pub loading: bool,
    /// Raw text inputs still waiting for their quiet period.
    pub pending_inputs: BTreeMap<String, String>,
    pub reorder: ReorderPhase,
    pub mounted: bool,
}

impl ScreenSnapshot {
    pub fn total_pages(&self) -> u32 {
        self.pagination().total_pages(self.result.total)
    }

    pub fn has_next(&self) -> bool {
        self.pagination().has_next(self.result.total)
    }

    pub fn has_previous(&self) -> bool {
        self.pagination().has_previous()
    }

    fn pagination(&self) -> Pagination {
        let mut pagination = Pagination::new(self.query.page_size);
        pagination.set_page(self.query.page);
        pagination
    }
}

struct ScreenState {
    filters: FilterController,
    pagination: Pagination,
    reorder: ReorderEngine,
    result: ListResult,
    /// Number of the most recently issued fetch.
    issued: u64,
    loading: bool,
}

impl ScreenState {
    fn query(&self, resource: Resource) -> ListQuery {
        ListQuery::from_parts(resource, &self.pagination, self.filters.to_filter_map())
    }
}

pub struct ListScreen {
    resource: Resource,
    orchestrator: DataFetchOrchestrator,
    inner: Mutex<ScreenState>,
    mounted: AtomicBool,
    events: broadcast::Sender<ScreenEvent>,
    snapshot: watch::Sender<ScreenSnapshot>,
}

impl ListScreen {
    /// Builds a mounted screen without fetching; call [`ListScreen::refresh`]
    /// for the first page.
    pub fn new(
        resource: Resource,
        fields: &[FilterField],
        orchestrator: DataFetchOrchestrator,
        options: ScreenOptions,
    ) -> Arc<Self> {
        let state = ScreenState {
            filters: FilterController::new(fields, options.debounce),
            pagination: Pagination::new(options.page_size),
            reorder: ReorderEngine::new(),
            result: ListResult::empty(),
            issued: 0,
            loading: false,
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (snapshot, _) = watch::channel(ScreenSnapshot {
            resource,
            query: state.query(resource),
            result: ListResult::empty(),
            loading: false,
            pending_inputs: BTreeMap::new(),
            reorder: ReorderPhase::Idle,
            mounted: true,
        });
        Arc::new(Self {
            resource,
            orchestrator,
            inner: Mutex::new(state),
            mounted: AtomicBool::new(true),
            events,
            snapshot,
        })
    }

    pub fn resource(&self) -> Resource {
        self.resource
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ScreenEvent> {
        self.events.subscribe()
    }

    /// Same events as [`ListScreen::subscribe_events`] as a `Stream`.
    pub fn event_stream(&self) -> BroadcastStream<ScreenEvent> {
        BroadcastStream::new(self.events.subscribe())
    }

    pub fn snapshot(&self) -> ScreenSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe_snapshot(&self) -> watch::Receiver<ScreenSnapshot> {
        self.snapshot.subscribe()
    }

    fn ensure_mounted(&self) -> Result<(), ScreenError> {
        if self.is_mounted() {
            Ok(())
        } else {
            Err(ScreenError::Unmounted(self.resource))
        }
    }

    fn publish(&self, state: &ScreenState) {
        self.snapshot.send_replace(ScreenSnapshot {
            resource: self.resource,
            query: state.query(self.resource),
            result: state.result.clone(),
            loading: state.loading,
            pending_inputs: state.filters.state().pending_inputs().clone(),
            reorder: state.reorder.phase(),
            mounted: self.is_mounted(),
        });
    }

    fn emit(&self, event: ScreenEvent) {
        let _ = self.events.send(event);
    }

    fn notify(&self, notification: Notification) {
        self.emit(ScreenEvent::Notification(notification));
    }

    /// Auth failures go to the auth layer; everything else becomes a
    /// notification built by `describe`.
    fn report_failure(&self, err: &TransportError, describe: impl FnOnce() -> Notification) {
        if err.is_auth() {
            warn!(resource = %self.resource, error = %err, "authentication required");
            self.emit(ScreenEvent::AuthRequired {
                resource: self.resource,
                message: err.to_string(),
            });
        } else {
            self.notify(describe());
        }
    }

    /// Records a keystroke. The filter is applied, and the list refetched
    /// from page 1, once the field has been quiet for the debounce period.
    pub async fn input_text(
        self: &Arc<Self>,
        key: &str,
        value: &str,
    ) -> Result<DebounceToken, ScreenError> {
        self.ensure_mounted()?;
        let mut state = self.inner.lock().await;
        let screen = Arc::downgrade(self);
        let field = key.to_string();
        let token = state.filters.input_text(key, value, move |token| async move {
            if let Some(screen) = screen.upgrade() {
                screen.apply_debounced(&field, token).await;
            }
        })?;
        self.publish(&state);
        Ok(token)
    }

    async fn apply_debounced(&self, key: &str, token: DebounceToken) {
        let changed = {
            let mut state = self.inner.lock().await;
            if !self.is_mounted() {
                return;
            }
            match state.filters.commit_text(key, token) {
                Ok(changed) => {
                    if changed {
                        state.pagination.reset_page();
                    }
                    self.publish(&state);
                    changed
                }
                Err(err) => {
                    warn!(resource = %self.resource, field = key, error = %err, "debounced filter rejected");
                    return;
                }
            }
        };
        if changed {
            if let Err(err) = self.refresh().await {
                debug!(resource = %self.resource, error = %err, "debounced refresh failed");
            }
        }
    }

    /// Applies a pending text input right away, skipping the quiet period.
    pub async fn flush_text(&self, key: &str) -> Result<(), ScreenError> {
        self.update_filters(|filters| filters.flush_text(key)).await
    }

    pub async fn set_select(&self, key: &str, value: &str) -> Result<(), ScreenError> {
        self.update_filters(|filters| filters.set_select(key, value))
            .await
    }

    pub async fn clear_filter(&self, key: &str) -> Result<(), ScreenError> {
        self.update_filters(|filters| filters.clear(key)).await
    }

    pub async fn clear_filters(&self) -> Result<(), ScreenError> {
        self.update_filters(|filters| Ok(filters.reset())).await
    }

    /// Any change to the applied filters resets to page 1 and refetches.
    async fn update_filters(
        &self,
        change: impl FnOnce(&mut FilterController) -> Result<bool, FilterError>,
    ) -> Result<(), ScreenError> {
        let changed = {
            let mut state = self.inner.lock().await;
            self.ensure_mounted()?;
            let changed = change(&mut state.filters)?;
            if changed {
                state.pagination.reset_page();
            }
            self.publish(&state);
            changed
        };
        if changed {
            self.refresh().await?;
        }
        Ok(())
    }

    pub async fn set_page(&self, page: u32) -> Result<(), ScreenError> {
        {
            let mut state = self.inner.lock().await;
            self.ensure_mounted()?;
            state.pagination.set_page(page);
        }
        self.refresh().await
    }

    pub async fn set_page_size(&self, page_size: PageSize) -> Result<(), ScreenError> {
        {
            let mut state = self.inner.lock().await;
            self.ensure_mounted()?;
            state.pagination.set_page_size(page_size);
        }
        self.refresh().await
    }

    /// Fetches the current query. A failed fetch leaves an empty list behind,
    /// publishes a warning (or `AuthRequired`) and is returned as an error.
    /// A response overtaken by a newer fetch is dropped silently.
    pub async fn refresh(&self) -> Result<(), ScreenError> {
        let (fetch, query) = {
            let mut state = self.inner.lock().await;
            self.ensure_mounted()?;
            state.issued += 1;
            state.loading = true;
            self.publish(&state);
            (state.issued, state.query(self.resource))
        };

        let outcome = self.orchestrator.load(&query).await;

        let mut state = self.inner.lock().await;
        if !self.is_mounted() {
            debug!(resource = %self.resource, fetch, "discarding response after unmount");
            return Err(ScreenError::Unmounted(self.resource));
        }
        if fetch != state.issued {
            debug!(resource = %self.resource, fetch, latest = state.issued, "discarding superseded response");
            return Ok(());
        }
        state.loading = false;
        match outcome {
            Ok(result) => {
                state.result = result.clone();
                self.publish(&state);
                self.emit(ScreenEvent::ListUpdated {
                    resource: self.resource,
                    result,
                });
                Ok(())
            }
            Err(err) => {
                state.result = ListResult::empty();
                self.publish(&state);
                self.report_failure(&err, || {
                    Notification::warning(format!("Could not load {}: {err}", self.resource))
                });
                Err(err.into())
            }
        }
    }

    pub async fn drag_start(&self, source: RecordId) -> Result<(), ScreenError> {
        self.with_reorder(|engine| engine.drag_start(source)).await
    }

    pub async fn drag_over(&self, target: RecordId) -> Result<(), ScreenError> {
        self.with_reorder(|engine| engine.drag_over(target)).await
    }

    pub async fn drag_cancel(&self) -> Result<(), ScreenError> {
        self.with_reorder(|engine| {
            engine.drag_cancel();
            Ok(())
        })
        .await
    }

    async fn with_reorder(
        &self,
        step: impl FnOnce(&mut ReorderEngine) -> Result<(), ReorderError>,
    ) -> Result<(), ScreenError> {
        let mut state = self.inner.lock().await;
        self.ensure_mounted()?;
        let outcome = step(&mut state.reorder);
        self.publish(&state);
        Ok(outcome?)
    }

    /// Finishes the drag against the rows on screen. `Ok(None)` when the
    /// drop did not call for a server update.
    pub async fn release_drag(&self) -> Result<Option<ReorderRequest>, ScreenError> {
        let outcome = {
            let mut state = self.inner.lock().await;
            self.ensure_mounted()?;
            let state = &mut *state;
            let outcome = state.reorder.drop(&state.result.items);
            self.publish(state);
            outcome?
        };
        self.commit(outcome).await
    }

    /// Moves a row without a drag gesture.
    pub async fn reorder(&self, request: ReorderRequest) -> Result<Option<ReorderRequest>, ScreenError> {
        let outcome = {
            let mut state = self.inner.lock().await;
            self.ensure_mounted()?;
            let outcome = state.reorder.submit(request);
            self.publish(&state);
            outcome?
        };
        self.commit(outcome).await
    }

    /// Sends the sequence update. Either way the owning resource is
    /// invalidated and refetched so the list shows the server's order.
    async fn commit(&self, outcome: DropOutcome) -> Result<Option<ReorderRequest>, ScreenError> {
        let request = match outcome {
            DropOutcome::NoOp => return Ok(None),
            DropOutcome::Commit(request) => request,
        };
        info!(
            resource = %self.resource,
            source = %request.source_id,
            target = %request.target_id,
            new_seq_no = request.new_sequence_number,
            scope = %request.scope,
            "committing reorder"
        );
        let sent = self
            .orchestrator
            .api()
            .update_sequence(self.resource, &request.to_wire())
            .await;

        self.orchestrator.invalidate_resource(self.resource).await;
        {
            let mut state = self.inner.lock().await;
            if !self.is_mounted() {
                debug!(resource = %self.resource, "discarding reorder response after unmount");
                return Err(ScreenError::Unmounted(self.resource));
            }
            state.reorder.finish();
            self.publish(&state);
        }

        match sent {
            Ok(()) => {
                self.notify(Notification::success(format!("{} order updated", self.resource)));
                self.emit(ScreenEvent::SequenceUpdated {
                    resource: self.resource,
                    request,
                });
                self.resync().await;
                Ok(Some(request))
            }
            Err(err) => {
                warn!(resource = %self.resource, error = %err, "sequence update failed");
                self.report_failure(&err, || {
                    Notification::error(format!("Failed to reorder {}: {err}", self.resource))
                });
                self.resync().await;
                Err(err.into())
            }
        }
    }

    /// Refetch whose failure has already been reported by `refresh`.
    async fn resync(&self) {
        if let Err(err) = self.refresh().await {
            debug!(resource = %self.resource, error = %err, "resync after mutation failed");
        }
    }

    pub async fn import_csv(&self, upload: CsvUpload) -> Result<ImportSummary, ScreenError> {
        self.ensure_mounted()?;
        let filename = upload.filename.clone();
        let outcome = self
            .orchestrator
            .api()
            .import_csv(self.resource, upload)
            .await;
        self.ensure_mounted()?;

        match outcome {
            Ok(summary) => {
                info!(
                    resource = %self.resource,
                    %filename,
                    created = summary.created,
                    updated = summary.updated,
                    failed = summary.failed,
                    "import finished"
                );
                let message = format!(
                    "Imported {}: {} created, {} updated, {} failed",
                    self.resource, summary.created, summary.updated, summary.failed
                );
                self.notify(if summary.failed > 0 {
                    Notification::warning(message)
                } else {
                    Notification::success(message)
                });
                self.emit(ScreenEvent::ImportFinished {
                    resource: self.resource,
                    summary: summary.clone(),
                });
                self.orchestrator.invalidate_resource(self.resource).await;
                self.resync().await;
                Ok(summary)
            }
            Err(err) => {
                self.report_failure(&err, || {
                    Notification::error(format!("Import of {filename} failed: {err}"))
                });
                Err(err.into())
            }
        }
    }

    /// Stops the screen: pending debounce timers are cancelled and any
    /// response arriving later is discarded.
    pub async fn unmount(&self) {
        if !self.mounted.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut state = self.inner.lock().await;
        let cancelled = state.filters.cancel_pending();
        state.reorder.drag_cancel();
        state.loading = false;
        self.publish(&state);
        debug!(resource = %self.resource, cancelled, "screen unmounted");
    }
}

#[cfg(test)]
#[path = "tests/screen_tests.rs"]
mod tests;
