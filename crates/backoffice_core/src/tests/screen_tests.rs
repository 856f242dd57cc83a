use super::*;

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::protocol::{ListParams, UpdateSequenceRequest};
use tokio::sync::Notify;
use tokio_stream::StreamExt;

use crate::{
    events::NotificationLevel,
    filter::default_fields,
    memory::InMemoryBackend,
    normalize::ResponseShape,
    pagination::ALL_PAGE_SIZE,
    transport::BackofficeApi,
};

/// Wraps the in-memory backend and can hold chosen calls until released.
#[derive(Default)]
struct GatedApi {
    backend: InMemoryBackend,
    hold_page: Option<u32>,
    hold_updates: bool,
    entered: Notify,
    release: Notify,
}

impl GatedApi {
    fn holding_page(page: u32) -> Self {
        Self {
            hold_page: Some(page),
            ..Self::default()
        }
    }

    fn holding_updates() -> Self {
        Self {
            hold_updates: true,
            ..Self::default()
        }
    }

    async fn gate(&self) {
        self.entered.notify_one();
        self.release.notified().await;
    }
}

#[async_trait]
impl BackofficeApi for GatedApi {
    async fn fetch_list(
        &self,
        resource: Resource,
        params: &ListParams,
    ) -> Result<Value, TransportError> {
        if self.hold_page == Some(params.page) {
            self.gate().await;
        }
        self.backend.fetch_list(resource, params).await
    }

    async fn update_sequence(
        &self,
        resource: Resource,
        request: &UpdateSequenceRequest,
    ) -> Result<(), TransportError> {
        if self.hold_updates {
            self.gate().await;
        }
        self.backend.update_sequence(resource, request).await
    }

    async fn import_csv(
        &self,
        resource: Resource,
        upload: CsvUpload,
    ) -> Result<ImportSummary, TransportError> {
        self.backend.import_csv(resource, upload).await
    }
}

fn menu_rows() -> Vec<Value> {
    (1..=25)
        .map(|id| {
            json!({
                "id": id,
                "product_name": format!("Dish {id}"),
                "category_id": if id % 2 == 0 { 2 } else { 1 },
                "seq_no": id,
                "status": 1
            })
        })
        .collect()
}

fn screen_over(api: Arc<dyn BackofficeApi>, resource: Resource) -> Arc<ListScreen> {
    let orchestrator = DataFetchOrchestrator::new(api, Duration::ZERO);
    ListScreen::new(
        resource,
        &default_fields(resource),
        orchestrator,
        ScreenOptions::default(),
    )
}

async fn items_screen() -> (Arc<InMemoryBackend>, Arc<ListScreen>) {
    let backend = Arc::new(InMemoryBackend::new(ResponseShape::DataNamed));
    backend.insert_rows(Resource::Items, menu_rows()).await;
    let screen = screen_over(backend.clone(), Resource::Items);
    screen.refresh().await.expect("initial fetch");
    (backend, screen)
}

fn notifications(rx: &mut broadcast::Receiver<ScreenEvent>) -> Vec<Notification> {
    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        if let ScreenEvent::Notification(notification) = event {
            seen.push(notification);
        }
    }
    seen
}

#[tokio::test(start_paused = true)]
async fn typing_collapses_to_one_fetch_after_quiet_period() {
    let (backend, screen) = items_screen().await;
    screen.set_page(3).await.expect("page 3");
    let before = backend.fetch_calls().await.len();

    for typed in ["B", "Bu", "Bur", "Burg", "Burge", "Burger"] {
        screen
            .input_text("product_name", typed)
            .await
            .expect("input");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(backend.fetch_calls().await.len(), before);
    assert_eq!(
        screen.snapshot().pending_inputs.get("product_name").map(String::as_str),
        Some("Burger")
    );

    tokio::time::sleep(Duration::from_millis(600)).await;

    let calls = backend.fetch_calls().await;
    assert_eq!(calls.len(), before + 1);
    let last = calls.last().expect("fetch");
    assert_eq!(last.page, 1);
    assert_eq!(
        last.filters.get("product_name").map(String::as_str),
        Some("Burger")
    );
    let snapshot = screen.snapshot();
    assert_eq!(snapshot.query.page, 1);
    assert!(snapshot.pending_inputs.is_empty());
}

#[tokio::test]
async fn all_page_size_requests_first_page_with_sentinel() {
    let (backend, screen) = items_screen().await;
    screen.set_page(2).await.expect("page 2");

    screen.set_page_size(PageSize::All).await.expect("all");

    let last = backend.fetch_calls().await.pop().expect("fetch");
    assert_eq!((last.page, last.per_page), (1, ALL_PAGE_SIZE));
    let snapshot = screen.snapshot();
    assert_eq!(snapshot.result.items.len(), 25);
    assert_eq!(snapshot.total_pages(), 1);
}

#[tokio::test]
async fn select_filters_apply_immediately_and_reset_page() {
    let (backend, screen) = items_screen().await;
    screen.set_page(2).await.expect("page 2");

    screen.set_select("category_id", "2").await.expect("select");

    let last = backend.fetch_calls().await.pop().expect("fetch");
    assert_eq!(last.page, 1);
    assert_eq!(last.filters.get("category_id").map(String::as_str), Some("2"));
    let snapshot = screen.snapshot();
    assert_eq!(snapshot.result.total, 12);
    assert!(snapshot.has_next());

    let fetches = backend.fetch_calls().await.len();
    screen.set_select("category_id", "2").await.expect("same value");
    assert_eq!(backend.fetch_calls().await.len(), fetches);
}

#[tokio::test]
async fn dropping_onto_another_row_updates_sequence_and_refetches() {
    let backend = Arc::new(InMemoryBackend::new(ResponseShape::Named));
    backend
        .insert_rows(
            Resource::Modifiers,
            vec![
                json!({"id": 5, "modifier_name": "Cheese", "modifier_category_id": 1, "seq_no": 3}),
                json!({"id": 9, "modifier_name": "Bacon", "modifier_category_id": 1, "seq_no": 7}),
            ],
        )
        .await;
    let screen = screen_over(backend.clone(), Resource::Modifiers);
    screen.refresh().await.expect("initial fetch");
    let mut events = screen.subscribe_events();
    let fetches = backend.fetch_calls().await.len();

    screen.drag_start(RecordId(5)).await.expect("start");
    screen.drag_over(RecordId(9)).await.expect("over");
    let request = screen.release_drag().await.expect("drop").expect("commit");

    assert_eq!(
        backend.sequence_updates().await,
        vec![UpdateSequenceRequest {
            id: RecordId(5),
            new_seq_no: 7
        }]
    );
    assert_eq!(request.new_sequence_number, 7);
    assert_eq!(backend.fetch_calls().await.len(), fetches + 1);

    let snapshot = screen.snapshot();
    assert_eq!(snapshot.reorder, ReorderPhase::Idle);
    assert_eq!(snapshot.result.items[0].id, RecordId(9));
    assert_eq!(snapshot.result.items[1].id, RecordId(5));
    let seen = notifications(&mut events);
    assert!(seen
        .iter()
        .any(|notification| notification.level == NotificationLevel::Success));
}

#[tokio::test]
async fn dropping_a_row_on_itself_sends_nothing() {
    let (backend, screen) = items_screen().await;
    screen.drag_start(RecordId(3)).await.expect("start");
    screen.drag_over(RecordId(3)).await.expect("over");

    assert_eq!(screen.release_drag().await.expect("drop"), None);
    assert!(backend.sequence_updates().await.is_empty());
    assert_eq!(screen.snapshot().reorder, ReorderPhase::Idle);
}

#[tokio::test]
async fn failed_sequence_update_notifies_and_resyncs() {
    let (backend, screen) = items_screen().await;
    let mut events = screen.subscribe_events();
    backend
        .fail_next_update(TransportError::Network("connection reset".into()))
        .await;
    let fetches = backend.fetch_calls().await.len();

    screen.drag_start(RecordId(1)).await.expect("start");
    screen.drag_over(RecordId(3)).await.expect("over");
    let err = screen.release_drag().await.expect_err("update fails");

    assert!(matches!(err, ScreenError::Transport(TransportError::Network(_))));
    assert_eq!(backend.fetch_calls().await.len(), fetches + 1);
    assert_eq!(screen.snapshot().reorder, ReorderPhase::Idle);
    let seen = notifications(&mut events);
    assert!(seen
        .iter()
        .any(|notification| notification.level == NotificationLevel::Error));
}

#[tokio::test]
async fn second_drag_is_refused_while_committing() {
    let api = Arc::new(GatedApi::holding_updates());
    api.backend.insert_rows(Resource::Items, menu_rows()).await;
    let screen = screen_over(api.clone(), Resource::Items);
    screen.refresh().await.expect("initial fetch");

    screen.drag_start(RecordId(1)).await.expect("start");
    screen.drag_over(RecordId(3)).await.expect("over");
    let committing = tokio::spawn({
        let screen = Arc::clone(&screen);
        async move { screen.release_drag().await }
    });
    api.entered.notified().await;

    assert!(matches!(
        screen.drag_start(RecordId(5)).await,
        Err(ScreenError::Reorder(ReorderError::Busy))
    ));
    assert!(matches!(
        screen.snapshot().reorder,
        ReorderPhase::Committing { .. }
    ));

    api.release.notify_one();
    committing.await.expect("join").expect("commit");
    screen.drag_start(RecordId(5)).await.expect("free again");
}

#[tokio::test]
async fn fetch_failure_leaves_empty_list_and_warns() {
    let (backend, screen) = items_screen().await;
    let mut events = screen.subscribe_events();
    backend
        .fail_next_fetch(TransportError::Status {
            status: 500,
            message: "database unavailable".into(),
        })
        .await;

    assert!(screen.refresh().await.is_err());

    let snapshot = screen.snapshot();
    assert!(snapshot.result.is_empty());
    assert_eq!(snapshot.result.total, 0);
    assert!(!snapshot.loading);
    let seen = notifications(&mut events);
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].level, NotificationLevel::Warning);
}

#[tokio::test]
async fn auth_failures_are_handed_upward() {
    let (backend, screen) = items_screen().await;
    let mut events = screen.subscribe_events();
    backend
        .fail_next_fetch(TransportError::Unauthorized("token expired".into()))
        .await;

    let err = screen.refresh().await.expect_err("auth");
    assert!(matches!(err, ScreenError::Transport(TransportError::Unauthorized(_))));
    let event = events.try_recv().expect("event");
    assert!(matches!(
        event,
        ScreenEvent::AuthRequired {
            resource: Resource::Items,
            ..
        }
    ));
    assert!(notifications(&mut events).is_empty());
}

#[tokio::test]
async fn superseded_responses_are_not_applied() {
    let api = Arc::new(GatedApi::holding_page(2));
    api.backend.insert_rows(Resource::Items, menu_rows()).await;
    let screen = screen_over(api.clone(), Resource::Items);
    screen.refresh().await.expect("initial fetch");

    let slow = tokio::spawn({
        let screen = Arc::clone(&screen);
        async move { screen.set_page(2).await }
    });
    api.entered.notified().await;
    screen.set_page(3).await.expect("page 3");
    api.release.notify_one();
    slow.await.expect("join").expect("superseded is not an error");

    let snapshot = screen.snapshot();
    assert_eq!(snapshot.query.page, 3);
    assert_eq!(snapshot.result.items[0].id, RecordId(21));
}

#[tokio::test]
async fn responses_after_unmount_are_discarded() {
    let api = Arc::new(GatedApi::holding_page(2));
    api.backend.insert_rows(Resource::Items, menu_rows()).await;
    let screen = screen_over(api.clone(), Resource::Items);
    screen.refresh().await.expect("initial fetch");
    let before = screen.snapshot().result;
    let mut events = screen.subscribe_events();

    let pending = tokio::spawn({
        let screen = Arc::clone(&screen);
        async move { screen.set_page(2).await }
    });
    api.entered.notified().await;
    screen.unmount().await;
    api.release.notify_one();

    assert!(matches!(
        pending.await.expect("join"),
        Err(ScreenError::Unmounted(Resource::Items))
    ));
    let snapshot = screen.snapshot();
    assert!(!snapshot.mounted);
    assert_eq!(snapshot.result, before);
    assert!(events.try_recv().is_err());
    assert!(matches!(
        screen.refresh().await,
        Err(ScreenError::Unmounted(_))
    ));
}

#[tokio::test]
async fn sequence_update_resolving_after_unmount_is_discarded() {
    let api = Arc::new(GatedApi::holding_updates());
    api.backend.insert_rows(Resource::Items, menu_rows()).await;
    let screen = screen_over(api.clone(), Resource::Items);
    screen.refresh().await.expect("initial fetch");
    let before = screen.snapshot().result;
    let fetches = api.backend.fetch_calls().await.len();

    screen.drag_start(RecordId(1)).await.expect("start");
    screen.drag_over(RecordId(3)).await.expect("over");
    let mut events = screen.subscribe_events();
    let committing = tokio::spawn({
        let screen = Arc::clone(&screen);
        async move { screen.release_drag().await }
    });
    api.entered.notified().await;
    screen.unmount().await;
    api.release.notify_one();

    assert!(matches!(
        committing.await.expect("join"),
        Err(ScreenError::Unmounted(Resource::Items))
    ));
    assert_eq!(api.backend.sequence_updates().await.len(), 1);
    assert_eq!(api.backend.fetch_calls().await.len(), fetches);
    assert_eq!(screen.snapshot().result, before);
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn unmount_cancels_pending_debounce() {
    let (backend, screen) = items_screen().await;
    let before = backend.fetch_calls().await.len();

    screen
        .input_text("product_name", "Fries")
        .await
        .expect("input");
    screen.unmount().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(backend.fetch_calls().await.len(), before);
    assert!(screen.input_text("product_name", "x").await.is_err());
}

#[tokio::test]
async fn csv_import_invalidates_and_refetches() {
    let (backend, screen) = items_screen().await;
    let mut events = screen.subscribe_events();
    let fetches = backend.fetch_calls().await.len();

    let summary = screen
        .import_csv(CsvUpload::new(
            "items.csv",
            "product_name,category_id\nSoup,1\n,1\n",
        ))
        .await
        .expect("import");

    assert_eq!((summary.created, summary.failed), (1, 1));
    assert_eq!(backend.fetch_calls().await.len(), fetches + 1);
    assert_eq!(screen.snapshot().result.total, 26);
    let seen = notifications(&mut events);
    assert!(seen
        .iter()
        .any(|notification| notification.level == NotificationLevel::Warning
            && notification.message.contains("1 created")));
}

#[tokio::test]
async fn keyboard_reorder_goes_through_the_same_commit() {
    let (backend, screen) = items_screen().await;
    let rows = screen.snapshot().result.items;
    let request = ReorderRequest::between(&rows[0], &rows[2])
        .expect("same scope")
        .expect("distinct rows");

    screen.reorder(request).await.expect("reorder");

    assert_eq!(
        backend.sequence_updates().await,
        vec![UpdateSequenceRequest {
            id: RecordId(1),
            new_seq_no: 3
        }]
    );
}

#[tokio::test]
async fn event_stream_delivers_events_and_ends_with_the_screen() {
    let (backend, screen) = items_screen().await;
    let stream = screen.event_stream();
    backend
        .fail_next_fetch(TransportError::Network("connection reset".into()))
        .await;

    assert!(screen.refresh().await.is_err());
    screen.set_page(2).await.expect("page 2");
    drop(screen);

    let events: Vec<_> = stream.collect().await;
    assert_eq!(events.len(), 2);
    assert!(matches!(
        &events[0],
        Ok(ScreenEvent::Notification(notification))
            if notification.level == NotificationLevel::Warning
    ));
    assert!(matches!(
        &events[1],
        Ok(ScreenEvent::ListUpdated {
            resource: Resource::Items,
            ..
        })
    ));
}
