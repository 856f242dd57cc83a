use super::*;

use crate::normalize::ParentRef;
use shared::domain::RecordStatus;

fn row(id: i64, seq: i64, parent: Option<i64>) -> CanonicalRow {
    CanonicalRow {
        id: RecordId(id),
        name: format!("row-{id}"),
        code: String::new(),
        description: String::new(),
        sequence_number: seq,
        parent: ParentRef {
            id: parent.map(RecordId),
            name: "Toppings".into(),
        },
        status: RecordStatus::Active,
    }
}

fn rows() -> Vec<CanonicalRow> {
    vec![row(5, 3, Some(1)), row(9, 7, Some(1)), row(11, 1, Some(2))]
}

#[test]
fn drop_onto_other_row_commits_target_sequence() {
    let mut engine = ReorderEngine::new();
    engine.drag_start(RecordId(5)).expect("start");
    engine.drag_over(RecordId(11)).expect("over");
    engine.drag_over(RecordId(9)).expect("over again");

    let outcome = engine.drop(&rows()).expect("drop");
    let DropOutcome::Commit(request) = outcome else {
        panic!("expected commit, got {outcome:?}");
    };
    assert_eq!(request.source_id, RecordId(5));
    assert_eq!(request.target_id, RecordId(9));
    assert_eq!(request.new_sequence_number, 7);
    assert_eq!(request.scope, SiblingScope::within(RecordId(1)));
    assert_eq!(
        request.to_wire(),
        UpdateSequenceRequest {
            id: RecordId(5),
            new_seq_no: 7
        }
    );
    assert!(engine.is_committing());
}

#[test]
fn drop_onto_self_is_noop() {
    let mut engine = ReorderEngine::new();
    engine.drag_start(RecordId(5)).expect("start");
    engine.drag_over(RecordId(5)).expect("over");
    assert_eq!(engine.drop(&rows()), Ok(DropOutcome::NoOp));
    assert_eq!(engine.phase(), ReorderPhase::Idle);
}

#[test]
fn drop_without_target_is_noop() {
    let mut engine = ReorderEngine::new();
    engine.drag_start(RecordId(5)).expect("start");
    assert_eq!(engine.drop(&rows()), Ok(DropOutcome::NoOp));
}

#[test]
fn cross_scope_drop_is_rejected_and_resets() {
    let mut engine = ReorderEngine::new();
    engine.drag_start(RecordId(5)).expect("start");
    engine.drag_over(RecordId(11)).expect("over");
    assert!(matches!(
        engine.drop(&rows()),
        Err(ReorderError::CrossScope { .. })
    ));
    assert_eq!(engine.phase(), ReorderPhase::Idle);
}

#[test]
fn unknown_rows_are_rejected() {
    let mut engine = ReorderEngine::new();
    engine.drag_start(RecordId(5)).expect("start");
    engine.drag_over(RecordId(404)).expect("over");
    assert_eq!(
        engine.drop(&rows()),
        Err(ReorderError::UnknownRow(RecordId(404)))
    );
}

#[test]
fn committing_blocks_new_drags_until_finished() {
    let mut engine = ReorderEngine::new();
    engine.drag_start(RecordId(5)).expect("start");
    engine.drag_over(RecordId(9)).expect("over");
    engine.drop(&rows()).expect("drop");

    assert_eq!(engine.drag_start(RecordId(9)), Err(ReorderError::Busy));
    assert_eq!(engine.drag_over(RecordId(9)), Err(ReorderError::Busy));
    engine.drag_cancel();
    assert!(engine.is_committing());

    let finished = engine.finish().expect("request");
    assert_eq!(finished.source_id, RecordId(5));
    assert_eq!(engine.phase(), ReorderPhase::Idle);
    engine.drag_start(RecordId(9)).expect("start after finish");
}

#[test]
fn drag_over_requires_active_drag() {
    let mut engine = ReorderEngine::new();
    assert_eq!(engine.drag_over(RecordId(1)), Err(ReorderError::NotDragging));
    assert_eq!(engine.drop(&rows()), Err(ReorderError::NotDragging));
}

#[test]
fn submit_bypasses_gestures_but_respects_lock() {
    let mut engine = ReorderEngine::new();
    let list = rows();
    let request = ReorderRequest::between(&list[1], &list[0])
        .expect("same scope")
        .expect("distinct rows");
    assert_eq!(request.new_sequence_number, 3);

    assert_eq!(engine.submit(request), Ok(DropOutcome::Commit(request)));
    assert_eq!(engine.submit(request), Err(ReorderError::Busy));
    assert_eq!(engine.finish(), Some(request));
    assert_eq!(engine.finish(), None);
}
