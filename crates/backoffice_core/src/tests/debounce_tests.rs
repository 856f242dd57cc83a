use super::*;

use tokio::sync::mpsc;

#[tokio::test(start_paused = true)]
async fn rapid_schedules_collapse_to_last_value() {
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut debouncer = Debouncer::new(Duration::from_millis(500));

    for value in ["B", "Bu", "Bur", "Burg", "Burger"] {
        let tx = tx.clone();
        debouncer.schedule(move |token| async move {
            let _ = tx.send((token, value));
        });
        tokio::time::advance(Duration::from_millis(60)).await;
    }
    assert!(debouncer.is_pending());

    tokio::time::sleep(Duration::from_millis(600)).await;

    let (token, value) = rx.try_recv().expect("one firing");
    assert_eq!(value, "Burger");
    assert!(debouncer.accept(token));
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn nothing_fires_before_quiet_period() {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceToken>();
    let mut debouncer = Debouncer::new(Duration::from_millis(500));
    debouncer.schedule(move |token| async move {
        let _ = tx.send(token);
    });

    tokio::time::sleep(Duration::from_millis(499)).await;
    assert!(rx.try_recv().is_err());

    tokio::time::sleep(Duration::from_millis(2)).await;
    assert!(rx.try_recv().is_ok());
}

#[tokio::test(start_paused = true)]
async fn cancel_prevents_firing() {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceToken>();
    let mut debouncer = Debouncer::default();
    debouncer.schedule(move |token| async move {
        let _ = tx.send(token);
    });
    assert!(debouncer.cancel());
    assert!(!debouncer.cancel());

    tokio::time::sleep(DEFAULT_QUIET_PERIOD * 2).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn dropping_debouncer_cancels_timer() {
    let (tx, mut rx) = mpsc::unbounded_channel::<DebounceToken>();
    {
        let mut debouncer = Debouncer::default();
        debouncer.schedule(move |token| async move {
            let _ = tx.send(token);
        });
    }
    tokio::time::sleep(DEFAULT_QUIET_PERIOD * 2).await;
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn superseded_token_is_rejected() {
    let mut debouncer = Debouncer::new(Duration::from_millis(10));
    let first = debouncer.schedule(|_| async {});
    let second = debouncer.schedule(|_| async {});

    assert!(!debouncer.accept(first));
    assert!(debouncer.accept(second));
    // A token is only honored once.
    assert!(!debouncer.accept(second));
}
