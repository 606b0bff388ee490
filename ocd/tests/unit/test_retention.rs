//! Retention worker tests

use std::sync::Arc;
use std::time::Duration;

use ocd_gui::workers::retention;
use tokio::sync::oneshot;
use tokio_test::assert_ok;

use crate::common::app_state;

#[tokio::test]
async fn test_worker_evicts_abandoned_sessions() {
    let app = app_state("true\n");
    let broker = app.broker.clone();
    broker.start("/no/such/folder").await;
    assert_eq!(broker.len().await, 1);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let worker_broker = Arc::clone(&broker);
    let worker = tokio::spawn(async move {
        let options = retention::Options {
            retention: Duration::ZERO,
            interval: Duration::from_millis(10),
        };
        retention::run(
            &options,
            &worker_broker,
            tokio::time::sleep,
            Box::pin(async move {
                let _ = stop_rx.await;
            }),
        )
        .await;
    });

    assert_ok!(
        tokio::time::timeout(Duration::from_secs(5), async {
            while !broker.is_empty().await {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
    );

    let _ = stop_tx.send(());
    assert_ok!(assert_ok!(
        tokio::time::timeout(Duration::from_secs(5), worker).await
    ));
}

#[tokio::test]
async fn test_worker_stops_on_shutdown() {
    let app = app_state("true\n");
    let options = retention::Options::default();

    let run = retention::run(
        &options,
        &app.broker,
        tokio::time::sleep,
        Box::pin(async {}),
    );
    assert_ok!(tokio::time::timeout(Duration::from_secs(1), run).await);
}
