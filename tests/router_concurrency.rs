//! Concurrency tests for [`CanaryRouter`].
//!
//! Every model here is a [`ConstantModel`] that predicts its own URI, so a
//! response whose predictions disagree with its `model_uri` would expose a
//! torn read of the slot state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_canary_gateway::{CanaryRouter, ConstantModel, GatewayError, SlotName, StaticLoader};

const VERSIONS: usize = 8;

fn uri(v: usize) -> String {
    format!("models:/churn/{v}")
}

fn loader(delay: Duration) -> Arc<StaticLoader> {
    let loader = (1..=VERSIONS).fold(StaticLoader::new(), |l, v| {
        l.with_model(uri(v), Arc::new(ConstantModel::new(uri(v))))
    });
    Arc::new(loader.with_delay(delay))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_predictions_always_match_reported_uri_under_churn() {
    let router = Arc::new(
        CanaryRouter::bootstrap(loader(Duration::from_millis(1)), Some(uri(1).as_str()), 0.5).await,
    );
    let stop = Arc::new(AtomicBool::new(false));

    let writer = {
        let router = Arc::clone(&router);
        let stop = Arc::clone(&stop);
        tokio::spawn(async move {
            let mut v = 1;
            while !stop.load(Ordering::Relaxed) {
                v = v % VERSIONS + 1;
                router.stage_next(&uri(v)).await.expect("stage");
                if v % 2 == 0 {
                    router.promote_next().expect("promote");
                }
            }
        })
    };

    let readers: Vec<_> = (0..8)
        .map(|_| {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                let mut seen = [0usize; 2];
                for _ in 0..500 {
                    let out = router
                        .predict(&json!([[1.0], [2.0], [3.0]]))
                        .await
                        .expect("both slots stay loaded");
                    for value in &out.predictions {
                        assert_eq!(value, &json!(out.model_uri), "torn slot read");
                    }
                    seen[matches!(out.used, SlotName::Next) as usize] += 1;
                    tokio::task::yield_now().await;
                }
                seen
            })
        })
        .collect();

    let mut totals = [0usize; 2];
    for reader in readers {
        let seen = reader.await.expect("reader task");
        totals[0] += seen[0];
        totals[1] += seen[1];
    }
    stop.store(true, Ordering::Relaxed);
    writer.await.expect("writer task");

    assert_eq!(totals[0] + totals[1], 8 * 500);
    assert!(totals[0] > 0 && totals[1] > 0, "both slots should serve at p=0.5");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_slow_stage_does_not_block_predictions() {
    let router = Arc::new(
        CanaryRouter::bootstrap(loader(Duration::from_millis(500)), Some(uri(1).as_str()), 1.0)
            .await,
    );

    let stage = {
        let router = Arc::clone(&router);
        tokio::spawn(async move { router.stage_next(&uri(2)).await })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    let started = std::time::Instant::now();
    for _ in 0..200 {
        let out = router.predict(&json!([[0.0]])).await.expect("predict");
        assert_eq!(out.model_uri, uri(1));
    }
    assert!(
        started.elapsed() < Duration::from_millis(400),
        "predictions waited on a model load"
    );

    stage.await.expect("stage task").expect("stage");
    assert_eq!(router.health().next_model_uri, Some(uri(2)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_promotes_and_probability_updates_stay_consistent() {
    let router = Arc::new(
        CanaryRouter::bootstrap(loader(Duration::ZERO), Some(uri(1).as_str()), 1.0).await,
    );
    router.stage_next(&uri(3)).await.expect("stage");

    let tasks: Vec<_> = (0..16)
        .map(|i| {
            let router = Arc::clone(&router);
            tokio::spawn(async move {
                if i % 2 == 0 {
                    router.promote_next().map(|_| ())
                } else {
                    router.set_canary_probability(f64::from(i) / 16.0).map(|_| ())
                }
            })
        })
        .collect();
    for task in tasks {
        task.await.expect("task").expect("operation");
    }

    let health = router.health();
    assert_eq!(health.current_model_uri, Some(uri(3)));
    assert_eq!(health.next_model_uri, Some(uri(3)));
    assert!((0.0..=1.0).contains(&health.canary_probability));
}

#[tokio::test]
async fn test_promote_without_stage_is_conflict_even_when_racing() {
    let router = Arc::new(CanaryRouter::bootstrap(loader(Duration::ZERO), None, 1.0).await);
    let results = race_promotes(Arc::clone(&router)).await;
    assert!(results
        .iter()
        .all(|r| matches!(r, Err(GatewayError::Conflict))));
}

async fn race_promotes(router: Arc<CanaryRouter>) -> Vec<Result<(), GatewayError>> {
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let router = Arc::clone(&router);
            tokio::spawn(async move { router.promote_next().map(|_| ()) })
        })
        .collect();
    let mut out = Vec::new();
    for h in handles {
        out.push(h.await.expect("task"));
    }
    out
}
