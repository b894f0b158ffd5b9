// tests/scheduler_tests.rs

use health_scheduler::check::{Check, CheckBuilder, Desc, DescBuilder, Failure, Status};
use health_scheduler::config::Limits;
use health_scheduler::registry::{CheckFilter, Registry};
use health_scheduler::scheduler::Scheduler;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use uuid::Uuid;

const WAIT: Duration = Duration::from_secs(2);

/// Tests run checks far below the production interval floor; that is what the
/// configurable floor is for.
fn fast_limits() -> Limits {
    Limits {
        min_run_interval_ms: 1,
        ..Limits::default()
    }
}

fn desc() -> Arc<Desc> {
    Arc::new(
        DescBuilder::new()
            .description("database query")
            .red_impact("queries failing")
            .build()
            .unwrap(),
    )
}

fn green_check(desc: Arc<Desc>, interval: Duration) -> CheckBuilder {
    Check::builder()
        .desc(desc)
        .description("select 1")
        .red_impact("db unreachable")
        .limits(fast_limits())
        .run_interval(interval)
        .checker_fn(|| async { None })
}

#[tokio::test]
async fn fast_green_check_delivers_promptly() {
    let registry = Registry::new();
    registry
        .register(green_check(desc(), Duration::from_millis(1)).build().unwrap())
        .unwrap();

    let scheduler = Scheduler::start(&registry);
    let mut results = scheduler.subscribe(None).await;

    let result = timeout(Duration::from_millis(50), results.recv())
        .await
        .expect("no result within 50ms")
        .expect("subscription closed");
    assert_eq!(result.status, Status::Green);
    assert!(result.error.is_none());

    scheduler.stop_async();
    scheduler.done().await;
}

#[tokio::test]
async fn snapshot_has_one_entry_per_check() {
    let registry = Registry::new();
    let shared = desc();
    let id_a = Uuid::now_v7();
    let id_b = Uuid::now_v7();
    registry
        .register(
            green_check(Arc::clone(&shared), Duration::from_millis(5))
                .id(id_a)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            green_check(shared, Duration::from_millis(5))
                .id(id_b)
                .build()
                .unwrap(),
        )
        .unwrap();

    let scheduler = Scheduler::start(&registry);

    let results = timeout(WAIT, async {
        loop {
            let results = scheduler.results(None).await;
            if results.len() == 2 {
                return results;
            }
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("snapshot never reached two entries");

    let mut ids: Vec<Uuid> = results.iter().map(|r| r.health_check_id).collect();
    ids.sort();
    let mut expected = vec![id_a, id_b];
    expected.sort();
    assert_eq!(ids, expected);

    scheduler.stop_async();
    scheduler.done().await;
}

#[tokio::test]
async fn red_failure_message_reaches_subscribers() {
    let registry = Registry::new();
    registry
        .register(
            green_check(desc(), Duration::from_millis(5))
                .checker_fn(|| async { Some(Failure::red("DB conn failed")) })
                .build()
                .unwrap(),
        )
        .unwrap();

    let scheduler = Scheduler::start(&registry);
    let mut results = scheduler.subscribe(None).await;

    let result = timeout(WAIT, results.recv())
        .await
        .expect("no result delivered")
        .expect("subscription closed");
    assert_eq!(result.status, Status::Red);
    assert_eq!(result.error.unwrap().to_string(), "DB conn failed");

    scheduler.stop_async();
    scheduler.done().await;
}

#[tokio::test]
async fn stop_with_no_checks_finishes_promptly() {
    let registry = Registry::new();
    let scheduler = Scheduler::start(&registry);

    assert!(!scheduler.stopping());
    scheduler.stop_async();
    assert!(scheduler.stopping());

    timeout(WAIT, scheduler.done())
        .await
        .expect("done did not resolve");
    assert!(scheduler.is_done());
    assert_eq!(scheduler.health_check_count().await, 0);
}

#[tokio::test]
async fn filtered_subscription_only_sees_matching_checks() {
    let registry = Registry::new();
    let shared = desc();
    let id_a = Uuid::now_v7();
    let id_b = Uuid::now_v7();
    registry
        .register(
            green_check(Arc::clone(&shared), Duration::from_millis(2))
                .id(id_a)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
        .register(
            green_check(shared, Duration::from_millis(2))
                .id(id_b)
                .build()
                .unwrap(),
        )
        .unwrap();

    let scheduler = Scheduler::start(&registry);
    let filter: CheckFilter = Arc::new(move |check: &Check| check.id() == id_a);
    let mut results = scheduler.subscribe(Some(filter)).await;

    let mut seen = 0;
    while seen < 5 {
        let result = timeout(WAIT, results.recv())
            .await
            .expect("no result delivered")
            .expect("subscription closed");
        assert_eq!(result.health_check_id, id_a);
        seen += 1;
    }

    scheduler.stop_async();
    scheduler.done().await;
}

#[tokio::test]
async fn execution_is_serialized_across_workers() {
    let registry = Registry::new();
    let shared = desc();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let runs = Arc::new(AtomicUsize::new(0));

    for _ in 0..4 {
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        let runs = Arc::clone(&runs);
        registry
            .register(
                green_check(Arc::clone(&shared), Duration::from_millis(1))
                    .checker_fn(move || {
                        let active = Arc::clone(&active);
                        let max_active = Arc::clone(&max_active);
                        let runs = Arc::clone(&runs);
                        async move {
                            let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                            max_active.fetch_max(now, Ordering::SeqCst);
                            sleep(Duration::from_millis(2)).await;
                            active.fetch_sub(1, Ordering::SeqCst);
                            runs.fetch_add(1, Ordering::SeqCst);
                            None
                        }
                    })
                    .build()
                    .unwrap(),
            )
            .unwrap();
    }

    let scheduler = Scheduler::start(&registry);
    timeout(WAIT, async {
        while runs.load(Ordering::SeqCst) < 12 {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("checks did not run enough times");

    scheduler.stop_async();
    scheduler.done().await;

    assert_eq!(max_active.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_accounting_reaches_zero() {
    let registry = Registry::new();
    let shared = desc();
    registry
        .register(green_check(Arc::clone(&shared), Duration::from_millis(5)).build().unwrap())
        .unwrap();
    registry
        .register(green_check(shared, Duration::from_millis(5)).build().unwrap())
        .unwrap();

    let scheduler = Scheduler::start(&registry);
    assert_eq!(scheduler.health_check_count().await, 2);

    scheduler.stop_async();
    timeout(WAIT, scheduler.done())
        .await
        .expect("done did not resolve");

    assert_eq!(scheduler.health_check_count().await, 0);

    // Post-shutdown observation surfaces: closed subscription, empty snapshot.
    let mut subscription = scheduler.subscribe(None).await;
    assert!(subscription.recv().await.is_none());
    assert!(scheduler.results(None).await.is_empty());
}

#[tokio::test]
async fn late_subscription_gets_no_replay_but_snapshot_does() {
    let registry = Registry::new();
    // Interval long enough that the check runs exactly once during the test.
    registry
        .register(green_check(desc(), Duration::from_secs(60)).build().unwrap())
        .unwrap();

    let scheduler = Scheduler::start(&registry);

    // Wait until the first run has landed in the cache.
    timeout(WAIT, async {
        while scheduler.results(None).await.is_empty() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("first result never cached");

    let mut results = scheduler.subscribe(None).await;
    sleep(Duration::from_millis(50)).await;
    assert!(
        results.try_recv().is_err(),
        "earlier result must not be replayed"
    );

    let snapshot = scheduler.results(None).await;
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].status, Status::Green);

    scheduler.stop_async();
    scheduler.done().await;
}

#[tokio::test]
async fn checks_registered_after_start_are_scheduled() {
    let registry = Registry::new();
    let scheduler = Scheduler::start(&registry);
    let mut results = scheduler.subscribe(None).await;

    let id = Uuid::now_v7();
    registry
        .register(
            green_check(desc(), Duration::from_millis(5))
                .id(id)
                .build()
                .unwrap(),
        )
        .unwrap();

    let result = timeout(WAIT, results.recv())
        .await
        .expect("no result delivered")
        .expect("subscription closed");
    assert_eq!(result.health_check_id, id);
    assert_eq!(scheduler.health_check_count().await, 1);

    scheduler.stop_async();
    scheduler.done().await;
}

#[tokio::test]
async fn registration_during_shutdown_keeps_accounting_balanced() {
    let registry = Registry::new();
    registry
        .register(green_check(desc(), Duration::from_secs(60)).build().unwrap())
        .unwrap();

    let scheduler = Scheduler::start(&registry);
    scheduler.stop_async();

    // The late worker observes the shutdown signal on its first wait and
    // exits without running, so done still resolves.
    registry
        .register(green_check(desc(), Duration::from_secs(60)).build().unwrap())
        .unwrap();

    timeout(WAIT, scheduler.done())
        .await
        .expect("done did not resolve");
    assert_eq!(scheduler.health_check_count().await, 0);
}

#[tokio::test]
async fn failing_check_keeps_its_schedule() {
    let registry = Registry::new();
    let attempts = Arc::new(AtomicUsize::new(0));
    let attempts_in_check = Arc::clone(&attempts);
    registry
        .register(
            green_check(desc(), Duration::from_millis(2))
                .checker_fn(move || {
                    let attempts = Arc::clone(&attempts_in_check);
                    async move {
                        let n = attempts.fetch_add(1, Ordering::SeqCst);
                        if n % 2 == 0 {
                            Some(Failure::red("flaky"))
                        } else {
                            None
                        }
                    }
                })
                .build()
                .unwrap(),
        )
        .unwrap();

    let scheduler = Scheduler::start(&registry);
    let mut results = scheduler.subscribe(None).await;

    let mut statuses = Vec::new();
    while statuses.len() < 4 {
        let result = timeout(WAIT, results.recv())
            .await
            .expect("no result delivered")
            .expect("subscription closed");
        statuses.push(result.status);
    }
    assert!(statuses.contains(&Status::Red));
    assert!(statuses.contains(&Status::Green));

    scheduler.stop_async();
    scheduler.done().await;
}
