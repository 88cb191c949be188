//! One-shot scheduler behavior.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use logspyq::proxy::handler;
use logspyq::scheduler::{ScheduledJob, Scheduler, Trigger};

fn counting_job(id: &str, trigger: Trigger, counter: &Arc<AtomicUsize>) -> ScheduledJob {
    let counter = Arc::clone(counter);
    ScheduledJob {
        id: id.to_owned(),
        trigger,
        handler: handler(move |_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        }),
    }
}

#[tokio::test]
async fn past_instant_fires_immediately() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let past = Utc::now() - chrono::Duration::seconds(10);

    assert!(scheduler.add_job(&counting_job("a:past", Trigger::At(past), &fired)));
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(fired.load(Ordering::SeqCst), 1);
    assert!(scheduler.contains("a:past"));
}

#[tokio::test]
async fn duplicate_id_is_ignored() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let job = counting_job("a:once", Trigger::After(Duration::from_millis(10)), &fired);

    assert!(scheduler.add_job(&job));
    assert!(!scheduler.add_job(&job));
    assert_eq!(scheduler.len(), 1);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(!scheduler.add_job(&job), "fired ids stay known");
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cancel_prevents_firing() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicUsize::new(0));
    scheduler.add_job(&counting_job(
        "a:later",
        Trigger::After(Duration::from_millis(50)),
        &fired,
    ));

    assert!(scheduler.cancel("a:later"));
    assert!(!scheduler.cancel("a:later"));
    assert!(scheduler.is_empty());

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cancelled_id_can_be_scheduled_again() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicUsize::new(0));
    let job = counting_job("a:again", Trigger::After(Duration::from_millis(10)), &fired);

    scheduler.add_job(&job);
    scheduler.cancel("a:again");
    assert!(scheduler.add_job(&job));

    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn shutdown_cancels_waiting_jobs_and_refuses_new_ones() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicUsize::new(0));
    scheduler.add_job(&counting_job(
        "a:far",
        Trigger::After(Duration::from_secs(60)),
        &fired,
    ));

    tokio::time::timeout(Duration::from_secs(1), scheduler.shutdown())
        .await
        .expect("shutdown does not wait for the trigger");

    assert!(scheduler.is_empty());
    assert!(!scheduler.add_job(&counting_job(
        "a:new",
        Trigger::After(Duration::ZERO),
        &fired
    )));
    assert_eq!(fired.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn failing_job_does_not_poison_the_scheduler() {
    let scheduler = Scheduler::new();
    let fired = Arc::new(AtomicUsize::new(0));
    scheduler.add_job(&ScheduledJob {
        id: "a:boom".into(),
        trigger: Trigger::After(Duration::ZERO),
        handler: handler(|_| async { Err(logspyq::AppError::Handler("boom".into())) }),
    });
    scheduler.add_job(&counting_job("a:ok", Trigger::After(Duration::ZERO), &fired));

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(fired.load(Ordering::SeqCst), 1);
}
