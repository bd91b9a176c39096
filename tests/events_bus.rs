//! Exercises the event bus surface the pipeline and job executor actually
//! use: publish/subscribe, filtered subscription, graceful shutdown, and the
//! metrics/pressure counters a status endpoint would read.

use std::sync::Arc;
use std::time::Duration;

use scrapetrellis::events::{EventBusConfig, ShutdownReason};
use scrapetrellis::{PipelineEvent, PipelineEventBus};

fn item_finished(job_id: &str) -> PipelineEvent {
    PipelineEvent::ItemFinished {
        job_id: job_id.to_string(),
        stage_id: "fetch".to_string(),
        item_id: "item-1".to_string(),
        emitted: 1,
        duration: Duration::from_millis(5),
        last_error: None,
        timestamp: chrono::Utc::now(),
    }
}

#[tokio::test]
async fn publish_delivers_to_every_subscriber() {
    let bus = PipelineEventBus::new(16);
    let mut a = bus.subscribe();
    let mut b = bus.subscribe();

    let delivered = bus.publish(item_finished("job-1")).await.unwrap();
    assert_eq!(delivered, 2);

    assert!(matches!(a.recv().await.unwrap(), PipelineEvent::ItemFinished { .. }));
    assert!(matches!(b.recv().await.unwrap(), PipelineEvent::ItemFinished { .. }));
}

#[tokio::test]
async fn publish_with_no_subscribers_is_reported_as_an_error() {
    let bus = PipelineEventBus::new(16);
    let result = bus.publish(item_finished("job-1")).await;
    assert!(matches!(result, Err(scrapetrellis::events::EventBusError::NoSubscribers)));
}

#[tokio::test]
async fn filtered_subscriber_only_wakes_for_matching_events() {
    let bus = PipelineEventBus::new(16);
    let mut started_only = bus.subscribe_filtered(|e| matches!(e, PipelineEvent::ItemStarted { .. }));

    bus.publish(item_finished("job-1")).await.unwrap();
    bus.publish(PipelineEvent::ItemStarted {
        job_id: "job-1".to_string(),
        stage_id: "fetch".to_string(),
        item_id: "item-2".to_string(),
        timestamp: chrono::Utc::now(),
    })
    .await
    .unwrap();

    let event = started_only.recv().await.unwrap();
    assert!(matches!(event, PipelineEvent::ItemStarted { item_id, .. } if item_id == "item-2"));
}

#[tokio::test]
async fn shutdown_gracefully_wakes_waiters_and_is_observable() {
    let bus = Arc::new(PipelineEventBus::new(16));
    let mut rx = bus.subscribe();

    let waiter = {
        let bus = Arc::clone(&bus);
        tokio::spawn(async move {
            bus.wait_for_shutdown().await;
        })
    };

    bus.shutdown_gracefully(ShutdownReason::JobCompleted).await;

    tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("wait_for_shutdown did not wake within the timeout")
        .unwrap();
    assert!(bus.is_shutdown());

    let event = rx.recv().await.unwrap();
    assert!(matches!(event, PipelineEvent::Shutdown { .. }));
}

#[tokio::test]
async fn metrics_and_pressure_reflect_published_events() {
    let bus = PipelineEventBus::new(4);
    let _rx = bus.subscribe();

    for _ in 0..4 {
        bus.publish(item_finished("job-1")).await.unwrap();
    }

    let snapshot = bus.metrics().snapshot();
    assert_eq!(snapshot.events_published, 4);
    assert_eq!(snapshot.active_subscribers, 1);
    assert!((snapshot.success_rate() - 1.0).abs() < f64::EPSILON);

    assert_eq!(bus.buffer_len(), 4);
    assert_eq!(bus.remaining_capacity(), 0);
    assert!(bus.pressure() >= 1.0);
    assert!(bus.is_overloaded());

    let report = bus.get_metrics_report();
    assert!(report.contains("Events Published: 4"));
}

#[tokio::test]
async fn metrics_disabled_by_config_reports_as_such() {
    let bus = PipelineEventBus::with_config(EventBusConfig {
        enable_metrics: false,
        ..EventBusConfig::default()
    });
    let _rx = bus.subscribe();
    bus.publish(item_finished("job-1")).await.unwrap();

    assert_eq!(bus.metrics().snapshot().events_published, 0);
    assert_eq!(bus.get_metrics_report(), "Metrics disabled");
}
