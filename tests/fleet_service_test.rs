//! End-to-end coverage of `FleetService` against a real in-memory SQLite
//! pool, exercising the flows a CLI invocation would actually drive.

use fleet_core::domain::models::{CheckpointTrigger, MissionPriority, PilotHealth, WorkOrder, WorkOrderStatus};
use fleet_core::domain::ports::WorkOrderFilter;
use fleet_core::infrastructure::config::FleetConfig;
use fleet_core::infrastructure::database::{all_embedded_migrations, create_test_pool, Migrator};
use fleet_core::FleetService;

async fn test_service() -> FleetService {
    let pool = create_test_pool().await.expect("in-memory pool");
    Migrator::new(pool.clone()).run_embedded_migrations(all_embedded_migrations()).await.expect("migrations");
    FleetService::new(pool, FleetConfig::default())
}

#[tokio::test]
async fn work_order_flows_from_submission_through_dispatch_to_completion() {
    let service = test_service().await;

    let pilot = service.register_pilot("viper-1", "backend", 3, Vec::new()).await.unwrap();
    assert_eq!(pilot.current_workload, 0);

    let work_order = WorkOrder::new("implement endpoint", "add the /users route", MissionPriority::High, 2);
    let created = service.create_work_order(work_order).await.unwrap();
    assert_eq!(created.status, WorkOrderStatus::Pending);

    let assigned = service.dispatch(10).await.unwrap();
    assert_eq!(assigned, 1);

    let fetched = service.get_work_order(created.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, WorkOrderStatus::Assigned);

    let accepted = service.patch_work_order_status(created.id, WorkOrderStatus::Accepted).await.unwrap();
    assert_eq!(accepted.status, WorkOrderStatus::Accepted);

    let in_progress = service.patch_work_order_status(created.id, WorkOrderStatus::InProgress).await.unwrap();
    assert_eq!(in_progress.status, WorkOrderStatus::InProgress);

    let completed = service.patch_work_order_status(created.id, WorkOrderStatus::Completed).await.unwrap();
    assert_eq!(completed.status, WorkOrderStatus::Completed);
}

#[tokio::test]
async fn invalid_status_transition_is_rejected_as_a_conflict() {
    let service = test_service().await;
    let work_order = WorkOrder::new("run tests", "ci pipeline", MissionPriority::Medium, 1);
    let created = service.create_work_order(work_order).await.unwrap();

    let err = service.patch_work_order_status(created.id, WorkOrderStatus::Completed).await.unwrap_err();
    assert!(matches!(err, fleet_core::FleetError::Conflict(_)));
}

#[tokio::test]
async fn list_work_orders_filters_by_status() {
    let service = test_service().await;
    service.create_work_order(WorkOrder::new("a", "first", MissionPriority::Low, 1)).await.unwrap();
    service.create_work_order(WorkOrder::new("b", "second", MissionPriority::Low, 1)).await.unwrap();

    let pending = service.list_work_orders(WorkOrderFilter { status: Some(WorkOrderStatus::Pending), ..Default::default() }).await.unwrap();
    assert_eq!(pending.len(), 2);

    let completed =
        service.list_work_orders(WorkOrderFilter { status: Some(WorkOrderStatus::Completed), ..Default::default() }).await.unwrap();
    assert!(completed.is_empty());
}

#[tokio::test]
async fn conflicting_exclusive_reservations_are_rejected() {
    let service = test_service().await;
    let first = service.reserve("src/lib.rs", "pilot-a", true).await.unwrap();
    assert_eq!(first.holder, "pilot-a");

    let err = service.reserve("src/lib.rs", "pilot-b", true).await.unwrap_err();
    assert!(matches!(err, fleet_core::FleetError::Conflict(_)));

    service.release_reservation(first.id).await.unwrap();
    let reservations = service.list_reservations().await.unwrap();
    assert!(reservations.iter().all(|r| r.id != first.id));
}

#[tokio::test]
async fn named_lock_round_trips_through_acquire_and_release() {
    let service = test_service().await;
    let lock = service.acquire_lock("deploy", "pilot-a").await.unwrap();
    assert_eq!(lock.holder, "pilot-a");

    let err = service.acquire_lock("deploy", "pilot-b").await.unwrap_err();
    assert!(matches!(err, fleet_core::FleetError::Conflict(_)));

    service.release_lock("deploy", "pilot-a").await.unwrap();
    let reacquired = service.acquire_lock("deploy", "pilot-b").await.unwrap();
    assert_eq!(reacquired.holder, "pilot-b");
}

#[tokio::test]
async fn pilot_heartbeat_aggregates_health_signals() {
    let service = test_service().await;
    let pilot = service.register_pilot("viper-2", "frontend", 2, Vec::new()).await.unwrap();

    let healthy = service.heartbeat_pilot(pilot.pilot_id, PilotHealth::default()).await.unwrap();
    assert_eq!(healthy, fleet_core::domain::models::HealthStatus::Healthy);

    let degraded_signal = PilotHealth { memory_ok: false, ..PilotHealth::default() };
    let degraded = service.heartbeat_pilot(pilot.pilot_id, degraded_signal).await.unwrap();
    assert_ne!(degraded, fleet_core::domain::models::HealthStatus::Healthy);
}

#[tokio::test]
async fn mission_submission_and_lookup_round_trip() {
    let service = test_service().await;
    let mission = service.submit_mission("ship the release", MissionPriority::Critical).await.unwrap();
    let fetched = service.get_mission(mission.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "ship the release");
    assert_eq!(fetched.priority, MissionPriority::Critical);
}

#[tokio::test]
async fn checkpoint_create_and_dry_run_resume_do_not_mutate_state() {
    let service = test_service().await;
    let mission = service.submit_mission("long running effort", MissionPriority::Medium).await.unwrap();

    let checkpoint = service.create_checkpoint(Some(mission.id), CheckpointTrigger::Manual).await.unwrap();
    assert_eq!(checkpoint.mission_id, Some(mission.id));

    let plan = service.dry_run_resume(checkpoint.id).await.unwrap();
    assert_eq!(plan.checkpoint_id, checkpoint.id);

    let latest = service.get_latest_checkpoint().await.unwrap().unwrap();
    assert_eq!(latest.id, checkpoint.id);
}

#[tokio::test]
async fn learned_pattern_is_created_and_listed_by_type() {
    let service = test_service().await;
    let pattern = service
        .create_pattern("retry_backoff", vec!["timeout".to_string(), "retry".to_string()], "exponential backoff")
        .await
        .unwrap();
    assert_eq!(pattern.usage_count, 0);

    let patterns = service.list_patterns("retry_backoff").await.unwrap();
    assert_eq!(patterns.len(), 1);
    assert_eq!(patterns[0].id, pattern.id);

    let fetched = service.get_pattern(pattern.id).await.unwrap().unwrap();
    assert_eq!(fetched.approach, "exponential backoff");
}

#[tokio::test]
async fn work_order_with_unknown_dependency_is_rejected() {
    let service = test_service().await;
    let mut work_order = WorkOrder::new("deploy", "roll out the release", MissionPriority::High, 1);
    work_order.dependencies = vec![fleet_core::domain::ids::WorkOrderId::new()];

    let err = service.create_work_order(work_order).await.unwrap_err();
    assert!(matches!(err, fleet_core::FleetError::InvalidInput(_)));
}

#[tokio::test]
async fn circular_work_order_dependency_is_rejected() {
    let service = test_service().await;

    let a = service.create_work_order(WorkOrder::new("a", "first half", MissionPriority::Medium, 1)).await.unwrap();
    let b = service.create_work_order(WorkOrder::new("b", "second half", MissionPriority::Medium, 1)).await.unwrap();

    service.add_work_order_dependency(a.id, b.id).await.unwrap();
    let err = service.add_work_order_dependency(b.id, a.id).await.unwrap_err();
    assert!(matches!(err, fleet_core::FleetError::InvalidInput(_)));
}

#[tokio::test]
async fn worker_health_is_absent_until_a_failure_is_recorded() {
    let service = test_service().await;
    let health = service.worker_health("mailbox-a").await.unwrap();
    assert!(health.is_none());
}

#[tokio::test]
async fn resume_moves_mission_back_to_in_progress_and_consumes_checkpoint() {
    let service = test_service().await;
    let mission = service.submit_mission("long running effort", MissionPriority::Medium).await.unwrap();
    let checkpoint = service.create_checkpoint(Some(mission.id), CheckpointTrigger::Manual).await.unwrap();

    service.resume(checkpoint.id).await.unwrap();

    let resumed_mission = service.get_mission(mission.id).await.unwrap().unwrap();
    assert_eq!(resumed_mission.status, fleet_core::domain::models::MissionStatus::InProgress);

    let consumed = service.get_checkpoint(checkpoint.id).await.unwrap().unwrap();
    assert!(consumed.consumed_at.is_some());
}

#[tokio::test]
async fn resume_of_an_already_consumed_checkpoint_fails_with_precondition_failed() {
    let service = test_service().await;
    let mission = service.submit_mission("long running effort", MissionPriority::Medium).await.unwrap();
    let checkpoint = service.create_checkpoint(Some(mission.id), CheckpointTrigger::Manual).await.unwrap();

    service.resume(checkpoint.id).await.unwrap();
    let err = service.resume(checkpoint.id).await.unwrap_err();
    assert!(matches!(err, fleet_core::FleetError::PreconditionFailed(_)));

    // no further side effects: the mission is untouched by the rejected resume
    let mission_after = service.get_mission(mission.id).await.unwrap().unwrap();
    assert_eq!(mission_after.status, fleet_core::domain::models::MissionStatus::InProgress);
}

#[tokio::test]
async fn deleted_pattern_no_longer_appears_in_listings() {
    let service = test_service().await;
    let pattern = service.create_pattern("retry_backoff", vec!["timeout".to_string()], "backoff and retry").await.unwrap();

    service.delete_pattern(pattern.id).await.unwrap();

    let patterns = service.list_patterns("retry_backoff").await.unwrap();
    assert!(patterns.is_empty());
}

#[tokio::test]
async fn learning_metrics_are_aggregated_per_pattern_type() {
    let service = test_service().await;
    service.create_pattern("retry_backoff", vec!["timeout".to_string()], "backoff and retry").await.unwrap();
    service.create_pattern("retry_backoff", vec!["503".to_string()], "circuit break").await.unwrap();

    let metrics = service.get_learning_metrics().await.unwrap();
    let retry = metrics.iter().find(|m| m.pattern_type == "retry_backoff").unwrap();
    assert_eq!(retry.pattern_count, 2);
}
