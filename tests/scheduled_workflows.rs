// tests/scheduled_workflows.rs

//! Scheduler-driven workflow tests: cron selection, batch dispatch,
//! overlap control, and run bookkeeping across workflow kinds.

mod common;

use common::TestEngine;
use custodia::db::models::{
    Confidence, EventOutcome, FormatIdentification, Package, PackageStatus, PackageType,
    PreservationEvent, RunStatus, ScanStatus, TriggeredBy, VirusScan, WorkflowRun,
    WorkflowSchedule,
};
use custodia::db::parse_ts;
use custodia::identify::mock::MockIdentifier;
use custodia::notify::LogNotifier;
use custodia::package::{self, NewPackage};
use custodia::scan::mock::MockScanner;
use custodia::scheduler::{self, NewSchedule};
use custodia::workflow::WorkflowKind;
use custodia::Error;
use chrono::Utc;

fn schedule(engine: &TestEngine, kind: WorkflowKind, batch_limit: i64) -> i64 {
    let schedule = scheduler::create_schedule(
        &engine.conn,
        NewSchedule {
            batch_limit,
            ..NewSchedule::new(
                format!("test {}", kind.as_str()),
                kind,
                "*/5 * * * *".to_string(),
            )
        },
    )
    .unwrap();
    schedule.id.unwrap()
}

fn force_due(engine: &TestEngine, schedule_id: i64) {
    let mut schedule = WorkflowSchedule::find_by_id(&engine.conn, schedule_id)
        .unwrap()
        .unwrap();
    schedule
        .set_next_run(&engine.conn, Some("2026-01-01 00:00:00".to_string()))
        .unwrap();
}

#[test]
fn test_fixity_tick_end_to_end() {
    let engine = TestEngine::new();
    engine.seed_object("a.bin", b"alpha");
    engine.seed_object("b.bin", b"beta");
    engine.seed_object("c.bin", b"gamma");

    let schedule_id = schedule(&engine, WorkflowKind::FixityCheck, 2);
    force_due(&engine, schedule_id);

    let report = scheduler::tick(&engine.ctx(), &LogNotifier).unwrap();
    assert_eq!(report.due, 1);
    assert_eq!(report.completed.len(), 1);

    // Bounded batch: exactly batch_limit objects, clean completion
    let run = WorkflowRun::find_by_id(&engine.conn, report.completed[0])
        .unwrap()
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.objects_processed, 2);
    assert_eq!(run.objects_failed, 0);
    assert_eq!(run.triggered_by, TriggeredBy::Cron);

    // Schedule bookkeeping rolled forward, next run in the future
    let schedule = WorkflowSchedule::find_by_id(&engine.conn, schedule_id)
        .unwrap()
        .unwrap();
    assert_eq!(schedule.total_runs, 1);
    assert_eq!(schedule.total_processed, 2);
    assert_eq!(schedule.last_run_status.as_deref(), Some("completed"));
    let next = parse_ts(schedule.next_run_at.as_deref().unwrap()).unwrap();
    assert!(next > Utc::now());

    // Nothing due on the very next tick
    let report = scheduler::tick(&engine.ctx(), &LogNotifier).unwrap();
    assert_eq!(report.due, 0);
}

#[test]
fn test_fixity_corruption_yields_partial_run() {
    let engine = TestEngine::new();
    engine.seed_object("good.bin", b"good bytes");
    engine.seed_object("bad.bin", b"bad bytes");

    // First pass records baseline checksums
    let schedule_id = schedule(&engine, WorkflowKind::FixityCheck, 10);
    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    // Everything is now freshly verified; age it and corrupt one file
    engine
        .conn
        .execute(
            "UPDATE checksums SET verified_at = '2026-01-01 00:00:00'",
            [],
        )
        .unwrap();
    engine.corrupt_object("bad.bin", b"flipped bytes");

    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();
    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.objects_processed, 2);
    assert_eq!(run.objects_succeeded, 1);
    assert_eq!(run.objects_failed, 1);
}

#[test]
fn test_infected_scan_is_data_not_failure() {
    let mut engine = TestEngine::new();
    engine.scanner = MockScanner::infected("Eicar-Test-Signature");
    let object = engine.seed_object("attachment.exe", b"suspicious payload");

    let schedule_id = schedule(&engine, WorkflowKind::VirusScan, 10);
    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();

    // The infection is a finding, not a processing failure
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.objects_succeeded, 1);

    let scan = VirusScan::latest_for_object(&engine.conn, object)
        .unwrap()
        .unwrap();
    assert_eq!(scan.status, ScanStatus::Infected);
    assert_eq!(scan.threat_name.as_deref(), Some("Eicar-Test-Signature"));

    let events = PreservationEvent::list_for_object(&engine.conn, object, 10).unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_outcome, EventOutcome::Success);
    assert!(events[0].event_detail.contains("Eicar-Test-Signature"));
}

#[test]
fn test_scanner_engine_error_yields_partial_run() {
    let mut engine = TestEngine::new();
    engine.scanner = MockScanner::engine_error("cannot open file descriptor");
    engine.seed_object("broken.bin", b"bytes");

    let schedule_id = schedule(&engine, WorkflowKind::VirusScan, 10);
    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();

    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.objects_failed, 1);
}

#[test]
fn test_ambiguous_identification_completes_with_warning() {
    let mut engine = TestEngine::new();
    engine.identifier = MockIdentifier::ambiguous();
    let object = engine.seed_object("report.pdf", b"%PDF-1.3 or maybe 1.4");

    let schedule_id = schedule(&engine, WorkflowKind::FormatIdentification, 10);
    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();
    assert_eq!(run.status, RunStatus::Completed);

    let row = FormatIdentification::find_by_object(&engine.conn, object)
        .unwrap()
        .unwrap();
    assert_eq!(row.confidence, Confidence::Medium);
    assert!(row.warning.as_deref().is_some_and(|w| !w.is_empty()));

    let events = PreservationEvent::list_for_object(&engine.conn, object, 10).unwrap();
    assert_eq!(events[0].event_outcome, EventOutcome::Success);
}

#[test]
fn test_unavailable_identifier_fails_objects_but_finishes_run() {
    let mut engine = TestEngine::new();
    engine.identifier = MockIdentifier::unavailable();
    engine.seed_object("mystery.dat", b"unknowable");

    let schedule_id = schedule(&engine, WorkflowKind::FormatIdentification, 10);
    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();

    // The batch records the failure and completes as partial
    assert_eq!(run.status, RunStatus::Partial);
    assert_eq!(run.objects_failed, 1);
}

#[test]
fn test_conversion_workflow_derives_aips() {
    let engine = TestEngine::new();
    let object = engine.seed_object("diary.pdf", b"%PDF-1.4 diary pages");

    let sip = package::create(
        &engine.conn,
        NewPackage {
            name: "Diary SIP".to_string(),
            ..Default::default()
        },
        &engine.config.agent,
    )
    .unwrap();
    let sip_id = sip.id.unwrap();
    package::add_object(&engine.conn, &engine.store, sip_id, object, None).unwrap();
    package::build(
        &engine.conn,
        &engine.store,
        &engine.packages_dir(),
        sip_id,
        &engine.config.agent,
    )
    .unwrap();
    package::validate(&engine.conn, sip_id, &engine.config.agent).unwrap();

    let schedule_id = schedule(&engine, WorkflowKind::PackageConversion, 10);
    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.objects_succeeded, 1);

    let children = Package::find_children(&engine.conn, sip_id).unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].package_type, PackageType::Aip);
    assert_eq!(children[0].status, PackageStatus::Draft);

    // A SIP with a derived child is no longer selected
    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();
    assert_eq!(run.objects_processed, 0);
}

#[test]
fn test_overlap_guard_between_cron_and_manual() {
    let engine = TestEngine::new();
    engine.seed_object("x.bin", b"xyz");

    let schedule_id = schedule(&engine, WorkflowKind::FixityCheck, 10);
    force_due(&engine, schedule_id);

    // A run already holds the slot
    let held = WorkflowRun::start(
        &engine.conn,
        schedule_id,
        WorkflowKind::FixityCheck,
        TriggeredBy::Cron,
        None,
    )
    .unwrap();

    // The cron tick skips it as a conflict, not a failure
    let report = scheduler::tick(&engine.ctx(), &LogNotifier).unwrap();
    assert_eq!(report.conflicts, 1);
    assert!(report.failures.is_empty());

    // A manual trigger loses the same race
    let result = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    );
    assert!(matches!(result, Err(Error::ConcurrencyConflict(_))));

    // Exactly one running row throughout
    let running = WorkflowRun::running_for_schedule(&engine.conn, schedule_id)
        .unwrap()
        .unwrap();
    assert_eq!(running.id, held.id);
}

#[test]
fn test_replication_completes_without_targets() {
    let engine = TestEngine::new();
    let schedule_id = schedule(&engine, WorkflowKind::Replication, 10);

    let run = scheduler::run_schedule(
        &engine.ctx(),
        schedule_id,
        TriggeredBy::Manual,
        None,
        &LogNotifier,
    )
    .unwrap();

    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.objects_processed, 0);
    assert!(run
        .summary
        .as_deref()
        .is_some_and(|s| s.contains("no replication targets")));
}
