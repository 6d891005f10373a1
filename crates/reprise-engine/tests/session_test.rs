mod support;

use chrono::{NaiveDate, NaiveDateTime};
use reprise_engine::common::{AbortReason, BackendKind, InteractionRecord, OutcomeStatus};
use reprise_engine::filter::{RecordFilter, TextMatch};
use reprise_engine::{AbortHandle, Backends, ReplayError, ReplaySession, SessionState};
use support::{Journal, MockCapability, desktop_record, fast_config, web_record};

fn at(ms: i64) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(9, 0, 0)
        .unwrap()
        + chrono::Duration::milliseconds(ms)
}

fn mixed_records() -> Vec<InteractionRecord> {
    vec![
        web_record(0, "https://example.com/login"),
        desktop_record(1),
        web_record(2, "https://example.com/login"),
        desktop_record(3),
        web_record(4, "https://example.com/home"),
    ]
}

fn both(journal: &Journal) -> Backends {
    Backends::new()
        .with_web(MockCapability::new("web", journal))
        .with_desktop(MockCapability::new("desktop", journal))
}

#[tokio::test]
async fn test_mixed_run_succeeds_in_order() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    let result = session.run(&mixed_records()).await.unwrap();

    assert_eq!(result.total(), 5);
    assert_eq!(result.succeeded(), 5);
    assert_eq!(result.selected(), 5);
    assert!(!result.is_aborted());
    assert!(result.outcomes().iter().all(|o| o.retry_count == 0));

    let order: Vec<usize> = result.outcomes().iter().map(|o| o.index).collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    assert_eq!(
        journal.executed(),
        vec![
            "web:execute:0",
            "desktop:execute:1",
            "web:execute:2",
            "desktop:execute:3",
            "web:execute:4"
        ]
    );
    assert_eq!(result.outcomes()[1].backend, BackendKind::Desktop);
    assert!(result.applications().contains("Microsoft Excel"));
}

#[tokio::test]
async fn test_backends_launched_and_closed_once() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    session.run(&mixed_records()).await.unwrap();

    assert_eq!(journal.count("web:launch"), 1);
    assert_eq!(journal.count("desktop:launch"), 1);
    assert_eq!(journal.count("web:close"), 1);
    assert_eq!(journal.count("desktop:close"), 1);

    let entries = journal.entries();
    assert_eq!(entries.first().map(String::as_str), Some("web:launch"));
    assert!(entries.last().is_some_and(|e| e.ends_with(":close")));
}

#[tokio::test]
async fn test_navigation_only_when_url_changes() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    session.run(&mixed_records()).await.unwrap();

    assert_eq!(
        journal.count("web:navigate:https://example.com/login"),
        1
    );
    assert_eq!(journal.count("web:navigate:https://example.com/home"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_bound() {
    let journal = Journal::default();
    let mut config = fast_config();
    config.error_handling.max_retries = 3;
    config.error_handling.retry_delay = 0.5;
    let backends = Backends::new()
        .with_desktop(MockCapability::new("desktop", &journal).always_failing(0));

    let session = ReplaySession::new(config, backends).unwrap();
    let result = session.run(&[desktop_record(0)]).await.unwrap();

    let outcome = &result.outcomes()[0];
    assert_eq!(outcome.status, OutcomeStatus::Failed);
    assert_eq!(outcome.attempts, 4);
    assert_eq!(outcome.retry_count, 3);
    assert_eq!(journal.count("desktop:execute:0"), 4);

    let error = outcome.error.as_ref().unwrap();
    assert_eq!(error.code, "ELEMENT_NOT_FOUND");
}

#[tokio::test(start_paused = true)]
async fn test_recovers_within_retry_budget() {
    let journal = Journal::default();
    let backends = Backends::new()
        .with_desktop(MockCapability::new("desktop", &journal).failing(0, 2));

    let session = ReplaySession::new(fast_config(), backends).unwrap();
    let result = session.run(&[desktop_record(0)]).await.unwrap();

    let outcome = &result.outcomes()[0];
    assert_eq!(outcome.status, OutcomeStatus::Succeeded);
    assert_eq!(outcome.retry_count, 2);
    assert!(outcome.error.is_none());
}

#[tokio::test]
async fn test_stop_on_first_failure() {
    let journal = Journal::default();
    let mut config = fast_config();
    config.error_handling.continue_on_error = false;
    config.error_handling.max_retries = 0;
    let backends = Backends::new()
        .with_desktop(MockCapability::new("desktop", &journal).always_failing(2));

    let records: Vec<_> = (0..5).map(desktop_record).collect();
    let session = ReplaySession::new(config, backends).unwrap();
    let result = session.run(&records).await.unwrap();

    assert_eq!(result.total(), 3);
    assert_eq!(result.failed(), 1);
    assert_eq!(
        result.aborted(),
        Some(&AbortReason::FailedRecord { index: 2 })
    );
    assert_eq!(journal.count("desktop:execute:3"), 0);
    assert_eq!(journal.count("desktop:close"), 1);
}

#[tokio::test]
async fn test_continue_past_failure() {
    let journal = Journal::default();
    let mut config = fast_config();
    config.error_handling.max_retries = 0;
    let backends = Backends::new()
        .with_desktop(MockCapability::new("desktop", &journal).always_failing(2));

    let records: Vec<_> = (0..5).map(desktop_record).collect();
    let session = ReplaySession::new(config, backends).unwrap();
    let result = session.run(&records).await.unwrap();

    assert_eq!(result.total(), 5);
    assert_eq!(result.succeeded(), 4);
    assert_eq!(result.failed(), 1);
    assert!(!result.is_aborted());
    assert!((result.success_rate() - 80.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_missing_variant_is_skipped() {
    let journal = Journal::default();
    let backends = Backends::new().with_web(MockCapability::new("web", &journal));

    let session = ReplaySession::new(fast_config(), backends).unwrap();
    let result = session.run(&mixed_records()).await.unwrap();

    assert_eq!(result.total(), 5);
    assert_eq!(result.succeeded(), 3);
    assert_eq!(result.skipped(), 2);

    let skipped = &result.outcomes()[1];
    assert_eq!(skipped.status, OutcomeStatus::Skipped);
    assert_eq!(skipped.attempts, 0);
    assert!(skipped.error.as_ref().is_some_and(|e| e.is_routing_skip()));
    assert!(!result.applications().contains("Microsoft Excel"));
}

#[tokio::test]
async fn test_require_all_backends_fails_before_execution() {
    let journal = Journal::default();
    let mut config = fast_config();
    config.error_handling.require_all_backends = true;
    let backends = Backends::new().with_web(MockCapability::new("web", &journal));

    let session = ReplaySession::new(config, backends).unwrap();
    let err = session.run(&mixed_records()).await.unwrap_err();

    assert!(matches!(err, ReplayError::Configuration(_)));
    assert!(journal.entries().is_empty());
}

#[test]
fn test_no_backends_is_configuration_error() {
    let err = ReplaySession::new(fast_config(), Backends::new())
        .err()
        .unwrap();
    assert!(matches!(err, ReplayError::Configuration(_)));
}

#[test]
fn test_invalid_config_is_rejected() {
    let journal = Journal::default();
    let mut config = fast_config();
    config.timing.speed_multiplier = 0.0;
    let result = ReplaySession::new(config, both(&journal));
    assert!(matches!(result, Err(ReplayError::Configuration(_))));
}

#[tokio::test]
async fn test_launch_failure_releases_launched_backends() {
    let journal = Journal::default();
    let backends = Backends::new()
        .with_web(MockCapability::new("web", &journal))
        .with_desktop(MockCapability::new("desktop", &journal).launch_fails());

    let session = ReplaySession::new(fast_config(), backends).unwrap();
    let err = session.run(&mixed_records()).await.unwrap_err();

    assert!(matches!(
        err,
        ReplayError::BackendInit {
            backend: BackendKind::Desktop,
            ..
        }
    ));
    assert_eq!(
        journal.entries(),
        vec!["web:launch", "desktop:launch", "web:close"]
    );
}

#[tokio::test]
async fn test_unneeded_backend_is_not_launched() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    session.run(&[desktop_record(0)]).await.unwrap();

    assert_eq!(journal.count("web:"), 0);
    assert_eq!(journal.count("desktop:launch"), 1);
}

#[tokio::test]
async fn test_empty_selection() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal))
        .unwrap()
        .with_filter(RecordFilter::new().process_name(TextMatch::exact("firefox")));
    let result = session.run(&mixed_records()).await.unwrap();

    assert_eq!(result.selected(), 0);
    assert_eq!(result.total(), 0);
    assert!(journal.entries().is_empty());
}

#[tokio::test]
async fn test_filter_and_range() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal))
        .unwrap()
        .with_filter(RecordFilter::new().process_name(TextMatch::ignore_case("CHROME")))
        .with_range(1, Some(3));
    let result = session.run(&mixed_records()).await.unwrap();

    let order: Vec<usize> = result.outcomes().iter().map(|o| o.index).collect();
    assert_eq!(order, vec![2, 4]);
    assert_eq!(result.selected(), 2);
}

#[tokio::test]
async fn test_abort_before_run() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    let handle = session.abort_handle();
    handle.abort();

    let result = session.run(&mixed_records()).await.unwrap();
    assert_eq!(result.total(), 0);
    assert_eq!(result.aborted(), Some(&AbortReason::Cancelled));
    assert_eq!(journal.executed().len(), 0);
    assert_eq!(journal.count("web:close"), 1);
}

#[tokio::test]
async fn test_abort_lets_current_action_finish() {
    let journal = Journal::default();
    let handle = AbortHandle::new();
    let desktop = MockCapability::new("desktop", &journal).abort_during(1, handle.clone());
    let records: Vec<_> = (0..4).map(desktop_record).collect();

    let session = ReplaySession::new(fast_config(), Backends::new().with_desktop(desktop))
        .unwrap()
        .with_abort_handle(handle);
    let result = session.run(&records).await.unwrap();

    assert_eq!(result.total(), 2);
    assert_eq!(result.outcomes()[1].status, OutcomeStatus::Succeeded);
    assert_eq!(result.aborted(), Some(&AbortReason::Cancelled));
    assert_eq!(journal.count("desktop:execute:2"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_reconstructed_delays_are_reported() {
    let journal = Journal::default();
    let mut config = fast_config();
    config.timing.speed_multiplier = 2.0;
    let records = vec![
        desktop_record(0).with_times(Some(at(0)), Some(at(500))),
        desktop_record(1).with_times(Some(at(2500)), Some(at(3000))),
        desktop_record(2).with_times(Some(at(60_000)), Some(at(60_100))),
    ];
    let backends = Backends::new().with_desktop(MockCapability::new("desktop", &journal));

    let session = ReplaySession::new(config, backends).unwrap();
    let result = session.run(&records).await.unwrap();

    let delays: Vec<u64> = result.outcomes().iter().map(|o| o.delay_ms).collect();
    assert_eq!(delays, vec![0, 1000, 2500]);
}

#[tokio::test]
async fn test_ambiguous_browser_record_carries_note() {
    let journal = Journal::default();
    let record = InteractionRecord::new(0, "click").with_process("firefox");
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    let result = session.run(&[record]).await.unwrap();

    let outcome = &result.outcomes()[0];
    assert_eq!(outcome.backend, BackendKind::Desktop);
    assert!(outcome.note.is_some());
}

#[tokio::test]
async fn test_failure_screenshot_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let mut config = fast_config();
    config.error_handling.max_retries = 0;
    config.error_handling.screenshot_on_failure = true;
    config.error_handling.artifact_dir = dir.path().to_path_buf();
    let web = MockCapability::new("web", &journal)
        .always_failing(0)
        .with_screenshot(b"\x89PNG");

    let session = ReplaySession::new(config, Backends::new().with_web(web))
        .unwrap()
        .with_run_id("run-1");
    let result = session
        .run(&[web_record(0, "https://example.com")])
        .await
        .unwrap();

    let artifact = result.outcomes()[0].artifact.as_ref().unwrap();
    assert_eq!(artifact.path, dir.path().join("run-1_0.png"));
    assert_eq!(std::fs::read(&artifact.path).unwrap(), b"\x89PNG");
}

#[tokio::test]
async fn test_screenshot_failure_does_not_mask_outcome() {
    let dir = tempfile::tempdir().unwrap();
    let journal = Journal::default();
    let mut config = fast_config();
    config.error_handling.max_retries = 0;
    config.desktop_automation.screenshot_on_error = true;
    config.error_handling.artifact_dir = dir.path().to_path_buf();
    let desktop = MockCapability::new("desktop", &journal)
        .always_failing(0)
        .with_broken_screenshot();

    let session = ReplaySession::new(config, Backends::new().with_desktop(desktop)).unwrap();
    let result = session
        .run(&[desktop_record(0), desktop_record(1)])
        .await
        .unwrap();

    assert_eq!(journal.count("desktop:screenshot"), 1);
    assert_eq!(result.outcomes()[0].status, OutcomeStatus::Failed);
    assert!(result.outcomes()[0].artifact.is_none());
    assert_eq!(result.outcomes()[1].status, OutcomeStatus::Succeeded);
}

#[tokio::test]
async fn test_no_screenshot_when_disabled() {
    let journal = Journal::default();
    let mut config = fast_config();
    config.error_handling.max_retries = 0;
    let web = MockCapability::new("web", &journal)
        .always_failing(0)
        .with_screenshot(b"png");

    let session = ReplaySession::new(config, Backends::new().with_web(web)).unwrap();
    session
        .run(&[web_record(0, "https://example.com")])
        .await
        .unwrap();
    assert_eq!(journal.count("web:screenshot"), 0);
}

#[tokio::test]
async fn test_stepping_session() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    let mut stepping = session.start_stepping(&mixed_records()).await.unwrap();

    assert_eq!(stepping.remaining(), 5);
    assert_eq!(stepping.peek().map(|r| r.index), Some(0));

    let first = stepping.step().await.unwrap();
    assert_eq!(first.index, 0);
    assert_eq!(stepping.remaining(), 4);
    assert_eq!(stepping.state(), SessionState::Running);

    stepping.step().await.unwrap();
    stepping.abort();
    assert!(stepping.step().await.is_none());
    assert!(stepping.peek().is_none());
    assert_eq!(
        stepping.state(),
        SessionState::Aborted(AbortReason::Cancelled)
    );

    let result = stepping.finish().await;
    assert_eq!(result.total(), 2);
    assert_eq!(result.aborted(), Some(&AbortReason::Cancelled));
    assert_eq!(journal.count("web:close"), 1);
    assert_eq!(journal.count("desktop:close"), 1);
}

#[tokio::test]
async fn test_stepping_to_completion() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    let mut stepping = session.start_stepping(&mixed_records()).await.unwrap();

    let mut seen = Vec::new();
    while let Some(outcome) = stepping.step().await {
        seen.push(outcome.index);
    }
    assert_eq!(seen, vec![0, 1, 2, 3, 4]);
    assert_eq!(stepping.state(), SessionState::Completed);

    let result = stepping.finish().await;
    assert_eq!(result.succeeded(), 5);
    assert!(!result.is_aborted());
}

#[tokio::test]
async fn test_dropped_stepping_session_closes_backends() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    let mut stepping = session.start_stepping(&mixed_records()).await.unwrap();
    stepping.step().await.unwrap();
    drop(stepping);

    for _ in 0..10 {
        if journal.count("web:close") == 1 && journal.count("desktop:close") == 1 {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert_eq!(journal.count("web:close"), 1);
    assert_eq!(journal.count("desktop:close"), 1);
}

#[tokio::test]
async fn test_finished_stepping_session_closes_once() {
    let journal = Journal::default();
    let session = ReplaySession::new(fast_config(), both(&journal)).unwrap();
    let stepping = session.start_stepping(&mixed_records()).await.unwrap();
    stepping.finish().await;

    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    assert_eq!(journal.count("web:close"), 1);
    assert_eq!(journal.count("desktop:close"), 1);
}
