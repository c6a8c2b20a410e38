// tests/run_idempotence.rs
//
// Two back-to-back runs over unchanged upstream data: the first reports
// everything (nothing stored yet), the second reports nothing and leaves the
// state file byte-for-byte alone.

mod common;

use common::*;
use forecast_alerts::compose::{FORECAST_SUBJECT, POLLS_SUBJECT};
use forecast_alerts::{Chamber, SourceKey, StoredValue};

#[tokio::test]
async fn second_run_without_new_bytes_reports_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let fetcher = MapFetcher::default();
    serve_all(&cfg, &fetcher);

    let first = RecordingDispatcher::default();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&first, &recipients())
        .await
        .unwrap();
    assert!(report.failures.is_empty(), "{:?}", report.failures);
    assert_eq!(report.checks, 5);
    assert!(report.forecasts_dispatched && report.polls_dispatched);
    for key in [
        SourceKey::gcb(),
        SourceKey::chamber(Chamber::Senate),
        SourceKey::chamber(Chamber::House),
        SourceKey::seat(Chamber::Senate, "AZ"),
        SourceKey::seat(Chamber::Senate, "GA"),
        SourceKey::polls(),
    ] {
        assert!(report.reported.contains(&key), "{key} not reported");
    }

    let calls = first.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0, FORECAST_SUBJECT);
    assert_eq!(calls[0].2, "text@example.com");
    assert_eq!(
        calls[0].1,
        "GCB\nD:45.0 R:43.0\nD+2.0 (chg: D+2.0)\n\n\
         SENATE (deluxe)\nControl: D:68% R:32%\nSeats: D:51 R:49\n\n\
         HOUSE (deluxe)\nControl: D:68% R:32%\nSeats: D:51 R:49\n\n\
         SENATE DETAILS (deluxe)\n\
         AZ\nProb(win): Kelly(D):77% Masters(R):23% (D+4.0)\n\
         GA\nProb(win): Warnock(D):45% Walker(R):55% (R+1.3)"
    );
    assert_eq!(calls[1].0, POLLS_SUBJECT);
    assert_eq!(calls[1].2, "mail@example.com");
    assert_eq!(
        calls[1].1,
        "Poll: AZ Senate\n\nPubDate: Tue, 04 Oct 2022 20:00:00 +0000"
    );

    let state = read_state(&cfg).await;
    assert_eq!(state.get(&SourceKey::gcb()), Some(&StoredValue::Lead(2.0)));
    assert_eq!(
        state.get(&SourceKey::polls()),
        Some(&StoredValue::Sentinel("https://n/1".into()))
    );
    let before = std::fs::read(&cfg.run.state_file).unwrap();

    let second = RecordingDispatcher::default();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&second, &recipients())
        .await
        .unwrap();
    assert!(report.reported.is_empty());
    assert!(report.failures.is_empty());
    assert!(!report.forecasts_dispatched && !report.polls_dispatched);
    assert!(second.calls().is_empty());
    assert_eq!(std::fs::read(&cfg.run.state_file).unwrap(), before);
}

#[tokio::test]
async fn identical_bytes_skip_evaluation_even_if_state_was_lost() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = config(tmp.path());
    let fetcher = MapFetcher::default();
    serve_all(&cfg, &fetcher);

    monitor(cfg.clone(), &fetcher)
        .run_once(&RecordingDispatcher::default(), &recipients())
        .await
        .unwrap();

    // Wipe the derived state but keep the raw caches.
    write_state(&cfg, "{}");

    let d = RecordingDispatcher::default();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();
    assert!(report.reported.is_empty());
    assert!(d.calls().is_empty());
    assert!(read_state(&cfg).await.is_empty());
}

#[tokio::test]
async fn state_advances_even_when_dispatch_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = gcb_only(tmp.path());
    let fetcher = MapFetcher::default();
    serve_all(&cfg, &fetcher);

    let failing = RecordingDispatcher::failing();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&failing, &recipients())
        .await
        .unwrap();
    assert_eq!(failing.calls().len(), 1);
    assert_eq!(report.dispatch_failures, 1);
    assert!(!report.forecasts_dispatched);
    assert_eq!(
        read_state(&cfg).await.get(&SourceKey::gcb()),
        Some(&StoredValue::Lead(2.0))
    );

    // New bytes, same lead: nothing re-sent.
    fetcher.serve(cfg.sources.gcb_url.clone(), gcb_csv(45.0, 43.0) + "\n");
    let d = RecordingDispatcher::default();
    monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();
    assert!(d.calls().is_empty());
}
