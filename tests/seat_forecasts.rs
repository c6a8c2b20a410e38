// tests/seat_forecasts.rs
//
// Chamber and seat structs are compared field by field; every seat is its
// own key.

mod common;

use common::*;
use forecast_alerts::{Chamber, SourceKey, StoredValue};

fn seats_only(dir: &std::path::Path) -> forecast_alerts::AlertsConfig {
    let mut cfg = gcb_only(dir);
    cfg.gcb.notify = false;
    cfg.forecasts_seats.senate = "AZ GA".into();
    cfg
}

#[tokio::test]
async fn change_in_one_seat_reports_only_that_seat() {
    let tmp = tempfile::tempdir().unwrap();
    let cfg = seats_only(tmp.path());
    let fetcher = MapFetcher::default();
    let url = cfg.sources.forecast_url(Chamber::Senate.seats_file());
    fetcher.serve(url.clone(), seats_csv(4.04, -1.26));

    let d = RecordingDispatcher::default();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();
    assert_eq!(report.reported.len(), 2);
    let ga_before = read_state(&cfg)
        .await
        .get(&SourceKey::seat(Chamber::Senate, "GA"))
        .cloned();

    // AZ margin moves, GA is identical after rounding.
    fetcher.serve(url, seats_csv(5.0, -1.27));
    let d = RecordingDispatcher::default();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();

    assert_eq!(report.reported, vec![SourceKey::seat(Chamber::Senate, "AZ")]);
    let calls = d.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].1,
        "SENATE DETAILS (deluxe)\nAZ\nProb(win): Kelly(D):77% Masters(R):23% (D+5.0)"
    );

    let state = read_state(&cfg).await;
    assert_eq!(
        state
            .get(&SourceKey::seat(Chamber::Senate, "AZ"))
            .and_then(StoredValue::as_seat)
            .map(|s| s.margin),
        Some(5.0)
    );
    assert_eq!(
        state.get(&SourceKey::seat(Chamber::Senate, "GA")).cloned(),
        ga_before
    );
}

#[tokio::test]
async fn missing_seat_does_not_block_the_others() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = seats_only(tmp.path());
    cfg.forecasts_seats.senate = "PA AZ".into();
    let fetcher = MapFetcher::default();
    fetcher.serve(
        cfg.sources.forecast_url(Chamber::Senate.seats_file()),
        seats_csv(4.04, -1.26),
    );

    let d = RecordingDispatcher::default();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();

    assert_eq!(report.failures, vec![("senate_PA".to_string(), "missing_data")]);
    assert_eq!(report.reported, vec![SourceKey::seat(Chamber::Senate, "AZ")]);
    assert_eq!(d.calls().len(), 1);
}

#[tokio::test]
async fn chamber_struct_reports_on_any_field() {
    let tmp = tempfile::tempdir().unwrap();
    let mut cfg = seats_only(tmp.path());
    cfg.forecasts_seats.senate.clear();
    cfg.forecasts_national.house = true;
    let fetcher = MapFetcher::default();
    let url = cfg
        .sources
        .forecast_url(Chamber::House.national_file().unwrap());

    fetcher.serve(url.clone(), national_csv(0.3, 45));
    let d = RecordingDispatcher::default();
    monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();
    assert_eq!(
        d.calls()[0].1,
        "HOUSE (deluxe)\nControl: D:30% R:70%\nSeats: D:45 R:55"
    );

    // Same probabilities after rounding: silent.
    fetcher.serve(url.clone(), national_csv(0.301, 45));
    let d = RecordingDispatcher::default();
    monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();
    assert!(d.calls().is_empty());

    // Only the D median moves.
    fetcher.serve(url, national_csv(0.301, 46));
    let d = RecordingDispatcher::default();
    let report = monitor(cfg.clone(), &fetcher)
        .run_once(&d, &recipients())
        .await
        .unwrap();
    assert_eq!(report.reported, vec![SourceKey::chamber(Chamber::House)]);
    assert_eq!(
        read_state(&cfg)
            .await
            .get(&SourceKey::chamber(Chamber::House))
            .and_then(StoredValue::as_chamber)
            .map(|c| c.seats_d),
        Some(46)
    );
}
