// src/monitor.rs
//! # Run orchestration
//! One run = every enabled source check, strictly in order, with a courtesy
//! pause between forecast downloads. Each check is
//! fetch → (byte-identical? stop) → extract → evaluate → persist → format.
//!
//! A failing check only costs its own message. The one run-level failure is
//! an unreadable state file, surfaced before any check starts.

use anyhow::{Context, Result};
use regex::Regex;
use std::time::Duration;

use crate::compose::{self, AlertBatch, Message, FORECAST_SUBJECT, POLLS_SUBJECT};
use crate::config::{AlertsConfig, Chamber};
use crate::error::{CheckError, StateError};
use crate::evaluate::{ChangeEvaluator, Observation, ThresholdRule, Verdict};
use crate::extract::{self, SeatRows};
use crate::feed;
use crate::notify::{AlertDispatcher, Recipients};
use crate::source::{Fetcher, HttpFetcher, RawCache};
use crate::state::{JsonFileStore, SourceKey, StateStore, StoredValue};
use crate::table::Table;
use crate::telemetry;

const GCB_CACHE: &str = "generic_ballot_averages.csv";
const POLLS_CACHE: &str = "polls_feed.xml";

/// Forecast-channel checks, in priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastCheck {
    Gcb,
    National(Chamber),
    Seats(Chamber),
}

impl ForecastCheck {
    pub const ORDER: [ForecastCheck; 6] = [
        ForecastCheck::Gcb,
        ForecastCheck::National(Chamber::Senate),
        ForecastCheck::National(Chamber::House),
        ForecastCheck::Seats(Chamber::Senate),
        ForecastCheck::Seats(Chamber::House),
        ForecastCheck::Seats(Chamber::Governor),
    ];

    pub fn label(self) -> String {
        match self {
            ForecastCheck::Gcb => "gcb".to_string(),
            ForecastCheck::National(c) => format!("national:{c}"),
            ForecastCheck::Seats(c) => format!("seats:{c}"),
        }
    }
}

/// What a run did, for logging and the exit status.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub checks: usize,
    /// `(check label, error kind)` per failed check or seat.
    pub failures: Vec<(String, &'static str)>,
    pub reported: Vec<SourceKey>,
    pub forecasts_dispatched: bool,
    pub polls_dispatched: bool,
    pub dispatch_failures: usize,
}

/// Both channel batches of one run.
#[derive(Debug, Clone)]
pub struct Collected {
    pub forecasts: AlertBatch,
    pub polls: AlertBatch,
    pub report: RunReport,
}

pub struct Monitor {
    cfg: AlertsConfig,
    fetcher: Box<dyn Fetcher>,
    store: Box<dyn StateStore>,
    cache: RawCache,
    poll_filter: Regex,
}

impl Monitor {
    pub fn new(
        cfg: AlertsConfig,
        fetcher: Box<dyn Fetcher>,
        store: Box<dyn StateStore>,
    ) -> Result<Self> {
        let poll_filter = cfg
            .polls
            .regex()
            .with_context(|| format!("invalid polls.pattern {:?}", cfg.polls.pattern))?;
        let cache = RawCache::new(cfg.run.data_dir.clone());
        Ok(Self {
            cfg,
            fetcher,
            store,
            cache,
            poll_filter,
        })
    }

    /// HTTP fetcher + JSON state file, as configured.
    pub fn from_config(cfg: AlertsConfig) -> Result<Self> {
        let fetcher = HttpFetcher::new().with_timeout(cfg.run.http_timeout_secs);
        let store = JsonFileStore::new(cfg.run.state_file.clone());
        Self::new(cfg, Box::new(fetcher), Box::new(store))
    }

    pub fn config(&self) -> &AlertsConfig {
        &self.cfg
    }

    fn enabled(&self, check: ForecastCheck) -> bool {
        match check {
            ForecastCheck::Gcb => self.cfg.gcb.notify,
            ForecastCheck::National(c) => self.cfg.forecasts_national.enabled(c),
            ForecastCheck::Seats(c) => !self.cfg.forecasts_seats.seat_codes(c).is_empty(),
        }
    }

    /// Run every check and collect both batches. State is read once; a
    /// corrupt state file aborts before anything is fetched.
    pub async fn collect(&self) -> Result<Collected, StateError> {
        telemetry::ensure_metrics_described();
        let mut state = self.store.read().await?;
        let mut eval = ChangeEvaluator::new(self.store.as_ref(), &mut state);
        let mut report = RunReport::default();

        let mut forecasts = AlertBatch::new(FORECAST_SUBJECT);
        let pause = Duration::from_millis(self.cfg.run.pause_ms);
        let mut first = true;
        for check in ForecastCheck::ORDER {
            if !self.enabled(check) {
                tracing::debug!(check = %check.label(), "disabled");
                continue;
            }
            if !first && !pause.is_zero() {
                tokio::time::sleep(pause).await;
            }
            first = false;

            let label = check.label();
            let outcome = match check {
                ForecastCheck::Gcb => self.check_gcb(&mut eval).await,
                ForecastCheck::National(c) => self.check_national(&mut eval, c).await,
                ForecastCheck::Seats(c) => self.check_seats(&mut eval, c, &mut report).await,
            };
            if let Some(message) = record_outcome(&label, outcome, &mut report) {
                forecasts.push(message);
            }
        }

        let mut polls = AlertBatch::new(POLLS_SUBJECT);
        if self.cfg.polls.notify {
            let outcome = self.check_polls(&mut eval).await;
            if let Some(message) = record_outcome("polls", outcome, &mut report) {
                polls.push(message);
            }
        }

        Ok(Collected {
            forecasts,
            polls,
            report,
        })
    }

    /// Collect, then dispatch each non-empty batch to its channel.
    pub async fn run_once(
        &self,
        dispatcher: &dyn AlertDispatcher,
        recipients: &Recipients,
    ) -> Result<RunReport, StateError> {
        let Collected {
            forecasts,
            polls,
            mut report,
        } = self.collect().await?;

        for (batch, recipient, channel) in [
            (&forecasts, &recipients.forecasts, "forecasts"),
            (&polls, &recipients.polls, "polls"),
        ] {
            if batch.is_empty() {
                continue;
            }
            match dispatcher
                .dispatch(batch.subject, &batch.body(), recipient)
                .await
            {
                Ok(()) => {
                    telemetry::dispatched(channel);
                    tracing::info!(channel, messages = batch.len(), "alert dispatched");
                    match channel {
                        "forecasts" => report.forecasts_dispatched = true,
                        _ => report.polls_dispatched = true,
                    }
                }
                Err(e) => {
                    tracing::error!(channel, error = ?e, "alert dispatch failed");
                    report.dispatch_failures += 1;
                }
            }
        }

        telemetry::run_finished();
        tracing::info!(
            checks = report.checks,
            failures = report.failures.len(),
            reported = report.reported.len(),
            "run finished"
        );
        Ok(report)
    }

    /// Fetch and byte-compare; `None` means unchanged.
    async fn refresh(
        &self,
        url: &str,
        cache_name: &str,
        label: &str,
    ) -> Result<Option<Vec<u8>>, CheckError> {
        let raw = self
            .cache
            .refresh(self.fetcher.as_ref(), url, cache_name)
            .await?;
        if raw.is_none() {
            telemetry::check_unchanged(label);
        }
        Ok(raw)
    }

    async fn check_gcb(
        &self,
        eval: &mut ChangeEvaluator<'_>,
    ) -> Result<Option<Message>, CheckError> {
        let Some(raw) = self.refresh(&self.cfg.sources.gcb_url, GCB_CACHE, "gcb").await? else {
            return Ok(None);
        };
        let table = Table::parse(&raw);
        let ballot = extract::generic_ballot(&table, &self.cfg.gcb.election)?;

        let key = SourceKey::gcb();
        let rule = ThresholdRule::MinDelta(self.cfg.gcb.threshold);
        let Verdict::Reportable { previous } = eval
            .evaluate(&key, &Observation::Lead(ballot.lead()), rule)
            .await?
        else {
            return Ok(None);
        };
        let previous_lead = previous
            .as_ref()
            .and_then(StoredValue::as_lead)
            .unwrap_or(0.0);
        telemetry::reported(key.as_str());
        Ok(Some(Message::new(
            key,
            compose::format_gcb(&ballot, previous_lead),
        )))
    }

    async fn check_national(
        &self,
        eval: &mut ChangeEvaluator<'_>,
        chamber: Chamber,
    ) -> Result<Option<Message>, CheckError> {
        let Some(file) = chamber.national_file() else {
            return Ok(None);
        };
        let url = self.cfg.sources.forecast_url(file);
        let label = ForecastCheck::National(chamber).label();
        let Some(raw) = self.refresh(&url, file, &label).await? else {
            return Ok(None);
        };
        let table = Table::parse(&raw);
        let forecast =
            extract::chamber_forecast(&table, &self.cfg.forecasts_national.expression)?;

        let key = SourceKey::chamber(chamber);
        let verdict = eval
            .evaluate(&key, &Observation::Chamber(forecast.clone()), ThresholdRule::Exact)
            .await?;
        if !verdict.is_reportable() {
            return Ok(None);
        }
        telemetry::reported(key.as_str());
        Ok(Some(Message::new(
            key,
            compose::format_chamber(chamber, &forecast),
        )))
    }

    /// Each seat is evaluated on its own; a missing seat is recorded in the
    /// report and the remaining seats still run.
    async fn check_seats(
        &self,
        eval: &mut ChangeEvaluator<'_>,
        chamber: Chamber,
        report: &mut RunReport,
    ) -> Result<Option<Message>, CheckError> {
        let codes = self.cfg.forecasts_seats.seat_codes(chamber);
        let file = chamber.seats_file();
        let url = self.cfg.sources.forecast_url(file);
        let label = ForecastCheck::Seats(chamber).label();
        let Some(raw) = self.refresh(&url, file, &label).await? else {
            return Ok(None);
        };
        let table = Table::parse(&raw);
        let expression = &self.cfg.forecasts_seats.expression;
        let rows = SeatRows::select(&table, expression)?;

        let mut reported = Vec::new();
        for code in &codes {
            let key = SourceKey::seat(chamber, code);
            let outcome = match rows.forecast(code) {
                Ok(forecast) => eval
                    .evaluate(&key, &Observation::Seat(forecast.clone()), ThresholdRule::Exact)
                    .await
                    .map(|v| v.is_reportable().then_some(forecast))
                    .map_err(CheckError::from),
                Err(e) => Err(e),
            };
            match outcome {
                Ok(Some(forecast)) => {
                    telemetry::reported(key.as_str());
                    reported.push((key, compose::format_seat(code, &forecast)));
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(seat = %key, error = %e, "seat check failed");
                    telemetry::check_failed(key.as_str(), e.kind());
                    report.failures.push((key.to_string(), e.kind()));
                }
            }
        }

        Ok(compose::format_seat_block(chamber, expression.label(), &reported))
    }

    async fn check_polls(
        &self,
        eval: &mut ChangeEvaluator<'_>,
    ) -> Result<Option<Message>, CheckError> {
        let Some(raw) = self
            .refresh(&self.cfg.sources.polls_feed_url, POLLS_CACHE, "polls")
            .await?
        else {
            return Ok(None);
        };
        let entries = feed::parse_feed(&raw)?;

        let key = SourceKey::polls();
        let sentinel = eval
            .previous(&key)
            .and_then(StoredValue::as_sentinel)
            .map(str::to_string);
        let Some(digest) = feed::digest(&entries, sentinel.as_deref(), &self.poll_filter) else {
            return Ok(None);
        };
        // The sentinel advances even when nothing matched.
        eval.record(key.clone(), StoredValue::Sentinel(digest.newest_link.clone()))
            .await?;
        tracing::debug!(
            considered = digest.considered,
            matched = digest.matched.len(),
            "poll feed digested"
        );
        if digest.matched.is_empty() {
            return Ok(None);
        }
        telemetry::reported(key.as_str());
        Ok(Some(Message::new(key, compose::format_polls(&digest.matched))))
    }
}

/// Log and count one check's result; hand back its message if any.
fn record_outcome(
    label: &str,
    outcome: Result<Option<Message>, CheckError>,
    report: &mut RunReport,
) -> Option<Message> {
    report.checks += 1;
    telemetry::check_attempted(label);
    match outcome {
        Ok(Some(message)) => {
            tracing::info!(check = label, "change reported");
            report.reported.extend(message.keys.iter().cloned());
            Some(message)
        }
        Ok(None) => {
            tracing::debug!(check = label, "nothing to report");
            None
        }
        Err(e) => {
            tracing::warn!(check = label, kind = e.kind(), error = %e, "check failed");
            telemetry::check_failed(label, e.kind());
            report.failures.push((label.to_string(), e.kind()));
            None
        }
    }
}
