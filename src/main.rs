//! Forecast alerts binary entrypoint.
//! One polling run: check every enabled source, mail what changed, exit.
//! Meant to be scheduled externally (cron, systemd timer); runs must not overlap.

use std::process::ExitCode;

use forecast_alerts::notify::{EmailDispatcher, LogDispatcher};
use forecast_alerts::{config, telemetry, AlertDispatcher, Monitor, Recipients, StateError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// `RUST_LOG` filter (default `forecast_alerts=info,warn`), `LOG_FORMAT=json`
/// for machine-readable output.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("forecast_alerts=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .ok()
        .is_some_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

fn dry_run() -> bool {
    std::env::var("ALERTS_DRY_RUN")
        .ok()
        .is_some_and(|v| v == "1")
}

async fn run() -> anyhow::Result<bool> {
    let cfg = config::load_default()?;

    let prometheus = match &cfg.run.metrics_textfile {
        Some(_) => Some(telemetry::install_recorder()?),
        None => None,
    };
    let textfile = cfg.run.metrics_textfile.clone();

    let dispatcher: Box<dyn AlertDispatcher> = if dry_run() {
        Box::new(LogDispatcher)
    } else {
        Box::new(EmailDispatcher::from_env()?)
    };
    let recipients = if dry_run() {
        Recipients::from_env().unwrap_or_default()
    } else {
        Recipients::from_env()?
    };

    let monitor = Monitor::from_config(cfg)?;
    let report = match monitor.run_once(dispatcher.as_ref(), &recipients).await {
        Ok(report) => report,
        Err(e @ StateError::Corrupt { .. }) => {
            tracing::error!(error = %e, "refusing to run on corrupt state");
            return Err(e.into());
        }
        Err(e) => return Err(e.into()),
    };

    if let (Some(handle), Some(path)) = (prometheus, textfile) {
        if let Err(e) = telemetry::write_textfile(&handle, &path) {
            tracing::warn!(error = ?e, "metrics textfile not written");
        }
    }

    Ok(report.dispatch_failures == 0)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when the scheduler provides the env.
    let _ = dotenvy::dotenv();
    init_tracing();

    match run().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(2),
        Err(e) => {
            tracing::error!(error = ?e, "run failed");
            eprintln!("forecast-alerts: {e:#}");
            ExitCode::FAILURE
        }
    }
}
