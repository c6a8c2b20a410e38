// tests/common/mod.rs
// Shared fixtures: canned datasets served by an in-memory fetcher, and a
// dispatcher that records instead of mailing.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use forecast_alerts::config::Chamber;
use forecast_alerts::monitor::Monitor;
use forecast_alerts::source::Fetcher;
use forecast_alerts::state::JsonFileStore;
use forecast_alerts::{AlertDispatcher, AlertsConfig, CheckError, PersistedState, Recipients, StateStore};

pub const ELECTION: &str = "2022-11-08";

/// URL → body. Unknown URLs answer 404. Clones share the same map.
#[derive(Clone, Default)]
pub struct MapFetcher {
    bodies: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    calls: Arc<Mutex<usize>>,
}

impl MapFetcher {
    pub fn serve(&self, url: impl Into<String>, body: impl Into<Vec<u8>>) {
        self.bodies.lock().insert(url.into(), body.into());
    }

    pub fn remove(&self, url: &str) {
        self.bodies.lock().remove(url);
    }

    pub fn calls(&self) -> usize {
        *self.calls.lock()
    }
}

#[async_trait]
impl Fetcher for MapFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, CheckError> {
        *self.calls.lock() += 1;
        self.bodies
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| CheckError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

#[derive(Default)]
pub struct RecordingDispatcher {
    pub calls: Mutex<Vec<(String, String, String)>>,
    pub fail: bool,
}

impl RecordingDispatcher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<(String, String, String)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AlertDispatcher for RecordingDispatcher {
    async fn dispatch(&self, subject: &str, body: &str, recipient: &str) -> anyhow::Result<()> {
        self.calls
            .lock()
            .push((subject.to_string(), body.to_string(), recipient.to_string()));
        if self.fail {
            anyhow::bail!("smtp down");
        }
        Ok(())
    }
}

pub fn recipients() -> Recipients {
    Recipients {
        forecasts: "text@example.com".into(),
        polls: "mail@example.com".into(),
    }
}

/// Everything enabled except house/governor seats; no pause; files in `dir`.
pub fn config(dir: &Path) -> AlertsConfig {
    let mut cfg = AlertsConfig::default();
    cfg.run.data_dir = dir.join("data");
    cfg.run.state_file = dir.join("data/latest.json");
    cfg.run.pause_ms = 0;
    cfg.gcb.threshold = 1.0;
    cfg.forecasts_seats.senate = "az ga".into();
    cfg.polls.pattern = "(?i)poll".into();
    cfg
}

/// Only the generic ballot check.
pub fn gcb_only(dir: &Path) -> AlertsConfig {
    let mut cfg = config(dir);
    cfg.forecasts_national.senate = false;
    cfg.forecasts_national.house = false;
    cfg.forecasts_seats.senate.clear();
    cfg.polls.notify = false;
    cfg
}

/// Only the poll feed check.
pub fn polls_only(dir: &Path) -> AlertsConfig {
    let mut cfg = gcb_only(dir);
    cfg.gcb.notify = false;
    cfg.polls.notify = true;
    cfg
}

pub fn monitor(cfg: AlertsConfig, fetcher: &MapFetcher) -> Monitor {
    let store = JsonFileStore::new(cfg.run.state_file.clone());
    Monitor::new(cfg, Box::new(fetcher.clone()), Box::new(store)).unwrap()
}

pub async fn read_state(cfg: &AlertsConfig) -> PersistedState {
    JsonFileStore::new(cfg.run.state_file.clone())
        .read()
        .await
        .unwrap()
}

pub fn write_state(cfg: &AlertsConfig, json: &str) {
    let path = &cfg.run.state_file;
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, json).unwrap();
}

/* ---------------- datasets ---------------- */

pub fn gcb_csv(dem: f64, rep: f64) -> String {
    format!(
        "candidate,pct_estimate,election,date\n\
         Democrats,40.0,{ELECTION},2022-08-01\n\
         Republicans,41.0,{ELECTION},2022-08-01\n\
         Democrats,{dem},{ELECTION},2022-09-01\n\
         Republicans,{rep},{ELECTION},2022-09-01\n"
    )
}

pub fn national_csv(prob_d: f64, seats_d: u32) -> String {
    let prob_r = 1.0 - prob_d;
    let seats_r = 100 - seats_d;
    format!(
        "expression,chamber_Dparty,chamber_Rparty,median_seats_Dparty,median_seats_Rparty\n\
         _lite,0.5,0.5,50,50\n\
         _deluxe,{prob_d},{prob_r},{seats_d},{seats_r}\n\
         _classic,0.5,0.5,50,50\n"
    )
}

pub fn seats_csv(az_margin: f64, ga_margin: f64) -> String {
    format!(
        "district,expression,name_D1,name_R1,winner_Dparty,winner_Rparty,mean_netpartymargin\n\
         AZ-S3,_deluxe,Mark Kelly,Blake Masters,0.77,0.23,{az_margin}\n\
         AZ-S3,_lite,Mark Kelly,Blake Masters,0.7,0.3,2.0\n\
         GA-S3,_deluxe,Raphael Warnock,Herschel Walker,0.45,0.55,{ga_margin}\n"
    )
}

/// Items newest-first; `(link, title)`.
pub fn feed_xml(items: &[(&str, &str)]) -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\"><channel><title>t</title>\n",
    );
    for (i, (link, title)) in items.iter().enumerate() {
        out.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><pubDate>Tue, 04 Oct 2022 {:02}:00:00 +0000</pubDate></item>\n",
            20 - i
        ));
    }
    out.push_str("</channel></rss>\n");
    out
}

/// Serve every dataset `cfg` looks at.
pub fn serve_all(cfg: &AlertsConfig, fetcher: &MapFetcher) {
    let s = &cfg.sources;
    fetcher.serve(s.gcb_url.clone(), gcb_csv(45.0, 43.0));
    for chamber in Chamber::NATIONAL {
        if let Some(file) = chamber.national_file() {
            fetcher.serve(s.forecast_url(file), national_csv(0.6789, 51));
        }
    }
    fetcher.serve(
        s.forecast_url(Chamber::Senate.seats_file()),
        seats_csv(4.04, -1.26),
    );
    fetcher.serve(
        s.polls_feed_url.clone(),
        feed_xml(&[("https://n/1", "Poll: AZ Senate"), ("https://n/0", "Approval")]),
    );
}
