// src/config/alerts.rs
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::Chamber;

const FORECAST_BASE_URL: &str =
    "https://projects.fivethirtyeight.com/2022-general-election-forecast-data/";
const GCB_URL: &str = "https://projects.fivethirtyeight.com/polls/data/generic_ballot_averages.csv";
const POLLS_FEED_URL: &str = "https://nitter.net/PollTrackerUSA/rss";

fn default_true() -> bool {
    true
}
fn default_threshold() -> f64 {
    0.5
}
fn default_election() -> String {
    "2022-11-08".to_string()
}
fn default_pattern() -> String {
    ".".to_string()
}
fn default_pause_ms() -> u64 {
    1_000
}
fn default_http_timeout_secs() -> u64 {
    30
}

/// Full alerting configuration. Every section is optional in the file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub gcb: GcbConfig,
    #[serde(default)]
    pub forecasts_national: NationalConfig,
    #[serde(default)]
    pub forecasts_seats: SeatsConfig,
    #[serde(default)]
    pub polls: PollsConfig,
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub run: RunConfig,
}

/// Generic congressional ballot average.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcbConfig {
    #[serde(default = "default_true")]
    pub notify: bool,
    /// Minimum absolute move of the unrounded lead (percentage points).
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Only rows for this election date are considered.
    #[serde(default = "default_election")]
    pub election: String,
}

impl Default for GcbConfig {
    fn default() -> Self {
        Self {
            notify: true,
            threshold: default_threshold(),
            election: default_election(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NationalConfig {
    #[serde(default = "default_true")]
    pub senate: bool,
    #[serde(default = "default_true")]
    pub house: bool,
    #[serde(default)]
    pub expression: Expression,
}

impl Default for NationalConfig {
    fn default() -> Self {
        Self {
            senate: true,
            house: true,
            expression: Expression::default(),
        }
    }
}

impl NationalConfig {
    pub fn enabled(&self, chamber: Chamber) -> bool {
        match chamber {
            Chamber::Senate => self.senate,
            Chamber::House => self.house,
            Chamber::Governor => false,
        }
    }
}

/// Space-separated seat codes per chamber; empty means "not tracked".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeatsConfig {
    #[serde(default)]
    pub senate: String,
    #[serde(default)]
    pub house: String,
    #[serde(default)]
    pub governor: String,
    #[serde(default)]
    pub expression: Expression,
}

impl SeatsConfig {
    /// Upper-cased seat codes in configured order.
    pub fn seat_codes(&self, chamber: Chamber) -> Vec<String> {
        let raw = match chamber {
            Chamber::Senate => &self.senate,
            Chamber::House => &self.house,
            Chamber::Governor => &self.governor,
        };
        raw.split_whitespace().map(str::to_ascii_uppercase).collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollsConfig {
    #[serde(default = "default_true")]
    pub notify: bool,
    /// Regex searched (unanchored) in each feed entry title.
    #[serde(default = "default_pattern")]
    pub pattern: String,
}

impl Default for PollsConfig {
    fn default() -> Self {
        Self {
            notify: true,
            pattern: default_pattern(),
        }
    }
}

impl PollsConfig {
    pub fn regex(&self) -> Result<Regex, regex::Error> {
        Regex::new(&self.pattern)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub forecast_base_url: String,
    pub gcb_url: String,
    pub polls_feed_url: String,
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            forecast_base_url: FORECAST_BASE_URL.to_string(),
            gcb_url: GCB_URL.to_string(),
            polls_feed_url: POLLS_FEED_URL.to_string(),
        }
    }
}

impl SourcesConfig {
    pub fn forecast_url(&self, file_name: &str) -> String {
        format!("{}{}", self.forecast_base_url, file_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Directory holding the raw-cache copies.
    #[serde(default = "RunConfig::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "RunConfig::default_state_file")]
    pub state_file: PathBuf,
    /// Courtesy pause between consecutive forecast checks.
    #[serde(default = "default_pause_ms")]
    pub pause_ms: u64,
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    #[serde(default)]
    pub metrics_textfile: Option<PathBuf>,
}

impl RunConfig {
    fn default_data_dir() -> PathBuf {
        PathBuf::from("data")
    }

    fn default_state_file() -> PathBuf {
        PathBuf::from("data/latest.json")
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            state_file: Self::default_state_file(),
            pause_ms: default_pause_ms(),
            http_timeout_secs: default_http_timeout_secs(),
            metrics_textfile: None,
        }
    }
}

/// Forecast aggregation methodology ("deluxe", "classic", "lite").
///
/// The datasets spell it with a leading underscore (`_deluxe`); the config
/// accepts either spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Expression(String);

impl Expression {
    pub fn new(raw: &str) -> Self {
        Self(raw.trim().trim_start_matches('_').to_ascii_lowercase())
    }

    /// Name shown in messages, e.g. `deluxe`.
    pub fn label(&self) -> &str {
        &self.0
    }

    /// Value of the `expression` column, e.g. `_deluxe`.
    pub fn column_value(&self) -> String {
        format!("_{}", self.0)
    }
}

impl Default for Expression {
    fn default() -> Self {
        Self("deluxe".to_string())
    }
}

impl From<String> for Expression {
    fn from(s: String) -> Self {
        Self::new(&s)
    }
}

impl From<Expression> for String {
    fn from(e: Expression) -> Self {
        e.column_value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_accepts_both_spellings() {
        assert_eq!(Expression::new("_classic"), Expression::new("Classic"));
        assert_eq!(Expression::new("lite").column_value(), "_lite");
        assert_eq!(Expression::default().label(), "deluxe");
    }

    #[test]
    fn seat_codes_are_split_and_uppercased() {
        let seats = SeatsConfig {
            senate: " az  ga\tNV ".into(),
            ..Default::default()
        };
        assert_eq!(seats.seat_codes(Chamber::Senate), vec!["AZ", "GA", "NV"]);
        assert!(seats.seat_codes(Chamber::House).is_empty());
    }

    #[test]
    fn governor_has_no_national_toggle() {
        assert!(!NationalConfig::default().enabled(Chamber::Governor));
        assert!(NationalConfig::default().enabled(Chamber::House));
    }
}
