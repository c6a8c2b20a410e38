// src/config/mod.rs
pub mod alerts;

pub use alerts::{
    AlertsConfig, Expression, GcbConfig, NationalConfig, PollsConfig, RunConfig, SeatsConfig,
    SourcesConfig,
};

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_PATH: &str = "ALERTS_CONFIG_PATH";

/// Forecast chamber. Governor races only have per-seat toplines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chamber {
    Senate,
    House,
    Governor,
}

impl Chamber {
    pub const NATIONAL: [Chamber; 2] = [Chamber::Senate, Chamber::House];
    pub const SEATS: [Chamber; 3] = [Chamber::Senate, Chamber::House, Chamber::Governor];

    pub fn as_str(self) -> &'static str {
        match self {
            Chamber::Senate => "senate",
            Chamber::House => "house",
            Chamber::Governor => "governor",
        }
    }

    pub fn national_file(self) -> Option<&'static str> {
        match self {
            Chamber::Senate => Some("senate_national_toplines_2022.csv"),
            Chamber::House => Some("house_national_toplines_2022.csv"),
            Chamber::Governor => None,
        }
    }

    pub fn seats_file(self) -> &'static str {
        match self {
            Chamber::Senate => "senate_state_toplines_2022.csv",
            Chamber::House => "house_district_toplines_2022.csv",
            Chamber::Governor => "governor_state_toplines_2022.csv",
        }
    }

    /// Statewide races carry a suffix in `district` (e.g. `AZ-S3`).
    pub fn is_statewide(self) -> bool {
        matches!(self, Chamber::Senate | Chamber::Governor)
    }
}

impl fmt::Display for Chamber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Chamber {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "senate" => Ok(Chamber::Senate),
            "house" => Ok(Chamber::House),
            "governor" => Ok(Chamber::Governor),
            other => Err(anyhow!("unknown chamber: {other}")),
        }
    }
}

/// Load config from an explicit path. TOML or JSON, picked by extension.
pub fn load_from(path: &Path) -> Result<AlertsConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading alerts config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let cfg = parse(&content, ext.as_str())
        .with_context(|| format!("parsing alerts config {}", path.display()))?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Load config using env var + fallbacks:
/// 1) $ALERTS_CONFIG_PATH
/// 2) config/alerts.toml
/// 3) config/alerts.json
/// 4) built-in defaults
pub fn load_default() -> Result<AlertsConfig> {
    if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            bail!("{ENV_CONFIG_PATH} points to non-existent path {}", pb.display());
        }
        return load_from(&pb);
    }
    for candidate in ["config/alerts.toml", "config/alerts.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_from(&p);
        }
    }
    tracing::info!("no alerts config found, using defaults");
    Ok(AlertsConfig::default())
}

fn parse(s: &str, hint_ext: &str) -> Result<AlertsConfig> {
    if hint_ext == "json" {
        return Ok(serde_json::from_str(s)?);
    }
    Ok(toml::from_str(s)?)
}

fn validate(cfg: &AlertsConfig) -> Result<()> {
    if !cfg.gcb.threshold.is_finite() || cfg.gcb.threshold < 0.0 {
        bail!("gcb.threshold must be a non-negative number");
    }
    cfg.polls
        .regex()
        .with_context(|| format!("invalid polls.pattern {:?}", cfg.polls.pattern))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_sections_override_defaults() {
        let cfg = parse(
            r#"
[gcb]
threshold = 1.25

[forecasts_national]
house = false
expression = "_classic"

[forecasts_seats]
senate = "az ga"

[polls]
pattern = "(?i)senate"
"#,
            "toml",
        )
        .unwrap();
        assert!(cfg.gcb.notify);
        assert_eq!(cfg.gcb.threshold, 1.25);
        assert_eq!(cfg.gcb.election, "2022-11-08");
        assert!(cfg.forecasts_national.senate);
        assert!(!cfg.forecasts_national.house);
        assert_eq!(cfg.forecasts_national.expression.label(), "classic");
        assert_eq!(cfg.forecasts_seats.expression.label(), "deluxe");
        assert_eq!(
            cfg.forecasts_seats.seat_codes(Chamber::Senate),
            vec!["AZ", "GA"]
        );
        assert_eq!(cfg.run.pause_ms, 1_000);
        assert!(validate(&cfg).is_ok());
    }

    #[test]
    fn json_is_accepted() {
        let cfg = parse(r#"{"polls": {"notify": false}}"#, "json").unwrap();
        assert!(!cfg.polls.notify);
        assert_eq!(cfg.polls.pattern, ".");
    }

    #[test]
    fn bad_regex_fails_validation() {
        let mut cfg = AlertsConfig::default();
        cfg.polls.pattern = "([".into();
        assert!(validate(&cfg).is_err());
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_CONFIG_PATH);

        let v = load_default().unwrap();
        assert_eq!(v.gcb.threshold, 0.5);

        fs::create_dir_all(tmp.path().join("config")).unwrap();
        fs::write(
            tmp.path().join("config/alerts.toml"),
            "[gcb]\nthreshold = 2.0\n",
        )
        .unwrap();
        assert_eq!(load_default().unwrap().gcb.threshold, 2.0);

        let p_env = tmp.path().join("other.json");
        fs::write(&p_env, r#"{"gcb": {"threshold": 3.0}}"#).unwrap();
        env::set_var(ENV_CONFIG_PATH, p_env.display().to_string());
        assert_eq!(load_default().unwrap().gcb.threshold, 3.0);
        env::remove_var(ENV_CONFIG_PATH);

        env::set_current_dir(&old).unwrap();
    }

    #[test]
    fn chamber_parses_case_insensitively() {
        assert_eq!("Senate".parse::<Chamber>().unwrap(), Chamber::Senate);
        assert!("mayor".parse::<Chamber>().is_err());
        assert_eq!(Chamber::House.national_file(), Some("house_national_toplines_2022.csv"));
        assert_eq!(Chamber::Governor.national_file(), None);
    }
}
