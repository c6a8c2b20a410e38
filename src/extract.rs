// src/extract.rs
//! # Metric Extraction
//! Turns a parsed dataset into the rounded numbers people actually read:
//! generic-ballot lead, chamber control odds and per-seat odds.
//!
//! Pure functions over [`Table`]; absent rows or columns surface as
//! `CheckError::MissingData` and fail only the check that asked for them.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::config::Expression;
use crate::error::CheckError;
use crate::table::{Row, Table};

/// Round half away from zero to `decimals` places.
pub fn round_to(x: f64, decimals: i32) -> f64 {
    let f = 10f64.powi(decimals);
    (x * f).round() / f
}

/// Probability in [0, 1] → whole percent, floored after rounding to 2 places.
/// The epsilon absorbs representation error such as `0.57 * 100 = 56.999…`.
pub fn percent(p: f64) -> u32 {
    let pct = (round_to(p, 2) * 100.0 + 1e-6).floor();
    pct.clamp(0.0, 100.0) as u32
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Party {
    D,
    R,
}

impl Party {
    /// `D` for a strictly positive D-minus-R quantity, otherwise `R`.
    pub fn leading(net_d: f64) -> Self {
        if net_d > 0.0 {
            Party::D
        } else {
            Party::R
        }
    }
}

impl fmt::Display for Party {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Party::D => "D",
            Party::R => "R",
        })
    }
}

/* ---------------- Generic ballot ---------------- */

/// Unrounded per-party sums of the latest generic-ballot estimates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenericBallot {
    pub dem: f64,
    pub rep: f64,
}

impl GenericBallot {
    /// Unrounded D-minus-R lead; this is what the threshold is checked against.
    pub fn lead(&self) -> f64 {
        self.dem - self.rep
    }
}

/// Sum the two most recent rows for `election`, split by the candidate
/// label's leading party letter.
pub fn generic_ballot(table: &Table, election: &str) -> Result<GenericBallot, CheckError> {
    let c_candidate = table.column("candidate")?;
    let c_pct = table.column("pct_estimate")?;
    let c_election = table.column("election")?;

    let latest: Vec<Row<'_>> = table
        .rows()
        .filter(|r| r.text(c_election) == election)
        .collect();
    let latest = &latest[latest.len().saturating_sub(2)..];

    let (mut dem, mut rep) = (None, None);
    for row in latest {
        let pct = row.number(c_pct, "pct_estimate")?;
        match row.text(c_candidate).chars().next() {
            Some('D') => *dem.get_or_insert(0.0) += pct,
            Some('R') => *rep.get_or_insert(0.0) += pct,
            _ => {}
        }
    }

    match (dem, rep) {
        (Some(dem), Some(rep)) => Ok(GenericBallot { dem, rep }),
        _ => Err(CheckError::missing(format!(
            "generic ballot D and R estimates for election {election}"
        ))),
    }
}

/* ---------------- Chamber national forecast ---------------- */

/// Control odds and median seats for one chamber under one expression.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChamberForecast {
    #[serde(rename = "probD")]
    pub prob_d: u32,
    #[serde(rename = "probR")]
    pub prob_r: u32,
    #[serde(rename = "seatsD")]
    pub seats_d: u32,
    #[serde(rename = "seatsR")]
    pub seats_r: u32,
    pub expression: String,
}

pub fn chamber_forecast(
    table: &Table,
    expression: &Expression,
) -> Result<ChamberForecast, CheckError> {
    let c_expr = table.column("expression")?;
    let c_prob_d = table.column("chamber_Dparty")?;
    let c_prob_r = table.column("chamber_Rparty")?;
    let c_seats_d = table.column("median_seats_Dparty")?;
    let c_seats_r = table.column("median_seats_Rparty")?;

    let wanted = expression.column_value();
    let row = table
        .rows()
        .find(|r| r.text(c_expr) == wanted)
        .ok_or_else(|| CheckError::missing(format!("expression `{wanted}`")))?;

    Ok(ChamberForecast {
        prob_d: percent(row.number(c_prob_d, "chamber_Dparty")?),
        prob_r: percent(row.number(c_prob_r, "chamber_Rparty")?),
        seats_d: whole(row.number(c_seats_d, "median_seats_Dparty")?),
        seats_r: whole(row.number(c_seats_r, "median_seats_Rparty")?),
        expression: expression.label().to_string(),
    })
}

fn whole(x: f64) -> u32 {
    x.trunc().max(0.0) as u32
}

/* ---------------- Per-seat forecast ---------------- */

/// Odds and projected margin in one race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatForecast {
    #[serde(rename = "nameD")]
    pub name_d: String,
    #[serde(rename = "nameR")]
    pub name_r: String,
    #[serde(rename = "probD")]
    pub prob_d: u32,
    #[serde(rename = "probR")]
    pub prob_r: u32,
    /// Absolute margin, 1 decimal.
    pub margin: f64,
    pub margin_leader: Party,
}

struct SeatColumns {
    district: usize,
    name_d: usize,
    name_r: usize,
    win_d: usize,
    win_r: usize,
    margin: usize,
}

/// Seat rows for one expression, deduplicated by district (first wins).
pub struct SeatRows<'a> {
    cols: SeatColumns,
    rows: Vec<Row<'a>>,
}

impl<'a> SeatRows<'a> {
    pub fn select(table: &'a Table, expression: &Expression) -> Result<Self, CheckError> {
        let c_expr = table.column("expression")?;
        let cols = SeatColumns {
            district: table.column("district")?,
            name_d: table.column("name_D1")?,
            name_r: table.column("name_R1")?,
            win_d: table.column("winner_Dparty")?,
            win_r: table.column("winner_Rparty")?,
            margin: table.column("mean_netpartymargin")?,
        };

        let wanted = expression.column_value();
        let mut seen = HashSet::new();
        let rows: Vec<Row<'a>> = table
            .rows()
            .filter(|r| r.text(c_expr) == wanted)
            .filter(|r| seen.insert(r.text(cols.district)))
            .collect();
        if rows.is_empty() {
            return Err(CheckError::missing(format!("expression `{wanted}`")));
        }
        Ok(Self { cols, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Forecast for the first district starting with `code`.
    pub fn forecast(&self, code: &str) -> Result<SeatForecast, CheckError> {
        let c = &self.cols;
        let row = self
            .rows
            .iter()
            .find(|r| r.text(c.district).starts_with(code))
            .ok_or_else(|| CheckError::missing(format!("seat `{code}`")))?;

        let margin = round_to(row.number(c.margin, "mean_netpartymargin")?, 1);
        Ok(SeatForecast {
            name_d: surname(row.text(c.name_d), code, "name_D1")?,
            name_r: surname(row.text(c.name_r), code, "name_R1")?,
            prob_d: percent(row.number(c.win_d, "winner_Dparty")?),
            prob_r: percent(row.number(c.win_r, "winner_Rparty")?),
            margin: margin.abs(),
            margin_leader: Party::leading(margin),
        })
    }
}

fn surname(full: &str, code: &str, column: &str) -> Result<String, CheckError> {
    full.split_whitespace()
        .last()
        .map(str::to_string)
        .ok_or_else(|| CheckError::missing(format!("seat `{code}`: empty `{column}`")))
}
