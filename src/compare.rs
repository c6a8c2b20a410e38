// src/compare.rs
//! Side-by-side seat odds under the three forecast expressions, sorted by
//! how much `deluxe` and `lite` disagree. Helps pick which expression to
//! track.

use anyhow::{Context, Result};
use std::collections::{HashMap, HashSet};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::compose::decimal;
use crate::config::{Chamber, Expression};
use crate::error::CheckError;
use crate::extract::round_to;
use crate::table::{write_row, Table};

pub const HEADER: [&str; 6] = [
    "seat",
    "probD_deluxe",
    "probD_classic",
    "probD_lite",
    "probD_deluxe_minus_lite",
    "probD_deluxe_minus_lite_abs",
];

#[derive(Debug, Clone, PartialEq)]
pub struct ExpressionComparison {
    pub seat: String,
    pub deluxe: f64,
    pub classic: f64,
    pub lite: f64,
    pub deluxe_minus_lite: f64,
    pub deluxe_minus_lite_abs: f64,
}

/// Seats present under all three expressions, largest deluxe/lite gap first.
pub fn compare_expressions(
    table: &Table,
    chamber: Chamber,
) -> Result<Vec<ExpressionComparison>, CheckError> {
    let c_district = table.column("district")?;
    let c_expr = table.column("expression")?;
    let c_prob = table.column("winner_Dparty")?;

    let deluxe = Expression::new("deluxe").column_value();
    let classic = Expression::new("classic").column_value();
    let lite = Expression::new("lite").column_value();

    let mut seen = HashSet::new();
    let mut deluxe_order: Vec<&str> = Vec::new();
    let mut by_expr: HashMap<(&str, &str), f64> = HashMap::new();
    for row in table.rows() {
        let district = row.text(c_district);
        let expr = row.text(c_expr);
        if !seen.insert((district, expr)) {
            continue;
        }
        let prob = round_to(row.number(c_prob, "winner_Dparty")?, 2);
        if expr == deluxe {
            deluxe_order.push(district);
        }
        by_expr.insert((district, expr), prob);
    }

    let mut out: Vec<ExpressionComparison> = deluxe_order
        .into_iter()
        .filter_map(|district| {
            let d = *by_expr.get(&(district, deluxe.as_str()))?;
            let c = *by_expr.get(&(district, classic.as_str()))?;
            let l = *by_expr.get(&(district, lite.as_str()))?;
            let seat = if chamber.is_statewide() {
                district.chars().take(2).collect()
            } else {
                district.to_string()
            };
            Some(ExpressionComparison {
                seat,
                deluxe: d,
                classic: c,
                lite: l,
                deluxe_minus_lite: round_to(d - l, 2),
                deluxe_minus_lite_abs: round_to((d - l).abs(), 2),
            })
        })
        .collect();

    out.sort_by(|a, b| b.deluxe_minus_lite_abs.total_cmp(&a.deluxe_minus_lite_abs));
    Ok(out)
}

pub fn write_csv(path: &Path, rows: &[ExpressionComparison]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut w = BufWriter::new(file);
    write_row(&mut w, &HEADER)?;
    for r in rows {
        write_row(
            &mut w,
            &[
                r.seat.clone(),
                decimal(r.deluxe),
                decimal(r.classic),
                decimal(r.lite),
                decimal(r.deluxe_minus_lite),
                decimal(r.deluxe_minus_lite_abs),
            ],
        )?;
    }
    w.flush()?;
    Ok(())
}
