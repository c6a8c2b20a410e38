// src/evaluate.rs
//! # Change Evaluation
//! Decides whether a freshly derived value differs enough from the last
//! *reported* value to be worth an alert, and persists it when it is.
//!
//! Rules:
//! - scalar leads: report iff `|new - previous| >= min_delta`, compared
//!   unrounded; the stored value is rounded to 2 places.
//! - forecast structs: report iff any field differs (exact equality). Fields
//!   are already rounded, so a value sitting on a rounding boundary can flip
//!   back and forth and report each time.
//!
//! Persisting happens before the caller formats anything. If formatting or
//! dispatch later fails, the state has still advanced.

use crate::error::StateError;
use crate::extract::{round_to, ChamberForecast, SeatForecast};
use crate::state::{PersistedState, SourceKey, StateStore, StoredValue};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ThresholdRule {
    /// Any field differing is reportable.
    Exact,
    /// Numeric move of at least this magnitude is reportable.
    MinDelta(f64),
}

/// A freshly derived value, before rounding for storage.
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    /// Unrounded generic-ballot lead.
    Lead(f64),
    Chamber(ChamberForecast),
    Seat(SeatForecast),
}

impl Observation {
    /// Value written to the state file once reported.
    pub fn stored(&self) -> StoredValue {
        match self {
            Observation::Lead(v) => StoredValue::Lead(round_to(*v, 2)),
            Observation::Chamber(c) => StoredValue::Chamber(c.clone()),
            Observation::Seat(s) => StoredValue::Seat(s.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Reportable { previous: Option<StoredValue> },
    NotReportable,
}

impl Verdict {
    pub fn is_reportable(&self) -> bool {
        matches!(self, Verdict::Reportable { .. })
    }
}

/// Pure reportability test. A missing previous lead counts as 0; a missing
/// or differently-shaped previous struct is always reportable.
pub fn is_reportable(
    rule: ThresholdRule,
    observed: &Observation,
    previous: Option<&StoredValue>,
) -> bool {
    match observed {
        Observation::Lead(new) => {
            let old = previous.and_then(StoredValue::as_lead).unwrap_or(0.0);
            match rule {
                ThresholdRule::MinDelta(min) => (new - old).abs() >= min,
                ThresholdRule::Exact => round_to(*new, 2) != old,
            }
        }
        Observation::Chamber(new) => previous.and_then(StoredValue::as_chamber) != Some(new),
        Observation::Seat(new) => previous.and_then(StoredValue::as_seat) != Some(new),
    }
}

/// Evaluator bound to the run's loaded state and the store that backs it.
pub struct ChangeEvaluator<'a> {
    store: &'a dyn StateStore,
    state: &'a mut PersistedState,
}

impl<'a> ChangeEvaluator<'a> {
    pub fn new(store: &'a dyn StateStore, state: &'a mut PersistedState) -> Self {
        Self { store, state }
    }

    pub fn previous(&self, key: &SourceKey) -> Option<&StoredValue> {
        self.state.get(key)
    }

    /// Apply `rule`; on a reportable change, flush the new value for `key`
    /// immediately and return what was stored before.
    pub async fn evaluate(
        &mut self,
        key: &SourceKey,
        observed: &Observation,
        rule: ThresholdRule,
    ) -> Result<Verdict, StateError> {
        let previous = self.state.get(key).cloned();
        if !is_reportable(rule, observed, previous.as_ref()) {
            tracing::debug!(key = %key, "not reportable");
            return Ok(Verdict::NotReportable);
        }
        self.record(key.clone(), observed.stored()).await?;
        Ok(Verdict::Reportable { previous })
    }

    /// Persist `value` unconditionally (poll sentinel).
    pub async fn record(&mut self, key: SourceKey, value: StoredValue) -> Result<(), StateError> {
        self.store
            .update([(key.clone(), value.clone())].into_iter().collect())
            .await?;
        tracing::debug!(key = %key, "state advanced");
        self.state.insert(key, value);
        Ok(())
    }
}
