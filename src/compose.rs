// src/compose.rs
//! Message templates and per-channel alert batches.

use crate::config::Chamber;
use crate::extract::{round_to, ChamberForecast, GenericBallot, Party, SeatForecast};
use crate::feed::FeedEntry;
use crate::state::SourceKey;

pub const FORECAST_SUBJECT: &str = "FTE GCB/Forecast Alert";
pub const POLLS_SUBJECT: &str = "Polls Alert";

/// Text block attributable to the keys whose reported change produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub keys: Vec<SourceKey>,
    pub text: String,
}

impl Message {
    pub fn new(key: SourceKey, text: String) -> Self {
        Self {
            keys: vec![key],
            text,
        }
    }
}

/// Ordered messages for one channel. Empty batches are never dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertBatch {
    pub subject: &'static str,
    messages: Vec<Message>,
}

impl AlertBatch {
    pub fn new(subject: &'static str) -> Self {
        Self {
            subject,
            messages: Vec::new(),
        }
    }

    /// Append `message` unless its text is blank.
    pub fn push(&mut self, message: Message) {
        if !message.text.trim().is_empty() {
            self.messages.push(message);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Messages separated by a blank line.
    pub fn body(&self) -> String {
        self.messages
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Shortest decimal that round-trips, but always with a fractional digit
/// (`2.0`, `2.5`, `45.12`).
pub fn decimal(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 {
        format!("{x:.1}")
    } else {
        format!("{x}")
    }
}

/// ```text
/// GCB
/// D:45.12 R:43.0
/// D+2.12 (chg: D+0.62)
/// ```
pub fn format_gcb(ballot: &GenericBallot, previous_lead: f64) -> String {
    let lead = ballot.lead();
    let change = lead - previous_lead;
    format!(
        "GCB\nD:{} R:{}\n{}+{} (chg: {}+{})",
        decimal(round_to(ballot.dem, 2)),
        decimal(round_to(ballot.rep, 2)),
        Party::leading(lead),
        decimal(round_to(lead, 2).abs()),
        Party::leading(change),
        decimal(round_to(change, 2).abs()),
    )
}

pub fn format_chamber(chamber: Chamber, f: &ChamberForecast) -> String {
    format!(
        "{} ({})\nControl: D:{}% R:{}%\nSeats: D:{} R:{}",
        chamber.as_str().to_ascii_uppercase(),
        f.expression,
        f.prob_d,
        f.prob_r,
        f.seats_d,
        f.seats_r,
    )
}

pub fn format_seat(code: &str, f: &SeatForecast) -> String {
    format!(
        "{}\nProb(win): {}(D):{}% {}(R):{}% ({}+{:.1})",
        code.to_ascii_uppercase(),
        f.name_d,
        f.prob_d,
        f.name_r,
        f.prob_r,
        f.margin_leader,
        f.margin,
    )
}

/// Header plus one block per reported seat; `None` if no seat reported.
pub fn format_seat_block(
    chamber: Chamber,
    expression_label: &str,
    seats: &[(SourceKey, String)],
) -> Option<Message> {
    if seats.is_empty() {
        return None;
    }
    let mut lines = vec![format!(
        "{} DETAILS ({})",
        chamber.as_str().to_ascii_uppercase(),
        expression_label
    )];
    lines.extend(seats.iter().map(|(_, text)| text.clone()));
    Some(Message {
        keys: seats.iter().map(|(k, _)| k.clone()).collect(),
        text: lines.join("\n"),
    })
}

pub fn format_polls(entries: &[FeedEntry]) -> String {
    entries
        .iter()
        .map(|e| format!("{}\n\nPubDate: {}", e.title, e.pub_date))
        .collect::<Vec<_>>()
        .join("\n\n--\n\n")
}
