//! Vote aggregation for a finalized work item.
//!
//! Numeric rooms get a mean over every vote that parses as a finite
//! decimal number. Parsing uses Rust's `f64` grammar, which is
//! locale-invariant (`.` is the only decimal separator). The mean is
//! rounded to one decimal place **half away from zero**, so a mean of
//! 2.25 is shown as 2.3 and -2.25 as -2.3.
//!
//! Free-text rooms never get an average. In both modes every vote,
//! including empty and unparseable ones, is recorded verbatim.

use serde::{Deserialize, Serialize};

/// One participant's final vote on a completed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResult {
    pub name: String,
    pub vote: String,
}

impl VoteResult {
    pub fn new(name: impl Into<String>, vote: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vote: vote.into(),
        }
    }
}

/// History entry captured when the active item is finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedRecord {
    pub title: String,
    pub average: Option<f64>,
    pub results: Vec<VoteResult>,
}

/// Build the history record for a just-completed item.
pub fn finalize(title: &str, is_free_text: bool, results: Vec<VoteResult>) -> CompletedRecord {
    let average = if is_free_text {
        None
    } else {
        numeric_average(results.iter().map(|r| r.vote.as_str()))
    };
    CompletedRecord {
        title: title.to_string(),
        average,
        results,
    }
}

/// Mean of the parseable votes, rounded to one decimal place.
///
/// Returns `None` when no vote parses. Votes near `f64::MAX` do not
/// overflow the mean.
pub fn numeric_average<'a>(votes: impl IntoIterator<Item = &'a str>) -> Option<f64> {
    let parsed: Vec<f64> = votes.into_iter().filter_map(parse_vote).collect();
    if parsed.is_empty() {
        return None;
    }

    let count = parsed.len() as f64;
    let sum: f64 = parsed.iter().sum();
    let mean = if sum.is_finite() {
        sum / count
    } else {
        // Each term is at most MAX / count, so this sum stays finite.
        parsed.iter().map(|v| v / count).sum()
    };
    Some(round_one_decimal(mean))
}

/// Parse a single vote. Empty, non-numeric and non-finite votes yield `None`.
pub fn parse_vote(vote: &str) -> Option<f64> {
    let trimmed = vote.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Round to one decimal place, ties away from zero.
///
/// Values too large to scale are already whole numbers and come back
/// unchanged.
pub fn round_one_decimal(value: f64) -> f64 {
    let scaled = value * 10.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 10.0
}
