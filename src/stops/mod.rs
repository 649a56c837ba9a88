use serde::Serialize;
use tracing::debug;

use crate::slots::{self, FROM_STOP, LINE_NUMBER, Slots, TO_STOP};

pub mod store;

pub const DEFAULT_STOP: &str = "Luxembourg, Gare Centrale";

/// Picks the origin stop: a validated `fromStop` slot, then the user's
/// favourite, then `default_stop`.
pub fn select_origin(slots: &Slots, favourite: Option<&str>, default_stop: &str) -> String {
    if let Some(stop) = slots::validated(slots, FROM_STOP) {
        return stop.to_string();
    }

    if let Some(spoken) = slots.get(FROM_STOP) {
        debug!("origin {:?} not recognised, ignoring it", spoken.synonym);
    }

    favourite
        .filter(|f| !f.trim().is_empty())
        .unwrap_or(default_stop)
        .to_string()
}

/// What a single departure query asks the board for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EffectiveQuery {
    pub from_stop: String,
    pub to_stop: Option<String>,
    pub line_filter: Option<String>,
    /// A destination the user said but which could not be matched to a stop.
    pub unrecognised_destination: Option<String>,
}

impl EffectiveQuery {
    pub fn new(from_stop: &str) -> Self {
        Self {
            from_stop: from_stop.to_string(),
            to_stop: None,
            line_filter: None,
            unrecognised_destination: None,
        }
    }

    pub fn from_slots(slots: &Slots, favourite: Option<&str>, default_stop: &str) -> Self {
        let from_stop = select_origin(slots, favourite, default_stop);
        let to_stop = slots::validated(slots, TO_STOP).map(str::to_string);
        let unrecognised_destination = match slots.get(TO_STOP) {
            Some(s) if !s.is_validated => Some(s.synonym.clone()),
            _ => None,
        };

        Self {
            from_stop,
            to_stop,
            line_filter: line_filter(slots),
            unrecognised_destination,
        }
    }
}

// Line numbers usually come from a numeric slot type with no resolution
// authority, so a purely numeric value counts as recognised.
fn line_filter(slots: &Slots) -> Option<String> {
    if let Some(line) = slots::validated(slots, LINE_NUMBER) {
        return Some(line.to_string());
    }

    slots
        .get(LINE_NUMBER)
        .map(|s| s.resolved.trim())
        .filter(|v| !v.is_empty() && v.chars().all(|c| c.is_ascii_digit()))
        .map(str::to_string)
}
