use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

pub const FROM_STOP: &str = "fromStop";
pub const TO_STOP: &str = "toStop";
pub const LINE_NUMBER: &str = "lineNumber";

/// A slot as it arrives from the NLU layer, before any resolution.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSlot {
    #[serde(default)]
    pub name: String,
    pub value: Option<String>,
    /// Kept untyped so a malformed resolution block degrades to "unvalidated"
    /// instead of failing the whole request.
    pub resolutions: Option<serde_json::Value>,
}

impl RawSlot {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
            resolutions: None,
        }
    }

    pub fn with_resolution(mut self, code: &str, candidates: &[&str]) -> Self {
        let values: Vec<_> = candidates
            .iter()
            .map(|c| serde_json::json!({ "value": { "name": c } }))
            .collect();

        self.resolutions = Some(serde_json::json!({
            "resolutionsPerAuthority": [{
                "status": { "code": code },
                "values": values,
            }]
        }));
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Resolutions {
    #[serde(default)]
    resolutions_per_authority: Vec<Authority>,
}

#[derive(Debug, Deserialize)]
struct Authority {
    status: Status,
    #[serde(default)]
    values: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Status {
    code: StatusCode,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
enum StatusCode {
    #[serde(rename = "ER_SUCCESS_MATCH", alias = "SUCCESS_MATCH")]
    SuccessMatch,
    #[serde(rename = "ER_SUCCESS_NO_MATCH", alias = "SUCCESS_NO_MATCH")]
    SuccessNoMatch,
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    value: CandidateValue,
}

#[derive(Debug, Deserialize)]
struct CandidateValue {
    name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SlotValue {
    pub synonym: String,
    pub resolved: String,
    pub is_validated: bool,
}

impl SlotValue {
    fn unvalidated(spoken: &str) -> Self {
        Self {
            synonym: spoken.to_string(),
            resolved: spoken.to_string(),
            is_validated: false,
        }
    }
}

pub type Slots = HashMap<String, SlotValue>;

/// Resolves every slot that carries a spoken value. Slots without a value are
/// left out of the result.
pub fn resolve_slots(raw: &HashMap<String, RawSlot>) -> Slots {
    raw.iter()
        .filter_map(|(key, slot)| {
            let spoken = slot.value.as_deref().filter(|v| !v.trim().is_empty())?;
            Some((key.clone(), resolve_slot(spoken, slot.resolutions.as_ref())))
        })
        .collect()
}

fn resolve_slot(spoken: &str, resolutions: Option<&serde_json::Value>) -> SlotValue {
    let Some(resolutions) = resolutions else {
        return SlotValue::unvalidated(spoken);
    };

    let resolutions: Resolutions = match serde_json::from_value(resolutions.clone()) {
        Ok(r) => r,
        Err(e) => {
            debug!("ignoring malformed resolutions for {spoken:?}: {e}");
            return SlotValue::unvalidated(spoken);
        }
    };

    match resolutions.resolutions_per_authority.first() {
        Some(Authority {
            status:
                Status {
                    code: StatusCode::SuccessMatch,
                },
            values,
        }) if !values.is_empty() => SlotValue {
            synonym: spoken.to_string(),
            resolved: values[0].value.name.clone(),
            is_validated: true,
        },
        _ => SlotValue::unvalidated(spoken),
    }
}

/// The resolved value of `name`, only if the resolution authority matched it.
pub fn validated<'a>(slots: &'a Slots, name: &str) -> Option<&'a str> {
    slots
        .get(name)
        .filter(|s| s.is_validated)
        .map(|s| s.resolved.as_str())
}
