use anyhow::Result;
use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use itertools::Itertools;
use serde::Serialize;

use crate::{
    departures::{DepartureBoard, DepartureRecord, DepartureTimes, relative::relative_phrase},
    stops::EffectiveQuery,
};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Card {
    pub title: String,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Spoken {
    pub speech: String,
    pub card: Option<Card>,
}

/// Apology for an empty board, echoing back every constraint that was applied.
pub fn no_departures(query: &EffectiveQuery) -> String {
    let line = query.line_filter.as_ref().map(|l| format!("of line {l}"));
    let to = query.to_stop.as_ref().map(|t| format!("to {t}"));
    let from = Some(format!("from {}", query.from_stop));

    format!(
        "Sorry, I couldn't find any departures {}.",
        [line, to, from].into_iter().flatten().join(" ")
    )
}

fn destination_caveat(query: &EffectiveQuery) -> String {
    match &query.unrecognised_destination {
        Some(spoken) => format!(
            "I didn't recognise the destination {spoken}, so here is the next departure in any direction. "
        ),
        None => String::new(),
    }
}

/// "10:05 (+5)": the due time on the clock, then the signed delay in minutes.
pub fn due_label(times: &DepartureTimes) -> String {
    format!("{} ({:+})", times.due.format("%H:%M"), times.delay_minutes)
}

pub fn departure_speech<Z: TimeZone>(
    record: &DepartureRecord,
    query: &EffectiveQuery,
    tz: Tz,
    now: &DateTime<Z>,
) -> Result<Spoken> {
    let times = record.times(tz)?;
    let when = relative_phrase(&times.due, now);

    let stop = if record.stop.is_empty() {
        &query.from_stop
    } else {
        &record.stop
    };

    let speech = format!(
        "{}The {} to {} is leaving {} from {}.",
        destination_caveat(query),
        record.name,
        record.direction,
        when,
        stop
    );

    let card = Card {
        title: due_label(&times),
        content: speech.clone(),
    };

    Ok(Spoken {
        speech,
        card: Some(card),
    })
}

/// Speech for the first matching departure on the board, or the apology when
/// there is none.
pub fn board_speech<Z: TimeZone>(
    board: &DepartureBoard,
    query: &EffectiveQuery,
    tz: Tz,
    now: &DateTime<Z>,
) -> Result<Spoken> {
    match board.next_departure(query.line_filter.as_deref()) {
        Some(record) => departure_speech(record, query, tz, now),
        None => Ok(Spoken {
            speech: no_departures(query),
            card: None,
        }),
    }
}
