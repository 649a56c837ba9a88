use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

pub mod client;
pub mod format;
pub mod relative;

pub fn parse_hhmmss(s: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .with_context(|| format!("bad time (HH:MM:SS): {s}"))
}

pub fn parse_yyyymmdd(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("bad date (YYYY-MM-DD): {s}"))
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Product {
    pub name: Option<String>,
    pub num: Option<String>,
    pub line: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Products {
    One(Product),
    Many(Vec<Product>),
}

impl Products {
    fn first(&self) -> Option<&Product> {
        match self {
            Products::One(p) => Some(p),
            Products::Many(ps) => ps.first(),
        }
    }
}

/// One row of the departure board.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartureRecord {
    pub name: String,
    #[serde(default)]
    pub direction: String,
    #[serde(default)]
    pub stop: String,
    pub date: String,
    pub time: String,
    pub rt_date: Option<String>,
    pub rt_time: Option<String>,
    #[serde(rename = "Product")]
    pub product: Option<Products>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DepartureTimes {
    pub scheduled: DateTime<Tz>,
    pub due: DateTime<Tz>,
    pub delay_minutes: i64,
}

impl DepartureRecord {
    pub fn new(name: &str, direction: &str, stop: &str, date: &str, time: &str) -> Self {
        Self {
            name: name.to_string(),
            direction: direction.to_string(),
            stop: stop.to_string(),
            date: date.to_string(),
            time: time.to_string(),
            rt_date: None,
            rt_time: None,
            product: None,
        }
    }

    pub fn with_realtime(mut self, date: &str, time: &str) -> Self {
        self.rt_date = Some(date.to_string());
        self.rt_time = Some(time.to_string());
        self
    }

    /// The line number, from the product if the board sent one, otherwise the
    /// last word of the name ("Bus 16" -> "16").
    pub fn line(&self) -> Option<&str> {
        self.product
            .as_ref()
            .and_then(Products::first)
            .and_then(|p| p.line.as_deref().or(p.num.as_deref()))
            .or_else(|| self.name.split_whitespace().last())
    }

    pub fn serves_line(&self, line: &str) -> bool {
        self.line()
            .map(|l| l.trim().eq_ignore_ascii_case(line.trim()))
            .unwrap_or(false)
    }

    pub fn scheduled(&self) -> Result<NaiveDateTime> {
        Ok(NaiveDateTime::new(
            parse_yyyymmdd(&self.date)?,
            parse_hhmmss(&self.time)?,
        ))
    }

    /// The real-time departure, if the board has one. A real-time time without
    /// a date is taken to be on the scheduled date.
    pub fn realtime(&self) -> Result<Option<NaiveDateTime>> {
        let Some(time) = self.rt_time.as_deref() else {
            return Ok(None);
        };
        let date = self.rt_date.as_deref().unwrap_or(&self.date);

        Ok(Some(NaiveDateTime::new(
            parse_yyyymmdd(date)?,
            parse_hhmmss(time)?,
        )))
    }

    pub fn times(&self, tz: Tz) -> Result<DepartureTimes> {
        let scheduled = localise(tz, self.scheduled()?)?;
        let due = match self.realtime()? {
            Some(rt) => localise(tz, rt)?,
            None => scheduled,
        };

        Ok(DepartureTimes {
            scheduled,
            due,
            delay_minutes: (due - scheduled).num_minutes(),
        })
    }
}

fn localise(tz: Tz, naive: NaiveDateTime) -> Result<DateTime<Tz>> {
    tz.from_local_datetime(&naive)
        .earliest()
        .with_context(|| format!("{naive} does not exist in {tz}"))
}

/// The board as returned upstream. A missing `Departure` key and an empty list
/// both mean there is nothing to report.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DepartureBoard {
    #[serde(rename = "Departure")]
    pub departures: Option<Vec<DepartureRecord>>,
}

impl DepartureBoard {
    pub fn records(&self) -> &[DepartureRecord] {
        self.departures.as_deref().unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    /// The first departure, restricted to `line` when given.
    pub fn next_departure(&self, line: Option<&str>) -> Option<&DepartureRecord> {
        self.records()
            .iter()
            .find(|d| line.map(|l| d.serves_line(l)).unwrap_or(true))
    }
}
