use std::future::Future;

use reqwest::Client;
use tracing::{debug, error};

use crate::{departures::DepartureBoard, stops::EffectiveQuery};

#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("departure board not reachable at {0}")]
    NotReachable(String),
    #[error("departure board returned status {0}")]
    Status(u16),
    #[error("failed to parse departure board: {0}")]
    Parse(String),
}

/// Composite location key the board expects for a stop name.
pub fn stop_key(name: &str) -> String {
    format!("A=1@O={name}")
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardQuery {
    pub from_stop: String,
    pub to_stop: Option<String>,
    pub duration: Option<u32>,
    pub max_journeys: Option<u32>,
}

impl BoardQuery {
    pub fn new(query: &EffectiveQuery) -> Self {
        Self {
            from_stop: query.from_stop.clone(),
            to_stop: query.to_stop.clone(),
            duration: None,
            max_journeys: None,
        }
    }

    pub fn with_limits(mut self, duration: Option<u32>, max_journeys: Option<u32>) -> Self {
        self.duration = duration;
        self.max_journeys = max_journeys;
        self
    }

    fn params(&self, access_id: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("accessId", access_id.to_string()),
            ("format", "json".to_string()),
            ("filterEquiv", "0".to_string()),
            ("id", stop_key(&self.from_stop)),
        ];

        if let Some(to) = &self.to_stop {
            params.push(("direction", stop_key(to)));
        }
        if let Some(duration) = self.duration {
            params.push(("duration", duration.to_string()));
        }
        if let Some(max) = self.max_journeys {
            params.push(("maxJourneys", max.to_string()));
        }

        params
    }
}

pub trait DepartureSource {
    type Error: std::fmt::Display;

    /// Fetches the board for one query; no retries.
    fn departures(
        &self,
        query: &BoardQuery,
    ) -> impl Future<Output = Result<DepartureBoard, Self::Error>> + Send;
}

/// Departure board over HTTP.
#[derive(Clone)]
pub struct BoardClient {
    url: String,
    access_id: String,
    client: Client,
}

impl BoardClient {
    pub fn new(url: &str, access_id: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            access_id: access_id.to_string(),
            client: Client::new(),
        }
    }
}

impl DepartureSource for BoardClient {
    type Error = BoardError;

    fn departures(
        &self,
        query: &BoardQuery,
    ) -> impl Future<Output = Result<DepartureBoard, BoardError>> + Send {
        async move {
            debug!(from = %query.from_stop, to = ?query.to_stop, "requesting departure board");

            let resp = self
                .client
                .get(&self.url)
                .query(&query.params(&self.access_id))
                .send()
                .await
                .map_err(|e| {
                    error!("cannot fetch departures: {e}");
                    BoardError::NotReachable(self.url.clone())
                })?;

            if !resp.status().is_success() {
                error!("departure board answered {}", resp.status());
                return Err(BoardError::Status(resp.status().as_u16()));
            }

            resp.json().await.map_err(|e| {
                error!("cannot parse departures: {e}");
                BoardError::Parse(e.to_string())
            })
        }
    }
}
