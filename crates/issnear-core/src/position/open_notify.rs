//! Open Notify "ISS now" feed.
//!
//! The endpoint answers with string-typed coordinates:
//!
//! ```text
//! {"message": "success", "timestamp": 1700000000,
//!  "iss_position": {"latitude": "-12.3456", "longitude": "98.7654"}}
//! ```

use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;

use crate::error::PositionError;
use crate::geo::Coordinate;

use super::TargetFeed;

pub const DEFAULT_ENDPOINT: &str = "http://api.open-notify.org/iss-now.json";

#[derive(Debug, Deserialize)]
struct IssNowResponse {
    message: String,
    #[serde(default)]
    iss_position: Option<IssPosition>,
}

#[derive(Debug, Deserialize)]
struct IssPosition {
    latitude: String,
    longitude: String,
}

/// Parse an `iss-now.json` body into a coordinate.
///
/// Anything other than `"message": "success"` with two parseable, in-range
/// coordinates is an error.
pub fn parse_iss_now(body: &str) -> Result<Coordinate, PositionError> {
    let response: IssNowResponse =
        serde_json::from_str(body).map_err(|e| PositionError::Parse(e.to_string()))?;

    if response.message != "success" {
        return Err(PositionError::Status {
            status: response.message,
        });
    }

    let pos = response
        .iss_position
        .ok_or_else(|| PositionError::Parse("missing iss_position".into()))?;
    let latitude = parse_degrees("latitude", &pos.latitude)?;
    let longitude = parse_degrees("longitude", &pos.longitude)?;

    Ok(Coordinate::try_new(latitude, longitude)?)
}

fn parse_degrees(field: &str, raw: &str) -> Result<f64, PositionError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| PositionError::Parse(format!("{field} '{raw}' is not a number")))
}

/// HTTP client for the Open Notify feed.
#[derive(Debug, Clone)]
pub struct OpenNotifyClient {
    client: Client,
    endpoint: String,
}

impl OpenNotifyClient {
    /// Build a client for `endpoint`. `timeout` bounds each request.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, PositionError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl TargetFeed for OpenNotifyClient {
    async fn fetch_position(&self) -> Result<Coordinate, PositionError> {
        let body = self
            .client
            .get(&self.endpoint)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        parse_iss_now(&body)
    }
}
