//! Address to coordinates lookup.
//!
//! The provider is a remote call that can be slow or fail; callers surface
//! every failure and never invent coordinates.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;

use crate::db::models::{Coordinates, PostalAddress};

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding API key is not configured")]
    MissingApiKey,

    #[error("geocoding request timed out")]
    Timeout,

    #[error("geocoding request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("geocoding provider returned {status}")]
    Provider { status: u16 },

    #[error("invalid address or not found")]
    NoResults,
}

impl From<reqwest::Error> for GeocodeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GeocodeError::Timeout
        } else {
            GeocodeError::Request(err)
        }
    }
}

#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn lookup(&self, address: &PostalAddress) -> Result<Coordinates, GeocodeError>;
}

/// OpenCage forward geocoding client.
pub struct OpenCageGeocoder {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct OpenCageResponse {
    #[serde(default)]
    results: Vec<OpenCageResult>,
}

#[derive(Debug, Deserialize)]
struct OpenCageResult {
    geometry: Coordinates,
}

impl OpenCageGeocoder {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("geoprofiles/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            client,
        })
    }
}

#[async_trait]
impl Geocoder for OpenCageGeocoder {
    async fn lookup(&self, address: &PostalAddress) -> Result<Coordinates, GeocodeError> {
        let api_key = self.api_key.as_deref().ok_or(GeocodeError::MissingApiKey)?;
        let query = address.query();

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("q", query.as_str()),
                ("key", api_key),
                ("limit", "1"),
                ("no_annotations", "1"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(GeocodeError::Provider {
                status: response.status().as_u16(),
            });
        }

        let body: OpenCageResponse = response.json().await?;
        let first = body.results.into_iter().next().ok_or(GeocodeError::NoResults)?;

        tracing::debug!(%query, lat = first.geometry.lat, lng = first.geometry.lng, "Geocoded address");
        Ok(first.geometry)
    }
}
