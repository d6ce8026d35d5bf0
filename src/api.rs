use crate::config::ApiConfig;
use crate::error::LookupError;
use crate::models::{Coordinate, LocationRecord, LookupQuery, TimezoneResponse};
use async_trait::async_trait;
use color_eyre::Result;
use reqwest::{Client, Response};
use std::time::Duration;
use tracing::debug;

/// Resolves an IP address or domain to a location record.
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup(&self, query: &LookupQuery) -> Result<LocationRecord, LookupError>;
}

/// Resolves a coordinate to a timezone label.
#[async_trait]
pub trait TimezoneLookup: Send + Sync {
    async fn timezone(&self, at: Coordinate) -> Result<String, LookupError>;
}

fn http_client(timeout_seconds: u64) -> Result<Client> {
    Ok(Client::builder()
        .timeout(Duration::from_secs(timeout_seconds))
        .build()?)
}

/// Collapses non-2xx statuses and unparsable bodies into [`LookupError`].
async fn read_json<T: serde::de::DeserializeOwned>(res: Response) -> Result<T, LookupError> {
    let status = res.status();
    if !status.is_success() {
        return Err(LookupError::Status(status));
    }
    let body = res.text().await?;
    Ok(serde_json::from_str(&body)?)
}

/// Client for the ipify-style geolocation API.
pub struct GeoClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl GeoClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.request_timeout_seconds)?,
            endpoint: config.geo_endpoint.clone(),
            api_key: config.geo_api_key.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl GeoLookup for GeoClient {
    async fn lookup(&self, query: &LookupQuery) -> Result<LocationRecord, LookupError> {
        let (ip_address, domain) = query.as_params();
        debug!("Geolocation request: ipAddress={:?} domain={:?}", ip_address, domain);

        let res = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("apiKey", self.api_key.as_str()),
                ("ipAddress", ip_address),
                ("domain", domain),
            ])
            .send()
            .await?;

        let record: LocationRecord = read_json(res).await?;
        if !record.coordinate().is_valid() {
            return Err(LookupError::Malformed(format!(
                "coordinate out of range: ({}, {})",
                record.location.lat, record.location.lng
            )));
        }
        Ok(record)
    }
}

/// Client for the API Ninjas timezone endpoint.
pub struct TimezoneClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl TimezoneClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.request_timeout_seconds)?,
            endpoint: config.timezone_endpoint.clone(),
            api_key: config.timezone_api_key.clone().unwrap_or_default(),
        })
    }
}

#[async_trait]
impl TimezoneLookup for TimezoneClient {
    async fn timezone(&self, at: Coordinate) -> Result<String, LookupError> {
        debug!("Timezone request for {}", at);

        let res = self
            .client
            .get(&self.endpoint)
            .header("X-Api-Key", self.api_key.as_str())
            .query(&[("lat", at.lat), ("lon", at.lon)])
            .send()
            .await?;

        let body: TimezoneResponse = read_json(res).await?;
        Ok(body.timezone)
    }
}
