//! Geolocation lookup for resolved addresses.

use std::net::IpAddr;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Location fields for one address, as far as the provider knows them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoInfo {
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub city: Option<String>,
    pub country: Option<String>,
    pub isp: Option<String>,
}

/// Looks up geolocation data for an address.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    async fn locate(&self, ip: IpAddr) -> Result<GeoInfo>;
}

/// Client for an ip-api.com-compatible JSON endpoint.
pub struct IpApiClient {
    client: reqwest::Client,
    endpoint: String,
}

impl IpApiClient {
    /// Client against `endpoint`, e.g. `http://ip-api.com/json`.
    pub fn new(endpoint: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
        }
    }
}

/// Raw response payload of the ip-api.com JSON endpoint.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    status: Option<String>,
    lat: Option<f64>,
    lon: Option<f64>,
    city: Option<String>,
    country: Option<String>,
    org: Option<String>,
}

#[async_trait]
impl GeoProvider for IpApiClient {
    async fn locate(&self, ip: IpAddr) -> Result<GeoInfo> {
        let url = format!(
            "{}/{}?fields=status,lat,lon,city,country,org",
            self.endpoint, ip
        );
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("geolocation request failed for {ip}"))?
            .error_for_status()
            .context("geolocation request returned an error status")?;
        let payload: IpApiResponse = response
            .json()
            .await
            .context("geolocation response was not valid JSON")?;

        if payload.status.as_deref() != Some("success") {
            bail!(
                "geolocation lookup for {ip} returned status {:?}",
                payload.status
            );
        }

        Ok(GeoInfo {
            lat: payload.lat,
            lon: payload.lon,
            city: payload.city,
            country: payload.country,
            isp: payload.org,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const IP: IpAddr = IpAddr::V4(std::net::Ipv4Addr::new(203, 0, 113, 9));

    #[tokio::test]
    async fn test_locate_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/203.0.113.9"))
            .and(query_param("fields", "status,lat,lon,city,country,org"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "success",
                "lat": 52.52,
                "lon": 13.405,
                "city": "Berlin",
                "country": "Germany",
                "org": "Example Hosting GmbH"
            })))
            .mount(&server)
            .await;

        let client = IpApiClient::new(&server.uri());
        let info = client.locate(IP).await.unwrap();
        assert_eq!(info.lat, Some(52.52));
        assert_eq!(info.city.as_deref(), Some("Berlin"));
        assert_eq!(info.isp.as_deref(), Some("Example Hosting GmbH"));
    }

    #[tokio::test]
    async fn test_locate_omitted_fields_stay_absent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "success"})))
            .mount(&server)
            .await;

        let client = IpApiClient::new(&server.uri());
        let info = client.locate(IP).await.unwrap();
        assert_eq!(info, GeoInfo::default());
    }

    #[tokio::test]
    async fn test_locate_fail_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"status": "fail", "message": "private range"})),
            )
            .mount(&server)
            .await;

        let client = IpApiClient::new(&server.uri());
        assert!(client.locate(IP).await.is_err());
    }

    #[tokio::test]
    async fn test_locate_http_error_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = IpApiClient::new(&server.uri());
        assert!(client.locate(IP).await.is_err());
    }
}
