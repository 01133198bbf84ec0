use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// Geolocation facts for an IPv4 address, attached to `spf.ip` as an
/// enrichment side-channel.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IpInfo {
    pub country: Option<String>,
    pub country_code: Option<String>,
    pub region: Option<String>,
    pub region_name: Option<String>,
    pub city: Option<String>,
    pub zip: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub org: Option<String>,
    pub asn: Option<String>,
}

/// Wire shape of the ipapi.co response; only the fields we consume.
#[derive(Debug, Deserialize)]
struct IpApiResponse {
    #[serde(default)]
    error: bool,
    country_name: Option<String>,
    country_code: Option<String>,
    region_code: Option<String>,
    region: Option<String>,
    city: Option<String>,
    postal: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
    timezone: Option<String>,
    org: Option<String>,
    asn: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeoIpResolver {
    client: reqwest::Client,
    endpoint: String,
    cache: Arc<RwLock<HashMap<String, Option<IpInfo>>>>,
    use_mock: bool,
}

impl GeoIpResolver {
    pub fn new(endpoint: String, timeout_seconds: u64, use_mock: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            client,
            endpoint,
            cache: Arc::new(RwLock::new(HashMap::new())),
            use_mock,
        }
    }

    /// Resolve geolocation for an IPv4 address. Lookup failures degrade to
    /// `None`; resolution is cached per session.
    pub async fn resolve(&self, ip: &str) -> Option<IpInfo> {
        {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.get(ip) {
                return cached.clone();
            }
        }

        let resolved = if self.use_mock {
            self.mock_lookup(ip)
        } else {
            match self.lookup(ip).await {
                Ok(info) => Some(info),
                Err(e) => {
                    log::debug!("geolocation lookup for {ip} skipped: {e}");
                    None
                }
            }
        };

        let mut cache = self.cache.write().await;
        cache.insert(ip.to_string(), resolved.clone());
        resolved
    }

    async fn lookup(&self, ip: &str) -> Result<IpInfo> {
        let url = format!("{}/{}/json", self.endpoint.trim_end_matches('/'), ip);
        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(anyhow!("geolocation API returned {}", response.status()));
        }

        let data: IpApiResponse = response.json().await?;
        if data.error {
            return Err(anyhow!("geolocation API reported an error for {ip}"));
        }

        Ok(IpInfo {
            country: data.country_name,
            country_code: data.country_code,
            region: data.region_code,
            region_name: data.region,
            city: data.city,
            zip: data.postal,
            lat: data.latitude,
            lon: data.longitude,
            timezone: data.timezone,
            isp: data.org.clone(),
            org: data.org,
            asn: data.asn,
        })
    }

    fn mock_lookup(&self, ip: &str) -> Option<IpInfo> {
        let mut info = IpInfo {
            country: Some("United States".to_string()),
            country_code: Some("US".to_string()),
            region: Some("CA".to_string()),
            region_name: Some("California".to_string()),
            city: Some("Mountain View".to_string()),
            zip: None,
            lat: None,
            lon: None,
            timezone: Some("America/Los_Angeles".to_string()),
            isp: Some("Example ISP".to_string()),
            org: Some("Example ISP".to_string()),
            asn: Some("AS64500".to_string()),
        };
        if ip.starts_with("192.0.2.") {
            info.country = Some("Netherlands".to_string());
            info.country_code = Some("NL".to_string());
        }
        Some(info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_resolution_cached() {
        let resolver = GeoIpResolver::new("https://ipapi.invalid".to_string(), 1, true);
        let first = resolver.resolve("192.0.2.1").await;
        let second = resolver.resolve("192.0.2.1").await;
        assert_eq!(first, second);
        assert_eq!(first.unwrap().country_code.as_deref(), Some("NL"));
    }
}
