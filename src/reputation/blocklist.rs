use anyhow::{anyhow, Result};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct ThreatMatchResponse {
    #[serde(default)]
    matches: Vec<serde_json::Value>,
}

/// Malicious-URL block-list lookup against the Safe Browsing
/// `threatMatches:find` endpoint, keyed by the full URL.
#[derive(Debug, Clone)]
pub struct BlocklistSource {
    client: reqwest::Client,
    endpoint: String,
    use_mock: bool,
}

impl BlocklistSource {
    pub fn new(endpoint: String, timeout_seconds: u64, use_mock: bool) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            endpoint,
            use_mock,
        }
    }

    pub async fn is_flagged(&self, url: &str) -> Result<bool> {
        if self.use_mock {
            return Ok(url.contains("flagged.example"));
        }

        let body = json!({
            "client": {
                "clientId": "mailscope",
                "clientVersion": env!("CARGO_PKG_VERSION"),
            },
            "threatInfo": {
                "threatTypes": [
                    "MALWARE",
                    "SOCIAL_ENGINEERING",
                    "UNWANTED_SOFTWARE",
                    "POTENTIALLY_HARMFUL_APPLICATION"
                ],
                "platformTypes": ["ANY_PLATFORM"],
                "threatEntryTypes": ["URL"],
                "threatEntries": [{ "url": url }]
            }
        });

        let response = self
            .client
            .post(format!(
                "{}/v4/threatMatches:find",
                self.endpoint.trim_end_matches('/')
            ))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("block-list API returned {}", response.status()));
        }

        let data: ThreatMatchResponse = response.json().await?;
        Ok(!data.matches.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_flagging() {
        let source = BlocklistSource::new("https://safebrowsing.invalid".to_string(), 1, true);
        assert!(source
            .is_flagged("http://flagged.example/verify")
            .await
            .unwrap());
        assert!(!source.is_flagged("http://example.com/").await.unwrap());
    }
}
