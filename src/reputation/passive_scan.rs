use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::time::Duration;

/// What the passive-scan source reports for a domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PassiveScanReport {
    pub malicious: bool,
    pub categories: Vec<String>,
}

/// Wire shape of the urlscan.io search response; only the fields we
/// consume.
#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    #[serde(default)]
    tags: Vec<String>,
    verdicts: Option<Verdicts>,
}

#[derive(Debug, Deserialize)]
struct Verdicts {
    overall: Option<OverallVerdict>,
}

#[derive(Debug, Deserialize)]
struct OverallVerdict {
    #[serde(default)]
    malicious: bool,
    #[serde(default)]
    threats: Vec<Threat>,
}

#[derive(Debug, Deserialize)]
struct Threat {
    tag: Option<String>,
}

/// Passive-scan lookup against the urlscan.io search API. Rate limits and
/// transport errors surface as `Err` and are treated as a skipped source
/// by the caller.
#[derive(Debug, Clone)]
pub struct PassiveScanSource {
    client: reqwest::Client,
    endpoint: String,
    use_mock: bool,
}

impl PassiveScanSource {
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

    pub async fn lookup(&self, domain: &str) -> Result<PassiveScanReport> {
        if self.use_mock {
            return self.mock_lookup(domain);
        }

        let url = format!(
            "{}/api/v1/search/?q=domain:\"{}\"&size=10",
            self.endpoint.trim_end_matches('/'),
            domain
        );
        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        if response.status().as_u16() == 429 {
            return Err(anyhow!("passive-scan rate limit reached"));
        }
        if !response.status().is_success() {
            return Err(anyhow!("passive-scan API returned {}", response.status()));
        }

        let data: SearchResponse = response.json().await?;
        Ok(Self::summarize(data))
    }

    fn summarize(data: SearchResponse) -> PassiveScanReport {
        let malicious = data.results.iter().any(|result| {
            result
                .verdicts
                .as_ref()
                .and_then(|v| v.overall.as_ref())
                .map(|o| o.malicious)
                .unwrap_or(false)
        });

        let mut categories = Vec::new();
        for result in &data.results {
            categories.extend(result.tags.iter().cloned());
            if let Some(overall) = result.verdicts.as_ref().and_then(|v| v.overall.as_ref()) {
                categories.extend(overall.threats.iter().filter_map(|t| t.tag.clone()));
            }
        }
        categories.dedup();

        PassiveScanReport {
            malicious,
            categories,
        }
    }

    fn mock_lookup(&self, domain: &str) -> Result<PassiveScanReport> {
        match domain {
            "fresh-phish.net" => Ok(PassiveScanReport {
                malicious: true,
                categories: vec!["phishing".to_string()],
            }),
            "rate-limited.example" => Err(anyhow!("passive-scan rate limit reached")),
            _ => Ok(PassiveScanReport::default()),
        }
    }
}
