pub mod blocklist;
pub mod domain_age;
pub mod local;
pub mod passive_scan;

use crate::config::AnalyzerConfig;
use blocklist::BlocklistSource;
use chrono::{DateTime, Utc};
use domain_age::DomainAgeSource;
use local::{LocalUrlRules, LocalVerdict};
use passive_scan::{PassiveScanReport, PassiveScanSource};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::timeout;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlComponents {
    pub url: String,
    pub domain: String,
    pub path: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlReputation {
    pub score: u8,
    pub categories: Vec<String>,
    /// Comma-joined list of the stages that actually returned data,
    /// always starting with "Local Analysis".
    pub source: String,
    pub last_checked: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UrlRecord {
    pub url: String,
    pub domain: String,
    pub path: String,
    pub protocol: String,
    pub suspicious: bool,
    pub reasons: Vec<String>,
    pub reputation: Option<UrlReputation>,
}

/// Result of one external lookup: data, or skipped. Timeouts, rate limits
/// and transport errors all collapse to `Skipped` so one failing source
/// never blocks the others.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceOutcome<T> {
    Data(T),
    Skipped,
}

impl<T> SourceOutcome<T> {
    fn from_lookup(
        result: Result<anyhow::Result<T>, tokio::time::error::Elapsed>,
        source: &str,
    ) -> Self {
        match result {
            Ok(Ok(value)) => SourceOutcome::Data(value),
            Ok(Err(e)) => {
                log::debug!("{source} source skipped: {e}");
                SourceOutcome::Skipped
            }
            Err(_) => {
                log::debug!("{source} source timed out");
                SourceOutcome::Skipped
            }
        }
    }
}

/// Parse a URL into components with the url crate, falling back to a
/// manual split on "://" and the first "/" when that fails. Never fails.
pub fn parse_url_components(url: &str) -> UrlComponents {
    if let Ok(parsed) = Url::parse(url) {
        if let Some(host) = parsed.host_str() {
            let mut path = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                path.push('?');
                path.push_str(query);
            }
            if let Some(fragment) = parsed.fragment() {
                path.push('#');
                path.push_str(fragment);
            }
            return UrlComponents {
                url: url.to_string(),
                // The parser lowercases hostnames; keep the message's
                // casing so typosquatting checks can see it.
                domain: domain_with_original_case(url, host),
                path,
                protocol: parsed.scheme().to_string(),
            };
        }
    }

    let protocol = url.split("://").next().unwrap_or("http").to_string();
    let without_protocol = url.splitn(2, "://").nth(1).unwrap_or(url);
    let domain = without_protocol
        .split('/')
        .next()
        .unwrap_or(without_protocol)
        .to_string();
    let path = match without_protocol.find('/') {
        Some(pos) => without_protocol[pos..].to_string(),
        None => "/".to_string(),
    };

    UrlComponents {
        url: url.to_string(),
        domain,
        path,
        protocol,
    }
}

fn domain_with_original_case(url: &str, host: &str) -> String {
    let after_scheme = url.splitn(2, "://").nth(1).unwrap_or(url);
    let authority = after_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or(after_scheme);
    let authority = authority.rsplit('@').next().unwrap_or(authority);
    if let Some(pos) = authority.to_lowercase().find(&host.to_lowercase()) {
        if pos + host.len() <= authority.len() {
            return authority[pos..pos + host.len()].to_string();
        }
    }
    host.to_string()
}

/// Extracts URLs from message bodies, scores them locally, and enriches
/// them through independent external sources with per-source failure
/// isolation. Results are memoized per session, keyed by URL string.
pub struct UrlReputationEngine {
    extractor: Regex,
    rules: LocalUrlRules,
    domain_age: DomainAgeSource,
    passive_scan: PassiveScanSource,
    blocklist: BlocklistSource,
    cache: Arc<RwLock<HashMap<String, UrlRecord>>>,
    lookup_timeout: Duration,
    enrichment_enabled: bool,
}

impl UrlReputationEngine {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self {
            extractor: Regex::new(r"https?://[^\s]+").unwrap(),
            rules: LocalUrlRules::new(),
            domain_age: DomainAgeSource::new(
                config.lookup_timeout_seconds,
                config.whois_cache_ttl_seconds,
                config.use_mock_sources,
            ),
            passive_scan: PassiveScanSource::new(
                config.passive_scan_endpoint.clone(),
                config.lookup_timeout_seconds,
                config.use_mock_sources,
            ),
            blocklist: BlocklistSource::new(
                config.blocklist_endpoint.clone(),
                config.lookup_timeout_seconds,
                config.use_mock_sources,
            ),
            cache: Arc::new(RwLock::new(HashMap::new())),
            lookup_timeout: Duration::from_secs(config.lookup_timeout_seconds),
            enrichment_enabled: config.enrichment_enabled,
        }
    }

    pub fn extract_urls(&self, body: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.extractor
            .find_iter(body)
            .map(|m| m.as_str().to_string())
            .filter(|url| seen.insert(url.clone()))
            .collect()
    }

    /// Analyze every URL in the body. Independent URLs are enriched
    /// concurrently; each URL's three sources fan out concurrently too.
    pub async fn analyze_body(&self, body: &str) -> Vec<UrlRecord> {
        let urls = self.extract_urls(body);
        futures::future::join_all(urls.iter().map(|url| self.analyze_url(url))).await
    }

    /// Local scoring only, no I/O. Used by offline analysis and anything
    /// that needs a deterministic pass.
    pub fn analyze_body_local(&self, body: &str) -> Vec<UrlRecord> {
        self.extract_urls(body)
            .iter()
            .map(|url| {
                let components = parse_url_components(url);
                let local = self.rules.evaluate(&components.domain, &components.path);
                aggregate(
                    components,
                    local,
                    SourceOutcome::Skipped,
                    SourceOutcome::Skipped,
                    SourceOutcome::Skipped,
                )
            })
            .collect()
    }

    async fn analyze_url(&self, url: &str) -> UrlRecord {
        {
            let cache = self.cache.read().await;
            if let Some(hit) = cache.get(url) {
                log::debug!("reputation cache hit for {url}");
                return hit.clone();
            }
        }

        let components = parse_url_components(url);
        let local = self.rules.evaluate(&components.domain, &components.path);

        let (age, scan, flagged) = if self.enrichment_enabled {
            self.enrich(url, &components.domain).await
        } else {
            (
                SourceOutcome::Skipped,
                SourceOutcome::Skipped,
                SourceOutcome::Skipped,
            )
        };

        let record = aggregate(components, local, age, scan, flagged);
        let mut cache = self.cache.write().await;
        cache.insert(url.to_string(), record.clone());
        record
    }

    /// Fan out the three lookups for one URL. Each carries its own
    /// timeout; all are awaited before aggregation (wait-all, not
    /// best-of-first-response).
    async fn enrich(
        &self,
        url: &str,
        domain: &str,
    ) -> (
        SourceOutcome<u32>,
        SourceOutcome<PassiveScanReport>,
        SourceOutcome<bool>,
    ) {
        let (age, scan, flagged) = tokio::join!(
            timeout(self.lookup_timeout, self.domain_age.age_days(domain)),
            timeout(self.lookup_timeout, self.passive_scan.lookup(domain)),
            timeout(self.lookup_timeout, self.blocklist.is_flagged(url)),
        );

        // A registry that answered without a creation date gives us no age
        // to score; treat it like a skipped source.
        let age = match SourceOutcome::from_lookup(age, "domain-age") {
            SourceOutcome::Data(Some(days)) => SourceOutcome::Data(days),
            _ => SourceOutcome::Skipped,
        };

        (
            age,
            SourceOutcome::from_lookup(scan, "passive-scan"),
            SourceOutcome::from_lookup(flagged, "block-list"),
        )
    }
}

/// Deterministically merge the local verdict with whichever sources
/// returned data. Pure; the full combination rule lives here.
fn aggregate(
    components: UrlComponents,
    local: LocalVerdict,
    age: SourceOutcome<u32>,
    scan: SourceOutcome<PassiveScanReport>,
    flagged: SourceOutcome<bool>,
) -> UrlRecord {
    let mut score = local.score;
    let mut suspicious = local.suspicious;
    let mut reasons = local.reasons;
    let mut categories = local.categories;
    let mut sources = vec!["Local Analysis"];

    if let SourceOutcome::Data(days) = age {
        sources.push("WHOIS");
        if days < 30 {
            score += 25;
            suspicious = true;
            categories.push("Recently Registered Domain".to_string());
            reasons.push("Domain registered less than 30 days ago".to_string());
        }
    }

    if let SourceOutcome::Data(report) = scan {
        sources.push("URLScan.io");
        if report.malicious {
            score += 40;
            suspicious = true;
            reasons.push("Reported as malicious by URLScan.io".to_string());
        }
        categories.extend(report.categories);
    }

    if let SourceOutcome::Data(hit) = flagged {
        sources.push("Google Safe Browsing");
        if hit {
            score += 50;
            suspicious = true;
            categories.push("Flagged by Google Safe Browsing".to_string());
            reasons.push("URL is flagged as malicious by Google Safe Browsing".to_string());
        }
    }

    UrlRecord {
        url: components.url,
        domain: components.domain,
        path: components.path,
        protocol: components.protocol,
        suspicious,
        reasons,
        reputation: Some(UrlReputation {
            score: score.min(100) as u8,
            categories: dedup_preserving_order(categories),
            source: sources.join(", "),
            last_checked: Utc::now(),
        }),
    }
}

fn dedup_preserving_order(values: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}
