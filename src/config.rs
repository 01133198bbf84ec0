use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// When false, analysis is local-only: no network lookups at all.
    #[serde(default = "default_true")]
    pub enrichment_enabled: bool,
    /// Serve canned data instead of querying real services.
    #[serde(default)]
    pub use_mock_sources: bool,
    /// Timeout applied to each external lookup independently.
    #[serde(default = "default_lookup_timeout")]
    pub lookup_timeout_seconds: u64,
    #[serde(default = "default_whois_ttl")]
    pub whois_cache_ttl_seconds: u64,
    #[serde(default = "default_passive_scan_endpoint")]
    pub passive_scan_endpoint: String,
    #[serde(default = "default_blocklist_endpoint")]
    pub blocklist_endpoint: String,
    #[serde(default = "default_geoip_endpoint")]
    pub geoip_endpoint: String,
}

fn default_true() -> bool {
    true
}

fn default_lookup_timeout() -> u64 {
    8
}

fn default_whois_ttl() -> u64 {
    24 * 60 * 60
}

fn default_passive_scan_endpoint() -> String {
    "https://urlscan.io".to_string()
}

fn default_blocklist_endpoint() -> String {
    "https://safebrowsing.googleapis.com".to_string()
}

fn default_geoip_endpoint() -> String {
    "https://ipapi.co".to_string()
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            enrichment_enabled: true,
            use_mock_sources: false,
            lookup_timeout_seconds: default_lookup_timeout(),
            whois_cache_ttl_seconds: default_whois_ttl(),
            passive_scan_endpoint: default_passive_scan_endpoint(),
            blocklist_endpoint: default_blocklist_endpoint(),
            geoip_endpoint: default_geoip_endpoint(),
        }
    }
}

impl AnalyzerConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: AnalyzerConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
