use anyhow::{anyhow, Result};
use chrono::{NaiveDate, Utc};
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::RwLock;
use tokio::time::timeout;

#[derive(Debug, Clone)]
struct CachedAge {
    age_days: Option<u32>,
    cached_at: Instant,
}

/// WHOIS-backed domain-age lookup. Queries the registry's WHOIS server
/// directly over TCP port 43 and extracts the creation date from the text
/// response. Results are cached per session with a TTL.
#[derive(Debug, Clone)]
pub struct DomainAgeSource {
    cache: Arc<RwLock<HashMap<String, CachedAge>>>,
    cache_ttl: Duration,
    timeout: Duration,
    use_mock: bool,
}

impl DomainAgeSource {
    pub fn new(timeout_seconds: u64, cache_ttl_seconds: u64, use_mock: bool) -> Self {
        Self {
            cache: Arc::new(RwLock::new(HashMap::new())),
            cache_ttl: Duration::from_secs(cache_ttl_seconds),
            timeout: Duration::from_secs(timeout_seconds),
            use_mock,
        }
    }

    /// Age of the registered (root) domain in days. `Ok(None)` means the
    /// registry answered but no creation date could be extracted.
    pub async fn age_days(&self, domain: &str) -> Result<Option<u32>> {
        let root = root_domain(domain);
        if !is_queryable(&root) {
            return Err(anyhow!("not a queryable domain: {root}"));
        }

        {
            let cache = self.cache.read().await;
            if let Some(hit) = cache.get(&root) {
                if hit.cached_at.elapsed() < self.cache_ttl {
                    log::debug!("whois cache hit for {root}");
                    return Ok(hit.age_days);
                }
            }
        }

        let age_days = if self.use_mock {
            self.mock_age(&root)
        } else {
            self.fetch_age(&root).await?
        };

        let mut cache = self.cache.write().await;
        cache.insert(
            root,
            CachedAge {
                age_days,
                cached_at: Instant::now(),
            },
        );
        Ok(age_days)
    }

    async fn fetch_age(&self, domain: &str) -> Result<Option<u32>> {
        let server = whois_server(domain);
        log::debug!("querying WHOIS server {server} for {domain}");

        let text = match self.query_whois(server, domain).await {
            Ok(text) => text,
            Err(e) => {
                log::debug!("WHOIS query against {server} failed: {e}");
                self.query_fallback_servers(domain).await?
            }
        };

        match parse_creation_date(&text) {
            Some(created) => {
                let age = (Utc::now().date_naive() - created).num_days().max(0) as u32;
                log::debug!("{domain} registered {created}, {age} days old");
                Ok(Some(age))
            }
            None => {
                // Registry answered but without a parseable creation date;
                // confirm the domain at least resolves before reporting
                // age-unknown.
                self.confirm_resolves(domain).await?;
                Ok(None)
            }
        }
    }

    async fn query_whois(&self, server: &str, domain: &str) -> Result<String> {
        let mut stream = timeout(self.timeout, TcpStream::connect(format!("{server}:43"))).await??;
        stream.write_all(format!("{domain}\r\n").as_bytes()).await?;

        let mut response = String::new();
        timeout(self.timeout, stream.read_to_string(&mut response)).await??;

        if response.is_empty() {
            return Err(anyhow!("empty WHOIS response from {server}"));
        }
        Ok(response)
    }

    async fn query_fallback_servers(&self, domain: &str) -> Result<String> {
        for server in ["whois.iana.org", "whois.internic.net"] {
            match self.query_whois(server, domain).await {
                Ok(text) => return Ok(text),
                Err(e) => log::debug!("fallback WHOIS server {server} failed: {e}"),
            }
        }
        Err(anyhow!("all WHOIS servers failed for {domain}"))
    }

    /// DNS existence check used when WHOIS text had no creation date.
    async fn confirm_resolves(&self, domain: &str) -> Result<()> {
        use hickory_resolver::TokioAsyncResolver;

        let resolver = TokioAsyncResolver::tokio_from_system_conf()?;
        resolver
            .lookup_ip(domain)
            .await
            .map_err(|e| anyhow!("domain does not resolve: {e}"))?;
        Ok(())
    }

    fn mock_age(&self, domain: &str) -> Option<u32> {
        let table: HashMap<&str, u32> = HashMap::from([
            ("example.com", 8000),
            ("fresh-phish.net", 5),
            ("week-old.org", 7),
            ("established.org", 3650),
        ]);
        table.get(domain).copied()
    }
}

/// Registered domain for WHOIS queries: last two labels, or three when the
/// domain sits under a common two-part public suffix.
pub fn root_domain(domain: &str) -> String {
    const TWO_PART_TLDS: &[&str] = &[
        "co.uk", "com.au", "co.jp", "co.kr", "com.br", "co.za", "com.mx", "co.in", "co.nz",
        "org.uk", "net.au", "gov.uk", "ac.uk",
    ];

    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() < 2 {
        return domain.to_lowercase();
    }

    let last_two = format!("{}.{}", parts[parts.len() - 2], parts[parts.len() - 1]);
    if parts.len() >= 3 && TWO_PART_TLDS.contains(&last_two.to_lowercase().as_str()) {
        return format!("{}.{}", parts[parts.len() - 3], last_two).to_lowercase();
    }
    last_two.to_lowercase()
}

fn is_queryable(domain: &str) -> bool {
    domain.contains('.')
        && !domain.is_empty()
        && domain.len() < 255
        && domain
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
}

fn whois_server(domain: &str) -> &'static str {
    let tld = domain.rsplit('.').next().unwrap_or("");
    match tld {
        "com" | "net" => "whois.verisign-grs.com",
        "org" => "whois.pir.org",
        "info" => "whois.afilias.net",
        "us" => "whois.nic.us",
        "uk" => "whois.nic.uk",
        "de" => "whois.denic.de",
        "fr" => "whois.afnic.fr",
        "nl" => "whois.domain-registry.nl",
        "au" => "whois.auda.org.au",
        "ca" => "whois.cira.ca",
        "jp" => "whois.jprs.jp",
        "br" => "whois.registro.br",
        "tk" => "whois.dot.tk",
        "ml" => "whois.dot.ml",
        "ga" => "whois.dot.ga",
        "cf" => "whois.dot.cf",
        _ => "whois.iana.org",
    }
}

/// Extract a creation date from free-text WHOIS output. Registries label
/// the field inconsistently; try the common labels in order.
fn parse_creation_date(text: &str) -> Option<NaiveDate> {
    let labels = [
        r"(?i)creation\s*date[:\s]+([^\r\n]+)",
        r"(?i)created[:\s]+([^\r\n]+)",
        r"(?i)registered\s*on[:\s]+([^\r\n]+)",
        r"(?i)registered[:\s]+([^\r\n]+)",
        r"(?i)registration\s*date[:\s]+([^\r\n]+)",
        r"(?i)domain\s*created[:\s]+([^\r\n]+)",
    ];

    for label in labels {
        let regex = Regex::new(label).unwrap();
        if let Some(date_text) = regex
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim())
        {
            if let Some(date) = parse_date(date_text) {
                return Some(date);
            }
            log::debug!("unrecognized WHOIS date format: {date_text}");
        }
    }
    None
}

fn parse_date(text: &str) -> Option<NaiveDate> {
    // 2024-10-10T12:00:00Z and friends all lead with an ISO date.
    let iso = Regex::new(r"(\d{4})-(\d{2})-(\d{2})").unwrap();
    if let Some(caps) = iso.captures(text) {
        return NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
    }

    for format in ["%d.%m.%Y", "%m/%d/%Y", "%d-%b-%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(text, format) {
            return Some(date);
        }
    }
    None
}
