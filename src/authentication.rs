use crate::geoip::IpInfo;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Status token used when a mechanism never appeared in the headers.
/// Downstream scoring relies on this so it never branches on absence.
pub const STATUS_MISSING: &str = "missing";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SpfFacts {
    pub status: String,
    pub domain: Option<String>,
    pub ip: Option<String>,
    /// Attached by geolocation enrichment after parsing; never set by the
    /// parser itself.
    pub ip_info: Option<IpInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DkimFacts {
    pub status: String,
    pub domain: Option<String>,
    pub selector: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DmarcFacts {
    pub status: String,
    pub policy: Option<String>,
    pub alignment: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuthenticationFacts {
    pub spf: SpfFacts,
    pub dkim: DkimFacts,
    pub dmarc: DmarcFacts,
}

impl Default for SpfFacts {
    fn default() -> Self {
        Self {
            status: STATUS_MISSING.to_string(),
            domain: None,
            ip: None,
            ip_info: None,
        }
    }
}

impl Default for DkimFacts {
    fn default() -> Self {
        Self {
            status: STATUS_MISSING.to_string(),
            domain: None,
            selector: None,
        }
    }
}

impl Default for DmarcFacts {
    fn default() -> Self {
        Self {
            status: STATUS_MISSING.to_string(),
            policy: None,
            alignment: None,
        }
    }
}

/// Extracts SPF/DKIM/DMARC facts from `Authentication-Results:` and
/// `Received-SPF:` headers. Malformed or absent headers leave the mechanism
/// at its `"missing"` default; this parser never fails.
pub struct AuthResultsParser {
    auth_results: Regex,
    received_spf: Regex,
    dkim_status: Regex,
    dkim_domain: Regex,
    dkim_selector: Regex,
    dmarc_status: Regex,
    dmarc_policy: Regex,
    dmarc_alignment: Regex,
    spf_status: Regex,
    spf_domain: Regex,
    client_ip: Regex,
    ip_attr: Regex,
    paren_ip: Regex,
}

impl Default for AuthResultsParser {
    fn default() -> Self {
        Self::new()
    }
}

impl AuthResultsParser {
    pub fn new() -> Self {
        Self {
            // Header values fold onto continuation lines starting with
            // whitespace; match greedily across those continuations.
            auth_results: Regex::new(r"(?im)^Authentication-Results:([^\r\n]+(?:\r?\n[ \t][^\r\n]+)*)").unwrap(),
            received_spf: Regex::new(r"(?im)^Received-SPF:([^\r\n]+(?:\r?\n[ \t][^\r\n]+)*)").unwrap(),
            dkim_status: Regex::new(r"(?i)dkim=(\w+)").unwrap(),
            dkim_domain: Regex::new(r"(?i)d=([^;\s]+)").unwrap(),
            dkim_selector: Regex::new(r"(?i)s=([^;\s]+)").unwrap(),
            dmarc_status: Regex::new(r"(?i)dmarc=(\w+)").unwrap(),
            dmarc_policy: Regex::new(r"(?i)p=([^;\s]+)").unwrap(),
            dmarc_alignment: Regex::new(r"(?i)adkim=([^;\s]+)").unwrap(),
            spf_status: Regex::new(r"(?i)spf=(\w+)").unwrap(),
            spf_domain: Regex::new(r"(?i)domain=([^;\s]+)").unwrap(),
            client_ip: Regex::new(r"(?i)client-ip=([^;\s]+)").unwrap(),
            ip_attr: Regex::new(r"(?i)ip=([^;\s]+)").unwrap(),
            paren_ip: Regex::new(r"\(([0-9.]+)\)").unwrap(),
        }
    }

    pub fn parse(&self, header_block: &str) -> AuthenticationFacts {
        // Explicit fold over header occurrences: the most recently parsed
        // occurrence of a mechanism overwrites earlier ones, matching the
        // final hop's trust boundary being authoritative.
        let facts = self
            .auth_results
            .captures_iter(header_block)
            .filter_map(|caps| caps.get(1))
            .fold(AuthenticationFacts::default(), |facts, value| {
                self.fold_occurrence(facts, value.as_str())
            });

        self.apply_received_spf_fallback(facts, header_block)
    }

    fn fold_occurrence(&self, mut facts: AuthenticationFacts, value: &str) -> AuthenticationFacts {
        let lower = value.to_lowercase();

        if lower.contains("dkim=") {
            facts.dkim = DkimFacts {
                status: self.status_token(&self.dkim_status, value),
                domain: self.capture(&self.dkim_domain, value),
                selector: self.capture(&self.dkim_selector, value),
            };
        }

        if lower.contains("dmarc=") {
            facts.dmarc = DmarcFacts {
                status: self.status_token(&self.dmarc_status, value),
                policy: self.capture(&self.dmarc_policy, value),
                alignment: self.capture(&self.dmarc_alignment, value),
            };
        }

        if lower.contains("spf=") {
            facts.spf = SpfFacts {
                status: self.status_token(&self.spf_status, value),
                domain: self.capture(&self.spf_domain, value),
                ip: self.spf_ip(value),
                ip_info: None,
            };
        }

        facts
    }

    /// SPF IP detection within an Authentication-Results value, in priority
    /// order: client-ip=, ip=, then a parenthesized dotted-quad.
    fn spf_ip(&self, value: &str) -> Option<String> {
        self.capture(&self.client_ip, value)
            .or_else(|| self.capture(&self.ip_attr, value))
            .or_else(|| self.capture(&self.paren_ip, value))
    }

    /// When Authentication-Results left the SPF IP unset (or "unknown"),
    /// fall back to the first Received-SPF header: ip=, then client-ip=,
    /// then a parenthesized dotted-quad.
    fn apply_received_spf_fallback(
        &self,
        mut facts: AuthenticationFacts,
        header_block: &str,
    ) -> AuthenticationFacts {
        let needs_ip = match facts.spf.ip.as_deref() {
            None => true,
            Some("unknown") => true,
            Some(_) => false,
        };
        if !needs_ip {
            return facts;
        }

        if let Some(value) = self
            .received_spf
            .captures(header_block)
            .and_then(|caps| caps.get(1))
        {
            let value = value.as_str();
            let ip = self
                .capture(&self.ip_attr, value)
                .or_else(|| self.capture(&self.client_ip, value))
                .or_else(|| self.capture(&self.paren_ip, value));
            if ip.is_some() {
                facts.spf.ip = ip;
            }
        }

        facts
    }

    fn status_token(&self, pattern: &Regex, value: &str) -> String {
        pattern
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_lowercase())
            .unwrap_or_else(|| STATUS_MISSING.to_string())
    }

    fn capture(&self, pattern: &Regex, value: &str) -> Option<String> {
        pattern
            .captures(value)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_mechanisms_pass() {
        let parser = AuthResultsParser::new();
        let headers = "Authentication-Results: mx.example.com; spf=pass smtp.mailfrom=a@b.com; dkim=pass header.d=b.com; dmarc=pass header.from=b.com";
        let facts = parser.parse(headers);
        assert_eq!(facts.spf.status, "pass");
        assert_eq!(facts.dkim.status, "pass");
        assert_eq!(facts.dkim.domain.as_deref(), Some("b.com"));
        assert_eq!(facts.dmarc.status, "pass");
    }

    #[test]
    fn test_missing_defaults() {
        let parser = AuthResultsParser::new();
        let facts = parser.parse("Subject: nothing here");
        assert_eq!(facts.spf.status, STATUS_MISSING);
        assert_eq!(facts.dkim.status, STATUS_MISSING);
        assert_eq!(facts.dmarc.status, STATUS_MISSING);
        assert!(facts.spf.ip.is_none());
    }

    #[test]
    fn test_folded_header_value() {
        let parser = AuthResultsParser::new();
        let headers = "Authentication-Results: mx.example.com;\n\tspf=softfail smtp.mailfrom=a@b.com;\n\tdkim=fail header.d=b.com header.s=sel1";
        let facts = parser.parse(headers);
        assert_eq!(facts.spf.status, "softfail");
        assert_eq!(facts.dkim.status, "fail");
        assert_eq!(facts.dkim.selector.as_deref(), Some("sel1"));
    }

    #[test]
    fn test_last_occurrence_wins() {
        let parser = AuthResultsParser::new();
        let headers = "Authentication-Results: early.example.com; spf=fail\nAuthentication-Results: final.example.com; spf=pass client-ip=203.0.113.7";
        let facts = parser.parse(headers);
        assert_eq!(facts.spf.status, "pass");
        assert_eq!(facts.spf.ip.as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_spf_ip_priority_order() {
        let parser = AuthResultsParser::new();
        let headers =
            "Authentication-Results: mx; spf=pass (198.51.100.9) ip=198.51.100.8 client-ip=198.51.100.7";
        let facts = parser.parse(headers);
        assert_eq!(facts.spf.ip.as_deref(), Some("198.51.100.7"));
    }

    #[test]
    fn test_received_spf_fallback_for_ip() {
        let parser = AuthResultsParser::new();
        let headers = "Authentication-Results: mx.example.com; spf=pass smtp.mailfrom=a@b.com\nReceived-SPF: pass (mx.example.com: domain of a@b.com) client-ip=192.0.2.44;";
        let facts = parser.parse(headers);
        assert_eq!(facts.spf.status, "pass");
        assert_eq!(facts.spf.ip.as_deref(), Some("192.0.2.44"));
    }

    #[test]
    fn test_received_spf_does_not_override_existing_ip() {
        let parser = AuthResultsParser::new();
        let headers = "Authentication-Results: mx; spf=pass client-ip=203.0.113.1\nReceived-SPF: pass client-ip=192.0.2.99;";
        let facts = parser.parse(headers);
        assert_eq!(facts.spf.ip.as_deref(), Some("203.0.113.1"));
    }

    #[test]
    fn test_idempotent_parse() {
        let parser = AuthResultsParser::new();
        let headers = "Authentication-Results: mx; spf=neutral domain=b.com; dmarc=fail p=reject adkim=s";
        let first = parser.parse(headers);
        let second = parser.parse(headers);
        assert_eq!(first, second);
        assert_eq!(first.dmarc.policy.as_deref(), Some("reject"));
        assert_eq!(first.dmarc.alignment.as_deref(), Some("s"));
    }
}
