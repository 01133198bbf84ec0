use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceivedHop {
    pub from: String,
    pub by: String,
    pub protocol: String,
    pub timestamp: DateTime<FixedOffset>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Latency {
    Normal,
    Moderate,
    High,
}

impl Latency {
    /// Slow relay hops are a common indicator of relay abuse or delayed
    /// delivery manipulation: >300s high, >60s moderate.
    pub fn classify(seconds: i64) -> Self {
        if seconds > 300 {
            Latency::High
        } else if seconds > 60 {
            Latency::Moderate
        } else {
            Latency::Normal
        }
    }
}

/// Inter-hop latency between two consecutive hops of the ordered chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HopGap {
    pub from: String,
    pub to: String,
    pub seconds: i64,
    pub latency: Latency,
}

pub struct ReceivedChainAnalyzer {
    fold: Regex,
    received: Regex,
    dotted_quad: Regex,
    trailing_comment: Regex,
}

impl Default for ReceivedChainAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl ReceivedChainAnalyzer {
    pub fn new() -> Self {
        Self {
            fold: Regex::new(r"\r?\n[ \t]+").unwrap(),
            received: Regex::new(
                r"(?m)^Received:\s*(?:from\s+(\S+)[^()]*?(?:\(([^)]+)\))?)?(?:\s*by\s+([^\s;]+))?(?:\s*with\s+([^;]+))?(?:;\s*(.+))?$",
            )
            .unwrap(),
            dotted_quad: Regex::new(r"\b(?:\d{1,3}\.){3}\d{1,3}\b").unwrap(),
            trailing_comment: Regex::new(r"\s*\([^)]*\)\s*$").unwrap(),
        }
    }

    /// Parse every `Received:` header into a hop and order the chain
    /// newest-first. Hops without a parseable timestamp cannot be timed and
    /// are dropped; they never abort the analysis.
    pub fn parse_chain(&self, header_block: &str) -> Vec<ReceivedHop> {
        // Unfold continuation lines so each header is one line for the
        // line-anchored hop pattern.
        let unfolded = self.fold.replace_all(header_block, " ");

        let mut hops: Vec<ReceivedHop> = self
            .received
            .captures_iter(&unfolded)
            .filter_map(|caps| {
                let timestamp_text = caps.get(5)?.as_str();
                let timestamp = self.parse_timestamp(timestamp_text)?;

                let from = caps.get(1).map(|m| m.as_str()).unwrap_or("");
                let parenthetical = caps.get(2).map(|m| m.as_str());
                let by = caps.get(3).map(|m| m.as_str()).unwrap_or("");
                let protocol = caps.get(4).map(|m| m.as_str().trim()).unwrap_or("");

                // IP from the parenthetical first, then the from token.
                let ip = parenthetical
                    .and_then(|text| self.find_ip(text))
                    .or_else(|| self.find_ip(from));

                Some(ReceivedHop {
                    from: from.to_string(),
                    by: by.to_string(),
                    protocol: protocol.to_string(),
                    timestamp,
                    ip,
                })
            })
            .collect();

        hops.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        hops
    }

    /// Latency between consecutive hops of a newest-first chain: previous
    /// hop timestamp minus current hop timestamp, in seconds.
    pub fn hop_gaps(&self, hops: &[ReceivedHop]) -> Vec<HopGap> {
        hops.windows(2)
            .map(|pair| {
                let seconds = pair[0]
                    .timestamp
                    .signed_duration_since(pair[1].timestamp)
                    .num_seconds();
                HopGap {
                    from: pair[1].from.clone(),
                    to: pair[0].from.clone(),
                    seconds,
                    latency: Latency::classify(seconds),
                }
            })
            .collect()
    }

    fn parse_timestamp(&self, text: &str) -> Option<DateTime<FixedOffset>> {
        let cleaned = self.trailing_comment.replace(text.trim(), "");
        let cleaned = cleaned.trim();

        if let Ok(parsed) = DateTime::parse_from_rfc2822(cleaned) {
            return Some(parsed);
        }
        // Tolerate a missing weekday, seen from some relays.
        if let Ok(parsed) = DateTime::parse_from_str(cleaned, "%d %b %Y %H:%M:%S %z") {
            return Some(parsed);
        }
        log::debug!("dropping hop with unparseable timestamp: {text}");
        None
    }

    fn find_ip(&self, text: &str) -> Option<String> {
        self.dotted_quad
            .find(text)
            .map(|m| m.as_str().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHAIN: &str = concat!(
        "Received: from mta1.example.net (mta1.example.net [198.51.100.3]) by mx.example.com with ESMTPS; Mon, 1 Jan 2024 10:00:05 +0000\n",
        "Received: from app.example.org by mta1.example.net with ESMTP; Mon, 1 Jan 2024 10:00:00 +0000\n",
        "Received: from localhost by app.example.org with SMTP; Mon, 1 Jan 2024 09:52:00 +0000\n",
    );

    #[test]
    fn test_chain_sorted_newest_first() {
        let analyzer = ReceivedChainAnalyzer::new();
        let hops = analyzer.parse_chain(CHAIN);
        assert_eq!(hops.len(), 3);
        assert_eq!(hops[0].from, "mta1.example.net");
        assert_eq!(hops[1].from, "app.example.org");
        assert_eq!(hops[2].from, "localhost");
        assert!(hops[0].timestamp > hops[1].timestamp);
    }

    #[test]
    fn test_chain_sorted_regardless_of_header_order() {
        let analyzer = ReceivedChainAnalyzer::new();
        let shuffled = concat!(
            "Received: from app.example.org by mta1.example.net with ESMTP; Mon, 1 Jan 2024 10:00:00 +0000\n",
            "Received: from localhost by app.example.org with SMTP; Mon, 1 Jan 2024 09:52:00 +0000\n",
            "Received: from mta1.example.net by mx.example.com with ESMTPS; Mon, 1 Jan 2024 10:00:05 +0000\n",
        );
        let hops = analyzer.parse_chain(shuffled);
        assert_eq!(hops[0].from, "mta1.example.net");
        assert_eq!(hops[2].from, "localhost");
    }

    #[test]
    fn test_hop_fields_and_ip() {
        let analyzer = ReceivedChainAnalyzer::new();
        let hops = analyzer.parse_chain(CHAIN);
        assert_eq!(hops[0].by, "mx.example.com");
        assert_eq!(hops[0].protocol, "ESMTPS");
        assert_eq!(hops[0].ip.as_deref(), Some("198.51.100.3"));
        assert!(hops[2].ip.is_none());
    }

    #[test]
    fn test_gap_seconds_and_classification() {
        let analyzer = ReceivedChainAnalyzer::new();
        let hops = analyzer.parse_chain(CHAIN);
        let gaps = analyzer.hop_gaps(&hops);
        assert_eq!(gaps.len(), 2);
        assert_eq!(gaps[0].seconds, 5);
        assert_eq!(gaps[0].latency, Latency::Normal);
        assert_eq!(gaps[0].from, "app.example.org");
        assert_eq!(gaps[0].to, "mta1.example.net");
        assert_eq!(gaps[1].seconds, 480);
        assert_eq!(gaps[1].latency, Latency::High);
    }

    #[test]
    fn test_unparseable_timestamp_dropped() {
        let analyzer = ReceivedChainAnalyzer::new();
        let headers = concat!(
            "Received: from a.example.com by b.example.com; not a date\n",
            "Received: from b.example.com by c.example.com; Mon, 1 Jan 2024 10:00:00 +0000\n",
        );
        let hops = analyzer.parse_chain(headers);
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].from, "b.example.com");
    }

    #[test]
    fn test_folded_received_header() {
        let analyzer = ReceivedChainAnalyzer::new();
        let headers = "Received: from mta1.example.net\n\tby mx.example.com with ESMTPS;\n\tMon, 1 Jan 2024 10:00:05 +0000\n";
        let hops = analyzer.parse_chain(headers);
        assert_eq!(hops.len(), 1);
        assert_eq!(hops[0].by, "mx.example.com");
    }

    #[test]
    fn test_latency_thresholds() {
        assert_eq!(Latency::classify(30), Latency::Normal);
        assert_eq!(Latency::classify(60), Latency::Normal);
        assert_eq!(Latency::classify(61), Latency::Moderate);
        assert_eq!(Latency::classify(300), Latency::Moderate);
        assert_eq!(Latency::classify(301), Latency::High);
    }
}
