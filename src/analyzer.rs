use crate::attachment_risk::{self, AttachmentRiskReport};
use crate::attachments::{Attachment, AttachmentExtractor};
use crate::authentication::{AuthResultsParser, AuthenticationFacts};
use crate::config::AnalyzerConfig;
use crate::content::ContentScorer;
use crate::geoip::{GeoIpResolver, IpInfo};
use crate::message::{MessageParser, MessageSummary};
use crate::received::{HopGap, ReceivedChainAnalyzer, ReceivedHop};
use crate::reputation::{UrlRecord, UrlReputationEngine};
use crate::score::{self, SecurityScore};
use serde::{Deserialize, Serialize};

/// Everything the analysis produces for one message. Handed to the caller
/// as a value; nothing is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: MessageSummary,
    pub authentication: AuthenticationFacts,
    pub received: Vec<ReceivedHop>,
    pub hop_gaps: Vec<HopGap>,
    pub urls: Vec<UrlRecord>,
    pub attachments: Vec<Attachment>,
    pub attachment_risk: AttachmentRiskReport,
    pub score: SecurityScore,
}

/// The analysis pipeline. Parsing stages are synchronous and pure; only
/// URL reputation and IP geolocation perform I/O. Analysis always
/// completes: malformed input degrades to defaults, failed lookups to
/// skipped sources.
pub struct MessageAnalyzer {
    parser: MessageParser,
    auth_parser: AuthResultsParser,
    attachment_extractor: AttachmentExtractor,
    received: ReceivedChainAnalyzer,
    content: ContentScorer,
    reputation: UrlReputationEngine,
    geoip: GeoIpResolver,
    enrichment_enabled: bool,
}

impl MessageAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self {
            parser: MessageParser::new(),
            auth_parser: AuthResultsParser::new(),
            attachment_extractor: AttachmentExtractor::new(),
            received: ReceivedChainAnalyzer::new(),
            content: ContentScorer::new(),
            reputation: UrlReputationEngine::new(&config),
            geoip: GeoIpResolver::new(
                config.geoip_endpoint.clone(),
                config.lookup_timeout_seconds,
                config.use_mock_sources,
            ),
            enrichment_enabled: config.enrichment_enabled,
        }
    }

    /// Full analysis with external enrichment (subject to config).
    pub async fn analyze(&self, raw: &str) -> AnalysisResult {
        let mut result = self.parse(raw);

        let (_, body) = self.parser.split(raw);
        let (urls, ip_info) = tokio::join!(
            self.reputation.analyze_body(body),
            self.resolve_spf_ip(&result.authentication),
        );
        result.urls = urls;
        result.authentication.spf.ip_info = ip_info;

        result.score = score::combine(
            &result.authentication,
            result.score.content,
            result.attachment_risk.score,
        );
        result
    }

    /// Parse and score locally, no I/O. Deterministic for a given input.
    pub fn analyze_offline(&self, raw: &str) -> AnalysisResult {
        let mut result = self.parse(raw);
        let (_, body) = self.parser.split(raw);
        result.urls = self.reputation.analyze_body_local(body);
        result
    }

    fn parse(&self, raw: &str) -> AnalysisResult {
        let (header_block, body) = self.parser.split(raw);

        let summary = self.parser.summary(header_block);
        let authentication = self.auth_parser.parse(header_block);
        let received = self.received.parse_chain(header_block);
        let hop_gaps = self.received.hop_gaps(&received);
        let attachments = self.attachment_extractor.extract(header_block, raw);
        let attachment_risk = attachment_risk::assess(&attachments);
        let content_score = self.content.score(body, &summary.from, &summary.subject);
        let score = score::combine(&authentication, content_score, attachment_risk.score);

        AnalysisResult {
            summary,
            authentication,
            received,
            hop_gaps,
            urls: Vec::new(),
            attachments,
            attachment_risk,
            score,
        }
    }

    async fn resolve_spf_ip(&self, authentication: &AuthenticationFacts) -> Option<IpInfo> {
        if !self.enrichment_enabled {
            return None;
        }
        match authentication.spf.ip.as_deref() {
            Some(ip) if ip != "unknown" => self.geoip.resolve(ip).await,
            _ => None,
        }
    }
}
