use regex::Regex;

/// Outcome of the synchronous, no-I/O scoring stage for one URL.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalVerdict {
    pub score: u32,
    pub suspicious: bool,
    pub reasons: Vec<String>,
    pub categories: Vec<String>,
}

struct CategoryPattern {
    pattern: Regex,
    reason: &'static str,
}

impl CategoryPattern {
    fn new(pattern: &str, reason: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            reason,
        }
    }
}

/// Local suspicious-pattern heuristics over a URL's domain and path.
/// Each category is an independent pattern list contributing its own
/// reason string; penalties are fixed per category tier.
pub struct LocalUrlRules {
    domain_categories: Vec<CategoryPattern>,
    path_categories: Vec<CategoryPattern>,
    phishing_keywords: Regex,
    sequence_patterns: Vec<Regex>,
    mixed_case: Regex,
}

impl Default for LocalUrlRules {
    fn default() -> Self {
        Self::new()
    }
}

impl LocalUrlRules {
    pub fn new() -> Self {
        let domain_categories = vec![
            CategoryPattern::new(
                r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3}",
                "IP address used as domain",
            ),
            CategoryPattern::new(
                r"bit\.ly|tinyurl\.com|goo\.gl|t\.co|is\.gd|cli\.gs|ow\.ly|buff\.ly|adf\.ly|bit\.do|mcaf\.ee",
                "URL shortener service detected",
            ),
            CategoryPattern::new(r"(?i)[^a-z0-9.-]", "Non-standard characters in domain"),
            CategoryPattern::new(
                r"\.(xyz|top|work|loan|click|party|gq|ml|ga|cf|pw)$",
                "Suspicious top-level domain",
            ),
        ];

        let path_categories = vec![
            CategoryPattern::new(
                r"login|verify|account|secure|banking|security|update|password",
                "Sensitive keywords in URL path",
            ),
            CategoryPattern::new(
                r"\.(exe|zip|rar|7z|msi|bat|ps1|vbs)$",
                "Suspicious file type in URL",
            ),
            CategoryPattern::new(r"[^\x20-\x7E]", "Non-ASCII characters in URL path"),
        ];

        Self {
            domain_categories,
            path_categories,
            phishing_keywords: Regex::new(
                r"(?i)paypal|apple|microsoft|google|facebook|instagram|twitter|amazon|netflix|bank|secure|login|verify|account",
            )
            .unwrap(),
            sequence_patterns: vec![
                Regex::new(r"\d{8,}").unwrap(),
                Regex::new(r"[a-zA-Z0-9]{25,}").unwrap(),
                Regex::new(r"-{2,}|_{2,}").unwrap(),
            ],
            mixed_case: Regex::new(r"[A-Z]").unwrap(),
        }
    }

    pub fn evaluate(&self, domain: &str, path: &str) -> LocalVerdict {
        let mut verdict = LocalVerdict::default();

        for category in &self.domain_categories {
            if category.pattern.is_match(domain) {
                verdict.score += 25;
                verdict.reasons.push(category.reason.to_string());
            }
        }

        for category in &self.path_categories {
            if category.pattern.is_match(path) {
                verdict.score += 20;
                verdict.reasons.push(category.reason.to_string());
            }
        }

        if self.phishing_keywords.is_match(domain) {
            verdict.score += 15;
            verdict.categories.push("Potential Phishing".to_string());
            verdict
                .reasons
                .push("Common phishing keywords in domain".to_string());
        }

        for pattern in &self.sequence_patterns {
            if pattern.is_match(domain) {
                verdict.score += 10;
                verdict
                    .reasons
                    .push("Suspicious character sequence in domain".to_string());
            }
        }

        if self.mixed_case.is_match(domain) {
            verdict.score += 15;
            verdict.categories.push("Potential Typosquatting".to_string());
            verdict
                .reasons
                .push("Mixed case characters in domain (possible typosquatting)".to_string());
        }

        if domain.len() > 30 {
            verdict.score += 10;
            verdict.reasons.push("Unusually long domain name".to_string());
        }

        verdict.suspicious = !verdict.reasons.is_empty();
        verdict
    }
}
