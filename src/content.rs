use regex::Regex;

/// Generic phishing phrases, each worth the same flat penalty.
const GENERIC_PENALTY: i32 = 15;

struct WeightedPattern {
    pattern: Regex,
    penalty: i32,
    reason: &'static str,
}

impl WeightedPattern {
    fn new(pattern: &str, penalty: i32, reason: &'static str) -> Self {
        Self {
            pattern: Regex::new(pattern).unwrap(),
            penalty,
            reason,
        }
    }
}

/// Scores body/subject text against weighted suspicious-pattern sets.
/// Starts at 100 and subtracts per matching pattern; tiers are
/// non-exclusive. Pure, no I/O.
pub struct ContentScorer {
    generic: Vec<WeightedPattern>,
    shipping: Vec<WeightedPattern>,
    subject: Vec<WeightedPattern>,
    html_markup: Regex,
    url: Regex,
    non_latin: Regex,
    webmail_sender: Regex,
}

impl Default for ContentScorer {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentScorer {
    pub fn new() -> Self {
        let generic = vec![
            WeightedPattern::new(r"(?i)urgent|immediate action|account suspended", GENERIC_PENALTY, "urgency phrasing"),
            WeightedPattern::new(r"(?i)verify.*(account|identity)", GENERIC_PENALTY, "verification request"),
            WeightedPattern::new(r"(?i)click.*link|download.*attachment", GENERIC_PENALTY, "click/download lure"),
            WeightedPattern::new(r"(?i)password|credit card|ssn|social security", GENERIC_PENALTY, "credential or financial request"),
            WeightedPattern::new(r"(?i)lottery|winner|prize|inheritance", GENERIC_PENALTY, "lottery/prize bait"),
            WeightedPattern::new(r"(?i)bitcoin|cryptocurrency|wire transfer", GENERIC_PENALTY, "payment rail bait"),
            WeightedPattern::new(r"(?i)invoice|payment|statement|document", GENERIC_PENALTY, "invoice bait"),
            WeightedPattern::new(r"(?i)attachment.*enclosed|please.*review", GENERIC_PENALTY, "attachment lure"),
        ];

        // Calibrated per phrase: generic shipping update < tracking lure <
        // delivery-failure lure < customs-fee lure.
        let shipping = vec![
            WeightedPattern::new(r"(?i)shipping.*update|delivery.*status|package.*notification", 25, "common shipping scam phrases"),
            WeightedPattern::new(r"(?i)track.*package|track.*shipment|delivery.*tracking", 20, "package tracking lure"),
            WeightedPattern::new(r"(?i)package.*delayed|delivery.*failed|shipping.*problem", 30, "delivery problem scam"),
            WeightedPattern::new(r"(?i)customs.*fee|import.*duty|shipping.*fee", 35, "customs/fee scam"),
            WeightedPattern::new(r"(?i)ups|fedex|dhl|usps", 15, "courier service impersonation"),
        ];

        // Subject-line manipulation is a stronger signal than the same
        // text in the body.
        let subject = vec![
            WeightedPattern::new(r"(?i)urgent|immediate|asap|action.*required", 30, "urgency in subject line"),
            WeightedPattern::new(r"(?i)account.*suspend|account.*limit|security.*alert", 35, "account threat in subject"),
            WeightedPattern::new(r"(?i)\$|€|£|money|payment|refund|tax", 25, "financial terms in subject"),
        ];

        Self {
            generic,
            shipping,
            subject,
            html_markup: Regex::new(r"(?i)<script|<html|<img|href=").unwrap(),
            url: Regex::new(r"https?://[^\s]+").unwrap(),
            non_latin: Regex::new(r"[\x{0400}-\x{04FF}\x{0600}-\x{06FF}\x{0900}-\x{097F}]").unwrap(),
            webmail_sender: Regex::new(r"(?i)@gmail\.com>?$").unwrap(),
        }
    }

    pub fn score(&self, body: &str, from: &str, subject: &str) -> u8 {
        let mut score: i32 = 100;

        for tier in [&self.generic, &self.shipping] {
            for entry in tier.iter() {
                if entry.pattern.is_match(body) {
                    score -= entry.penalty;
                    log::debug!("content penalty -{}: {}", entry.penalty, entry.reason);
                }
            }
        }

        for entry in &self.subject {
            if entry.pattern.is_match(subject) {
                score -= entry.penalty;
                log::debug!("subject penalty -{}: {}", entry.penalty, entry.reason);
            }
        }

        if self.html_markup.is_match(body) {
            score -= 20;
            log::debug!("content penalty -20: HTML/script markup present");
        }

        if self.url.find_iter(body).count() > 3 {
            score -= 15;
            log::debug!("content penalty -15: more than 3 URLs in body");
        }

        // Cyrillic, Arabic, Devanagari ranges as a homograph/obfuscation
        // indicator.
        if self.non_latin.is_match(body) {
            score -= 20;
            log::debug!("content penalty -20: non-Latin script present");
        }

        // Legitimate organizational mail rarely originates from personal
        // webmail.
        if self.webmail_sender.is_match(from.trim()) {
            score -= 25;
            log::debug!("content penalty -25: personal webmail sender");
        }

        score.clamp(0, 100) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_body_scores_full() {
        let scorer = ContentScorer::new();
        assert_eq!(scorer.score("See you at the meeting tomorrow.", "alice@example.com", "Meeting"), 100);
    }

    #[test]
    fn test_generic_patterns_stack() {
        let scorer = ContentScorer::new();
        // urgency + lottery bait, nothing else
        let score = scorer.score("urgent: you are a lottery winner", "a@example.com", "hello");
        assert_eq!(score, 100 - 15 - 15);
    }

    #[test]
    fn test_url_count_penalty_exact() {
        let scorer = ContentScorer::new();
        let body = "http://one.example.net http://two.example.net http://three.example.net http://four.example.net http://five.example.net";
        assert_eq!(scorer.score(body, "a@example.com", "hello"), 85);
    }

    #[test]
    fn test_three_urls_no_penalty() {
        let scorer = ContentScorer::new();
        let body = "http://one.example.net http://two.example.net http://three.example.net";
        assert_eq!(scorer.score(body, "a@example.com", "hello"), 100);
    }

    #[test]
    fn test_subject_patterns_only_apply_to_subject() {
        let scorer = ContentScorer::new();
        // "security alert" in the subject triggers the subject tier only
        let score = scorer.score("calm body text", "a@example.com", "Security alert");
        assert_eq!(score, 100 - 35);
    }

    #[test]
    fn test_html_markup_penalty() {
        let scorer = ContentScorer::new();
        let score = scorer.score("<html><body>hi</body></html>", "a@example.com", "hi");
        assert_eq!(score, 80);
    }

    #[test]
    fn test_non_latin_script_penalty() {
        let scorer = ContentScorer::new();
        let score = scorer.score("Привет, друг", "a@example.com", "hi");
        assert_eq!(score, 80);
    }

    #[test]
    fn test_webmail_sender_penalty() {
        let scorer = ContentScorer::new();
        assert_eq!(scorer.score("plain text", "Someone <someone@gmail.com>", "hi"), 75);
        assert_eq!(scorer.score("plain text", "someone@gmail.com", "hi"), 75);
        assert_eq!(scorer.score("plain text", "someone@company.com", "hi"), 100);
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let scorer = ContentScorer::new();
        let body = "URGENT: verify your account password. You are a lottery winner! \
                    Wire transfer your customs fee via bitcoin. Invoice attached, please review \
                    the attachment enclosed. Click this link. Track your package: delivery failed, \
                    shipping update from UPS. <script>bad</script> \
                    http://a.example http://b.example http://c.example http://d.example";
        let score = scorer.score(body, "scam@gmail.com", "URGENT action required: account suspended, payment refund $");
        assert_eq!(score, 0);
    }
}
