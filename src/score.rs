use crate::authentication::AuthenticationFacts;
use serde::{Deserialize, Serialize};

/// The four sub-scores. `overall` is derived from the other three and is
/// never set independently.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityScore {
    pub authentication: u8,
    pub content: u8,
    pub attachments: u8,
    pub overall: u8,
}

/// Combine authentication facts with the content and attachment scores.
/// Attachments carry the highest weight: attachment-borne payloads are
/// the most immediately exploitable vector.
pub fn combine(auth: &AuthenticationFacts, content: u8, attachments: u8) -> SecurityScore {
    let mut auth_score = 0.0f64;
    if auth.spf.status == "pass" {
        auth_score += 33.34;
    }
    if auth.dkim.status == "pass" || auth.dkim.status == "present" {
        auth_score += 33.33;
    }
    if auth.dmarc.status == "pass" {
        auth_score += 33.33;
    }

    let overall =
        (auth_score * 0.3 + f64::from(content) * 0.3 + f64::from(attachments) * 0.4).round();

    SecurityScore {
        authentication: auth_score.round() as u8,
        content,
        attachments,
        overall: overall.clamp(0.0, 100.0) as u8,
    }
}
