use regex::Regex;
use serde::{Deserialize, Serialize};

/// Singular header fields of interest, with display defaults for anything
/// the message does not carry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageSummary {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub date: String,
}

impl Default for MessageSummary {
    fn default() -> Self {
        Self {
            from: "Unknown Sender".to_string(),
            to: "Unknown Recipient".to_string(),
            subject: "No Subject".to_string(),
            date: "Unknown Date".to_string(),
        }
    }
}

pub struct MessageParser {
    blank_line: Regex,
    subject: Regex,
    from: Regex,
    to: Regex,
    date: Regex,
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageParser {
    pub fn new() -> Self {
        Self {
            blank_line: Regex::new(r"\r?\n\r?\n").unwrap(),
            subject: Regex::new(r"(?im)^Subject:[ \t]*([^\r\n]+)").unwrap(),
            from: Regex::new(r"(?im)^From:[ \t]*([^\r\n]+)").unwrap(),
            to: Regex::new(r"(?im)^To:[ \t]*([^\r\n]+)").unwrap(),
            date: Regex::new(r"(?im)^Date:[ \t]*([^\r\n]+)").unwrap(),
        }
    }

    /// Split a raw message at the first blank line into header block and
    /// body. A message without a blank line is all headers, empty body.
    pub fn split<'a>(&self, raw: &'a str) -> (&'a str, &'a str) {
        match self.blank_line.find(raw) {
            Some(sep) => (&raw[..sep.start()], &raw[sep.end()..]),
            None => (raw, ""),
        }
    }

    pub fn summary(&self, header_block: &str) -> MessageSummary {
        let mut summary = MessageSummary::default();
        if let Some(value) = self.capture(&self.from, header_block) {
            summary.from = value;
        }
        if let Some(value) = self.capture(&self.to, header_block) {
            summary.to = value;
        }
        if let Some(value) = self.capture(&self.subject, header_block) {
            summary.subject = value;
        }
        if let Some(value) = self.capture(&self.date, header_block) {
            summary.date = value;
        }
        summary
    }

    fn capture(&self, pattern: &Regex, header_block: &str) -> Option<String> {
        pattern
            .captures(header_block)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_on_first_blank_line() {
        let parser = MessageParser::new();
        let raw = "From: a@b.com\r\nSubject: hi\r\n\r\nbody line 1\r\n\r\nbody line 2";
        let (headers, body) = parser.split(raw);
        assert_eq!(headers, "From: a@b.com\r\nSubject: hi");
        assert_eq!(body, "body line 1\r\n\r\nbody line 2");
    }

    #[test]
    fn test_split_without_blank_line() {
        let parser = MessageParser::new();
        let raw = "From: a@b.com\nSubject: hi";
        let (headers, body) = parser.split(raw);
        assert_eq!(headers, raw);
        assert_eq!(body, "");
    }

    #[test]
    fn test_summary_extraction() {
        let parser = MessageParser::new();
        let headers = "From: Alice <alice@example.com>\nTo: bob@example.com\nSubject: Quarterly report\nDate: Mon, 1 Jan 2024 10:00:00 +0000";
        let summary = parser.summary(headers);
        assert_eq!(summary.from, "Alice <alice@example.com>");
        assert_eq!(summary.to, "bob@example.com");
        assert_eq!(summary.subject, "Quarterly report");
        assert_eq!(summary.date, "Mon, 1 Jan 2024 10:00:00 +0000");
    }

    #[test]
    fn test_summary_defaults_when_absent() {
        let parser = MessageParser::new();
        let summary = parser.summary("X-Mailer: nothing useful");
        assert_eq!(summary.from, "Unknown Sender");
        assert_eq!(summary.to, "Unknown Recipient");
        assert_eq!(summary.subject, "No Subject");
        assert_eq!(summary.date, "Unknown Date");
    }

    #[test]
    fn test_received_not_mistaken_for_from() {
        let parser = MessageParser::new();
        // "from" inside a Received header must not be picked up as From:
        let headers = "Received: from relay.example.com by mx.example.com; Mon, 1 Jan 2024 10:00:00 +0000\nFrom: real@example.com";
        let summary = parser.summary(headers);
        assert_eq!(summary.from, "real@example.com");
    }
}
