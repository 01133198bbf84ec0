use base64::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Attachment {
    pub filename: String,
    /// Decoded size in bytes. Derived as floor(len(encoded) * 3 / 4) from
    /// the whitespace-stripped base64 payload; 0 when only the fallback
    /// scan was possible.
    pub size: u64,
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<Vec<u8>>,
}

/// Two-tier MIME attachment extraction. The boundary walk gives decoded
/// size and content; the fallback regex scan only recovers filename/type
/// from messages whose multipart structure is too loose to split.
pub struct AttachmentExtractor {
    boundary: Regex,
    filename: Regex,
    content_type: Regex,
    payload: Regex,
    fallback: Regex,
}

impl Default for AttachmentExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AttachmentExtractor {
    pub fn new() -> Self {
        Self {
            boundary: Regex::new(r#"boundary="([^"]+)""#).unwrap(),
            filename: Regex::new(r#"filename="([^"]+)""#).unwrap(),
            content_type: Regex::new(r"(?i)Content-Type:\s*([^\r\n;]+)").unwrap(),
            payload: Regex::new(r"\r?\n\r?\n([A-Za-z0-9+/=\s]+)$").unwrap(),
            fallback: Regex::new(r#"(?is)Content-Type: (.+?)\r?\nContent-Disposition:.*?filename="([^"]+)""#)
                .unwrap(),
        }
    }

    pub fn extract(&self, header_block: &str, raw: &str) -> Vec<Attachment> {
        match self.boundary_token(header_block) {
            Some(boundary) => self.extract_by_boundary(raw, &boundary),
            None => self.extract_by_scan(raw),
        }
    }

    fn boundary_token(&self, header_block: &str) -> Option<String> {
        self.boundary
            .captures(header_block)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
    }

    fn extract_by_boundary(&self, raw: &str, boundary: &str) -> Vec<Attachment> {
        let delimiter = format!("--{boundary}");
        raw.split(delimiter.as_str())
            .filter(|part| part.contains("Content-Disposition: attachment"))
            .filter_map(|part| self.parse_part(part))
            .collect()
    }

    /// A part without a filename is not counted as an attachment.
    fn parse_part(&self, part: &str) -> Option<Attachment> {
        let filename = self
            .filename
            .captures(part)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())?;

        let content_type = self
            .content_type
            .captures(part)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string());

        let mut size = 0u64;
        let mut content = None;
        if let Some(encoded) = self.payload.captures(part).and_then(|caps| caps.get(1)) {
            let stripped: String = encoded
                .as_str()
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            size = (stripped.len() as u64 * 3) / 4;
            match BASE64_STANDARD.decode(&stripped) {
                Ok(bytes) => content = Some(bytes),
                Err(e) => log::debug!("attachment {filename}: payload not decodable: {e}"),
            }
        }

        Some(Attachment {
            filename,
            size,
            content_type,
            content,
        })
    }

    /// Single-pass scan used when no boundary parameter was declared.
    /// Size and content cannot be determined without delimited parts.
    fn extract_by_scan(&self, raw: &str) -> Vec<Attachment> {
        self.fallback
            .captures_iter(raw)
            .filter_map(|caps| {
                let content_type = caps.get(1)?.as_str().trim().to_string();
                let filename = caps.get(2)?.as_str().trim().to_string();
                Some(Attachment {
                    filename,
                    size: 0,
                    content_type: Some(content_type),
                    content: None,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn multipart_message() -> String {
        concat!(
            "From: a@b.com\r\n",
            "Content-Type: multipart/mixed; boundary=\"XYZ\"\r\n",
            "\r\n",
            "--XYZ\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Hello\r\n",
            "--XYZ\r\n",
            "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
            "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "SGVsbG8g\r\nd29ybGQh\r\n",
            "--XYZ--\r\n",
        )
        .to_string()
    }

    #[test]
    fn test_boundary_extraction() {
        let extractor = AttachmentExtractor::new();
        let raw = multipart_message();
        let (headers, _) = crate::message::MessageParser::new().split(&raw);
        let attachments = extractor.extract(headers, &raw);
        assert_eq!(attachments.len(), 1);
        let a = &attachments[0];
        assert_eq!(a.filename, "report.pdf");
        assert_eq!(a.content_type.as_deref(), Some("application/pdf"));
        // "SGVsbG8gd29ybGQh" is 16 base64 chars -> 12 decoded bytes
        assert_eq!(a.size, 12);
        assert_eq!(a.content.as_deref(), Some(b"Hello world!".as_ref()));
    }

    #[test]
    fn test_part_without_filename_discarded() {
        let extractor = AttachmentExtractor::new();
        let raw = concat!(
            "Content-Type: multipart/mixed; boundary=\"B\"\r\n\r\n",
            "--B\r\n",
            "Content-Disposition: attachment\r\n",
            "\r\n",
            "QUJD\r\n",
            "--B--\r\n",
        );
        let attachments = extractor.extract(raw, raw);
        assert!(attachments.is_empty());
    }

    #[test]
    fn test_fallback_scan_without_boundary() {
        let extractor = AttachmentExtractor::new();
        let raw = concat!(
            "From: a@b.com\r\n",
            "\r\n",
            "Content-Type: application/zip\r\n",
            "Content-Disposition: attachment; filename=\"payload.zip\"\r\n",
        );
        let attachments = extractor.extract("From: a@b.com", raw);
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "payload.zip");
        assert_eq!(attachments[0].content_type.as_deref(), Some("application/zip"));
        assert_eq!(attachments[0].size, 0);
        assert!(attachments[0].content.is_none());
    }

    #[test]
    fn test_no_attachments() {
        let extractor = AttachmentExtractor::new();
        let raw = "From: a@b.com\r\n\r\nJust a plain body.";
        assert!(extractor.extract("From: a@b.com", raw).is_empty());
    }
}
