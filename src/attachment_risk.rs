use crate::attachments::Attachment;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum RiskLevel {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

/// Per-attachment assessment, kept for the caller's breakdown display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentAssessment {
    pub filename: String,
    pub size_mb: f64,
    pub risk_level: RiskLevel,
    pub base_penalty: i32,
    pub size_penalty: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttachmentRiskReport {
    pub score: u8,
    pub assessments: Vec<AttachmentAssessment>,
    pub combination_penalty: i32,
    pub combination_reasons: Vec<String>,
}

const EXECUTABLE_EXTENSIONS: &[&str] = &[
    "exe", "bat", "cmd", "ps1", "vbs", "js", "wsf", "msi", "dll", "sh", "bash", "jar",
];
const MACRO_EXTENSIONS: &[&str] = &["docm", "xlsm", "pptm"];

fn extension(filename: &str) -> String {
    filename
        .rsplit('.')
        .next()
        .unwrap_or("")
        .to_lowercase()
}

fn base_risk(ext: &str) -> (RiskLevel, i32, &'static str) {
    if EXECUTABLE_EXTENSIONS.contains(&ext) {
        return (
            RiskLevel::Critical,
            100,
            "Executable files can contain malware and pose an extreme security risk",
        );
    }
    if MACRO_EXTENSIONS.contains(&ext) {
        return (
            RiskLevel::High,
            40,
            "Macro-enabled Office documents are commonly used to deliver malware",
        );
    }
    match ext {
        "pdf" => (
            RiskLevel::Medium,
            30,
            "PDFs can contain malicious JavaScript or exploit vulnerabilities",
        ),
        "doc" | "xls" | "ppt" | "zip" | "rar" | "7z" => (
            RiskLevel::Medium,
            25,
            "Office documents and archives can contain hidden threats",
        ),
        "jpg" | "jpeg" | "png" | "gif" => (
            RiskLevel::Low,
            5,
            "Image files generally pose lower risk but can still contain malicious code",
        ),
        "txt" | "csv" | "md" => (
            RiskLevel::Low,
            5,
            "Text files are generally safe but verify content before opening",
        ),
        _ => (RiskLevel::Unknown, 15, "Unknown file type, exercise caution"),
    }
}

fn size_penalty(size_mb: f64) -> i32 {
    if size_mb > 10.0 {
        20
    } else if size_mb > 5.0 {
        10
    } else {
        0
    }
}

/// Assess a message's attachment set. Penalties are summed across
/// attachments, then combination penalties apply once for the whole set.
/// No attachments scores 100.
pub fn assess(attachments: &[Attachment]) -> AttachmentRiskReport {
    if attachments.is_empty() {
        return AttachmentRiskReport {
            score: 100,
            assessments: Vec::new(),
            combination_penalty: 0,
            combination_reasons: Vec::new(),
        };
    }

    let mut score: i32 = 100;
    let mut assessments = Vec::new();
    let mut has_pdf = false;
    let mut has_executable = false;
    let mut has_macro = false;

    for attachment in attachments {
        let ext = extension(&attachment.filename);
        let (risk_level, base, reason) = base_risk(&ext);
        let size_mb = attachment.size as f64 / (1024.0 * 1024.0);
        let size_pen = size_penalty(size_mb);

        if ext == "pdf" {
            has_pdf = true;
        }
        if EXECUTABLE_EXTENSIONS.contains(&ext.as_str()) {
            has_executable = true;
        }
        if MACRO_EXTENSIONS.contains(&ext.as_str()) {
            has_macro = true;
        }

        score -= base + size_pen;
        assessments.push(AttachmentAssessment {
            filename: attachment.filename.clone(),
            size_mb,
            risk_level,
            base_penalty: base,
            size_penalty: size_pen,
            reason: reason.to_string(),
        });
    }

    // Combination penalties model bulk-attachment messages and
    // multi-stage-attack patterns.
    let mut combination_penalty = 0;
    let mut combination_reasons = Vec::new();

    if attachments.len() > 1 {
        let penalty = 10 * (attachments.len() as i32 - 1);
        combination_penalty += penalty;
        combination_reasons.push(format!(
            "Multiple attachments ({}) increase overall risk: -{penalty}%",
            attachments.len()
        ));
    }
    if has_pdf && has_executable {
        combination_penalty += 25;
        combination_reasons.push(
            "PDF combined with executable files suggests potential malware delivery: -25%".to_string(),
        );
    }
    if has_pdf && has_macro {
        combination_penalty += 20;
        combination_reasons.push(
            "PDF combined with macro-enabled documents indicates possible multi-stage attack: -20%"
                .to_string(),
        );
    }
    if has_executable && has_macro {
        combination_penalty += 30;
        combination_reasons.push(
            "Executable files with macro-enabled documents suggest sophisticated attack: -30%"
                .to_string(),
        );
    }

    score -= combination_penalty;

    AttachmentRiskReport {
        score: score.clamp(0, 100) as u8,
        assessments,
        combination_penalty,
        combination_reasons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attachment(filename: &str, size: u64) -> Attachment {
        Attachment {
            filename: filename.to_string(),
            size,
            content_type: None,
            content: None,
        }
    }

    #[test]
    fn test_no_attachments_scores_full() {
        let report = assess(&[]);
        assert_eq!(report.score, 100);
        assert!(report.assessments.is_empty());
    }

    #[test]
    fn test_executable_saturates() {
        let report = assess(&[attachment("invoice.exe", 1024)]);
        assert_eq!(report.score, 0);
        assert_eq!(report.assessments[0].risk_level, RiskLevel::Critical);
        assert_eq!(report.assessments[0].base_penalty, 100);
    }

    #[test]
    fn test_pdf_base_penalty() {
        let report = assess(&[attachment("report.pdf", 1024)]);
        assert_eq!(report.score, 70);
        assert_eq!(report.assessments[0].risk_level, RiskLevel::Medium);
    }

    #[test]
    fn test_size_penalties() {
        let six_mb = 6 * 1024 * 1024;
        let eleven_mb = 11 * 1024 * 1024;
        assert_eq!(assess(&[attachment("notes.txt", six_mb)]).score, 100 - 5 - 10);
        assert_eq!(assess(&[attachment("notes.txt", eleven_mb)]).score, 100 - 5 - 20);
    }

    #[test]
    fn test_multiple_attachment_combination() {
        // two text files: 2*5 base, +10 for the extra attachment
        let report = assess(&[attachment("a.txt", 10), attachment("b.txt", 10)]);
        assert_eq!(report.score, 100 - 5 - 5 - 10);
        assert_eq!(report.combination_penalty, 10);
    }

    #[test]
    fn test_pdf_macro_combination() {
        // pdf (30) + docm (40) + extra-attachment (10) + pdf/macro (20)
        let report = assess(&[attachment("a.pdf", 10), attachment("b.docm", 10)]);
        assert_eq!(report.score, 0);
        assert!(report
            .combination_reasons
            .iter()
            .any(|r| r.contains("multi-stage")));
    }

    #[test]
    fn test_unknown_extension() {
        let report = assess(&[attachment("data.bin", 10)]);
        assert_eq!(report.score, 85);
        assert_eq!(report.assessments[0].risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn test_clamped_to_zero_with_stacked_penalties() {
        let report = assess(&[
            attachment("a.exe", 20 * 1024 * 1024),
            attachment("b.xlsm", 20 * 1024 * 1024),
            attachment("c.pdf", 20 * 1024 * 1024),
        ]);
        assert_eq!(report.score, 0);
    }
}
