pub mod analyzer;
pub mod attachment_risk;
pub mod attachments;
pub mod authentication;
pub mod config;
pub mod content;
pub mod geoip;
pub mod message;
pub mod received;
pub mod reputation;
pub mod score;

pub use analyzer::{AnalysisResult, MessageAnalyzer};
pub use attachments::Attachment;
pub use authentication::AuthenticationFacts;
pub use config::AnalyzerConfig;
pub use reputation::{UrlRecord, UrlReputation};
pub use score::SecurityScore;
