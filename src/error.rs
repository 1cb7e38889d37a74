use thiserror::Error;

/// Failures a caller may want to tell apart. Everything else travels as
/// `anyhow::Error` with context attached.
#[derive(Debug, Error)]
pub enum SearchError {
    /// A required page anchor is missing. Raised once at bind time.
    #[error("no element selected by the {role} selector `{selector}`")]
    Configuration {
        role: &'static str,
        selector: String,
    },

    #[error("parse search index: {0}")]
    IndexParse(String),

    #[error("fetch search index {location}: {reason}")]
    IndexFetch { location: String, reason: String },
}
