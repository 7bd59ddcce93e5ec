//! Ingestion source tag validation

use super::ValidationError;

/// Maximum length for source tags
const MAX_SOURCE_LEN: usize = 64;

/// Validated ingestion source (`api`, `webhook`, `file`, or free text)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTag(String);

impl SourceTag {
    /// Create a new source tag.
    ///
    /// # Rules
    /// - Non-empty (after trimming whitespace)
    /// - Max 64 characters
    ///
    /// # Example
    /// ```
    /// use dcpm_server::models::SourceTag;
    ///
    /// assert!(SourceTag::new("webhook").is_ok());
    /// assert!(SourceTag::new("  ").is_err());
    /// ```
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "source" });
        }

        if trimmed.chars().count() > MAX_SOURCE_LEN {
            return Err(ValidationError::TooLong {
                field: "source",
                max: MAX_SOURCE_LEN,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_and_free_text_sources() {
        for s in ["api", "webhook", "file", "partner-sftp drop"] {
            assert!(SourceTag::new(s).is_ok(), "{s} should be accepted");
        }
    }

    #[test]
    fn rejects_blank() {
        assert!(matches!(
            SourceTag::new("").unwrap_err(),
            ValidationError::Empty { field: "source" }
        ));
    }

    #[test]
    fn max_length() {
        assert!(SourceTag::new(&"a".repeat(64)).is_ok());
        assert!(matches!(
            SourceTag::new(&"a".repeat(65)).unwrap_err(),
            ValidationError::TooLong { max: 64, .. }
        ));
    }

    #[test]
    fn trims_whitespace() {
        assert_eq!(SourceTag::new("  api ").unwrap().as_str(), "api");
    }
}
