//! Classification level validation

use super::ValidationError;

const MAX_LEVEL_LEN: usize = 64;

/// Validated classification level, e.g. `low`, `confidential`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationLevel(String);

impl ClassificationLevel {
    /// Create a classification level. Trimmed, non-empty, max 64 characters.
    pub fn new(s: &str) -> Result<Self, ValidationError> {
        let trimmed = s.trim();

        if trimmed.is_empty() {
            return Err(ValidationError::Empty { field: "level" });
        }

        if trimmed.chars().count() > MAX_LEVEL_LEN {
            return Err(ValidationError::TooLong {
                field: "level",
                max: MAX_LEVEL_LEN,
            });
        }

        Ok(Self(trimmed.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
