//! List size bound for newest-first listings

use serde::Deserialize;

use super::ValidationError;

/// Largest accepted `limit`
pub const MAX_LIMIT: u32 = 500;

/// `limit` used when the caller does not send one
pub const DEFAULT_LIMIT: u32 = 50;

/// Validated row cap for list queries (1..=500).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limit(u32);

impl Limit {
    /// Validate a requested limit. Out-of-range values are rejected, not clamped.
    ///
    /// # Example
    /// ```
    /// use dcpm_server::models::Limit;
    ///
    /// assert!(Limit::new(1).is_ok());
    /// assert!(Limit::new(500).is_ok());
    /// assert!(Limit::new(0).is_err());
    /// assert!(Limit::new(501).is_err());
    /// ```
    pub fn new(value: i64) -> Result<Self, ValidationError> {
        if value < 1 || value > i64::from(MAX_LIMIT) {
            return Err(ValidationError::OutOfRange {
                field: "limit",
                min: 1,
                max: MAX_LIMIT,
                value,
            });
        }
        Ok(Self(value as u32))
    }

    /// Get the value for a SQL `LIMIT` bind.
    pub fn as_i64(&self) -> i64 {
        i64::from(self.0)
    }
}

impl Default for Limit {
    fn default() -> Self {
        Self(DEFAULT_LIMIT)
    }
}

/// Query parameters for list endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LimitParams {
    pub limit: Option<i64>,
}

impl TryFrom<LimitParams> for Limit {
    type Error = ValidationError;

    fn try_from(params: LimitParams) -> Result<Self, Self::Error> {
        params.limit.map_or(Ok(Self::default()), Self::new)
    }
}
