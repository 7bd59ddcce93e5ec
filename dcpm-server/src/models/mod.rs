//! Domain models with validation at construction
//!
//! All user input is validated when creating these types.
//! Invalid input returns ValidationError, not panic.

pub mod validation;
pub mod source;
pub mod level;
pub mod limit;

pub use validation::ValidationError;
pub use source::SourceTag;
pub use level::ClassificationLevel;
pub use limit::{Limit, LimitParams, DEFAULT_LIMIT, MAX_LIMIT};

/// Structured JSON field (payload, classification hint, tags)
pub type JsonObject = serde_json::Map<String, serde_json::Value>;
