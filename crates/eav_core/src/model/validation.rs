//! Argument validation for repository entry points.
//!
//! All checks here run before any statement is prepared.

use std::error::Error;
use std::fmt::{Display, Formatter};

/// Caller input rejected before touching storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptyEntityId,
    EmptyEntityType,
    EmptyAttributeKey,
    /// Listing was asked to order by a column outside the whitelist.
    UnsupportedOrderColumn(String),
    /// Sort direction other than `asc`/`desc`.
    UnsupportedSortDirection(String),
}

impl Display for ValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyEntityId => write!(f, "entity id cannot be empty"),
            Self::EmptyEntityType => write!(f, "entity type cannot be empty"),
            Self::EmptyAttributeKey => write!(f, "attribute key cannot be empty"),
            Self::UnsupportedOrderColumn(column) => write!(
                f,
                "unsupported order column `{column}`; expected id|status|type|created_at|updated_at"
            ),
            Self::UnsupportedSortDirection(direction) => write!(
                f,
                "unsupported sort direction `{direction}`; expected asc|desc"
            ),
        }
    }
}

impl Error for ValidationError {}

pub(crate) fn require_entity_id(entity_id: &str) -> Result<(), ValidationError> {
    if entity_id.trim().is_empty() {
        return Err(ValidationError::EmptyEntityId);
    }
    Ok(())
}

pub(crate) fn require_entity_type(kind: &str) -> Result<(), ValidationError> {
    if kind.trim().is_empty() {
        return Err(ValidationError::EmptyEntityType);
    }
    Ok(())
}

pub(crate) fn require_attribute_key(key: &str) -> Result<(), ValidationError> {
    if key.is_empty() {
        return Err(ValidationError::EmptyAttributeKey);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{require_attribute_key, require_entity_id, require_entity_type, ValidationError};

    #[test]
    fn blank_entity_id_is_rejected() {
        assert_eq!(require_entity_id(""), Err(ValidationError::EmptyEntityId));
        assert_eq!(require_entity_id("   "), Err(ValidationError::EmptyEntityId));
        assert!(require_entity_id("abc").is_ok());
    }

    #[test]
    fn blank_type_is_rejected() {
        assert_eq!(
            require_entity_type(" "),
            Err(ValidationError::EmptyEntityType)
        );
        assert!(require_entity_type("user").is_ok());
    }

    #[test]
    fn whitespace_key_is_allowed_but_empty_key_is_not() {
        assert_eq!(
            require_attribute_key(""),
            Err(ValidationError::EmptyAttributeKey)
        );
        assert!(require_attribute_key(" ").is_ok());
    }
}
