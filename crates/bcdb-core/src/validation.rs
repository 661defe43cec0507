//! Client-side validation of write requests.
//!
//! These checks run before a header is signed or a request dispatched, so a
//! rejected write never reaches the network.

use crate::error::ValidationError;
use crate::object::{is_reserved, Tags};

/// Reject tag keys in the reserved `:` namespace.
pub fn validate_tag_key(key: &str) -> Result<(), ValidationError> {
    if is_reserved(key) {
        return Err(ValidationError::InvalidTag(key.to_string()));
    }
    Ok(())
}

/// Validate every key of a tag set being written.
pub fn validate_tags(tags: &Tags) -> Result<(), ValidationError> {
    tags.keys().try_for_each(validate_tag_key)
}
