//! Space naming rules.

use crate::error::{Error, Result};
use crate::path::PATH_SEPARATOR;

/// Maximum length of a space name, in characters.
pub const MAX_SPACE_NAME_LEN: usize = 255;

/// Trim and validate a space name.
pub fn normalize_space_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidSpaceName("name must not be empty".to_string()));
    }
    if name.chars().count() > MAX_SPACE_NAME_LEN {
        return Err(Error::InvalidSpaceName(format!(
            "name exceeds {MAX_SPACE_NAME_LEN} characters"
        )));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(Error::InvalidSpaceName(format!(
            "name must not contain '{PATH_SEPARATOR}': {name}"
        )));
    }
    Ok(name.to_string())
}

/// Key used to enforce case-insensitive uniqueness of space names.
pub fn space_name_key(name: &str) -> String {
    name.trim().to_lowercase()
}
