//! # Validation Module
//!
//! Required-field checks run before a request leaves the process.
//!
//! ## Usage
//! ```rust
//! use std::collections::BTreeMap;
//! use kasir_core::validation::{require_keys, require_non_empty};
//!
//! require_non_empty("id", "42").unwrap();
//! assert!(require_non_empty("id", "  ").is_err());
//!
//! let mut params = BTreeMap::new();
//! params.insert("group_pos".to_string(), "G1".to_string());
//! assert!(require_keys(&params, &["group_pos", "waktu"]).is_err());
//! ```

use std::collections::BTreeMap;

use crate::error::{ValidationError, ValidationResult};

/// Fails with `Required` if `value` is empty or only whitespace.
pub fn require_non_empty(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Checks that every key is present in `params` with a non-empty value.
///
/// Reports the first missing key, in the order given.
pub fn require_keys(params: &BTreeMap<String, String>, keys: &[&str]) -> ValidationResult<()> {
    for key in keys {
        match params.get(*key) {
            Some(value) => require_non_empty(key, value)?,
            None => {
                return Err(ValidationError::Required {
                    field: key.to_string(),
                })
            }
        }
    }
    Ok(())
}

/// Like [`require_non_empty`], but tags the error with a batch index.
pub fn require_item_field(index: usize, field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::RequiredAt {
            index,
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
