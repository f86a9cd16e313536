//! Key and value validation
//!
//! Validation runs before any backend call. Keys are checked before the
//! value is encoded; values are checked on their encoded form, which is the
//! only shape every codec shares. The object path a key resolves to is
//! checked as well, since the base path counts toward object name limits.

use crate::storage::constants::{MAX_KEY_LENGTH, MAX_OBJECT_PATH_LENGTH, MAX_VALUE_SIZE};

/// Pluggable key/value validator
pub trait Validator: Send + Sync {
    /// Check a logical key, returning the reason it is rejected
    fn check_key(&self, key: &str) -> Result<(), String>;

    /// Check an encoded value, returning the reason it is rejected
    fn check_value(&self, encoded: &[u8]) -> Result<(), String>;

    /// Check the object path a valid key resolves to
    fn check_path(&self, _path: &str) -> Result<(), String> {
        Ok(())
    }
}

/// Default validator
#[derive(Debug, Clone, Copy)]
pub struct KeyValueValidator {
    /// Maximum key length in bytes
    pub max_key_length: usize,
    /// Maximum encoded value size in bytes
    pub max_value_size: usize,
    /// Maximum object path length in bytes, base path included
    pub max_path_length: usize,
}

impl Default for KeyValueValidator {
    fn default() -> Self {
        Self {
            max_key_length: MAX_KEY_LENGTH,
            max_value_size: MAX_VALUE_SIZE,
            max_path_length: MAX_OBJECT_PATH_LENGTH,
        }
    }
}

impl Validator for KeyValueValidator {
    fn check_key(&self, key: &str) -> Result<(), String> {
        if key.is_empty() {
            return Err("Key cannot be empty".to_string());
        }

        if key.len() > self.max_key_length {
            return Err(format!(
                "Key too long (max {} bytes)",
                self.max_key_length
            ));
        }

        // Check for invalid characters
        if key.contains('\0') || key.contains('\n') || key.contains('\r') {
            return Err("Key contains invalid characters".to_string());
        }

        Ok(())
    }

    fn check_value(&self, encoded: &[u8]) -> Result<(), String> {
        if encoded.is_empty() {
            return Err("Value encodes to an empty payload".to_string());
        }

        if encoded.len() > self.max_value_size {
            return Err(format!(
                "Value too large ({} bytes, max {})",
                encoded.len(),
                self.max_value_size
            ));
        }

        Ok(())
    }

    fn check_path(&self, path: &str) -> Result<(), String> {
        if path.len() > self.max_path_length {
            return Err(format!(
                "Object path too long ({} bytes, max {})",
                path.len(),
                self.max_path_length
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_key() {
        let validator = KeyValueValidator::default();
        assert!(validator.check_key("valid/key").is_ok());
        assert!(validator.check_key("").is_err());
        assert!(validator.check_key("key\0with\0nulls").is_err());
        assert!(validator.check_key("key\nwith\nnewlines").is_err());
        assert!(validator.check_key(&"k".repeat(MAX_KEY_LENGTH)).is_ok());
        assert!(validator.check_key(&"k".repeat(MAX_KEY_LENGTH + 1)).is_err());
    }

    #[test]
    fn test_validate_value() {
        let validator = KeyValueValidator {
            max_value_size: 8,
            ..Default::default()
        };
        assert!(validator.check_value(b"{}").is_ok());
        assert!(validator.check_value(b"").is_err());
        assert!(validator.check_value(b"123456789").is_err());
    }

    #[test]
    fn test_validate_path() {
        let validator = KeyValueValidator::default();
        assert!(validator.check_path(&"p".repeat(MAX_OBJECT_PATH_LENGTH)).is_ok());
        assert!(validator
            .check_path(&"p".repeat(MAX_OBJECT_PATH_LENGTH + 1))
            .is_err());
    }
}
