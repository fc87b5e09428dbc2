//! Shared helpers and error types for InvKeeper.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Result type for shared helpers.
pub type UtilsResult<T> = Result<T, UtilsError>;

/// Shared error variants for cross-crate helpers.
#[derive(Debug, Error)]
pub enum UtilsError {
    /// An IO error occurred.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// A serialization error occurred.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// A parsing error occurred.
    #[error("parse error: {0}")]
    Parse(String),
}

/// Placeholder shown instead of a hidden amount.
pub const MASKED_AMOUNT: &str = "$ ****";

/// Format a whole amount with two decimals, `.` for thousands and `,` for decimals.
pub fn format_money(amount: u128) -> String {
    format!("{},00", group_thousands(amount))
}

/// Format an amount with the currency sign, as shown on the widget and list rows.
pub fn format_currency(amount: u128) -> String {
    format!("$ {}", format_money(amount))
}

fn group_thousands(amount: u128) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

/// Normalize a value read from a config file or environment variable.
pub fn normalize_key(input: &str) -> String {
    input.trim().to_ascii_lowercase()
}

/// Read a YAML document, returning `None` when the file does not exist.
pub fn read_yaml<T: DeserializeOwned>(path: &Path) -> UtilsResult<Option<T>> {
    if !path.exists() {
        return Ok(None);
    }
    let contents = fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(None);
    }
    serde_yaml::from_str(&contents)
        .map(Some)
        .map_err(|err| UtilsError::Parse(format!("{}: {err}", path.display())))
}

/// Write a YAML document, creating parent directories as needed.
pub fn write_yaml<T: Serialize>(path: &Path, value: &T) -> UtilsResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let contents =
        serde_yaml::to_string(value).map_err(|err| UtilsError::Serialization(err.to_string()))?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_thousands_with_dots() {
        assert_eq!(format_money(0), "0,00");
        assert_eq!(format_money(999), "999,00");
        assert_eq!(format_money(1_000), "1.000,00");
        assert_eq!(format_money(1_234_567), "1.234.567,00");
    }

    #[test]
    fn yaml_round_trip_and_missing_file() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("nested").join("flags.yaml");
        let missing: Option<Vec<u32>> = read_yaml(&path).expect("read missing");
        assert!(missing.is_none());

        write_yaml(&path, &vec![1u32, 2, 3]).expect("write");
        let loaded: Option<Vec<u32>> = read_yaml(&path).expect("read");
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }

    #[test]
    fn malformed_yaml_is_a_parse_error() {
        let temp = tempfile::TempDir::new().expect("temp dir");
        let path = temp.path().join("bad.yaml");
        std::fs::write(&path, "[unclosed").expect("write");
        let result: UtilsResult<Option<Vec<u32>>> = read_yaml(&path);
        assert!(matches!(result, Err(UtilsError::Parse(_))));
    }

    #[test]
    fn currency_prefix() {
        insta::assert_snapshot!(format_currency(100), @"$ 100,00");
    }
}
