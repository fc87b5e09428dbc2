//! Core domain entities, rules, and traits for InvKeeper.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors returned by core validation, storage backends, and identity providers.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Returned when a validation rule is violated.
    #[error("validation error: {0}")]
    Validation(String),
    /// Returned when a unique key is already taken.
    #[error("duplicate: {0}")]
    Duplicate(String),
    /// Returned when a record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
    /// Returned when credentials are rejected.
    #[error("authentication error: {0}")]
    Auth(String),
    /// Returned when repository operations fail.
    #[error("storage error: {0}")]
    Storage(String),
}

/// Longest accepted item name, in characters.
pub const MAX_NAME_LEN: usize = 40;
/// Largest accepted item code (four digits).
pub const MAX_CODE: u32 = 9_999;
/// Largest accepted quantity (four digits).
pub const MAX_QUANTITY: u32 = 9_999;
/// Largest accepted unit price; every backend can store it as a signed 64-bit integer.
pub const MAX_PRICE: u64 = 9_223_372_036_854_775_807;
/// Shortest accepted password, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;
/// Longest accepted password, in characters.
pub const MAX_PASSWORD_LEN: usize = 10;

/// Message shown when the add form does not validate.
pub const INVALID_FORM_MESSAGE: &str = "Please fill in all fields correctly";

/// An inventory record.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct InventoryItem {
    /// Backend-assigned identifier. Absent for document backends and unsaved items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Business key, unique across live items.
    pub code: u32,
    /// Display name.
    pub name: String,
    /// Unit price in major currency units.
    pub price: u64,
    /// Units in stock.
    pub quantity: u32,
}

impl InventoryItem {
    /// Create a new unsaved item, validating the name.
    pub fn new(code: u32, name: impl Into<String>, price: u64, quantity: u32) -> CoreResult<Self> {
        let name = validate_name(name.into())?;
        validate_price(price)?;
        Ok(Self {
            id: None,
            code,
            name,
            price,
            quantity,
        })
    }

    /// Return a copy carrying a backend identifier.
    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    /// Key used to look the item up again: the identifier when assigned, otherwise the code.
    pub fn key(&self) -> i64 {
        self.id.unwrap_or_else(|| i64::from(self.code))
    }

    /// Value of this line: price times quantity.
    pub fn total(&self) -> u128 {
        u128::from(self.price) * u128::from(self.quantity)
    }
}

fn validate_name(name: String) -> CoreResult<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(CoreError::Validation("name cannot be empty".into()));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(name)
}

fn validate_price(price: u64) -> CoreResult<u64> {
    if price > MAX_PRICE {
        return Err(CoreError::Validation("invalid price".into()));
    }
    Ok(price)
}

/// Parse the raw fields of the add form into a new item.
///
/// Code, price and quantity must be positive integers; the code has at most four digits.
pub fn parse_new_item(code: &str, name: &str, price: &str, quantity: &str) -> CoreResult<InventoryItem> {
    let invalid = || CoreError::Validation(INVALID_FORM_MESSAGE.into());
    let code: u32 = code.trim().parse().map_err(|_| invalid())?;
    let price: u64 = price.trim().parse().map_err(|_| invalid())?;
    let quantity: u32 = quantity.trim().parse().map_err(|_| invalid())?;
    if code == 0 || code > MAX_CODE || price == 0 || price > MAX_PRICE || quantity == 0 || quantity > MAX_QUANTITY {
        return Err(invalid());
    }
    InventoryItem::new(code, name, price, quantity).map_err(|_| invalid())
}

/// Apply the raw fields of the edit form to an existing item.
///
/// The identifier and code are kept. Price takes 1 to 20 digits, quantity 1 to 4.
pub fn apply_edit(item: &InventoryItem, name: &str, price: &str, quantity: &str) -> CoreResult<InventoryItem> {
    let name = validate_name(name.to_string())?;
    let price = price.trim();
    if !is_digits(price, 20) {
        return Err(CoreError::Validation("invalid price".into()));
    }
    let price: u64 = price
        .parse()
        .map_err(|_| CoreError::Validation("invalid price".into()))?;
    let price = validate_price(price)?;
    let quantity = quantity.trim();
    if !is_digits(quantity, 4) {
        return Err(CoreError::Validation("invalid quantity".into()));
    }
    let quantity: u32 = quantity
        .parse()
        .map_err(|_| CoreError::Validation("invalid quantity".into()))?;
    Ok(InventoryItem {
        id: item.id,
        code: item.code,
        name,
        price,
        quantity,
    })
}

fn is_digits(value: &str, max_len: usize) -> bool {
    !value.is_empty() && value.len() <= max_len && value.bytes().all(|b| b.is_ascii_digit())
}

/// True when every form field has content.
pub fn fields_filled(fields: &[&str]) -> bool {
    fields.iter().all(|field| !field.is_empty())
}

/// Password rule: between six and ten characters inclusive.
pub fn is_password_valid(password: &str) -> bool {
    (MIN_PASSWORD_LEN..=MAX_PASSWORD_LEN).contains(&password.chars().count())
}

/// Both credential fields must be non-empty before submission.
pub fn are_fields_complete(email: &str, password: &str) -> bool {
    !email.is_empty() && !password.is_empty()
}

/// Sum of price times quantity across all items.
pub fn inventory_total(items: &[InventoryItem]) -> u128 {
    items.iter().map(InventoryItem::total).sum()
}

/// Storage backend abstraction for inventory items.
///
/// Implementations report failures precisely; callers that want the
/// collapsed boolean contract go through the application repository.
pub trait InventoryStore {
    /// Short backend name used in logs.
    fn name(&self) -> &'static str;
    /// Fetch all items ordered by code.
    fn list(&self) -> CoreResult<Vec<InventoryItem>>;
    /// Fetch a single item by its lookup key (see [`InventoryItem::key`]).
    fn get(&self, key: i64) -> CoreResult<Option<InventoryItem>>;
    /// Insert a new item, failing with [`CoreError::Duplicate`] when the code is taken.
    fn insert(&self, item: &InventoryItem) -> CoreResult<InventoryItem>;
    /// Rewrite an existing item.
    fn update(&self, item: &InventoryItem) -> CoreResult<()>;
    /// Remove an item.
    fn delete(&self, item: &InventoryItem) -> CoreResult<()>;
}

/// Boolean key-value preferences scoped to one file.
pub trait Preferences {
    /// Read a flag; `None` when the key was never written.
    fn get_bool(&self, key: &str) -> CoreResult<Option<bool>>;
    /// Write a flag.
    fn put_bool(&self, key: &str, value: bool) -> CoreResult<()>;
    /// Remove every key.
    fn clear(&self) -> CoreResult<()>;
}

/// Credentials entered on the login screen.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserRequest {
    /// Account email.
    pub email: String,
    /// Plain-text password as typed.
    pub password: String,
}

impl UserRequest {
    /// Bundle credentials.
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Outcome of a login or registration attempt, ready for display.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct AuthResponse {
    /// Whether the attempt succeeded.
    pub is_successful: bool,
    /// Message to show the user.
    pub message: String,
    /// Email of the signed-in user on success.
    pub email: Option<String>,
}

/// External identity provider for email/password accounts.
pub trait IdentityProvider {
    /// Verify credentials and return the account email.
    fn sign_in(&self, email: &str, password: &str) -> CoreResult<String>;
    /// Create an account and return its email. Fails with [`CoreError::Duplicate`]
    /// when the email is already registered.
    fn register(&self, email: &str, password: &str) -> CoreResult<String>;
}

/// Result of a platform biometric prompt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BiometricOutcome {
    /// The user was recognized.
    Succeeded,
    /// The prompt failed or was dismissed.
    Failed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_length_bounds() {
        assert!(!is_password_valid("12345"));
        assert!(is_password_valid("123456"));
        assert!(is_password_valid("1234567890"));
        assert!(!is_password_valid("12345678901"));
    }

    #[test]
    fn credential_fields_must_both_be_filled() {
        assert!(!are_fields_complete("", "x"));
        assert!(!are_fields_complete("x", ""));
        assert!(are_fields_complete("a", "b"));
    }

    #[test]
    fn item_rejects_long_or_empty_name() {
        assert!(matches!(
            InventoryItem::new(1, "   ", 1, 1),
            Err(CoreError::Validation(_))
        ));
        let long = "x".repeat(MAX_NAME_LEN + 1);
        assert!(matches!(
            InventoryItem::new(1, long, 1, 1),
            Err(CoreError::Validation(_))
        ));
        assert!(InventoryItem::new(1, "x".repeat(MAX_NAME_LEN), 1, 1).is_ok());
    }

    #[test]
    fn add_form_requires_positive_values() {
        let item = parse_new_item("200", "New Item", "20", "5").unwrap();
        assert_eq!(item.code, 200);
        assert_eq!(item.id, None);
        assert!(parse_new_item("0", "x", "1", "1").is_err());
        assert!(parse_new_item("10000", "x", "1", "1").is_err());
        assert!(parse_new_item("1", "x", "0", "1").is_err());
        assert!(parse_new_item("1", "x", "1", "abc").is_err());
    }

    #[test]
    fn edit_keeps_identity_and_allows_zero() {
        let item = InventoryItem::new(7, "Bolt", 10, 3).unwrap().with_id(42);
        let edited = apply_edit(&item, " Nut ", "0", "0").unwrap();
        assert_eq!(edited.id, Some(42));
        assert_eq!(edited.code, 7);
        assert_eq!(edited.name, "Nut");
        assert!(apply_edit(&item, "Nut", "1", "12345").is_err());
        assert!(apply_edit(&item, "Nut", "-1", "1").is_err());
    }

    #[test]
    fn price_must_fit_every_backend() {
        let too_big = "9223372036854775808";
        assert!(parse_new_item("1", "Big", too_big, "1").is_err());
        assert!(parse_new_item("1", "Big", "9223372036854775807", "1").is_ok());

        let item = InventoryItem::new(1, "Big", 1, 1).unwrap();
        assert!(matches!(
            apply_edit(&item, "Big", too_big, "1"),
            Err(CoreError::Validation(_))
        ));
        assert!(matches!(
            apply_edit(&item, "Big", "18446744073709551615", "1"),
            Err(CoreError::Validation(_))
        ));
        assert_eq!(apply_edit(&item, "Big", "9223372036854775807", "1").unwrap().price, MAX_PRICE);
        assert!(InventoryItem::new(1, "Big", u64::MAX, 1).is_err());
    }

    #[test]
    fn key_prefers_identifier() {
        let item = InventoryItem::new(300, "Cable", 1, 1).unwrap();
        assert_eq!(item.key(), 300);
        assert_eq!(item.with_id(9).key(), 9);
    }

    #[test]
    fn total_sums_lines() {
        let items = vec![
            InventoryItem::new(1, "a", 20, 5).unwrap(),
            InventoryItem::new(2, "b", 3, 7).unwrap(),
        ];
        assert_eq!(inventory_total(&items), 121);
        assert_eq!(inventory_total(&[]), 0);
    }

    #[test]
    fn add_form_fields_filled() {
        assert!(fields_filled(&["1", "a", "2", "3"]));
        assert!(!fields_filled(&["1", "", "2", "3"]));
    }
}
