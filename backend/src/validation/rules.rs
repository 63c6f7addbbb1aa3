//! Common validation rules shared across request payloads.

use validator::ValidationError;

pub const USERNAME_MIN_LEN: usize = 3;
pub const USERNAME_MAX_LEN: usize = 32;
pub const PASSWORD_MIN_LEN: usize = 8;
pub const PASSWORD_MAX_LEN: usize = 128;

/// Validates username format.
///
/// Requirements:
/// - Only ASCII alphanumeric characters and underscores
/// - 3-32 characters in length
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(ValidationError::new("username_invalid_length"));
    }

    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ValidationError::new("username_invalid_characters"));
    }

    Ok(())
}

/// Validates password length. Strength rules belong to the client.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err(ValidationError::new("password_invalid_length"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rejects_too_short() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("").is_err());
    }

    #[test]
    fn username_rejects_too_long() {
        assert!(validate_username(&"a".repeat(USERNAME_MAX_LEN + 1)).is_err());
    }

    #[test]
    fn username_rejects_special_chars() {
        assert!(validate_username("user@name").is_err());
        assert!(validate_username("usér").is_err());
    }

    #[test]
    fn username_accepts_valid() {
        assert!(validate_username("valid_user123").is_ok());
        assert!(validate_username("abc").is_ok());
    }

    #[test]
    fn password_length_bounds() {
        assert!(validate_password("short").is_err());
        assert!(validate_password("long enough").is_ok());
        assert!(validate_password(&"x".repeat(PASSWORD_MAX_LEN + 1)).is_err());
    }
}
