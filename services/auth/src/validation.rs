//! Input validation for registration

use regex::Regex;
use std::sync::OnceLock;

/// Validate email
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.is_empty() {
        return Err("Email is required".to_string());
    }

    if email.len() > 254 {
        return Err("Email must be at most 254 characters long".to_string());
    }

    static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
            .expect("Failed to compile email regex")
    });

    if !regex.is_match(email) {
        return Err("Invalid email format".to_string());
    }

    Ok(())
}

/// Validate password strength
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if password.len() > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    let has_special = password.chars().any(|c| !c.is_alphanumeric());

    if !has_upper {
        return Err("Password must contain at least one uppercase letter".to_string());
    }

    if !has_lower {
        return Err("Password must contain at least one lowercase letter".to_string());
    }

    if !has_digit {
        return Err("Password must contain at least one digit".to_string());
    }

    if !has_special {
        return Err("Password must contain at least one special character".to_string());
    }

    Ok(())
}

/// Validate a given name
pub fn validate_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("First name is required".to_string());
    }

    if name.chars().count() > 100 {
        return Err("First name must be at most 100 characters long".to_string());
    }

    if name.chars().any(char::is_control) {
        return Err("First name contains invalid characters".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("alumni@college.edu").is_ok());
        assert!(validate_email("first.last+events@mail.example.org").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign.example.com").is_err());
        assert!(validate_email("a@b").is_err());
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("Correct-Horse-9").is_ok());
        assert_eq!(
            validate_password("Sh0rt!"),
            Err("Password must be at least 8 characters long".to_string())
        );
        assert!(validate_password("alllowercase-1").is_err());
        assert!(validate_password("ALLUPPERCASE-1").is_err());
        assert!(validate_password("No-Digits-Here").is_err());
        assert!(validate_password("NoSpecial123").is_err());
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Grace").is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name("Bad\nName").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
    }
}
