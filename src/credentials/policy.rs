//! Registration-time password rules.

use super::MAX_PASSWORD_BYTES;
use regex::Regex;
use thiserror::Error;

const MIN_PASSWORD_LEN: usize = 8;

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PasswordPolicyError {
    #[error("Password must be at least 8 characters")]
    TooShort,
    #[error("Password must be at most 71 bytes")]
    TooLong,
    #[error("Password must contain at least one uppercase letter")]
    MissingUppercase,
    #[error("Password must contain at least one number")]
    MissingDigit,
    #[error(
        "Password must contain at least one special character (e.g., ! @ # $ % ^ & * ( ) - _ = + \\ | [ ] {{ }} ; : / ? . < >)"
    )]
    MissingSpecial,
    #[error("Passwords do not match")]
    Mismatch,
}

fn matches(pattern: &str, password: &str) -> bool {
    Regex::new(pattern).is_ok_and(|re| re.is_match(password))
}

/// Check a new password and its confirmation. Reports the first rule that
/// fails.
///
/// # Errors
/// Returns the violated rule.
pub fn check_password_policy(password: &str, confirm: &str) -> Result<(), PasswordPolicyError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PasswordPolicyError::TooShort);
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(PasswordPolicyError::TooLong);
    }

    if !matches(r"[A-Z]", password) {
        return Err(PasswordPolicyError::MissingUppercase);
    }

    if !matches(r"\d", password) {
        return Err(PasswordPolicyError::MissingDigit);
    }

    if !matches(r"[!@#$%^&*()\-_=+\\|\[\]{};:/?.><]", password) {
        return Err(PasswordPolicyError::MissingSpecial);
    }

    if password != confirm {
        return Err(PasswordPolicyError::Mismatch);
    }

    Ok(())
}
