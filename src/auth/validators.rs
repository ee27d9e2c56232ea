// src/auth/validators.rs

use super::models::LoginRequest;
use crate::common::validation::looks_like_email;
use crate::common::{ValidationResult, Validator};

// ============================================================================
// Login Validators
// ============================================================================

pub struct LoginValidator;

impl Validator<LoginRequest> for LoginValidator {
    fn validate(&self, data: &LoginRequest) -> ValidationResult {
        let mut result = ValidationResult::new();

        if data.email.trim().is_empty() {
            result.add_error("email", "Email is required");
        } else if data.email.len() > 254 {
            result.add_error("email", "Email must be less than 255 characters");
        } else if !looks_like_email(&data.email) {
            result.add_error("email", "Invalid email format");
        }

        if data.password.is_empty() {
            result.add_error("password", "Password is required");
        }

        result
    }
}

/// Provider names end up in a backend path segment
pub fn is_valid_provider(provider: &str) -> bool {
    !provider.is_empty()
        && provider.len() <= 32
        && provider
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Post-login destinations must stay on this site: a single leading slash,
/// no scheme, no backslashes
pub fn safe_redirect_target(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    let same_site = next.starts_with('/')
        && !next.starts_with("//")
        && !next.contains('\\')
        && !next.contains("://");
    same_site.then_some(next)
}
