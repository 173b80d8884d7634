use crate::error::{AppError, AppResult};
use regex::Regex;
use std::sync::OnceLock;

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$")
            .expect("email regex is valid")
    })
}

/// 验证邮箱格式
pub fn validate_email(email: &str) -> AppResult<()> {
    if !email_regex().is_match(email.trim()) {
        return Err(AppError::ValidationError(
            "A valid email address is required".to_string(),
        ));
    }
    Ok(())
}

/// Lower-cases and trims an address so lookups by email are stable.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("meera@example.com").is_ok());
        assert!(validate_email(" adv.k+bar@court.co.in ").is_ok());
        assert!(validate_email("meera@").is_err());
        assert!(validate_email("not an email").is_err());
        assert!(validate_email("").is_err());
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Meera@Example.COM "), "meera@example.com");
    }
}
