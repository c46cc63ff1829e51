use lazy_static::lazy_static;
use regex::Regex;

use super::schema;
use crate::error::FieldError;

pub const NAME_MIN_LENGTH: usize = 3;
pub const PASSWORD_MIN_LENGTH: usize = 8;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Trim + lowercase, the form emails are stored and looked up in.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn check_max(field: &'static str, value: &str, errors: &mut Vec<FieldError>) {
    if let Some(max) = schema::max_length(field) {
        if value.chars().count() > max {
            errors.push(FieldError::new(field, format!("must be at most {} characters", max)));
        }
    }
}

/// Lengths are counted on the trimmed name.
pub fn check_name(name: &str, errors: &mut Vec<FieldError>) {
    let name = name.trim();
    if name.is_empty() {
        errors.push(FieldError::new("name", "must not be blank"));
        return;
    }
    if name.chars().count() < NAME_MIN_LENGTH {
        errors.push(FieldError::new(
            "name",
            format!("must be at least {} characters", NAME_MIN_LENGTH),
        ));
    }
    check_max("name", name, errors);
}

/// Expects an already normalized email.
pub fn check_email(email: &str, errors: &mut Vec<FieldError>) {
    if email.is_empty() {
        errors.push(FieldError::new("email", "must not be blank"));
        return;
    }
    if !is_valid_email(email) {
        errors.push(FieldError::new("email", "is not a valid email address"));
    }
    check_max("email", email, errors);
}

pub fn check_phone_number(phone: Option<&str>, errors: &mut Vec<FieldError>) {
    if let Some(phone) = phone {
        check_max("phone_number", phone, errors);
    }
}

pub fn check_password(password: &str, errors: &mut Vec<FieldError>) {
    if password.chars().count() < PASSWORD_MIN_LENGTH {
        errors.push(FieldError::new(
            "password",
            format!("must be at least {} characters", PASSWORD_MIN_LENGTH),
        ));
    }
}

pub fn finish(errors: Vec<FieldError>) -> Result<(), Vec<FieldError>> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name_errors(name: &str) -> Vec<FieldError> {
        let mut e = Vec::new();
        check_name(name, &mut e);
        e
    }

    #[test]
    fn email_pattern() {
        assert!(is_valid_email("a@example.com"));
        assert!(!is_valid_email("a@example"));
        assert!(!is_valid_email("no-at.example.com"));
        assert!(!is_valid_email("a b@example.com"));
    }

    #[test]
    fn normalize_trims_and_lowercases() {
        assert_eq!(normalize_email("  Ann@Example.COM "), "ann@example.com");
    }

    #[test]
    fn name_rules() {
        assert!(name_errors("Ann").is_empty());
        assert_eq!(name_errors("   ")[0].message, "must not be blank");
        assert_eq!(name_errors("Al")[0].message, "must be at least 3 characters");
        assert_eq!(name_errors(&"x".repeat(256)).len(), 1);
        // counted in characters, not bytes
        assert!(name_errors("Émé").is_empty());
    }

    #[test]
    fn name_padding_does_not_count_toward_length() {
        assert_eq!(name_errors(" A ")[0].message, "must be at least 3 characters");
        assert_eq!(name_errors("  Al   ").len(), 1);
        assert!(name_errors("  Ann  ").is_empty());
    }

    #[test]
    fn email_rules() {
        let mut e = Vec::new();
        check_email("", &mut e);
        check_email("nope", &mut e);
        check_email(&format!("{}@example.com", "a".repeat(180)), &mut e);
        let fields: Vec<_> = e.iter().map(|f| f.field).collect();
        assert_eq!(fields, vec!["email"; 3]);
    }

    #[test]
    fn phone_and_password_rules() {
        let mut e = Vec::new();
        check_phone_number(None, &mut e);
        check_phone_number(Some("+1 555 0100"), &mut e);
        assert!(e.is_empty());
        check_phone_number(Some(&"1".repeat(31)), &mut e);
        check_password("short", &mut e);
        assert_eq!(finish(e).unwrap_err().len(), 2);
    }
}
