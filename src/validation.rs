//! Server-side form validation.
//!
//! All-or-nothing: either every field passes and a `ValidatedLead` comes
//! back, or the caller gets one error message per failing field. Nothing in
//! here performs I/O.

use std::collections::BTreeMap;

use crate::models::{Meeting, SubmitRequest, ValidatedLead};
use crate::routing::Product;

/// Field name -> human-readable message, ordered so aggregated output is
/// stable.
pub type FieldErrors = BTreeMap<&'static str, String>;

/// Phone policy, pluggable per region. The default is the Israeli mobile
/// rule: `05` followed by 8 digits after normalization.
#[derive(Debug, Clone, Copy)]
pub struct PhoneRule {
    pub prefix: &'static str,
    pub total_digits: usize,
    pub hint: &'static str,
}

pub const ISRAELI_MOBILE: PhoneRule = PhoneRule {
    prefix: "05",
    total_digits: 10,
    hint: "Please enter a valid Israeli phone (05X-XXXXXXX)",
};

impl PhoneRule {
    pub fn matches(&self, normalized: &str) -> bool {
        normalized.len() == self.total_digits
            && normalized.starts_with(self.prefix)
            && normalized.bytes().all(|b| b.is_ascii_digit())
    }
}

/// Strip spaces, hyphens and parentheses. Idempotent.
pub fn normalize_phone(phone: &str) -> String {
    phone
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')'))
        .collect()
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.is_empty() {
        return false;
    }
    if local.contains(char::is_whitespace) || domain.contains(char::is_whitespace) {
        return false;
    }
    if domain.contains('@') {
        return false;
    }
    // Require a dot with something on both sides of it.
    match domain.rsplit_once('.') {
        Some((name, tld)) => !name.is_empty() && !tld.is_empty(),
        None => false,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn validate_submission(
    raw: &SubmitRequest,
    phone_rule: &PhoneRule,
) -> Result<ValidatedLead, FieldErrors> {
    let mut errors = FieldErrors::new();

    let full_name = raw.full_name.trim();
    if full_name.is_empty() {
        errors.insert("fullName", "Full name is required".to_string());
    } else if full_name.chars().count() < 2 {
        errors.insert("fullName", "Name must be at least 2 characters".to_string());
    }

    let email = raw.email.trim();
    if email.is_empty() {
        errors.insert("email", "Email is required".to_string());
    } else if !is_valid_email(email) {
        errors.insert("email", "Please enter a valid email address".to_string());
    }

    let phone = normalize_phone(raw.phone.trim());
    if phone.is_empty() {
        errors.insert("phone", "Phone is required".to_string());
    } else if !phone_rule.matches(&phone) {
        errors.insert("phone", phone_rule.hint.to_string());
    }

    let product = if raw.product.is_empty() {
        errors.insert("product", "Please select a product".to_string());
        None
    } else {
        match Product::parse(&raw.product) {
            Some(p) => Some(p),
            None => {
                errors.insert("product", "Please select a valid product".to_string());
                None
            }
        }
    };

    if !errors.is_empty() {
        return Err(errors);
    }

    let medium = non_empty(&raw.meeting_medium);
    let datetime = non_empty(&raw.meeting_datetime);
    let meeting = if medium.is_some() || datetime.is_some() {
        Some(Meeting { medium, datetime })
    } else {
        None
    };

    Ok(ValidatedLead {
        full_name: full_name.to_string(),
        email: email.to_string(),
        phone,
        // Unwrap is safe: errors is empty, so product parsed.
        product: product.expect("product validated"),
        message: non_empty(&raw.message),
        meeting,
    })
}

/// One line per failing field, for the response message.
pub fn aggregate_errors(errors: &FieldErrors) -> String {
    errors
        .values()
        .cloned()
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_request() -> SubmitRequest {
        SubmitRequest {
            full_name: "Jane Doe".to_string(),
            email: "jane@x.com".to_string(),
            phone: "054-111-2222".to_string(),
            product: "web-development".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn accepts_a_complete_submission() {
        let lead = validate_submission(&valid_request(), &ISRAELI_MOBILE).unwrap();
        assert_eq!(lead.full_name, "Jane Doe");
        assert_eq!(lead.phone, "0541112222");
        assert_eq!(lead.product, Product::WebDevelopment);
        assert!(lead.message.is_none());
        assert!(lead.meeting.is_none());
    }

    #[test]
    fn missing_required_field_flags_exactly_that_field() {
        let cases: [(&str, fn(&mut SubmitRequest)); 4] = [
            ("fullName", |r| r.full_name.clear()),
            ("email", |r| r.email.clear()),
            ("phone", |r| r.phone.clear()),
            ("product", |r| r.product.clear()),
        ];
        for (field, clear) in cases {
            let mut raw = valid_request();
            clear(&mut raw);
            let errors = validate_submission(&raw, &ISRAELI_MOBILE).unwrap_err();
            assert_eq!(errors.len(), 1, "{field}: {errors:?}");
            assert!(errors.contains_key(field), "{field}: {errors:?}");
        }
    }

    #[test]
    fn reports_every_failing_field_at_once() {
        let raw = SubmitRequest {
            full_name: "J".to_string(),
            email: "not-an-email".to_string(),
            phone: "12345".to_string(),
            product: "consulting".to_string(),
            ..Default::default()
        };
        let errors = validate_submission(&raw, &ISRAELI_MOBILE).unwrap_err();
        assert_eq!(errors.len(), 4);
        let message = aggregate_errors(&errors);
        assert!(message.contains("valid email"));
        assert!(message.contains("valid product"));
    }

    #[test]
    fn phone_normalization_is_idempotent() {
        let once = normalize_phone("054-123-4567");
        let twice = normalize_phone(&once);
        assert_eq!(once, "0541234567");
        assert_eq!(once, twice);
    }

    #[test]
    fn dashed_and_plain_phones_validate_the_same() {
        for phone in ["054-123-4567", "0541234567", "(054) 123 4567"] {
            let mut raw = valid_request();
            raw.phone = phone.to_string();
            let lead = validate_submission(&raw, &ISRAELI_MOBILE).unwrap();
            assert_eq!(lead.phone, "0541234567", "{phone}");
        }
    }

    #[test]
    fn rejects_non_mobile_phones() {
        for phone in ["021234567", "05412345", "054123456789", "05a1234567"] {
            let mut raw = valid_request();
            raw.phone = phone.to_string();
            let errors = validate_submission(&raw, &ISRAELI_MOBILE).unwrap_err();
            assert!(errors.contains_key("phone"), "{phone}");
        }
    }

    #[test]
    fn rejects_malformed_emails() {
        for email in ["plain", "@x.com", "a@", "a@nodot", "a b@x.com", "a@x."] {
            assert!(!is_valid_email(email), "{email}");
        }
        assert!(is_valid_email("a.b+c@sub.domain.co.il"));
    }

    #[test]
    fn unknown_product_is_a_validation_error() {
        let mut raw = valid_request();
        raw.product = "consulting".to_string();
        let errors = validate_submission(&raw, &ISRAELI_MOBILE).unwrap_err();
        assert_eq!(
            errors.get("product").map(String::as_str),
            Some("Please select a valid product")
        );
    }

    #[test]
    fn optional_fields_pass_through_trimmed() {
        let mut raw = valid_request();
        raw.message = "  hello  ".to_string();
        raw.meeting_medium = "online".to_string();
        raw.meeting_datetime = "2026-09-01T10:00".to_string();
        let lead = validate_submission(&raw, &ISRAELI_MOBILE).unwrap();
        assert_eq!(lead.message.as_deref(), Some("hello"));
        let meeting = lead.meeting.unwrap();
        assert_eq!(meeting.medium.as_deref(), Some("online"));
        assert_eq!(meeting.datetime.as_deref(), Some("2026-09-01T10:00"));
    }
}
