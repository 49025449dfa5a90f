//! Validated forms for the records the portal creates by hand.
//!
//! Each form mirrors what the matching entry screen collects. Values
//! arrive as typed; [`StudentForm::validate`] and friends check them
//! at submit time and report every problem at once, keyed by field,
//! so the screen can mark each input. A valid form renders into an
//! insert draft with `into_row`.

mod employee;
mod payroll;
mod student;

pub use employee::EmployeeForm;
pub use payroll::PayrollForm;
pub use student::StudentForm;

use chrono::{Datelike, NaiveDate};
use serde_json::Value;

use crate::error::ValidationErrors;
use crate::grid::Row;

/// Earliest year the organisation has records for
pub(crate) const FOUNDING_YEAR: i32 = 2005;

pub(crate) fn require(errors: &mut ValidationErrors, field: &str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, "is required");
        false
    } else {
        true
    }
}

pub(crate) fn check_email(errors: &mut ValidationErrors, field: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    let mut parts = value.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    let ok = !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains('@');
    if !ok {
        errors.add(field, "must be a valid email address");
    }
}

pub(crate) fn check_phone(errors: &mut ValidationErrors, field: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        return;
    }

    let digits = value.chars().filter(|c| c.is_ascii_digit()).count();
    let chars_ok = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, ' ' | '-' | '+' | '(' | ')'));
    if !chars_ok || !(10..=13).contains(&digits) {
        errors.add(field, "must be a phone number with 10 to 13 digits");
    }
}

pub(crate) fn parse_date(
    errors: &mut ValidationErrors,
    field: &str,
    value: &str,
) -> Option<NaiveDate> {
    match NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            errors.add(field, "must be a date in YYYY-MM-DD form");
            None
        }
    }
}

pub(crate) fn check_not_future(errors: &mut ValidationErrors, field: &str, date: NaiveDate) {
    if date > chrono::Utc::now().date_naive() {
        errors.add(field, "must not be in the future");
    }
}

pub(crate) fn check_year(errors: &mut ValidationErrors, field: &str, year: i32) {
    let latest = chrono::Utc::now().year() + 1;
    if !(FOUNDING_YEAR..=latest).contains(&year) {
        errors.add(
            field,
            format!("must be between {} and {}", FOUNDING_YEAR, latest),
        );
    }
}

/// Insert a trimmed text value, leaving blanks out of the draft
pub(crate) fn put_text(row: &mut Row, field: &str, value: &str) {
    let value = value.trim();
    if !value.is_empty() {
        row.insert(field.to_string(), Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(check: impl FnOnce(&mut ValidationErrors)) -> ValidationErrors {
        let mut errors = ValidationErrors::new();
        check(&mut errors);
        errors
    }

    #[test]
    fn email_shapes() {
        assert!(collect(|e| check_email(e, "email", "hr@beacon.org")).is_empty());
        assert!(collect(|e| check_email(e, "email", "")).is_empty());
        assert!(!collect(|e| check_email(e, "email", "hr@beacon")).is_empty());
        assert!(!collect(|e| check_email(e, "email", "beacon.org")).is_empty());
        assert!(!collect(|e| check_email(e, "email", "@beacon.org")).is_empty());
        assert!(!collect(|e| check_email(e, "email", "hr@.org")).is_empty());
    }

    #[test]
    fn phone_shapes() {
        assert!(collect(|e| check_phone(e, "phone", "+91 98765 43210")).is_empty());
        assert!(collect(|e| check_phone(e, "phone", "9876543210")).is_empty());
        assert!(collect(|e| check_phone(e, "phone", "(080) 2656-1234")).is_empty());
        assert!(!collect(|e| check_phone(e, "phone", "12345")).is_empty());
        assert!(!collect(|e| check_phone(e, "phone", "98765x43210")).is_empty());
        assert!(!collect(|e| check_phone(e, "phone", "call me maybe")).is_empty());
    }

    #[test]
    fn dates_parse_and_reject_the_future() {
        let mut errors = ValidationErrors::new();
        let date = parse_date(&mut errors, "dob", "2014-03-05").unwrap();
        check_not_future(&mut errors, "dob", date);
        assert!(errors.is_empty());

        let mut errors = ValidationErrors::new();
        assert!(parse_date(&mut errors, "dob", "05/03/2014").is_none());
        assert!(!errors.is_empty());

        let mut errors = ValidationErrors::new();
        check_not_future(&mut errors, "dob", NaiveDate::from_ymd_opt(2999, 1, 1).unwrap());
        assert_eq!(errors.field("dob").unwrap(), &["must not be in the future".to_string()]);
    }
}
