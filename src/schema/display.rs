//! Display formatting for field values and labels.
//!
//! Tables and detail cards render raw row values through
//! [`format_field`], which picks the presentation from the column
//! name: money columns get rupee formatting, date columns a short
//! date, booleans Yes/No. Unknown columns fall back to plain text.

use chrono::{DateTime, NaiveDate};
use serde_json::Value;

/// Placeholder shown for missing or unrenderable values
const EMPTY: &str = "-";

/// Render a JSON scalar as text for search and display.
///
/// Returns `None` for nulls, objects and arrays; those never take
/// part in text search.
pub fn stringify_cell(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Object(_) | Value::Array(_) => None,
    }
}

/// Human-readable column header for a field name
pub fn field_label(column: &str) -> String {
    match column {
        "id" => return "ID".to_string(),
        "dob" => return "Date of Birth".to_string(),
        _ => {}
    }

    let trimmed = column.strip_suffix("_id").unwrap_or(column);
    trimmed
        .split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_money_column(column: &str) -> bool {
    matches!(
        column,
        "salary" | "base_pay" | "allowance" | "deduction" | "net_pay" | "amount" | "fee"
    )
}

fn is_date_column(column: &str) -> bool {
    column == "dob"
        || column == "date_of_birth"
        || column == "date_of_joining"
        || column.ends_with("_date")
        || column == "created_at"
        || column == "updated_at"
}

/// Format a raw value for display, dispatching on the column name
pub fn format_field(column: &str, value: &Value) -> String {
    if value.is_null() {
        return EMPTY.to_string();
    }

    if is_money_column(column) {
        if let Some(amount) = value.as_f64() {
            return format_inr(amount);
        }
    }

    if is_date_column(column) {
        if let Some(raw) = value.as_str() {
            return format_date(raw);
        }
    }

    match value {
        Value::Bool(true) => "Yes".to_string(),
        Value::Bool(false) => "No".to_string(),
        other => stringify_cell(other).unwrap_or_else(|| EMPTY.to_string()),
    }
}

/// Format a stored date or timestamp as `05 Mar 2019`.
///
/// Unparseable input is shown as stored rather than dropped.
fn format_date(raw: &str) -> String {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.format("%d %b %Y").to_string();
    }
    if let Ok(timestamp) = DateTime::parse_from_rfc3339(raw) {
        return timestamp.format("%d %b %Y").to_string();
    }
    raw.to_string()
}

/// Format an amount in rupees with Indian digit grouping
pub fn format_inr(amount: f64) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let paise = (amount.abs() * 100.0).round() as u64;
    let rupees = paise / 100;
    let fraction = paise % 100;
    format!("{}₹{}.{:02}", sign, group_indian(&rupees.to_string()), fraction)
}

/// Group an unsigned digit string the Indian way: last three digits,
/// then pairs. `1234567` becomes `12,34,567`.
fn group_indian(digits: &str) -> String {
    if digits.len() <= 3 {
        return digits.to_string();
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups: Vec<&str> = Vec::new();
    let mut end = head.len();
    while end > 2 {
        groups.push(&head[end - 2..end]);
        end -= 2;
    }
    groups.push(&head[..end]);

    let mut out = groups
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join(",");
    out.push(',');
    out.push_str(tail);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn labels_read_like_headers() {
        assert_eq!(field_label("guardian_phone"), "Guardian Phone");
        assert_eq!(field_label("center_id"), "Center");
        assert_eq!(field_label("dob"), "Date of Birth");
        assert_eq!(field_label("id"), "ID");
        assert_eq!(field_label("name"), "Name");
    }

    #[test]
    fn money_columns_get_rupee_grouping() {
        assert_eq!(format_field("salary", &json!(0)), "₹0.00");
        assert_eq!(format_field("salary", &json!(999)), "₹999.00");
        assert_eq!(format_field("base_pay", &json!(1000)), "₹1,000.00");
        assert_eq!(format_field("net_pay", &json!(123456)), "₹1,23,456.00");
        assert_eq!(
            format_field("allowance", &json!(10000000)),
            "₹1,00,00,000.00"
        );
        assert_eq!(format_field("deduction", &json!(1250.5)), "₹1,250.50");
        assert_eq!(format_field("salary", &json!(-500)), "-₹500.00");
    }

    #[test]
    fn date_columns_render_short_dates() {
        assert_eq!(format_field("dob", &json!("2014-03-05")), "05 Mar 2014");
        assert_eq!(
            format_field("created_at", &json!("2023-09-18T07:15:00+00:00")),
            "18 Sep 2023"
        );
        // unparseable values pass through
        assert_eq!(format_field("dob", &json!("unknown")), "unknown");
    }

    #[test]
    fn plain_values_and_nulls() {
        assert_eq!(format_field("name", &json!("Asha Rao")), "Asha Rao");
        assert_eq!(format_field("is_educator", &json!(true)), "Yes");
        assert_eq!(format_field("is_educator", &json!(false)), "No");
        assert_eq!(format_field("notes", &json!(null)), "-");
        assert_eq!(format_field("meta", &json!({"a": 1})), "-");
    }

    #[test]
    fn stringify_skips_non_scalars() {
        assert_eq!(stringify_cell(&json!("x")), Some("x".to_string()));
        assert_eq!(stringify_cell(&json!(42)), Some("42".to_string()));
        assert_eq!(stringify_cell(&json!(false)), Some("false".to_string()));
        assert_eq!(stringify_cell(&json!(null)), None);
        assert_eq!(stringify_cell(&json!([1])), None);
        assert_eq!(stringify_cell(&json!({"k": "v"})), None);
    }
}
