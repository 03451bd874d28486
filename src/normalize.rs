//! Field normalizers: pure conversions of one raw text field into its canonical value.
//!
//! Absent and blank input is treated the same way. Currency and count failures are
//! errors the caller must propagate; date failures degrade to `None`.

use chrono::NaiveDate;

use crate::constants::{FALLBACK_DATE_FORMAT, POSTAL_CODE_LEN, PRIMARY_DATE_FORMAT};
use crate::error::NormalizeError;
use crate::types::FieldValue;

fn non_blank(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

/// Parse a currency string such as `"$1,234.50"`.
///
/// One leading `$` is stripped and every `,` removed before parsing.
pub fn parse_currency(raw: Option<&str>) -> Result<Option<f64>, NormalizeError> {
    let Some(text) = non_blank(raw) else {
        return Ok(None);
    };
    let unsigned = text.strip_prefix('$').unwrap_or(text);
    let digits = unsigned.trim().replace(',', "");
    digits
        .parse::<f64>()
        .map(Some)
        .map_err(|_| NormalizeError::Currency(text.to_string()))
}

/// Like [`parse_currency`] but an absent fee is `0.00`.
pub fn parse_fee(raw: Option<&str>) -> Result<f64, NormalizeError> {
    let text = non_blank(raw).unwrap_or("0.00");
    Ok(parse_currency(Some(text))?.unwrap_or(0.0))
}

/// Parse `YYYY/MM/DD`, falling back to `MM/DD/YY`. Anything else is `None`.
pub fn parse_date(raw: Option<&str>) -> Option<NaiveDate> {
    let text = non_blank(raw)?;
    // chrono accepts short years for %Y; the primary format wants exactly four digits
    let four_digit_year = text
        .split('/')
        .next()
        .is_some_and(|year| year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()));
    if four_digit_year {
        if let Ok(date) = NaiveDate::parse_from_str(text, PRIMARY_DATE_FORMAT) {
            return Some(date);
        }
    }
    NaiveDate::parse_from_str(text, FALLBACK_DATE_FORMAT).ok()
}

/// Truncate to five characters or left-pad with zeros up to five. No numeric check.
pub fn normalize_postal_code(raw: &str) -> String {
    if raw.chars().count() > POSTAL_CODE_LEN {
        raw.chars().take(POSTAL_CODE_LEN).collect()
    } else {
        format!("{raw:0>width$}", width = POSTAL_CODE_LEN)
    }
}

/// Numeric coercion for count columns.
///
/// Integral values, including decimals like `"2.0"`, become [`FieldValue::Int`];
/// other finite numbers such as `"2.5"` are kept as [`FieldValue::Float`].
/// Non-numeric text, non-finite values and integers outside the `i64` range are errors.
pub fn parse_count(raw: Option<&str>) -> Result<Option<FieldValue>, NormalizeError> {
    let Some(text) = non_blank(raw) else {
        return Ok(None);
    };
    if let Ok(n) = text.parse::<i64>() {
        return Ok(Some(FieldValue::Int(n)));
    }
    let invalid = || NormalizeError::Count(text.to_string());
    let v = text.parse::<f64>().map_err(|_| invalid())?;
    if !v.is_finite() {
        return Err(invalid());
    }
    if v.fract() != 0.0 {
        return Ok(Some(FieldValue::Float(v)));
    }
    // i64::MAX as f64 rounds up to 2^63, which is itself out of range
    if v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return Err(invalid());
    }
    Ok(Some(FieldValue::Int(v as i64)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_currency_strips_symbol_and_separators() {
        assert_eq!(parse_currency(Some("$1,234.50")).unwrap(), Some(1234.50));
        assert_eq!(parse_currency(Some("$75.00")).unwrap(), Some(75.0));
        assert_eq!(parse_currency(Some("1,000,000")).unwrap(), Some(1_000_000.0));
        assert_eq!(parse_currency(Some("  $12 ")).unwrap(), Some(12.0));
    }

    #[test]
    fn test_parse_currency_absent_is_null() {
        assert_eq!(parse_currency(None).unwrap(), None);
        assert_eq!(parse_currency(Some("")).unwrap(), None);
        assert_eq!(parse_currency(Some("   ")).unwrap(), None);
    }

    #[test]
    fn test_parse_currency_malformed_is_an_error() {
        assert_eq!(
            parse_currency(Some("$12abc")),
            Err(NormalizeError::Currency("$12abc".to_string()))
        );
        assert!(parse_currency(Some("$")).is_err());
        // Only one leading symbol is stripped
        assert!(parse_currency(Some("$$5")).is_err());
    }

    #[test]
    fn test_parse_fee_defaults_absent_to_zero() {
        assert_eq!(parse_fee(None).unwrap(), 0.0);
        assert_eq!(parse_fee(Some("")).unwrap(), 0.0);
        assert_eq!(parse_fee(Some("$1,050.25")).unwrap(), 1050.25);
        assert!(parse_fee(Some("free")).is_err());
    }

    #[test]
    fn test_parse_date_primary_and_fallback() {
        let expected = NaiveDate::from_ymd_opt(2021, 7, 4);
        assert_eq!(parse_date(Some("2021/07/04")), expected);
        assert_eq!(parse_date(Some("07/04/21")), expected);
    }

    #[test]
    fn test_parse_date_failures_are_null() {
        assert_eq!(parse_date(Some("not-a-date")), None);
        assert_eq!(parse_date(Some("2021-07-04")), None);
        assert_eq!(parse_date(Some("13/45/21")), None);
        assert_eq!(parse_date(Some("")), None);
        assert_eq!(parse_date(None), None);
    }

    #[test]
    fn test_normalize_postal_code() {
        assert_eq!(normalize_postal_code("123"), "00123");
        assert_eq!(normalize_postal_code("1234567"), "12345");
        assert_eq!(normalize_postal_code("10001"), "10001");
        assert_eq!(normalize_postal_code("10001-2345"), "10001");
        assert_eq!(normalize_postal_code(""), "00000");
    }

    #[test]
    fn test_normalize_postal_code_is_idempotent() {
        for raw in ["7", "123", "10001", "1234567", "NY 10"] {
            let once = normalize_postal_code(raw);
            assert_eq!(normalize_postal_code(&once), once);
            assert_eq!(once.chars().count(), 5);
        }
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count(Some("2")).unwrap(), Some(FieldValue::Int(2)));
        assert_eq!(parse_count(Some("3.0")).unwrap(), Some(FieldValue::Int(3)));
        assert_eq!(parse_count(Some("")).unwrap(), None);
        assert!(parse_count(Some("two")).is_err());
    }

    #[test]
    fn test_parse_count_keeps_fractional_values() {
        assert_eq!(parse_count(Some("2.5")).unwrap(), Some(FieldValue::Float(2.5)));
        assert_eq!(parse_count(Some(" -0.5 ")).unwrap(), Some(FieldValue::Float(-0.5)));
    }

    #[test]
    fn test_parse_count_rejects_out_of_range_and_non_finite() {
        assert_eq!(
            parse_count(Some("1e30")),
            Err(NormalizeError::Count("1e30".to_string()))
        );
        assert!(parse_count(Some("-1e19")).is_err());
        assert!(parse_count(Some("9223372036854775808")).is_err());
        assert!(parse_count(Some("inf")).is_err());
        assert!(parse_count(Some("NaN")).is_err());
        assert_eq!(
            parse_count(Some("9223372036854775807")).unwrap(),
            Some(FieldValue::Int(i64::MAX))
        );
    }
}
