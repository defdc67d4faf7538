use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use rust_decimal::Decimal;

// Tried in order, first match wins. Month-first formats sit before the
// day-first format; the order is load-bearing for ambiguous inputs like
// 03/04/2025 and must not be rearranged.
const DATE_FORMATS: &[(&str, bool)] = &[
    ("%Y-%m-%d", false),
    ("%m/%d/%Y", false),
    ("%m/%d/%y", false),
    ("%Y-%m-%dT%H:%M:%S", true),
    ("%m-%d-%Y", false),
    ("%d/%m/%Y", false),
];

/// Parse a free-text date against the supported formats. Returns None for
/// empty input or when no format matches; date-only formats land at midnight.
pub fn parse_date(value: &str) -> Option<NaiveDateTime> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }
    for (fmt, has_time) in DATE_FORMATS {
        if *has_time {
            if let Ok(dt) = NaiveDateTime::parse_from_str(value, fmt) {
                return Some(dt);
            }
        } else if let Ok(d) = NaiveDate::parse_from_str(value, fmt) {
            return Some(d.and_time(NaiveTime::MIN));
        }
    }
    None
}

/// Parse a currency string into an exact decimal, stripping `$`, thousands
/// separators, and whitespace. Returns None for empty or non-numeric input.
pub fn parse_amount(value: &str) -> Option<Decimal> {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '$')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    Decimal::from_str(&cleaned).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, day).unwrap().and_time(NaiveTime::MIN)
    }

    #[test]
    fn test_parse_date_all_formats() {
        assert_eq!(parse_date("2025-01-15"), Some(d(2025, 1, 15)));
        assert_eq!(parse_date("01/15/2025"), Some(d(2025, 1, 15)));
        assert_eq!(parse_date("01/15/25"), Some(d(2025, 1, 15)));
        assert_eq!(
            parse_date("2025-01-15T13:45:00"),
            Some(
                NaiveDate::from_ymd_opt(2025, 1, 15)
                    .unwrap()
                    .and_hms_opt(13, 45, 0)
                    .unwrap()
            )
        );
        assert_eq!(parse_date("01-15-2025"), Some(d(2025, 1, 15)));
        // Day-first only reachable when month-first fails (day > 12)
        assert_eq!(parse_date("25/01/2025"), Some(d(2025, 1, 25)));
    }

    #[test]
    fn test_parse_date_month_first_precedence() {
        // Ambiguous slash dates resolve month-first
        assert_eq!(parse_date("03/04/2025"), Some(d(2025, 3, 4)));
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert_eq!(parse_date(""), None);
        assert_eq!(parse_date("   "), None);
        assert_eq!(parse_date("not a date"), None);
        assert_eq!(parse_date("13/32/2025"), None);
        assert_eq!(parse_date("2025-02-30"), None);
    }

    #[test]
    fn test_parse_date_trims_whitespace() {
        assert_eq!(parse_date("  2025-06-01  "), Some(d(2025, 6, 1)));
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("$1,234.50"), Some("1234.50".parse().unwrap()));
        assert_eq!(parse_amount(" -12 "), Some("-12".parse().unwrap()));
        assert_eq!(parse_amount("0"), Some(Decimal::ZERO));
        assert_eq!(parse_amount("-$50.00"), Some("-50.00".parse().unwrap()));
    }

    #[test]
    fn test_parse_amount_exactness() {
        // 0.1 is not representable in binary floating point; Decimal keeps it exact
        let a = parse_amount("0.10").unwrap();
        let b = parse_amount("0.20").unwrap();
        assert_eq!(a + b, "0.30".parse().unwrap());
    }

    #[test]
    fn test_parse_amount_rejects_garbage() {
        assert_eq!(parse_amount(""), None);
        assert_eq!(parse_amount("   "), None);
        assert_eq!(parse_amount("$,"), None);
        assert_eq!(parse_amount("12.3.4"), None);
        assert_eq!(parse_amount("abc"), None);
    }
}
