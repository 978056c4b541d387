// Parsing and formatting helpers.
//
// Cell-level parsing lives here so the loader can work with typed values,
// and all display formatting lives here so the aggregator never builds strings.
use chrono::{Duration, NaiveDate};
use num_format::{Locale, ToFormattedString};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse a currency-like text cell into a `Decimal`.
///
/// - Trims whitespace and strips `$` and inner spaces.
/// - `,` is only accepted as a thousands separator between groups of three digits.
/// - A single `.` is the decimal point.
/// - Text mixing `.` and `,`, or with more than one `.`, could be either
///   `1,500.50` or the local `1.500,50` and is rejected.
/// - Returns `None` for anything that cannot be safely parsed.
pub fn parse_amount_safe(s: Option<&str>) -> Option<Decimal> {
    let s = s?.trim();
    if s.is_empty() || s.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let s: String = s.chars().filter(|c| !matches!(c, '$' | ' ')).collect();
    let dots = s.matches('.').count();
    let has_comma = s.contains(',');
    if dots > 1 || (dots == 1 && has_comma) {
        return None;
    }
    if has_comma {
        let mut groups = s.trim_start_matches('-').split(',');
        let head = groups.next()?;
        if head.is_empty() || head.len() > 3 || groups.any(|g| g.len() != 3) {
            return None;
        }
    }
    Decimal::from_str(&s.replace(',', "")).ok()
}

/// `part / whole` as a plain fraction, for percentages and bars.
/// `0` when `whole` is not positive.
pub fn ratio(part: Decimal, whole: Decimal) -> f64 {
    if whole <= Decimal::ZERO {
        return 0.0;
    }
    part.checked_div(whole)
        .and_then(|r| r.to_f64())
        .unwrap_or(0.0)
}

/// Dates typed into the sheet as text: ISO first, then day-first.
pub fn parse_date_safe(s: Option<&str>) -> Option<NaiveDate> {
    let s = s?.trim();
    if s.is_empty() {
        return None;
    }
    // ISO strings may carry a time part (`2026-01-15T00:00:00`).
    let head = s.get(..10).unwrap_or(s);
    NaiveDate::parse_from_str(head, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(s, "%d/%m/%Y"))
        .ok()
}

/// Convert an Excel serial day number (1900 date system) to a date.
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 1.0 {
        return None;
    }
    // Serial 0 is 1899-12-30 once the 1900 leap-year bug is accounted for.
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?;
    epoch.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Render a number cell as an identifier (`1042.0` becomes `1042`).
pub fn number_to_text(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Whole currency units with thousands separators (`$1,234,568`).
pub fn format_currency(n: Decimal) -> String {
    let whole = n.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let units = whole.abs().to_i128().unwrap_or(0).to_formatted_string(&Locale::en);
    if whole.is_sign_negative() && !whole.is_zero() {
        format!("-${}", units)
    } else {
        format!("${}", units)
    }
}

/// `0.3512` becomes `35.12%`.
pub fn format_percent(fraction: f64) -> String {
    format!("{:.2}%", fraction * 100.0)
}

/// Same as `format_percent` with an explicit sign, for deltas.
pub fn format_signed_percent(fraction: f64) -> String {
    format!("{:+.2}%", fraction * 100.0)
}

pub fn format_int<T>(n: T) -> String
where
    T: ToFormattedString,
{
    n.to_formatted_string(&Locale::en)
}

/// A horizontal bar of `width` cells filled in proportion to `value / max`.
pub fn bar(value: f64, max: f64, width: usize) -> String {
    if max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return String::new();
    }
    let filled = ((value / max) * width as f64).round() as usize;
    "█".repeat(filled.clamp(1, width))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn parses_currency_text() {
        assert_eq!(parse_amount_safe(Some(" $1,250,000 ")), Some(dec!(1250000)));
        assert_eq!(parse_amount_safe(Some("$ 980")), Some(dec!(980)));
        assert_eq!(parse_amount_safe(Some("12.5")), Some(dec!(12.5)));
        assert_eq!(parse_amount_safe(Some("1,250.75")), None);
        assert_eq!(parse_amount_safe(Some("n/a")), None);
        assert_eq!(parse_amount_safe(Some("  ")), None);
        assert_eq!(parse_amount_safe(None), None);
    }

    #[test]
    fn rejects_ambiguous_separators() {
        // local format: `.` groups thousands, `,` is the decimal comma
        assert_eq!(parse_amount_safe(Some("$1.500,50")), None);
        assert_eq!(parse_amount_safe(Some("$ 1.500.000")), None);
        // a lone comma is only a thousands separator before three digits
        assert_eq!(parse_amount_safe(Some("1,5")), None);
        assert_eq!(parse_amount_safe(Some("1500,50")), None);
        assert_eq!(parse_amount_safe(Some(",500")), None);
        assert_eq!(parse_amount_safe(Some("1,500")), Some(dec!(1500)));
    }

    #[test]
    fn ratio_is_exact_on_decimal_input() {
        assert_eq!(ratio(dec!(175), dec!(500)), 0.35);
        assert_eq!(ratio(dec!(0.3), dec!(0.6)), 0.5);
        assert_eq!(ratio(dec!(10), Decimal::ZERO), 0.0);
    }

    #[test]
    fn parses_text_dates() {
        let d = NaiveDate::from_ymd_opt(2026, 1, 15).unwrap();
        assert_eq!(parse_date_safe(Some("2026-01-15")), Some(d));
        assert_eq!(parse_date_safe(Some("2026-01-15T08:30:00")), Some(d));
        assert_eq!(parse_date_safe(Some("15/01/2026")), Some(d));
        assert_eq!(parse_date_safe(Some("enero")), None);
    }

    #[test]
    fn converts_excel_serials() {
        // 46037 is 2026-01-15 in the 1900 date system.
        assert_eq!(
            excel_serial_to_date(46037.0),
            NaiveDate::from_ymd_opt(2026, 1, 15)
        );
        assert_eq!(excel_serial_to_date(0.0), None);
    }

    #[test]
    fn formats_for_display() {
        assert_eq!(format_currency(dec!(10500000000)), "$10,500,000,000");
        assert_eq!(format_currency(dec!(-1500)), "-$1,500");
        assert_eq!(format_currency(dec!(1234567.5)), "$1,234,568");
        assert_eq!(format_currency(dec!(-0.4)), "$0");
        assert_eq!(format_percent(0.35), "35.00%");
        assert_eq!(format_signed_percent(-0.1), "-10.00%");
        assert_eq!(number_to_text(1042.0), "1042");
    }

    #[test]
    fn bar_scales_to_width() {
        assert_eq!(bar(50.0, 100.0, 10).chars().count(), 5);
        assert_eq!(bar(100.0, 100.0, 10).chars().count(), 10);
        assert_eq!(bar(0.0, 100.0, 10), "");
        // Tiny but positive values still get one cell.
        assert_eq!(bar(0.1, 100.0, 10).chars().count(), 1);
    }
}
