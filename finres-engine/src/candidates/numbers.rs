//! Locale-aware amount parsing
//!
//! Accepts thousands separators, parenthesized negatives, leading and
//! trailing minus signs, currency symbols, scale suffixes and percentages.

use crate::config::NumberLocale;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::str::FromStr;

const AMOUNT_PATTERN: &str = r"(?x)
    (?P<open>\(\s*)?
    (?P<sign>[-−–]\s*)?
    (?P<cur>(?:US|A|C)?[£$€¥]\s*)?
    (?P<sign2>[-−–]\s*)?
    \b(?P<num>NUMBER)
    (?P<unit>\s*(?i:bn|mn|m|k|billions?|millions?|thousands?)\b)?
    (?P<pct>\s*%)?
    (?P<close>\s*\))?
    (?P<trail>-(?:\s|$))?
";

const POINT_NUMBER: &str = r"\d{1,3}(?:,\d{3})+(?:\.\d+)?|\d+(?:\.\d+)?";
const COMMA_NUMBER: &str = r"\d{1,3}(?:\.\d{3})+(?:,\d+)?|\d+(?:,\d+)?";

static POINT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&AMOUNT_PATTERN.replace("NUMBER", POINT_NUMBER)).unwrap());

static COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(&AMOUNT_PATTERN.replace("NUMBER", COMMA_NUMBER)).unwrap());

/// One amount found in text
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAmount {
    /// Signed value; percentages are not divided by 100
    pub value: Decimal,
    pub start: usize,
    pub end: usize,
    pub percent: bool,

    /// Currency marker attached to the number (e.g. "£", "US$")
    pub currency_marker: Option<String>,

    /// Scale suffix attached to the number (e.g. "m", "bn", "million")
    pub scale_marker: Option<String>,

    /// Written with thousands separators
    pub grouped: bool,
}

impl ParsedAmount {
    /// Carries a currency or scale marker, so it is unlikely to be a year or date
    pub fn is_marked(&self) -> bool {
        self.currency_marker.is_some() || self.scale_marker.is_some()
    }

    /// Plain four-digit number that reads like a calendar year
    pub fn looks_like_year(&self) -> bool {
        !self.is_marked()
            && !self.grouped
            && !self.percent
            && self.value.fract().is_zero()
            && self.value >= Decimal::new(1900, 0)
            && self.value <= Decimal::new(2100, 0)
    }
}

/// Find every amount in `text`, in order of appearance
pub fn find_amounts(text: &str, locale: NumberLocale) -> Vec<ParsedAmount> {
    let re: &Regex = match locale {
        NumberLocale::PointDecimal => &POINT_RE,
        NumberLocale::CommaDecimal => &COMMA_RE,
    };

    re.captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let num = caps.name("num")?.as_str();
            let magnitude = parse_number(num, locale)?;

            let parenthesized = caps.name("open").is_some() && caps.name("close").is_some();
            let negative = parenthesized
                || caps.name("sign").is_some()
                || caps.name("sign2").is_some()
                || caps.name("trail").is_some();

            let currency_marker = caps.name("cur").map(|m| m.as_str().trim().to_string());
            let scale_marker = caps.name("unit").map(|m| m.as_str().trim().to_string());
            let grouped = match locale {
                NumberLocale::PointDecimal => num.contains(','),
                NumberLocale::CommaDecimal => num.contains('.'),
            };

            Some(ParsedAmount {
                value: if negative { -magnitude } else { magnitude },
                start: whole.start(),
                end: whole.end(),
                percent: caps.name("pct").is_some(),
                currency_marker,
                scale_marker,
                grouped,
            })
        })
        .collect()
}

/// Parse a cell's text as a single amount
///
/// The first non-percentage amount wins; a cell holding only a percentage
/// returns it.
pub fn parse_amount(text: &str, locale: NumberLocale) -> Option<ParsedAmount> {
    let amounts = find_amounts(text, locale);
    amounts
        .iter()
        .find(|a| !a.percent)
        .or_else(|| amounts.first())
        .cloned()
}

/// Parse a bare number written in `locale`
pub fn parse_number(text: &str, locale: NumberLocale) -> Option<Decimal> {
    let canonical: String = match locale {
        NumberLocale::PointDecimal => text.chars().filter(|c| *c != ',').collect(),
        NumberLocale::CommaDecimal => text
            .chars()
            .filter(|c| *c != '.')
            .map(|c| if c == ',' { '.' } else { c })
            .collect(),
    };
    Decimal::from_str(&canonical).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(text: &str) -> Option<Decimal> {
        parse_amount(text, NumberLocale::PointDecimal).map(|a| a.value)
    }

    #[test]
    fn test_thousands_separators_and_decimals() {
        assert_eq!(point("1,234,567"), Some(Decimal::new(1_234_567, 0)));
        assert_eq!(point("1,234.5"), Some(Decimal::new(12_345, 1)));
        assert_eq!(point("42"), Some(Decimal::new(42, 0)));
    }

    #[test]
    fn test_negative_forms() {
        assert_eq!(point("(1,234)"), Some(Decimal::new(-1234, 0)));
        assert_eq!(point("-500"), Some(Decimal::new(-500, 0)));
        assert_eq!(point("−500"), Some(Decimal::new(-500, 0)));
        assert_eq!(point("500-"), Some(Decimal::new(-500, 0)));
        assert_eq!(point("(£12.5m)"), Some(Decimal::new(-125, 1)));
    }

    #[test]
    fn test_comma_locale() {
        let value = parse_amount("1.234,5", NumberLocale::CommaDecimal).map(|a| a.value);
        assert_eq!(value, Some(Decimal::new(12_345, 1)));
    }

    #[test]
    fn test_markers_captured() {
        let amount = parse_amount("£1.2bn", NumberLocale::PointDecimal).unwrap();
        assert_eq!(amount.value, Decimal::new(12, 1));
        assert_eq!(amount.currency_marker.as_deref(), Some("£"));
        assert_eq!(amount.scale_marker.as_deref(), Some("bn"));
        assert!(amount.is_marked());

        let amount = parse_amount("US$ 300 million", NumberLocale::PointDecimal).unwrap();
        assert_eq!(amount.currency_marker.as_deref(), Some("US$"));
        assert_eq!(amount.scale_marker.as_deref(), Some("million"));
    }

    #[test]
    fn test_find_amounts_in_sentence() {
        let text = "Revenue for 2023 was £500m (2022: £450m), up 11.1%.";
        let amounts = find_amounts(text, NumberLocale::PointDecimal);
        let marked: Vec<Decimal> = amounts
            .iter()
            .filter(|a| a.is_marked())
            .map(|a| a.value)
            .collect();
        assert_eq!(marked, vec![Decimal::new(500, 0), Decimal::new(450, 0)]);
        assert!(amounts[0].looks_like_year());
        assert!(amounts.iter().any(|a| a.percent));
    }

    #[test]
    fn test_identifiers_are_not_amounts() {
        assert!(find_amounts("Q1 FY2023 H2", NumberLocale::PointDecimal).is_empty());
    }
}
