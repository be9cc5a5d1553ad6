// Period Parsing - Fiscal Years, Halves, Quarters
//
// Turns period labels found in headers and text into PeriodSpec values.
// Unrecognized text yields None.

use crate::types::{PeriodKind, PeriodSpec};
use chrono::{Datelike, Months, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

/// Fiscal year end as (month, day)
pub type FiscalYearEnd = (u32, u32);

const CALENDAR_YEAR_END: FiscalYearEnd = (12, 31);

const MONTH_NAMES: &str = concat!(
    r"jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|",
    r"sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?",
);

static DAY_MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({})\.?,?\s+(\d{{4}})\b",
        MONTH_NAMES
    ))
    .unwrap()
});

static MONTH_DAY_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?i)\b({})\.?\s+(\d{{1,2}})(?:st|nd|rd|th)?,?\s+(\d{{4}})\b",
        MONTH_NAMES
    ))
    .unwrap()
});

static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})\b").unwrap());

static SLASH_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})/(\d{1,2})/(\d{4})\b").unwrap());

static QUARTER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bQ([1-4])\s*[-/ ]?\s*(?:FY\s*)?'?(\d{4}|\d{2})\b").unwrap()
});

static QUARTER_WORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(first|second|third|fourth|1st|2nd|3rd|4th)\s+quarter",
        r"\s+(?:of\s+)?(?:FY\s*)?(\d{4})\b",
    ))
    .unwrap()
});

static HALF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:H|half\s*)([12])\s*[-/ ]?\s*(?:FY\s*)?'?(\d{4}|\d{2})\b").unwrap()
});

static HALF_WORDS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(first|second|1st|2nd)\s+half\s+(?:of\s+)?(?:FY\s*)?(\d{4})\b").unwrap()
});

static ENDED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)\b(three|3|six|6|nine|9|twelve|12|fifty[- ]two|52|fifty[- ]three|53)?",
        r"\s*(months?|weeks?|year|period|quarter|half[- ]year)",
        r"\s+(?:ended|ending|to)\s+(.+)",
    ))
    .unwrap()
});

static YEAR_RANGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{4})\s*[-/]\s*(\d{4}|\d{2})\b").unwrap());

static FISCAL_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:FY|fiscal\s+year|financial\s+year)\s*'?(\d{4}|\d{2})\b").unwrap()
});

static YEAR_IN_TEXT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\d£$€¥.,/-])((?:19|20)\d{2})\b").unwrap());

/// Text right after a number that marks it as an amount rather than a year
static AMOUNT_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(?:%|(?:m|mn|bn|k)\b|million|billion|thousand|[.,]\d)").unwrap()
});

static BARE_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^\s*((?:19|20)\d{2})",
        r"\s*(?:\(?\s*(?:[A-Z]{3}\s*|[£$€¥]\s*)?(?:'?000s?|m|mn|bn|k)?\s*\)?)?\s*$",
    ))
    .unwrap()
});

/// Parse a period label
///
/// Recognizes fiscal-year tokens ("FY2023"), "year ended <date>", quarters
/// ("Q1 2023", "three months ended <date>"), halves ("H1 2023", "six months
/// ended <date>"), year ranges ("2023-24") and bare dates. Years end on
/// 31 December.
pub fn parse_period_label(text: &str) -> Option<PeriodSpec> {
    parse_period_label_with(text, None)
}

/// Parse a period label, aligning bare fiscal-year tokens to `fy_end`
pub fn parse_period_label_with(text: &str, fy_end: Option<FiscalYearEnd>) -> Option<PeriodSpec> {
    parse_inner(text, fy_end).map(|(spec, _)| spec)
}

/// First year mentioned in running text ("Revenue for 2023 was £500m")
///
/// Read as that fiscal year. Numbers tied to a currency symbol or followed by
/// a scale are amounts and are passed over.
pub fn find_year_in_text(text: &str, fy_end: Option<FiscalYearEnd>) -> Option<PeriodSpec> {
    YEAR_IN_TEXT_RE.captures_iter(text).find_map(|caps| {
        let year = caps.get(1)?;
        if AMOUNT_SUFFIX_RE.is_match(&text[year.end()..]) {
            return None;
        }
        parse_period_label_with(&format!("FY{}", year.as_str()), fy_end)
    })
}

/// Most common (month, day) among fiscal years anchored to an explicit date
///
/// Ties go to the first seen.
pub fn detect_fiscal_year_end<S: AsRef<str>>(labels: &[S]) -> Option<FiscalYearEnd> {
    let mut counts: Vec<(FiscalYearEnd, usize)> = Vec::new();
    for label in labels {
        if let Some((spec, true)) = parse_inner(label.as_ref(), None) {
            if spec.kind != PeriodKind::FiscalYear {
                continue;
            }
            let key = (spec.end.month(), spec.end.day());
            match counts.iter_mut().find(|(k, _)| *k == key) {
                Some((_, n)) => *n += 1,
                None => counts.push((key, 1)),
            }
        }
    }

    let mut best: Option<(FiscalYearEnd, usize)> = None;
    for (key, n) in counts {
        if best.map_or(true, |(_, top)| n > top) {
            best = Some((key, n));
        }
    }
    best.map(|(key, _)| key)
}

/// Returns the period and whether its end date was written out explicitly
fn parse_inner(text: &str, fy_end: Option<FiscalYearEnd>) -> Option<(PeriodSpec, bool)> {
    let fy_end = fy_end.unwrap_or(CALENDAR_YEAR_END);

    if let Some(caps) = ENDED_RE.captures(text) {
        if let Some(end) = find_date(&caps[3]) {
            let length = caps.get(1).map(|m| m.as_str().to_lowercase());
            let unit = caps[2].to_lowercase();
            let kind = match (length.as_deref(), unit.as_str()) {
                (_, "quarter") => PeriodKind::Quarter,
                (_, u) if u.starts_with("half") => PeriodKind::HalfYear,
                (Some("three") | Some("3"), _) => PeriodKind::Quarter,
                (Some("six") | Some("6"), _) => PeriodKind::HalfYear,
                (Some("nine") | Some("9"), _) => return None,
                _ => PeriodKind::FiscalYear,
            };
            return Some((spec_ending(kind, end)?, true));
        }
    }

    if let Some(caps) = QUARTER_RE.captures(text) {
        let quarter: u32 = caps[1].parse().ok()?;
        let year = expand_year(&caps[2])?;
        return Some((calendar_quarter(year, quarter)?, false));
    }

    if let Some(caps) = QUARTER_WORDS_RE.captures(text) {
        let quarter = ordinal(&caps[1])?;
        let year: i32 = caps[2].parse().ok()?;
        return Some((calendar_quarter(year, quarter)?, false));
    }

    if let Some(caps) = HALF_RE.captures(text) {
        let half: u32 = caps[1].parse().ok()?;
        let year = expand_year(&caps[2])?;
        return Some((calendar_half(year, half)?, false));
    }

    if let Some(caps) = HALF_WORDS_RE.captures(text) {
        let half = ordinal(&caps[1])?;
        let year: i32 = caps[2].parse().ok()?;
        return Some((calendar_half(year, half)?, false));
    }

    // Full dates come before ranges so "2023-12-31" is not read as a range
    if let Some(end) = find_date(text) {
        return Some((spec_ending(PeriodKind::FiscalYear, end)?, true));
    }

    if let Some(caps) = YEAR_RANGE_RE.captures(text) {
        let first: i32 = caps[1].parse().ok()?;
        let second = match caps[2].len() {
            2 => (first / 100) * 100 + caps[2].parse::<i32>().ok()?,
            _ => caps[2].parse().ok()?,
        };
        if second == first + 1 {
            return Some((fiscal_year(second, fy_end)?, false));
        }
    }

    if let Some(caps) = FISCAL_YEAR_RE.captures(text) {
        let year = expand_year(&caps[1])?;
        return Some((fiscal_year(year, fy_end)?, false));
    }

    if let Some(caps) = BARE_YEAR_RE.captures(text) {
        let year: i32 = caps[1].parse().ok()?;
        return Some((fiscal_year(year, fy_end)?, false));
    }

    None
}

fn find_date(text: &str) -> Option<NaiveDate> {
    if let Some(caps) = DAY_MONTH_YEAR_RE.captures(text) {
        let day: u32 = caps[1].parse().ok()?;
        let month = month_number(&caps[2])?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Some(caps) = MONTH_DAY_YEAR_RE.captures(text) {
        let month = month_number(&caps[1])?;
        let day: u32 = caps[2].parse().ok()?;
        let year: i32 = caps[3].parse().ok()?;
        return NaiveDate::from_ymd_opt(year, month, day);
    }
    if let Some(caps) = ISO_DATE_RE.captures(text) {
        return NaiveDate::from_ymd_opt(
            caps[1].parse().ok()?,
            caps[2].parse().ok()?,
            caps[3].parse().ok()?,
        );
    }
    if let Some(caps) = SLASH_DATE_RE.captures(text) {
        // Day first
        return NaiveDate::from_ymd_opt(
            caps[3].parse().ok()?,
            caps[2].parse().ok()?,
            caps[1].parse().ok()?,
        );
    }
    None
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.chars().take(3).collect::<String>().to_lowercase();
    let month = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

fn ordinal(word: &str) -> Option<u32> {
    match word.to_lowercase().as_str() {
        "first" | "1st" => Some(1),
        "second" | "2nd" => Some(2),
        "third" | "3rd" => Some(3),
        "fourth" | "4th" => Some(4),
        _ => None,
    }
}

/// "23" -> 2023, "2023" -> 2023
fn expand_year(text: &str) -> Option<i32> {
    let year: i32 = text.parse().ok()?;
    match text.len() {
        2 => Some(2000 + year),
        4 => Some(year),
        _ => None,
    }
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let first_of_next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)?
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)?
    };
    first_of_next.pred_opt()
}

fn period_months(kind: PeriodKind) -> u32 {
    match kind {
        PeriodKind::FiscalYear => 12,
        PeriodKind::HalfYear => 6,
        PeriodKind::Quarter => 3,
    }
}

/// Period of `kind` ending on `end`
fn spec_ending(kind: PeriodKind, end: NaiveDate) -> Option<PeriodSpec> {
    // Step back from the day after `end` so month-end periods start on the 1st
    let start = end
        .succ_opt()?
        .checked_sub_months(Months::new(period_months(kind)))?;
    let index = match kind {
        PeriodKind::FiscalYear => None,
        PeriodKind::HalfYear => Some(if end.month() <= 6 { 1 } else { 2 }),
        PeriodKind::Quarter => Some(((end.month() - 1) / 3 + 1) as u8),
    };
    Some(PeriodSpec {
        kind,
        start,
        end,
        fiscal_year: end.year(),
        index,
    })
}

fn fiscal_year(year: i32, fy_end: FiscalYearEnd) -> Option<PeriodSpec> {
    let (month, day) = fy_end;
    // Clamp 29 February and similar to the last valid day
    let end = NaiveDate::from_ymd_opt(year, month, day).or_else(|| month_end(year, month))?;
    spec_ending(PeriodKind::FiscalYear, end)
}

fn calendar_quarter(year: i32, quarter: u32) -> Option<PeriodSpec> {
    if !(1..=4).contains(&quarter) {
        return None;
    }
    spec_ending(PeriodKind::Quarter, month_end(year, quarter * 3)?)
}

fn calendar_half(year: i32, half: u32) -> Option<PeriodSpec> {
    if !(1..=2).contains(&half) {
        return None;
    }
    spec_ending(PeriodKind::HalfYear, month_end(year, half * 6)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_fiscal_year_token() {
        let spec = parse_period_label("FY2023").unwrap();
        assert_eq!(spec.kind, PeriodKind::FiscalYear);
        assert_eq!(spec.start, date(2023, 1, 1));
        assert_eq!(spec.end, date(2023, 12, 31));
        assert_eq!(spec.to_string(), "FY2023");

        assert_eq!(parse_period_label("FY 23").unwrap().end, date(2023, 12, 31));
        assert_eq!(parse_period_label("Fiscal Year 2022").unwrap().fiscal_year, 2022);
    }

    #[test]
    fn test_year_ended_date() {
        let spec = parse_period_label("Year ended 31 March 2024").unwrap();
        assert_eq!(spec.kind, PeriodKind::FiscalYear);
        assert_eq!(spec.start, date(2023, 4, 1));
        assert_eq!(spec.end, date(2024, 3, 31));
        assert_eq!(spec.to_string(), "FY2024");

        let spec = parse_period_label("For the period ended December 31, 2023").unwrap();
        assert_eq!(spec.end, date(2023, 12, 31));
    }

    #[test]
    fn test_quarters() {
        let spec = parse_period_label("Q1 2023").unwrap();
        assert_eq!(spec.kind, PeriodKind::Quarter);
        assert_eq!(spec.start, date(2023, 1, 1));
        assert_eq!(spec.end, date(2023, 3, 31));
        assert_eq!(spec.to_string(), "Q1-2023");

        let spec = parse_period_label("Three months ended 30 September 2023").unwrap();
        assert_eq!(spec.kind, PeriodKind::Quarter);
        assert_eq!(spec.index, Some(3));

        let spec = parse_period_label("2nd quarter 2023").unwrap();
        assert_eq!(spec.end, date(2023, 6, 30));
    }

    #[test]
    fn test_halves() {
        let spec = parse_period_label("H1 2023").unwrap();
        assert_eq!(spec.kind, PeriodKind::HalfYear);
        assert_eq!(spec.end, date(2023, 6, 30));
        assert_eq!(spec.to_string(), "H1-2023");

        let spec = parse_period_label("Six months ended 31 December 2023").unwrap();
        assert_eq!(spec.kind, PeriodKind::HalfYear);
        assert_eq!(spec.start, date(2023, 7, 1));
        assert_eq!(spec.to_string(), "H2-2023");
    }

    #[test]
    fn test_year_ranges() {
        let spec = parse_period_label("2023-24").unwrap();
        assert_eq!(spec.kind, PeriodKind::FiscalYear);
        assert_eq!(spec.end, date(2024, 12, 31));
        assert_eq!(parse_period_label("2023/2024").unwrap().fiscal_year, 2024);
        assert!(parse_period_label("2019-23").is_none());
    }

    #[test]
    fn test_bare_dates_and_years() {
        assert_eq!(parse_period_label("31 December 2022").unwrap().end, date(2022, 12, 31));
        assert_eq!(parse_period_label("2023-06-30").unwrap().end, date(2023, 6, 30));
        assert_eq!(parse_period_label("2023").unwrap().end, date(2023, 12, 31));
        assert_eq!(parse_period_label("2023 £m").unwrap().fiscal_year, 2023);
    }

    #[test]
    fn test_unrecognized_is_none() {
        assert!(parse_period_label("Total revenue").is_none());
        assert!(parse_period_label("").is_none());
        assert!(parse_period_label("Note 14").is_none());
    }

    #[test]
    fn test_fiscal_year_end_alignment() {
        let labels = [
            "Year ended 31 March 2024",
            "Year ended 31 March 2023",
            "31 December 2023",
            "FY2023",
        ];
        let fy_end = detect_fiscal_year_end(&labels);
        assert_eq!(fy_end, Some((3, 31)));

        let spec = parse_period_label_with("FY2024", fy_end).unwrap();
        assert_eq!(spec.end, date(2024, 3, 31));
        assert_eq!(spec.start, date(2023, 4, 1));
    }

    #[test]
    fn test_no_fiscal_year_end_without_dates() {
        assert_eq!(detect_fiscal_year_end(&["FY2023", "Q1 2023"]), None);
    }

    #[test]
    fn test_year_inside_sentence() {
        let spec = find_year_in_text("Revenue for 2023 was £500m", None).unwrap();
        assert_eq!(spec.to_string(), "FY2023");
        assert!(parse_period_label("Revenue for 2023 was £500m").is_none());

        let spec = find_year_in_text("Revenue for 2023 was £500m", Some((3, 31))).unwrap();
        assert_eq!(spec.end, date(2023, 3, 31));
    }

    #[test]
    fn test_amounts_are_not_years() {
        assert!(find_year_in_text("Revenue was £2023m", None).is_none());
        assert!(find_year_in_text("Revenue was 2023 million", None).is_none());
        assert!(find_year_in_text("Margin of 1999.5 basis points", None).is_none());
        assert!(find_year_in_text("Revenue rose 2,023 units", None).is_none());
    }
}
