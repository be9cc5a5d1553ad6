// Unit Normalizer - Currency and Scale Conversion
//
// Converts (value, currency, scale) into base-currency units. Unknown
// currencies and scales are errors, never zero.

use crate::config::{NormalizationConfig, RateEntry};
use crate::error::UnitError;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};

/// Canonical scale names and multipliers always available
const BUILTIN_SCALES: &[(&str, i64)] = &[
    ("actual", 1),
    ("thousands", 1_000),
    ("millions", 1_000_000),
    ("billions", 1_000_000_000),
];

/// Surface forms mapped to canonical scale names
const BUILTIN_SCALE_ALIASES: &[(&str, &str)] = &[
    ("units", "actual"),
    ("unit", "actual"),
    ("ones", "actual"),
    ("k", "thousands"),
    ("thousand", "thousands"),
    ("000", "thousands"),
    ("000s", "thousands"),
    ("'000", "thousands"),
    ("'000s", "thousands"),
    ("m", "millions"),
    ("mn", "millions"),
    ("mm", "millions"),
    ("million", "millions"),
    ("000,000", "millions"),
    ("000,000s", "millions"),
    ("b", "billions"),
    ("bn", "billions"),
    ("billion", "billions"),
];

/// Currency codes recognised in text even without a rate entry
const KNOWN_CODES: &[&str] = &["GBP", "USD", "EUR", "JPY", "CHF", "CAD", "AUD"];

static CODE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z]{3})\b").unwrap());

static SYMBOL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[£$€¥]").unwrap());

static CURRENCY_WORD_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(sterling|pounds?|dollars?|euros?|yen)\b").unwrap()
});

static SCALE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?ix)
        \b(billions?|millions?|thousands?)\b
        | [\d£$€¥(]\s?(bn|mn|m|k)\b
        | (?:^|[^\d,.])('?000(?:,000)?s?)\b
        ",
    )
    .unwrap()
});

/// Unit normalizer built from configuration tables
#[derive(Debug, Clone)]
pub struct UnitNormalizer {
    base_currency: String,
    rates: Vec<RateEntry>,
    scales: HashMap<String, Decimal>,
    aliases: HashMap<String, String>,
    known_codes: BTreeSet<String>,
}

impl UnitNormalizer {
    /// Build from configuration
    ///
    /// Configured scales and aliases are layered over the built-in tables.
    pub fn from_config(config: &NormalizationConfig) -> Self {
        let mut scales: HashMap<String, Decimal> = BUILTIN_SCALES
            .iter()
            .map(|(name, mult)| (name.to_string(), Decimal::new(*mult, 0)))
            .collect();
        for (name, mult) in &config.scales {
            scales.insert(name.trim().to_lowercase(), *mult);
        }

        let mut aliases: HashMap<String, String> = BUILTIN_SCALE_ALIASES
            .iter()
            .map(|(alias, canonical)| (alias.to_string(), canonical.to_string()))
            .collect();
        for (alias, canonical) in &config.scale_aliases {
            aliases.insert(alias.trim().to_lowercase(), canonical.trim().to_lowercase());
        }

        let base_currency = config.base_currency.trim().to_ascii_uppercase();
        let rates: Vec<RateEntry> = config
            .rates
            .iter()
            .map(|r| RateEntry {
                from: r.from.trim().to_ascii_uppercase(),
                to: r.to.trim().to_ascii_uppercase(),
                rate: r.rate,
                as_of: r.as_of,
            })
            .collect();

        let mut known_codes: BTreeSet<String> =
            KNOWN_CODES.iter().map(|c| c.to_string()).collect();
        known_codes.insert(base_currency.clone());
        for rate in &rates {
            known_codes.insert(rate.from.clone());
            known_codes.insert(rate.to.clone());
        }

        Self {
            base_currency,
            rates,
            scales,
            aliases,
            known_codes,
        }
    }

    pub fn base_currency(&self) -> &str {
        &self.base_currency
    }

    /// Resolve a scale name or alias to its canonical name
    pub fn canonical_scale(&self, scale: &str) -> Result<String, UnitError> {
        let key = scale.trim().to_lowercase();
        if self.scales.contains_key(&key) {
            return Ok(key);
        }
        match self.aliases.get(&key) {
            Some(canonical) if self.scales.contains_key(canonical) => Ok(canonical.clone()),
            _ => Err(UnitError::UnknownScale(scale.to_string())),
        }
    }

    /// Multiplier for a scale name or alias
    pub fn scale_multiplier(&self, scale: &str) -> Result<Decimal, UnitError> {
        let canonical = self.canonical_scale(scale)?;
        self.scales
            .get(&canonical)
            .copied()
            .ok_or_else(|| UnitError::UnknownScale(scale.to_string()))
    }

    /// Conversion rate from `currency` into the base currency
    ///
    /// Lookup order: identity; dated direct rate (latest on or before
    /// `as_of`); undated direct rate; reciprocal of the reverse pair.
    pub fn rate(&self, currency: &str, as_of: Option<NaiveDate>) -> Result<Decimal, UnitError> {
        let code = currency.trim().to_ascii_uppercase();
        if code == self.base_currency {
            return Ok(Decimal::ONE);
        }

        if let Some(rate) = self.lookup(&code, &self.base_currency, as_of) {
            return Ok(rate);
        }

        if let Some(reverse) = self.lookup(&self.base_currency, &code, as_of) {
            return Decimal::ONE
                .checked_div(reverse)
                .ok_or_else(|| UnitError::UnknownCurrency(currency.to_string()));
        }

        Err(UnitError::UnknownCurrency(currency.to_string()))
    }

    fn lookup(&self, from: &str, to: &str, as_of: Option<NaiveDate>) -> Option<Decimal> {
        let pair = self
            .rates
            .iter()
            .filter(|r| r.from == from && r.to == to && !r.rate.is_zero());

        let dated = pair
            .clone()
            .filter_map(|r| r.as_of.map(|d| (d, r.rate)))
            .filter(|(d, _)| as_of.map_or(true, |limit| *d <= limit))
            .max_by_key(|(d, _)| *d)
            .map(|(_, rate)| rate);

        let undated = || pair.clone().find(|r| r.as_of.is_none()).map(|r| r.rate);

        match as_of {
            // A period-matched rate beats an undated one
            Some(_) => dated.or_else(undated),
            None => undated().or(dated),
        }
    }

    /// Convert a value to base units
    ///
    /// # Arguments
    /// * `value` - Value as reported
    /// * `currency` - ISO code; None for ratio and count values
    /// * `scale` - Scale name or alias
    pub fn normalize(
        &self,
        value: Decimal,
        currency: Option<&str>,
        scale: &str,
    ) -> Result<Decimal, UnitError> {
        self.normalize_at(value, currency, scale, None)
    }

    /// Convert a value to base units using rates valid on `as_of`
    pub fn normalize_at(
        &self,
        value: Decimal,
        currency: Option<&str>,
        scale: &str,
        as_of: Option<NaiveDate>,
    ) -> Result<Decimal, UnitError> {
        let multiplier = self.scale_multiplier(scale)?;
        let rate = match currency {
            Some(code) => self.rate(code, as_of)?,
            None => Decimal::ONE,
        };

        value
            .checked_mul(multiplier)
            .and_then(|v| v.checked_mul(rate))
            .ok_or(UnitError::Overflow)
    }

    /// Detect a currency code in free text
    ///
    /// ISO codes win over symbols, symbols over words.
    pub fn detect_currency(&self, text: &str) -> Option<String> {
        for caps in CODE_RE.captures_iter(text) {
            let code = &caps[1];
            if self.known_codes.contains(code) {
                return Some(code.to_string());
            }
        }

        if let Some(m) = SYMBOL_RE.find(text) {
            let code = match m.as_str() {
                "£" => "GBP",
                "$" => "USD",
                "€" => "EUR",
                "¥" => "JPY",
                _ => return None,
            };
            return Some(code.to_string());
        }

        CURRENCY_WORD_RE.captures(text).map(|caps| {
            let word = caps[1].to_lowercase();
            let code = if word == "sterling" || word.starts_with("pound") {
                "GBP"
            } else if word.starts_with("dollar") {
                "USD"
            } else if word.starts_with("euro") {
                "EUR"
            } else {
                "JPY"
            };
            code.to_string()
        })
    }

    /// Detect a scale marker in free text, returning its canonical name
    pub fn detect_scale(&self, text: &str) -> Option<String> {
        SCALE_RE.captures_iter(text).find_map(|caps| {
            let token = caps
                .get(1)
                .or_else(|| caps.get(2))
                .or_else(|| caps.get(3))?
                .as_str();
            self.canonical_scale(token).ok()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> UnitNormalizer {
        UnitNormalizer::from_config(&NormalizationConfig::default())
    }

    #[test]
    fn test_scales_multiply_into_base_units() {
        let n = normalizer();
        assert_eq!(
            n.normalize(Decimal::new(1000, 0), Some("GBP"), "thousands").unwrap(),
            Decimal::new(1_000_000, 0)
        );
        assert_eq!(
            n.normalize(Decimal::new(1_000_000, 0), Some("GBP"), "actual").unwrap(),
            Decimal::new(1_000_000, 0)
        );
        assert_eq!(
            n.normalize(Decimal::new(15, 1), Some("gbp"), "bn").unwrap(),
            Decimal::new(1_500_000_000, 0)
        );
    }

    #[test]
    fn test_foreign_currency_converted() {
        let n = normalizer();
        let value = n.normalize(Decimal::new(100, 0), Some("USD"), "millions").unwrap();
        assert_eq!(value, Decimal::new(79_000_000, 0));
    }

    #[test]
    fn test_unknown_currency_is_error() {
        let n = normalizer();
        assert_eq!(
            n.normalize(Decimal::ONE, Some("XYZ"), "actual"),
            Err(UnitError::UnknownCurrency("XYZ".to_string()))
        );
    }

    #[test]
    fn test_unknown_scale_is_error() {
        let n = normalizer();
        assert!(matches!(
            n.normalize(Decimal::ONE, Some("GBP"), "zillions"),
            Err(UnitError::UnknownScale(_))
        ));
    }

    #[test]
    fn test_dated_rate_preferred_for_period() {
        let mut config = NormalizationConfig::default();
        config.rates = vec![
            RateEntry::new("USD", "GBP", Decimal::new(80, 2)),
            RateEntry {
                as_of: NaiveDate::from_ymd_opt(2022, 12, 31),
                ..RateEntry::new("USD", "GBP", Decimal::new(83, 2))
            },
            RateEntry {
                as_of: NaiveDate::from_ymd_opt(2023, 12, 31),
                ..RateEntry::new("USD", "GBP", Decimal::new(78, 2))
            },
        ];
        let n = UnitNormalizer::from_config(&config);

        let end_2023 = NaiveDate::from_ymd_opt(2023, 12, 31);
        let end_2022 = NaiveDate::from_ymd_opt(2022, 12, 31);
        let end_2021 = NaiveDate::from_ymd_opt(2021, 12, 31);
        assert_eq!(n.rate("USD", end_2023).unwrap(), Decimal::new(78, 2));
        assert_eq!(n.rate("USD", end_2022).unwrap(), Decimal::new(83, 2));
        assert_eq!(n.rate("USD", end_2021).unwrap(), Decimal::new(80, 2));
        assert_eq!(n.rate("USD", None).unwrap(), Decimal::new(80, 2));
    }

    #[test]
    fn test_reverse_pair_used_when_direct_missing() {
        let mut config = NormalizationConfig::default();
        config.rates = vec![RateEntry::new("GBP", "USD", Decimal::new(125, 2))];
        let n = UnitNormalizer::from_config(&config);
        assert_eq!(n.rate("USD", None).unwrap(), Decimal::new(8, 1));
    }

    #[test]
    fn test_detect_currency() {
        let n = normalizer();
        assert_eq!(n.detect_currency("Revenue (£m)").as_deref(), Some("GBP"));
        assert_eq!(n.detect_currency("US$ millions").as_deref(), Some("USD"));
        assert_eq!(n.detect_currency("EUR 000").as_deref(), Some("EUR"));
        assert_eq!(n.detect_currency("in pounds sterling").as_deref(), Some("GBP"));
        assert_eq!(n.detect_currency("EBITDA for FY2023"), None);
    }

    #[test]
    fn test_detect_scale() {
        let n = normalizer();
        assert_eq!(n.detect_scale("2023 £m").as_deref(), Some("millions"));
        assert_eq!(n.detect_scale("£1.2bn").as_deref(), Some("billions"));
        assert_eq!(n.detect_scale("$'000").as_deref(), Some("thousands"));
        assert_eq!(n.detect_scale("in millions of euros").as_deref(), Some("millions"));
        assert_eq!(n.detect_scale("Revenue 1,000 for 2023"), None);
    }
}
