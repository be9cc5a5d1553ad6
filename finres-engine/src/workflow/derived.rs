// Derived Metrics - Growth Rates and Ratios From Resolved Figures
//
// Computed after resolution from resolved values only. Margins and growth
// rates are fractions (0.15 is 15%); leverage and liquidity are plain ratios.

use crate::types::{MetricId, PeriodKey, PeriodSpec, Resolution};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use tracing::debug;

/// Identifier of a computed figure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DerivedMetricId {
    RevenueGrowth,
    EbitdaGrowth,
    OperatingProfitGrowth,
    NetIncomeGrowth,
    GrossMargin,
    OperatingMargin,
    EbitdaMargin,
    NetMargin,
    NetDebtToEbitda,
    DebtToEquity,
    NetDebtToEquity,
    CurrentRatio,
    CashRatio,
}

impl DerivedMetricId {
    pub fn as_str(self) -> &'static str {
        match self {
            DerivedMetricId::RevenueGrowth => "REVENUE_GROWTH",
            DerivedMetricId::EbitdaGrowth => "EBITDA_GROWTH",
            DerivedMetricId::OperatingProfitGrowth => "OPERATING_PROFIT_GROWTH",
            DerivedMetricId::NetIncomeGrowth => "NET_INCOME_GROWTH",
            DerivedMetricId::GrossMargin => "GROSS_MARGIN",
            DerivedMetricId::OperatingMargin => "OPERATING_MARGIN",
            DerivedMetricId::EbitdaMargin => "EBITDA_MARGIN",
            DerivedMetricId::NetMargin => "NET_MARGIN",
            DerivedMetricId::NetDebtToEbitda => "NET_DEBT_TO_EBITDA",
            DerivedMetricId::DebtToEquity => "DEBT_TO_EQUITY",
            DerivedMetricId::NetDebtToEquity => "NET_DEBT_TO_EQUITY",
            DerivedMetricId::CurrentRatio => "CURRENT_RATIO",
            DerivedMetricId::CashRatio => "CASH_RATIO",
        }
    }
}

impl fmt::Display for DerivedMetricId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One computed figure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedMetric {
    pub id: DerivedMetricId,
    pub period: PeriodSpec,
    pub value: Decimal,

    /// Resolved metrics the value was computed from, numerator first
    pub inputs: Vec<MetricId>,

    /// Prior period of a growth rate
    pub compared_to: Option<PeriodSpec>,
}

const GROWTH: [(DerivedMetricId, MetricId); 4] = [
    (DerivedMetricId::RevenueGrowth, MetricId::Revenue),
    (DerivedMetricId::EbitdaGrowth, MetricId::Ebitda),
    (DerivedMetricId::OperatingProfitGrowth, MetricId::OperatingProfit),
    (DerivedMetricId::NetIncomeGrowth, MetricId::NetIncome),
];

/// Same-period ratio; the first resolved numerator is used
struct RatioDefinition {
    id: DerivedMetricId,
    numerator: &'static [MetricId],
    denominator: MetricId,
}

const RATIOS: [RatioDefinition; 9] = [
    RatioDefinition {
        id: DerivedMetricId::GrossMargin,
        numerator: &[MetricId::GrossProfit],
        denominator: MetricId::Revenue,
    },
    RatioDefinition {
        id: DerivedMetricId::OperatingMargin,
        numerator: &[MetricId::OperatingProfit],
        denominator: MetricId::Revenue,
    },
    RatioDefinition {
        id: DerivedMetricId::EbitdaMargin,
        numerator: &[MetricId::Ebitda],
        denominator: MetricId::Revenue,
    },
    RatioDefinition {
        id: DerivedMetricId::NetMargin,
        numerator: &[MetricId::NetIncome],
        denominator: MetricId::Revenue,
    },
    RatioDefinition {
        id: DerivedMetricId::NetDebtToEbitda,
        numerator: &[MetricId::NetDebt, MetricId::TotalDebt],
        denominator: MetricId::Ebitda,
    },
    RatioDefinition {
        id: DerivedMetricId::DebtToEquity,
        numerator: &[MetricId::TotalDebt],
        denominator: MetricId::TotalEquity,
    },
    RatioDefinition {
        id: DerivedMetricId::NetDebtToEquity,
        numerator: &[MetricId::NetDebt],
        denominator: MetricId::TotalEquity,
    },
    RatioDefinition {
        id: DerivedMetricId::CurrentRatio,
        numerator: &[MetricId::CurrentAssets],
        denominator: MetricId::CurrentLiabilities,
    },
    RatioDefinition {
        id: DerivedMetricId::CashRatio,
        numerator: &[MetricId::Cash],
        denominator: MetricId::CurrentLiabilities,
    },
];

/// Resolved values indexed by metric and period
struct ResolvedValues<'a> {
    values: HashMap<(MetricId, PeriodKey), Decimal>,
    periods: BTreeMap<PeriodKey, &'a PeriodSpec>,
}

impl<'a> ResolvedValues<'a> {
    fn new(resolutions: &'a [Resolution]) -> Self {
        let mut values = HashMap::new();
        let mut periods = BTreeMap::new();
        for resolution in resolutions {
            let (Some(period), Some(value)) = (&resolution.period, resolution.value) else {
                continue;
            };
            values.insert((resolution.metric, period.key()), value);
            periods.entry(period.key()).or_insert(period);
        }
        Self { values, periods }
    }

    fn get(&self, metric: MetricId, key: PeriodKey) -> Option<Decimal> {
        self.values.get(&(metric, key)).copied()
    }

    /// Value of `metric` for the same kind of period one year before `key`
    fn prior(&self, metric: MetricId, key: &PeriodKey) -> Option<(Decimal, &'a PeriodSpec)> {
        self.periods
            .iter()
            .rev()
            .filter(|(k, _)| k.is_year_before(key))
            .find_map(|(k, period)| self.get(metric, *k).map(|v| (v, *period)))
    }
}

/// Change from `prior` relative to its magnitude
///
/// None when the prior value is zero or the arithmetic overflows.
pub fn growth_rate(current: Decimal, prior: Decimal) -> Option<Decimal> {
    if prior.is_zero() {
        return None;
    }
    current.checked_sub(prior)?.checked_div(prior.abs())
}

/// None on a zero denominator or overflow
pub fn checked_ratio(numerator: Decimal, denominator: Decimal) -> Option<Decimal> {
    numerator.checked_div(denominator)
}

/// Compute every growth rate and ratio the resolved figures support
///
/// Unresolved metrics, missing inputs and zero denominators produce nothing.
/// Output is ordered by period, oldest first, then by identifier.
pub fn derive_metrics(resolutions: &[Resolution]) -> Vec<DerivedMetric> {
    let resolved = ResolvedValues::new(resolutions);
    let mut derived = Vec::new();

    for (key, period) in &resolved.periods {
        for (id, metric) in GROWTH {
            let Some(current) = resolved.get(metric, *key) else {
                continue;
            };
            let Some((prior, prior_period)) = resolved.prior(metric, key) else {
                continue;
            };
            if let Some(value) = growth_rate(current, prior) {
                derived.push(DerivedMetric {
                    id,
                    period: (*period).clone(),
                    value,
                    inputs: vec![metric],
                    compared_to: Some(prior_period.clone()),
                });
            }
        }

        for ratio in &RATIOS {
            let numerator = ratio
                .numerator
                .iter()
                .find_map(|m| resolved.get(*m, *key).map(|v| (*m, v)));
            let (Some((numerator_metric, numerator)), Some(denominator)) =
                (numerator, resolved.get(ratio.denominator, *key))
            else {
                continue;
            };
            match checked_ratio(numerator, denominator) {
                Some(value) => derived.push(DerivedMetric {
                    id: ratio.id,
                    period: (*period).clone(),
                    value,
                    inputs: vec![numerator_metric, ratio.denominator],
                    compared_to: None,
                }),
                None => debug!("{} {} skipped: zero or overflowing denominator", ratio.id, period),
            }
        }
    }

    derived.sort_by_key(|d| (d.period.key(), d.id));
    debug!(
        "Derived {} metrics from {} resolutions",
        derived.len(),
        resolutions.len()
    );
    derived
}
