//! Canonical metric registry
//!
//! The registry is fixed for the lifetime of a context. Closure rules link
//! subtotals to their constituents; `dependency_tiers` orders metrics so that
//! constituents are always resolved before the subtotals that check them.

use crate::error::ResolveError;
use crate::types::{ClosureTerm, MetricDefinition, MetricId, SectionType, ValueDomain};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Registry of metric definitions in declaration order
#[derive(Debug, Clone)]
pub struct MetricRegistry {
    definitions: Vec<MetricDefinition>,
    index: HashMap<MetricId, usize>,
    tiers: Vec<Vec<MetricId>>,
}

impl MetricRegistry {
    /// Build a registry, rejecting empty, duplicate or cyclic definitions
    pub fn new(definitions: Vec<MetricDefinition>) -> Result<Self, ResolveError> {
        if definitions.is_empty() {
            return Err(ResolveError::MissingRegistry);
        }

        let mut index = HashMap::with_capacity(definitions.len());
        for (position, def) in definitions.iter().enumerate() {
            if def.min > def.max {
                return Err(ResolveError::Config(format!(
                    "Metric {} has min {} above max {}",
                    def.id, def.min, def.max
                )));
            }
            if index.insert(def.id, position).is_some() {
                return Err(ResolveError::Config(format!(
                    "Metric {} is defined more than once",
                    def.id
                )));
            }
        }

        let tiers = compute_tiers(&definitions, &index)?;

        Ok(Self {
            definitions,
            index,
            tiers,
        })
    }

    pub fn get(&self, id: MetricId) -> Option<&MetricDefinition> {
        self.index.get(&id).map(|&i| &self.definitions[i])
    }

    pub fn contains(&self, id: MetricId) -> bool {
        self.index.contains_key(&id)
    }

    /// Declaration order, used to sort output
    pub fn order(&self, id: MetricId) -> usize {
        self.index.get(&id).copied().unwrap_or(usize::MAX)
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    /// Metric ids grouped so each tier only depends on earlier tiers
    pub fn dependency_tiers(&self) -> &[Vec<MetricId>] {
        &self.tiers
    }
}

fn compute_tiers(
    definitions: &[MetricDefinition],
    index: &HashMap<MetricId, usize>,
) -> Result<Vec<Vec<MetricId>>, ResolveError> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        Visiting,
        Done(usize),
    }

    fn depth(
        position: usize,
        definitions: &[MetricDefinition],
        index: &HashMap<MetricId, usize>,
        marks: &mut [Mark],
    ) -> Result<usize, ResolveError> {
        match marks[position] {
            Mark::Done(d) => return Ok(d),
            Mark::Visiting => {
                return Err(ResolveError::Config(format!(
                    "Closure rules form a cycle through {}",
                    definitions[position].id
                )))
            }
            Mark::Unvisited => {}
        }

        marks[position] = Mark::Visiting;
        let mut d = 0;
        for term in &definitions[position].closure {
            // Constituents missing from the registry never resolve; ignore them here
            if let Some(&child) = index.get(&term.metric) {
                d = d.max(depth(child, definitions, index, marks)? + 1);
            }
        }
        marks[position] = Mark::Done(d);
        Ok(d)
    }

    let mut marks = vec![Mark::Unvisited; definitions.len()];
    let mut tiers: Vec<Vec<MetricId>> = Vec::new();
    for position in 0..definitions.len() {
        let d = depth(position, definitions, index, &mut marks)?;
        if tiers.len() <= d {
            tiers.resize_with(d + 1, Vec::new);
        }
        tiers[d].push(definitions[position].id);
    }
    Ok(tiers)
}

/// Largest plausible monetary magnitude in base units (10 trillion)
fn money_limit() -> Decimal {
    Decimal::new(10_000_000_000_000, 0)
}

fn monetary(
    id: MetricId,
    display_name: &str,
    non_negative: bool,
    expected_sections: &[SectionType],
) -> MetricDefinition {
    MetricDefinition {
        id,
        display_name: display_name.to_string(),
        domain: ValueDomain::Monetary,
        min: if non_negative { Decimal::ZERO } else { -money_limit() },
        max: money_limit(),
        expected_sections: expected_sections.to_vec(),
        closure: Vec::new(),
        sign_sensitive: false,
    }
}

fn with_closure(mut def: MetricDefinition, closure: Vec<ClosureTerm>) -> MetricDefinition {
    def.closure = closure;
    def
}

fn sign_sensitive(mut def: MetricDefinition) -> MetricDefinition {
    def.sign_sensitive = true;
    def
}

/// Built-in registry used when configuration does not define `metrics`
pub fn builtin_definitions() -> Vec<MetricDefinition> {
    use MetricId::*;
    use SectionType::*;

    vec![
        monetary(Revenue, "Revenue", true, &[IncomeStatement]),
        monetary(CostOfSales, "Cost of sales", false, &[IncomeStatement]),
        sign_sensitive(with_closure(
            monetary(GrossProfit, "Gross profit", false, &[IncomeStatement]),
            vec![ClosureTerm::add(Revenue), ClosureTerm::subtract(CostOfSales)],
        )),
        monetary(OperatingExpenses, "Operating expenses", false, &[IncomeStatement]),
        sign_sensitive(with_closure(
            monetary(OperatingProfit, "Operating profit", false, &[IncomeStatement]),
            vec![
                ClosureTerm::add(GrossProfit),
                ClosureTerm::subtract(OperatingExpenses),
            ],
        )),
        sign_sensitive(monetary(Ebitda, "EBITDA", false, &[IncomeStatement, Notes])),
        sign_sensitive(monetary(
            AdjustedEbitda,
            "Adjusted EBITDA",
            false,
            &[IncomeStatement, Notes],
        )),
        sign_sensitive(monetary(NetIncome, "Net income", false, &[IncomeStatement])),
        monetary(TotalDebt, "Total debt", true, &[BalanceSheet, Notes]),
        monetary(NetDebt, "Net debt", false, &[Notes, BalanceSheet]),
        monetary(Cash, "Cash and cash equivalents", true, &[BalanceSheet, CashFlow]),
        with_closure(
            monetary(TotalAssets, "Total assets", true, &[BalanceSheet]),
            vec![
                ClosureTerm::add(CurrentAssets),
                ClosureTerm::add(NonCurrentAssets),
            ],
        ),
        monetary(CurrentAssets, "Current assets", true, &[BalanceSheet]),
        monetary(NonCurrentAssets, "Non-current assets", true, &[BalanceSheet]),
        with_closure(
            monetary(TotalLiabilities, "Total liabilities", false, &[BalanceSheet]),
            vec![
                ClosureTerm::add(CurrentLiabilities),
                ClosureTerm::add(NonCurrentLiabilities),
            ],
        ),
        monetary(CurrentLiabilities, "Current liabilities", false, &[BalanceSheet]),
        monetary(
            NonCurrentLiabilities,
            "Non-current liabilities",
            false,
            &[BalanceSheet],
        ),
        monetary(TotalEquity, "Total equity", false, &[BalanceSheet]),
        sign_sensitive(monetary(
            OperatingCashFlow,
            "Operating cash flow",
            false,
            &[CashFlow],
        )),
        sign_sensitive(monetary(FreeCashFlow, "Free cash flow", false, &[CashFlow, Notes])),
        MetricDefinition {
            id: Employees,
            display_name: "Employees".to_string(),
            domain: ValueDomain::Count,
            min: Decimal::ZERO,
            max: Decimal::new(5_000_000, 0),
            expected_sections: vec![Notes],
            closure: Vec::new(),
            sign_sensitive: false,
        },
        MetricDefinition {
            id: EbitdaMargin,
            display_name: "EBITDA margin".to_string(),
            domain: ValueDomain::Ratio,
            min: Decimal::new(-5, 0),
            max: Decimal::ONE,
            expected_sections: vec![Notes, Narrative],
            closure: Vec::new(),
            sign_sensitive: false,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_registry_is_valid() {
        let registry = MetricRegistry::new(builtin_definitions()).unwrap();
        assert_eq!(registry.definitions().len(), MetricId::ALL.len());
        assert_eq!(registry.order(MetricId::Revenue), 0);
    }

    #[test]
    fn test_empty_registry_rejected() {
        assert!(matches!(
            MetricRegistry::new(Vec::new()),
            Err(ResolveError::MissingRegistry)
        ));
    }

    #[test]
    fn test_constituents_precede_subtotals() {
        let registry = MetricRegistry::new(builtin_definitions()).unwrap();
        let tier_of = |id: MetricId| {
            registry
                .dependency_tiers()
                .iter()
                .position(|tier| tier.contains(&id))
                .unwrap()
        };

        assert_eq!(tier_of(MetricId::Revenue), 0);
        assert_eq!(tier_of(MetricId::GrossProfit), 1);
        assert_eq!(tier_of(MetricId::OperatingProfit), 2);
        assert!(tier_of(MetricId::CurrentAssets) < tier_of(MetricId::TotalAssets));
    }

    #[test]
    fn test_cyclic_closure_rejected() {
        let mut defs = builtin_definitions();
        for def in defs.iter_mut() {
            if def.id == MetricId::Revenue {
                def.closure = vec![ClosureTerm::add(MetricId::GrossProfit)];
            }
        }
        assert!(matches!(
            MetricRegistry::new(defs),
            Err(ResolveError::Config(_))
        ));
    }

    #[test]
    fn test_duplicate_metric_rejected() {
        let mut defs = builtin_definitions();
        defs.push(defs[0].clone());
        assert!(matches!(
            MetricRegistry::new(defs),
            Err(ResolveError::Config(_))
        ));
    }
}
