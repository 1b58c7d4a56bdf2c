// ==========================================
// FieldOps stock engine - demand calculator
// ==========================================
// shortfall = max(0, target - current), per crew per SKU
// Pure function, never fails: missing SKUs read as 0
// ==========================================

use crate::domain::types::{Sku, SkuCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::instrument;

/// Demand input for one crew
#[derive(Debug, Clone)]
pub struct CrewDemandInput {
    pub crew_id: String,
    pub target: SkuCounts,
    pub current: SkuCounts,
}

/// crew_id -> SKU -> shortfall
pub type DemandMap = BTreeMap<String, SkuCounts>;

pub struct DemandCalculator {
    skus: Vec<Sku>,
}

impl DemandCalculator {
    /// Calculator over the dispatchable equipment SKUs
    pub fn new() -> Self {
        Self::for_skus(Sku::EQUIPMENT.to_vec())
    }

    pub fn for_skus(skus: Vec<Sku>) -> Self {
        Self { skus }
    }

    pub fn shortfall(target: u32, current: u32) -> u32 {
        target.saturating_sub(current)
    }

    #[instrument(skip_all, fields(crews = inputs.len()))]
    pub fn calculate(&self, inputs: &[CrewDemandInput]) -> DemandMap {
        let mut demand = DemandMap::new();
        for input in inputs {
            let row: SkuCounts = self
                .skus
                .iter()
                .map(|&sku| (sku, Self::shortfall(input.target.get(sku), input.current.get(sku))))
                .collect();
            demand.insert(input.crew_id.clone(), row);
        }
        tracing::debug!(crews = demand.len(), "demand calculated");
        demand
    }

    /// Sum of shortfalls per SKU
    pub fn totals(&self, demand: &DemandMap) -> SkuCounts {
        let mut totals = SkuCounts::new();
        for &sku in &self.skus {
            totals.set(sku, 0);
        }
        for row in demand.values() {
            for (sku, value) in row.iter() {
                totals.add(sku, value);
            }
        }
        totals
    }
}

/// Crew stock against its objective, summed over the equipment SKUs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CrewStockStatus {
    Ok,
    LowStock,  // below objective overall
    OverStock, // above objective overall
}

impl CrewStockStatus {
    /// Signed sum of (target - current); surpluses offset shortfalls
    pub fn classify(target: &SkuCounts, current: &SkuCounts) -> Self {
        let diff: i64 = Sku::EQUIPMENT
            .iter()
            .map(|&sku| target.get(sku) as i64 - current.get(sku) as i64)
            .sum();
        match diff {
            d if d > 0 => CrewStockStatus::LowStock,
            d if d < 0 => CrewStockStatus::OverStock,
            _ => CrewStockStatus::Ok,
        }
    }

    /// Operator-facing label
    pub fn label(&self) -> &'static str {
        match self {
            CrewStockStatus::Ok => "OK",
            CrewStockStatus::LowStock => "Bajo stock",
            CrewStockStatus::OverStock => "Sobre-stock",
        }
    }
}

/// Equipment SKUs whose warehouse stock is below `threshold`
pub fn critical_skus(warehouse: &SkuCounts, threshold: u32) -> Vec<Sku> {
    Sku::EQUIPMENT
        .iter()
        .copied()
        .filter(|&sku| warehouse.get(sku) < threshold)
        .collect()
}

impl Default for DemandCalculator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(Sku, u32)]) -> SkuCounts {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_shortfall_never_negative() {
        assert_eq!(DemandCalculator::shortfall(15, 4), 11);
        assert_eq!(DemandCalculator::shortfall(5, 9), 0);
        assert_eq!(DemandCalculator::shortfall(0, 0), 0);
    }

    #[test]
    fn test_missing_skus_default_to_zero() {
        let calc = DemandCalculator::new();
        let demand = calc.calculate(&[
            CrewDemandInput {
                crew_id: "A".to_string(),
                target: counts(&[(Sku::Ont, 15), (Sku::Mesh, 5)]),
                current: counts(&[(Sku::Ont, 3)]),
            },
            CrewDemandInput {
                crew_id: "B".to_string(),
                target: SkuCounts::new(),
                current: counts(&[(Sku::Box, 4)]),
            },
        ]);

        assert_eq!(demand["A"].get(Sku::Ont), 12);
        assert_eq!(demand["A"].get(Sku::Mesh), 5);
        assert_eq!(demand["A"].get(Sku::Fono), 0);
        assert_eq!(demand["B"].get(Sku::Box), 0);

        let totals = calc.totals(&demand);
        assert_eq!(totals.get(Sku::Ont), 12);
        assert_eq!(totals.get(Sku::Mesh), 5);
    }

    #[test]
    fn test_stock_status_sums_signed_differences() {
        let target = counts(&[(Sku::Ont, 15), (Sku::Mesh, 5), (Sku::Fono, 2), (Sku::Box, 1)]);
        assert_eq!(
            CrewStockStatus::classify(&target, &counts(&[(Sku::Ont, 3)])),
            CrewStockStatus::LowStock
        );
        // ONT surplus of 2 offsets the MESH shortfall of 2
        let balanced = counts(&[(Sku::Ont, 17), (Sku::Mesh, 3), (Sku::Fono, 2), (Sku::Box, 1)]);
        assert_eq!(CrewStockStatus::classify(&target, &balanced), CrewStockStatus::Ok);
        let over = counts(&[(Sku::Ont, 20), (Sku::Mesh, 5), (Sku::Fono, 2), (Sku::Box, 1)]);
        assert_eq!(CrewStockStatus::classify(&target, &over), CrewStockStatus::OverStock);
        assert_eq!(CrewStockStatus::OverStock.label(), "Sobre-stock");
    }

    #[test]
    fn test_critical_skus_below_threshold() {
        let warehouse = counts(&[(Sku::Ont, 10), (Sku::Mesh, 9), (Sku::Fono, 40)]);
        assert_eq!(critical_skus(&warehouse, 10), vec![Sku::Mesh, Sku::Box]);
        assert!(critical_skus(&warehouse, 0).is_empty());
    }
}
